use std::rc::Rc;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{new_object, JsObjectType, ObjectKind};
use crate::runner::ds::object_property::PropertyKey;
use crate::runner::ds::operations::object::default_value;
use crate::runner::ds::realm::Realm;
use crate::runner::ds::string_object::create_string_object;
use crate::runner::ds::value::{JsString, JsValue};
use crate::runner::eval::types::{EvalError, ValueResult};

pub const TYPE_STR_UNDEFINED: &str = "undefined";
pub const TYPE_STR_NULL: &str = "null";
pub const TYPE_STR_BOOLEAN: &str = "boolean";
pub const TYPE_STR_STRING: &str = "string";
pub const TYPE_STR_NUMBER: &str = "number";
pub const TYPE_STR_OBJECT: &str = "object";
pub const TYPE_STR_FUNCTION: &str = "function";

/// Result of the `typeof` operator.
pub fn get_type(a: &JsValue) -> &'static str {
    match a {
        JsValue::Undefined => TYPE_STR_UNDEFINED,
        JsValue::Null => TYPE_STR_OBJECT,
        JsValue::Boolean(_) => TYPE_STR_BOOLEAN,
        JsValue::String(_) => TYPE_STR_STRING,
        JsValue::Number(_) => TYPE_STR_NUMBER,
        JsValue::Object(o) => {
            if o.borrow().is_callable() {
                TYPE_STR_FUNCTION
            } else {
                TYPE_STR_OBJECT
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PreferredType {
    Default,
    String,
    Number,
}

pub fn to_primitive(realm: &mut Realm, v: &JsValue, preferred_type: PreferredType) -> ValueResult {
    match v {
        JsValue::Object(o) => default_value(realm, o, preferred_type),
        _ => Ok(v.clone()),
    }
}

pub fn to_boolean(v: &JsValue) -> bool {
    match v {
        JsValue::Undefined | JsValue::Null => false,
        JsValue::Boolean(b) => *b,
        JsValue::Number(n) => !(*n == 0.0 || n.is_nan()),
        JsValue::String(s) => !s.is_empty(),
        JsValue::Object(_) => true,
    }
}

pub fn to_number(realm: &mut Realm, v: &JsValue) -> Result<f64, EvalError> {
    match v {
        JsValue::Number(n) => Ok(*n),
        JsValue::Object(_) => {
            let pv = to_primitive(realm, v, PreferredType::Number)?;
            to_number(realm, &pv)
        }
        _ => Ok(primitive_to_number(v)),
    }
}

/// `ToNumber` for values that can never run script code.
pub fn primitive_to_number(v: &JsValue) -> f64 {
    match v {
        JsValue::Undefined => f64::NAN,
        JsValue::Null => 0.0,
        JsValue::Boolean(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        JsValue::Number(n) => *n,
        JsValue::String(s) => string_to_number(s),
        JsValue::Object(_) => f64::NAN,
    }
}

pub fn is_js_whitespace(c: char) -> bool {
    matches!(
        c,
        '\u{0009}'
            | '\u{000B}'
            | '\u{000C}'
            | '\u{0020}'
            | '\u{00A0}'
            | '\u{FEFF}'
            | '\u{000A}'
            | '\u{000D}'
            | '\u{2028}'
            | '\u{2029}'
    ) || (c != '\u{180E}' && c.is_whitespace())
}

pub fn string_to_number(s: &str) -> f64 {
    let s = s.trim_matches(is_js_whitespace);
    if s.is_empty() {
        return 0.0;
    }
    if s.len() > 2 && (s.starts_with("0x") || s.starts_with("0X")) {
        let mut n = 0.0;
        for c in s[2..].chars() {
            match c.to_digit(16) {
                Some(d) => n = n * 16.0 + f64::from(d),
                None => return f64::NAN,
            }
        }
        return n;
    }
    match s {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    let valid = s
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
    if !valid || !s.chars().any(|c| c.is_ascii_digit()) {
        return f64::NAN;
    }
    s.parse::<f64>().unwrap_or(f64::NAN)
}

pub fn to_string(realm: &mut Realm, v: &JsValue) -> Result<JsString, EvalError> {
    match v {
        JsValue::String(s) => Ok(s.clone()),
        JsValue::Object(_) => {
            let pv = to_primitive(realm, v, PreferredType::String)?;
            to_string(realm, &pv)
        }
        _ => Ok(primitive_to_string(v)),
    }
}

/// `ToString` for values that can never run script code.
pub fn primitive_to_string(v: &JsValue) -> JsString {
    match v {
        JsValue::Undefined => Rc::from(TYPE_STR_UNDEFINED),
        JsValue::Null => Rc::from(TYPE_STR_NULL),
        JsValue::Boolean(b) => Rc::from(if *b { "true" } else { "false" }),
        JsValue::Number(n) => Rc::from(number_to_string(*n)),
        JsValue::String(s) => s.clone(),
        JsValue::Object(_) => Rc::from("[object Object]"),
    }
}

pub fn to_property_key(realm: &mut Realm, v: &JsValue) -> Result<PropertyKey, EvalError> {
    match v {
        JsValue::Number(n) if *n >= 0.0 && *n < 4294967295.0 && n.fract() == 0.0 => {
            Ok(PropertyKey::Index(*n as u32))
        }
        _ => Ok(PropertyKey::from_js_string(&to_string(realm, v)?)),
    }
}

/// Number to string conversion with the shortest digit string that round-trips.
pub fn number_to_string(m: f64) -> String {
    if m.is_nan() {
        return "NaN".to_string();
    }
    if m == 0.0 {
        return "0".to_string();
    }
    if m < 0.0 {
        return format!("-{}", number_to_string(-m));
    }
    if m.is_infinite() {
        return "Infinity".to_string();
    }
    let formatted = format!("{:e}", m);
    let (mantissa, exponent) = match formatted.split_once('e') {
        Some(parts) => parts,
        None => return formatted,
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let e: i64 = exponent.parse().unwrap_or(0);
    let k = digits.len() as i64;
    let n = e + 1;
    if k <= n && n <= 21 {
        let mut s = digits;
        s.extend(std::iter::repeat('0').take((n - k) as usize));
        s
    } else if 0 < n && n <= 21 {
        format!("{}.{}", &digits[..n as usize], &digits[n as usize..])
    } else if -6 < n && n <= 0 {
        format!("0.{}{}", "0".repeat((-n) as usize), digits)
    } else {
        let sign = if n - 1 < 0 { '-' } else { '+' };
        if k == 1 {
            format!("{}e{}{}", digits, sign, (n - 1).abs())
        } else {
            format!("{}.{}e{}{}", &digits[..1], &digits[1..], sign, (n - 1).abs())
        }
    }
}

pub fn to_object(realm: &mut Realm, v: &JsValue) -> Result<JsObjectType, EvalError> {
    match v {
        JsValue::Undefined | JsValue::Null => Err(realm.error(JErrorType::TypeError(format!(
            "Cannot convert {} to object",
            v
        )))),
        JsValue::Boolean(b) => Ok(new_object(
            ObjectKind::Boolean(*b),
            Some(realm.intrinsics.boolean_prototype.clone()),
        )),
        JsValue::Number(n) => Ok(new_object(
            ObjectKind::Number(*n),
            Some(realm.intrinsics.number_prototype.clone()),
        )),
        JsValue::String(s) => Ok(create_string_object(realm, s.clone())),
        JsValue::Object(o) => Ok(o.clone()),
    }
}

pub fn to_integer(realm: &mut Realm, v: &JsValue) -> Result<f64, EvalError> {
    let n = to_number(realm, v)?;
    Ok(number_to_integer(n))
}

pub fn number_to_integer(n: f64) -> f64 {
    if n.is_nan() {
        0.0
    } else if n.is_infinite() {
        n
    } else {
        n.trunc()
    }
}

pub fn number_to_uint32(n: f64) -> u32 {
    if !n.is_finite() {
        return 0;
    }
    n.trunc().rem_euclid(4294967296.0) as u32
}

pub fn number_to_int32(n: f64) -> i32 {
    number_to_uint32(n) as i32
}

pub fn to_int32(realm: &mut Realm, v: &JsValue) -> Result<i32, EvalError> {
    Ok(number_to_int32(to_number(realm, v)?))
}

pub fn to_uint32(realm: &mut Realm, v: &JsValue) -> Result<u32, EvalError> {
    Ok(number_to_uint32(to_number(realm, v)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_to_string() {
        assert_eq!(number_to_string(0.0), "0");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(1.0), "1");
        assert_eq!(number_to_string(-42.0), "-42");
        assert_eq!(number_to_string(0.1), "0.1");
        assert_eq!(number_to_string(123.456), "123.456");
        assert_eq!(number_to_string(1e21), "1e+21");
        assert_eq!(number_to_string(1e20), "100000000000000000000");
        assert_eq!(number_to_string(0.000001), "0.000001");
        assert_eq!(number_to_string(1e-7), "1e-7");
        assert_eq!(number_to_string(1.5e-10), "1.5e-10");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_string_to_number() {
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("  12  "), 12.0);
        assert_eq!(string_to_number("0x1F"), 31.0);
        assert_eq!(string_to_number("-Infinity"), f64::NEG_INFINITY);
        assert_eq!(string_to_number("1e3"), 1000.0);
        assert_eq!(string_to_number(".5"), 0.5);
        assert!(string_to_number("inf").is_nan());
        assert!(string_to_number("12px").is_nan());
        assert!(string_to_number("-").is_nan());
    }

    #[test]
    fn test_int32_wrapping() {
        assert_eq!(number_to_int32(4294967296.0 + 5.0), 5);
        assert_eq!(number_to_int32(2147483648.0), -2147483648);
        assert_eq!(number_to_int32(-1.5), -1);
        assert_eq!(number_to_uint32(-1.0), 4294967295);
        assert_eq!(number_to_int32(f64::NAN), 0);
    }
}
