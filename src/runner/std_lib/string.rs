//! String built-in.
//!
//! Positions and lengths are counted in UTF-16 code units.

use std::rc::Rc;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::ObjectKind;
use crate::runner::ds::operations::type_conversion::{get_type, to_integer, to_string};
use crate::runner::ds::realm::Realm;
use crate::runner::ds::string_object::create_string_object;
use crate::runner::ds::value::{utf16_len, utf16_substring, utf16_unit_at, JsString, JsValue};
use crate::runner::eval::types::{EvalError, ValueResult};
use crate::runner::plugin::types::{arg, BuiltInObject};

use super::array::relative_index;

pub fn register(realm: &mut Realm) {
    BuiltInObject::new("String")
        .with_prototype(realm.intrinsics.string_prototype.clone())
        .with_constructor(1, string_call, Some(string_construct))
        .add_method("toString", 0, string_value_of)
        .add_method("valueOf", 0, string_value_of)
        .add_method("charAt", 1, string_char_at)
        .add_method("charCodeAt", 1, string_char_code_at)
        .add_method("indexOf", 1, string_index_of)
        .add_method("slice", 2, string_slice)
        .add_method("substring", 2, string_substring)
        .install(realm);
}

fn string_arg(realm: &mut Realm, args: &[JsValue]) -> Result<JsString, EvalError> {
    match args.first() {
        None => Ok(Rc::from("")),
        Some(v) => to_string(realm, v),
    }
}

fn string_call(realm: &mut Realm, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    Ok(JsValue::String(string_arg(realm, &args)?))
}

fn string_construct(realm: &mut Realm, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let s = string_arg(realm, &args)?;
    Ok(JsValue::Object(create_string_object(realm, s)))
}

/// CheckObjectCoercible followed by ToString.
fn this_string(realm: &mut Realm, this: &JsValue, method: &str) -> Result<JsString, EvalError> {
    match this {
        JsValue::Undefined | JsValue::Null => Err(realm.error(JErrorType::TypeError(format!(
            "String.prototype.{} called on null or undefined",
            method
        )))),
        v => to_string(realm, v),
    }
}

/// `toString` and `valueOf` only accept string primitives and String objects.
fn string_value_of(realm: &mut Realm, this: JsValue, _args: Vec<JsValue>) -> ValueResult {
    let wrapped = match &this {
        JsValue::String(s) => Some(s.clone()),
        JsValue::Object(o) => match &o.borrow().kind {
            ObjectKind::String(s) => Some(s.clone()),
            _ => None,
        },
        _ => None,
    };
    match wrapped {
        Some(s) => Ok(JsValue::String(s)),
        None => Err(realm.error(JErrorType::TypeError(format!(
            "String.prototype.valueOf requires that 'this' be a String, not {}",
            get_type(&this)
        )))),
    }
}

fn string_char_at(realm: &mut Realm, this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let s = this_string(realm, &this, "charAt")?;
    let pos = to_integer(realm, &arg(&args, 0))?;
    if pos < 0.0 || pos >= utf16_len(&s) as f64 {
        return Ok(JsValue::from_str(""));
    }
    let pos = pos as usize;
    Ok(JsValue::from(utf16_substring(&s, pos, pos + 1)))
}

fn string_char_code_at(realm: &mut Realm, this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let s = this_string(realm, &this, "charCodeAt")?;
    let pos = to_integer(realm, &arg(&args, 0))?;
    if pos < 0.0 {
        return Ok(JsValue::Number(f64::NAN));
    }
    Ok(JsValue::Number(
        utf16_unit_at(&s, pos as usize).map_or(f64::NAN, f64::from),
    ))
}

fn string_index_of(realm: &mut Realm, this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let s = this_string(realm, &this, "indexOf")?;
    let search = to_string(realm, &arg(&args, 0))?;
    let pos = to_integer(realm, &arg(&args, 1))?;
    let units: Vec<u16> = s.encode_utf16().collect();
    let needle: Vec<u16> = search.encode_utf16().collect();
    let start = pos.max(0.0).min(units.len() as f64) as usize;
    if needle.is_empty() {
        return Ok(JsValue::Number(start as f64));
    }
    let found = units[start..]
        .windows(needle.len())
        .position(|w| w == needle.as_slice());
    Ok(JsValue::Number(found.map_or(-1.0, |i| (start + i) as f64)))
}

fn string_slice(realm: &mut Realm, this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let s = this_string(realm, &this, "slice")?;
    let len = utf16_len(&s) as f64;
    let start = relative_index(to_integer(realm, &arg(&args, 0))?, len);
    let end = match arg(&args, 1) {
        JsValue::Undefined => len,
        e => relative_index(to_integer(realm, &e)?, len),
    };
    Ok(JsValue::from(utf16_substring(&s, start as usize, end as usize)))
}

fn string_substring(realm: &mut Realm, this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let s = this_string(realm, &this, "substring")?;
    let len = utf16_len(&s) as f64;
    let start = to_integer(realm, &arg(&args, 0))?.max(0.0).min(len);
    let end = match arg(&args, 1) {
        JsValue::Undefined => len,
        e => to_integer(realm, &e)?.max(0.0).min(len),
    };
    let (from, to) = if start <= end { (start, end) } else { (end, start) };
    Ok(JsValue::from(utf16_substring(&s, from as usize, to as usize)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ds::realm::RealmConfig;

    fn call(f: fn(&mut Realm, JsValue, Vec<JsValue>) -> ValueResult, this: &str, args: Vec<JsValue>) -> JsValue {
        let mut realm = Realm::new(RealmConfig::default());
        f(&mut realm, JsValue::from_str(this), args).unwrap()
    }

    #[test]
    fn test_char_access_counts_utf16_units() {
        assert_eq!(
            call(string_char_code_at, "a😀", vec![JsValue::Number(1.0)]),
            JsValue::Number(f64::from(0xD83Du16))
        );
        assert_eq!(
            call(string_char_at, "abc", vec![JsValue::Number(2.0)]),
            JsValue::from_str("c")
        );
        assert_eq!(
            call(string_char_at, "abc", vec![JsValue::Number(3.0)]),
            JsValue::from_str("")
        );
    }

    #[test]
    fn test_index_of() {
        assert_eq!(
            call(string_index_of, "hello", vec![JsValue::from_str("l")]),
            JsValue::Number(2.0)
        );
        assert_eq!(
            call(string_index_of, "hello", vec![JsValue::from_str("l"), JsValue::Number(3.0)]),
            JsValue::Number(3.0)
        );
        assert_eq!(
            call(string_index_of, "hello", vec![JsValue::from_str("z")]),
            JsValue::Number(-1.0)
        );
    }

    #[test]
    fn test_slice_and_substring() {
        assert_eq!(
            call(string_slice, "abcdef", vec![JsValue::Number(-3.0)]),
            JsValue::from_str("def")
        );
        assert_eq!(
            call(string_substring, "abcdef", vec![JsValue::Number(4.0), JsValue::Number(1.0)]),
            JsValue::from_str("bcd")
        );
    }

    #[test]
    fn test_value_of_rejects_other_objects() {
        let mut realm = Realm::new(RealmConfig::default());
        let o = JsValue::Object(realm.new_plain_object());
        assert!(string_value_of(&mut realm, o, vec![]).is_err());
    }
}
