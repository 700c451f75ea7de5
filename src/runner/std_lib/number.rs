//! Number and Boolean built-ins.

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{new_object, ObjectKind};
use crate::runner::ds::operations::type_conversion::{
    get_type, number_to_string, to_boolean, to_integer, to_number,
};
use crate::runner::ds::realm::Realm;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::types::{EvalError, ValueResult};
use crate::runner::plugin::types::{arg, BuiltInObject};

const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const MAX_FRACTION_DIGITS: usize = 52;

pub fn register(realm: &mut Realm) {
    BuiltInObject::new("Number")
        .with_prototype(realm.intrinsics.number_prototype.clone())
        .with_constructor(1, number_call, Some(number_construct))
        .add_property("MAX_VALUE", JsValue::Number(f64::MAX))
        .add_property("MIN_VALUE", JsValue::Number(5e-324))
        .add_property("NaN", JsValue::Number(f64::NAN))
        .add_property("POSITIVE_INFINITY", JsValue::Number(f64::INFINITY))
        .add_property("NEGATIVE_INFINITY", JsValue::Number(f64::NEG_INFINITY))
        .add_method("toString", 1, number_to_string_method)
        .add_method("valueOf", 0, number_value_of)
        .install(realm);

    BuiltInObject::new("Boolean")
        .with_prototype(realm.intrinsics.boolean_prototype.clone())
        .with_constructor(1, boolean_call, Some(boolean_construct))
        .add_method("toString", 0, boolean_to_string)
        .add_method("valueOf", 0, boolean_value_of)
        .install(realm);
}

fn number_arg(realm: &mut Realm, args: &[JsValue]) -> Result<f64, EvalError> {
    match args.first() {
        None => Ok(0.0),
        Some(v) => to_number(realm, v),
    }
}

fn number_call(realm: &mut Realm, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    Ok(JsValue::Number(number_arg(realm, &args)?))
}

fn number_construct(realm: &mut Realm, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let n = number_arg(realm, &args)?;
    let proto = realm.intrinsics.number_prototype.clone();
    Ok(JsValue::Object(new_object(ObjectKind::Number(n), Some(proto))))
}

fn this_number(realm: &mut Realm, this: &JsValue, method: &str) -> Result<f64, EvalError> {
    let n = match this {
        JsValue::Number(n) => Some(*n),
        JsValue::Object(o) => match o.borrow().kind {
            ObjectKind::Number(n) => Some(n),
            _ => None,
        },
        _ => None,
    };
    n.ok_or_else(|| {
        realm.error(JErrorType::TypeError(format!(
            "Number.prototype.{} requires that 'this' be a Number, not {}",
            method,
            get_type(this)
        )))
    })
}

/// Formats a finite number in `radix`, with up to `MAX_FRACTION_DIGITS` fraction digits.
fn number_to_radix_string(n: f64, radix: u32) -> String {
    if !n.is_finite() || n == 0.0 {
        return number_to_string(n);
    }
    let radix_f = f64::from(radix);
    let mut integer = n.abs().trunc();
    let mut fraction = n.abs() - integer;
    let mut int_digits = vec![];
    while integer >= 1.0 {
        let d = (integer % radix_f) as usize;
        int_digits.push(DIGITS[d]);
        integer = (integer / radix_f).trunc();
    }
    if int_digits.is_empty() {
        int_digits.push(b'0');
    }
    int_digits.reverse();
    let mut out = String::from_utf8_lossy(&int_digits).into_owned();
    if fraction > 0.0 {
        out.push('.');
        let mut count = 0;
        while fraction > 0.0 && count < MAX_FRACTION_DIGITS {
            fraction *= radix_f;
            let d = fraction.trunc();
            out.push(DIGITS[d as usize] as char);
            fraction -= d;
            count += 1;
        }
    }
    if n < 0.0 {
        out.insert(0, '-');
    }
    out
}

fn number_to_string_method(realm: &mut Realm, this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let n = this_number(realm, &this, "toString")?;
    let radix = match arg(&args, 0) {
        JsValue::Undefined => 10.0,
        r => to_integer(realm, &r)?,
    };
    if !(2.0..=36.0).contains(&radix) {
        return Err(realm.error(JErrorType::RangeError(
            "toString() radix must be between 2 and 36".to_string(),
        )));
    }
    if radix == 10.0 {
        return Ok(JsValue::from(number_to_string(n)));
    }
    Ok(JsValue::from(number_to_radix_string(n, radix as u32)))
}

fn number_value_of(realm: &mut Realm, this: JsValue, _args: Vec<JsValue>) -> ValueResult {
    Ok(JsValue::Number(this_number(realm, &this, "valueOf")?))
}

fn boolean_call(_realm: &mut Realm, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    Ok(JsValue::Boolean(to_boolean(&arg(&args, 0))))
}

fn boolean_construct(realm: &mut Realm, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let b = to_boolean(&arg(&args, 0));
    let proto = realm.intrinsics.boolean_prototype.clone();
    Ok(JsValue::Object(new_object(ObjectKind::Boolean(b), Some(proto))))
}

fn this_boolean(realm: &mut Realm, this: &JsValue, method: &str) -> Result<bool, EvalError> {
    let b = match this {
        JsValue::Boolean(b) => Some(*b),
        JsValue::Object(o) => match o.borrow().kind {
            ObjectKind::Boolean(b) => Some(b),
            _ => None,
        },
        _ => None,
    };
    b.ok_or_else(|| {
        realm.error(JErrorType::TypeError(format!(
            "Boolean.prototype.{} requires that 'this' be a Boolean, not {}",
            method,
            get_type(this)
        )))
    })
}

fn boolean_to_string(realm: &mut Realm, this: JsValue, _args: Vec<JsValue>) -> ValueResult {
    let b = this_boolean(realm, &this, "toString")?;
    Ok(JsValue::from_str(if b { "true" } else { "false" }))
}

fn boolean_value_of(realm: &mut Realm, this: JsValue, _args: Vec<JsValue>) -> ValueResult {
    Ok(JsValue::Boolean(this_boolean(realm, &this, "valueOf")?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ds::realm::RealmConfig;

    #[test]
    fn test_radix_formatting() {
        assert_eq!(number_to_radix_string(255.0, 16), "ff");
        assert_eq!(number_to_radix_string(-5.0, 2), "-101");
        assert_eq!(number_to_radix_string(0.5, 2), "0.1");
        assert_eq!(number_to_radix_string(35.0, 36), "z");
    }

    #[test]
    fn test_to_string_rejects_bad_radix() {
        let mut realm = Realm::new(RealmConfig::default());
        let r = number_to_string_method(&mut realm, JsValue::Number(1.0), vec![JsValue::Number(1.0)]);
        assert!(r.is_err());
    }

    #[test]
    fn test_wrappers_unwrap() {
        let mut realm = Realm::new(RealmConfig::default());
        let n = number_construct(&mut realm, JsValue::Undefined, vec![JsValue::from_str("12")]).unwrap();
        assert_eq!(number_value_of(&mut realm, n, vec![]).unwrap(), JsValue::Number(12.0));
        let b = boolean_construct(&mut realm, JsValue::Undefined, vec![JsValue::Number(0.0)]).unwrap();
        assert_eq!(boolean_to_string(&mut realm, b, vec![]).unwrap(), JsValue::from_str("false"));
        assert!(boolean_value_of(&mut realm, JsValue::Number(1.0), vec![]).is_err());
    }
}
