use std::rc::Rc;

use crate::runner::ds::operations::type_conversion::{
    primitive_to_number, to_number, to_primitive, PreferredType,
};
use crate::runner::ds::realm::Realm;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::types::EvalError;

fn is_same_value(a: &JsValue, b: &JsValue, strict_mode: bool) -> bool {
    match (a, b) {
        (JsValue::Undefined, JsValue::Undefined) => true,
        (JsValue::Null, JsValue::Null) => true,
        (JsValue::Boolean(x), JsValue::Boolean(y)) => x == y,
        (JsValue::String(x), JsValue::String(y)) => x == y,
        (JsValue::Object(x), JsValue::Object(y)) => Rc::ptr_eq(x, y),
        (JsValue::Number(x), JsValue::Number(y)) => {
            if strict_mode {
                x == y
            } else if x.is_nan() && y.is_nan() {
                true
            } else {
                x == y && x.is_sign_negative() == y.is_sign_negative()
            }
        }
        _ => false,
    }
}

/// The SameValue algorithm: NaN equals NaN, and +0 differs from -0.
pub fn same_value(a: &JsValue, b: &JsValue) -> bool {
    is_same_value(a, b, false)
}

/// The `===` operator.
pub fn strict_equality_comparison(a: &JsValue, b: &JsValue) -> bool {
    is_same_value(a, b, true)
}

/// The `==` operator.
pub fn abstract_equality_comparison(
    realm: &mut Realm,
    a: &JsValue,
    b: &JsValue,
) -> Result<bool, EvalError> {
    match (a, b) {
        (JsValue::Undefined, JsValue::Null) | (JsValue::Null, JsValue::Undefined) => Ok(true),
        (JsValue::Number(_), JsValue::String(_)) | (JsValue::String(_), JsValue::Number(_)) => {
            Ok(primitive_to_number(a) == primitive_to_number(b))
        }
        (JsValue::Boolean(_), _) => {
            let x = JsValue::Number(primitive_to_number(a));
            abstract_equality_comparison(realm, &x, b)
        }
        (_, JsValue::Boolean(_)) => {
            let y = JsValue::Number(primitive_to_number(b));
            abstract_equality_comparison(realm, a, &y)
        }
        (JsValue::Number(_), JsValue::Object(_)) | (JsValue::String(_), JsValue::Object(_)) => {
            let y = to_primitive(realm, b, PreferredType::Default)?;
            abstract_equality_comparison(realm, a, &y)
        }
        (JsValue::Object(_), JsValue::Number(_)) | (JsValue::Object(_), JsValue::String(_)) => {
            let x = to_primitive(realm, a, PreferredType::Default)?;
            abstract_equality_comparison(realm, &x, b)
        }
        _ => Ok(is_same_value(a, b, true)),
    }
}

/// The abstract relational comparison `x < y`. `None` stands for undefined (a NaN operand).
/// `left_first` controls which operand is converted first.
pub fn abstract_relational_comparison(
    realm: &mut Realm,
    x: &JsValue,
    y: &JsValue,
    left_first: bool,
) -> Result<Option<bool>, EvalError> {
    let (px, py) = if left_first {
        let px = to_primitive(realm, x, PreferredType::Number)?;
        let py = to_primitive(realm, y, PreferredType::Number)?;
        (px, py)
    } else {
        let py = to_primitive(realm, y, PreferredType::Number)?;
        let px = to_primitive(realm, x, PreferredType::Number)?;
        (px, py)
    };
    if let (JsValue::String(a), JsValue::String(b)) = (&px, &py) {
        return Ok(Some(a.encode_utf16().lt(b.encode_utf16())));
    }
    let nx = to_number(realm, &px)?;
    let ny = to_number(realm, &py)?;
    if nx.is_nan() || ny.is_nan() {
        Ok(None)
    } else {
        Ok(Some(nx < ny))
    }
}
