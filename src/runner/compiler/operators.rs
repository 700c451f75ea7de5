//! Runtime halves of the operators. The compiler picks between the generic versions here and
//! the primitive-only fast paths depending on the static operand types.

use std::rc::Rc;

use crate::parser::ast::BinaryOperator;
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::function_object::has_instance;
use crate::runner::ds::object_property::PropertyKey;
use crate::runner::ds::operations::object::{has_property, is_callable};
use crate::runner::ds::operations::test_and_comparison::{
    abstract_equality_comparison, abstract_relational_comparison, strict_equality_comparison,
};
use crate::runner::ds::operations::type_conversion::{
    number_to_int32, number_to_uint32, primitive_to_number, primitive_to_string, to_number,
    to_primitive, to_property_key, PreferredType,
};
use crate::runner::ds::realm::Realm;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::types::{EvalError, ValueResult};

/// Numeric operators that convert both operands with `ToNumber` and produce a number.
pub fn numeric_operator(op: BinaryOperator) -> Option<fn(f64, f64) -> f64> {
    let f: fn(f64, f64) -> f64 = match op {
        BinaryOperator::Subtract => |a, b| a - b,
        BinaryOperator::Multiply => |a, b| a * b,
        BinaryOperator::Divide => |a, b| a / b,
        BinaryOperator::Modulo => |a, b| a % b,
        BinaryOperator::BitwiseLeftShift => {
            |a, b| f64::from(number_to_int32(a).wrapping_shl(number_to_uint32(b) & 0x1f))
        }
        BinaryOperator::BitwiseRightShift => {
            |a, b| f64::from(number_to_int32(a).wrapping_shr(number_to_uint32(b) & 0x1f))
        }
        BinaryOperator::BitwiseUnsignedRightShift => {
            |a, b| f64::from(number_to_uint32(a).wrapping_shr(number_to_uint32(b) & 0x1f))
        }
        BinaryOperator::BitwiseAnd => |a, b| f64::from(number_to_int32(a) & number_to_int32(b)),
        BinaryOperator::BitwiseOr => |a, b| f64::from(number_to_int32(a) | number_to_int32(b)),
        BinaryOperator::BitwiseXor => |a, b| f64::from(number_to_int32(a) ^ number_to_int32(b)),
        _ => return None,
    };
    Some(f)
}

pub fn apply_numeric(
    realm: &mut Realm,
    op: fn(f64, f64) -> f64,
    a: &JsValue,
    b: &JsValue,
) -> ValueResult {
    let x = to_number(realm, a)?;
    let y = to_number(realm, b)?;
    Ok(JsValue::Number(op(x, y)))
}

/// `+` once both operands are primitive.
pub fn add_primitives(a: &JsValue, b: &JsValue) -> JsValue {
    match (a, b) {
        (JsValue::Number(x), JsValue::Number(y)) => JsValue::Number(x + y),
        (JsValue::String(_), _) | (_, JsValue::String(_)) => concat(a, b),
        _ => JsValue::Number(primitive_to_number(a) + primitive_to_number(b)),
    }
}

pub fn concat(a: &JsValue, b: &JsValue) -> JsValue {
    let left = primitive_to_string(a);
    let right = primitive_to_string(b);
    let mut s = String::with_capacity(left.len() + right.len());
    s.push_str(&left);
    s.push_str(&right);
    JsValue::String(Rc::from(s))
}

/// The generic `+`.
pub fn add(realm: &mut Realm, a: &JsValue, b: &JsValue) -> ValueResult {
    let pa = to_primitive(realm, a, PreferredType::Default)?;
    let pb = to_primitive(realm, b, PreferredType::Default)?;
    Ok(add_primitives(&pa, &pb))
}

/// `<`, `>`, `<=` and `>=`.
pub fn relational(realm: &mut Realm, op: BinaryOperator, a: &JsValue, b: &JsValue) -> ValueResult {
    let result = match op {
        BinaryOperator::LessThan => abstract_relational_comparison(realm, a, b, true)?
            .unwrap_or(false),
        BinaryOperator::GreaterThan => abstract_relational_comparison(realm, b, a, false)?
            .unwrap_or(false),
        BinaryOperator::LessThanEqual => {
            abstract_relational_comparison(realm, b, a, false)? == Some(false)
        }
        _ => abstract_relational_comparison(realm, a, b, true)? == Some(false),
    };
    Ok(JsValue::Boolean(result))
}

pub fn relational_numbers(op: BinaryOperator, x: f64, y: f64) -> bool {
    match op {
        BinaryOperator::LessThan => x < y,
        BinaryOperator::GreaterThan => x > y,
        BinaryOperator::LessThanEqual => x <= y,
        _ => x >= y,
    }
}

pub fn equality(realm: &mut Realm, op: BinaryOperator, a: &JsValue, b: &JsValue) -> ValueResult {
    let result = match op {
        BinaryOperator::StrictlyEqual => strict_equality_comparison(a, b),
        BinaryOperator::StrictlyUnequal => !strict_equality_comparison(a, b),
        BinaryOperator::LooselyEqual => abstract_equality_comparison(realm, a, b)?,
        _ => !abstract_equality_comparison(realm, a, b)?,
    };
    Ok(JsValue::Boolean(result))
}

/// The `in` operator.
pub fn has_property_in(realm: &mut Realm, key: &JsValue, target: &JsValue) -> ValueResult {
    let o = match target {
        JsValue::Object(o) => o.clone(),
        _ => {
            return Err(realm.error(JErrorType::TypeError(format!(
                "Cannot use 'in' operator to search for '{}' in {}",
                key, target
            ))))
        }
    };
    let key = to_property_key(realm, key)?;
    Ok(JsValue::Boolean(has_property(&o, &key)))
}

/// The `instanceof` operator.
pub fn instance_of(realm: &mut Realm, v: &JsValue, target: &JsValue) -> ValueResult {
    match target {
        JsValue::Object(f) if is_callable(target) => {
            Ok(JsValue::Boolean(has_instance(realm, f, v)?))
        }
        _ => Err(realm.error(JErrorType::TypeError(
            "Right-hand side of 'instanceof' is not callable".to_string(),
        ))),
    }
}

/// Any binary operator on already evaluated operands, without static knowledge.
pub fn binary(realm: &mut Realm, op: BinaryOperator, a: &JsValue, b: &JsValue) -> ValueResult {
    if let Some(f) = numeric_operator(op) {
        return apply_numeric(realm, f, a, b);
    }
    match op {
        BinaryOperator::Add => add(realm, a, b),
        BinaryOperator::LessThan
        | BinaryOperator::GreaterThan
        | BinaryOperator::LessThanEqual
        | BinaryOperator::GreaterThanEqual => relational(realm, op, a, b),
        BinaryOperator::In => has_property_in(realm, a, b),
        BinaryOperator::InstanceOf => instance_of(realm, a, b),
        _ => equality(realm, op, a, b),
    }
}

/// Property key of a value known while compiling.
pub fn constant_key(v: &JsValue) -> Option<PropertyKey> {
    match v {
        JsValue::Object(_) => None,
        _ => Some(PropertyKey::from_js_string(&primitive_to_string(v))),
    }
}

pub fn ensure_callable(realm: &mut Realm, f: &JsValue, description: &str) -> Result<(), EvalError> {
    if is_callable(f) {
        Ok(())
    } else {
        Err(realm.error(JErrorType::TypeError(format!(
            "{} is not a function",
            description
        ))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ds::realm::RealmConfig;

    #[test]
    fn test_shift_operators_mask_the_count() {
        let shl = numeric_operator(BinaryOperator::BitwiseLeftShift).unwrap();
        assert_eq!(shl(1.0, 33.0), 2.0);
        let ushr = numeric_operator(BinaryOperator::BitwiseUnsignedRightShift).unwrap();
        assert_eq!(ushr(-1.0, 0.0), 4294967295.0);
        let shr = numeric_operator(BinaryOperator::BitwiseRightShift).unwrap();
        assert_eq!(shr(-8.0, 1.0), -4.0);
    }

    #[test]
    fn test_add_prefers_strings() {
        assert_eq!(
            add_primitives(&JsValue::Number(1.0), &JsValue::from_str("2")),
            JsValue::from_str("12")
        );
        assert_eq!(
            add_primitives(&JsValue::Boolean(true), &JsValue::Null),
            JsValue::Number(1.0)
        );
    }

    #[test]
    fn test_relational_with_nan_is_false_both_ways() {
        let mut realm = Realm::new(RealmConfig::default());
        let nan = JsValue::Number(f64::NAN);
        let one = JsValue::Number(1.0);
        for op in &[
            BinaryOperator::LessThan,
            BinaryOperator::GreaterThan,
            BinaryOperator::LessThanEqual,
            BinaryOperator::GreaterThanEqual,
        ] {
            assert_eq!(
                relational(&mut realm, *op, &nan, &one).unwrap(),
                JsValue::Boolean(false)
            );
        }
    }

    #[test]
    fn test_in_requires_object() {
        let mut realm = Realm::new(RealmConfig::default());
        assert!(has_property_in(&mut realm, &JsValue::from_str("a"), &JsValue::Number(1.0)).is_err());
    }
}
