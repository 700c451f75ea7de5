//! Array built-in.
//!
//! The prototype methods are generic: they work on any object with a `length`, going through
//! `[[Get]]` and `[[Put]]` rather than touching array storage directly.

use crate::runner::ds::array_object::create_array;
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::JsObjectType;
use crate::runner::ds::object_property::PropertyKey;
use crate::runner::ds::operations::object::{delete, get, has_property, invoke, put};
use crate::runner::ds::operations::test_and_comparison::strict_equality_comparison;
use crate::runner::ds::operations::type_conversion::{to_integer, to_object, to_string, to_uint32};
use crate::runner::ds::realm::Realm;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::types::{EvalError, ValueResult};
use crate::runner::plugin::types::{arg, BuiltInObject};

const LENGTH: &str = "length";

pub fn register(realm: &mut Realm) {
    BuiltInObject::new("Array")
        .with_prototype(realm.intrinsics.array_prototype.clone())
        .with_constructor(1, array_constructor, Some(array_constructor))
        .add_static("isArray", 1, array_is_array)
        .add_method("push", 1, array_push)
        .add_method("pop", 0, array_pop)
        .add_method("join", 1, array_join)
        .add_method("toString", 0, array_to_string)
        .add_method("slice", 2, array_slice)
        .add_method("indexOf", 1, array_index_of)
        .install(realm);
}

/// Resolves a possibly negative relative position against `len`, clamped to `0..=len`.
pub(super) fn relative_index(relative: f64, len: f64) -> f64 {
    if relative < 0.0 {
        (len + relative).max(0.0)
    } else {
        relative.min(len)
    }
}

fn length_of(realm: &mut Realm, o: &JsObjectType) -> Result<u32, EvalError> {
    let len = get(realm, o, &PropertyKey::from_str(LENGTH))?;
    to_uint32(realm, &len)
}

fn set_length(realm: &mut Realm, o: &JsObjectType, len: f64) -> Result<(), EvalError> {
    put(realm, o, &PropertyKey::from_str(LENGTH), JsValue::Number(len), true)
}

fn array_constructor(realm: &mut Realm, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    if let [JsValue::Number(n)] = args.as_slice() {
        let len = *n as u32;
        if f64::from(len) != *n {
            return Err(realm.error(JErrorType::RangeError("Invalid array length".to_string())));
        }
        let a = create_array(realm, vec![]);
        set_length(realm, &a, *n)?;
        return Ok(JsValue::Object(a));
    }
    Ok(JsValue::Object(create_array(realm, args)))
}

fn array_is_array(_realm: &mut Realm, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let is_array = match arg(&args, 0) {
        JsValue::Object(o) => o.borrow().is_array(),
        _ => false,
    };
    Ok(JsValue::Boolean(is_array))
}

fn array_push(realm: &mut Realm, this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let o = to_object(realm, &this)?;
    let mut n = f64::from(length_of(realm, &o)?);
    for v in args {
        put(realm, &o, &PropertyKey::from_str(&n.to_string()), v, true)?;
        n += 1.0;
    }
    set_length(realm, &o, n)?;
    Ok(JsValue::Number(n))
}

fn array_pop(realm: &mut Realm, this: JsValue, _args: Vec<JsValue>) -> ValueResult {
    let o = to_object(realm, &this)?;
    let len = length_of(realm, &o)?;
    if len == 0 {
        set_length(realm, &o, 0.0)?;
        return Ok(JsValue::Undefined);
    }
    let key = PropertyKey::from_index(len - 1);
    let element = get(realm, &o, &key)?;
    delete(realm, &o, &key, true)?;
    set_length(realm, &o, f64::from(len - 1))?;
    Ok(element)
}

fn array_join(realm: &mut Realm, this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let o = to_object(realm, &this)?;
    let len = length_of(realm, &o)?;
    let separator = match arg(&args, 0) {
        JsValue::Undefined => ",".to_string(),
        sep => to_string(realm, &sep)?.to_string(),
    };
    let mut parts = Vec::with_capacity(len as usize);
    for i in 0..len {
        match get(realm, &o, &PropertyKey::from_index(i))? {
            JsValue::Undefined | JsValue::Null => parts.push(String::new()),
            v => parts.push(to_string(realm, &v)?.to_string()),
        }
    }
    Ok(JsValue::from(parts.join(&separator)))
}

fn array_to_string(realm: &mut Realm, this: JsValue, _args: Vec<JsValue>) -> ValueResult {
    let o = to_object(realm, &this)?;
    invoke(realm, &o, "join", vec![])
}

fn array_slice(realm: &mut Realm, this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let o = to_object(realm, &this)?;
    let len = f64::from(length_of(realm, &o)?);
    let start = relative_index(to_integer(realm, &arg(&args, 0))?, len);
    let end = match arg(&args, 1) {
        JsValue::Undefined => len,
        e => relative_index(to_integer(realm, &e)?, len),
    };
    let result = create_array(realm, vec![]);
    let mut n = 0u32;
    let mut k = start as u32;
    while f64::from(k) < end {
        let key = PropertyKey::from_index(k);
        if has_property(&o, &key) {
            let v = get(realm, &o, &key)?;
            put(realm, &result, &PropertyKey::from_index(n), v, true)?;
        }
        k += 1;
        n += 1;
    }
    set_length(realm, &result, f64::from(n))?;
    Ok(JsValue::Object(result))
}

fn array_index_of(realm: &mut Realm, this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let o = to_object(realm, &this)?;
    let len = length_of(realm, &o)?;
    if len == 0 {
        return Ok(JsValue::Number(-1.0));
    }
    let search = arg(&args, 0);
    let from = match arg(&args, 1) {
        JsValue::Undefined => 0.0,
        f => to_integer(realm, &f)?,
    };
    if from >= f64::from(len) {
        return Ok(JsValue::Number(-1.0));
    }
    let start = relative_index(from, f64::from(len)) as u32;
    for k in start..len {
        let key = PropertyKey::from_index(k);
        if has_property(&o, &key) {
            let v = get(realm, &o, &key)?;
            if strict_equality_comparison(&search, &v) {
                return Ok(JsValue::Number(f64::from(k)));
            }
        }
    }
    Ok(JsValue::Number(-1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ds::array_object::array_length;
    use crate::runner::ds::realm::RealmConfig;

    fn numbers(realm: &Realm, values: &[f64]) -> JsValue {
        JsValue::Object(create_array(
            realm,
            values.iter().map(|n| JsValue::Number(*n)).collect(),
        ))
    }

    #[test]
    fn test_relative_index() {
        assert_eq!(relative_index(-1.0, 5.0), 4.0);
        assert_eq!(relative_index(-9.0, 5.0), 0.0);
        assert_eq!(relative_index(9.0, 5.0), 5.0);
    }

    #[test]
    fn test_push_and_pop() {
        let mut realm = Realm::new(RealmConfig::default());
        let a = numbers(&realm, &[1.0]);
        let n = array_push(&mut realm, a.clone(), vec![JsValue::Number(2.0)]).unwrap();
        assert_eq!(n, JsValue::Number(2.0));
        assert_eq!(array_pop(&mut realm, a.clone(), vec![]).unwrap(), JsValue::Number(2.0));
        assert_eq!(array_length(a.as_object().unwrap()), 1);
    }

    #[test]
    fn test_join_skips_nullish() {
        let mut realm = Realm::new(RealmConfig::default());
        let a = JsValue::Object(create_array(
            &realm,
            vec![JsValue::Number(1.0), JsValue::Null, JsValue::from_str("x")],
        ));
        let v = array_join(&mut realm, a, vec![JsValue::from_str("-")]).unwrap();
        assert_eq!(v, JsValue::from_str("1--x"));
    }

    #[test]
    fn test_slice_and_index_of() {
        let mut realm = Realm::new(RealmConfig::default());
        let a = numbers(&realm, &[1.0, 2.0, 3.0, 4.0]);
        let s = array_slice(&mut realm, a.clone(), vec![JsValue::Number(-3.0), JsValue::Number(3.0)])
            .unwrap();
        assert_eq!(array_length(s.as_object().unwrap()), 2);
        let i = array_index_of(&mut realm, s, vec![JsValue::Number(3.0)]).unwrap();
        assert_eq!(i, JsValue::Number(1.0));
        let i = array_index_of(&mut realm, a, vec![JsValue::Number(9.0)]).unwrap();
        assert_eq!(i, JsValue::Number(-1.0));
    }

    #[test]
    fn test_constructor_with_length() {
        let mut realm = Realm::new(RealmConfig::default());
        let a = array_constructor(&mut realm, JsValue::Undefined, vec![JsValue::Number(3.0)]).unwrap();
        assert_eq!(array_length(a.as_object().unwrap()), 3);
        assert!(array_constructor(&mut realm, JsValue::Undefined, vec![JsValue::Number(1.5)]).is_err());
    }
}
