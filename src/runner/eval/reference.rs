//! The generic reference protocol. Generated code only falls back to it for references whose
//! base cannot be pinned down at compile time.

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object_property::PropertyKey;
use crate::runner::ds::operations::object::{delete, get_v, put, put_v};
use crate::runner::ds::operations::type_conversion::to_object;
use crate::runner::ds::realm::Realm;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::types::{EvalError, Reference, ReferenceBase, ValueResult};

fn not_defined(realm: &mut Realm, reference: &Reference) -> EvalError {
    realm.error(JErrorType::ReferenceError(format!(
        "{} is not defined",
        reference.referenced_name
    )))
}

/// GetValue.
pub fn get_value(realm: &mut Realm, reference: &Reference) -> ValueResult {
    match &reference.base {
        ReferenceBase::Unresolvable => Err(not_defined(realm, reference)),
        ReferenceBase::Value(base) => {
            let key = PropertyKey::from_js_string(&reference.referenced_name);
            get_v(realm, base, &key)
        }
        ReferenceBase::Environment(env) => env.inner.as_env_record().get_binding_value(
            realm,
            &reference.referenced_name,
            reference.strict,
        ),
    }
}

/// PutValue. Unresolvable names become global properties outside strict code.
pub fn put_value(realm: &mut Realm, reference: &Reference, value: JsValue) -> Result<(), EvalError> {
    match &reference.base {
        ReferenceBase::Unresolvable => {
            if reference.strict {
                return Err(not_defined(realm, reference));
            }
            let global = realm.global_object.clone();
            let key = PropertyKey::from_js_string(&reference.referenced_name);
            put(realm, &global, &key, value, false)
        }
        ReferenceBase::Value(base) => {
            let key = PropertyKey::from_js_string(&reference.referenced_name);
            put_v(realm, base, &key, value, reference.strict)
        }
        ReferenceBase::Environment(env) => env.inner.as_env_record().set_mutable_binding(
            realm,
            &reference.referenced_name,
            value,
            reference.strict,
        ),
    }
}

/// The `delete` operator applied to a reference.
pub fn delete_reference(realm: &mut Realm, reference: &Reference) -> Result<bool, EvalError> {
    match &reference.base {
        ReferenceBase::Unresolvable => {
            if reference.strict {
                Err(realm.error(JErrorType::SyntaxError(
                    "Delete of an unqualified identifier in strict mode".to_string(),
                )))
            } else {
                Ok(true)
            }
        }
        ReferenceBase::Value(base) => {
            let o = to_object(realm, base)?;
            let key = PropertyKey::from_js_string(&reference.referenced_name);
            delete(realm, &o, &key, reference.strict)
        }
        ReferenceBase::Environment(env) => {
            if reference.strict {
                return Err(realm.error(JErrorType::SyntaxError(
                    "Delete of an unqualified identifier in strict mode".to_string(),
                )));
            }
            env.inner
                .as_env_record()
                .delete_binding(realm, &reference.referenced_name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ds::operations::lex_env::get_identifier_reference;
    use crate::runner::ds::realm::RealmConfig;
    use std::rc::Rc;

    #[test]
    fn test_unresolvable_put_creates_global() {
        let mut realm = Realm::new(RealmConfig::default());
        let env = realm.global_env.clone();
        let r = get_identifier_reference(&env, Rc::from("fresh"), false);
        assert!(r.is_unresolvable());
        assert!(get_value(&mut realm, &r).is_err());
        put_value(&mut realm, &r, JsValue::Number(5.0)).unwrap();
        let r = get_identifier_reference(&env, Rc::from("fresh"), false);
        assert_eq!(get_value(&mut realm, &r).unwrap(), JsValue::Number(5.0));
        assert!(delete_reference(&mut realm, &r).unwrap());
    }

    #[test]
    fn test_strict_unresolvable_put_throws() {
        let mut realm = Realm::new(RealmConfig::default());
        let env = realm.global_env.clone();
        let r = get_identifier_reference(&env, Rc::from("nope"), true);
        assert!(put_value(&mut realm, &r, JsValue::Null).is_err());
    }

    #[test]
    fn test_primitive_base_reads_through_prototype() {
        let mut realm = Realm::new(RealmConfig::default());
        let r = Reference::property(JsValue::from_str("abc"), Rc::from("length"), true);
        assert_eq!(get_value(&mut realm, &r).unwrap(), JsValue::Number(3.0));
        assert!(put_value(&mut realm, &r, JsValue::Number(1.0)).is_err());
    }
}
