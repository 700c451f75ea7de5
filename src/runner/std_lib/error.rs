//! Error built-ins.
//!
//! `Error` and the six native error constructors. Error objects carry the stack captured when
//! they were created; `Error.prototype.stack` renders it below the `toString` line.

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::function_object::create_builtin_function;
use crate::runner::ds::object::{JsObjectType, ObjectKind};
use crate::runner::ds::object_property::PropertyKey;
use crate::runner::ds::operations::object::{
    define_accessor, define_final, define_free, define_property, get,
};
use crate::runner::ds::operations::type_conversion::{get_type, to_string};
use crate::runner::ds::realm::Realm;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::types::{EvalError, ValueResult};
use crate::runner::plugin::types::{arg, NativeFn};

pub fn register(realm: &mut Realm) {
    let function_prototype = realm.intrinsics.function_prototype.clone();
    let error_prototype = realm.intrinsics.error_prototype.clone();
    let error_constructor = realm.intrinsics.error_constructor.clone();
    link_constructor(realm, &error_constructor, &error_prototype, "Error");
    define_free(
        &error_constructor,
        "stackTraceLimit",
        JsValue::Number(realm.config.stack_trace_limit as f64),
    );
    define_property(
        &error_prototype,
        "toString",
        JsValue::Object(create_builtin_function(
            &function_prototype,
            "toString",
            0,
            error_to_string,
            None,
        )),
    );
    let stack_getter = create_builtin_function(&function_prototype, "stack", 0, error_stack, None);
    define_accessor(&error_prototype, "stack", Some(stack_getter), None);

    let native: [(&'static str, NativeFn, JsObjectType); 6] = [
        ("TypeError", type_error, realm.intrinsics.type_error_prototype.clone()),
        ("ReferenceError", reference_error, realm.intrinsics.reference_error_prototype.clone()),
        ("RangeError", range_error, realm.intrinsics.range_error_prototype.clone()),
        ("SyntaxError", syntax_error, realm.intrinsics.syntax_error_prototype.clone()),
        ("EvalError", eval_error, realm.intrinsics.eval_error_prototype.clone()),
        ("URIError", uri_error, realm.intrinsics.uri_error_prototype.clone()),
    ];
    for (name, f, proto) in native.iter() {
        let ctor = create_builtin_function(&function_prototype, name, 1, *f, Some(*f));
        link_constructor(realm, &ctor, proto, name);
    }
}

/// Wires `ctor.prototype`, `prototype.constructor`, `name` and `message`, then binds the
/// constructor globally.
fn link_constructor(realm: &Realm, ctor: &JsObjectType, proto: &JsObjectType, name: &str) {
    define_final(ctor, "prototype", JsValue::Object(proto.clone()));
    define_property(proto, "constructor", JsValue::Object(ctor.clone()));
    define_property(proto, "name", JsValue::from_str(name));
    define_property(proto, "message", JsValue::from_str(""));
    define_property(&realm.global_object, name, JsValue::Object(ctor.clone()));
}

fn new_error(realm: &mut Realm, proto: JsObjectType, args: &[JsValue]) -> ValueResult {
    let message = match arg(args, 0) {
        JsValue::Undefined => None,
        m => Some(JsValue::String(to_string(realm, &m)?)),
    };
    Ok(JsValue::Object(realm.new_error_with_prototype(proto, message)))
}

pub fn error_call(realm: &mut Realm, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let proto = realm.intrinsics.error_prototype.clone();
    new_error(realm, proto, &args)
}

pub fn error_construct(realm: &mut Realm, this: JsValue, args: Vec<JsValue>) -> ValueResult {
    error_call(realm, this, args)
}

macro_rules! native_error {
    ($name:ident, $proto:ident) => {
        fn $name(realm: &mut Realm, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
            let proto = realm.intrinsics.$proto.clone();
            new_error(realm, proto, &args)
        }
    };
}

native_error!(type_error, type_error_prototype);
native_error!(reference_error, reference_error_prototype);
native_error!(range_error, range_error_prototype);
native_error!(syntax_error, syntax_error_prototype);
native_error!(eval_error, eval_error_prototype);
native_error!(uri_error, uri_error_prototype);

fn this_object(realm: &mut Realm, this: &JsValue, method: &str) -> Result<JsObjectType, EvalError> {
    match this {
        JsValue::Object(o) => Ok(o.clone()),
        other => Err(realm.error(JErrorType::TypeError(format!(
            "Error.prototype.{} called on non-object ({})",
            method,
            get_type(other)
        )))),
    }
}

/// `name: message`, dropping whichever part is empty.
pub fn error_summary(realm: &mut Realm, o: &JsObjectType) -> Result<String, EvalError> {
    let name = match get(realm, o, &PropertyKey::from_str("name"))? {
        JsValue::Undefined => "Error".to_string(),
        n => to_string(realm, &n)?.to_string(),
    };
    let message = match get(realm, o, &PropertyKey::from_str("message"))? {
        JsValue::Undefined => String::new(),
        m => to_string(realm, &m)?.to_string(),
    };
    Ok(match (name.is_empty(), message.is_empty()) {
        (true, _) => message,
        (_, true) => name,
        _ => format!("{}: {}", name, message),
    })
}

fn error_to_string(realm: &mut Realm, this: JsValue, _args: Vec<JsValue>) -> ValueResult {
    let o = this_object(realm, &this, "toString")?;
    Ok(JsValue::from(error_summary(realm, &o)?))
}

fn error_stack(realm: &mut Realm, this: JsValue, _args: Vec<JsValue>) -> ValueResult {
    let o = this_object(realm, &this, "stack")?;
    let mut text = error_summary(realm, &o)?;
    if let ObjectKind::Error(frames) = &o.borrow().kind {
        for frame in frames {
            text.push('\n');
            text.push_str(&frame.format());
        }
    }
    Ok(JsValue::from(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ds::realm::RealmConfig;

    #[test]
    fn test_summary_drops_empty_parts() {
        let mut realm = Realm::new(RealmConfig::default());
        let e = realm.create_error_object(&JErrorType::TypeError("boom".to_string()));
        assert_eq!(error_summary(&mut realm, &e).unwrap(), "TypeError: boom");
        let e = realm.create_error_object(&JErrorType::RangeError(String::new()));
        assert_eq!(error_summary(&mut realm, &e).unwrap(), "RangeError");
        define_property(&e, "name", JsValue::from_str(""));
        define_property(&e, "message", JsValue::from_str("only"));
        assert_eq!(error_summary(&mut realm, &e).unwrap(), "only");
    }

    #[test]
    fn test_native_constructor_uses_its_prototype() {
        let mut realm = Realm::new(RealmConfig::default());
        let v = type_error(&mut realm, JsValue::Undefined, vec![JsValue::from_str("x")]).unwrap();
        let proto = v.as_object().unwrap().borrow().get_prototype_of().unwrap();
        assert!(std::rc::Rc::ptr_eq(&proto, &realm.intrinsics.type_error_prototype));
    }

    #[test]
    fn test_stack_starts_with_summary() {
        let mut realm = Realm::new(RealmConfig::default());
        let e = error_call(&mut realm, JsValue::Undefined, vec![JsValue::from_str("m")]).unwrap();
        let stack = error_stack(&mut realm, e, vec![]).unwrap();
        assert_eq!(stack, JsValue::from_str("Error: m"));
    }
}
