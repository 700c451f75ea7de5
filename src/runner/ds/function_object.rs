use std::rc::Rc;

use tracing::warn;

use crate::parser::ast::Code;
use crate::runner::compiler::function::call_script_function;
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::execution_context::ExecutionContext;
use crate::runner::ds::lex_env::JsLexEnvironmentType;
use crate::runner::ds::object::{new_object, JsObjectType, ObjectKind};
use crate::runner::ds::object_property::PropertyKey;
use crate::runner::ds::operations::object::{
    define_accessor, define_final, define_property, define_writable, get, is_callable,
};
use crate::runner::ds::operations::type_conversion::get_type;
use crate::runner::ds::realm::Realm;
use crate::runner::ds::value::{JsString, JsValue};
use crate::runner::eval::types::{EvalError, ValueResult};
use crate::runner::plugin::types::NativeFn;

/// The callable part of a function object.
pub enum FunctionKind {
    /// Function declared in script. Compiled lazily on first call.
    Script {
        code: Rc<Code>,
        scope: JsLexEnvironmentType,
    },
    /// Function implemented in Rust.
    Builtin {
        name: &'static str,
        call: NativeFn,
        construct: Option<NativeFn>,
    },
    /// Result of `Function.prototype.bind`.
    Bound {
        target: JsObjectType,
        this: JsValue,
        args: Vec<JsValue>,
    },
    /// Host callback, looked up by name in the realm's registry on every call.
    Custom(JsString),
}
impl FunctionKind {
    pub fn is_strict(&self) -> bool {
        match self {
            FunctionKind::Script { code, .. } => code.strict,
            _ => false,
        }
    }

    pub fn name(&self) -> Option<String> {
        match self {
            FunctionKind::Script { code, .. } => code.name.as_ref().map(|n| n.to_string()),
            FunctionKind::Builtin { name, .. } => Some((*name).to_string()),
            FunctionKind::Bound { .. } => Some("bound".to_string()),
            FunctionKind::Custom(name) => Some(name.to_string()),
        }
    }

    /// Environment captured by a script function.
    pub fn scope(&self) -> Option<JsLexEnvironmentType> {
        match self {
            FunctionKind::Script { scope, .. } => Some(scope.clone()),
            _ => None,
        }
    }

    pub fn references(&self) -> Vec<JsValue> {
        match self {
            FunctionKind::Bound { target, this, args } => {
                let mut refs = vec![JsValue::Object(target.clone()), this.clone()];
                refs.extend(args.iter().cloned());
                refs
            }
            _ => vec![],
        }
    }
}

pub fn is_strict_function(v: &JsValue) -> bool {
    match v {
        JsValue::Object(o) => match &o.borrow().kind {
            ObjectKind::Function(f) => f.is_strict(),
            _ => false,
        },
        _ => false,
    }
}

pub fn function_name(f: &JsObjectType) -> Option<String> {
    match &f.borrow().kind {
        ObjectKind::Function(k) => k.name(),
        _ => None,
    }
}

fn add_poison_pills(realm: &Realm, f: &JsObjectType) {
    let thrower = realm.intrinsics.throw_type_error.clone();
    define_accessor(f, "caller", Some(thrower.clone()), Some(thrower.clone()));
    define_accessor(f, "arguments", Some(thrower.clone()), Some(thrower));
}

/// Instantiates a function object for `code` closing over `scope`, with a fresh `prototype`
/// object whose `constructor` points back at it.
pub fn create_script_function(
    realm: &Realm,
    code: Rc<Code>,
    scope: JsLexEnvironmentType,
) -> JsObjectType {
    let length = code.params.len();
    let strict = code.strict;
    let f = new_object(
        ObjectKind::Function(FunctionKind::Script { code, scope }),
        Some(realm.intrinsics.function_prototype.clone()),
    );
    define_final(&f, "length", JsValue::Number(length as f64));
    let proto = realm.new_plain_object();
    define_property(&proto, "constructor", JsValue::Object(f.clone()));
    define_writable(&f, "prototype", JsValue::Object(proto));
    if strict {
        add_poison_pills(realm, &f);
    }
    f
}

pub fn create_builtin_function(
    function_prototype: &JsObjectType,
    name: &'static str,
    length: u32,
    call: NativeFn,
    construct: Option<NativeFn>,
) -> JsObjectType {
    let f = new_object(
        ObjectKind::Function(FunctionKind::Builtin {
            name,
            call,
            construct,
        }),
        Some(function_prototype.clone()),
    );
    define_final(&f, "length", JsValue::Number(f64::from(length)));
    f
}

pub fn create_bound_function(
    realm: &mut Realm,
    target: JsObjectType,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsObjectType, EvalError> {
    let target_length = match get(realm, &target, &PropertyKey::from_str("length"))? {
        JsValue::Number(n) => n,
        _ => 0.0,
    };
    let length = (target_length - args.len() as f64).max(0.0);
    let f = new_object(
        ObjectKind::Function(FunctionKind::Bound { target, this, args }),
        Some(realm.intrinsics.function_prototype.clone()),
    );
    define_final(&f, "length", JsValue::Number(length));
    add_poison_pills(realm, &f);
    Ok(f)
}

pub fn create_custom_function(realm: &Realm, name: JsString) -> JsObjectType {
    let f = new_object(
        ObjectKind::Function(FunctionKind::Custom(name)),
        Some(realm.intrinsics.function_prototype.clone()),
    );
    define_final(&f, "length", JsValue::Number(0.0));
    f
}

enum Callee {
    Script,
    Native(NativeFn),
    Bound(JsObjectType, JsValue, Vec<JsValue>),
    Custom(JsString),
    NotConstructor,
}

fn callee_of(f: &JsObjectType) -> Option<Callee> {
    match &f.borrow().kind {
        ObjectKind::Function(FunctionKind::Script { .. }) => Some(Callee::Script),
        ObjectKind::Function(FunctionKind::Builtin { call, .. }) => Some(Callee::Native(*call)),
        ObjectKind::Function(FunctionKind::Bound { target, this, args }) => Some(Callee::Bound(
            target.clone(),
            this.clone(),
            args.clone(),
        )),
        ObjectKind::Function(FunctionKind::Custom(name)) => Some(Callee::Custom(name.clone())),
        _ => None,
    }
}

fn not_a_function(realm: &mut Realm, f: &JsValue) -> EvalError {
    realm.error(JErrorType::TypeError(format!(
        "{} is not a function",
        get_type(f)
    )))
}

/// Runs native code inside its own execution context so it counts towards the depth limit and
/// shows up in stack traces.
fn run_native(
    realm: &mut Realm,
    f: &JsObjectType,
    body: impl FnOnce(&mut Realm) -> ValueResult,
) -> ValueResult {
    realm.save_execution_context(ExecutionContext {
        function: Some(f.clone()),
        code: None,
        position: 0,
    })?;
    let result = body(realm);
    realm.exit_execution_context();
    result
}

/// `[[Call]]`.
pub fn call(realm: &mut Realm, f: &JsValue, this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let fobj = match f {
        JsValue::Object(o) => o,
        _ => return Err(not_a_function(realm, f)),
    };
    match callee_of(fobj) {
        None | Some(Callee::NotConstructor) => Err(not_a_function(realm, f)),
        Some(Callee::Script) => call_script_function(realm, fobj, this, args),
        Some(Callee::Native(native)) => run_native(realm, fobj, |realm| native(realm, this, args)),
        Some(Callee::Bound(target, bound_this, mut bound_args)) => {
            bound_args.extend(args);
            call(realm, &JsValue::Object(target), bound_this, bound_args)
        }
        Some(Callee::Custom(name)) => match realm.custom_functions.get(&name) {
            Some(host) => run_native(realm, fobj, |realm| host.call(realm, this, args)),
            None => {
                warn!(function = %name, "call to unregistered custom function");
                Ok(JsValue::Undefined)
            }
        },
    }
}

/// `[[Construct]]`.
pub fn construct(realm: &mut Realm, f: &JsValue, args: Vec<JsValue>) -> ValueResult {
    let fobj = match f {
        JsValue::Object(o) if is_callable(f) => o.clone(),
        _ => {
            return Err(realm.error(JErrorType::TypeError(format!(
                "{} is not a constructor",
                get_type(f)
            ))))
        }
    };
    let callee = match &fobj.borrow().kind {
        ObjectKind::Function(FunctionKind::Builtin { construct, .. }) => match construct {
            Some(native) => Callee::Native(*native),
            None => Callee::NotConstructor,
        },
        ObjectKind::Function(FunctionKind::Bound { target, this, args }) => {
            Callee::Bound(target.clone(), this.clone(), args.clone())
        }
        ObjectKind::Function(FunctionKind::Custom(_)) => Callee::NotConstructor,
        _ => Callee::Script,
    };
    match callee {
        Callee::Native(native) => {
            run_native(realm, &fobj, |realm| native(realm, JsValue::Undefined, args))
        }
        Callee::Custom(_) | Callee::NotConstructor => Err(realm.error(JErrorType::TypeError(
            "function is not a constructor".to_string(),
        ))),
        Callee::Bound(target, _, mut bound_args) => {
            bound_args.extend(args);
            construct(realm, &JsValue::Object(target), bound_args)
        }
        Callee::Script => {
            let proto = match get(realm, &fobj, &PropertyKey::from_str("prototype"))? {
                JsValue::Object(p) => p,
                _ => realm.intrinsics.object_prototype.clone(),
            };
            let obj = new_object(ObjectKind::Ordinary, Some(proto));
            let result = call_script_function(realm, &fobj, JsValue::Object(obj.clone()), args)?;
            if result.is_object() {
                Ok(result)
            } else {
                Ok(JsValue::Object(obj))
            }
        }
    }
}

/// `[[HasInstance]]`, the right-hand side of `instanceof`.
pub fn has_instance(realm: &mut Realm, f: &JsObjectType, v: &JsValue) -> Result<bool, EvalError> {
    let bound_target = match &f.borrow().kind {
        ObjectKind::Function(FunctionKind::Bound { target, .. }) => Some(target.clone()),
        _ => None,
    };
    if let Some(target) = bound_target {
        return has_instance(realm, &target, v);
    }
    let v = match v {
        JsValue::Object(o) => o.clone(),
        _ => return Ok(false),
    };
    let proto = match get(realm, f, &PropertyKey::from_str("prototype"))? {
        JsValue::Object(p) => p,
        _ => {
            return Err(realm.error(JErrorType::TypeError(
                "Function has non-object prototype in instanceof check".to_string(),
            )))
        }
    };
    let mut current = v.borrow().get_prototype_of();
    while let Some(p) = current {
        if Rc::ptr_eq(&p, &proto) {
            return Ok(true);
        }
        current = p.borrow().get_prototype_of();
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ds::realm::RealmConfig;

    fn add(_realm: &mut Realm, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
        let mut sum = 0.0;
        for a in args {
            if let JsValue::Number(n) = a {
                sum += n;
            }
        }
        Ok(JsValue::Number(sum))
    }

    #[test]
    fn test_builtin_and_bound_call() {
        let mut realm = Realm::new(RealmConfig::default());
        let proto = realm.intrinsics.function_prototype.clone();
        let f = create_builtin_function(&proto, "add", 2, add, None);
        let bound =
            create_bound_function(&mut realm, f, JsValue::Null, vec![JsValue::Number(1.0)])
                .unwrap();
        let result = call(
            &mut realm,
            &JsValue::Object(bound.clone()),
            JsValue::Undefined,
            vec![JsValue::Number(2.0)],
        )
        .unwrap();
        assert_eq!(result, JsValue::Number(3.0));
        assert_eq!(
            get(&mut realm, &bound, &PropertyKey::from_str("length")).unwrap(),
            JsValue::Number(1.0)
        );
    }

    #[test]
    fn test_non_callable_rejected() {
        let mut realm = Realm::new(RealmConfig::default());
        assert!(call(&mut realm, &JsValue::Number(1.0), JsValue::Undefined, vec![]).is_err());
        assert!(construct(&mut realm, &JsValue::Null, vec![]).is_err());
    }

    #[test]
    fn test_unregistered_custom_function_returns_undefined() {
        let mut realm = Realm::new(RealmConfig::default());
        let f = create_custom_function(&realm, Rc::from("nothing"));
        let result = call(&mut realm, &JsValue::Object(f), JsValue::Undefined, vec![]).unwrap();
        assert_eq!(result, JsValue::Undefined);
    }
}
