//! Function built-in.
//!
//! The `Function` constructor compiles source text at runtime; `Function.prototype` carries
//! `call`, `apply`, `bind` and `toString`.

use crate::parser::{describe_error, parse_function, ParseOptions};
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::function_object::{
    call, create_bound_function, create_script_function, function_name, FunctionKind,
};
use crate::runner::ds::object::{JsObjectType, ObjectKind};
use crate::runner::ds::object_property::PropertyKey;
use crate::runner::ds::operations::object::get;
use crate::runner::ds::operations::type_conversion::{get_type, to_string, to_uint32};
use crate::runner::ds::realm::Realm;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::types::{EvalError, ValueResult};
use crate::runner::plugin::types::{arg, BuiltInObject};

pub fn register(realm: &mut Realm) {
    BuiltInObject::new("Function")
        .with_prototype(realm.intrinsics.function_prototype.clone())
        .with_constructor(1, function_constructor, Some(function_constructor))
        .add_method("call", 1, function_call)
        .add_method("apply", 2, function_apply)
        .add_method("bind", 1, function_bind)
        .add_method("toString", 0, function_to_string)
        .install(realm);
}

/// `Function.prototype` is itself callable and always returns `undefined`.
pub fn function_prototype_call(_realm: &mut Realm, _this: JsValue, _args: Vec<JsValue>) -> ValueResult {
    Ok(JsValue::Undefined)
}

/// The shared poison pill behind `caller` and `arguments` of strict functions.
pub fn throw_type_error(realm: &mut Realm, _this: JsValue, _args: Vec<JsValue>) -> ValueResult {
    Err(realm.error(JErrorType::TypeError(
        "'caller' and 'arguments' are restricted function properties and cannot be accessed in this context"
            .to_string(),
    )))
}

fn this_function(realm: &mut Realm, this: &JsValue, method: &str) -> Result<JsObjectType, EvalError> {
    match this {
        JsValue::Object(o) if o.borrow().is_callable() => Ok(o.clone()),
        other => Err(realm.error(JErrorType::TypeError(format!(
            "Function.prototype.{} called on {}",
            method,
            get_type(other)
        )))),
    }
}

fn function_constructor(realm: &mut Realm, _this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let mut texts = Vec::with_capacity(args.len());
    for a in &args {
        texts.push(to_string(realm, a)?);
    }
    let body = texts.pop().map_or_else(String::new, |b| b.to_string());
    let params = texts
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(",");
    let options = ParseOptions {
        collapse_environments: realm.config.collapse_environments,
    };
    let code = match parse_function(&params, &body, options) {
        Ok(code) => code,
        Err(e) => return Err(realm.error(JErrorType::SyntaxError(describe_error(&e)))),
    };
    let scope = realm.global_env.clone();
    Ok(JsValue::Object(create_script_function(realm, code, scope)))
}

fn function_call(realm: &mut Realm, this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let f = this_function(realm, &this, "call")?;
    let mut args = args.into_iter();
    let this_arg = args.next().unwrap_or(JsValue::Undefined);
    call(realm, &JsValue::Object(f), this_arg, args.collect())
}

fn function_apply(realm: &mut Realm, this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let f = this_function(realm, &this, "apply")?;
    let this_arg = arg(&args, 0);
    let list = match arg(&args, 1) {
        JsValue::Undefined | JsValue::Null => vec![],
        JsValue::Object(a) => {
            let length = get(realm, &a, &PropertyKey::from_str("length"))?;
            let n = to_uint32(realm, &length)?;
            let mut list = Vec::with_capacity(n as usize);
            for i in 0..n {
                list.push(get(realm, &a, &PropertyKey::from_index(i))?);
            }
            list
        }
        other => {
            return Err(realm.error(JErrorType::TypeError(format!(
                "CreateListFromArrayLike called on non-object ({})",
                get_type(&other)
            ))))
        }
    };
    call(realm, &JsValue::Object(f), this_arg, list)
}

fn function_bind(realm: &mut Realm, this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let target = this_function(realm, &this, "bind")?;
    let mut args = args.into_iter();
    let this_arg = args.next().unwrap_or(JsValue::Undefined);
    let bound = create_bound_function(realm, target, this_arg, args.collect())?;
    Ok(JsValue::Object(bound))
}

fn function_to_string(realm: &mut Realm, this: JsValue, _args: Vec<JsValue>) -> ValueResult {
    let f = this_function(realm, &this, "toString")?;
    let text = match &f.borrow().kind {
        ObjectKind::Function(FunctionKind::Script { code, .. }) => code.source_text().to_string(),
        _ => format!(
            "function {}() {{ [native code] }}",
            function_name(&f).unwrap_or_default()
        ),
    };
    Ok(JsValue::from(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ds::realm::RealmConfig;

    #[test]
    fn test_constructor_builds_callable() {
        let mut realm = Realm::new(RealmConfig::default());
        let f = function_constructor(
            &mut realm,
            JsValue::Undefined,
            vec![
                JsValue::from_str("a"),
                JsValue::from_str("b"),
                JsValue::from_str("return a * b;"),
            ],
        )
        .unwrap();
        let v = call(
            &mut realm,
            &f,
            JsValue::Undefined,
            vec![JsValue::Number(6.0), JsValue::Number(7.0)],
        )
        .unwrap();
        assert_eq!(v, JsValue::Number(42.0));
    }

    #[test]
    fn test_constructor_reports_syntax_error() {
        let mut realm = Realm::new(RealmConfig::default());
        let r = function_constructor(&mut realm, JsValue::Undefined, vec![JsValue::from_str("{")]);
        assert!(r.is_err());
    }

    #[test]
    fn test_native_to_string() {
        let mut realm = Realm::new(RealmConfig::default());
        let eval = JsValue::Object(realm.intrinsics.eval_function.clone());
        let v = function_to_string(&mut realm, eval, vec![]).unwrap();
        assert_eq!(v, JsValue::from_str("function eval() { [native code] }"));
    }
}
