//! Entering global and eval code.

use std::rc::Rc;

use tracing::trace;

use crate::parser::{describe_error, parse_eval, ParseOptions};
use crate::parser::ast::Code;
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::execution_context::{Activation, ExecutionContext};
use crate::runner::ds::function_object::create_script_function;
use crate::runner::ds::lex_env::JsLexEnvironmentType;
use crate::runner::ds::object_property::{PropertyDescriptor, PropertyDescriptorSetter, PropertyKey};
use crate::runner::ds::operations::lex_env::new_declarative_environment;
use crate::runner::ds::operations::object::{define_own_property, get_property};
use crate::runner::ds::realm::Realm;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::types::{EvalError, ValueResult};

use super::compiled_code;

/// Declaration binding instantiation for global and eval code. Bindings created here are
/// deletable only when `configurable` is set, which is the case for eval code.
pub fn declaration_binding_instantiation(
    realm: &mut Realm,
    code: &Code,
    var_env: &JsLexEnvironmentType,
    configurable: bool,
) -> Result<(), EvalError> {
    let record = var_env.inner.as_env_record();
    let is_global = Rc::ptr_eq(var_env, &realm.global_env);
    for fcode in &code.functions {
        let name = match &fcode.name {
            Some(n) => n.clone(),
            None => continue,
        };
        let fo = create_script_function(realm, fcode.clone(), var_env.clone());
        if !record.has_binding(&name) {
            record.create_mutable_binding(realm, name.clone(), configurable)?;
        } else if is_global {
            let global = realm.global_object.clone();
            let key = PropertyKey::from_js_string(&name);
            match get_property(&global, &key) {
                Some(existing) if existing.is_configurable() => {
                    define_own_property(
                        realm,
                        &global,
                        key,
                        PropertyDescriptorSetter::new_from_property_descriptor(
                            PropertyDescriptor::new_data(JsValue::Undefined, true, true, configurable),
                        ),
                        true,
                    )?;
                }
                Some(existing)
                    if existing.is_accessor_descriptor()
                        || !(existing.is_writable() && existing.is_enumerable()) =>
                {
                    return Err(realm.error(JErrorType::TypeError(format!(
                        "Cannot redeclare function '{}'",
                        name
                    ))));
                }
                _ => {}
            }
        }
        record.set_mutable_binding(realm, &name, JsValue::Object(fo), code.strict)?;
    }
    for name in &code.variables {
        if !record.has_binding(name) {
            record.create_mutable_binding(realm, name.clone(), configurable)?;
            record.set_mutable_binding(realm, name, JsValue::Undefined, code.strict)?;
        }
    }
    Ok(())
}

fn run_code(realm: &mut Realm, code: &Rc<Code>, mut act: Activation, configurable: bool) -> ValueResult {
    let compiled = compiled_code(code);
    let var_env = act.var_env.clone();
    declaration_binding_instantiation(realm, code, &var_env, configurable)?;
    let completion = (compiled.body)(realm, &mut act)?;
    Ok(completion.get_value())
}

fn with_context(realm: &mut Realm, code: &Rc<Code>, act: Activation, configurable: bool) -> ValueResult {
    realm.save_execution_context(ExecutionContext {
        function: None,
        code: Some(code.clone()),
        position: code.meta.start_index,
    })?;
    let result = run_code(realm, code, act, configurable);
    realm.exit_execution_context();
    result
}

/// Runs a parsed program in the global environment and returns its completion value.
pub fn evaluate_global_code(realm: &mut Realm, code: &Rc<Code>) -> ValueResult {
    let act = Activation::new(realm.global_env.clone(), realm.global_this(), 0);
    with_context(realm, code, act, false)
}

/// The eval operation. `caller` is the calling activation and its strictness for a direct call,
/// `None` for an indirect one, which runs in the global environment.
pub fn perform_eval(realm: &mut Realm, x: JsValue, caller: Option<(&Activation, bool)>) -> ValueResult {
    let text = match x {
        JsValue::String(s) => s,
        other => return Ok(other),
    };
    let strict_caller = caller.map_or(false, |(_, strict)| strict);
    let options = ParseOptions {
        collapse_environments: realm.config.collapse_environments,
    };
    let code = match parse_eval(&text, strict_caller, options) {
        Ok(code) => code,
        Err(e) => return Err(realm.error(JErrorType::SyntaxError(describe_error(&e)))),
    };
    trace!(strict = code.strict, direct = caller.is_some(), "evaluating eval code");
    let (lex_env, var_env, this) = match caller {
        Some((act, _)) => (
            act.lex_env.clone(),
            act.var_env.clone(),
            act.this_value.clone(),
        ),
        None => (
            realm.global_env.clone(),
            realm.global_env.clone(),
            realm.global_this(),
        ),
    };
    let act = if code.strict {
        Activation::new(new_declarative_environment(Some(lex_env)), this, 0)
    } else {
        let mut act = Activation::new(var_env, this, 0);
        act.lex_env = lex_env;
        act
    };
    with_context(realm, &code, act, true)
}

/// A call to the intrinsic `eval` through the plain name `eval`.
pub fn direct_eval(realm: &mut Realm, act: &Activation, args: Vec<JsValue>, strict: bool) -> ValueResult {
    let x = args.into_iter().next().unwrap_or(JsValue::Undefined);
    perform_eval(realm, x, Some((act, strict)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_program;
    use crate::runner::ds::realm::RealmConfig;

    fn run(realm: &mut Realm, text: &str) -> ValueResult {
        let code = parse_program(text, "test.js", ParseOptions::default()).unwrap();
        evaluate_global_code(realm, &code)
    }

    #[test]
    fn test_completion_value_of_program() {
        let mut realm = Realm::new(RealmConfig::default());
        assert_eq!(run(&mut realm, "1; 2; var x = 3;").unwrap(), JsValue::Number(2.0));
        assert_eq!(run(&mut realm, "var y;").unwrap(), JsValue::Undefined);
    }

    #[test]
    fn test_indirect_eval_declares_deletable_globals() {
        let mut realm = Realm::new(RealmConfig::default());
        perform_eval(&mut realm, JsValue::from_str("var z = 5;"), None).unwrap();
        assert_eq!(realm.global_value("z").unwrap(), JsValue::Number(5.0));
        assert_eq!(
            run(&mut realm, "delete z").unwrap(),
            JsValue::Boolean(true)
        );
        assert_eq!(
            run(&mut realm, "var w; delete w").unwrap(),
            JsValue::Boolean(false)
        );
    }

    #[test]
    fn test_eval_of_non_string_is_identity() {
        let mut realm = Realm::new(RealmConfig::default());
        let v = perform_eval(&mut realm, JsValue::Number(4.0), None).unwrap();
        assert_eq!(v, JsValue::Number(4.0));
    }

    #[test]
    fn test_eval_syntax_error_is_catchable() {
        let mut realm = Realm::new(RealmConfig::default());
        let v = run(&mut realm, "try { eval('var'); } catch (e) { e instanceof SyntaxError }");
        assert_eq!(v.unwrap(), JsValue::Boolean(true));
    }
}
