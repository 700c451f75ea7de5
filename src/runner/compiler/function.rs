//! Entering script function code.

use std::rc::Rc;

use crate::parser::ast::Code;
use crate::runner::ds::arguments_object::{create_arguments_object, MappedBinding};
use crate::runner::ds::execution_context::{Activation, ExecutionContext};
use crate::runner::ds::function_object::{create_script_function, FunctionKind};
use crate::runner::ds::lex_env::JsLexEnvironmentType;
use crate::runner::ds::object::{JsObjectType, ObjectKind};
use crate::runner::ds::operations::lex_env::new_declarative_environment;
use crate::runner::ds::operations::type_conversion::to_object;
use crate::runner::ds::realm::Realm;
use crate::runner::ds::value::{JsString, JsValue};
use crate::runner::eval::types::{CompletionType, EvalError, ValueResult};

use super::{compiled_code, CompiledCode};

const ARGUMENTS: &str = "arguments";

/// Binds `name` either to its local slot or in the function environment.
fn bind(
    realm: &mut Realm,
    act: &Activation,
    slot: Option<usize>,
    name: &JsString,
    value: JsValue,
) -> Result<(), EvalError> {
    match slot {
        Some(slot) => {
            act.set_local(slot, value);
            Ok(())
        }
        None => {
            let env = act.var_env.clone();
            let record = env.inner.as_env_record();
            if !record.has_binding(name) {
                record.create_mutable_binding(realm, name.clone(), false)?;
            }
            record.set_mutable_binding(realm, name, value, false)
        }
    }
}

/// Function declaration binding instantiation: parameters, hoisted functions, the arguments
/// object and `var` names, in that order.
fn instantiate(
    realm: &mut Realm,
    f: &JsObjectType,
    code: &Rc<Code>,
    act: &Activation,
    args: &[JsValue],
) -> Result<(), EvalError> {
    let tree = code.scopes.clone();
    let slot_of = |name: &str| tree.borrow().local_slot(code.scope, name);

    let mut mapped: Vec<(JsString, MappedBinding)> = Vec::with_capacity(code.params.len());
    for (i, name) in code.params.iter().enumerate() {
        let value = args.get(i).cloned().unwrap_or(JsValue::Undefined);
        let slot = slot_of(name);
        bind(realm, act, slot, name, value)?;
        mapped.push((
            name.clone(),
            match slot {
                Some(slot) => MappedBinding::Slot(act.locals.clone(), slot),
                None => MappedBinding::Environment(act.var_env.clone(), name.clone()),
            },
        ));
    }

    for fcode in &code.functions {
        let fo = create_script_function(realm, fcode.clone(), act.var_env.clone());
        if let Some(name) = &fcode.name {
            bind(realm, act, slot_of(name), name, JsValue::Object(fo))?;
        }
    }

    let shadowed = code.params.iter().any(|p| &**p == ARGUMENTS)
        || code
            .functions
            .iter()
            .any(|fc| fc.name.as_deref() == Some(ARGUMENTS));
    if (code.exists_arguments_ref || code.exists_direct_eval) && !shadowed {
        let arguments = create_arguments_object(realm, f, args, &mapped, code.strict);
        let name: JsString = Rc::from(ARGUMENTS);
        match slot_of(ARGUMENTS) {
            Some(slot) => act.set_local(slot, JsValue::Object(arguments)),
            None => {
                let env = act.var_env.clone();
                match (code.strict, env.inner.as_declarative()) {
                    (true, Some(d)) => {
                        d.create_immutable_binding(name.clone());
                        d.initialize_immutable_binding(&name, JsValue::Object(arguments));
                    }
                    _ => bind(realm, act, None, &name, JsValue::Object(arguments))?,
                }
            }
        }
    }

    let env = act.var_env.clone();
    let record = env.inner.as_env_record();
    for name in &code.variables {
        if slot_of(name).is_none() && !record.has_binding(name) {
            record.create_mutable_binding(realm, name.clone(), false)?;
            record.set_mutable_binding(realm, name, JsValue::Undefined, false)?;
        }
    }
    Ok(())
}

fn this_binding(realm: &mut Realm, code: &Code, this: JsValue) -> ValueResult {
    if code.strict {
        return Ok(this);
    }
    match this {
        JsValue::Undefined | JsValue::Null => Ok(realm.global_this()),
        JsValue::Object(_) => Ok(this),
        primitive => Ok(JsValue::Object(to_object(realm, &primitive)?)),
    }
}

fn enter(
    realm: &mut Realm,
    f: &JsObjectType,
    code: &Rc<Code>,
    scope: JsLexEnvironmentType,
    compiled: &CompiledCode,
    this: JsValue,
    args: &[JsValue],
) -> ValueResult {
    let env = if code.scopes.borrow().is_collapsed(code.scope) {
        scope
    } else {
        new_declarative_environment(Some(scope))
    };
    let this = this_binding(realm, code, this)?;
    let mut act = Activation::new(env, this, compiled.slot_count);
    instantiate(realm, f, code, &act, args)?;
    let completion = (compiled.body)(realm, &mut act)?;
    Ok(match completion.completion_type {
        CompletionType::Return => completion.get_value(),
        _ => JsValue::Undefined,
    })
}

/// `[[Call]]` of a function object created from script code.
pub fn call_script_function(
    realm: &mut Realm,
    f: &JsObjectType,
    this: JsValue,
    args: Vec<JsValue>,
) -> ValueResult {
    let (code, scope) = match &f.borrow().kind {
        ObjectKind::Function(FunctionKind::Script { code, scope }) => (code.clone(), scope.clone()),
        _ => return Ok(JsValue::Undefined),
    };
    let compiled = compiled_code(&code);
    realm.save_execution_context(ExecutionContext {
        function: Some(f.clone()),
        code: Some(code.clone()),
        position: code.meta.start_index,
    })?;
    let result = enter(realm, f, &code, scope, &compiled, this, &args);
    realm.exit_execution_context();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_program, ParseOptions};
    use crate::runner::ds::function_object::call;
    use crate::runner::ds::realm::RealmConfig;

    fn function_from(realm: &Realm, text: &str) -> JsValue {
        let program = parse_program(text, "test.js", ParseOptions::default()).unwrap();
        let code = program.functions[0].clone();
        JsValue::Object(create_script_function(realm, code, realm.global_env.clone()))
    }

    #[test]
    fn test_missing_arguments_are_undefined() {
        let mut realm = Realm::new(RealmConfig::default());
        let f = function_from(&realm, "function f(a, b) { return typeof b; }");
        let v = call(&mut realm, &f, JsValue::Undefined, vec![JsValue::Number(1.0)]).unwrap();
        assert_eq!(v, JsValue::from_str("undefined"));
    }

    #[test]
    fn test_arguments_alias_parameters() {
        let mut realm = Realm::new(RealmConfig::default());
        let f = function_from(&realm, "function f(a) { arguments[0] = 2; return a; }");
        let v = call(&mut realm, &f, JsValue::Undefined, vec![JsValue::Number(1.0)]).unwrap();
        assert_eq!(v, JsValue::Number(2.0));
    }

    #[test]
    fn test_sloppy_this_is_global() {
        let mut realm = Realm::new(RealmConfig::default());
        let f = function_from(&realm, "function f() { return this; }");
        let v = call(&mut realm, &f, JsValue::Undefined, vec![]).unwrap();
        assert_eq!(v, realm.global_this());
        let f = function_from(&realm, "function f() { 'use strict'; return this; }");
        let v = call(&mut realm, &f, JsValue::Undefined, vec![]).unwrap();
        assert_eq!(v, JsValue::Undefined);
    }

    #[test]
    fn test_context_is_popped_after_throw() {
        let mut realm = Realm::new(RealmConfig::default());
        let f = function_from(&realm, "function f() { throw 1; }");
        assert!(call(&mut realm, &f, JsValue::Undefined, vec![]).is_err());
        assert_eq!(realm.depth(), 0);
    }
}
