//! Host embedding layer.
//!
//! A [`Vm`] owns one realm. Every entry point resets the step budget, runs script, and on
//! failure unwinds the realm's context stack back to where the host entered it, so the realm
//! stays usable after an uncaught exception or an internal limit.

use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, info_span, warn};

use crate::parser::{describe_error, parse_program, ParseOptions};
use crate::runner::compiler::declaration::evaluate_global_code;
use crate::runner::ds::function_object::call;
use crate::runner::ds::object::ObjectKind;
use crate::runner::ds::operations::object::is_callable;
use crate::runner::ds::operations::type_conversion::to_string;
use crate::runner::ds::realm::{Realm, RealmConfig};
use crate::runner::ds::value::JsValue;
use crate::runner::eval::types::{EvalError, ValueResult};
use crate::runner::plugin::types::BuiltInFn;
use crate::runner::std_lib::error::error_summary;

/// Why a host entry point did not produce a value.
#[derive(Error, Debug)]
pub enum VmError {
    /// The program text did not parse. The realm was not touched.
    #[error("SyntaxError: {0}")]
    Syntax(String),
    /// Script threw and nothing caught it.
    #[error("Uncaught {message}")]
    Thrown { value: JsValue, message: String },
    /// The call-stack depth limit was reached.
    #[error("RangeError: Maximum call stack size exceeded")]
    StackOverflow(JsValue),
    /// The step budget ran out.
    #[error("RangeError: steps overflow")]
    StepsExceeded,
}

impl VmError {
    /// The thrown value, for errors that carry one.
    pub fn value(&self) -> Option<&JsValue> {
        match self {
            VmError::Thrown { value, .. } | VmError::StackOverflow(value) => Some(value),
            _ => None,
        }
    }
}

pub struct Vm {
    realm: Realm,
}

impl Default for Vm {
    fn default() -> Self {
        Vm::new()
    }
}

impl Vm {
    pub fn new() -> Self {
        Vm::with_config(RealmConfig::default())
    }

    pub fn with_config(config: RealmConfig) -> Self {
        let realm = Realm::new(config);
        debug!(realm = %realm.id, "realm created");
        Vm { realm }
    }

    pub fn realm(&self) -> &Realm {
        &self.realm
    }

    pub fn realm_mut(&mut self) -> &mut Realm {
        &mut self.realm
    }

    /// Parses and runs `text` as global code. Returns the completion value of the program,
    /// `undefined` when it is empty.
    pub fn evaluate_program(&mut self, text: &str, filename: &str) -> Result<JsValue, VmError> {
        let span = info_span!("evaluate_program", realm = %self.realm.id, file = filename);
        let _enter = span.enter();
        let options = ParseOptions {
            collapse_environments: self.realm.config.collapse_environments,
        };
        let code = parse_program(text, filename, options).map_err(|e| {
            let message = describe_error(&e);
            debug!(%message, "parse failed");
            VmError::Syntax(message)
        })?;
        self.realm.reset_steps();
        let depth = self.realm.depth();
        let result = evaluate_global_code(&mut self.realm, &code);
        self.finish(result, depth)
    }

    /// Calls a script or native function from the host.
    pub fn call_function(
        &mut self,
        f: &JsValue,
        this: JsValue,
        args: Vec<JsValue>,
    ) -> Result<JsValue, VmError> {
        let span = info_span!("call_function", realm = %self.realm.id);
        let _enter = span.enter();
        self.realm.reset_steps();
        let depth = self.realm.depth();
        let result = call(&mut self.realm, f, this, args);
        self.finish(result, depth)
    }

    /// Invokes the script handler registered under `name` with `setSystemHandler`. Yields
    /// `undefined` when there is none.
    pub fn call_system_handler(
        &mut self,
        name: &str,
        args: Vec<JsValue>,
    ) -> Result<JsValue, VmError> {
        let handler = match self.realm.system_handlers.get(name) {
            Some(h) if is_callable(h) => h.clone(),
            _ => {
                debug!(realm = %self.realm.id, handler = name, "no system handler");
                return Ok(JsValue::Undefined);
            }
        };
        let span = info_span!("call_system_handler", realm = %self.realm.id, handler = name);
        let _enter = span.enter();
        self.realm.reset_steps();
        let depth = self.realm.depth();
        let result = call(&mut self.realm, &handler, JsValue::Undefined, args);
        self.finish(result, depth)
    }

    /// Registers a host callback reachable from script through `CustomFunction(name)`.
    pub fn set_custom_function<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&mut Realm, JsValue, Vec<JsValue>) -> ValueResult + 'static,
    {
        self.realm
            .custom_functions
            .register(Rc::from(name), BuiltInFn::Host(Rc::new(f)));
    }

    /// Removes a host callback. Returns true if it was registered.
    pub fn remove_custom_function(&mut self, name: &str) -> bool {
        self.realm.custom_functions.unregister(name)
    }

    /// Reads a global binding, `undefined` when it is missing.
    pub fn global(&mut self, name: &str) -> Result<JsValue, VmError> {
        let depth = self.realm.depth();
        let result = self.realm.global_value(name);
        self.finish(result, depth)
    }

    /// Renders a value for the host: error objects as `Name: message`, everything else through
    /// ToString, falling back to the `[object Class]` form if that throws.
    pub fn display(&mut self, value: &JsValue) -> String {
        let depth = self.realm.depth();
        let text = match value {
            JsValue::Object(o) if matches!(o.borrow().kind, ObjectKind::Error(_)) => {
                error_summary(&mut self.realm, o)
            }
            v => to_string(&mut self.realm, v).map(|s| s.to_string()),
        };
        match text {
            Ok(s) => s,
            Err(_) => {
                self.realm.unwind_to(depth);
                value.to_string()
            }
        }
    }

    fn finish(&mut self, result: ValueResult, depth: usize) -> Result<JsValue, VmError> {
        let e = match result {
            Ok(v) => return Ok(v),
            Err(e) => e,
        };
        self.realm.unwind_to(depth);
        Err(match e {
            EvalError::Throw(value) => {
                let message = self.display(&value);
                debug!(realm = %self.realm.id, %message, "uncaught exception");
                VmError::Thrown { value, message }
            }
            EvalError::StackOverflow(value) => {
                warn!(realm = %self.realm.id, "stack depth limit reached");
                VmError::StackOverflow(value)
            }
            EvalError::StepsExceeded => {
                warn!(realm = %self.realm.id, "steps limit reached");
                VmError::StepsExceeded
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_leaves_realm_untouched() {
        let mut vm = Vm::new();
        vm.evaluate_program("var a = 1;", "a.js").unwrap();
        let r = vm.evaluate_program("var b = 2; var", "b.js");
        assert!(matches!(r, Err(VmError::Syntax(_))));
        assert_eq!(vm.global("b").unwrap(), JsValue::Undefined);
        assert_eq!(vm.global("a").unwrap(), JsValue::Number(1.0));
    }

    #[test]
    fn test_uncaught_error_message() {
        let mut vm = Vm::new();
        let e = vm
            .evaluate_program("throw new TypeError('nope');", "t.js")
            .unwrap_err();
        assert_eq!(e.to_string(), "Uncaught TypeError: nope");
        assert_eq!(vm.realm().depth(), 0);
    }

    #[test]
    fn test_steps_limit_is_not_catchable() {
        let mut vm = Vm::with_config(RealmConfig::default().with_steps_limit(Some(1000)));
        let r = vm.evaluate_program("try { while (true) {} } catch (e) {} 'done'", "s.js");
        assert!(matches!(r, Err(VmError::StepsExceeded)));
        assert_eq!(
            vm.evaluate_program("'again'", "s.js").unwrap(),
            JsValue::from_str("again")
        );
    }

    #[test]
    fn test_system_handler_round_trip() {
        let mut vm = Vm::new();
        assert_eq!(
            vm.call_system_handler("onTick", vec![]).unwrap(),
            JsValue::Undefined
        );
        vm.evaluate_program(
            "setSystemHandler('onTick', function (n) { return n + 1; });",
            "h.js",
        )
        .unwrap();
        assert_eq!(
            vm.call_system_handler("onTick", vec![JsValue::Number(1.0)])
                .unwrap(),
            JsValue::Number(2.0)
        );
    }
}
