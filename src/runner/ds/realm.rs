use std::collections::HashMap;
use std::rc::Rc;

use uuid::Uuid;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::execution_context::{ExecutionContext, StackFrame};
use crate::runner::ds::function_object::create_builtin_function;
use crate::runner::ds::lex_env::JsLexEnvironmentType;
use crate::runner::ds::object::{new_object, JsObjectType, ObjectKind};
use crate::runner::ds::object_property::{PropertyDescriptor, PropertyKey};
use crate::runner::ds::operations::lex_env::new_object_environment;
use crate::runner::ds::operations::object::{define_final, define_property, get_own_property};
use crate::runner::ds::value::{JsString, JsValue};
use crate::runner::eval::types::{EvalError, ValueResult};
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::std_lib;

/// Tunables of a realm. Everything here can also be changed from script through
/// `setSystemProperty`, except `collapse_environments`.
#[derive(Debug, Clone)]
pub struct RealmConfig {
    /// Maximum number of nested execution contexts.
    pub stack_depth_limit: usize,
    /// Statements and loop iterations allowed per host entry, unbounded when `None`.
    pub steps_limit: Option<u64>,
    /// Frames captured by error objects when `Error.stackTraceLimit` is not a number.
    pub stack_trace_limit: usize,
    /// Lets the scope analyzer turn bindings into local slots and drop function environments.
    pub collapse_environments: bool,
    /// Bytes of native stack nested activations may use below the outermost one.
    pub native_stack_budget: usize,
}

impl Default for RealmConfig {
    fn default() -> Self {
        RealmConfig {
            stack_depth_limit: 200,
            steps_limit: None,
            stack_trace_limit: 10,
            collapse_environments: true,
            native_stack_budget: 1024 * 1024,
        }
    }
}

impl RealmConfig {
    pub fn with_stack_depth_limit(mut self, limit: usize) -> Self {
        self.stack_depth_limit = limit;
        self
    }

    pub fn with_steps_limit(mut self, limit: Option<u64>) -> Self {
        self.steps_limit = limit;
        self
    }

    pub fn with_stack_trace_limit(mut self, limit: usize) -> Self {
        self.stack_trace_limit = limit;
        self
    }

    pub fn with_collapse_environments(mut self, collapse: bool) -> Self {
        self.collapse_environments = collapse;
        self
    }

    pub fn with_native_stack_budget(mut self, bytes: usize) -> Self {
        self.native_stack_budget = bytes;
        self
    }
}

/// Objects the runtime itself needs to reach, independent of what script does to the globals.
pub struct Intrinsics {
    pub object_prototype: JsObjectType,
    pub function_prototype: JsObjectType,
    pub array_prototype: JsObjectType,
    pub string_prototype: JsObjectType,
    pub number_prototype: JsObjectType,
    pub boolean_prototype: JsObjectType,
    pub error_prototype: JsObjectType,
    pub type_error_prototype: JsObjectType,
    pub reference_error_prototype: JsObjectType,
    pub range_error_prototype: JsObjectType,
    pub syntax_error_prototype: JsObjectType,
    pub eval_error_prototype: JsObjectType,
    pub uri_error_prototype: JsObjectType,
    pub error_constructor: JsObjectType,
    pub eval_function: JsObjectType,
    pub throw_type_error: JsObjectType,
}

impl Intrinsics {
    fn new() -> Self {
        let object_prototype = new_object(ObjectKind::Ordinary, None);
        let function_prototype = create_builtin_function(
            &object_prototype,
            "",
            0,
            std_lib::function::function_prototype_call,
            None,
        );
        let proto_of = |kind: ObjectKind| new_object(kind, Some(object_prototype.clone()));
        let array_prototype = proto_of(ObjectKind::Array);
        define_property(&array_prototype, "length", JsValue::Number(0.0));
        let string_prototype = proto_of(ObjectKind::String(Rc::from("")));
        define_final(&string_prototype, "length", JsValue::Number(0.0));
        let number_prototype = proto_of(ObjectKind::Number(0.0));
        let boolean_prototype = proto_of(ObjectKind::Boolean(false));
        let error_prototype = proto_of(ObjectKind::Error(vec![]));
        let native_error = || new_object(ObjectKind::Error(vec![]), Some(error_prototype.clone()));
        let type_error_prototype = native_error();
        let reference_error_prototype = native_error();
        let range_error_prototype = native_error();
        let syntax_error_prototype = native_error();
        let eval_error_prototype = native_error();
        let uri_error_prototype = native_error();
        let error_constructor = create_builtin_function(
            &function_prototype,
            "Error",
            1,
            std_lib::error::error_call,
            Some(std_lib::error::error_construct),
        );
        let eval_function = create_builtin_function(
            &function_prototype,
            "eval",
            1,
            std_lib::global::indirect_eval,
            None,
        );
        let throw_type_error = create_builtin_function(
            &function_prototype,
            "ThrowTypeError",
            0,
            std_lib::function::throw_type_error,
            None,
        );
        throw_type_error.borrow_mut().base.prevent_extensions();
        Intrinsics {
            object_prototype,
            function_prototype,
            array_prototype,
            string_prototype,
            number_prototype,
            boolean_prototype,
            error_prototype,
            type_error_prototype,
            reference_error_prototype,
            range_error_prototype,
            syntax_error_prototype,
            eval_error_prototype,
            uri_error_prototype,
            error_constructor,
            eval_function,
            throw_type_error,
        }
    }

    pub fn error_prototype_for(&self, kind: &JErrorType) -> JsObjectType {
        match kind {
            JErrorType::TypeError(_) => self.type_error_prototype.clone(),
            JErrorType::ReferenceError(_) => self.reference_error_prototype.clone(),
            JErrorType::RangeError(_) => self.range_error_prototype.clone(),
            JErrorType::SyntaxError(_) => self.syntax_error_prototype.clone(),
            JErrorType::EvalError(_) => self.eval_error_prototype.clone(),
            JErrorType::URIError(_) => self.uri_error_prototype.clone(),
        }
    }
}

/// One global environment with its builtins, plus the per-thread state of the code running in it.
pub struct Realm {
    pub id: Uuid,
    pub config: RealmConfig,
    pub intrinsics: Intrinsics,
    pub global_object: JsObjectType,
    pub global_env: JsLexEnvironmentType,
    pub running: ExecutionContext,
    saved_contexts: Vec<ExecutionContext>,
    /// Native stack address of the outermost activation.
    stack_base: usize,
    steps: u64,
    pub custom_functions: BuiltInRegistry,
    pub system_handlers: HashMap<JsString, JsValue>,
}

impl Realm {
    pub fn new(config: RealmConfig) -> Self {
        let intrinsics = Intrinsics::new();
        let global_object = new_object(
            ObjectKind::Ordinary,
            Some(intrinsics.object_prototype.clone()),
        );
        let global_env = new_object_environment(global_object.clone(), None, false);
        let mut realm = Realm {
            id: Uuid::new_v4(),
            config,
            intrinsics,
            global_object,
            global_env,
            running: ExecutionContext::default(),
            saved_contexts: vec![],
            stack_base: 0,
            steps: 0,
            custom_functions: BuiltInRegistry::new(),
            system_handlers: HashMap::new(),
        };
        std_lib::register_core_builtins(&mut realm);
        realm
    }

    pub fn new_plain_object(&self) -> JsObjectType {
        new_object(
            ObjectKind::Ordinary,
            Some(self.intrinsics.object_prototype.clone()),
        )
    }

    /// Builds an error object of the given kind with a captured stack and wraps it as a throw.
    pub fn error(&mut self, kind: JErrorType) -> EvalError {
        EvalError::Throw(JsValue::Object(self.create_error_object(&kind)))
    }

    pub fn create_error_object(&mut self, kind: &JErrorType) -> JsObjectType {
        let proto = self.intrinsics.error_prototype_for(kind);
        let message = kind.message();
        let message = if message.is_empty() {
            None
        } else {
            Some(JsValue::from_str(message))
        };
        self.new_error_with_prototype(proto, message)
    }

    pub fn new_error_with_prototype(
        &mut self,
        proto: JsObjectType,
        message: Option<JsValue>,
    ) -> JsObjectType {
        let frames = self.capture_stack();
        let o = new_object(ObjectKind::Error(frames), Some(proto));
        if let Some(m) = message {
            define_property(&o, "message", m);
        }
        o
    }

    /// `Error.stackTraceLimit` when script has left it a non-negative number, the configured
    /// limit otherwise.
    pub fn stack_trace_limit(&self) -> usize {
        let key = PropertyKey::from_str("stackTraceLimit");
        match get_own_property(&self.intrinsics.error_constructor, &key) {
            Some(PropertyDescriptor::Data {
                value: JsValue::Number(n),
                ..
            }) if n >= 0.0 => n as usize,
            _ => self.config.stack_trace_limit,
        }
    }

    /// Frames of the running context and every saved one, innermost first. Native frames carry
    /// no source position and are left out.
    pub fn capture_stack(&self) -> Vec<StackFrame> {
        let limit = self.stack_trace_limit();
        std::iter::once(&self.running)
            .chain(self.saved_contexts.iter().rev())
            .filter(|ctx| ctx.code.is_some())
            .take(limit)
            .map(StackFrame::from)
            .collect()
    }

    pub fn depth(&self) -> usize {
        self.saved_contexts.len()
    }

    /// Makes `ctx` the running context. Fails with the stack-overflow signal once the depth limit
    /// or the native stack budget is reached; the RangeError it carries is built before the new
    /// context is entered.
    pub fn save_execution_context(&mut self, ctx: ExecutionContext) -> Result<(), EvalError> {
        let marker = 0u8;
        let here = &marker as *const u8 as usize;
        if self.saved_contexts.is_empty() {
            self.stack_base = here;
        }
        let used = if self.stack_base > here {
            self.stack_base - here
        } else {
            here - self.stack_base
        };
        if self.saved_contexts.len() >= self.config.stack_depth_limit
            || used > self.config.native_stack_budget
        {
            let e = self.create_error_object(&JErrorType::RangeError(
                "Maximum call stack size exceeded".to_string(),
            ));
            return Err(EvalError::StackOverflow(JsValue::Object(e)));
        }
        let previous = std::mem::replace(&mut self.running, ctx);
        self.saved_contexts.push(previous);
        Ok(())
    }

    pub fn exit_execution_context(&mut self) {
        self.running = self.saved_contexts.pop().unwrap_or_default();
    }

    /// Unwinds every context above `depth`, used by host entry points after an internal signal.
    pub fn unwind_to(&mut self, depth: usize) {
        while self.saved_contexts.len() > depth {
            self.exit_execution_context();
        }
    }

    pub fn set_position(&mut self, position: usize) {
        self.running.position = position;
    }

    /// Counts one statement or loop iteration against the steps budget.
    pub fn step(&mut self) -> Result<(), EvalError> {
        self.steps += 1;
        match self.config.steps_limit {
            Some(limit) if self.steps > limit => Err(EvalError::StepsExceeded),
            _ => Ok(()),
        }
    }

    pub fn reset_steps(&mut self) {
        self.steps = 0;
    }

    pub fn global_this(&self) -> JsValue {
        JsValue::Object(self.global_object.clone())
    }

    /// Looks up a global binding by name, `undefined` when missing.
    pub fn global_value(&mut self, name: &str) -> ValueResult {
        let global = self.global_object.clone();
        crate::runner::ds::operations::object::get(self, &global, &PropertyKey::from_str(name))
    }
}
