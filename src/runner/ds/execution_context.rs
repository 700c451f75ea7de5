use std::cell::RefCell;
use std::rc::Rc;

use crate::parser::ast::Code;
use crate::runner::ds::lex_env::JsLexEnvironmentType;
use crate::runner::ds::object::JsObjectType;
use crate::runner::ds::value::JsValue;

/// Storage for the names the scope analyzer turned into local slots. Shared so that closures
/// of the arguments object can alias parameter slots.
pub type LocalFrame = Rc<RefCell<Vec<JsValue>>>;

/// What the realm tracks about the code currently running, for stack traces.
#[derive(Clone, Default)]
pub struct ExecutionContext {
    pub function: Option<JsObjectType>,
    pub code: Option<Rc<Code>>,
    pub position: usize,
}

/// One captured stack-trace entry.
#[derive(Clone)]
pub struct StackFrame {
    pub function: Option<JsObjectType>,
    pub code: Option<Rc<Code>>,
    pub position: usize,
}
impl From<&ExecutionContext> for StackFrame {
    fn from(ctx: &ExecutionContext) -> Self {
        StackFrame {
            function: ctx.function.clone(),
            code: ctx.code.clone(),
            position: ctx.position,
        }
    }
}
impl StackFrame {
    /// `    at name (file:line:column)`.
    pub fn format(&self) -> String {
        let name = self
            .code
            .as_ref()
            .and_then(|c| c.name.clone())
            .map(|n| n.to_string())
            .unwrap_or_else(|| {
                if self.function.is_some() {
                    "<anonymous>".to_string()
                } else {
                    "<global>".to_string()
                }
            });
        match &self.code {
            Some(code) => {
                let (line, column) = code.source.line_col(self.position);
                format!(
                    "    at {} ({}:{}:{})",
                    name, code.source.filename, line, column
                )
            }
            None => format!("    at {} (native)", name),
        }
    }
}

/// Per-activation state that generated code reads and writes.
pub struct Activation {
    pub lex_env: JsLexEnvironmentType,
    pub var_env: JsLexEnvironmentType,
    pub this_value: JsValue,
    pub locals: LocalFrame,
}
impl Activation {
    pub fn new(env: JsLexEnvironmentType, this_value: JsValue, slot_count: usize) -> Self {
        Activation {
            lex_env: env.clone(),
            var_env: env,
            this_value,
            locals: Rc::new(RefCell::new(vec![JsValue::Undefined; slot_count])),
        }
    }

    pub fn get_local(&self, slot: usize) -> JsValue {
        self.locals
            .borrow()
            .get(slot)
            .cloned()
            .unwrap_or(JsValue::Undefined)
    }

    pub fn set_local(&self, slot: usize, value: JsValue) {
        if let Some(s) = self.locals.borrow_mut().get_mut(slot) {
            *s = value;
        }
    }
}
