//! Core types shared by generated code.

use crate::runner::ds::lex_env::JsLexEnvironmentType;
use crate::runner::ds::value::{JsString, JsValue};

/// Jump target allocated by the code generator for a loop, switch or labelled statement.
pub type LabelId = usize;

/// Completion record type. Throw completions travel as `Err(EvalError)` instead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompletionType {
    /// Normal completion - execution continues.
    Normal,
    /// Return completion - function returns.
    Return,
    /// Break completion - break from loop/switch.
    Break,
    /// Continue completion - continue loop iteration.
    Continue,
}

/// Completion record.
/// Every statement evaluation returns a completion record.
#[derive(Debug, Clone)]
pub struct Completion {
    /// The type of completion.
    pub completion_type: CompletionType,
    /// The value, if any. `None` is the empty completion value.
    pub value: Option<JsValue>,
    /// Target for break/continue, `None` for the nearest enclosing loop or switch.
    pub target: Option<LabelId>,
}

impl Completion {
    /// Create a normal completion with no value.
    pub fn normal() -> Self {
        Completion {
            completion_type: CompletionType::Normal,
            value: None,
            target: None,
        }
    }

    /// Create a normal completion with a value.
    pub fn normal_with_value(value: JsValue) -> Self {
        Completion {
            completion_type: CompletionType::Normal,
            value: Some(value),
            target: None,
        }
    }

    /// Create a return completion.
    pub fn return_value(value: JsValue) -> Self {
        Completion {
            completion_type: CompletionType::Return,
            value: Some(value),
            target: None,
        }
    }

    /// Create a break completion.
    pub fn break_completion(target: Option<LabelId>) -> Self {
        Completion {
            completion_type: CompletionType::Break,
            value: None,
            target,
        }
    }

    /// Create a continue completion.
    pub fn continue_completion(target: Option<LabelId>) -> Self {
        Completion {
            completion_type: CompletionType::Continue,
            value: None,
            target,
        }
    }

    /// Check if this is a normal completion.
    pub fn is_normal(&self) -> bool {
        self.completion_type == CompletionType::Normal
    }

    /// Check if this is an abrupt completion (not normal).
    pub fn is_abrupt(&self) -> bool {
        !self.is_normal()
    }

    /// Get the value, or undefined if none.
    pub fn get_value(&self) -> JsValue {
        self.value.clone().unwrap_or(JsValue::Undefined)
    }

    /// Fill an empty value with `value`, leaving completions that carry one untouched.
    pub fn update_empty(self, value: Option<JsValue>) -> Self {
        if self.value.is_none() {
            Completion { value, ..self }
        } else {
            self
        }
    }
}

/// Everything that unwinds the native stack.
///
/// `Throw` is a language-level exception and is the only variant script `catch` and `finally`
/// blocks ever see. The other two are internal signals that unwind straight to the host.
#[derive(Debug, Clone)]
pub enum EvalError {
    /// A thrown language value.
    Throw(JsValue),
    /// The call-stack depth limit was hit. Carries the `RangeError` built at that point.
    StackOverflow(JsValue),
    /// The step budget was exhausted.
    StepsExceeded,
}

impl EvalError {
    /// The single guard every `catch`/`finally` boundary goes through: yields the thrown value
    /// for language exceptions and hands internal signals back untouched.
    pub fn into_catchable(self) -> Result<JsValue, EvalError> {
        match self {
            EvalError::Throw(v) => Ok(v),
            other => Err(other),
        }
    }

    pub fn is_internal(&self) -> bool {
        !matches!(self, EvalError::Throw(_))
    }
}

/// Reference base type.
#[derive(Clone)]
pub enum ReferenceBase {
    /// Property reference on an object or on a primitive that is boxed on access.
    Value(JsValue),
    /// Binding in an environment record.
    Environment(JsLexEnvironmentType),
    /// Unresolvable reference (identifier not found).
    Unresolvable,
}

/// Reference type.
/// Produced while evaluating an assignable expression and consumed right away.
#[derive(Clone)]
pub struct Reference {
    /// The base value (object, primitive or environment).
    pub base: ReferenceBase,
    /// The referenced name (property name or identifier).
    pub referenced_name: JsString,
    /// Whether this is a strict mode reference.
    pub strict: bool,
}

impl Reference {
    /// Create a new reference to a property.
    pub fn property(base: JsValue, name: JsString, strict: bool) -> Self {
        Reference {
            base: ReferenceBase::Value(base),
            referenced_name: name,
            strict,
        }
    }

    /// Create a new reference to an environment binding.
    pub fn environment(env: JsLexEnvironmentType, name: JsString, strict: bool) -> Self {
        Reference {
            base: ReferenceBase::Environment(env),
            referenced_name: name,
            strict,
        }
    }

    /// Create an unresolvable reference.
    pub fn unresolvable(name: JsString, strict: bool) -> Self {
        Reference {
            base: ReferenceBase::Unresolvable,
            referenced_name: name,
            strict,
        }
    }

    /// Check if this reference has a primitive base.
    pub fn has_primitive_base(&self) -> bool {
        match &self.base {
            ReferenceBase::Value(v) => {
                matches!(v, JsValue::Boolean(_) | JsValue::String(_) | JsValue::Number(_))
            }
            _ => false,
        }
    }

    /// Check if this is a property reference.
    pub fn is_property_reference(&self) -> bool {
        matches!(self.base, ReferenceBase::Value(_))
    }

    /// Check if this reference is unresolvable.
    pub fn is_unresolvable(&self) -> bool {
        matches!(self.base, ReferenceBase::Unresolvable)
    }
}

/// Result type for statement evaluation.
pub type EvalResult = Result<Completion, EvalError>;

/// Result type for value-returning operations.
pub type ValueResult = Result<JsValue, EvalError>;

/// Result type for reference-returning operations.
pub type ReferenceResult = Result<Reference, EvalError>;
