use std::fmt;
use std::fmt::{Display, Formatter};

/// Kind and message of a language error the runtime raises itself. Turned into an error object
/// (with a captured stack) by `Realm::error`.
#[derive(Debug, Clone, PartialEq)]
pub enum JErrorType {
    ReferenceError(String),
    TypeError(String),
    RangeError(String),
    SyntaxError(String),
    EvalError(String),
    URIError(String),
}
impl JErrorType {
    pub fn name(&self) -> &'static str {
        match self {
            JErrorType::ReferenceError(_) => "ReferenceError",
            JErrorType::TypeError(_) => "TypeError",
            JErrorType::RangeError(_) => "RangeError",
            JErrorType::SyntaxError(_) => "SyntaxError",
            JErrorType::EvalError(_) => "EvalError",
            JErrorType::URIError(_) => "URIError",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            JErrorType::ReferenceError(m)
            | JErrorType::TypeError(m)
            | JErrorType::RangeError(m)
            | JErrorType::SyntaxError(m)
            | JErrorType::EvalError(m)
            | JErrorType::URIError(m) => m,
        }
    }
}
impl Display for JErrorType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name(), self.message())
    }
}
