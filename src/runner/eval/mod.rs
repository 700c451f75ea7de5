//! Completion records, references and the generic reference protocol used by generated code
//! whenever a reference cannot be specialized at compile time.

pub mod reference;
pub mod types;

pub use types::{Completion, CompletionType, EvalError, Reference, ReferenceBase};
