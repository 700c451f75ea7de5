//! Runtime data structures: values, objects and their property protocol, environments,
//! function and arguments objects, and the realm that ties them together.

pub mod arguments_object;
pub mod array_object;
pub mod env_record;
pub mod error;
pub mod execution_context;
pub mod function_object;
pub mod lex_env;
pub mod object;
pub mod object_property;
pub mod operations;
pub mod realm;
pub mod string_object;
pub mod value;
