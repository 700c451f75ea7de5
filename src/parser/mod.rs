mod api;
pub mod ast;
pub mod static_semantics;
#[cfg(test)]
mod unit_tests;
mod util;

pub use api::{
    describe_error, parse_eval, parse_function, parse_program, JsParser, ParseError, ParseOptions,
    Rule,
};
