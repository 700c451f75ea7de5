//! # clove - an ES5 evaluator that compiles to closures
//!
//! Programs are parsed once into an annotated AST, then turned into a tree of Rust closures
//! that run against an explicit [`runner::ds::realm::Realm`]:
//! - PEG parser with static scope analysis
//! - Closure compiler that resolves identifiers to stack slots where a scope can be collapsed
//! - Full ES5 property protocol, environments, arguments objects and `eval`
//! - Host callbacks, system handlers, step and stack-depth budgets
//!
//! ## Quick Start
//!
//! ```
//! use clove::runner::api::Vm;
//! use clove::runner::ds::value::JsValue;
//!
//! let mut vm = Vm::new();
//! let v = vm
//!     .evaluate_program("function sq(x) { return x * x; } sq(7)", "quick.js")
//!     .unwrap();
//! assert_eq!(v, JsValue::Number(49.0));
//! ```
//!
//! ## Host Callbacks
//!
//! Script reaches host code through `CustomFunction(name)`. The name is looked up in the
//! realm's registry on every call, so callbacks can be registered after script has taken a
//! reference to them.
//!
//! ```
//! use clove::runner::api::Vm;
//! use clove::runner::ds::value::JsValue;
//!
//! let mut vm = Vm::new();
//! vm.set_custom_function("triple", |_, _, args| match args.get(0) {
//!     Some(JsValue::Number(n)) => Ok(JsValue::Number(n * 3.0)),
//!     _ => Ok(JsValue::Undefined),
//! });
//! let v = vm
//!     .evaluate_program("CustomFunction('triple')(7)", "host.js")
//!     .unwrap();
//! assert_eq!(v, JsValue::Number(21.0));
//! ```
//!
//! ## Budgets
//!
//! [`runner::ds::realm::RealmConfig`] bounds the call-stack depth and, optionally, the number
//! of steps one entry point may take. Hitting either limit unwinds past every script
//! `catch` and `finally` and surfaces as [`runner::api::VmError`]; the realm stays usable.
//!
//! ## Architecture
//!
//! - **[`parser`]** - PEG grammar, AST and static scope analysis
//! - **[`runner`]** - Everything that runs code
//!   - **[`runner::compiler`]** - AST to closure compilation
//!   - **[`runner::ds`]** - Values, objects, environments and the realm
//!   - **[`runner::eval`]** - Completions and the generic reference protocol
//!   - **[`runner::plugin`]** - Native callback signatures and the host registry
//!   - **[`runner::std_lib`]** - Built-in objects
//!   - **[`runner::api`]** - The [`runner::api::Vm`] embedding surface

#[macro_use]
extern crate lazy_static;

pub mod parser;
pub mod runner;
