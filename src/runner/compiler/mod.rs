//! Closure compiler.
//!
//! Walks the AST of one `Code` once and produces a tree of boxed Rust closures operating on
//! `(&mut Realm, &mut Activation)`. Identifier references are resolved against the static scope
//! tree while compiling, so most of them become direct slot or fixed-depth environment accesses.
//! Every expression carries a static type set that selects specialized operator fast paths.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use crate::parser::ast::{Code, Meta, Name};
use crate::parser::static_semantics::ScopeTree;
use crate::runner::ds::execution_context::Activation;
use crate::runner::ds::realm::Realm;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::types::{EvalResult, LabelId, ValueResult};

pub mod declaration;
mod expression;
pub mod function;
mod operators;
mod statement;

pub type ExprFn = Box<dyn Fn(&mut Realm, &mut Activation) -> ValueResult>;
pub type StmtFn = Box<dyn Fn(&mut Realm, &mut Activation) -> EvalResult>;

/// Subset of the language types an expression can evaluate to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypeSet(u8);

impl TypeSet {
    pub const UNDEFINED: TypeSet = TypeSet(1);
    pub const NULL: TypeSet = TypeSet(1 << 1);
    pub const BOOLEAN: TypeSet = TypeSet(1 << 2);
    pub const NUMBER: TypeSet = TypeSet(1 << 3);
    pub const STRING: TypeSet = TypeSet(1 << 4);
    pub const OBJECT: TypeSet = TypeSet(1 << 5);
    pub const ANY: TypeSet = TypeSet(0b11_1111);

    pub fn of(v: &JsValue) -> TypeSet {
        match v {
            JsValue::Undefined => TypeSet::UNDEFINED,
            JsValue::Null => TypeSet::NULL,
            JsValue::Boolean(_) => TypeSet::BOOLEAN,
            JsValue::Number(_) => TypeSet::NUMBER,
            JsValue::String(_) => TypeSet::STRING,
            JsValue::Object(_) => TypeSet::OBJECT,
        }
    }

    pub fn union(self, other: TypeSet) -> TypeSet {
        TypeSet(self.0 | other.0)
    }

    /// True when every value of `self` is also in `other`.
    pub fn is_within(self, other: TypeSet) -> bool {
        self.0 & !other.0 == 0
    }

    /// Exactly one language type.
    pub fn is_single(self) -> bool {
        self.0.count_ones() == 1
    }

    /// No object can show up, so `ToPrimitive` is the identity and conversions have no side
    /// effects.
    pub fn is_primitive(self) -> bool {
        self.0 & TypeSet::OBJECT.0 == 0
    }
}

/// How much is known about an expression beyond its type set.
#[derive(Clone)]
pub enum ExpressionClass {
    /// A literal; the value is known while compiling.
    Constant(JsValue),
    /// A plain identifier read.
    Variable,
    Computed,
}

/// The handle returned for every compiled expression.
pub struct CompiledExpression {
    pub eval: ExprFn,
    pub types: TypeSet,
    pub class: ExpressionClass,
}

impl CompiledExpression {
    pub fn computed(types: TypeSet, eval: ExprFn) -> Self {
        CompiledExpression {
            eval,
            types,
            class: ExpressionClass::Computed,
        }
    }

    pub fn constant(value: JsValue) -> Self {
        let types = TypeSet::of(&value);
        let v = value.clone();
        CompiledExpression {
            eval: Box::new(move |_, _| Ok(v.clone())),
            types,
            class: ExpressionClass::Constant(value),
        }
    }

    pub fn constant_value(&self) -> Option<&JsValue> {
        match &self.class {
            ExpressionClass::Constant(v) => Some(v),
            _ => None,
        }
    }
}

/// Generated form of one `Code`.
pub struct CompiledCode {
    pub body: StmtFn,
    pub slot_count: usize,
}

/// Per-code compilation state.
pub struct Compiler {
    code: Rc<Code>,
    scopes: Rc<RefCell<ScopeTree>>,
    /// Labels in scope, innermost last.
    labels: Vec<(Name, LabelId)>,
    next_label: LabelId,
}

impl Compiler {
    pub fn new(code: &Rc<Code>) -> Self {
        Compiler {
            code: code.clone(),
            scopes: code.scopes.clone(),
            labels: vec![],
            next_label: 0,
        }
    }

    fn strict(&self) -> bool {
        self.code.strict
    }

    fn new_label(&mut self) -> LabelId {
        self.next_label += 1;
        self.next_label
    }

    /// Source text of a node, used in error messages.
    fn text_of(&self, meta: &Meta) -> String {
        self.code
            .source
            .text
            .get(meta.start_index..meta.end_index)
            .unwrap_or("expression")
            .to_string()
    }

    pub fn compile(mut self) -> CompiledCode {
        let code = self.code.clone();
        let body = self.compile_statement_list(&code.body);
        let slot_count = self.scopes.borrow().slot_count(code.id);
        CompiledCode { body, slot_count }
    }
}

/// Returns the generated code for `code`, compiling it on first use.
pub fn compiled_code(code: &Rc<Code>) -> Rc<CompiledCode> {
    let cached = code.compiled.borrow().clone();
    if let Some(compiled) = cached {
        return compiled;
    }
    debug!(
        name = code.name.as_deref().unwrap_or("<anonymous>"),
        code_type = ?code.code_type,
        file = %code.source.filename,
        "compiling code"
    );
    let compiled = Rc::new(Compiler::new(code).compile());
    *code.compiled.borrow_mut() = Some(compiled.clone());
    compiled
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_set_algebra() {
        let n = TypeSet::NUMBER;
        let ns = n.union(TypeSet::STRING);
        assert!(n.is_within(ns));
        assert!(!ns.is_within(n));
        assert!(ns.is_primitive());
        assert!(!TypeSet::ANY.is_primitive());
        assert_eq!(TypeSet::of(&JsValue::from_str("a")), TypeSet::STRING);
    }

    #[test]
    fn test_constant_classification() {
        let c = CompiledExpression::constant(JsValue::Number(2.0));
        assert_eq!(c.types, TypeSet::NUMBER);
        assert_eq!(c.constant_value(), Some(&JsValue::Number(2.0)));
    }
}
