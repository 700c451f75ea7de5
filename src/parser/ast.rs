use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::static_semantics::{ScopeId, ScopeTree};
use crate::runner::compiler::CompiledCode;

pub type Name = Rc<str>;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Meta {
    pub start_index: usize,
    pub end_index: usize,
}

pub trait HasMeta {
    fn get_meta(&self) -> &Meta;

    fn to_formatted_string(&self, script: &str) -> String {
        let meta = self.get_meta();
        script
            .get(meta.start_index..meta.end_index)
            .unwrap_or("")
            .to_string()
    }
}

/// Text of one parsed unit, kept for stack traces and `Function.prototype.toString`.
pub struct Source {
    pub filename: String,
    pub text: String,
    line_starts: Vec<usize>,
}
impl Source {
    pub fn new(filename: &str, text: &str) -> Self {
        let mut line_starts = vec![0];
        let mut chars = text.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            match c {
                '\r' => {
                    if let Some((_, '\n')) = chars.peek() {
                        chars.next();
                        line_starts.push(i + 2);
                    } else {
                        line_starts.push(i + 1);
                    }
                }
                '\n' => line_starts.push(i + 1),
                '\u{2028}' | '\u{2029}' => line_starts.push(i + c.len_utf8()),
                _ => {}
            }
        }
        Source {
            filename: filename.to_string(),
            text: text.to_string(),
            line_starts,
        }
    }

    /// One-based line and column of a byte offset.
    pub fn line_col(&self, position: usize) -> (usize, usize) {
        let line = match self.line_starts.binary_search(&position) {
            Ok(l) => l,
            Err(l) => l - 1,
        };
        let start = self.line_starts[line];
        let column = self
            .text
            .get(start..position.min(self.text.len()))
            .map_or(0, |s| s.chars().count());
        (line + 1, column + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CodeType {
    Global,
    Eval,
    Function,
}

/// A unit of code with its own variable scope: a program, an eval string or a function body.
pub struct Code {
    pub code_type: CodeType,
    pub id: usize,
    pub name: Option<Name>,
    pub params: Vec<Name>,
    pub strict: bool,
    pub body: Vec<StatementType>,
    /// Function declarations hoisted to this code, in source order.
    pub functions: Vec<Rc<Code>>,
    /// `var` names, deduplicated, in source order.
    pub variables: Vec<Name>,
    /// The scope node of this code's variable environment.
    pub scope: ScopeId,
    pub exists_direct_eval: bool,
    pub exists_arguments_ref: bool,
    pub exists_with: bool,
    pub source: Rc<Source>,
    pub meta: Meta,
    pub scopes: Rc<RefCell<ScopeTree>>,
    pub compiled: RefCell<Option<Rc<CompiledCode>>>,
}
impl Code {
    /// Source text of the whole function, or the program text.
    pub fn source_text(&self) -> &str {
        self.source
            .text
            .get(self.meta.start_index..self.meta.end_index)
            .unwrap_or("")
    }
}
impl fmt::Debug for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Code")
            .field("code_type", &self.code_type)
            .field("name", &self.name)
            .field("params", &self.params)
            .field("strict", &self.strict)
            .field("variables", &self.variables)
            .field("body", &self.body)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct IdentifierData {
    pub name: Name,
    /// Innermost scope node enclosing the reference.
    pub scope: ScopeId,
    pub meta: Meta,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AssignmentOperator {
    Equals,
    AddEquals,
    SubtractEquals,
    MultiplyEquals,
    DivideEquals,
    ModuloEquals,
    BitwiseLeftShiftEquals,
    BitwiseRightShiftEquals,
    BitwiseUnsignedRightShiftEquals,
    BitwiseOrEquals,
    BitwiseXorEquals,
    BitwiseAndEquals,
}
impl AssignmentOperator {
    /// The binary operator a compound assignment applies.
    pub fn binary_operator(&self) -> Option<BinaryOperator> {
        match self {
            AssignmentOperator::Equals => None,
            AssignmentOperator::AddEquals => Some(BinaryOperator::Add),
            AssignmentOperator::SubtractEquals => Some(BinaryOperator::Subtract),
            AssignmentOperator::MultiplyEquals => Some(BinaryOperator::Multiply),
            AssignmentOperator::DivideEquals => Some(BinaryOperator::Divide),
            AssignmentOperator::ModuloEquals => Some(BinaryOperator::Modulo),
            AssignmentOperator::BitwiseLeftShiftEquals => Some(BinaryOperator::BitwiseLeftShift),
            AssignmentOperator::BitwiseRightShiftEquals => Some(BinaryOperator::BitwiseRightShift),
            AssignmentOperator::BitwiseUnsignedRightShiftEquals => {
                Some(BinaryOperator::BitwiseUnsignedRightShift)
            }
            AssignmentOperator::BitwiseOrEquals => Some(BinaryOperator::BitwiseOr),
            AssignmentOperator::BitwiseXorEquals => Some(BinaryOperator::BitwiseXor),
            AssignmentOperator::BitwiseAndEquals => Some(BinaryOperator::BitwiseAnd),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOperator {
    Minus,
    Plus,
    LogicalNot,
    BitwiseNot,
    TypeOf,
    Void,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpdateOperator {
    PlusPlus,
    MinusMinus,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOperator {
    LooselyEqual,
    LooselyUnequal,
    StrictlyEqual,
    StrictlyUnequal,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    BitwiseLeftShift,
    BitwiseRightShift,
    BitwiseUnsignedRightShift,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    BitwiseOr,
    BitwiseAnd,
    BitwiseXor,
    In,
    InstanceOf,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogicalOperator {
    Or,
    And,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralType {
    NullLiteral,
    BooleanLiteral(bool),
    StringLiteral(Name),
    NumberLiteral(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyKind {
    Init,
    Get,
    Set,
}

#[derive(Debug)]
pub struct PropertyData {
    pub key: Name,
    pub kind: PropertyKind,
    /// The value expression for `Init`, a function expression for `Get` and `Set`.
    pub value: ExpressionType,
}

#[derive(Debug)]
pub enum ExpressionType {
    Literal {
        meta: Meta,
        value: LiteralType,
    },
    ThisExpression {
        meta: Meta,
    },
    Identifier(IdentifierData),
    ArrayExpression {
        meta: Meta,
        elements: Vec<Option<ExpressionType>>,
    },
    ObjectExpression {
        meta: Meta,
        properties: Vec<PropertyData>,
    },
    FunctionExpression {
        meta: Meta,
        code: Rc<Code>,
        /// Scope node binding the function's own name, for named function expressions.
        name_scope: Option<ScopeId>,
    },
    MemberExpression {
        meta: Meta,
        object: Box<ExpressionType>,
        property: Box<ExpressionType>,
    },
    CallExpression {
        meta: Meta,
        callee: Box<ExpressionType>,
        arguments: Vec<ExpressionType>,
    },
    NewExpression {
        meta: Meta,
        callee: Box<ExpressionType>,
        arguments: Vec<ExpressionType>,
    },
    UnaryExpression {
        meta: Meta,
        operator: UnaryOperator,
        argument: Box<ExpressionType>,
    },
    UpdateExpression {
        meta: Meta,
        operator: UpdateOperator,
        argument: Box<ExpressionType>,
        prefix: bool,
    },
    BinaryExpression {
        meta: Meta,
        operator: BinaryOperator,
        left: Box<ExpressionType>,
        right: Box<ExpressionType>,
    },
    LogicalExpression {
        meta: Meta,
        operator: LogicalOperator,
        left: Box<ExpressionType>,
        right: Box<ExpressionType>,
    },
    ConditionalExpression {
        meta: Meta,
        test: Box<ExpressionType>,
        consequent: Box<ExpressionType>,
        alternate: Box<ExpressionType>,
    },
    AssignmentExpression {
        meta: Meta,
        operator: AssignmentOperator,
        left: Box<ExpressionType>,
        right: Box<ExpressionType>,
    },
    SequenceExpression {
        meta: Meta,
        expressions: Vec<ExpressionType>,
    },
}

impl HasMeta for ExpressionType {
    fn get_meta(&self) -> &Meta {
        match self {
            ExpressionType::Literal { meta, .. } => meta,
            ExpressionType::ThisExpression { meta } => meta,
            ExpressionType::Identifier(data) => &data.meta,
            ExpressionType::ArrayExpression { meta, .. } => meta,
            ExpressionType::ObjectExpression { meta, .. } => meta,
            ExpressionType::FunctionExpression { meta, .. } => meta,
            ExpressionType::MemberExpression { meta, .. } => meta,
            ExpressionType::CallExpression { meta, .. } => meta,
            ExpressionType::NewExpression { meta, .. } => meta,
            ExpressionType::UnaryExpression { meta, .. } => meta,
            ExpressionType::UpdateExpression { meta, .. } => meta,
            ExpressionType::BinaryExpression { meta, .. } => meta,
            ExpressionType::LogicalExpression { meta, .. } => meta,
            ExpressionType::ConditionalExpression { meta, .. } => meta,
            ExpressionType::AssignmentExpression { meta, .. } => meta,
            ExpressionType::SequenceExpression { meta, .. } => meta,
        }
    }
}

impl ExpressionType {
    pub fn is_valid_simple_assignment_target(&self) -> bool {
        matches!(
            self,
            ExpressionType::Identifier(_) | ExpressionType::MemberExpression { .. }
        )
    }
}

#[derive(Debug)]
pub struct VariableDeclaratorData {
    pub meta: Meta,
    pub id: IdentifierData,
    pub init: Option<ExpressionType>,
}

#[derive(Debug)]
pub enum VariableDeclarationOrExpression {
    VariableDeclaration(Vec<VariableDeclaratorData>),
    Expression(ExpressionType),
}

#[derive(Debug)]
pub enum ForInTarget {
    VariableDeclaration(VariableDeclaratorData),
    Expression(ExpressionType),
}

#[derive(Debug)]
pub struct SwitchCaseData {
    pub meta: Meta,
    /// `None` for the `default` clause.
    pub test: Option<ExpressionType>,
    pub consequent: Vec<StatementType>,
}

#[derive(Debug)]
pub struct CatchClauseData {
    pub meta: Meta,
    pub param: IdentifierData,
    /// Scope node binding the catch parameter.
    pub scope: ScopeId,
    pub body: Vec<StatementType>,
}

#[derive(Debug)]
pub enum StatementType {
    ExpressionStatement {
        meta: Meta,
        expression: ExpressionType,
    },
    BlockStatement {
        meta: Meta,
        body: Vec<StatementType>,
    },
    VariableStatement {
        meta: Meta,
        declarations: Vec<VariableDeclaratorData>,
    },
    /// A hoisted function declaration; its only effect at its position is the empty completion.
    FunctionDeclaration {
        meta: Meta,
    },
    EmptyStatement {
        meta: Meta,
    },
    DebuggerStatement {
        meta: Meta,
    },
    ReturnStatement {
        meta: Meta,
        argument: Option<ExpressionType>,
    },
    BreakStatement {
        meta: Meta,
        label: Option<Name>,
    },
    ContinueStatement {
        meta: Meta,
        label: Option<Name>,
    },
    LabeledStatement {
        meta: Meta,
        label: Name,
        body: Box<StatementType>,
    },
    IfStatement {
        meta: Meta,
        test: ExpressionType,
        consequent: Box<StatementType>,
        alternate: Option<Box<StatementType>>,
    },
    SwitchStatement {
        meta: Meta,
        discriminant: ExpressionType,
        cases: Vec<SwitchCaseData>,
    },
    ThrowStatement {
        meta: Meta,
        argument: ExpressionType,
    },
    TryStatement {
        meta: Meta,
        block: Vec<StatementType>,
        handler: Option<CatchClauseData>,
        finalizer: Option<Vec<StatementType>>,
    },
    WhileStatement {
        meta: Meta,
        test: ExpressionType,
        body: Box<StatementType>,
    },
    DoWhileStatement {
        meta: Meta,
        test: ExpressionType,
        body: Box<StatementType>,
    },
    ForStatement {
        meta: Meta,
        init: Option<VariableDeclarationOrExpression>,
        test: Option<ExpressionType>,
        update: Option<ExpressionType>,
        body: Box<StatementType>,
    },
    ForInStatement {
        meta: Meta,
        left: ForInTarget,
        right: ExpressionType,
        body: Box<StatementType>,
    },
    WithStatement {
        meta: Meta,
        object: ExpressionType,
        /// Scope node of the object environment.
        scope: ScopeId,
        body: Box<StatementType>,
    },
}

impl HasMeta for StatementType {
    fn get_meta(&self) -> &Meta {
        match self {
            StatementType::ExpressionStatement { meta, .. } => meta,
            StatementType::BlockStatement { meta, .. } => meta,
            StatementType::VariableStatement { meta, .. } => meta,
            StatementType::FunctionDeclaration { meta } => meta,
            StatementType::EmptyStatement { meta } => meta,
            StatementType::DebuggerStatement { meta } => meta,
            StatementType::ReturnStatement { meta, .. } => meta,
            StatementType::BreakStatement { meta, .. } => meta,
            StatementType::ContinueStatement { meta, .. } => meta,
            StatementType::LabeledStatement { meta, .. } => meta,
            StatementType::IfStatement { meta, .. } => meta,
            StatementType::SwitchStatement { meta, .. } => meta,
            StatementType::ThrowStatement { meta, .. } => meta,
            StatementType::TryStatement { meta, .. } => meta,
            StatementType::WhileStatement { meta, .. } => meta,
            StatementType::DoWhileStatement { meta, .. } => meta,
            StatementType::ForStatement { meta, .. } => meta,
            StatementType::ForInStatement { meta, .. } => meta,
            StatementType::WithStatement { meta, .. } => meta,
        }
    }
}
