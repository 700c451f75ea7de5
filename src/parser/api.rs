use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use pest::error::{Error, ErrorVariant, LineColLocation};
use pest::iterators::Pair;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;

use super::ast::*;
use super::static_semantics::{ScopeId, ScopeTree, ScopeType};
use super::util::{decode_identifier, decode_string_literal, parse_numeric_literal};
use crate::runner::ds::operations::type_conversion::number_to_string;

#[derive(Parser)]
#[grammar = "parser/js_grammar.pest"] // relative to src
pub struct JsParser;

pub type ParseError = Error<Rule>;

lazy_static! {
    static ref PRATT_PARSER: PrattParser<Rule> = PrattParser::new()
        .op(Op::infix(Rule::op_or, Assoc::Left))
        .op(Op::infix(Rule::op_and, Assoc::Left))
        .op(Op::infix(Rule::op_bit_or, Assoc::Left))
        .op(Op::infix(Rule::op_bit_xor, Assoc::Left))
        .op(Op::infix(Rule::op_bit_and, Assoc::Left))
        .op(Op::infix(Rule::op_strict_eq, Assoc::Left)
            | Op::infix(Rule::op_strict_ne, Assoc::Left)
            | Op::infix(Rule::op_eq, Assoc::Left)
            | Op::infix(Rule::op_ne, Assoc::Left))
        .op(Op::infix(Rule::op_lt, Assoc::Left)
            | Op::infix(Rule::op_gt, Assoc::Left)
            | Op::infix(Rule::op_le, Assoc::Left)
            | Op::infix(Rule::op_ge, Assoc::Left)
            | Op::infix(Rule::op_instanceof, Assoc::Left)
            | Op::infix(Rule::op_in, Assoc::Left))
        .op(Op::infix(Rule::op_shl, Assoc::Left)
            | Op::infix(Rule::op_shr, Assoc::Left)
            | Op::infix(Rule::op_ushr, Assoc::Left))
        .op(Op::infix(Rule::op_add, Assoc::Left) | Op::infix(Rule::op_sub, Assoc::Left))
        .op(Op::infix(Rule::op_mul, Assoc::Left)
            | Op::infix(Rule::op_div, Assoc::Left)
            | Op::infix(Rule::op_mod, Assoc::Left));
    static ref STRICT_RESERVED_WORDS: HashSet<&'static str> = [
        "implements",
        "interface",
        "let",
        "package",
        "private",
        "protected",
        "public",
        "static",
        "yield",
    ]
    .iter()
    .cloned()
    .collect();
}

#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// Lets the scope analyzer turn bindings into local slots and elide environments.
    pub collapse_environments: bool,
}
impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            collapse_environments: true,
        }
    }
}

/// Parses global code.
pub fn parse_program(
    text: &str,
    filename: &str,
    options: ParseOptions,
) -> Result<Rc<Code>, ParseError> {
    let program = parse_unit(text)?;
    let source = Rc::new(Source::new(filename, text));
    let builder = AstBuilder::new(source, CodeType::Global, false);
    builder.build_program(program, options)
}

/// Parses the argument of `eval`. `strict_caller` is true for a direct eval from strict code.
pub fn parse_eval(
    text: &str,
    strict_caller: bool,
    options: ParseOptions,
) -> Result<Rc<Code>, ParseError> {
    let program = parse_unit(text)?;
    let source = Rc::new(Source::new("<eval>", text));
    let builder = AstBuilder::new(source, CodeType::Eval, strict_caller);
    builder.build_program(program, options)
}

/// Parses the code of a function created by the `Function` constructor.
pub fn parse_function(
    params: &str,
    body: &str,
    options: ParseOptions,
) -> Result<Rc<Code>, ParseError> {
    let text = format!("function anonymous({}\n) {{\n{}\n}}", params, body);
    let program = parse_unit(&text)?;
    let source = Rc::new(Source::new("<function>", &text));
    let mut builder = AstBuilder::new(source, CodeType::Global, false);
    builder.wrapper = true;
    let span = program.as_span();
    let code = builder.build_program(program, options)?;
    match (code.body.len(), code.functions.first()) {
        (1, Some(f)) if code.functions.len() == 1 => Ok(f.clone()),
        _ => Err(Error::new_from_span(
            ErrorVariant::CustomError {
                message: "Invalid function parameters or body".to_string(),
            },
            span,
        )),
    }
}

fn parse_unit(text: &str) -> Result<Pair<Rule>, ParseError> {
    let mut pairs = JsParser::parse(Rule::program, text)?;
    match pairs.next() {
        Some(p) => Ok(p),
        None => Err(Error::new_from_pos(
            ErrorVariant::CustomError {
                message: "Empty parse result".to_string(),
            },
            pest::Position::from_start(text),
        )),
    }
}

/// One-line description of a parse error, used as the message of script `SyntaxError`s.
pub fn describe_error(e: &ParseError) -> String {
    let (line, column) = match e.line_col {
        LineColLocation::Pos(p) => p,
        LineColLocation::Span(p, _) => p,
    };
    let message = match &e.variant {
        ErrorVariant::CustomError { message } => message.clone(),
        ErrorVariant::ParsingError { .. } => "Unexpected token".to_string(),
    };
    format!("{} ({}:{})", message, line, column)
}

fn get_unexpected_error(id: i32, pair: &Pair<Rule>) -> ParseError {
    let message = format!("Unexpected state reached [{:?}] - {}", pair.as_rule(), id);
    Error::new_from_span(ErrorVariant::CustomError { message }, pair.as_span())
}

fn syntax_error(pair: &Pair<Rule>, message: &str) -> ParseError {
    Error::new_from_span(
        ErrorVariant::CustomError {
            message: message.to_string(),
        },
        pair.as_span(),
    )
}

fn meta_of(pair: &Pair<Rule>) -> Meta {
    let span = pair.as_span();
    Meta {
        start_index: span.start(),
        end_index: span.end(),
    }
}

fn span_meta(from: &Meta, to: &Meta) -> Meta {
    Meta {
        start_index: from.start_index,
        end_index: to.end_index,
    }
}

fn is_eval_or_arguments(name: &str) -> bool {
    name == "eval" || name == "arguments"
}

/// Scans the directive prologue of a statement list.
fn has_use_strict(statements: &[Pair<Rule>]) -> bool {
    for s in statements {
        if s.as_rule() != Rule::expression_statement {
            break;
        }
        let expression = match s.clone().into_inner().next() {
            Some(e) => e,
            None => break,
        };
        let raw = expression.as_str();
        let is_string_only = expression
            .clone()
            .into_inner()
            .flatten()
            .any(|p| p.as_rule() == Rule::string_literal && p.as_str().len() == raw.len());
        if !is_string_only {
            break;
        }
        if raw == "\"use strict\"" || raw == "'use strict'" {
            return true;
        }
    }
    false
}

fn is_iteration(pair: &Pair<Rule>) -> bool {
    match pair.as_rule() {
        Rule::do_while_statement
        | Rule::while_statement
        | Rule::for_statement
        | Rule::for_in_statement => true,
        Rule::labelled_statement => pair
            .clone()
            .into_inner()
            .nth(1)
            .map_or(false, |p| is_iteration(&p)),
        _ => false,
    }
}

fn binary_operator_of(rule: Rule) -> Option<BinaryOperator> {
    Some(match rule {
        Rule::op_bit_or => BinaryOperator::BitwiseOr,
        Rule::op_bit_xor => BinaryOperator::BitwiseXor,
        Rule::op_bit_and => BinaryOperator::BitwiseAnd,
        Rule::op_strict_eq => BinaryOperator::StrictlyEqual,
        Rule::op_strict_ne => BinaryOperator::StrictlyUnequal,
        Rule::op_eq => BinaryOperator::LooselyEqual,
        Rule::op_ne => BinaryOperator::LooselyUnequal,
        Rule::op_lt => BinaryOperator::LessThan,
        Rule::op_gt => BinaryOperator::GreaterThan,
        Rule::op_le => BinaryOperator::LessThanEqual,
        Rule::op_ge => BinaryOperator::GreaterThanEqual,
        Rule::op_instanceof => BinaryOperator::InstanceOf,
        Rule::op_in => BinaryOperator::In,
        Rule::op_shl => BinaryOperator::BitwiseLeftShift,
        Rule::op_shr => BinaryOperator::BitwiseRightShift,
        Rule::op_ushr => BinaryOperator::BitwiseUnsignedRightShift,
        Rule::op_add => BinaryOperator::Add,
        Rule::op_sub => BinaryOperator::Subtract,
        Rule::op_mul => BinaryOperator::Multiply,
        Rule::op_div => BinaryOperator::Divide,
        Rule::op_mod => BinaryOperator::Modulo,
        _ => return None,
    })
}

fn assignment_operator_of(op: &str) -> Option<AssignmentOperator> {
    Some(match op {
        "=" => AssignmentOperator::Equals,
        "+=" => AssignmentOperator::AddEquals,
        "-=" => AssignmentOperator::SubtractEquals,
        "*=" => AssignmentOperator::MultiplyEquals,
        "/=" => AssignmentOperator::DivideEquals,
        "%=" => AssignmentOperator::ModuloEquals,
        "<<=" => AssignmentOperator::BitwiseLeftShiftEquals,
        ">>=" => AssignmentOperator::BitwiseRightShiftEquals,
        ">>>=" => AssignmentOperator::BitwiseUnsignedRightShiftEquals,
        "|=" => AssignmentOperator::BitwiseOrEquals,
        "^=" => AssignmentOperator::BitwiseXorEquals,
        "&=" => AssignmentOperator::BitwiseAndEquals,
        _ => return None,
    })
}

/// Per-code state while its body is being built.
struct CodeState {
    code_id: usize,
    code_type: CodeType,
    strict: bool,
    scope: ScopeId,
    functions: Vec<Rc<Code>>,
    variables: Vec<Name>,
    exists_direct_eval: bool,
    exists_arguments_ref: bool,
    exists_with: bool,
    /// Enclosing labels and whether each one labels an iteration.
    labels: Vec<(Name, bool)>,
    iteration_depth: usize,
    breakable_depth: usize,
}
impl CodeState {
    fn new(code_id: usize, code_type: CodeType, strict: bool, scope: ScopeId) -> Self {
        CodeState {
            code_id,
            code_type,
            strict,
            scope,
            functions: vec![],
            variables: vec![],
            exists_direct_eval: false,
            exists_arguments_ref: false,
            exists_with: false,
            labels: vec![],
            iteration_depth: 0,
            breakable_depth: 0,
        }
    }
}

struct AstBuilder {
    source: Rc<Source>,
    scopes: Rc<RefCell<ScopeTree>>,
    code: CodeState,
    /// Innermost scope node at the current position.
    scope: ScopeId,
    /// Set for the synthetic wrapper of `Function` constructor code; its function name is not
    /// a binding of anything.
    wrapper: bool,
}

struct FunctionParts<'i> {
    name: Option<Pair<'i, Rule>>,
    params: Vec<Pair<'i, Rule>>,
    body: Pair<'i, Rule>,
    meta: Meta,
    outer: ScopeId,
}

impl AstBuilder {
    fn new(source: Rc<Source>, code_type: CodeType, strict: bool) -> Self {
        let mut tree = ScopeTree::new();
        let code_id = tree.new_code(code_type);
        let scope_type = if code_type == CodeType::Eval {
            ScopeType::Eval
        } else {
            ScopeType::Global
        };
        let scope = tree.new_env(scope_type, None, code_id);
        AstBuilder {
            source,
            scopes: Rc::new(RefCell::new(tree)),
            code: CodeState::new(code_id, code_type, strict, scope),
            scope,
            wrapper: false,
        }
    }

    fn build_program(
        mut self,
        program: Pair<Rule>,
        options: ParseOptions,
    ) -> Result<Rc<Code>, ParseError> {
        let meta = Meta {
            start_index: 0,
            end_index: self.source.text.len(),
        };
        let statements: Vec<Pair<Rule>> = program
            .into_inner()
            .filter(|p| p.as_rule() != Rule::EOI)
            .collect();
        if has_use_strict(&statements) {
            self.code.strict = true;
        }
        let body = self.build_statement_list(statements, true)?;
        let wrapper = self.wrapper;
        let code = finish_code(&self.scopes, &self.source, self.code, None, vec![], body, meta, !wrapper);
        self.scopes
            .borrow_mut()
            .analyze(options.collapse_environments);
        Ok(code)
    }

    fn check_identifier(&self, pair: &Pair<Rule>, strict: bool) -> Result<Name, ParseError> {
        let name = decode_identifier(pair.as_str()).map_err(|m| syntax_error(pair, &m))?;
        if strict && STRICT_RESERVED_WORDS.contains(name.as_str()) {
            return Err(syntax_error(pair, "Unexpected strict mode reserved word"));
        }
        Ok(Rc::from(name))
    }

    fn binding_name(&self, pair: &Pair<Rule>, strict: bool) -> Result<Name, ParseError> {
        let name = self.check_identifier(pair, strict)?;
        if strict && is_eval_or_arguments(&name) {
            return Err(syntax_error(pair, "Unexpected eval or arguments in strict mode"));
        }
        Ok(name)
    }

    fn identifier_reference(&mut self, pair: &Pair<Rule>) -> Result<IdentifierData, ParseError> {
        let name = self.check_identifier(pair, self.code.strict)?;
        if &*name == "arguments" {
            self.code.exists_arguments_ref = true;
        }
        self.scopes.borrow_mut().add_ref(self.scope, &name);
        Ok(IdentifierData {
            name,
            scope: self.scope,
            meta: meta_of(pair),
        })
    }

    fn declare_variable(&mut self, name: &Name) {
        if !self.code.variables.contains(name) {
            self.code.variables.push(name.clone());
        }
    }

    fn check_assignment_target(
        &self,
        target: &ExpressionType,
        pair: &Pair<Rule>,
    ) -> Result<(), ParseError> {
        if !target.is_valid_simple_assignment_target() {
            return Err(syntax_error(pair, "Invalid left-hand side in assignment"));
        }
        if let ExpressionType::Identifier(id) = target {
            if self.code.strict && is_eval_or_arguments(&id.name) {
                return Err(syntax_error(pair, "Unexpected eval or arguments in strict mode"));
            }
        }
        Ok(())
    }

    // Functions

    fn build_function(&mut self, parts: FunctionParts) -> Result<Rc<Code>, ParseError> {
        let body_statements: Vec<Pair<Rule>> = parts.body.into_inner().collect();
        let strict = self.code.strict || has_use_strict(&body_statements);
        let name = match &parts.name {
            Some(p) => Some(self.binding_name(p, strict)?),
            None => None,
        };
        let mut params: Vec<Name> = vec![];
        for p in &parts.params {
            let n = self.binding_name(p, strict)?;
            if strict && params.contains(&n) {
                return Err(syntax_error(
                    p,
                    "Duplicate parameter name not allowed in this context",
                ));
            }
            params.push(n);
        }
        let (code_id, scope) = {
            let mut tree = self.scopes.borrow_mut();
            let code_id = tree.new_code(CodeType::Function);
            let scope = tree.new_env(ScopeType::Function, Some(parts.outer), code_id);
            for p in &params {
                tree.add_def(scope, p);
            }
            (code_id, scope)
        };
        let saved_code = std::mem::replace(
            &mut self.code,
            CodeState::new(code_id, CodeType::Function, strict, scope),
        );
        let saved_scope = std::mem::replace(&mut self.scope, scope);
        let body = self.build_statement_list(body_statements, true);
        self.scope = saved_scope;
        let state = std::mem::replace(&mut self.code, saved_code);
        let body = body?;
        Ok(finish_code(
            &self.scopes,
            &self.source,
            state,
            name,
            params,
            body,
            parts.meta,
            true,
        ))
    }

    fn build_function_declaration(
        &mut self,
        pair: Pair<Rule>,
        top_level: bool,
    ) -> Result<StatementType, ParseError> {
        if !top_level && self.code.strict {
            return Err(syntax_error(
                &pair,
                "In strict mode code, functions can only be declared at top level",
            ));
        }
        let meta = meta_of(&pair);
        let mut inner = pair.clone().into_inner();
        let (name, params, body) = match (inner.next(), inner.next(), inner.next()) {
            (Some(n), Some(p), Some(b)) => (n, p, b),
            _ => return Err(get_unexpected_error(1, &pair)),
        };
        let code = self.build_function(FunctionParts {
            name: Some(name),
            params: params.into_inner().collect(),
            body,
            meta,
            outer: self.code.scope,
        })?;
        self.code.functions.push(code);
        Ok(StatementType::FunctionDeclaration { meta })
    }

    fn build_function_expression(&mut self, pair: Pair<Rule>) -> Result<ExpressionType, ParseError> {
        let meta = meta_of(&pair);
        let mut name = None;
        let mut params = vec![];
        let mut body = None;
        for p in pair.clone().into_inner() {
            match p.as_rule() {
                Rule::identifier => name = Some(p),
                Rule::formal_parameters => params = p.into_inner().collect(),
                Rule::function_body => body = Some(p),
                _ => return Err(get_unexpected_error(2, &p)),
            }
        }
        let body = match body {
            Some(b) => b,
            None => return Err(get_unexpected_error(3, &pair)),
        };
        let name_scope = match &name {
            Some(n) => {
                let binding = self.check_identifier(n, self.code.strict)?;
                let mut tree = self.scopes.borrow_mut();
                let s = tree.new_env(ScopeType::NamedFunction, Some(self.scope), self.code.code_id);
                tree.add_def(s, &binding);
                Some(s)
            }
            None => None,
        };
        let code = self.build_function(FunctionParts {
            name,
            params,
            body,
            meta,
            outer: name_scope.unwrap_or(self.scope),
        })?;
        Ok(ExpressionType::FunctionExpression {
            meta,
            code,
            name_scope,
        })
    }

    // Statements

    fn build_statement_list(
        &mut self,
        pairs: Vec<Pair<Rule>>,
        top_level: bool,
    ) -> Result<Vec<StatementType>, ParseError> {
        let mut statements = Vec::with_capacity(pairs.len());
        for p in pairs {
            statements.push(self.build_statement(p, top_level)?);
        }
        Ok(statements)
    }

    fn build_statement(&mut self, pair: Pair<Rule>, top_level: bool) -> Result<StatementType, ParseError> {
        let meta = meta_of(&pair);
        Ok(match pair.as_rule() {
            Rule::block => StatementType::BlockStatement {
                meta,
                body: self.build_statement_list(pair.into_inner().collect(), false)?,
            },
            Rule::variable_statement => {
                let mut declarations = vec![];
                for list in pair.into_inner() {
                    for d in list.into_inner() {
                        declarations.push(self.build_variable_declaration(d)?);
                    }
                }
                StatementType::VariableStatement { meta, declarations }
            }
            Rule::empty_statement => StatementType::EmptyStatement { meta },
            Rule::function_declaration => self.build_function_declaration(pair, top_level)?,
            Rule::expression_statement => {
                let expression = match pair.clone().into_inner().next() {
                    Some(e) => self.build_expression(e)?,
                    None => return Err(get_unexpected_error(4, &pair)),
                };
                StatementType::ExpressionStatement { meta, expression }
            }
            Rule::if_statement => {
                let mut inner = pair.clone().into_inner();
                let (test, consequent) = match (inner.next(), inner.next()) {
                    (Some(t), Some(c)) => (t, c),
                    _ => return Err(get_unexpected_error(5, &pair)),
                };
                let test = self.build_expression(test)?;
                let consequent = Box::new(self.build_statement(consequent, false)?);
                let alternate = match inner.next() {
                    Some(a) => Some(Box::new(self.build_statement(a, false)?)),
                    None => None,
                };
                StatementType::IfStatement {
                    meta,
                    test,
                    consequent,
                    alternate,
                }
            }
            Rule::do_while_statement => {
                let mut inner = pair.clone().into_inner();
                let (body, test) = match (inner.next(), inner.next()) {
                    (Some(b), Some(t)) => (b, t),
                    _ => return Err(get_unexpected_error(6, &pair)),
                };
                let body = Box::new(self.build_loop_body(body)?);
                let test = self.build_expression(test)?;
                StatementType::DoWhileStatement { meta, test, body }
            }
            Rule::while_statement => {
                let mut inner = pair.clone().into_inner();
                let (test, body) = match (inner.next(), inner.next()) {
                    (Some(t), Some(b)) => (t, b),
                    _ => return Err(get_unexpected_error(7, &pair)),
                };
                let test = self.build_expression(test)?;
                let body = Box::new(self.build_loop_body(body)?);
                StatementType::WhileStatement { meta, test, body }
            }
            Rule::for_statement => self.build_for_statement(pair)?,
            Rule::for_in_statement => self.build_for_in_statement(pair)?,
            Rule::continue_statement => {
                let label = match pair.clone().into_inner().next() {
                    Some(l) => {
                        let name = self.check_identifier(&l, self.code.strict)?;
                        match self.code.labels.iter().find(|(n, _)| *n == name) {
                            Some((_, true)) => {}
                            Some((_, false)) => {
                                return Err(syntax_error(&l, "Illegal continue statement"))
                            }
                            None => return Err(syntax_error(&l, "Undefined label")),
                        }
                        Some(name)
                    }
                    None => None,
                };
                if self.code.iteration_depth == 0 {
                    return Err(syntax_error(&pair, "Illegal continue statement"));
                }
                StatementType::ContinueStatement { meta, label }
            }
            Rule::break_statement => {
                let label = match pair.clone().into_inner().next() {
                    Some(l) => {
                        let name = self.check_identifier(&l, self.code.strict)?;
                        if !self.code.labels.iter().any(|(n, _)| *n == name) {
                            return Err(syntax_error(&l, "Undefined label"));
                        }
                        Some(name)
                    }
                    None => {
                        if self.code.breakable_depth == 0 {
                            return Err(syntax_error(&pair, "Illegal break statement"));
                        }
                        None
                    }
                };
                StatementType::BreakStatement { meta, label }
            }
            Rule::return_statement => {
                if self.code.code_type != CodeType::Function {
                    return Err(syntax_error(&pair, "Illegal return statement"));
                }
                let argument = match pair.into_inner().next() {
                    Some(e) => Some(self.build_expression(e)?),
                    None => None,
                };
                StatementType::ReturnStatement { meta, argument }
            }
            Rule::with_statement => {
                if self.code.strict {
                    return Err(syntax_error(
                        &pair,
                        "Strict mode code may not include a with statement",
                    ));
                }
                let mut inner = pair.clone().into_inner();
                let (object, body) = match (inner.next(), inner.next()) {
                    (Some(o), Some(b)) => (o, b),
                    _ => return Err(get_unexpected_error(8, &pair)),
                };
                let object = self.build_expression(object)?;
                self.code.exists_with = true;
                let scope = self.scopes.borrow_mut().new_env(
                    ScopeType::With,
                    Some(self.scope),
                    self.code.code_id,
                );
                let saved = std::mem::replace(&mut self.scope, scope);
                let body = self.build_statement(body, false);
                self.scope = saved;
                StatementType::WithStatement {
                    meta,
                    object,
                    scope,
                    body: Box::new(body?),
                }
            }
            Rule::switch_statement => self.build_switch_statement(pair)?,
            Rule::throw_statement => match pair.clone().into_inner().next() {
                Some(e) => StatementType::ThrowStatement {
                    meta,
                    argument: self.build_expression(e)?,
                },
                None => return Err(get_unexpected_error(9, &pair)),
            },
            Rule::try_statement => self.build_try_statement(pair)?,
            Rule::debugger_statement => StatementType::DebuggerStatement { meta },
            Rule::labelled_statement => {
                let mut inner = pair.clone().into_inner();
                let (label_pair, body) = match (inner.next(), inner.next()) {
                    (Some(l), Some(b)) => (l, b),
                    _ => return Err(get_unexpected_error(10, &pair)),
                };
                let label = self.check_identifier(&label_pair, self.code.strict)?;
                if self.code.labels.iter().any(|(n, _)| *n == label) {
                    return Err(syntax_error(&label_pair, "Label has already been declared"));
                }
                let is_loop = is_iteration(&body);
                self.code.labels.push((label.clone(), is_loop));
                let body = self.build_statement(body, false);
                self.code.labels.pop();
                StatementType::LabeledStatement {
                    meta,
                    label,
                    body: Box::new(body?),
                }
            }
            _ => return Err(get_unexpected_error(11, &pair)),
        })
    }

    fn build_loop_body(&mut self, pair: Pair<Rule>) -> Result<StatementType, ParseError> {
        self.code.iteration_depth += 1;
        self.code.breakable_depth += 1;
        let body = self.build_statement(pair, false);
        self.code.iteration_depth -= 1;
        self.code.breakable_depth -= 1;
        body
    }

    fn build_variable_declaration(
        &mut self,
        pair: Pair<Rule>,
    ) -> Result<VariableDeclaratorData, ParseError> {
        let meta = meta_of(&pair);
        let mut inner = pair.clone().into_inner();
        let id_pair = match inner.next() {
            Some(p) => p,
            None => return Err(get_unexpected_error(12, &pair)),
        };
        let name = self.binding_name(&id_pair, self.code.strict)?;
        self.declare_variable(&name);
        let init = match inner.next() {
            Some(e) => {
                self.scopes.borrow_mut().add_ref(self.scope, &name);
                Some(self.build_assignment_expression(e)?)
            }
            None => None,
        };
        Ok(VariableDeclaratorData {
            meta,
            id: IdentifierData {
                name,
                scope: self.scope,
                meta: meta_of(&id_pair),
            },
            init,
        })
    }

    fn build_for_statement(&mut self, pair: Pair<Rule>) -> Result<StatementType, ParseError> {
        let meta = meta_of(&pair);
        let mut init = None;
        let mut test = None;
        let mut update = None;
        let mut body = None;
        for p in pair.clone().into_inner() {
            match p.as_rule() {
                Rule::for_init => {
                    let mut declarations = vec![];
                    let mut expression = None;
                    for i in p.into_inner() {
                        match i.as_rule() {
                            Rule::variable_declaration_list => {
                                for d in i.into_inner() {
                                    declarations.push(self.build_variable_declaration(d)?);
                                }
                            }
                            Rule::expression => expression = Some(self.build_expression(i)?),
                            _ => return Err(get_unexpected_error(13, &i)),
                        }
                    }
                    init = Some(match expression {
                        Some(e) => VariableDeclarationOrExpression::Expression(e),
                        None => VariableDeclarationOrExpression::VariableDeclaration(declarations),
                    });
                }
                Rule::for_test => {
                    if let Some(e) = p.into_inner().next() {
                        test = Some(self.build_expression(e)?);
                    }
                }
                Rule::for_update => {
                    if let Some(e) = p.into_inner().next() {
                        update = Some(self.build_expression(e)?);
                    }
                }
                _ => body = Some(self.build_loop_body(p)?),
            }
        }
        match body {
            Some(body) => Ok(StatementType::ForStatement {
                meta,
                init,
                test,
                update,
                body: Box::new(body),
            }),
            None => Err(get_unexpected_error(14, &pair)),
        }
    }

    fn build_for_in_statement(&mut self, pair: Pair<Rule>) -> Result<StatementType, ParseError> {
        let meta = meta_of(&pair);
        let mut inner = pair.clone().into_inner();
        let (left, right, body) = match (inner.next(), inner.next(), inner.next()) {
            (Some(l), Some(r), Some(b)) => (l, r, b),
            _ => return Err(get_unexpected_error(15, &pair)),
        };
        let left = if left.as_rule() == Rule::for_var_declaration {
            let declaration = match left.clone().into_inner().next() {
                Some(d) => self.build_variable_declaration(d)?,
                None => return Err(get_unexpected_error(16, &left)),
            };
            self.scopes.borrow_mut().add_ref(self.scope, &declaration.id.name);
            ForInTarget::VariableDeclaration(declaration)
        } else {
            let target = self.build_left_hand_side_expression(left.clone())?;
            self.check_assignment_target(&target, &left)?;
            ForInTarget::Expression(target)
        };
        let right = self.build_expression(right)?;
        let body = self.build_loop_body(body)?;
        Ok(StatementType::ForInStatement {
            meta,
            left,
            right,
            body: Box::new(body),
        })
    }

    fn build_switch_statement(&mut self, pair: Pair<Rule>) -> Result<StatementType, ParseError> {
        let meta = meta_of(&pair);
        let mut inner = pair.clone().into_inner();
        let discriminant = match inner.next() {
            Some(d) => self.build_expression(d)?,
            None => return Err(get_unexpected_error(17, &pair)),
        };
        self.code.breakable_depth += 1;
        let cases = self.build_case_clauses(inner);
        self.code.breakable_depth -= 1;
        Ok(StatementType::SwitchStatement {
            meta,
            discriminant,
            cases: cases?,
        })
    }

    fn build_case_clauses(
        &mut self,
        clauses: pest::iterators::Pairs<Rule>,
    ) -> Result<Vec<SwitchCaseData>, ParseError> {
        let mut cases = vec![];
        let mut seen_default = false;
        for clause in clauses {
            let meta = meta_of(&clause);
            let mut inner = clause.clone().into_inner();
            let test = if clause.as_rule() == Rule::default_clause {
                if seen_default {
                    return Err(syntax_error(
                        &clause,
                        "More than one default clause in switch statement",
                    ));
                }
                seen_default = true;
                None
            } else {
                match inner.next() {
                    Some(e) => Some(self.build_expression(e)?),
                    None => return Err(get_unexpected_error(47, &clause)),
                }
            };
            let consequent = self.build_statement_list(inner.collect(), false)?;
            cases.push(SwitchCaseData {
                meta,
                test,
                consequent,
            });
        }
        Ok(cases)
    }

    fn build_try_statement(&mut self, pair: Pair<Rule>) -> Result<StatementType, ParseError> {
        let meta = meta_of(&pair);
        let mut block = None;
        let mut handler = None;
        let mut finalizer = None;
        for p in pair.clone().into_inner() {
            match p.as_rule() {
                Rule::block => block = Some(self.build_statement_list(p.into_inner().collect(), false)?),
                Rule::catch_clause => {
                    let catch_meta = meta_of(&p);
                    let mut inner = p.clone().into_inner();
                    let (param, body) = match (inner.next(), inner.next()) {
                        (Some(i), Some(b)) => (i, b),
                        _ => return Err(get_unexpected_error(18, &p)),
                    };
                    let name = self.binding_name(&param, self.code.strict)?;
                    let scope = {
                        let mut tree = self.scopes.borrow_mut();
                        let s = tree.new_env(ScopeType::Catch, Some(self.scope), self.code.code_id);
                        tree.add_def(s, &name);
                        s
                    };
                    let saved = std::mem::replace(&mut self.scope, scope);
                    let body = self.build_statement_list(body.into_inner().collect(), false);
                    self.scope = saved;
                    handler = Some(CatchClauseData {
                        meta: catch_meta,
                        param: IdentifierData {
                            name,
                            scope,
                            meta: meta_of(&param),
                        },
                        scope,
                        body: body?,
                    });
                }
                Rule::finally_clause => {
                    let block = match p.clone().into_inner().next() {
                        Some(b) => b,
                        None => return Err(get_unexpected_error(19, &p)),
                    };
                    finalizer = Some(self.build_statement_list(block.into_inner().collect(), false)?);
                }
                _ => return Err(get_unexpected_error(20, &p)),
            }
        }
        match block {
            Some(block) => Ok(StatementType::TryStatement {
                meta,
                block,
                handler,
                finalizer,
            }),
            None => Err(get_unexpected_error(21, &pair)),
        }
    }

    // Expressions

    fn build_expression(&mut self, pair: Pair<Rule>) -> Result<ExpressionType, ParseError> {
        let meta = meta_of(&pair);
        let mut expressions = vec![];
        for p in pair.into_inner() {
            expressions.push(self.build_assignment_expression(p)?);
        }
        if expressions.len() == 1 {
            if let Some(e) = expressions.pop() {
                return Ok(e);
            }
        }
        Ok(ExpressionType::SequenceExpression { meta, expressions })
    }

    fn build_assignment_expression(&mut self, pair: Pair<Rule>) -> Result<ExpressionType, ParseError> {
        let meta = meta_of(&pair);
        let mut inner = pair.clone().into_inner();
        let left_pair = match inner.next() {
            Some(p) => p,
            None => return Err(get_unexpected_error(22, &pair)),
        };
        let left = self.build_conditional_expression(left_pair.clone())?;
        match (inner.next(), inner.next()) {
            (Some(op), Some(right)) => {
                let operator = match assignment_operator_of(op.as_str()) {
                    Some(o) => o,
                    None => return Err(get_unexpected_error(23, &op)),
                };
                self.check_assignment_target(&left, &left_pair)?;
                let right = self.build_assignment_expression(right)?;
                Ok(ExpressionType::AssignmentExpression {
                    meta,
                    operator,
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            _ => Ok(left),
        }
    }

    fn build_conditional_expression(&mut self, pair: Pair<Rule>) -> Result<ExpressionType, ParseError> {
        let meta = meta_of(&pair);
        let mut inner = pair.clone().into_inner();
        let test = match inner.next() {
            Some(p) => self.build_binary_expression(p)?,
            None => return Err(get_unexpected_error(24, &pair)),
        };
        match (inner.next(), inner.next()) {
            (Some(c), Some(a)) => Ok(ExpressionType::ConditionalExpression {
                meta,
                test: Box::new(test),
                consequent: Box::new(self.build_assignment_expression(c)?),
                alternate: Box::new(self.build_assignment_expression(a)?),
            }),
            _ => Ok(test),
        }
    }

    fn build_binary_expression(&mut self, pair: Pair<Rule>) -> Result<ExpressionType, ParseError> {
        PRATT_PARSER
            .map_primary(|p| self.build_unary_expression(p))
            .map_infix(|lhs, op, rhs| {
                let left = lhs?;
                let right = rhs?;
                let meta = span_meta(left.get_meta(), right.get_meta());
                let logical = match op.as_rule() {
                    Rule::op_or => Some(LogicalOperator::Or),
                    Rule::op_and => Some(LogicalOperator::And),
                    _ => None,
                };
                if let Some(operator) = logical {
                    return Ok(ExpressionType::LogicalExpression {
                        meta,
                        operator,
                        left: Box::new(left),
                        right: Box::new(right),
                    });
                }
                match binary_operator_of(op.as_rule()) {
                    Some(operator) => Ok(ExpressionType::BinaryExpression {
                        meta,
                        operator,
                        left: Box::new(left),
                        right: Box::new(right),
                    }),
                    None => Err(get_unexpected_error(25, &op)),
                }
            })
            .parse(pair.into_inner())
    }

    fn build_unary_expression(&mut self, pair: Pair<Rule>) -> Result<ExpressionType, ParseError> {
        let meta = meta_of(&pair);
        let mut inner = pair.clone().into_inner();
        let first = match inner.next() {
            Some(p) => p,
            None => return Err(get_unexpected_error(26, &pair)),
        };
        if first.as_rule() == Rule::postfix_expression {
            return self.build_postfix_expression(first);
        }
        if first.as_rule() != Rule::unary_operator {
            return Err(get_unexpected_error(27, &first));
        }
        let argument_pair = match inner.next() {
            Some(p) => p,
            None => return Err(get_unexpected_error(28, &pair)),
        };
        let argument = self.build_unary_expression(argument_pair.clone())?;
        let operator = match first.as_str() {
            "++" | "--" => {
                self.check_assignment_target(&argument, &argument_pair)?;
                let operator = if first.as_str() == "++" {
                    UpdateOperator::PlusPlus
                } else {
                    UpdateOperator::MinusMinus
                };
                return Ok(ExpressionType::UpdateExpression {
                    meta,
                    operator,
                    argument: Box::new(argument),
                    prefix: true,
                });
            }
            "delete" => {
                if self.code.strict {
                    if let ExpressionType::Identifier(_) = argument {
                        return Err(syntax_error(
                            &pair,
                            "Delete of an unqualified identifier in strict mode",
                        ));
                    }
                }
                UnaryOperator::Delete
            }
            "void" => UnaryOperator::Void,
            "typeof" => UnaryOperator::TypeOf,
            "+" => UnaryOperator::Plus,
            "-" => UnaryOperator::Minus,
            "~" => UnaryOperator::BitwiseNot,
            "!" => UnaryOperator::LogicalNot,
            _ => return Err(get_unexpected_error(29, &first)),
        };
        Ok(ExpressionType::UnaryExpression {
            meta,
            operator,
            argument: Box::new(argument),
        })
    }

    fn build_postfix_expression(&mut self, pair: Pair<Rule>) -> Result<ExpressionType, ParseError> {
        let meta = meta_of(&pair);
        let mut inner = pair.clone().into_inner();
        let lhs_pair = match inner.next() {
            Some(p) => p,
            None => return Err(get_unexpected_error(30, &pair)),
        };
        let argument = self.build_left_hand_side_expression(lhs_pair.clone())?;
        match inner.next() {
            Some(op) => {
                self.check_assignment_target(&argument, &lhs_pair)?;
                let operator = if op.as_str() == "++" {
                    UpdateOperator::PlusPlus
                } else {
                    UpdateOperator::MinusMinus
                };
                Ok(ExpressionType::UpdateExpression {
                    meta,
                    operator,
                    argument: Box::new(argument),
                    prefix: false,
                })
            }
            None => Ok(argument),
        }
    }

    fn build_left_hand_side_expression(
        &mut self,
        pair: Pair<Rule>,
    ) -> Result<ExpressionType, ParseError> {
        let mut inner = pair.clone().into_inner();
        let first = match inner.next() {
            Some(p) => p,
            None => return Err(get_unexpected_error(31, &pair)),
        };
        let start = meta_of(&first);
        let mut expression = match first.as_rule() {
            Rule::member_expression => self.build_member_expression(first)?,
            Rule::new_expression => {
                let meta = meta_of(&pair);
                let callee = self.build_new_expression(first)?;
                return Ok(ExpressionType::NewExpression {
                    meta,
                    callee: Box::new(callee),
                    arguments: vec![],
                });
            }
            _ => return Err(get_unexpected_error(32, &first)),
        };
        for suffix in inner {
            let meta = span_meta(&start, &meta_of(&suffix));
            expression = match suffix.as_rule() {
                Rule::arguments => {
                    if let ExpressionType::Identifier(id) = &expression {
                        if &*id.name == "eval" {
                            self.code.exists_direct_eval = true;
                            self.scopes.borrow_mut().set_direct_eval(self.scope);
                        }
                    }
                    ExpressionType::CallExpression {
                        meta,
                        callee: Box::new(expression),
                        arguments: self.build_arguments(suffix)?,
                    }
                }
                _ => self.build_member_suffix(expression, suffix, meta)?,
            };
        }
        Ok(expression)
    }

    fn build_new_expression(&mut self, pair: Pair<Rule>) -> Result<ExpressionType, ParseError> {
        let meta = meta_of(&pair);
        let inner = match pair.clone().into_inner().next() {
            Some(p) => p,
            None => return Err(get_unexpected_error(33, &pair)),
        };
        match inner.as_rule() {
            Rule::member_expression => self.build_member_expression(inner),
            Rule::new_expression => Ok(ExpressionType::NewExpression {
                meta,
                callee: Box::new(self.build_new_expression(inner)?),
                arguments: vec![],
            }),
            _ => Err(get_unexpected_error(34, &inner)),
        }
    }

    fn build_member_expression(&mut self, pair: Pair<Rule>) -> Result<ExpressionType, ParseError> {
        let mut inner = pair.clone().into_inner();
        let first = match inner.next() {
            Some(p) => p,
            None => return Err(get_unexpected_error(35, &pair)),
        };
        let start = meta_of(&first);
        let mut expression = match first.as_rule() {
            Rule::new_member => {
                let meta = meta_of(&first);
                let mut new_inner = first.clone().into_inner();
                match (new_inner.next(), new_inner.next()) {
                    (Some(callee), Some(arguments)) => ExpressionType::NewExpression {
                        meta,
                        callee: Box::new(self.build_member_expression(callee)?),
                        arguments: self.build_arguments(arguments)?,
                    },
                    _ => return Err(get_unexpected_error(36, &first)),
                }
            }
            Rule::function_expression => self.build_function_expression(first)?,
            _ => self.build_primary_expression(first)?,
        };
        for suffix in inner {
            let meta = span_meta(&start, &meta_of(&suffix));
            expression = self.build_member_suffix(expression, suffix, meta)?;
        }
        Ok(expression)
    }

    fn build_member_suffix(
        &mut self,
        object: ExpressionType,
        suffix: Pair<Rule>,
        meta: Meta,
    ) -> Result<ExpressionType, ParseError> {
        let property = match suffix.as_rule() {
            Rule::computed_member => match suffix.clone().into_inner().next() {
                Some(e) => self.build_expression(e)?,
                None => return Err(get_unexpected_error(37, &suffix)),
            },
            Rule::dot_member => match suffix.clone().into_inner().next() {
                Some(name) => {
                    let key = decode_identifier(name.as_str()).map_err(|m| syntax_error(&name, &m))?;
                    ExpressionType::Literal {
                        meta: meta_of(&name),
                        value: LiteralType::StringLiteral(Rc::from(key)),
                    }
                }
                None => return Err(get_unexpected_error(38, &suffix)),
            },
            _ => return Err(get_unexpected_error(39, &suffix)),
        };
        Ok(ExpressionType::MemberExpression {
            meta,
            object: Box::new(object),
            property: Box::new(property),
        })
    }

    fn build_arguments(&mut self, pair: Pair<Rule>) -> Result<Vec<ExpressionType>, ParseError> {
        let mut arguments = vec![];
        for p in pair.into_inner() {
            arguments.push(self.build_assignment_expression(p)?);
        }
        Ok(arguments)
    }

    fn build_primary_expression(&mut self, pair: Pair<Rule>) -> Result<ExpressionType, ParseError> {
        let meta = meta_of(&pair);
        Ok(match pair.as_rule() {
            Rule::this_expression => ExpressionType::ThisExpression { meta },
            Rule::null_literal => ExpressionType::Literal {
                meta,
                value: LiteralType::NullLiteral,
            },
            Rule::boolean_literal => ExpressionType::Literal {
                meta,
                value: LiteralType::BooleanLiteral(pair.as_str() == "true"),
            },
            Rule::numeric_literal => {
                let (n, octal) = parse_numeric_literal(pair.as_str());
                if octal && self.code.strict {
                    return Err(syntax_error(&pair, "Octal literals are not allowed in strict mode"));
                }
                ExpressionType::Literal {
                    meta,
                    value: LiteralType::NumberLiteral(n),
                }
            }
            Rule::string_literal => ExpressionType::Literal {
                meta,
                value: LiteralType::StringLiteral(self.string_value(&pair)?),
            },
            Rule::identifier => ExpressionType::Identifier(self.identifier_reference(&pair)?),
            Rule::array_literal => {
                let mut elements = vec![];
                let mut filled = false;
                for p in pair.into_inner() {
                    if p.as_rule() == Rule::comma {
                        if !filled {
                            elements.push(None);
                        }
                        filled = false;
                    } else {
                        elements.push(Some(self.build_assignment_expression(p)?));
                        filled = true;
                    }
                }
                ExpressionType::ArrayExpression { meta, elements }
            }
            Rule::object_literal => self.build_object_literal(pair)?,
            Rule::expression => self.build_expression(pair)?,
            _ => return Err(get_unexpected_error(40, &pair)),
        })
    }

    fn string_value(&self, pair: &Pair<Rule>) -> Result<Name, ParseError> {
        let decoded = decode_string_literal(pair.as_str()).map_err(|m| syntax_error(pair, &m))?;
        if decoded.has_octal_escape && self.code.strict {
            return Err(syntax_error(
                pair,
                "Octal escape sequences are not allowed in strict mode",
            ));
        }
        Ok(Rc::from(decoded.value))
    }

    fn property_key(&self, pair: &Pair<Rule>) -> Result<Name, ParseError> {
        match pair.as_rule() {
            Rule::identifier_name => decode_identifier(pair.as_str())
                .map(Rc::from)
                .map_err(|m| syntax_error(pair, &m)),
            Rule::string_literal => self.string_value(pair),
            Rule::numeric_literal => {
                let (n, octal) = parse_numeric_literal(pair.as_str());
                if octal && self.code.strict {
                    return Err(syntax_error(pair, "Octal literals are not allowed in strict mode"));
                }
                Ok(Rc::from(number_to_string(n)))
            }
            _ => Err(get_unexpected_error(41, pair)),
        }
    }

    fn build_object_literal(&mut self, pair: Pair<Rule>) -> Result<ExpressionType, ParseError> {
        let meta = meta_of(&pair);
        let mut properties = vec![];
        // (data, getter, setter) seen per key.
        let mut seen: HashMap<Name, (bool, bool, bool)> = HashMap::new();
        for p in pair.into_inner() {
            let property_meta = meta_of(&p);
            let rule = p.as_rule();
            let mut inner = p.clone().into_inner();
            let key_pair = match inner.next() {
                Some(k) => k,
                None => return Err(get_unexpected_error(42, &p)),
            };
            let key = self.property_key(&key_pair)?;
            let (kind, value) = match rule {
                Rule::value_property => match inner.next() {
                    Some(v) => (PropertyKind::Init, self.build_assignment_expression(v)?),
                    None => return Err(get_unexpected_error(43, &p)),
                },
                Rule::getter_property => {
                    let body = match inner.next() {
                        Some(b) => b,
                        None => return Err(get_unexpected_error(44, &p)),
                    };
                    let code = self.build_function(FunctionParts {
                        name: None,
                        params: vec![],
                        body,
                        meta: property_meta,
                        outer: self.scope,
                    })?;
                    (PropertyKind::Get, function_value(code, property_meta))
                }
                Rule::setter_property => {
                    let (param, body) = match (inner.next(), inner.next()) {
                        (Some(a), Some(b)) => (a, b),
                        _ => return Err(get_unexpected_error(45, &p)),
                    };
                    let code = self.build_function(FunctionParts {
                        name: None,
                        params: vec![param],
                        body,
                        meta: property_meta,
                        outer: self.scope,
                    })?;
                    (PropertyKind::Set, function_value(code, property_meta))
                }
                _ => return Err(get_unexpected_error(46, &p)),
            };
            let entry = seen.entry(key.clone()).or_insert((false, false, false));
            let conflict = match kind {
                PropertyKind::Init => (entry.0 && self.code.strict) || entry.1 || entry.2,
                PropertyKind::Get => entry.0 || entry.1,
                PropertyKind::Set => entry.0 || entry.2,
            };
            if conflict {
                return Err(syntax_error(&p, "Duplicate property in object literal"));
            }
            match kind {
                PropertyKind::Init => entry.0 = true,
                PropertyKind::Get => entry.1 = true,
                PropertyKind::Set => entry.2 = true,
            }
            properties.push(PropertyData { key, kind, value });
        }
        Ok(ExpressionType::ObjectExpression { meta, properties })
    }
}

fn function_value(code: Rc<Code>, meta: Meta) -> ExpressionType {
    ExpressionType::FunctionExpression {
        meta,
        code,
        name_scope: None,
    }
}

/// Registers the bindings of a finished code in its scope node and builds the `Code`.
#[allow(clippy::too_many_arguments)]
fn finish_code(
    scopes: &Rc<RefCell<ScopeTree>>,
    source: &Rc<Source>,
    state: CodeState,
    name: Option<Name>,
    params: Vec<Name>,
    body: Vec<StatementType>,
    meta: Meta,
    declare_functions: bool,
) -> Rc<Code> {
    {
        let mut tree = scopes.borrow_mut();
        if state.code_type == CodeType::Function {
            tree.add_def(state.scope, &Rc::from("arguments"));
        }
        if declare_functions {
            for f in &state.functions {
                if let Some(n) = &f.name {
                    tree.add_def(state.scope, n);
                }
            }
        }
        for v in &state.variables {
            tree.add_def(state.scope, v);
        }
        if state.exists_with {
            tree.set_with(state.code_id);
        }
    }
    Rc::new(Code {
        code_type: state.code_type,
        id: state.code_id,
        name,
        params,
        strict: state.strict,
        body,
        functions: state.functions,
        variables: state.variables,
        scope: state.scope,
        exists_direct_eval: state.exists_direct_eval,
        exists_arguments_ref: state.exists_arguments_ref,
        exists_with: state.exists_with,
        source: source.clone(),
        meta,
        scopes: scopes.clone(),
        compiled: RefCell::new(None),
    })
}
