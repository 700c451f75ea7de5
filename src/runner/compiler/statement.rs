use std::collections::HashMap;

use crate::parser::ast::{
    CatchClauseData, ExpressionType, ForInTarget, HasMeta, Name, StatementType, SwitchCaseData,
    VariableDeclarationOrExpression, VariableDeclaratorData,
};
use crate::runner::ds::execution_context::Activation;
use crate::runner::ds::operations::lex_env::{new_declarative_environment, new_object_environment};
use crate::runner::ds::operations::object::enumerate;
use crate::runner::ds::operations::test_and_comparison::strict_equality_comparison;
use crate::runner::ds::operations::type_conversion::{to_boolean, to_object};
use crate::runner::ds::realm::Realm;
use crate::runner::ds::value::{JsString, JsValue};
use crate::runner::eval::types::{Completion, CompletionType, EvalError, EvalResult, LabelId};

use super::expression::Target;
use super::{Compiler, ExprFn, StmtFn};

fn completion_of(value: Option<JsValue>) -> Completion {
    match value {
        Some(v) => Completion::normal_with_value(v),
        None => Completion::normal(),
    }
}

fn run_statement_list(stmts: &[StmtFn], realm: &mut Realm, act: &mut Activation) -> EvalResult {
    let mut last = None;
    for s in stmts {
        let c = s(realm, act)?;
        if c.is_abrupt() {
            return Ok(c.update_empty(last));
        }
        if c.value.is_some() {
            last = c.value;
        }
    }
    Ok(completion_of(last))
}

enum LoopControl {
    Next,
    Exit,
    Abrupt(Completion),
}

/// Folds one body completion into the loop state. Unlabelled jumps and jumps to one of the
/// loop's own labels are consumed by the loop.
fn loop_control(c: Completion, labels: &[LabelId], value: &mut Option<JsValue>) -> LoopControl {
    if c.value.is_some() {
        *value = c.value.clone();
    }
    let own = c.target.map_or(true, |t| labels.contains(&t));
    match c.completion_type {
        CompletionType::Normal => LoopControl::Next,
        CompletionType::Continue if own => LoopControl::Next,
        CompletionType::Break if own => LoopControl::Exit,
        _ => LoopControl::Abrupt(c.update_empty(value.clone())),
    }
}

/// Normalized `case` constant for the direct switch shape. Keys compare the way `===` does.
#[derive(Debug, PartialEq, Eq, Hash)]
enum SwitchKey {
    Undefined,
    Null,
    Bool(bool),
    Num(u64),
    Str(JsString),
}

fn switch_key(v: &JsValue) -> Option<SwitchKey> {
    Some(match v {
        JsValue::Undefined => SwitchKey::Undefined,
        JsValue::Null => SwitchKey::Null,
        JsValue::Boolean(b) => SwitchKey::Bool(*b),
        JsValue::Number(n) if n.is_nan() => return None,
        JsValue::Number(n) if *n == 0.0 => SwitchKey::Num(0f64.to_bits()),
        JsValue::Number(n) => SwitchKey::Num(n.to_bits()),
        JsValue::String(s) => SwitchKey::Str(s.clone()),
        JsValue::Object(_) => return None,
    })
}

enum SwitchShape {
    /// Every test is a constant; the matching clause is found with one lookup.
    Direct(HashMap<SwitchKey, usize>),
    /// Tests evaluated in source order, with the index of the clause each one selects.
    Indexed(Vec<(usize, ExprFn)>),
}

impl Compiler {
    pub(super) fn compile_statement_list(&mut self, body: &[StatementType]) -> StmtFn {
        let stmts: Vec<StmtFn> = body
            .iter()
            .map(|s| self.compile_statement(s, vec![]))
            .collect();
        Box::new(move |realm, act| run_statement_list(&stmts, realm, act))
    }

    /// Compiles one statement. `labels` is the label set of an iteration or switch statement
    /// directly under labelled statements.
    fn compile_statement(&mut self, stmt: &StatementType, labels: Vec<LabelId>) -> StmtFn {
        match stmt {
            StatementType::BlockStatement { body, .. } => self.compile_statement_list(body),
            StatementType::LabeledStatement { label, body, .. } => {
                self.compile_labeled(label, body, labels)
            }
            _ => {
                let position = stmt.get_meta().start_index;
                let inner = self.compile_simple_statement(stmt, labels);
                Box::new(move |realm, act| {
                    realm.step()?;
                    realm.set_position(position);
                    inner(realm, act)
                })
            }
        }
    }

    fn lookup_label(&self, label: &Option<Name>) -> Option<LabelId> {
        label.as_ref().and_then(|l| {
            self.labels
                .iter()
                .rev()
                .find(|(name, _)| name == l)
                .map(|(_, id)| *id)
        })
    }

    fn compile_labeled(&mut self, label: &Name, body: &StatementType, mut labels: Vec<LabelId>) -> StmtFn {
        let id = self.new_label();
        self.labels.push((label.clone(), id));
        labels.push(id);
        let body = self.compile_statement(body, labels);
        self.labels.pop();
        Box::new(move |realm, act| {
            let c = body(realm, act)?;
            if c.completion_type == CompletionType::Break && c.target == Some(id) {
                Ok(completion_of(c.value))
            } else {
                Ok(c)
            }
        })
    }

    fn compile_declarations(&mut self, declarations: &[VariableDeclaratorData]) -> StmtFn {
        let assignments: Vec<(Target, ExprFn)> = declarations
            .iter()
            .filter_map(|d| {
                d.init.as_ref().map(|init| {
                    let target = Target::Binding(self.binding_of(&d.id));
                    (target, self.compile_expression(init).eval)
                })
            })
            .collect();
        let strict = self.strict();
        Box::new(move |realm, act| {
            for (target, init) in &assignments {
                let place = target.place(realm, act)?;
                let v = init(realm, act)?;
                place.put(realm, act, v, strict)?;
            }
            Ok(Completion::normal())
        })
    }

    fn compile_optional(&mut self, expr: &Option<ExpressionType>) -> Option<ExprFn> {
        expr.as_ref().map(|e| self.compile_expression(e).eval)
    }

    fn compile_simple_statement(&mut self, stmt: &StatementType, labels: Vec<LabelId>) -> StmtFn {
        match stmt {
            StatementType::ExpressionStatement { expression, .. } => {
                let e = self.compile_expression(expression).eval;
                Box::new(move |realm, act| Ok(Completion::normal_with_value(e(realm, act)?)))
            }
            StatementType::VariableStatement { declarations, .. } => {
                self.compile_declarations(declarations)
            }
            StatementType::FunctionDeclaration { .. }
            | StatementType::EmptyStatement { .. }
            | StatementType::DebuggerStatement { .. }
            | StatementType::BlockStatement { .. }
            | StatementType::LabeledStatement { .. } => Box::new(|_, _| Ok(Completion::normal())),
            StatementType::ReturnStatement { argument, .. } => match self.compile_optional(argument) {
                Some(e) => Box::new(move |realm, act| Ok(Completion::return_value(e(realm, act)?))),
                None => Box::new(|_, _| Ok(Completion::return_value(JsValue::Undefined))),
            },
            StatementType::BreakStatement { label, .. } => {
                let target = self.lookup_label(label);
                Box::new(move |_, _| Ok(Completion::break_completion(target)))
            }
            StatementType::ContinueStatement { label, .. } => {
                let target = self.lookup_label(label);
                Box::new(move |_, _| Ok(Completion::continue_completion(target)))
            }
            StatementType::IfStatement {
                test,
                consequent,
                alternate,
                ..
            } => {
                let test = self.compile_expression(test).eval;
                let consequent = self.compile_statement(consequent, vec![]);
                let alternate = alternate
                    .as_ref()
                    .map(|a| self.compile_statement(a, vec![]));
                Box::new(move |realm, act| {
                    if to_boolean(&test(realm, act)?) {
                        consequent(realm, act)
                    } else {
                        match &alternate {
                            Some(a) => a(realm, act),
                            None => Ok(Completion::normal()),
                        }
                    }
                })
            }
            StatementType::ThrowStatement { argument, .. } => {
                let e = self.compile_expression(argument).eval;
                Box::new(move |realm, act| Err(EvalError::Throw(e(realm, act)?)))
            }
            StatementType::WhileStatement { test, body, .. } => {
                let test = self.compile_expression(test).eval;
                let body = self.compile_statement(body, vec![]);
                Box::new(move |realm, act| {
                    let mut value = None;
                    loop {
                        realm.step()?;
                        if !to_boolean(&test(realm, act)?) {
                            break;
                        }
                        match loop_control(body(realm, act)?, &labels, &mut value) {
                            LoopControl::Next => {}
                            LoopControl::Exit => break,
                            LoopControl::Abrupt(c) => return Ok(c),
                        }
                    }
                    Ok(completion_of(value))
                })
            }
            StatementType::DoWhileStatement { test, body, .. } => {
                let test = self.compile_expression(test).eval;
                let body = self.compile_statement(body, vec![]);
                Box::new(move |realm, act| {
                    let mut value = None;
                    loop {
                        realm.step()?;
                        match loop_control(body(realm, act)?, &labels, &mut value) {
                            LoopControl::Next => {}
                            LoopControl::Exit => break,
                            LoopControl::Abrupt(c) => return Ok(c),
                        }
                        if !to_boolean(&test(realm, act)?) {
                            break;
                        }
                    }
                    Ok(completion_of(value))
                })
            }
            StatementType::ForStatement {
                init,
                test,
                update,
                body,
                ..
            } => {
                let init: Option<StmtFn> = match init {
                    Some(VariableDeclarationOrExpression::VariableDeclaration(d)) => {
                        Some(self.compile_declarations(d))
                    }
                    Some(VariableDeclarationOrExpression::Expression(e)) => {
                        let e = self.compile_expression(e).eval;
                        Some(Box::new(move |realm, act| {
                            e(realm, act)?;
                            Ok(Completion::normal())
                        }))
                    }
                    None => None,
                };
                let test = self.compile_optional(test);
                let update = self.compile_optional(update);
                let body = self.compile_statement(body, vec![]);
                Box::new(move |realm, act| {
                    if let Some(init) = &init {
                        init(realm, act)?;
                    }
                    let mut value = None;
                    loop {
                        realm.step()?;
                        if let Some(test) = &test {
                            if !to_boolean(&test(realm, act)?) {
                                break;
                            }
                        }
                        match loop_control(body(realm, act)?, &labels, &mut value) {
                            LoopControl::Next => {}
                            LoopControl::Exit => break,
                            LoopControl::Abrupt(c) => return Ok(c),
                        }
                        if let Some(update) = &update {
                            update(realm, act)?;
                        }
                    }
                    Ok(completion_of(value))
                })
            }
            StatementType::ForInStatement {
                left, right, body, ..
            } => self.compile_for_in(left, right, body, labels),
            StatementType::SwitchStatement {
                discriminant,
                cases,
                ..
            } => self.compile_switch(discriminant, cases, labels),
            StatementType::TryStatement {
                block,
                handler,
                finalizer,
                ..
            } => self.compile_try(block, handler, finalizer),
            StatementType::WithStatement { object, body, .. } => {
                let object = self.compile_expression(object).eval;
                let body = self.compile_statement(body, vec![]);
                Box::new(move |realm, act| {
                    let v = object(realm, act)?;
                    let o = to_object(realm, &v)?;
                    let saved = act.lex_env.clone();
                    act.lex_env = new_object_environment(o, Some(saved.clone()), true);
                    let result = body(realm, act);
                    act.lex_env = saved;
                    result
                })
            }
        }
    }

    fn compile_for_in(
        &mut self,
        left: &ForInTarget,
        right: &ExpressionType,
        body: &StatementType,
        labels: Vec<LabelId>,
    ) -> StmtFn {
        let (init, target) = match left {
            ForInTarget::VariableDeclaration(d) => {
                let init = d.init.as_ref().map(|_| {
                    self.compile_declarations(std::slice::from_ref(d))
                });
                (init, Target::Binding(self.binding_of(&d.id)))
            }
            ForInTarget::Expression(e) => (None, self.compile_target(e)),
        };
        let right = self.compile_expression(right).eval;
        let body = self.compile_statement(body, vec![]);
        let strict = self.strict();
        Box::new(move |realm, act| {
            if let Some(init) = &init {
                init(realm, act)?;
            }
            let v = right(realm, act)?;
            if v.is_null_or_undefined() {
                return Ok(Completion::normal());
            }
            let o = to_object(realm, &v)?;
            let mut keys = enumerate(&o, false, true);
            let mut value = None;
            while let Some(key) = keys.next_key() {
                realm.step()?;
                let place = target.place(realm, act)?;
                place.put(realm, act, JsValue::String(key.to_js_string()), strict)?;
                match loop_control(body(realm, act)?, &labels, &mut value) {
                    LoopControl::Next => {}
                    LoopControl::Exit => break,
                    LoopControl::Abrupt(c) => return Ok(c),
                }
            }
            Ok(completion_of(value))
        })
    }

    fn compile_switch(
        &mut self,
        discriminant: &ExpressionType,
        cases: &[SwitchCaseData],
        labels: Vec<LabelId>,
    ) -> StmtFn {
        let discriminant = self.compile_expression(discriminant).eval;
        let default_index = cases.iter().position(|c| c.test.is_none());
        let tests: Vec<(usize, _)> = cases
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.test.as_ref().map(|t| (i, self.compile_expression(t))))
            .collect();
        let shape = if tests.iter().all(|(_, t)| t.constant_value().is_some()) {
            let mut table = HashMap::new();
            for (i, t) in &tests {
                if let Some(key) = t.constant_value().and_then(switch_key) {
                    table.entry(key).or_insert(*i);
                }
            }
            SwitchShape::Direct(table)
        } else {
            SwitchShape::Indexed(tests.into_iter().map(|(i, t)| (i, t.eval)).collect())
        };
        let clauses: Vec<StmtFn> = cases
            .iter()
            .map(|c| self.compile_statement_list(&c.consequent))
            .collect();
        Box::new(move |realm, act| {
            let v = discriminant(realm, act)?;
            let selected = match &shape {
                SwitchShape::Direct(table) => switch_key(&v).and_then(|k| table.get(&k).copied()),
                SwitchShape::Indexed(tests) => {
                    let mut found = None;
                    for (i, test) in tests {
                        let t = test(realm, act)?;
                        if strict_equality_comparison(&v, &t) {
                            found = Some(*i);
                            break;
                        }
                    }
                    found
                }
            };
            let start = match selected.or(default_index) {
                Some(i) => i,
                None => return Ok(Completion::normal()),
            };
            let mut value = None;
            for clause in &clauses[start..] {
                let c = clause(realm, act)?;
                if c.value.is_some() {
                    value = c.value.clone();
                }
                if c.is_abrupt() {
                    let own = c.target.map_or(true, |t| labels.contains(&t));
                    if c.completion_type == CompletionType::Break && own {
                        break;
                    }
                    return Ok(c.update_empty(value));
                }
            }
            Ok(completion_of(value))
        })
    }

    fn compile_catch(&mut self, handler: &CatchClauseData) -> Box<dyn Fn(&mut Realm, &mut Activation, JsValue) -> EvalResult> {
        let (collapsed, slot) = {
            let tree = self.scopes.borrow();
            (
                tree.is_collapsed(handler.scope),
                tree.local_slot(handler.scope, &handler.param.name),
            )
        };
        let name = handler.param.name.clone();
        let body = self.compile_statement_list(&handler.body);
        Box::new(move |realm, act, thrown| {
            let saved = act.lex_env.clone();
            if !collapsed {
                act.lex_env = new_declarative_environment(Some(saved.clone()));
            }
            let bound = match slot {
                Some(slot) => {
                    act.set_local(slot, thrown);
                    Ok(())
                }
                None => {
                    let env = act.lex_env.clone();
                    let record = env.inner.as_env_record();
                    record
                        .create_mutable_binding(realm, name.clone(), false)
                        .and_then(|_| record.set_mutable_binding(realm, &name, thrown, false))
                }
            };
            let result = bound.and_then(|_| body(realm, act));
            act.lex_env = saved;
            result
        })
    }

    fn compile_try(
        &mut self,
        block: &[StatementType],
        handler: &Option<CatchClauseData>,
        finalizer: &Option<Vec<StatementType>>,
    ) -> StmtFn {
        let block = self.compile_statement_list(block);
        let handler = handler.as_ref().map(|h| self.compile_catch(h));
        let finalizer = finalizer
            .as_ref()
            .map(|f| self.compile_statement_list(f));
        Box::new(move |realm, act| {
            let saved = act.lex_env.clone();
            let result = match (block(realm, act), &handler) {
                (Err(e), Some(handler)) => {
                    act.lex_env = saved.clone();
                    match e.into_catchable() {
                        Ok(thrown) => handler(realm, act, thrown),
                        Err(internal) => return Err(internal),
                    }
                }
                (r, _) => r,
            };
            if let Err(e) = &result {
                if e.is_internal() {
                    return result;
                }
                act.lex_env = saved;
            }
            if let Some(finalizer) = &finalizer {
                let f = finalizer(realm, act)?;
                if f.is_abrupt() {
                    return Ok(f);
                }
            }
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_switch_keys_follow_strict_equality() {
        assert_eq!(
            switch_key(&JsValue::Number(-0.0)),
            switch_key(&JsValue::Number(0.0))
        );
        assert_eq!(switch_key(&JsValue::Number(f64::NAN)), None);
        assert_ne!(
            switch_key(&JsValue::Number(1.0)),
            switch_key(&JsValue::String(Rc::from("1")))
        );
    }

    #[test]
    fn test_loop_control_consumes_own_labels() {
        let mut value = None;
        let c = Completion::break_completion(Some(3));
        assert!(matches!(loop_control(c, &[3], &mut value), LoopControl::Exit));
        let c = Completion::continue_completion(Some(4));
        assert!(matches!(
            loop_control(c, &[3], &mut value),
            LoopControl::Abrupt(_)
        ));
        let c = Completion::normal_with_value(JsValue::Number(1.0));
        assert!(matches!(loop_control(c, &[], &mut value), LoopControl::Next));
        assert_eq!(value, Some(JsValue::Number(1.0)));
    }
}
