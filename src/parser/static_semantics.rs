use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::parser::ast::{CodeType, Name};

pub type ScopeId = usize;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScopeType {
    Global,
    Eval,
    Function,
    Catch,
    NamedFunction,
    With,
}

/// Static counterpart of one runtime environment.
#[derive(Debug)]
pub struct StaticEnv {
    pub env_type: ScopeType,
    pub outer: Option<ScopeId>,
    pub code_id: usize,
    pub inners: Vec<ScopeId>,
    /// Names this environment binds, in binding order.
    pub defs: Vec<Name>,
    /// Names referenced from this environment or from nested environments of the same code that
    /// do not bind them.
    pub refs: HashSet<Name>,
    /// Names referenced from nested function code that are not bound on the way up.
    pub inbound_refs: HashSet<Name>,
    /// Bindings turned into slots of the code's local frame.
    pub locals: HashMap<Name, usize>,
    pub exists_direct_eval: bool,
    /// True when no runtime environment needs to be created at all.
    pub collapsed: bool,
}

#[derive(Debug)]
pub struct CodeInfo {
    pub code_type: CodeType,
    pub exists_with: bool,
    pub slot_count: usize,
}

/// How an identifier reference is resolved at run time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    /// A slot of the running activation's local frame.
    Local(usize),
    /// A binding of the declarative environment `skip` runtime links out.
    Fixed { skip: usize },
    /// A property of the global object declared by the same program.
    Global,
    /// Unknown until run time; the search starts `skip` links out.
    Dynamic { skip: usize },
}

#[derive(Debug, Default)]
pub struct ScopeTree {
    pub envs: Vec<StaticEnv>,
    pub codes: Vec<CodeInfo>,
}

impl ScopeTree {
    pub fn new() -> Self {
        ScopeTree {
            envs: vec![],
            codes: vec![],
        }
    }

    pub fn new_code(&mut self, code_type: CodeType) -> usize {
        self.codes.push(CodeInfo {
            code_type,
            exists_with: false,
            slot_count: 0,
        });
        self.codes.len() - 1
    }

    pub fn new_env(&mut self, env_type: ScopeType, outer: Option<ScopeId>, code_id: usize) -> ScopeId {
        let id = self.envs.len();
        self.envs.push(StaticEnv {
            env_type,
            outer,
            code_id,
            inners: vec![],
            defs: vec![],
            refs: HashSet::new(),
            inbound_refs: HashSet::new(),
            locals: HashMap::new(),
            exists_direct_eval: false,
            collapsed: false,
        });
        if let Some(o) = outer {
            self.envs[o].inners.push(id);
        }
        id
    }

    pub fn add_def(&mut self, scope: ScopeId, name: &Name) {
        let env = &mut self.envs[scope];
        if !env.defs.contains(name) {
            env.defs.push(name.clone());
        }
    }

    pub fn add_ref(&mut self, scope: ScopeId, name: &Name) {
        self.envs[scope].refs.insert(name.clone());
    }

    pub fn set_direct_eval(&mut self, scope: ScopeId) {
        self.envs[scope].exists_direct_eval = true;
    }

    pub fn set_with(&mut self, code_id: usize) {
        self.codes[code_id].exists_with = true;
    }

    pub fn slot_count(&self, code_id: usize) -> usize {
        self.codes[code_id].slot_count
    }

    pub fn env(&self, scope: ScopeId) -> &StaticEnv {
        &self.envs[scope]
    }

    pub fn is_collapsed(&self, scope: ScopeId) -> bool {
        self.envs[scope].collapsed
    }

    pub fn local_slot(&self, scope: ScopeId, name: &str) -> Option<usize> {
        self.envs[scope].locals.get(name).copied()
    }

    /// Runs the analysis over every root. With `collapse` false only the reference sets are
    /// computed and every binding stays in a runtime environment.
    pub fn analyze(&mut self, collapse: bool) {
        let roots: Vec<ScopeId> = (0..self.envs.len())
            .filter(|i| self.envs[*i].outer.is_none())
            .collect();
        for root in roots {
            self.analyze_env(root, collapse);
        }
    }

    fn analyze_env(&mut self, id: ScopeId, collapse: bool) {
        let inners = self.envs[id].inners.clone();
        let code_id = self.envs[id].code_id;
        for inner in inners {
            self.analyze_env(inner, collapse);
            let (inner_refs, inner_inbound, inner_defs, same_code, inner_eval) = {
                let e = &self.envs[inner];
                (
                    e.refs.iter().cloned().collect::<Vec<_>>(),
                    e.inbound_refs.iter().cloned().collect::<Vec<_>>(),
                    e.defs.clone(),
                    e.code_id == code_id,
                    e.exists_direct_eval,
                )
            };
            let env = &mut self.envs[id];
            env.exists_direct_eval |= inner_eval;
            for r in inner_refs {
                let bound_inside = inner_defs.contains(&r);
                if same_code {
                    if !bound_inside {
                        env.refs.insert(r);
                    }
                } else if !bound_inside {
                    env.inbound_refs.insert(r);
                }
            }
            for r in inner_inbound {
                if !inner_defs.contains(&r) {
                    env.inbound_refs.insert(r);
                }
            }
        }
        if !collapse {
            return;
        }
        let code = &self.codes[code_id];
        let env = &self.envs[id];
        if env.exists_direct_eval
            || code.exists_with
            || code.code_type != CodeType::Function
            || env.env_type == ScopeType::With
        {
            return;
        }
        let mut next_slot = code.slot_count;
        let env = &mut self.envs[id];
        for def in &env.defs {
            if !env.inbound_refs.contains(def) {
                env.locals.insert(def.clone(), next_slot);
                next_slot += 1;
            }
        }
        env.collapsed = env.defs.len() == env.locals.len();
        trace!(
            scope = id,
            env_type = ?env.env_type,
            locals = env.locals.len(),
            collapsed = env.collapsed,
            "scope analyzed"
        );
        self.codes[code_id].slot_count = next_slot;
    }

    /// Resolves `name` referenced from `scope`.
    pub fn resolve(&self, scope: ScopeId, name: &str) -> Resolution {
        let mut skip = 0;
        let mut ambiguous = false;
        let mut resolved = None;
        let mut current = Some(scope);
        while let Some(id) = current {
            let env = &self.envs[id];
            if let Some(slot) = env.locals.get(name) {
                return Resolution::Local(*slot);
            }
            if env.env_type == ScopeType::Eval {
                ambiguous = true;
                break;
            }
            if env.defs.iter().any(|d| &**d == name) {
                resolved = Some(env.env_type);
                break;
            }
            if env.exists_direct_eval
                || !matches!(
                    env.env_type,
                    ScopeType::Function | ScopeType::Catch | ScopeType::NamedFunction
                )
            {
                ambiguous = true;
            }
            if !ambiguous && !env.collapsed {
                skip += 1;
            }
            current = env.outer;
        }
        match resolved {
            Some(ScopeType::Global) if !ambiguous => Resolution::Global,
            Some(_) if !ambiguous => Resolution::Fixed { skip },
            _ => Resolution::Dynamic { skip },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn name(s: &str) -> Name {
        Rc::from(s)
    }

    /// `var g; function f(a) { var b; return function () { return a + b + g; }; }`
    fn nested_tree() -> (ScopeTree, ScopeId, ScopeId, ScopeId) {
        let mut tree = ScopeTree::new();
        let global_code = tree.new_code(CodeType::Global);
        let global = tree.new_env(ScopeType::Global, None, global_code);
        tree.add_def(global, &name("g"));
        tree.add_def(global, &name("f"));
        let f_code = tree.new_code(CodeType::Function);
        let f = tree.new_env(ScopeType::Function, Some(global), f_code);
        for d in &["a", "arguments", "b"] {
            tree.add_def(f, &name(d));
        }
        let inner_code = tree.new_code(CodeType::Function);
        let inner = tree.new_env(ScopeType::Function, Some(f), inner_code);
        tree.add_def(inner, &name("arguments"));
        for r in &["a", "b", "g"] {
            tree.add_ref(inner, &name(r));
        }
        (tree, global, f, inner)
    }

    #[test]
    fn test_captured_names_stay_in_environment() {
        let (mut tree, _, f, inner) = nested_tree();
        tree.analyze(true);
        let env = tree.env(f);
        assert!(env.inbound_refs.contains("a"));
        assert!(env.locals.contains_key("arguments"));
        assert!(!env.locals.contains_key("a"));
        assert!(!env.collapsed);
        assert!(tree.env(inner).collapsed);
        assert_eq!(tree.resolve(inner, "a"), Resolution::Fixed { skip: 0 });
        assert_eq!(tree.resolve(inner, "g"), Resolution::Global);
        assert_eq!(tree.resolve(inner, "Math"), Resolution::Dynamic { skip: 1 });
    }

    #[test]
    fn test_closure_over_globals_only_still_collapses() {
        // function f() { var a; var b = function () { return Math; }; }
        let mut tree = ScopeTree::new();
        let global_code = tree.new_code(CodeType::Global);
        let global = tree.new_env(ScopeType::Global, None, global_code);
        let f_code = tree.new_code(CodeType::Function);
        let f = tree.new_env(ScopeType::Function, Some(global), f_code);
        for d in &["a", "b", "arguments"] {
            tree.add_def(f, &name(d));
        }
        tree.add_ref(f, &name("b"));
        let inner_code = tree.new_code(CodeType::Function);
        let inner = tree.new_env(ScopeType::Function, Some(f), inner_code);
        tree.add_def(inner, &name("arguments"));
        tree.add_ref(inner, &name("Math"));
        tree.analyze(true);
        let env = tree.env(f);
        assert!(env.inbound_refs.contains("Math"));
        assert_eq!(env.locals.len(), 3);
        assert!(env.collapsed);
        assert_eq!(tree.resolve(inner, "Math"), Resolution::Dynamic { skip: 0 });
    }

    #[test]
    fn test_leaf_function_collapses() {
        let mut tree = ScopeTree::new();
        let global_code = tree.new_code(CodeType::Global);
        let global = tree.new_env(ScopeType::Global, None, global_code);
        let f_code = tree.new_code(CodeType::Function);
        let f = tree.new_env(ScopeType::Function, Some(global), f_code);
        tree.add_def(f, &name("x"));
        tree.add_def(f, &name("arguments"));
        tree.add_ref(f, &name("x"));
        let c = tree.new_env(ScopeType::Catch, Some(f), f_code);
        tree.add_def(c, &name("e"));
        tree.add_ref(c, &name("e"));
        tree.analyze(true);
        assert!(tree.env(f).collapsed);
        assert!(tree.env(c).collapsed);
        assert_eq!(tree.slot_count(f_code), 3);
        // Inner scopes are numbered first.
        assert_eq!(tree.resolve(c, "e"), Resolution::Local(0));
        assert_eq!(tree.resolve(c, "x"), Resolution::Local(1));
    }

    #[test]
    fn test_direct_eval_disables_locals() {
        let mut tree = ScopeTree::new();
        let global_code = tree.new_code(CodeType::Global);
        let global = tree.new_env(ScopeType::Global, None, global_code);
        let f_code = tree.new_code(CodeType::Function);
        let f = tree.new_env(ScopeType::Function, Some(global), f_code);
        tree.add_def(f, &name("x"));
        let c = tree.new_env(ScopeType::Catch, Some(f), f_code);
        tree.add_def(c, &name("e"));
        tree.set_direct_eval(c);
        tree.analyze(true);
        assert!(tree.env(f).locals.is_empty());
        assert!(!tree.env(f).collapsed);
        assert_eq!(tree.resolve(c, "x"), Resolution::Dynamic { skip: 0 });
    }

    #[test]
    fn test_with_blocks_disable_locals() {
        let mut tree = ScopeTree::new();
        let global_code = tree.new_code(CodeType::Global);
        let global = tree.new_env(ScopeType::Global, None, global_code);
        let f_code = tree.new_code(CodeType::Function);
        let f = tree.new_env(ScopeType::Function, Some(global), f_code);
        tree.add_def(f, &name("x"));
        let w = tree.new_env(ScopeType::With, Some(f), f_code);
        tree.add_ref(w, &name("x"));
        tree.set_with(f_code);
        tree.analyze(true);
        assert!(tree.env(f).locals.is_empty());
        assert!(!tree.env(w).collapsed);
        assert_eq!(tree.resolve(w, "x"), Resolution::Dynamic { skip: 0 });
    }

    #[test]
    fn test_analysis_can_be_disabled() {
        let (mut tree, _, f, inner) = nested_tree();
        tree.analyze(false);
        assert!(tree.env(f).locals.is_empty());
        assert!(!tree.env(inner).collapsed);
        assert_eq!(tree.resolve(inner, "a"), Resolution::Fixed { skip: 1 });
    }
}
