//! Registry of host callbacks, resolved by name each time script calls them.

use std::collections::HashMap;

use super::types::BuiltInFn;
use crate::runner::ds::value::JsString;

/// Registry for host-provided functions.
#[derive(Default, Clone)]
pub struct BuiltInRegistry {
    functions: HashMap<JsString, BuiltInFn>,
}

impl BuiltInRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        BuiltInRegistry {
            functions: HashMap::new(),
        }
    }

    /// Register a function, replacing any previous one of the same name.
    pub fn register(&mut self, name: JsString, f: BuiltInFn) {
        self.functions.insert(name, f);
    }

    /// Look up a function by name.
    pub fn get(&self, name: &str) -> Option<BuiltInFn> {
        self.functions.get(name).cloned()
    }

    /// Remove a function. Returns true if it was registered.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.functions.remove(name).is_some()
    }

}
