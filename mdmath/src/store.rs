//! Persistent variable store.
//!
//! Names assigned by snippets (`x = …`) land here and stay visible to every
//! later snippet processed by the same [`Engine`](crate::Engine), across
//! blocks and across documents.  Reset with [`Store::clear`].

use std::collections::HashMap;

use crate::script::Value;

/// Name → value table shared by all snippets of one engine.
#[derive(Debug, Default, Clone)]
pub struct Store {
    vars: HashMap<String, Value>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or overwrite) a variable.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Remove a variable.  Returns `true` if it existed.
    pub fn unset(&mut self, name: &str) -> bool {
        self.vars.remove(name).is_some()
    }

    /// Returns `true` if the variable is set.
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Iterate over all variables, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.vars.iter()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.vars.clear();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
