//! Append-only identifier registry.
//!
//! Entity and relation sets are discovered at runtime, so the store keys
//! vectors by string id through a registry that only ever grows. Indices are
//! dense and stable: the `n`th registered id keeps index `n` for the life of
//! the registry, which is what lets the training loops hold parameters in
//! plain vectors and sample negatives reproducibly.

use std::collections::HashMap;

/// Bidirectional id ↔ index map. Ids are never removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    ids: Vec<String>,
    index: HashMap<String, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an id, returning its index and whether it was newly added.
    pub fn register(&mut self, id: impl Into<String>) -> (usize, bool) {
        let id = id.into();
        if let Some(&idx) = self.index.get(&id) {
            return (idx, false);
        }
        let idx = self.ids.len();
        self.index.insert(id.clone(), idx);
        self.ids.push(id);
        (idx, true)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn id(&self, idx: usize) -> Option<&str> {
        self.ids.get(idx).map(String::as_str)
    }

    /// Ids in registration order.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_idempotent() {
        let mut reg = Registry::new();
        assert_eq!(reg.register("Acme"), (0, true));
        assert_eq!(reg.register("Globex"), (1, true));
        assert_eq!(reg.register("Acme"), (0, false));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn lookups_both_ways() {
        let mut reg = Registry::new();
        reg.register("INVESTS_IN");
        reg.register("COMPETES_WITH");
        assert!(reg.contains("COMPETES_WITH"));
        assert!(!reg.contains("OWNS"));
        assert_eq!(reg.index_of("COMPETES_WITH"), Some(1));
        assert_eq!(reg.id(0), Some("INVESTS_IN"));
        assert_eq!(reg.id(2), None);
        assert_eq!(reg.ids(), ["INVESTS_IN", "COMPETES_WITH"]);
    }
}
