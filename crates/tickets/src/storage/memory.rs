//! In-memory cursor storage
//!
//! Used in tests and for one-shot exports that don't need to resume.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::RwLock;

use super::CursorStore;
use crate::models::CursorState;

/// In-memory implementation of CursorStore
pub struct InMemoryCursorStore {
    states: RwLock<HashMap<String, CursorState>>,
}

impl InMemoryCursorStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryCursorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CursorStore for InMemoryCursorStore {
    fn load(&self, domain: &str) -> Result<Option<CursorState>> {
        let states = self.states.read().unwrap();
        Ok(states.get(domain).cloned())
    }

    fn save(&self, state: &CursorState) -> Result<()> {
        let mut states = self.states.write().unwrap();
        states.insert(state.domain.clone(), state.clone());
        Ok(())
    }

    fn delete(&self, domain: &str) -> Result<()> {
        let mut states = self.states.write().unwrap();
        states.remove(domain);
        Ok(())
    }
}
