//! Storage trait definitions

use crate::models::CursorState;
use anyhow::Result;

/// Trait for cursor state persistence
///
/// Abstracts over storage backends (in-memory, SQLite). Absence of a stored
/// state means the domain has never been exported.
pub trait CursorStore: Send + Sync {
    /// Load the cursor state for a domain
    fn load(&self, domain: &str) -> Result<Option<CursorState>>;

    /// Save cursor state (upsert by domain)
    fn save(&self, state: &CursorState) -> Result<()>;

    /// Delete the cursor state for a domain, forcing a fresh export
    fn delete(&self, domain: &str) -> Result<()>;
}
