//! Cursor persistence
//!
//! The engine keeps nothing in process memory between runs; everything it
//! needs to resume lives behind the [`CursorStore`] trait.

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryCursorStore;
pub use sqlite::SqliteCursorStore;
pub use traits::CursorStore;
