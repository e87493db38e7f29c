//! Incremental export engine
//!
//! Turns the remote "tickets changed since T" API into a resumable,
//! deduplicated stream of ticket events. Runs are safe to interrupt: the
//! cursor is checkpointed after every page.

mod dedup;
mod driver;
mod engine;
mod schedule;
pub mod scripted;
mod source;
mod start_time;
mod stop;
mod translate;

pub use dedup::{Deduplicator, SkipReason, should_emit};
pub use driver::{DriveReport, ExportStats, PaginationDriver, Termination};
pub use engine::{Engine, RunOptions, RunOutcome};
pub use schedule::run_loop;
pub use scripted::ScriptedSource;
pub use source::{ExportSource, FetchError, FieldSource};
pub use start_time::resolve_start_time;
pub use stop::StopSignal;
pub use translate::{TranslateError, custom_field_id, translate};
