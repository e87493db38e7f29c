//! Cursor state tracking for resumable incremental export

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Watermark;

/// Tracks export progress for one Zendesk domain
///
/// Persisted between runs so a restarted engine resumes where the last one
/// stopped. Only one CursorState per domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorState {
    /// Zendesk domain this cursor belongs to
    pub domain: String,
    /// Last processed `(id, updated_at)` pair
    pub watermark: Option<Watermark>,
    /// Start time for the next export request (None = never fetched a page)
    pub committed_start_time: Option<DateTime<Utc>>,
    /// When the last run finished
    #[serde(default)]
    pub last_run_at: Option<DateTime<Utc>>,
}

impl CursorState {
    /// Create an empty state for a domain that has never been exported
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            watermark: None,
            committed_start_time: None,
            last_run_at: None,
        }
    }

    /// True if no page has ever been committed for this domain
    pub fn is_first_run(&self) -> bool {
        self.committed_start_time.is_none()
    }

    /// Record a fully processed page
    pub fn committed(mut self, start_time: DateTime<Utc>, watermark: Option<Watermark>) -> Self {
        self.committed_start_time = Some(start_time);
        self.watermark = watermark;
        self
    }

    /// Stamp the end of a run
    pub fn finished(mut self) -> Self {
        self.last_run_at = Some(Utc::now());
        self
    }
}
