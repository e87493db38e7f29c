//! Boundary-record deduplication
//!
//! The incremental export only ever repeats one record across a page or run
//! boundary: the last record already processed. Comparing against that single
//! `(id, updated_at)` pair is enough, so no history of seen IDs is kept.

use crate::models::{TicketRecord, Watermark};

/// Decide whether a record should be translated and emitted.
///
/// Returns `false` for deleted tickets and for the record matching
/// `last_seen` exactly. A record with the same ID but a different
/// `updated_at` is a genuine update and is emitted.
pub fn should_emit(record: &TicketRecord, last_seen: Option<&Watermark>) -> bool {
    if record.status.is_deleted() {
        return false;
    }
    last_seen.is_none_or(|mark| *mark != record.watermark())
}

/// Why a record was not emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Deleted,
    Duplicate,
}

/// Tracks the last-seen watermark across pages of one run
#[derive(Debug, Clone, Default)]
pub struct Deduplicator {
    last_seen: Option<Watermark>,
}

impl Deduplicator {
    /// Start from the watermark persisted by the previous run
    pub fn new(last_seen: Option<Watermark>) -> Self {
        Self { last_seen }
    }

    /// Classify a record without updating the watermark
    pub fn check(&self, record: &TicketRecord) -> Result<(), SkipReason> {
        if should_emit(record, self.last_seen.as_ref()) {
            Ok(())
        } else if record.status.is_deleted() {
            Err(SkipReason::Deleted)
        } else {
            Err(SkipReason::Duplicate)
        }
    }

    /// Advance the watermark past a record, whatever happened to it
    pub fn observe(&mut self, record: &TicketRecord) {
        self.last_seen = Some(record.watermark());
    }

    pub fn last_seen(&self) -> Option<Watermark> {
        self.last_seen
    }
}
