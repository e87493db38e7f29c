//! Pagination driver
//!
//! Pulls pages from an [`ExportSource`] until the export is caught up,
//! deduplicating, translating and emitting records along the way and
//! checkpointing the cursor after every page.

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};

use super::dedup::{Deduplicator, SkipReason};
use super::source::ExportSource;
use super::stop::StopSignal;
use super::translate::translate;
use crate::models::{CursorState, FieldMetadata, Page};
use crate::sink::EventSink;
use crate::storage::CursorStore;

/// Why a drive ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The last page reported end of stream
    EndOfStream,
    /// The remote rejected the start time as too recent
    SoftStall,
    /// The remote cursor stopped advancing
    LoopDetected,
    /// The stop signal was raised at a page boundary
    Cancelled,
    /// A fetch, sink flush or checkpoint failed
    Failed,
}

impl Termination {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

/// Counters for one drive
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExportStats {
    /// Pages fetched from the remote
    pub pages_fetched: usize,
    /// Records seen across all pages
    pub records_seen: usize,
    /// Events accepted by the sink
    pub records_emitted: usize,
    /// Deleted tickets skipped
    pub skipped_deleted: usize,
    /// Boundary duplicates skipped
    pub skipped_duplicate: usize,
    /// Records that failed translation
    pub translate_errors: usize,
    /// Events the sink rejected
    pub sink_errors: usize,
}

/// Result of driving one export
#[derive(Debug, Clone)]
pub struct DriveReport {
    /// Cursor state after the last fully processed page
    pub state: CursorState,
    pub stats: ExportStats,
    pub termination: Termination,
    /// Description of the failure when `termination` is `Failed`
    pub error: Option<String>,
}

/// Collaborators used while paginating
pub struct PaginationDriver<'a> {
    source: &'a dyn ExportSource,
    store: &'a dyn CursorStore,
    fields: &'a FieldMetadata,
}

impl<'a> PaginationDriver<'a> {
    pub fn new(
        source: &'a dyn ExportSource,
        store: &'a dyn CursorStore,
        fields: &'a FieldMetadata,
    ) -> Self {
        Self {
            source,
            store,
            fields,
        }
    }

    /// Drive the export from `start_time` until it completes, stalls or fails.
    ///
    /// `state` is moved in and the updated state is returned in the report.
    /// The sink is flushed and the cursor saved to the store after every
    /// processed page, so a failure later in the run never loses earlier
    /// progress. A page whose events cannot be flushed is not checkpointed.
    pub fn drive(
        &self,
        mut state: CursorState,
        start_time: DateTime<Utc>,
        sink: &mut dyn EventSink,
        stop: &StopSignal,
    ) -> DriveReport {
        let mut stats = ExportStats::default();
        let mut dedup = Deduplicator::new(state.watermark);
        let mut start_time = start_time;

        let (termination, error) = loop {
            if stop.is_cancelled() {
                info!("Export for {} cancelled at start_time {}", state.domain, start_time);
                break (Termination::Cancelled, None);
            }

            debug!("Fetching export page for {} from {}", state.domain, start_time);
            let page = match self.source.fetch_page(start_time) {
                Ok(page) => page,
                Err(e) if e.is_soft_stall() => {
                    info!("Export for {} caught up at {}: {}", state.domain, start_time, e);
                    break (Termination::SoftStall, None);
                }
                Err(e) => {
                    error!(
                        "Failed to fetch export page for {} at start_time {}: {}",
                        state.domain, start_time, e
                    );
                    break (Termination::Failed, Some(e.to_string()));
                }
            };
            stats.pages_fetched += 1;

            self.process_page(&page, &mut dedup, sink, &mut stats);

            // The page's events must reach the sink before the cursor moves past them
            if let Err(e) = sink.flush() {
                error!(
                    "Failed to flush events for {} at start_time {}: {:#}",
                    state.domain, start_time, e
                );
                break (Termination::Failed, Some(format!("{:#}", e)));
            }

            let stalled = !page.end_of_stream && page.next_start_time <= start_time;
            if !stalled {
                start_time = start_time.max(page.next_start_time);
            }

            state = state.committed(start_time, dedup.last_seen());
            if let Err(e) = self.store.save(&state) {
                error!("Failed to checkpoint cursor for {}: {:#}", state.domain, e);
                break (Termination::Failed, Some(format!("{:#}", e)));
            }

            if stalled {
                warn!(
                    "Export cursor for {} did not advance past {} ({} records on page); ending run",
                    state.domain,
                    start_time,
                    page.records.len()
                );
                break (Termination::LoopDetected, None);
            }

            if page.end_of_stream {
                debug!("Export for {} reached end of stream at {}", state.domain, start_time);
                break (Termination::EndOfStream, None);
            }
        };

        DriveReport {
            state,
            stats,
            termination,
            error,
        }
    }

    /// Deduplicate, translate and emit every record on a page
    fn process_page(
        &self,
        page: &Page,
        dedup: &mut Deduplicator,
        sink: &mut dyn EventSink,
        stats: &mut ExportStats,
    ) {
        for record in &page.records {
            stats.records_seen += 1;

            match dedup.check(record) {
                Err(SkipReason::Deleted) => {
                    debug!("Skipping deleted ticket {}", record.id);
                    stats.skipped_deleted += 1;
                }
                Err(SkipReason::Duplicate) => {
                    debug!(
                        "Skipping ticket {} already processed at {}",
                        record.id, record.updated_at
                    );
                    stats.skipped_duplicate += 1;
                }
                Ok(()) => match translate(record, self.fields) {
                    Ok(event) => match sink.accept(event) {
                        Ok(()) => stats.records_emitted += 1,
                        Err(e) => {
                            error!("Sink rejected ticket {}: {:#}", record.id, e);
                            stats.sink_errors += 1;
                        }
                    },
                    Err(e) => {
                        warn!("Skipping untranslatable record: {}", e);
                        stats.translate_errors += 1;
                    }
                },
            }

            dedup.observe(record);
        }
    }
}
