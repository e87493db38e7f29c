//! One export run: resolve the start time, paginate, persist the cursor

use chrono::Utc;
use log::{error, info};
use std::time::Instant;

use super::driver::{ExportStats, PaginationDriver, Termination};
use super::source::{ExportSource, FieldSource};
use super::start_time::resolve_start_time;
use super::stop::StopSignal;
use crate::models::CursorState;
use crate::sink::EventSink;
use crate::storage::CursorStore;

/// Per-run settings
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    /// Zendesk domain, also the cursor store key
    pub domain: String,
    /// Lookback for a first run; negative exports the full history
    pub lookback_days: f64,
    /// Whether to fetch tickets at all
    pub fetch_tickets: bool,
}

impl RunOptions {
    pub fn new(domain: impl Into<String>, lookback_days: f64) -> Self {
        Self {
            domain: domain.into(),
            lookback_days,
            fetch_tickets: true,
        }
    }

    /// Full-history exports run once instead of polling
    pub fn is_one_shot(&self) -> bool {
        self.lookback_days < 0.0
    }
}

/// Result of [`Engine::run_once`]
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub records_emitted: usize,
    pub final_cursor_state: CursorState,
    pub failed: bool,
    /// None when the run never reached pagination
    pub termination: Option<Termination>,
    pub stats: ExportStats,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl RunOutcome {
    fn aborted(state: CursorState, error: String, started: Instant) -> Self {
        Self {
            records_emitted: 0,
            final_cursor_state: state,
            failed: true,
            termination: None,
            stats: ExportStats::default(),
            error: Some(error),
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }
}

/// Export engine for one domain
pub struct Engine<'a> {
    source: &'a dyn ExportSource,
    fields: &'a dyn FieldSource,
    store: &'a dyn CursorStore,
}

impl<'a> Engine<'a> {
    pub fn new(
        source: &'a dyn ExportSource,
        fields: &'a dyn FieldSource,
        store: &'a dyn CursorStore,
    ) -> Self {
        Self {
            source,
            fields,
            store,
        }
    }

    /// Run one export to completion.
    ///
    /// Never returns an error: every failure is logged and reported through
    /// [`RunOutcome::failed`], with the cursor left at the last checkpoint.
    pub fn run_once(
        &self,
        options: &RunOptions,
        sink: &mut dyn EventSink,
        stop: &StopSignal,
    ) -> RunOutcome {
        let started = Instant::now();
        let domain = options.domain.as_str();

        let state = match self.store.load(domain) {
            Ok(Some(state)) => state,
            Ok(None) => {
                info!("No cursor stored for {}, starting first export", domain);
                CursorState::new(domain)
            }
            Err(e) => {
                error!("Failed to load cursor for {}: {:#}", domain, e);
                return RunOutcome::aborted(CursorState::new(domain), format!("{:#}", e), started);
            }
        };

        if !options.fetch_tickets {
            info!("Ticket fetching disabled for {}, nothing to do", domain);
            return RunOutcome {
                records_emitted: 0,
                final_cursor_state: state,
                failed: false,
                termination: None,
                stats: ExportStats::default(),
                error: None,
                duration_ms: started.elapsed().as_millis() as u64,
            };
        }

        let start_time = resolve_start_time(&state, options.lookback_days, Utc::now());
        info!("Starting ticket export for {} from {}", domain, start_time);

        let fields = match self.fields.list_fields() {
            Ok(fields) => fields,
            Err(e) => {
                error!("Failed to list ticket fields for {}: {:#}", domain, e);
                return RunOutcome::aborted(state, format!("{:#}", e), started);
            }
        };
        info!("Loaded {} ticket field names", fields.len());

        let driver = PaginationDriver::new(self.source, self.store, &fields);
        let report = driver.drive(state, start_time, sink, stop);

        let final_state = report.state.finished();
        let mut failed = report.termination.is_failure();
        let mut error = report.error;
        if !failed && let Err(e) = self.store.save(&final_state) {
            error!("Failed to save cursor for {}: {:#}", domain, e);
            failed = true;
            error = Some(format!("{:#}", e));
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            "Export for {} finished ({:?}): {} emitted, {} duplicates, {} deleted, {} errors in {:.2} minutes",
            domain,
            report.termination,
            report.stats.records_emitted,
            report.stats.skipped_duplicate,
            report.stats.skipped_deleted,
            report.stats.translate_errors + report.stats.sink_errors,
            duration_ms as f64 / 60_000.0
        );

        RunOutcome {
            records_emitted: report.stats.records_emitted,
            final_cursor_state: final_state,
            failed,
            termination: Some(report.termination),
            stats: report.stats,
            error,
            duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::FetchError;
    use crate::export::scripted::ScriptedSource;
    use crate::models::{FieldMetadata, Page, TicketId, TicketRecord, TicketStatus, Watermark};
    use crate::sink::MemorySink;
    use crate::storage::InMemoryCursorStore;
    use anyhow::{Result, anyhow};
    use chrono::{DateTime, Duration, TimeZone};
    use serde_json::json;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn ticket(id: u64, secs: i64) -> TicketRecord {
        TicketRecord::new(TicketId(id), ts(secs), TicketStatus::Open)
    }

    struct FailingFields;

    /// Sink whose output can never be made durable
    struct UnflushableSink;

    impl EventSink for UnflushableSink {
        fn accept(&mut self, _event: crate::models::TicketEvent) -> Result<()> {
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            Err(anyhow!("disk full"))
        }
    }

    impl FieldSource for FailingFields {
        fn list_fields(&self) -> Result<FieldMetadata> {
            Err(anyhow!("401 Unauthorized"))
        }
    }

    #[test]
    fn test_first_run_uses_lookback() {
        let source = ScriptedSource::new();
        let store = InMemoryCursorStore::new();
        let mut sink = MemorySink::new();
        let engine = Engine::new(&source, &source, &store);

        let outcome = engine.run_once(&RunOptions::new("acme", 7.0), &mut sink, &StopSignal::new());

        assert!(!outcome.failed);
        assert_eq!(outcome.termination, Some(Termination::SoftStall));
        let requested = source.requests()[0];
        let expected = Utc::now() - Duration::days(7);
        assert!((expected - requested).num_seconds().abs() <= 5);
    }

    #[test]
    fn test_full_history_starts_at_epoch() {
        let source = ScriptedSource::new();
        let store = InMemoryCursorStore::new();
        let engine = Engine::new(&source, &source, &store);

        engine.run_once(&RunOptions::new("acme", -1.0), &mut MemorySink::new(), &StopSignal::new());

        assert_eq!(source.requests(), vec![DateTime::<Utc>::UNIX_EPOCH]);
    }

    #[test]
    fn test_soft_stall_leaves_cursor_unchanged() {
        let source =
            ScriptedSource::new().error(FetchError::TooRecent("Too recent start_time".into()));
        let store = InMemoryCursorStore::new();
        let previous = CursorState::new("acme")
            .committed(ts(100), Some(Watermark::new(TicketId(4), ts(100))));
        store.save(&previous).unwrap();
        let mut sink = MemorySink::new();
        let engine = Engine::new(&source, &source, &store);

        let outcome = engine.run_once(&RunOptions::new("acme", 1.0), &mut sink, &StopSignal::new());

        assert!(!outcome.failed);
        assert_eq!(outcome.records_emitted, 0);
        assert_eq!(outcome.final_cursor_state.committed_start_time, Some(ts(100)));
        assert_eq!(outcome.final_cursor_state.watermark, previous.watermark);
        assert_eq!(source.requests(), vec![ts(100)]);
    }

    #[test]
    fn test_run_translates_with_field_metadata() {
        let fields: FieldMetadata = [(123, "priority_level")].into_iter().collect();
        let source = ScriptedSource::new()
            .with_fields(fields)
            .page(Page::new(vec![ticket(1, 10).with_attribute("field_123", "High")], true, ts(10)));
        let store = InMemoryCursorStore::new();
        let mut sink = MemorySink::new();
        let engine = Engine::new(&source, &source, &store);

        let outcome =
            engine.run_once(&RunOptions::new("acme", -1.0), &mut sink, &StopSignal::new());

        assert_eq!(outcome.records_emitted, 1);
        assert_eq!(sink.events()[0].get("priority_level"), Some(&json!("High")));

        let saved = store.load("acme").unwrap().unwrap();
        assert_eq!(saved.committed_start_time, Some(ts(10)));
        assert!(saved.last_run_at.is_some());
    }

    #[test]
    fn test_field_listing_failure_fails_run() {
        let source = ScriptedSource::new().page(Page::new(vec![ticket(1, 10)], true, ts(10)));
        let store = InMemoryCursorStore::new();
        let mut sink = MemorySink::new();
        let engine = Engine::new(&source, &FailingFields, &store);

        let outcome = engine.run_once(&RunOptions::new("acme", 1.0), &mut sink, &StopSignal::new());

        assert!(outcome.failed);
        assert!(outcome.error.unwrap().contains("401"));
        assert!(source.requests().is_empty());
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_disabled_tickets_does_nothing() {
        let source = ScriptedSource::new().page(Page::new(vec![ticket(1, 10)], true, ts(10)));
        let store = InMemoryCursorStore::new();
        let engine = Engine::new(&source, &source, &store);
        let mut options = RunOptions::new("acme", 1.0);
        options.fetch_tickets = false;

        let outcome = engine.run_once(&options, &mut MemorySink::new(), &StopSignal::new());

        assert!(!outcome.failed);
        assert!(outcome.termination.is_none());
        assert!(source.requests().is_empty());
    }

    #[test]
    fn test_transport_failure_marks_run_failed() {
        let source = ScriptedSource::new().error(FetchError::Http {
            status: 401,
            body: "Couldn't authenticate you".into(),
        });
        let store = InMemoryCursorStore::new();
        let engine = Engine::new(&source, &source, &store);

        let outcome = engine.run_once(
            &RunOptions::new("acme", 1.0),
            &mut MemorySink::new(),
            &StopSignal::new(),
        );

        assert!(outcome.failed);
        assert_eq!(outcome.termination, Some(Termination::Failed));
        assert!(store.load("acme").unwrap().is_none());
    }

    #[test]
    fn test_one_shot_mode() {
        assert!(RunOptions::new("acme", -1.0).is_one_shot());
        assert!(!RunOptions::new("acme", 0.0).is_one_shot());
    }

    #[test]
    fn test_flush_failure_fails_run_and_keeps_cursor() {
        let source = ScriptedSource::new().page(Page::new(vec![ticket(1, 10)], true, ts(10)));
        let store = InMemoryCursorStore::new();
        let previous = CursorState::new("acme").committed(ts(0), None);
        store.save(&previous).unwrap();
        let engine = Engine::new(&source, &source, &store);

        let outcome = engine.run_once(
            &RunOptions::new("acme", 1.0),
            &mut UnflushableSink,
            &StopSignal::new(),
        );

        assert!(outcome.failed);
        assert_eq!(outcome.termination, Some(Termination::Failed));
        assert!(outcome.error.unwrap().contains("disk full"));
        assert_eq!(store.load("acme").unwrap(), Some(previous));
    }
}
