//! Integration tests for the tickets crate
//!
//! These tests drive the export engine end to end against scripted sources
//! and real cursor stores, including restarts between runs.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Value, json};
use std::sync::mpsc;
use std::thread;

use tickets::export::FetchError;
use tickets::storage::{CursorStore, InMemoryCursorStore, SqliteCursorStore};
use tickets::zendesk::{api::IncrementalTicketsResponse, page_from_response};
use tickets::{
    ChannelSink, Engine, FieldMetadata, JsonLinesSink, MemorySink, Page, RunOptions, ScriptedSource,
    StopSignal, Termination, TicketId, TicketRecord, TicketStatus, Watermark,
};
use tempfile::TempDir;

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

/// Helper to create an open ticket updated `secs` after the base time
fn ticket(id: u64, secs: i64) -> TicketRecord {
    TicketRecord::new(TicketId(id), ts(secs), TicketStatus::Open)
        .with_attribute("subject", format!("Ticket {}", id))
        .with_attribute("status", "open")
}

fn emitted_ids(sink: &MemorySink) -> Vec<u64> {
    sink.events().iter().map(|e| e.id.get()).collect()
}

#[test]
fn test_two_page_export_emits_each_ticket_once() {
    let a = ticket(1, 10);
    let b = ticket(2, 20);
    let c = ticket(3, 30);
    let source = ScriptedSource::new()
        .page(Page::new(vec![a, b.clone()], false, ts(20)))
        .page(Page::new(vec![b, c], true, ts(35)));
    let store = InMemoryCursorStore::new();
    let mut sink = MemorySink::new();
    let engine = Engine::new(&source, &source, &store);

    let outcome = engine.run_once(&RunOptions::new("acme", -1.0), &mut sink, &StopSignal::new());

    assert!(!outcome.failed);
    assert_eq!(outcome.termination, Some(Termination::EndOfStream));
    assert_eq!(emitted_ids(&sink), vec![1, 2, 3]);
    assert_eq!(outcome.records_emitted, 3);
    assert_eq!(
        outcome.final_cursor_state.watermark,
        Some(Watermark::new(TicketId(3), ts(30)))
    );
    assert_eq!(outcome.final_cursor_state.committed_start_time, Some(ts(35)));
}

#[test]
fn test_restart_after_failure_resumes_without_duplicates() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("cursor.test.sqlite");

    // First run: page 1 succeeds, page 2 fails
    {
        let store = SqliteCursorStore::new(&db_path).unwrap();
        let source = ScriptedSource::new()
            .page(Page::new(vec![ticket(1, 10), ticket(2, 20)], false, ts(20)))
            .error(FetchError::Http {
                status: 503,
                body: "Service Unavailable".into(),
            });
        let mut sink = MemorySink::new();
        let engine = Engine::new(&source, &source, &store);

        let outcome = engine.run_once(&RunOptions::new("acme", 1.0), &mut sink, &StopSignal::new());

        assert!(outcome.failed);
        assert_eq!(emitted_ids(&sink), vec![1, 2]);
    }

    // Second run in a "new process": resumes from page 1's cursor
    let store = SqliteCursorStore::new(&db_path).unwrap();
    let saved = store.load("acme").unwrap().unwrap();
    assert_eq!(saved.committed_start_time, Some(ts(20)));

    let source = ScriptedSource::new().page(Page::new(
        vec![ticket(2, 20), ticket(3, 30)],
        true,
        ts(30),
    ));
    let mut sink = MemorySink::new();
    let engine = Engine::new(&source, &source, &store);

    let outcome = engine.run_once(&RunOptions::new("acme", 1.0), &mut sink, &StopSignal::new());

    assert!(!outcome.failed);
    assert_eq!(source.requests(), vec![ts(20)]);
    assert_eq!(emitted_ids(&sink), vec![3]);
    assert_eq!(
        store.load("acme").unwrap().unwrap().watermark,
        Some(Watermark::new(TicketId(3), ts(30)))
    );
}

#[test]
fn test_caught_up_run_is_not_a_failure() {
    let store = InMemoryCursorStore::new();
    let mut sink = MemorySink::new();

    let first = ScriptedSource::new().page(Page::new(vec![ticket(1, 10)], true, ts(10)));
    Engine::new(&first, &first, &store).run_once(
        &RunOptions::new("acme", 1.0),
        &mut sink,
        &StopSignal::new(),
    );

    let second = ScriptedSource::new().error(FetchError::TooRecent(
        "Too recent start_time. Use a start_time older than 1 minute".into(),
    ));
    let outcome = Engine::new(&second, &second, &store).run_once(
        &RunOptions::new("acme", 1.0),
        &mut sink,
        &StopSignal::new(),
    );

    assert!(!outcome.failed);
    assert_eq!(outcome.termination, Some(Termination::SoftStall));
    assert_eq!(outcome.records_emitted, 0);
    assert_eq!(outcome.final_cursor_state.committed_start_time, Some(ts(10)));
    assert_eq!(second.requests(), vec![ts(10)]);
    assert_eq!(emitted_ids(&sink), vec![1]);
}

#[test]
fn test_stalled_remote_cursor_terminates() {
    let source = ScriptedSource::repeating(Page::new(vec![ticket(1, 10)], false, ts(0)));
    let store = InMemoryCursorStore::new();
    let mut sink = MemorySink::new();
    let engine = Engine::new(&source, &source, &store);

    let outcome = engine.run_once(&RunOptions::new("acme", -1.0), &mut sink, &StopSignal::new());

    assert!(!outcome.failed);
    assert_eq!(outcome.termination, Some(Termination::LoopDetected));
    assert!(source.requests().len() <= 2);
}

#[test]
fn test_zendesk_page_through_engine() {
    let raw: IncrementalTicketsResponse = serde_json::from_value(json!({
        "tickets": [
            {
                "id": 101,
                "type": "question",
                "subject": "Where is my order?",
                "status": "open",
                "updated_at": "2024-03-01T12:00:00Z",
                "custom_fields": [{"id": 123, "value": "High"}]
            },
            {
                "id": 102,
                "status": "deleted",
                "updated_at": "2024-03-01T12:05:00Z"
            }
        ],
        "end_time": 1709294700,
        "end_of_stream": true,
        "next_page": null,
        "count": 2
    }))
    .unwrap();
    let page = page_from_response(raw, ts(0)).unwrap();

    let fields: FieldMetadata = [(123, "priority_level")].into_iter().collect();
    let source = ScriptedSource::new().with_fields(fields).page(page);
    let store = InMemoryCursorStore::new();
    let mut sink = JsonLinesSink::new(Vec::new());
    let engine = Engine::new(&source, &source, &store);

    let outcome = engine.run_once(&RunOptions::new("acme", -1.0), &mut sink, &StopSignal::new());
    assert_eq!(outcome.records_emitted, 1);
    assert_eq!(outcome.stats.skipped_deleted, 1);

    let output = String::from_utf8(sink.into_inner()).unwrap();
    let events: Vec<Value> = output.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0],
        json!({
            "type": "ticket",
            "id": 101,
            "ticket_type": "question",
            "subject": "Where is my order?",
            "status": "open",
            "updated_at": "2024-03-01T12:00:00Z",
            "priority_level": "High"
        })
    );

    // Deleted ticket still moves the watermark
    assert_eq!(
        outcome.final_cursor_state.watermark.map(|w| w.id),
        Some(TicketId(102))
    );
}

#[test]
fn test_channel_sink_delivers_to_consumer_thread() {
    let (tx, rx) = mpsc::channel();
    let consumer = thread::spawn(move || {
        rx.iter()
            .map(|e: tickets::TicketEvent| e.id.get())
            .collect::<Vec<_>>()
    });

    {
        let source = ScriptedSource::new()
            .page(Page::new(vec![ticket(1, 10), ticket(2, 20)], false, ts(20)))
            .page(Page::new(vec![ticket(3, 30)], true, ts(30)));
        let store = InMemoryCursorStore::new();
        let mut sink = ChannelSink::new(tx);
        let engine = Engine::new(&source, &source, &store);
        engine.run_once(&RunOptions::new("acme", -1.0), &mut sink, &StopSignal::new());
    }

    assert_eq!(consumer.join().unwrap(), vec![1, 2, 3]);
}
