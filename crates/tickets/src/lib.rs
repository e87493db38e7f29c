//! Tickets crate - Zendesk incremental ticket export
//!
//! This crate provides the export pipeline behind ticketd:
//! - Domain models (TicketRecord, Page, CursorState, TicketEvent)
//! - Zendesk API client and response normalization
//! - Cursor storage trait abstractions
//! - Resumable, deduplicating export engine
//! - Event sinks for the downstream queue
//!
//! The engine only talks to traits ([`ExportSource`], [`FieldSource`],
//! [`CursorStore`], [`EventSink`]), so it runs the same against Zendesk or a
//! scripted source in tests.

pub mod config;
pub mod export;
pub mod models;
pub mod sink;
pub mod storage;
pub mod zendesk;

pub use crate::config::{Credentials, ExportConfig, Secret};
pub use export::{
    // Engine
    Engine, RunOptions, RunOutcome, run_loop,
    // Pagination
    DriveReport, ExportStats, PaginationDriver, Termination,
    // Collaborators
    ExportSource, FetchError, FieldSource, ScriptedSource, StopSignal,
    // Pure building blocks
    Deduplicator, TranslateError, resolve_start_time, should_emit, translate,
};
pub use models::{
    CursorState, FieldMetadata, Page, TicketEvent, TicketId, TicketRecord, TicketStatus, Watermark,
};
pub use sink::{ChannelSink, EventSink, JsonLinesSink, MemorySink};
pub use storage::{CursorStore, InMemoryCursorStore, SqliteCursorStore};
pub use zendesk::ZendeskClient;
