//! Event sinks
//!
//! The engine hands every translated event to an [`EventSink`]. Sinks own
//! their delivery guarantees; the engine logs a failed `accept` and moves on.

mod json_lines;

use anyhow::{Result, anyhow};
use std::sync::mpsc::Sender;

use crate::models::TicketEvent;

pub use json_lines::JsonLinesSink;

/// Destination for translated ticket events
pub trait EventSink {
    /// Accept one event
    fn accept(&mut self, event: TicketEvent) -> Result<()>;

    /// Flush buffered events, called at the end of every run
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Collects events in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Vec<TicketEvent>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[TicketEvent] {
        &self.events
    }
}

impl EventSink for MemorySink {
    fn accept(&mut self, event: TicketEvent) -> Result<()> {
        self.events.push(event);
        Ok(())
    }
}

/// Forwards events to a channel consumed by another thread
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: Sender<TicketEvent>,
}

impl ChannelSink {
    pub fn new(sender: Sender<TicketEvent>) -> Self {
        Self { sender }
    }
}

impl EventSink for ChannelSink {
    fn accept(&mut self, event: TicketEvent) -> Result<()> {
        self.sender
            .send(event)
            .map_err(|e| anyhow!("Event receiver disconnected (ticket {})", e.0.id))
    }
}
