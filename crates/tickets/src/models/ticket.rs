//! Ticket records as returned by the incremental export

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Unique identifier for a ticket (Zendesk ticket ID)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TicketId(pub u64);

impl TicketId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for TicketId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ticket status
///
/// `Deleted` marks a logically deleted ticket. Deleted tickets still show up
/// in the incremental export so consumers can advance past them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    New,
    Open,
    Pending,
    Hold,
    Solved,
    Closed,
    Deleted,
    #[serde(other)]
    Unknown,
}

impl TicketStatus {
    /// Parse a status string, mapping anything unrecognized to `Unknown`
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "new" => Self::New,
            "open" => Self::Open,
            "pending" => Self::Pending,
            "hold" => Self::Hold,
            "solved" => Self::Solved,
            "closed" => Self::Closed,
            "deleted" => Self::Deleted,
            _ => Self::Unknown,
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted)
    }
}

/// The `(id, updated_at)` pair of the last processed record
///
/// Used to recognise the boundary record that the export repeats at the
/// start of the next page or run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
    pub id: TicketId,
    pub updated_at: DateTime<Utc>,
}

impl Watermark {
    pub fn new(id: TicketId, updated_at: DateTime<Utc>) -> Self {
        Self { id, updated_at }
    }
}

/// A single ticket change from the incremental export
///
/// `attributes` holds every remote attribute except `id`, with custom
/// fields flattened to `field_<n>` keys.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketRecord {
    pub id: TicketId,
    pub updated_at: DateTime<Utc>,
    pub status: TicketStatus,
    pub attributes: Map<String, Value>,
}

impl TicketRecord {
    pub fn new(id: TicketId, updated_at: DateTime<Utc>, status: TicketStatus) -> Self {
        Self {
            id,
            updated_at,
            status,
            attributes: Map::new(),
        }
    }

    /// Add an attribute (builder style)
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn watermark(&self) -> Watermark {
        Watermark::new(self.id, self.updated_at)
    }
}

/// One page of the incremental export
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Records in export order
    pub records: Vec<TicketRecord>,
    /// True when the export has caught up with the present
    pub end_of_stream: bool,
    /// Start time to request for the following page
    pub next_start_time: DateTime<Utc>,
}

impl Page {
    pub fn new(
        records: Vec<TicketRecord>,
        end_of_stream: bool,
        next_start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            records,
            end_of_stream,
            next_start_time,
        }
    }
}
