//! Canonical events handed to the downstream sink

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use super::TicketId;

/// Event type carried by every ticket event
pub const TICKET_EVENT_TYPE: &str = "ticket";

/// A translated ticket update
///
/// Serializes as `{"type":"ticket","id":<id>, ...fields}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: TicketId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl TicketEvent {
    pub fn new(id: TicketId, fields: Map<String, Value>) -> Self {
        Self {
            kind: TICKET_EVENT_TYPE.to_string(),
            id,
            fields,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Display names for custom ticket fields, keyed by numeric field ID
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMetadata {
    names: HashMap<u64, String>,
}

impl FieldMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field_id: u64, name: impl Into<String>) {
        self.names.insert(field_id, name.into());
    }

    /// Display name for a field ID
    pub fn name(&self, field_id: u64) -> Option<&str> {
        self.names.get(&field_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(u64, S)> for FieldMetadata {
    fn from_iter<I: IntoIterator<Item = (u64, S)>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(|(id, name)| (id, name.into())).collect(),
        }
    }
}
