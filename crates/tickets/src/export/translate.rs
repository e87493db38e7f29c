//! Record translation into canonical ticket events

use log::debug;
use serde_json::Map;

use crate::models::{FieldMetadata, TicketEvent, TicketId, TicketRecord};

/// Prefix of flattened custom field attributes
const CUSTOM_FIELD_PREFIX: &str = "field_";

/// Key the remote ticket type is moved to, since `type` is reserved for the event type
const TICKET_TYPE_KEY: &str = "ticket_type";

/// Keys owned by the event envelope
const RESERVED_KEYS: [&str; 2] = ["type", "id"];

/// Errors from translating a single record
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TranslateError {
    /// A custom field's display name clashes with another attribute
    #[error("ticket {id}: field {field} renames to '{name}', which is already present")]
    NameCollision {
        id: TicketId,
        field: String,
        name: String,
    },
}

/// Parse the numeric ID out of a `field_<n>` key
pub fn custom_field_id(key: &str) -> Option<u64> {
    key.strip_prefix(CUSTOM_FIELD_PREFIX)?.parse().ok()
}

/// Translate a record into the event handed to the sink.
///
/// `field_<n>` attributes are renamed to their display name when
/// `fields` knows the ID and passed through unchanged otherwise. All
/// values are carried over as-is.
pub fn translate(
    record: &TicketRecord,
    fields: &FieldMetadata,
) -> Result<TicketEvent, TranslateError> {
    let mut out = Map::with_capacity(record.attributes.len());
    let mut renamed = Vec::new();

    for (key, value) in &record.attributes {
        if key == "id" {
            continue;
        }
        if key == "type" {
            if record.attributes.contains_key(TICKET_TYPE_KEY) {
                return Err(TranslateError::NameCollision {
                    id: record.id,
                    field: key.clone(),
                    name: TICKET_TYPE_KEY.to_string(),
                });
            }
            out.insert(TICKET_TYPE_KEY.to_string(), value.clone());
            continue;
        }

        match custom_field_id(key) {
            Some(field_id) => match fields.name(field_id) {
                Some(name) => renamed.push((key, name, value)),
                None => {
                    debug!("No display name for {} on ticket {}, keeping raw key", key, record.id);
                    out.insert(key.clone(), value.clone());
                }
            },
            None => {
                out.insert(key.clone(), value.clone());
            }
        }
    }

    // Renamed fields go last so clashes with plain attributes are caught
    // regardless of attribute order.
    for (key, name, value) in renamed {
        if RESERVED_KEYS.contains(&name) || out.contains_key(name) {
            return Err(TranslateError::NameCollision {
                id: record.id,
                field: key.clone(),
                name: name.to_string(),
            });
        }
        out.insert(name.to_string(), value.clone());
    }

    Ok(TicketEvent::new(record.id, out))
}
