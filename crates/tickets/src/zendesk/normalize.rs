//! Zendesk API response normalization
//!
//! Converts raw Zendesk responses to export models.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, TimeZone, Utc};
use log::warn;
use serde_json::{Map, Value};
use url::Url;

use super::api::IncrementalTicketsResponse;
use crate::models::{Page, TicketId, TicketRecord, TicketStatus};

/// Normalize a raw Zendesk ticket into a record
///
/// Every custom field `{ "id": n, "value": v }` becomes a `field_<n>`
/// attribute. The duplicate `fields` array Zendesk sends alongside
/// `custom_fields` is dropped.
pub fn normalize_ticket(raw: Value) -> Result<TicketRecord> {
    let Value::Object(mut attributes) = raw else {
        bail!("Ticket is not a JSON object");
    };

    let id = attributes
        .remove("id")
        .and_then(|v| v.as_u64())
        .context("Ticket has no numeric id")?;

    let updated_at = attributes
        .get("updated_at")
        .and_then(Value::as_str)
        .with_context(|| format!("Ticket {} has no updated_at", id))?;
    let updated_at = DateTime::parse_from_rfc3339(updated_at)
        .with_context(|| format!("Ticket {} has invalid updated_at '{}'", id, updated_at))?
        .with_timezone(&Utc);

    let status = attributes
        .get("status")
        .and_then(Value::as_str)
        .map(TicketStatus::parse)
        .unwrap_or(TicketStatus::Unknown);

    if let Some(custom_fields) = attributes.remove("custom_fields") {
        attributes.remove("fields");
        flatten_custom_fields(id, custom_fields, &mut attributes)?;
    }

    Ok(TicketRecord {
        id: TicketId(id),
        updated_at,
        status,
        attributes,
    })
}

/// Move `custom_fields` entries into `field_<n>` attributes
fn flatten_custom_fields(
    ticket_id: u64,
    custom_fields: Value,
    attributes: &mut Map<String, Value>,
) -> Result<()> {
    let entries = match custom_fields {
        Value::Array(entries) => entries,
        Value::Null => return Ok(()),
        _ => bail!("Ticket {} has non-array custom_fields", ticket_id),
    };

    for entry in entries {
        let field_id = entry
            .get("id")
            .and_then(Value::as_u64)
            .with_context(|| format!("Ticket {} has a custom field without an id", ticket_id))?;
        let value = entry.get("value").cloned().unwrap_or(Value::Null);
        attributes.insert(format!("field_{}", field_id), value);
    }

    Ok(())
}

/// Build a page from an incremental export response
///
/// Malformed tickets are logged and dropped so one bad record doesn't
/// fail the page. The continuation cursor is `end_time`, falling back to
/// the `start_time` parameter of `next_page`.
pub fn page_from_response(
    response: IncrementalTicketsResponse,
    request_start: DateTime<Utc>,
) -> Result<Page> {
    let next_start_time = match response.end_time {
        Some(end_time) => timestamp(end_time)?,
        None => match response.next_page.as_deref().and_then(cursor_from_next_page) {
            Some(start_time) => timestamp(start_time)?,
            None if response.end_of_stream => request_start,
            None => bail!("Export page has neither end_time nor a next_page cursor"),
        },
    };

    let mut records = Vec::with_capacity(response.tickets.len());
    for (index, raw) in response.tickets.into_iter().enumerate() {
        match normalize_ticket(raw) {
            Ok(record) => records.push(record),
            Err(e) => warn!(
                "Dropping malformed ticket at index {} of page {}: {:#}",
                index, request_start, e
            ),
        }
    }

    Ok(Page::new(records, response.end_of_stream, next_start_time))
}

/// Extract the `start_time` query parameter from a `next_page` URL
fn cursor_from_next_page(next_page: &str) -> Option<i64> {
    let url = Url::parse(next_page).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "start_time")
        .and_then(|(_, value)| value.parse().ok())
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .with_context(|| format!("Invalid export timestamp {}", secs))
}

/// Display name for a ticket field title: lowercase, whitespace runs as `_`
pub fn field_display_name(title: &str) -> String {
    title
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}
