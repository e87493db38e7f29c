//! Zendesk API integration
//!
//! This module provides:
//! - HTTP client for the incremental ticket export and ticket fields APIs
//! - Response normalization to export models

mod client;
mod normalize;

pub use client::ZendeskClient;
pub use normalize::{field_display_name, normalize_ticket, page_from_response};

/// Zendesk API response types
pub mod api {
    use serde::Deserialize;
    use serde_json::Value;

    /// Response from the time-based incremental ticket export
    #[derive(Debug, Deserialize)]
    pub struct IncrementalTicketsResponse {
        #[serde(default)]
        pub tickets: Vec<Value>,
        pub next_page: Option<String>,
        pub end_time: Option<i64>,
        #[serde(default)]
        pub end_of_stream: bool,
    }

    /// Response from listing ticket fields
    #[derive(Debug, Deserialize)]
    pub struct TicketFieldsResponse {
        #[serde(default)]
        pub ticket_fields: Vec<TicketField>,
        pub next_page: Option<String>,
    }

    /// A system or custom ticket field definition
    #[derive(Debug, Deserialize)]
    pub struct TicketField {
        pub id: u64,
        pub title: String,
    }

    /// Response from the current user endpoint
    #[derive(Debug, Deserialize)]
    pub struct CurrentUserResponse {
        pub user: CurrentUser,
    }

    /// The authenticated user; `id` is null when authentication failed
    #[derive(Debug, Deserialize)]
    pub struct CurrentUser {
        pub id: Option<u64>,
        pub name: Option<String>,
        pub role: Option<String>,
    }
}
