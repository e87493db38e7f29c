//! Collaborator traits consumed by the export engine

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::models::{FieldMetadata, Page};

/// Errors returned when fetching an export page
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The requested start time is too close to now; no data is available yet
    #[error("start time too recent: {0}")]
    TooRecent(String),

    /// Still rate limited after exhausting retries
    #[error("rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },

    /// Non-success HTTP status
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Network, authentication or decoding failure
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

impl FetchError {
    /// True for the "start time too recent" condition, which ends a run
    /// normally instead of failing it
    pub fn is_soft_stall(&self) -> bool {
        matches!(self, Self::TooRecent(_))
    }
}

/// Source of incremental export pages
pub trait ExportSource {
    /// Fetch the page of changes starting at `start_time`
    fn fetch_page(&self, start_time: DateTime<Utc>) -> Result<Page, FetchError>;
}

/// Source of custom field display names
pub trait FieldSource {
    /// List all custom ticket fields
    fn list_fields(&self) -> Result<FieldMetadata>;
}
