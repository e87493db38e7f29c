//! Deterministic in-memory export source
//!
//! Replays a fixed script of pages and errors. Used by tests to exercise the
//! engine without network access.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;

use super::source::{ExportSource, FetchError, FieldSource};
use crate::models::{FieldMetadata, Page};

/// Export source that answers from a script
///
/// Once the script runs out it reports `TooRecent`, like a remote that has
/// nothing newer to offer, unless built with [`ScriptedSource::repeating`].
#[derive(Default)]
pub struct ScriptedSource {
    responses: Mutex<VecDeque<Result<Page, FetchError>>>,
    repeat: Option<Page>,
    fields: FieldMetadata,
    requests: Mutex<Vec<DateTime<Utc>>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A source that returns the same page forever
    pub fn repeating(page: Page) -> Self {
        Self {
            repeat: Some(page),
            ..Self::default()
        }
    }

    /// Queue a page
    pub fn page(self, page: Page) -> Self {
        self.responses.lock().unwrap().push_back(Ok(page));
        self
    }

    /// Queue an error
    pub fn error(self, error: FetchError) -> Self {
        self.responses.lock().unwrap().push_back(Err(error));
        self
    }

    /// Field metadata returned by `list_fields`
    pub fn with_fields(mut self, fields: FieldMetadata) -> Self {
        self.fields = fields;
        self
    }

    /// Start times requested so far, in order
    pub fn requests(&self) -> Vec<DateTime<Utc>> {
        self.requests.lock().unwrap().clone()
    }
}

impl ExportSource for ScriptedSource {
    fn fetch_page(&self, start_time: DateTime<Utc>) -> Result<Page, FetchError> {
        self.requests.lock().unwrap().push(start_time);

        if let Some(response) = self.responses.lock().unwrap().pop_front() {
            return response;
        }

        match &self.repeat {
            Some(page) => Ok(page.clone()),
            None => Err(FetchError::TooRecent("script exhausted".to_string())),
        }
    }
}

impl FieldSource for ScriptedSource {
    fn list_fields(&self) -> Result<FieldMetadata> {
        Ok(self.fields.clone())
    }
}
