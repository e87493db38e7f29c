//! Zendesk API HTTP client
//!
//! Provides the incremental ticket export and ticket field lookups.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::time::Duration;
use ureq::http::Response;
use ureq::{Agent, Body};
use url::Url;

use super::api::{
    CurrentUser, CurrentUserResponse, IncrementalTicketsResponse, TicketFieldsResponse,
};
use super::normalize::{field_display_name, page_from_response};
use crate::config::{Credentials, ExportConfig};
use crate::export::{ExportSource, FetchError, FieldSource};
use crate::models::{FieldMetadata, Page};

/// Zendesk API client for one domain
pub struct ZendeskClient {
    agent: Agent,
    base_url: Url,
    authorization: String,
    max_retries: u32,
}

impl ZendeskClient {
    /// Attempts per request before giving up on rate limits and server errors
    const DEFAULT_MAX_RETRIES: u32 = 5;

    /// Upper bound on a single Retry-After wait
    const MAX_RETRY_AFTER: Duration = Duration::from_secs(300);

    /// Per-request timeout
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

    /// Create a client for `domain`
    ///
    /// # Arguments
    /// * `domain` - Zendesk subdomain ("company" for company.zendesk.com) or a full API base URL
    /// * `credentials` - User and password or API token
    pub fn new(domain: &str, credentials: &Credentials) -> Result<Self> {
        let config = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(Self::REQUEST_TIMEOUT))
            .build();

        Ok(Self {
            agent: Agent::new_with_config(config),
            base_url: base_url_for(domain)?,
            authorization: credentials.authorization_header(),
            max_retries: Self::DEFAULT_MAX_RETRIES,
        })
    }

    /// Create a client from export configuration
    pub fn from_config(config: &ExportConfig) -> Result<Self> {
        info!("Creating a Zendesk client for {} as {}", config.domain, config.user);
        Self::new(&config.domain, &config.credentials()?)
    }

    /// Override the number of attempts per request
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Check the credentials by fetching the current user
    ///
    /// Zendesk answers unauthenticated requests with an anonymous user whose
    /// id is null, so a successful response alone proves nothing.
    pub fn verify(&self) -> Result<CurrentUser> {
        let url = self.endpoint("users/me.json")?;
        let mut response = self.get(&url)?;
        let me: CurrentUserResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse current user response")?;

        if me.user.id.is_none() {
            bail!("Cannot initialize a valid Zendesk client. Please check your login credentials.");
        }
        info!(
            "Authenticated to Zendesk as {} ({})",
            me.user.name.as_deref().unwrap_or("unknown"),
            me.user.role.as_deref().unwrap_or("no role")
        );
        Ok(me.user)
    }

    /// Fetch one page of the time-based incremental ticket export
    pub fn export_tickets(&self, start_time: DateTime<Utc>) -> Result<Page, FetchError> {
        let mut url = self.endpoint("incremental/tickets.json")?;
        url.query_pairs_mut()
            .append_pair("start_time", &start_time.timestamp().to_string());

        let mut response = self.get(&url)?;
        let body: IncrementalTicketsResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse incremental export response")?;

        debug!(
            "Export page from {}: {} tickets, end_of_stream={}",
            start_time,
            body.tickets.len(),
            body.end_of_stream
        );
        Ok(page_from_response(body, start_time)?)
    }

    /// List every ticket field, following pagination
    pub fn ticket_fields(&self) -> Result<FieldMetadata> {
        let mut metadata = FieldMetadata::new();
        let mut next = Some(self.endpoint("ticket_fields.json")?);

        while let Some(url) = next.take() {
            let mut response = self.get(&url)?;
            let page: TicketFieldsResponse = response
                .body_mut()
                .read_json()
                .context("Failed to parse ticket fields response")?;

            for field in page.ticket_fields {
                metadata.insert(field.id, field_display_name(&field.title));
            }

            next = page
                .next_page
                .map(|u| Url::parse(&u).context("Invalid ticket fields next_page URL"))
                .transpose()?;
        }

        Ok(metadata)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("Invalid endpoint path {}", path))
    }

    /// GET with retries on rate limits, server errors and transport failures
    fn get(&self, url: &Url) -> Result<Response<Body>, FetchError> {
        let mut delay = Duration::from_millis(500);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = self
                .agent
                .get(url.as_str())
                .header("Authorization", &self.authorization)
                .header("Accept", "application/json")
                .call();

            let mut response = match result {
                Ok(response) => response,
                Err(e) if attempt < self.max_retries => {
                    warn!("Request to {} failed ({}), retrying in {:?}", url.path(), e, delay);
                    std::thread::sleep(delay + jitter());
                    delay *= 2;
                    continue;
                }
                Err(e) => {
                    return Err(FetchError::Transport(
                        anyhow!(e).context(format!("Request to {} failed", url.path())),
                    ));
                }
            };

            let status = response.status().as_u16();
            if response.status().is_success() {
                return Ok(response);
            }

            if status == 429 {
                if attempt >= self.max_retries {
                    return Err(FetchError::RateLimited { attempts: attempt });
                }
                let header = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok());
                let wait = retry_after(header, Self::MAX_RETRY_AFTER);
                warn!("Rate limited by Zendesk, retrying in {}s", wait.as_secs());
                std::thread::sleep(wait);
                continue;
            }

            if status >= 500 && attempt < self.max_retries {
                warn!("Zendesk returned {} for {}, retrying in {:?}", status, url.path(), delay);
                std::thread::sleep(delay + jitter());
                delay *= 2;
                continue;
            }

            let body = response.body_mut().read_to_string().unwrap_or_default();
            if is_too_recent(status, &body) {
                return Err(FetchError::TooRecent(error_description(&body)));
            }
            return Err(FetchError::Http {
                status,
                body: error_description(&body),
            });
        }
    }
}

impl ExportSource for ZendeskClient {
    fn fetch_page(&self, start_time: DateTime<Utc>) -> Result<Page, FetchError> {
        self.export_tickets(start_time)
    }
}

impl FieldSource for ZendeskClient {
    fn list_fields(&self) -> Result<FieldMetadata> {
        self.ticket_fields()
    }
}

/// API base URL for a domain
///
/// A bare subdomain maps to `https://{domain}.zendesk.com/api/v2/`; anything
/// with a scheme is used as the base URL directly.
fn base_url_for(domain: &str) -> Result<Url> {
    let domain = domain.trim();
    let base = if domain.contains("://") {
        if domain.ends_with('/') {
            domain.to_string()
        } else {
            format!("{}/", domain)
        }
    } else {
        format!("https://{}.zendesk.com/api/v2/", domain)
    };
    Url::parse(&base).with_context(|| format!("Invalid Zendesk domain '{}'", domain))
}

/// True if an error response means "start_time is too close to now"
fn is_too_recent(status: u16, body: &str) -> bool {
    (status == 422 || status == 400) && body.to_ascii_lowercase().contains("too recent")
}

/// Human-readable message from a Zendesk error body
fn error_description(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("description")
                .or_else(|| v.get("error"))
                .and_then(|d| d.as_str().map(str::to_string))
        })
        .unwrap_or_else(|| body.chars().take(500).collect())
}

/// Wait time from a Retry-After header (seconds), defaulting to 60s
fn retry_after(header: Option<&str>, max: Duration) -> Duration {
    header
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(60))
        .min(max)
}

/// Random jitter (0-100ms) for retry backoff
fn jitter() -> Duration {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let hasher = RandomState::new().build_hasher();
    Duration::from_millis(hasher.finish() % 100)
}
