//! Export configuration loading
//!
//! Supports loading the Zendesk connection settings from (in order of priority):
//! 1. An explicit JSON file
//! 2. `zendesk.json` in the ticketd config directory
//! 3. Environment variables

use anyhow::{Context, Result, bail};
use base64::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::export::RunOptions;

/// Config filename in the ticketd config directory
const CONFIG_FILE: &str = "zendesk.json";

fn default_true() -> bool {
    true
}

fn default_lookback_days() -> f64 {
    1.0
}

fn default_interval_minutes() -> f64 {
    1.0
}

/// Settings for exporting one Zendesk domain
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Zendesk subdomain: for company.zendesk.com this is "company"
    pub domain: String,
    /// Zendesk user with the admin role
    pub user: String,
    /// Password authentication
    #[serde(default)]
    pub password: Option<String>,
    /// API token authentication, used instead of a password
    #[serde(default)]
    pub api_token: Option<String>,
    /// Whether to fetch tickets
    #[serde(default = "default_true")]
    pub tickets: bool,
    /// Whether to fetch ticket comments (not supported, ignored with a warning)
    #[serde(default)]
    pub comments: bool,
    /// First-run lookback in days (0.5 = 12 hours); -1 exports everything once
    #[serde(default = "default_lookback_days")]
    pub tickets_last_updated_n_days_ago: f64,
    /// Minutes to sleep between runs
    #[serde(default = "default_interval_minutes", alias = "interval")]
    pub interval_minutes: f64,
}

/// Secret used to authenticate against Zendesk
#[derive(Clone, PartialEq)]
pub enum Secret {
    Password(String),
    ApiToken(String),
}

/// Resolved Zendesk credentials
#[derive(Clone, PartialEq)]
pub struct Credentials {
    pub user: String,
    pub secret: Secret,
}

impl Credentials {
    /// Value of the `Authorization` header
    ///
    /// API tokens authenticate as `{user}/token:{token}`.
    pub fn authorization_header(&self) -> String {
        let pair = match &self.secret {
            Secret::Password(password) => format!("{}:{}", self.user, password),
            Secret::ApiToken(token) => format!("{}/token:{}", self.user, token),
        };
        format!("Basic {}", BASE64_STANDARD.encode(pair))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.secret {
            Secret::Password(_) => "password",
            Secret::ApiToken(_) => "api_token",
        };
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("secret", &format_args!("<{} redacted>", kind))
            .finish()
    }
}

impl fmt::Debug for ExportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |s: &Option<String>| s.as_ref().map(|_| "<redacted>");
        f.debug_struct("ExportConfig")
            .field("domain", &self.domain)
            .field("user", &self.user)
            .field("password", &redact(&self.password))
            .field("api_token", &redact(&self.api_token))
            .field("tickets", &self.tickets)
            .field("comments", &self.comments)
            .field(
                "tickets_last_updated_n_days_ago",
                &self.tickets_last_updated_n_days_ago,
            )
            .field("interval_minutes", &self.interval_minutes)
            .finish()
    }
}

impl ExportConfig {
    /// Load configuration using the following priority:
    /// 1. ~/.config/ticketd/zendesk.json
    /// 2. Environment variables
    ///
    /// Secrets missing from the file are filled in from the environment.
    pub fn load() -> Result<Self> {
        let config = if config::config_exists(CONFIG_FILE) {
            let config: Self = config::load_json(CONFIG_FILE)?;
            config.with_env_secrets()
        } else {
            Self::from_env()?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let config: Self = config::load_json_file(path)?;
        let config = config.with_env_secrets();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("Failed to parse config JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let domain =
            std::env::var("ZENDESK_DOMAIN").context("ZENDESK_DOMAIN environment variable not set")?;
        let user =
            std::env::var("ZENDESK_USER").context("ZENDESK_USER environment variable not set")?;

        let config = Self {
            domain,
            user,
            password: None,
            api_token: None,
            tickets: true,
            comments: false,
            tickets_last_updated_n_days_ago: default_lookback_days(),
            interval_minutes: default_interval_minutes(),
        };
        Ok(config.with_env_secrets())
    }

    /// Fill missing secrets from ZENDESK_PASSWORD / ZENDESK_API_TOKEN
    fn with_env_secrets(mut self) -> Self {
        if self.password.is_none() && self.api_token.is_none() {
            self.password = std::env::var("ZENDESK_PASSWORD").ok();
            self.api_token = std::env::var("ZENDESK_API_TOKEN").ok();
        }
        self
    }

    /// Get the default config file path (~/.config/ticketd/zendesk.json)
    pub fn default_config_path() -> Option<PathBuf> {
        config::config_path(CONFIG_FILE)
    }

    /// Check the settings for consistency
    pub fn validate(&self) -> Result<()> {
        if self.domain.trim().is_empty() {
            bail!("domain must not be empty");
        }
        if self.user.trim().is_empty() {
            bail!("user must not be empty");
        }
        self.credentials()?;

        let lookback = self.tickets_last_updated_n_days_ago;
        if !lookback.is_finite() || (lookback < 0.0 && lookback != -1.0) {
            bail!(
                "tickets_last_updated_n_days_ago must be -1 or a non-negative number of days, got {}",
                lookback
            );
        }
        if !self.interval_minutes.is_finite() || self.interval_minutes <= 0.0 {
            bail!(
                "interval must be a positive number of minutes, got {}",
                self.interval_minutes
            );
        }
        self.interval()?;
        Ok(())
    }

    /// Resolve credentials; exactly one of password and api_token must be set
    pub fn credentials(&self) -> Result<Credentials> {
        let secret = match (&self.password, &self.api_token) {
            (Some(password), None) => Secret::Password(password.clone()),
            (None, Some(token)) => Secret::ApiToken(token.clone()),
            (None, None) => bail!("Must specify either a password or api_token"),
            (Some(_), Some(_)) => bail!("Cannot specify both password and api_token"),
        };
        Ok(Credentials {
            user: self.user.clone(),
            secret,
        })
    }

    /// Sleep between runs
    pub fn interval(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.interval_minutes * 60.0)
            .with_context(|| {
                format!("interval of {} minutes is out of range", self.interval_minutes)
            })
    }

    /// Per-run engine settings
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            domain: self.domain.clone(),
            lookback_days: self.tickets_last_updated_n_days_ago,
            fetch_tickets: self.tickets,
        }
    }
}
