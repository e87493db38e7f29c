//! SQLite-based cursor storage

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use rusqlite_migration::{M, Migrations};

use super::CursorStore;
use crate::models::{CursorState, TicketId, Watermark};

/// Database migrations
///
/// Applied in order; the user_version pragma tracks which have run.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: Initial schema
        M::up(
            r#"
            CREATE TABLE cursor_state (
                domain TEXT PRIMARY KEY,
                last_ticket_id INTEGER,
                last_ticket_updated_at TEXT,
                committed_start_time TEXT,
                last_run_at TEXT
            );
            "#,
        ),
    ])
}

/// SQLite-based cursor storage
pub struct SqliteCursorStore {
    conn: Mutex<Connection>,
}

impl SqliteCursorStore {
    /// Open (or create) a cursor database at `db_path`
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;

        // WAL keeps each per-page checkpoint a cheap sequential append.
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            "#,
        )?;

        Self::with_connection(conn)
    }

    /// In-memory database, mainly for tests
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(mut conn: Connection) -> Result<Self> {
        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn parse_timestamp(column: &str, value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .with_context(|| format!("Invalid {} in cursor_state: {}", column, s))
        })
        .transpose()
}

impl CursorStore for SqliteCursorStore {
    fn load(&self, domain: &str) -> Result<Option<CursorState>> {
        let conn = self.conn.lock().unwrap();

        let row: Option<(Option<i64>, Option<String>, Option<String>, Option<String>)> = conn
            .query_row(
                "SELECT last_ticket_id, last_ticket_updated_at, committed_start_time, last_run_at
                 FROM cursor_state WHERE domain = ?",
                [domain],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        let Some((last_ticket_id, last_updated_at, committed_start_time, last_run_at)) = row else {
            return Ok(None);
        };

        let last_updated_at = parse_timestamp("last_ticket_updated_at", last_updated_at)?;
        let watermark = match (last_ticket_id, last_updated_at) {
            (Some(id), Some(updated_at)) => Some(Watermark::new(TicketId(id as u64), updated_at)),
            _ => None,
        };

        Ok(Some(CursorState {
            domain: domain.to_string(),
            watermark,
            committed_start_time: parse_timestamp("committed_start_time", committed_start_time)?,
            last_run_at: parse_timestamp("last_run_at", last_run_at)?,
        }))
    }

    fn save(&self, state: &CursorState) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT OR REPLACE INTO cursor_state
             (domain, last_ticket_id, last_ticket_updated_at, committed_start_time, last_run_at)
             VALUES (?, ?, ?, ?, ?)",
            params![
                state.domain,
                state.watermark.map(|w| w.id.get() as i64),
                state.watermark.map(|w| w.updated_at.to_rfc3339()),
                state.committed_start_time.map(|t| t.to_rfc3339()),
                state.last_run_at.map(|t| t.to_rfc3339()),
            ],
        )
        .with_context(|| format!("Failed to save cursor state for {}", state.domain))?;

        Ok(())
    }

    fn delete(&self, domain: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM cursor_state WHERE domain = ?", [domain])?;
        Ok(())
    }
}
