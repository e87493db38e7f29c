//! ticketd - Zendesk incremental ticket exporter
//!
//! Polls a Zendesk domain's incremental ticket export and writes one JSON
//! event per changed ticket, resuming from a SQLite cursor after restarts.
//!
//! # Usage
//!
//! ```bash
//! # Poll using ~/.config/ticketd/zendesk.json, events to stdout
//! ticketd
//!
//! # Explicit config, append events to a file, single run
//! ticketd -c zendesk.json -o events.jsonl --once
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use std::path::PathBuf;

use tickets::{
    Engine, EventSink, ExportConfig, JsonLinesSink, SqliteCursorStore, StopSignal, ZendeskClient,
    run_loop,
};

#[derive(Parser)]
#[command(name = "ticketd")]
#[command(version, about = "Export Zendesk ticket updates as JSON events")]
struct Cli {
    /// Path to the configuration file (default: ~/.config/ticketd/zendesk.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the cursor database (default: ~/.local/share/ticketd/cursor.sqlite)
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Append events to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Run a single export and exit
    #[arg(long)]
    once: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .init();

    // Bootstrap config and data directories
    if let Err(e) = config::init() {
        error!("Failed to initialize config directories: {}", e);
    }

    let export_config = match &cli.config {
        Some(path) => ExportConfig::from_file(path)?,
        None => ExportConfig::load().map_err(|e| {
            if let Some(path) = ExportConfig::default_config_path() {
                warn!(
                    "To configure Zendesk access, either:\n\
                     1. Place your settings at: {}\n\
                     2. Or set ZENDESK_DOMAIN, ZENDESK_USER and ZENDESK_API_TOKEN",
                    path.display()
                );
            }
            e
        })?,
    };
    if export_config.comments {
        warn!("Fetching ticket comments is not supported; the comments setting is ignored");
    }

    let db_path = match cli.database {
        Some(path) => path,
        None => config::data_path("cursor.sqlite").context("Could not determine data directory")?,
    };
    let store = SqliteCursorStore::new(&db_path)?;
    info!("Using cursor database at {}", db_path.display());

    let client = ZendeskClient::from_config(&export_config)?;
    client.verify()?;

    let mut sink: Box<dyn EventSink + Send> = match &cli.output {
        Some(path) => Box::new(JsonLinesSink::append_to(path)?),
        None => Box::new(JsonLinesSink::stdout()),
    };

    let stop = StopSignal::new();
    let signal_stop = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested, finishing current page");
            signal_stop.cancel();
        }
    });

    let once = cli.once;
    let options = export_config.run_options();
    let interval = export_config.interval()?;
    let outcome = tokio::task::spawn_blocking(move || {
        let engine = Engine::new(&client, &client, &store);
        if once {
            Some(engine.run_once(&options, sink.as_mut(), &stop))
        } else {
            run_loop(&engine, &options, sink.as_mut(), &stop, interval)
        }
    })
    .await
    .context("Export task panicked")?;

    match outcome {
        Some(outcome) if outcome.failed => {
            error!(
                "Last export run failed: {}",
                outcome.error.as_deref().unwrap_or("unknown error")
            );
            std::process::exit(1);
        }
        Some(outcome) => info!("Last export run emitted {} events", outcome.records_emitted),
        None => info!("Stopped before the first run"),
    }

    Ok(())
}
