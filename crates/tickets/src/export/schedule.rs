//! Repeated export runs with an interruptible sleep in between

use log::info;
use std::time::Duration;

use super::engine::{Engine, RunOptions, RunOutcome};
use super::stop::StopSignal;
use crate::sink::EventSink;

/// Poll the remote until `stop` is cancelled.
///
/// Runs [`Engine::run_once`] back to back, sleeping `interval` between runs.
/// Full-history exports (`lookback_days < 0`) run exactly once. Returns the
/// outcome of the last run, or `None` if cancelled before the first one.
pub fn run_loop(
    engine: &Engine<'_>,
    options: &RunOptions,
    sink: &mut dyn EventSink,
    stop: &StopSignal,
    interval: Duration,
) -> Option<RunOutcome> {
    let mut last = None;

    while !stop.is_cancelled() {
        let outcome = engine.run_once(options, sink, stop);
        last = Some(outcome);

        if options.is_one_shot() {
            info!("Full history export for {} complete, not polling", options.domain);
            break;
        }

        info!(
            "Sleeping {:.1} minutes before next run for {}",
            interval.as_secs_f64() / 60.0,
            options.domain
        );
        if stop.wait_timeout(interval) {
            break;
        }
    }

    info!("Export loop for {} stopped", options.domain);
    last
}
