//! Start time resolution
//!
//! Pure functions that can be tested without network access.

use chrono::{DateTime, Duration, Utc};

use crate::models::CursorState;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Compute the start time for the next export request.
///
/// # Arguments
/// * `state` - Cursor state from the previous run
/// * `lookback_days` - How far back a first run reaches; negative means the full history
/// * `now` - Current time
///
/// # Returns
/// The committed start time if a previous run committed one, otherwise the
/// Unix epoch for a full export, otherwise `now - lookback_days`.
pub fn resolve_start_time(
    state: &CursorState,
    lookback_days: f64,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    if let Some(committed) = state.committed_start_time {
        return committed;
    }

    if lookback_days < 0.0 {
        return DateTime::<Utc>::UNIX_EPOCH;
    }

    let lookback_secs = (lookback_days * SECONDS_PER_DAY).round() as i64;
    Duration::try_seconds(lookback_secs)
        .and_then(|lookback| now.checked_sub_signed(lookback))
        .map_or(DateTime::<Utc>::UNIX_EPOCH, |start| {
            start.max(DateTime::<Utc>::UNIX_EPOCH)
        })
}
