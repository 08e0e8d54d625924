use std::time::{SystemTime, UNIX_EPOCH};

use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Wall-clock time in milliseconds since the Unix epoch.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Convert a capture timestamp (seconds, fractional) to milliseconds.
pub fn seconds_to_millis(ts: f64) -> u64 {
    if ts.is_finite() && ts > 0.0 {
        (ts * 1000.0).round() as u64
    } else {
        0
    }
}

pub(crate) fn millis_to_rfc3339(ms: u64) -> Option<String> {
    let nanos = ms as i128 * 1_000_000;
    OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .ok()
        .and_then(|dt| dt.format(&Rfc3339).ok())
}
