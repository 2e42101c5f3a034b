//! Display helpers for session timestamps

use chrono::{TimeZone, Utc};

/// Format a Unix timestamp (seconds) as a local date/time.
///
/// Returns "N/A" for out-of-range values.
pub fn format_unix_seconds(secs: i64) -> String {
    match Utc.timestamp_opt(secs, 0) {
        chrono::LocalResult::Single(dt) => dt
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S %Z")
            .to_string(),
        _ => "N/A".to_string(),
    }
}

/// Time left until `expires_at`, relative to `now` (both Unix seconds).
///
/// # Example output
/// - `1h 5m` (hours, minutes)
/// - `4m 10s` (minutes, seconds)
/// - `expired 30s ago`
pub fn format_remaining(expires_at: i64, now: i64) -> String {
    let delta = expires_at - now;
    if delta < 0 {
        return format!("expired {} ago", format_span(-delta));
    }
    format_span(delta)
}

fn format_span(secs: i64) -> String {
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;

    if hours > 0 {
        format!("{}h {}m", hours, mins)
    } else if mins > 0 {
        format!("{}m {}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}
