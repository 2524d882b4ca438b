use chrono::{DateTime, Utc};

/// Whole seconds between two instants, rounded to the nearest second.
/// An `end` before `start` counts as zero.
pub fn elapsed_seconds(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    let millis = (end - start).num_milliseconds().max(0) as u64;
    (millis + 500) / 1000
}

/// `"1m 5s"` style rendering used on the match result screen.
pub fn format_elapsed(seconds: u64) -> String {
    let mins = seconds / 60;
    let secs = seconds % 60;
    if mins > 0 {
        format!("{}m {}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}
