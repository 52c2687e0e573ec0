//! Human-readable session durations.

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 60 * SECS_PER_MINUTE;
const SECS_PER_DAY: u64 = 24 * SECS_PER_HOUR;

/// Formats a duration in seconds as e.g. `"2 days 1 hour 5 seconds"`.
///
/// Fractional seconds are truncated. Negative and non-finite input formats as
/// `"0 seconds"`, so the result is never empty.
pub fn format_duration(seconds: f64) -> String {
    let total = whole_seconds(seconds);

    let days = total / SECS_PER_DAY;
    let hours = (total % SECS_PER_DAY) / SECS_PER_HOUR;
    let minutes = (total % SECS_PER_HOUR) / SECS_PER_MINUTE;
    let secs = total % SECS_PER_MINUTE;

    let mut parts = Vec::with_capacity(4);
    for (value, unit) in [(days, "day"), (hours, "hour"), (minutes, "minute")] {
        if value > 0 {
            parts.push(unit_part(value, unit));
        }
    }
    if secs > 0 || parts.is_empty() {
        parts.push(unit_part(secs, "second"));
    }

    parts.join(" ")
}

fn whole_seconds(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds.trunc() as u64
    } else {
        0
    }
}

fn unit_part(value: u64, unit: &str) -> String {
    if value == 1 {
        format!("{} {}", value, unit)
    } else {
        format!("{} {}s", value, unit)
    }
}
