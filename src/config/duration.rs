//! Duration parsing utilities.

use anyhow::Context;

/// Parse a duration string like "1d", "1h", "30m", "300s", "300" into seconds.
/// Supports:
/// - Plain numbers (interpreted as seconds): "300"
/// - Seconds suffix: "300s"
/// - Minutes suffix: "30m"
/// - Hours suffix: "1h"
/// - Days suffix: "1d"
pub fn parse_duration_to_secs(s: &str) -> anyhow::Result<i64> {
    let s = s.trim();
    if s.is_empty() {
        anyhow::bail!("Empty duration string");
    }

    let (num_str, unit, name) = if let Some(n) = s.strip_suffix('d') {
        (n, 86_400, "days")
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 3_600, "hours")
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60, "minutes")
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1, "seconds")
    } else {
        (s, 1, "duration")
    };

    let value: i64 = num_str
        .trim()
        .parse()
        .with_context(|| format!("Invalid {name} value: {num_str}"))?;
    if value < 0 {
        anyhow::bail!("Duration must not be negative: {s}");
    }
    value
        .checked_mul(unit)
        .with_context(|| format!("Duration out of range: {s}"))
}

/// Parse into a `chrono::Duration`, used for the safety margin.
pub fn parse_chrono_duration(s: &str) -> anyhow::Result<chrono::Duration> {
    let secs = parse_duration_to_secs(s)?;
    chrono::Duration::try_seconds(secs).with_context(|| format!("Duration out of range: {s}"))
}

/// Parse into a `std::time::Duration`, used for store timeouts.
pub fn parse_std_duration(s: &str) -> anyhow::Result<std::time::Duration> {
    let secs = parse_duration_to_secs(s)?;
    Ok(std::time::Duration::from_secs(secs.unsigned_abs()))
}
