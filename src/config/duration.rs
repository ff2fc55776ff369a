// src/config/duration.rs

use std::time::Duration;

/// Accepted suffixes and their length in milliseconds.
const UNITS: [(&str, u64); 4] = [("ms", 1), ("s", 1_000), ("m", 60_000), ("h", 3_600_000)];

/// Parse a `[config]` duration such as `"500ms"`, `"15s"`, `"2m"` or `"6h"`.
///
/// A unit is mandatory; values that do not fit in a `u64` count of
/// milliseconds are rejected.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, suffix) = s.split_at(split);

    if digits.is_empty() {
        return Err(format!("duration '{s}' must start with a number"));
    }
    let suffix = suffix.trim().to_ascii_lowercase();
    if suffix.is_empty() {
        return Err(format!("duration '{s}' is missing a unit (ms, s, m or h)"));
    }

    let millis_per_unit = UNITS
        .iter()
        .find(|(unit, _)| *unit == suffix)
        .map(|(_, millis)| *millis)
        .ok_or_else(|| format!("unsupported duration unit '{suffix}' in '{s}'"))?;

    // Only overflow can fail here: `digits` is non-empty ASCII digits.
    digits
        .parse::<u64>()
        .ok()
        .and_then(|value| value.checked_mul(millis_per_unit))
        .map(Duration::from_millis)
        .ok_or_else(|| format!("duration '{s}' is out of range"))
}
