//! Human-friendly durations and sizes ("15m", "7d", "1mb").

use std::time::Duration;

use crate::error::ConfigurationError;

/// Parse `<n>s|m|h|d`, or a bare number of seconds.
pub fn parse_duration(raw: &str) -> Result<Duration, ConfigurationError> {
    let invalid = || ConfigurationError::InvalidDuration(raw.to_string());
    let trimmed = raw.trim().to_ascii_lowercase();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(split);
    let value: u64 = digits.parse().map_err(|_| invalid())?;

    let multiplier = match unit.trim() {
        "" | "s" => 1,
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        _ => return Err(invalid()),
    };
    value
        .checked_mul(multiplier)
        .map(Duration::from_secs)
        .ok_or_else(invalid)
}

/// Parse `<n>b|kb|mb|gb` (1024-based), or a bare number of bytes.
pub fn parse_size(raw: &str) -> Result<usize, ConfigurationError> {
    let invalid = || ConfigurationError::InvalidSize(raw.to_string());
    let trimmed = raw.trim().to_ascii_lowercase();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(split);
    let value: usize = digits.parse().map_err(|_| invalid())?;

    let multiplier: usize = match unit.trim() {
        "" | "b" => 1,
        "kb" => 1 << 10,
        "mb" => 1 << 20,
        "gb" => 1 << 30,
        _ => return Err(invalid()),
    };
    value.checked_mul(multiplier).ok_or_else(invalid)
}
