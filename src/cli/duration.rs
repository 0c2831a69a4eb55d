use crate::error::DropError;
use std::time::Duration;

/// Parse a `--time` value: bare digits are seconds, anything else goes
/// through humantime (`90s`, `5m`, `1h`, `2d`, `1h 30m`)
pub fn parse_duration(value: &str) -> Result<Duration, DropError> {
    let trimmed = value.trim();
    let invalid = || {
        DropError::invalid_config(format!(
            "Invalid time format: \"{}\". Use formats like: 5m, 1h, 90s, or seconds (300)",
            value
        ))
    };

    let duration = if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        Duration::from_secs(trimmed.parse().map_err(|_| invalid())?)
    } else {
        humantime::parse_duration(&trimmed.to_ascii_lowercase()).map_err(|_| invalid())?
    };

    if duration.is_zero() {
        return Err(invalid());
    }
    Ok(duration)
}
