use crate::error::{DropError, Result};
use std::time::Duration;

/// Validates a listening port given as text
///
/// Port 0 is rejected here: the CLI always asks for a concrete port and
/// lets the server walk upwards if it is taken.
pub fn validate_port(value: &str) -> Result<u16> {
    let trimmed = value.trim();
    match trimmed.parse::<u32>() {
        Ok(port) if (1..=u16::MAX as u32).contains(&port) => Ok(port as u16),
        _ => Err(DropError::invalid_config(format!(
            "Invalid port: \"{}\". Use a number between 1 and 65535",
            value
        ))),
    }
}

/// Validates that a session lifetime is usable
pub fn validate_duration(duration: Duration) -> Result<()> {
    if duration.is_zero() {
        return Err(DropError::invalid_config("Duration must be greater than zero"));
    }
    Ok(())
}

/// Normalizes a LAN alias into a single DNS label
///
/// Lower-cases the input and strips a trailing `.local`. The result must be
/// 1-63 characters of `[a-z0-9-]`, not starting or ending with a hyphen.
pub fn normalize_alias(value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DropError::invalid_config("Alias cannot be empty"));
    }

    let lowered = trimmed.to_ascii_lowercase();
    let normalized = lowered.strip_suffix(".local").unwrap_or(&lowered);

    let valid_chars = normalized
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    let valid_edges = !normalized.starts_with('-') && !normalized.ends_with('-');

    if normalized.is_empty() || normalized.len() > 63 || !valid_chars || !valid_edges {
        return Err(DropError::invalid_config(
            "Invalid alias format. Use letters, numbers, or hyphens (e.g. john, marcos-laptop)",
        ));
    }

    Ok(normalized.to_string())
}

/// Turns a client-supplied file name into a safe archive entry path
///
/// Backslashes are treated as separators, `.`/`..`/empty components are
/// dropped, and `strip_prefix` is removed when it is the first component.
/// Returns `None` when nothing usable remains.
pub fn sanitize_entry_path(name: &str, strip_prefix: Option<&str>) -> Option<String> {
    let normalized = name.replace('\\', "/");
    let mut parts: Vec<&str> = normalized
        .split('/')
        .filter(|part| !part.is_empty() && *part != "." && *part != "..")
        .collect();

    if let Some(prefix) = strip_prefix {
        if parts.len() > 1 && parts.first() == Some(&prefix) {
            parts.remove(0);
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
