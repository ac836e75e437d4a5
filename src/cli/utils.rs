//! Shared CLI utilities.

use anyhow::{Context, Result};

/// Parse a comma-separated string into a `Vec<String>`, trimming whitespace and
/// discarding empty segments.  Returns `None` when `value` is `None`.
pub fn parse_csv(value: &Option<String>) -> Option<Vec<String>> {
    value.as_ref().map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| part.to_string())
            .collect::<Vec<_>>()
    })
}

/// Parse a `FROM=TO` rename argument.
pub fn parse_rename(value: &str) -> Result<(String, String)> {
    let (from, to) = value
        .split_once('=')
        .with_context(|| format!("invalid rename '{value}': expected FROM=TO"))?;
    let (from, to) = (from.trim(), to.trim());
    if from.is_empty() || to.is_empty() {
        anyhow::bail!("invalid rename '{value}': FROM and TO must be non-empty");
    }
    Ok((from.to_string(), to.to_string()))
}
