//! Duration strings used throughout the gateway configuration.
//!
//! Sampling intervals, group intervals and timeouts are stored as the
//! duration strings the collection agent understands: a sequence of
//! decimal numbers each followed by a unit, like "1s", "500ms" or "1h30m".
//!
//! Valid units are `ns`, `us` (or `µs`), `ms`, `s`, `m` and `h`.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

/// Errors that can occur when parsing a duration string.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DurationError {
    #[error("Empty duration")]
    Empty,

    #[error("Invalid duration: {0:?}")]
    Invalid(String),

    #[error("Duration out of range: {0:?}")]
    OutOfRange(String),
}

fn whole_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:\d+(?:\.\d+)?(?:ns|us|µs|ms|s|m|h))+$").expect("static duration pattern")
    })
}

fn component_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(\d+(?:\.\d+)?)(ns|us|µs|ms|s|m|h)").expect("static duration pattern")
    })
}

/// Parse a duration string such as "1s", "250ms" or "1m30s".
pub fn parse_duration(text: &str) -> Result<Duration, DurationError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(DurationError::Empty);
    }
    if !whole_pattern().is_match(text) {
        return Err(DurationError::Invalid(text.to_string()));
    }

    let mut total = 0f64;
    for caps in component_pattern().captures_iter(text) {
        let value: f64 = caps[1]
            .parse()
            .map_err(|_| DurationError::Invalid(text.to_string()))?;
        let scale = match &caps[2] {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return Err(DurationError::Invalid(text.to_string())),
        };
        total += value * scale;
    }

    Duration::try_from_secs_f64(total).map_err(|_| DurationError::OutOfRange(text.to_string()))
}

/// Check whether a string is a well-formed, non-zero duration.
pub fn is_valid_interval(text: &str) -> bool {
    matches!(parse_duration(text), Ok(d) if !d.is_zero())
}
