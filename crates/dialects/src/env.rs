//! Environment variable lookup helpers
//!
//! Options are named by the *variable* that holds them. An unset, empty or
//! unparsable variable yields `None`, so the caller's default stays in force.

use std::time::Duration;
use tracing::warn;

/// Non-empty string value of `name`
pub fn string(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(v) if !v.is_empty() => Some(v),
        _ => None,
    }
}

/// Boolean value of `name` (`1/0`, `true/false`, `yes/no`, `on/off`)
pub fn boolean(name: &str) -> Option<bool> {
    let raw = string(name)?;
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Some(false),
        _ => {
            warn!(target: "txroute::config", var = name, value = %raw, "ignoring unparsable boolean");
            None
        }
    }
}

/// Integer value of `name`
pub fn integer<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = string(name)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(target: "txroute::config", var = name, value = %raw, "ignoring unparsable integer");
            None
        }
    }
}

/// Duration value of `name`
///
/// Accepts `humantime` spans such as `500ms`, `30s` or `1h30m`; a bare
/// number is seconds.
pub fn duration(name: &str) -> Option<Duration> {
    let raw = string(name)?;
    let parsed = parse_duration(&raw);
    if parsed.is_none() {
        warn!(target: "txroute::config", var = name, value = %raw, "ignoring unparsable duration");
    }
    parsed
}

/// Parse `"500ms"`, `"1h30m"` or `"30"`
///
/// Out-of-range spans are rejected rather than saturated.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    humantime::parse_duration(raw).ok()
}
