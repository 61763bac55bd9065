//! Replay origin resolution.
//!
//! A replay starts at an offset on the host timeline. Scripts give that offset either as a
//! number of milliseconds, as a `[[h:]m:]s[.frac]` timestamp, or as the name of a marker in
//! the host's script. Markers are resolved once, when the replayer is built.

use crate::error::ReplayError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

static TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:(\d+):)?(\d+):)?(\d+)(?:\.(\d+))?$").expect("valid timestamp regex")
});

/// Where a replay starts on the host timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StartTime {
    /// A literal offset in milliseconds.
    Offset(f64),
    /// A timestamp string (`"1:05.5"`) or a marker name.
    Named(String),
}

impl StartTime {
    /// Resolve to milliseconds, looking up marker names in `markers`.
    pub fn resolve(&self, markers: &dyn MarkerResolver) -> Result<f64, ReplayError> {
        match self {
            StartTime::Offset(ms) => Ok(*ms),
            StartTime::Named(name) if TIMESTAMP.is_match(name) => {
                parse_timestamp(name).ok_or_else(|| ReplayError::InvalidTimestamp(name.clone()))
            }
            StartTime::Named(name) => markers.marker_start(name).ok_or_else(|| {
                tracing::warn!(marker = %name, "start marker not found");
                ReplayError::UnknownMarker(name.clone())
            }),
        }
    }
}

impl Default for StartTime {
    fn default() -> Self {
        StartTime::Offset(0.0)
    }
}

impl From<f64> for StartTime {
    fn from(ms: f64) -> Self {
        StartTime::Offset(ms)
    }
}

impl From<&str> for StartTime {
    fn from(name: &str) -> Self {
        StartTime::Named(name.to_string())
    }
}

/// Looks up named markers on the host timeline.
pub trait MarkerResolver {
    /// Start time of the marker called `name`, in milliseconds.
    fn marker_start(&self, name: &str) -> Option<f64>;
}

impl MarkerResolver for () {
    fn marker_start(&self, _name: &str) -> Option<f64> {
        None
    }
}

impl MarkerResolver for HashMap<String, f64> {
    fn marker_start(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }
}

/// Parse a `[[h:]m:]s[.frac]` timestamp into milliseconds.
pub fn parse_timestamp(text: &str) -> Option<f64> {
    let caps = TIMESTAMP.captures(text)?;
    let field = |i: usize| -> Option<f64> {
        match caps.get(i) {
            Some(m) => m.as_str().parse::<f64>().ok(),
            None => Some(0.0),
        }
    };

    let hours = field(1)?;
    let minutes = field(2)?;
    let seconds = field(3)?;
    let fraction = match caps.get(4) {
        Some(m) => format!("0.{}", m.as_str()).parse::<f64>().ok()?,
        None => 0.0,
    };

    Some(((hours * 60.0 + minutes) * 60.0 + seconds + fraction) * 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_forms() {
        assert_eq!(parse_timestamp("5"), Some(5000.0));
        assert_eq!(parse_timestamp("1:05"), Some(65_000.0));
        assert_eq!(parse_timestamp("1:00:02.25"), Some(3_602_250.0));
        assert_eq!(parse_timestamp("0.5"), Some(500.0));
        assert_eq!(parse_timestamp("intro"), None);
        assert_eq!(parse_timestamp("1:2:3:4"), None);
    }

    #[test]
    fn test_resolve_marker() {
        let mut markers = HashMap::new();
        markers.insert("demo/typing".to_string(), 12_000.0);

        let start = StartTime::from("demo/typing");
        assert_eq!(start.resolve(&markers).unwrap(), 12_000.0);

        let start = StartTime::from("0:30");
        assert_eq!(start.resolve(&markers).unwrap(), 30_000.0);

        let err = StartTime::from("missing").resolve(&markers).unwrap_err();
        assert!(matches!(err, ReplayError::UnknownMarker(name) if name == "missing"));
    }

    #[test]
    fn test_literal_offset_needs_no_markers() {
        assert_eq!(StartTime::Offset(3.0).resolve(&()).unwrap(), 3.0);
        assert!(StartTime::from("intro").resolve(&()).is_err());
    }

    #[test]
    fn test_start_time_deserializes_untagged() {
        let start: StartTime = serde_json::from_str("250").unwrap();
        assert_eq!(start, StartTime::Offset(250.0));
        let start: StartTime = serde_json::from_str("\"intro\"").unwrap();
        assert_eq!(start, StartTime::Named("intro".into()));
    }
}
