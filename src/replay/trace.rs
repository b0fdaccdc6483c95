//! Recorded request traces.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{GateError, Result};

/// A recorded sequence of takes and responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    /// Wall-clock time (Unix epoch seconds) the recording started at.
    /// Reset headers are interpreted relative to it; unset means "now".
    #[serde(default)]
    pub started_at: Option<f64>,

    #[serde(default)]
    pub events: Vec<TraceEvent>,
}

/// One step of a trace, scheduled `at_ms` after the replay starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceEvent {
    /// A request asking for a ticket
    Take {
        key: String,
        #[serde(default)]
        at_ms: u64,
    },
    /// A response coming back
    Response {
        key: String,
        #[serde(default)]
        at_ms: u64,
        status: u16,
        #[serde(default)]
        headers: BTreeMap<String, HeaderValue>,
    },
}

impl TraceEvent {
    pub fn key(&self) -> &str {
        match self {
            TraceEvent::Take { key, .. } | TraceEvent::Response { key, .. } => key,
        }
    }

    pub fn at_ms(&self) -> u64 {
        match self {
            TraceEvent::Take { at_ms, .. } | TraceEvent::Response { at_ms, .. } => *at_ms,
        }
    }
}

/// A header value as written in a trace file.
///
/// Lists stand for a header that was repeated on the response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValue {
    Text(String),
    Number(f64),
    Flag(bool),
    Many(Vec<String>),
}

impl HeaderValue {
    /// Every value of the header, in order.
    pub fn values(&self) -> Vec<String> {
        match self {
            HeaderValue::Many(values) => values.clone(),
            single => vec![single.to_string()],
        }
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderValue::Text(text) => write!(f, "{}", text),
            HeaderValue::Number(number) => write!(f, "{}", number),
            HeaderValue::Flag(flag) => write!(f, "{}", flag),
            HeaderValue::Many(values) => write!(f, "{}", values.join(", ")),
        }
    }
}

impl Trace {
    /// Load a trace file; `.json` files are read as JSON, anything else as YAML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading trace");

        let contents = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            Self::from_json(&contents)
        } else {
            Self::from_yaml(&contents)
        }
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| GateError::Trace(format!("Failed to parse YAML trace: {}", e)))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| GateError::Trace(format!("Failed to parse JSON trace: {}", e)))
    }
}
