//! Error types for Sluice.

use std::time::Duration;

use thiserror::Error;

/// Main error type for Sluice operations.
///
/// The gate itself only ever delays; these errors come from the opt-in
/// deadline on `take`, configuration loading and trace replay.
#[derive(Error, Debug)]
pub enum GateError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A ticket was not granted before the caller's deadline
    #[error("Timed out after {waited:?} waiting for a ticket on bucket {key}")]
    Timeout { key: String, waited: Duration },

    /// Trace file could not be parsed
    #[error("Trace error: {0}")]
    Trace(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for GateError {
    fn from(err: config::ConfigError) -> Self {
        GateError::Config(err.to_string())
    }
}

/// Result type alias for Sluice operations.
pub type Result<T> = std::result::Result<T, GateError>;
