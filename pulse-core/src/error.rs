//! Error types for PULSE.
//!
//! All errors use `thiserror` for ergonomic error handling and proper error chains.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for PULSE operations.
pub type Result<T> = std::result::Result<T, PulseError>;

/// Main error type for PULSE.
#[derive(Error, Debug)]
pub enum PulseError {
    // Lookup errors
    #[error("gauge not found: {name}")]
    GaugeNotFound { name: String },

    #[error("counter not found: {name}")]
    CounterNotFound { name: String },

    // Request shape errors
    #[error("metric type is not supported: {kind}")]
    UnsupportedKind { kind: String },

    #[error("malformed metric: {reason}")]
    MalformedMetric { reason: String },

    // Configuration errors
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // Crypto errors
    #[error("crypto failure: {reason}")]
    Crypto { reason: String },

    // Storage errors
    #[error("database error: {0}")]
    Database(String),

    #[error("snapshot I/O error at {path:?}: {source}")]
    Snapshot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot decode error: {0}")]
    SnapshotDecode(#[from] serde_json::Error),

    // Agent transport errors
    #[error("report failed: {reason}")]
    Transport { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PulseError {
    /// Create a Transport error from any error type.
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport { reason: err.to_string() }
    }

    /// True for the two not-found lookup errors.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::GaugeNotFound { .. } | Self::CounterNotFound { .. })
    }
}
