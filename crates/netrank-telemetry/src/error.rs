//! Error types for telemetry queries and the HTTP transport.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type alias for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Errors raised while moving bytes to and from an HTTP peer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid URI {uri:?}: {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("unsupported URI scheme {0:?} (only http is supported)")]
    UnsupportedScheme(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("request cancelled")]
    Cancelled,
}

/// Errors that can occur when querying the metrics backend.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid telemetry configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("query failed ({error_type}): {message}")]
    Query { error_type: String, message: String },

    #[error("failed to decode query response: {0}")]
    Decode(String),

    #[error("query returned no samples")]
    NoData,

    #[error("query matched {0} series, expected exactly one")]
    AmbiguousResult(usize),
}
