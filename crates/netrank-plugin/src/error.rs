//! Scoring error types.

use netrank_telemetry::{TelemetryError, TransportError};
use thiserror::Error;

/// Errors that can occur while building a plugin or scoring a node.
///
/// Every per-node variant carries the node name so the host can report
/// failures individually without aborting the rest of the cycle.
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("invalid plugin configuration: {0}")]
    Config(String),

    #[error("node {node}: {source}")]
    Metrics {
        node: String,
        #[source]
        source: TelemetryError,
    },

    #[error("node {node}: score endpoint: {source}")]
    Transport {
        node: String,
        #[source]
        source: TransportError,
    },

    #[error("node {node}: score endpoint returned HTTP {status}")]
    Status { node: String, status: u16 },

    #[error("node {node}: failed to decode score response: {reason}")]
    Decode { node: String, reason: String },

    #[error("node {node}: score response has no `{field}` field")]
    MissingField { node: String, field: &'static str },

    #[error("node {node}: measurement {value} is not a usable score")]
    InvalidMeasurement { node: String, value: f64 },

    #[error("node {node}: scoring task aborted: {reason}")]
    Aborted { node: String, reason: String },
}

pub type ScoreResult<T> = Result<T, ScoreError>;

/// Coarse classification of a [`ScoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Connection,
    Timeout,
    Cancelled,
    Query,
    NoData,
    AmbiguousResult,
    Decode,
    MissingField,
    InvalidMeasurement,
    Aborted,
}

impl ScoreError {
    /// The node this error belongs to, if any.
    pub fn node(&self) -> Option<&str> {
        match self {
            ScoreError::Config(_) => None,
            ScoreError::Metrics { node, .. }
            | ScoreError::Transport { node, .. }
            | ScoreError::Status { node, .. }
            | ScoreError::Decode { node, .. }
            | ScoreError::MissingField { node, .. }
            | ScoreError::InvalidMeasurement { node, .. }
            | ScoreError::Aborted { node, .. } => Some(node.as_str()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ScoreError::Config(_) => ErrorKind::Configuration,
            ScoreError::Metrics { source, .. } => match source {
                TelemetryError::Config(_) => ErrorKind::Configuration,
                TelemetryError::Transport(t) => transport_kind(t),
                TelemetryError::Query { .. } => ErrorKind::Query,
                TelemetryError::Decode(_) => ErrorKind::Decode,
                TelemetryError::NoData => ErrorKind::NoData,
                TelemetryError::AmbiguousResult(_) => ErrorKind::AmbiguousResult,
            },
            ScoreError::Transport { source, .. } => transport_kind(source),
            ScoreError::Status { .. } => ErrorKind::Query,
            ScoreError::Decode { .. } => ErrorKind::Decode,
            ScoreError::MissingField { .. } => ErrorKind::MissingField,
            ScoreError::InvalidMeasurement { .. } => ErrorKind::InvalidMeasurement,
            ScoreError::Aborted { .. } => ErrorKind::Aborted,
        }
    }
}

fn transport_kind(err: &TransportError) -> ErrorKind {
    match err {
        TransportError::InvalidUri { .. } | TransportError::UnsupportedScheme(_) => {
            ErrorKind::Configuration
        }
        TransportError::Connect(_) | TransportError::Body(_) => ErrorKind::Connection,
        TransportError::Timeout(_) => ErrorKind::Timeout,
        TransportError::Cancelled => ErrorKind::Cancelled,
    }
}
