//! netrank-telemetry: the I/O half of node scoring.
//!
//! Turns a node name into a bandwidth measurement by building a PromQL
//! query and evaluating it against a Prometheus-compatible backend. The
//! HTTP transport lives here too, since the remote-score plugin reuses the
//! same pooled client.
//!
//! # Architecture
//!
//! ```text
//! QueryBuilder (interface + TimeWindow)
//!   └── node_bandwidth(node) / highest_bandwidth() → PromQL
//!
//! MetricsClient
//!   ├── POST /api/v1/query (form: query, time)
//!   └── exactly one Sample, or NoData / AmbiguousResult
//!
//! HttpTransport
//!   └── hyper-util pooled client, request timeout + cancellation
//! ```

pub mod client;
pub mod error;
pub mod query;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::{MetricsClient, Sample};
pub use error::{TelemetryError, TelemetryResult, TransportError, TransportResult};
pub use query::{QueryBuilder, TimeWindow};
pub use transport::{HttpResponse, HttpTransport, TransportConfig, parse_http_uri};
