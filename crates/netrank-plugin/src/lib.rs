//! netrank-plugin: bandwidth-aware node scoring for a cluster scheduler.
//!
//! A [`ScorePlugin`] produces a raw score per candidate node and then
//! rescales the whole cycle into `[0, max_node_score]`. Two strategies ship:
//!
//! - [`NetworkTraffic`]: received bytes per node from Prometheus; the
//!   quietest node ranks highest.
//! - [`RemoteScore`]: a precomputed fitness score fetched over HTTP; the
//!   highest value ranks highest.
//!
//! [`ScoringCycle`] drives a plugin over a candidate set with bounded
//! concurrency, isolating per-node failures.

pub mod config;
pub mod cycle;
pub mod error;
pub mod network_traffic;
pub mod normalize;
pub mod plugin;
pub mod remote_score;

pub use config::{NetworkTrafficArgs, PluginConfig, PluginKind, RemoteScoreArgs, TransportArgs};
pub use cycle::{CycleOutcome, DEFAULT_PARALLELISM, NodeFailure, ScoringCycle};
pub use error::{ErrorKind, ScoreError, ScoreResult};
pub use network_traffic::{NETWORK_TRAFFIC, NetworkTraffic};
pub use normalize::{NormalizeStrategy, Normalizer};
pub use plugin::{BoxFuture, DEFAULT_MAX_NODE_SCORE, NodeScore, RawMeasurement, ScorePlugin};
pub use remote_score::{REMOTE_SCORE, RemoteScore};
