//! The host-facing scoring contract.

use std::future::Future;
use std::pin::Pin;
use std::time::SystemTime;

use tokio_util::sync::CancellationToken;

use crate::error::ScoreResult;

/// Default upper bound of a normalized score, matching the host's
/// `MaxNodeScore`.
pub const DEFAULT_MAX_NODE_SCORE: i64 = 100;

/// Boxed future returned by [`ScorePlugin::score`].
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Score of one candidate node. Raw before normalization, bounded after.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NodeScore {
    pub name: String,
    pub score: i64,
}

impl NodeScore {
    pub fn new(name: impl Into<String>, score: i64) -> Self {
        Self {
            name: name.into(),
            score,
        }
    }
}

/// A raw per-node measurement, produced once per scoring call.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMeasurement {
    pub node: String,
    pub value: f64,
    pub observed_at: SystemTime,
}

/// A scoring strategy the host drives once per node, then normalizes once
/// per cycle.
///
/// Implementations must be safe to call concurrently for different nodes:
/// they hold read-only configuration and a shared pooled transport only.
pub trait ScorePlugin: Send + Sync {
    /// Stable plugin name, used in logs and configuration.
    fn name(&self) -> &'static str;

    /// Raw, unnormalized score for one node. Fails instead of substituting
    /// a default so a missing measurement never ranks a node best or worst.
    fn score<'a>(
        &'a self,
        node: &'a str,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, ScoreResult<i64>>;

    /// Rescale every raw score of the cycle into `[0, max_node_score]`.
    /// Called exactly once, after all per-node calls have finished.
    fn normalize_scores(&self, scores: &mut [NodeScore]) -> ScoreResult<()>;
}
