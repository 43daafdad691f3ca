//! Network-traffic scorer: favors nodes that received fewer bytes.
//!
//! Each call queries the received-byte counter of the configured interface
//! on one node, summed over the configured window, and returns it as the
//! raw score. Normalization inverts the range so the quietest node ranks
//! highest.

use std::time::SystemTime;

use netrank_telemetry::{MetricsClient, QueryBuilder, TelemetryError, query::NODE_LABEL};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{ScoreError, ScoreResult};
use crate::normalize::{NormalizeStrategy, Normalizer};
use crate::plugin::{BoxFuture, NodeScore, RawMeasurement, ScorePlugin};

/// Plugin name used in configuration and logs.
pub const NETWORK_TRAFFIC: &str = "NetworkTraffic";

/// Bandwidth-based scorer backed by a Prometheus-compatible backend.
#[derive(Debug, Clone)]
pub struct NetworkTraffic {
    queries: QueryBuilder,
    metrics: MetricsClient,
    normalizer: Normalizer,
}

impl NetworkTraffic {
    pub fn new(queries: QueryBuilder, metrics: MetricsClient, max_node_score: i64) -> ScoreResult<Self> {
        Ok(Self {
            queries,
            metrics,
            normalizer: Normalizer::new(NormalizeStrategy::Inverse, max_node_score)?,
        })
    }

    /// Received bytes on the configured interface of `node` over the window.
    pub async fn measure(&self, node: &str, cancel: &CancellationToken) -> ScoreResult<RawMeasurement> {
        let wrap = |source: TelemetryError| ScoreError::Metrics {
            node: node.to_string(),
            source,
        };

        let query = self.queries.node_bandwidth(node).map_err(wrap)?;
        let sample = self.metrics.query(&query, None, cancel).await.map_err(wrap)?;

        debug!(%node, value = sample.value, "node bandwidth measured");
        Ok(RawMeasurement {
            node: node.to_string(),
            value: sample.value,
            observed_at: sample.timestamp,
        })
    }

    /// The busiest node for the interface across the cluster.
    ///
    /// The node name comes from the series' `kubernetes_node` label and is
    /// empty when the backend strips it.
    pub async fn highest_bandwidth(&self, cancel: &CancellationToken) -> ScoreResult<RawMeasurement> {
        let query = self.queries.highest_bandwidth();
        let sample = self
            .metrics
            .query(&query, None, cancel)
            .await
            .map_err(|source| ScoreError::Metrics {
                node: "<cluster>".to_string(),
                source,
            })?;

        let node = sample.labels.get(NODE_LABEL).cloned().unwrap_or_default();
        debug!(%node, value = sample.value, "cluster highest bandwidth measured");
        Ok(RawMeasurement {
            node,
            value: sample.value,
            observed_at: sample.timestamp,
        })
    }

    async fn score_node(&self, node: &str, cancel: &CancellationToken) -> ScoreResult<i64> {
        let measurement = self.measure(node, cancel).await?;
        let score = measurement_to_score(&measurement)?;
        info!(
            %node,
            bandwidth = score,
            age = ?SystemTime::now().duration_since(measurement.observed_at).ok(),
            "node bandwidth score"
        );
        Ok(score)
    }
}

impl ScorePlugin for NetworkTraffic {
    fn name(&self) -> &'static str {
        NETWORK_TRAFFIC
    }

    fn score<'a>(
        &'a self,
        node: &'a str,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, ScoreResult<i64>> {
        Box::pin(self.score_node(node, cancel))
    }

    fn normalize_scores(&self, scores: &mut [NodeScore]) -> ScoreResult<()> {
        self.normalizer.normalize(scores);
        info!(plugin = NETWORK_TRAFFIC, ?scores, "nodes final score");
        Ok(())
    }
}

/// Truncate toward zero. Negative, NaN and infinite counters are rejected
/// rather than mapped to a score that would rank the node arbitrarily.
fn measurement_to_score(m: &RawMeasurement) -> ScoreResult<i64> {
    if !m.value.is_finite() || m.value < 0.0 || m.value >= i64::MAX as f64 {
        return Err(ScoreError::InvalidMeasurement {
            node: m.node.clone(),
            value: m.value,
        });
    }
    Ok(m.value.trunc() as i64)
}
