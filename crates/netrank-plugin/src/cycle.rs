//! One scoring cycle: score every candidate, then normalize once.
//!
//! Per-node calls run concurrently, bounded by a semaphore. A failure for
//! one node is recorded against that node and never aborts the others.
//! Normalization sees only the nodes that produced a score, in input order.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ScoreError, ScoreResult};
use crate::plugin::{NodeScore, ScorePlugin};

/// Default number of nodes scored at the same time.
pub const DEFAULT_PARALLELISM: usize = 16;

/// A node whose score could not be obtained this cycle.
#[derive(Debug)]
pub struct NodeFailure {
    pub node: String,
    pub error: ScoreError,
}

/// Result of one cycle.
#[derive(Debug, Default)]
pub struct CycleOutcome {
    /// Normalized scores of the nodes that were scored, in input order.
    pub scores: Vec<NodeScore>,
    /// Nodes that failed, in input order.
    pub failures: Vec<NodeFailure>,
}

impl CycleOutcome {
    /// Scores sorted best first; ties broken by node name.
    pub fn ranked(&self) -> Vec<NodeScore> {
        let mut ranked = self.scores.clone();
        ranked.sort_by(|a, b| match b.score.cmp(&a.score) {
            Ordering::Equal => a.name.cmp(&b.name),
            other => other,
        });
        ranked
    }

    pub fn best(&self) -> Option<NodeScore> {
        self.ranked().into_iter().next()
    }
}

/// Drives a [`ScorePlugin`] across a candidate set.
#[derive(Clone)]
pub struct ScoringCycle {
    plugin: Arc<dyn ScorePlugin>,
    parallelism: usize,
}

impl ScoringCycle {
    pub fn new(plugin: Arc<dyn ScorePlugin>, parallelism: usize) -> Self {
        Self {
            plugin,
            parallelism: parallelism.max(1),
        }
    }

    pub fn plugin(&self) -> &Arc<dyn ScorePlugin> {
        &self.plugin
    }

    /// Score `nodes` and normalize the successful results.
    ///
    /// Duplicate names are scored once. Cancelling `cancel` aborts in-flight
    /// calls; their nodes are reported as failures.
    pub async fn run(&self, nodes: &[String], cancel: &CancellationToken) -> ScoreResult<CycleOutcome> {
        let started = Instant::now();
        let plugin_name = self.plugin.name();

        let mut seen = HashSet::new();
        let candidates: Vec<String> = nodes
            .iter()
            .filter(|n| seen.insert(n.as_str()))
            .cloned()
            .collect();

        debug!(plugin = plugin_name, nodes = candidates.len(), parallelism = self.parallelism, "scoring cycle starting");

        let limiter = Arc::new(Semaphore::new(self.parallelism));
        let mut tasks = JoinSet::new();
        for (index, node) in candidates.iter().enumerate() {
            let plugin = self.plugin.clone();
            let limiter = limiter.clone();
            let cancel = cancel.clone();
            let node = node.clone();
            tasks.spawn(async move {
                // The semaphore is never closed, so acquire cannot fail.
                let _permit = limiter.acquire_owned().await.ok();
                let result = plugin.score(&node, &cancel).await;
                (index, result)
            });
        }

        let mut results: Vec<Option<ScoreResult<i64>>> = candidates.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => warn!(plugin = plugin_name, error = %e, "scoring task did not complete"),
            }
        }

        let mut outcome = CycleOutcome::default();
        for (node, result) in candidates.into_iter().zip(results) {
            let result = result.unwrap_or_else(|| {
                Err(ScoreError::Aborted {
                    node: node.clone(),
                    reason: "scoring task panicked".to_string(),
                })
            });
            match result {
                Ok(score) => outcome.scores.push(NodeScore::new(node, score)),
                Err(error) => {
                    warn!(plugin = plugin_name, %node, %error, "node scoring failed");
                    outcome.failures.push(NodeFailure { node, error });
                }
            }
        }

        self.plugin.normalize_scores(&mut outcome.scores)?;

        info!(
            plugin = plugin_name,
            scored = outcome.scores.len(),
            failed = outcome.failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "scoring cycle complete"
        );
        Ok(outcome)
    }
}
