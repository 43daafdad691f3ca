//! Score normalization across one cycle's candidate set.
//!
//! Two strategies:
//! - **Inverse**: low raw score is best (bandwidth). `MAX - score * MAX / max`.
//! - **Direct**: high raw score is best (remote fitness). `score * MAX / max`.
//!
//! Both guard against a zero maximum instead of dividing by it. Arithmetic
//! is integer division on non-negative operands (floor toward zero), done
//! in `i128` so `score * MAX` cannot overflow.

use serde::{Deserialize, Serialize};

use crate::error::{ScoreError, ScoreResult};
use crate::plugin::NodeScore;

/// Which end of the raw range is preferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NormalizeStrategy {
    /// Lower raw scores normalize higher.
    Inverse,
    /// Higher raw scores normalize higher.
    Direct,
}

/// Stateless normalizer bound to one strategy and maximum score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalizer {
    strategy: NormalizeStrategy,
    max_score: i64,
}

impl Normalizer {
    pub fn new(strategy: NormalizeStrategy, max_score: i64) -> ScoreResult<Self> {
        if max_score <= 0 {
            return Err(ScoreError::Config(format!(
                "max node score must be positive, got {max_score}"
            )));
        }
        Ok(Self {
            strategy,
            max_score,
        })
    }

    pub fn strategy(&self) -> NormalizeStrategy {
        self.strategy
    }

    pub fn max_score(&self) -> i64 {
        self.max_score
    }

    /// Rewrite every score in place. Entries are never added, removed or
    /// reordered. Not meant to be applied twice to the same set.
    pub fn normalize(&self, scores: &mut [NodeScore]) {
        if scores.is_empty() {
            return;
        }

        let max = scores.iter().map(raw).max().unwrap_or(0);
        let min = scores.iter().map(raw).min().unwrap_or(0);

        match self.strategy {
            NormalizeStrategy::Inverse => {
                // All idle, or all identical: every node is equally good.
                if max == 0 || max == min {
                    for s in scores.iter_mut() {
                        s.score = self.max_score;
                    }
                    return;
                }
                for s in scores.iter_mut() {
                    let scaled = self.scale(raw(s), max);
                    s.score = self.clamp(self.max_score - scaled);
                }
            }
            NormalizeStrategy::Direct => {
                if max == 0 {
                    for s in scores.iter_mut() {
                        s.score = 0;
                    }
                    return;
                }
                for s in scores.iter_mut() {
                    s.score = self.clamp(self.scale(raw(s), max));
                }
            }
        }
    }

    /// `value * max_score / max`, truncated.
    fn scale(&self, value: i64, max: i64) -> i64 {
        let scaled = i128::from(value) * i128::from(self.max_score) / i128::from(max);
        i64::try_from(scaled).unwrap_or(self.max_score)
    }

    fn clamp(&self, score: i64) -> i64 {
        score.clamp(0, self.max_score)
    }
}

/// Negative raw scores cannot come from a scorer; treat them as zero.
fn raw(score: &NodeScore) -> i64 {
    score.score.max(0)
}
