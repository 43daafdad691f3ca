//! Remote-score plugin: fetches a precomputed fitness score over HTTP.
//!
//! The endpoint answers `GET <url>` with a JSON object carrying an integer
//! `score`; every other field is ignored. The request does not identify the
//! node being scored, so the upstream protocol cannot tell candidates apart.
//! The value is treated as an opaque "higher is better" score and passed
//! through unchanged until the cycle is normalized.

use http::Uri;
use netrank_telemetry::{HttpTransport, parse_http_uri};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ScoreError, ScoreResult};
use crate::normalize::{NormalizeStrategy, Normalizer};
use crate::plugin::{BoxFuture, NodeScore, ScorePlugin};

/// Plugin name used in configuration and logs.
pub const REMOTE_SCORE: &str = "RemoteScore";

const SCORE_FIELD: &str = "score";

/// Client for an external scoring endpoint.
#[derive(Debug, Clone)]
pub struct RemoteScore {
    endpoint: Uri,
    transport: HttpTransport,
    normalizer: Normalizer,
}

impl RemoteScore {
    pub fn new(endpoint_url: &str, transport: HttpTransport, max_node_score: i64) -> ScoreResult<Self> {
        let endpoint = parse_http_uri(endpoint_url)
            .map_err(|e| ScoreError::Config(format!("remote score endpoint: {e}")))?;
        Ok(Self {
            endpoint,
            transport,
            normalizer: Normalizer::new(NormalizeStrategy::Direct, max_node_score)?,
        })
    }

    pub fn endpoint(&self) -> &Uri {
        &self.endpoint
    }

    /// Fetch the current score for `node`.
    pub async fn fetch(&self, node: &str, cancel: &CancellationToken) -> ScoreResult<NodeScore> {
        let resp = self
            .transport
            .get(&self.endpoint, cancel)
            .await
            .map_err(|source| {
                warn!(%node, error = %source, endpoint = %self.endpoint, "failed to fetch score");
                ScoreError::Transport {
                    node: node.to_string(),
                    source,
                }
            })?;

        if !resp.status.is_success() {
            warn!(%node, status = %resp.status, endpoint = %self.endpoint, "score endpoint returned an error status");
            return Err(ScoreError::Status {
                node: node.to_string(),
                status: resp.status.as_u16(),
            });
        }

        let score = parse_score(node, &resp.body)?;
        debug!(%node, score, "remote score fetched");
        Ok(NodeScore::new(node, score))
    }
}

impl ScorePlugin for RemoteScore {
    fn name(&self) -> &'static str {
        REMOTE_SCORE
    }

    fn score<'a>(
        &'a self,
        node: &'a str,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, ScoreResult<i64>> {
        Box::pin(async move { self.fetch(node, cancel).await.map(|s| s.score) })
    }

    fn normalize_scores(&self, scores: &mut [NodeScore]) -> ScoreResult<()> {
        self.normalizer.normalize(scores);
        info!(plugin = REMOTE_SCORE, ?scores, "nodes final score");
        Ok(())
    }
}

/// Extract the integer `score` field from a response body.
fn parse_score(node: &str, body: &[u8]) -> ScoreResult<i64> {
    let decode_err = |reason: String| ScoreError::Decode {
        node: node.to_string(),
        reason,
    };

    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| decode_err(e.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| decode_err(format!("expected a JSON object, got {value}")))?;
    let field = object.get(SCORE_FIELD).ok_or_else(|| ScoreError::MissingField {
        node: node.to_string(),
        field: SCORE_FIELD,
    })?;
    let score = field
        .as_i64()
        .ok_or_else(|| decode_err(format!("`{SCORE_FIELD}` is not an integer: {field}")))?;

    if score < 0 {
        return Err(ScoreError::InvalidMeasurement {
            node: node.to_string(),
            value: score as f64,
        });
    }
    Ok(score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn score_flows_through_unchanged() {
        assert_eq!(parse_score("n1", br#"{"score": 80}"#).unwrap(), 80);
    }

    #[test]
    fn extra_fields_are_ignored() {
        let body = br#"{"score": 7, "model": "pid-v2", "confidence": 0.93}"#;
        assert_eq!(parse_score("n1", body).unwrap(), 7);
    }

    #[test]
    fn missing_score_is_missing_field() {
        let err = parse_score("n1", br#"{"value": 100}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingField);
    }

    #[test]
    fn truncated_body_is_decode_error() {
        let err = parse_score("n1", br#"{"score": 80"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn non_object_is_decode_error() {
        let err = parse_score("n1", b"[80]").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn non_integer_score_is_decode_error() {
        let bodies: [&[u8]; 3] = [br#"{"score": "80"}"#, br#"{"score": 80.5}"#, br#"{"score": null}"#];
        for body in bodies {
            let err = parse_score("n1", body).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Decode, "{err}");
        }
    }

    #[test]
    fn negative_score_is_rejected() {
        let err = parse_score("n1", br#"{"score": -5}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidMeasurement);
    }

    #[tokio::test]
    async fn https_endpoint_is_config_error() {
        let transport = HttpTransport::new(&Default::default());
        let err = RemoteScore::new("https://predictor/score", transport, 100).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
