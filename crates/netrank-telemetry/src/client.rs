//! Prometheus instant-query client.
//!
//! Each call POSTs to `/api/v1/query` and insists the result resolves to
//! exactly one sample. Zero samples and multiple samples are both errors:
//! the queries built by [`QueryBuilder`](crate::QueryBuilder) select a
//! single series, so extra matches mean the labels are ambiguous and no
//! series should be picked silently.

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use http::Uri;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{TelemetryError, TelemetryResult};
use crate::transport::{HttpTransport, parse_http_uri};

const QUERY_PATH: &str = "/api/v1/query";

/// One sample extracted from an instant-query result.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub value: f64,
    pub timestamp: SystemTime,
    /// Series labels; empty for scalar results.
    pub labels: BTreeMap<String, String>,
    /// Non-fatal warnings reported by the backend alongside the result.
    pub warnings: Vec<String>,
}

/// Response envelope of the Prometheus HTTP API.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    data: Option<QueryData>,
    #[serde(rename = "errorType", default)]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    #[serde(rename = "resultType")]
    result_type: String,
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct VectorEntry {
    #[serde(default)]
    metric: BTreeMap<String, String>,
    value: (f64, String),
}

/// Client for one Prometheus-compatible backend.
#[derive(Debug, Clone)]
pub struct MetricsClient {
    endpoint: Uri,
    transport: HttpTransport,
}

impl MetricsClient {
    /// Create a client for the backend at `address` (e.g.
    /// `http://prometheus:9090`), sharing the given transport's pool.
    pub fn new(address: &str, transport: HttpTransport) -> TelemetryResult<Self> {
        let base = parse_http_uri(address)
            .map_err(|e| TelemetryError::Config(format!("metrics backend address: {e}")))?;
        let base = base.to_string();
        let endpoint = format!("{}{QUERY_PATH}", base.trim_end_matches('/'));
        let endpoint = parse_http_uri(&endpoint)
            .map_err(|e| TelemetryError::Config(format!("metrics backend address: {e}")))?;

        Ok(Self { endpoint, transport })
    }

    pub fn endpoint(&self) -> &Uri {
        &self.endpoint
    }

    /// Evaluate `query` at `at` (now when `None`) and return its only sample.
    pub async fn query(
        &self,
        query: &str,
        at: Option<SystemTime>,
        cancel: &CancellationToken,
    ) -> TelemetryResult<Sample> {
        let at = at.unwrap_or_else(SystemTime::now);
        let time = format_unix_seconds(at);

        debug!(%query, %time, "executing metrics query");
        let resp = self
            .transport
            .post_form(&self.endpoint, &[("query", query), ("time", time.as_str())], cancel)
            .await?;

        let envelope: ApiResponse = match serde_json::from_slice(&resp.body) {
            Ok(envelope) => envelope,
            Err(e) if resp.status.is_success() => {
                return Err(TelemetryError::Decode(e.to_string()));
            }
            Err(_) => {
                return Err(TelemetryError::Query {
                    error_type: "http".to_string(),
                    message: format!("backend returned HTTP {}", resp.status),
                });
            }
        };

        if envelope.status != "success" || !resp.status.is_success() {
            return Err(TelemetryError::Query {
                error_type: envelope.error_type.unwrap_or_else(|| "unknown".to_string()),
                message: envelope
                    .error
                    .unwrap_or_else(|| format!("backend returned HTTP {} with status {:?}", resp.status, envelope.status)),
            });
        }

        for warning in &envelope.warnings {
            warn!(%query, %warning, "metrics backend returned a warning");
        }

        let data = envelope
            .data
            .ok_or_else(|| TelemetryError::Decode("success response without data".to_string()))?;

        let mut sample = extract_single(data)?;
        sample.warnings = envelope.warnings;
        debug!(%query, value = sample.value, "metrics query returned one sample");
        Ok(sample)
    }
}

/// Pull the only sample out of a `vector` or `scalar` result.
fn extract_single(data: QueryData) -> TelemetryResult<Sample> {
    match data.result_type.as_str() {
        "vector" => {
            let mut entries: Vec<VectorEntry> = serde_json::from_value(data.result)
                .map_err(|e| TelemetryError::Decode(format!("vector result: {e}")))?;
            match entries.len() {
                0 => Err(TelemetryError::NoData),
                1 => {
                    let entry = entries.remove(0);
                    let (ts, raw) = entry.value;
                    Ok(Sample {
                        value: parse_sample_value(&raw)?,
                        timestamp: from_unix_seconds(ts)?,
                        labels: entry.metric,
                        warnings: Vec::new(),
                    })
                }
                n => Err(TelemetryError::AmbiguousResult(n)),
            }
        }
        "scalar" => {
            let (ts, raw): (f64, String) = serde_json::from_value(data.result)
                .map_err(|e| TelemetryError::Decode(format!("scalar result: {e}")))?;
            Ok(Sample {
                value: parse_sample_value(&raw)?,
                timestamp: from_unix_seconds(ts)?,
                labels: BTreeMap::new(),
                warnings: Vec::new(),
            })
        }
        other => Err(TelemetryError::Query {
            error_type: "unsupported_result".to_string(),
            message: format!("expected a vector or scalar result, got {other:?}"),
        }),
    }
}

/// Sample values travel as strings; Prometheus spells infinities `+Inf`.
fn parse_sample_value(raw: &str) -> TelemetryResult<f64> {
    match raw {
        "+Inf" => Ok(f64::INFINITY),
        "-Inf" => Ok(f64::NEG_INFINITY),
        _ => raw
            .parse::<f64>()
            .map_err(|e| TelemetryError::Decode(format!("sample value {raw:?}: {e}"))),
    }
}

fn from_unix_seconds(ts: f64) -> TelemetryResult<SystemTime> {
    if !ts.is_finite() || ts < 0.0 {
        return Err(TelemetryError::Decode(format!("invalid sample timestamp {ts}")));
    }
    Duration::try_from_secs_f64(ts)
        .ok()
        .and_then(|since| UNIX_EPOCH.checked_add(since))
        .ok_or_else(|| TelemetryError::Decode(format!("sample timestamp {ts} is out of range")))
}

fn format_unix_seconds(at: SystemTime) -> String {
    let since = at.duration_since(UNIX_EPOCH).unwrap_or_default();
    format!("{}.{:03}", since.as_secs(), since.subsec_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockServer, form_value};
    use crate::transport::TransportConfig;
    use crate::TransportError;
    use http::StatusCode;

    const METRIC_RESULT: &str = r#"{
        "metric": {
            "component": "node-exporter",
            "device": "ens192",
            "instance": "10.43.0.254:9100",
            "kubernetes_node": "node05"
        },
        "value": [1618495272.297, "1441178050902"]
    }"#;

    fn success(result: &str) -> String {
        format!(r#"{{"status":"success","data":{{"resultType":"vector","result":[{result}]}}}}"#)
    }

    const ERROR_RESPONSE: &str = r#"{
        "status": "error",
        "errorType": "bad_data",
        "error": "invalid parameter \"query\": 1:90: parse error: bad duration syntax: \"5\""
    }"#;

    fn client_for(server: &MockServer) -> MetricsClient {
        let transport = HttpTransport::new(&TransportConfig {
            request_timeout: Duration::from_secs(2),
            ..TransportConfig::default()
        });
        MetricsClient::new(&server.base_url(), transport).unwrap()
    }

    #[tokio::test]
    async fn single_sample_is_returned() {
        let server = MockServer::start(|_| (StatusCode::OK, success(METRIC_RESULT))).await;
        let client = client_for(&server);

        let sample = client.query("up", None, &CancellationToken::new()).await.unwrap();
        assert_eq!(sample.value, 1_441_178_050_902.0);
        assert_eq!(sample.labels.get("kubernetes_node").map(String::as_str), Some("node05"));
        assert!(sample.warnings.is_empty());
        let ts = sample.timestamp.duration_since(UNIX_EPOCH).unwrap();
        assert_eq!(ts.as_secs(), 1_618_495_272);
    }

    #[tokio::test]
    async fn request_carries_query_and_time() {
        let server = MockServer::start(|_| (StatusCode::OK, success(METRIC_RESULT))).await;
        let client = client_for(&server);
        let at = UNIX_EPOCH + Duration::from_millis(1_618_495_272_297);

        client
            .query("sum(up)", Some(at), &CancellationToken::new())
            .await
            .unwrap();

        let requests = server.requests();
        assert_eq!(requests[0].path, "/api/v1/query");
        assert_eq!(form_value(&requests[0].body, "query").as_deref(), Some("sum(up)"));
        assert_eq!(
            form_value(&requests[0].body, "time").as_deref(),
            Some("1618495272.297")
        );
    }

    #[tokio::test]
    async fn multiple_series_are_ambiguous() {
        let both = format!("{METRIC_RESULT},{METRIC_RESULT}");
        let server = MockServer::start(move |_| (StatusCode::OK, success(&both))).await;
        let client = client_for(&server);

        let err = client.query("up", None, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, TelemetryError::AmbiguousResult(2)));
    }

    #[tokio::test]
    async fn empty_vector_is_no_data() {
        let server = MockServer::start(|_| (StatusCode::OK, success(""))).await;
        let client = client_for(&server);

        let err = client.query("up", None, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, TelemetryError::NoData));
    }

    #[tokio::test]
    async fn error_envelope_is_query_error() {
        let server =
            MockServer::start(|_| (StatusCode::BAD_REQUEST, ERROR_RESPONSE.to_string())).await;
        let client = client_for(&server);

        let err = client.query("bad[5", None, &CancellationToken::new()).await.unwrap_err();
        match err {
            TelemetryError::Query { error_type, message } => {
                assert_eq!(error_type, "bad_data");
                assert!(message.contains("bad duration syntax"));
            }
            other => panic!("expected query error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn bare_http_failure_is_query_error() {
        let server = MockServer::start(|_| (StatusCode::NOT_FOUND, String::new())).await;
        let client = client_for(&server);

        let err = client.query("up", None, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, TelemetryError::Query { ref error_type, .. } if error_type == "http"));
    }

    #[tokio::test]
    async fn garbage_success_body_is_decode_error() {
        let server = MockServer::start(|_| (StatusCode::OK, "<html>".to_string())).await;
        let client = client_for(&server);

        let err = client.query("up", None, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, TelemetryError::Decode(_)));
    }

    #[tokio::test]
    async fn warnings_are_surfaced_not_fatal() {
        let body = format!(
            r#"{{"status":"success","warnings":["partial response: store unavailable"],"data":{{"resultType":"vector","result":[{METRIC_RESULT}]}}}}"#
        );
        let server = MockServer::start(move |_| (StatusCode::OK, body.clone())).await;
        let client = client_for(&server);

        let sample = client.query("up", None, &CancellationToken::new()).await.unwrap();
        assert_eq!(sample.warnings, vec!["partial response: store unavailable".to_string()]);
        assert_eq!(sample.value, 1_441_178_050_902.0);
    }

    #[tokio::test]
    async fn scalar_result_is_single_sample() {
        let body = r#"{"status":"success","data":{"resultType":"scalar","result":[1618495272.297,"42"]}}"#;
        let server = MockServer::start(move |_| (StatusCode::OK, body.to_string())).await;
        let client = client_for(&server);

        let sample = client.query("scalar(up)", None, &CancellationToken::new()).await.unwrap();
        assert_eq!(sample.value, 42.0);
        assert!(sample.labels.is_empty());
    }

    #[tokio::test]
    async fn matrix_result_is_rejected() {
        let body = r#"{"status":"success","data":{"resultType":"matrix","result":[]}}"#;
        let server = MockServer::start(move |_| (StatusCode::OK, body.to_string())).await;
        let client = client_for(&server);

        let err = client.query("up[5m]", None, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, TelemetryError::Query { .. }));
    }

    #[tokio::test]
    async fn unparsable_value_is_decode_error() {
        let entry = r#"{"metric":{},"value":[1618495272.297,"lots"]}"#;
        let server = MockServer::start(move |_| (StatusCode::OK, success(entry))).await;
        let client = client_for(&server);

        let err = client.query("up", None, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, TelemetryError::Decode(_)));
    }

    #[tokio::test]
    async fn out_of_range_timestamp_is_decode_error() {
        for ts in ["1e30", "1.8e19", "-1"] {
            let entry = format!(r#"{{"metric":{{}},"value":[{ts},"5"]}}"#);
            let server = MockServer::start(move |_| (StatusCode::OK, success(&entry))).await;
            let client = client_for(&server);

            let err = client.query("up", None, &CancellationToken::new()).await.unwrap_err();
            assert!(matches!(err, TelemetryError::Decode(_)), "{ts}: {err:?}");
        }
    }

    #[tokio::test]
    async fn unreachable_backend_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = MetricsClient::new(
            &format!("http://{addr}"),
            HttpTransport::new(&TransportConfig::default()),
        )
        .unwrap();

        let err = client.query("up", None, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, TelemetryError::Transport(TransportError::Connect(_))));
    }

    #[tokio::test]
    async fn endpoint_appends_query_path() {
        let transport = HttpTransport::new(&TransportConfig::default());
        let client = MetricsClient::new("http://prometheus:9090/", transport).unwrap();
        assert_eq!(client.endpoint().to_string(), "http://prometheus:9090/api/v1/query");
    }

    #[tokio::test]
    async fn invalid_address_is_config_error() {
        let transport = HttpTransport::new(&TransportConfig::default());
        assert!(matches!(
            MetricsClient::new("prometheus:9090", transport.clone()),
            Err(TelemetryError::Config(_))
        ));
        assert!(matches!(
            MetricsClient::new("https://prometheus:9090", transport),
            Err(TelemetryError::Config(_))
        ));
    }

    #[test]
    fn infinities_parse() {
        assert_eq!(parse_sample_value("+Inf").unwrap(), f64::INFINITY);
        assert!(parse_sample_value("NaN").unwrap().is_nan());
    }
}
