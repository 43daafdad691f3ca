//! Prometheus payloads and a node-routed backend built on the shared
//! mock server from `netrank_telemetry::testing`.

#![allow(dead_code)]

use std::collections::HashMap;

use http::StatusCode;
use netrank_telemetry::testing::MockServer;
use tokio::net::TcpListener;

pub use netrank_telemetry::testing::form_value;

// ── Prometheus payloads ─────────────────────────────────────────────

pub const DEFAULT_INTERFACE: &str = "ens192";
pub const DEFAULT_RESULT_VALUE: i64 = 1_441_178_050_902;

/// One node-exporter vector entry, as a real backend returns it.
pub fn metric_result(node: &str, value: i64) -> String {
    format!(
        r#"{{
            "metric": {{
                "app": "prometheus",
                "component": "node-exporter",
                "device": "{DEFAULT_INTERFACE}",
                "instance": "10.43.0.254:9100",
                "job": "kubernetes-service-endpoints",
                "kubernetes_namespace": "monitor",
                "kubernetes_node": "{node}"
            }},
            "value": [1618495272.297, "{value}"]
        }}"#
    )
}

pub fn success_response(results: &[String]) -> String {
    format!(
        r#"{{"status": "success", "data": {{"resultType": "vector", "result": [{}]}}}}"#,
        results.join(",")
    )
}

pub const ERROR_RESPONSE: &str = r#"{
    "status": "error",
    "errorType": "bad_data",
    "error": "invalid parameter \"query\": 1:90: parse error: bad duration syntax: \"5\""
}"#;

// ── Backends ────────────────────────────────────────────────────────

/// Prometheus stand-in that answers per-node bandwidth queries from a map.
///
/// The node is taken from the `kubernetes_node` matcher of the decoded
/// query. Nodes missing from the map get an empty vector.
pub async fn mock_prometheus(values: &[(&str, i64)]) -> MockServer {
    let values: HashMap<String, i64> = values.iter().map(|(n, v)| (n.to_string(), *v)).collect();
    MockServer::start(move |req| {
        let query = form_value(&req.body, "query").unwrap_or_default();
        let node = between(&query, "kubernetes_node=\"", "\",device");
        let results: Vec<String> = values
            .get(node)
            .map(|v| vec![metric_result(node, *v)])
            .unwrap_or_default();
        (StatusCode::OK, success_response(&results))
    })
    .await
}

/// Endpoint that always answers with the same status and body.
pub async fn fixed_response(status: StatusCode, body: &str) -> MockServer {
    let body = body.to_string();
    MockServer::start(move |_| (status, body.clone())).await
}

/// An address nothing listens on.
pub async fn refused_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}")
}

fn between<'a>(value: &'a str, start: &str, end: &str) -> &'a str {
    let Some(from) = value.find(start).map(|i| i + start.len()) else {
        return "";
    };
    match value[from..].find(end) {
        Some(len) => &value[from..from + len],
        None => "",
    }
}
