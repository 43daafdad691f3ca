//! Pooled HTTP/1.1 transport shared by every outbound call.
//!
//! An `HttpTransport` is built once when a scorer is constructed and cloned
//! into each component that talks HTTP. Clones share one connection pool, so
//! concurrent scoring calls reuse idle keep-alive connections instead of
//! dialing a fresh one per node. The pool is released when the last clone is
//! dropped.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use http::{Method, Request, StatusCode, Uri, header};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{TransportError, TransportResult};

const USER_AGENT: &str = concat!("netrank/", env!("CARGO_PKG_VERSION"));

/// Connection pool and timeout settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Idle keep-alive connections kept per host.
    pub max_idle_connections: usize,
    /// How long an idle connection may sit in the pool before it is closed.
    pub idle_connection_timeout: Duration,
    /// Upper bound for one request, from connect to the last body byte.
    pub request_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_idle_connections: 32,
            idle_connection_timeout: Duration::from_secs(90),
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// A fully buffered HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

/// Thread-safe pooled HTTP client. Cheap to clone.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client<HttpConnector, Full<Bytes>>,
    request_timeout: Duration,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Create a transport with its own connection pool.
    pub fn new(config: &TransportConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(config.request_timeout));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_max_idle_per_host(config.max_idle_connections)
            .pool_idle_timeout(config.idle_connection_timeout)
            .build(connector);

        debug!(
            max_idle = config.max_idle_connections,
            idle_timeout = ?config.idle_connection_timeout,
            request_timeout = ?config.request_timeout,
            "http transport created"
        );

        Self {
            client,
            request_timeout: config.request_timeout,
        }
    }

    /// Per-request timeout applied by [`send`](Self::send).
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Issue a GET request and buffer the response.
    pub async fn get(&self, uri: &Uri, cancel: &CancellationToken) -> TransportResult<HttpResponse> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri.clone())
            .header(header::USER_AGENT, USER_AGENT)
            .header(header::ACCEPT, "application/json")
            .body(Full::new(Bytes::new()))
            .map_err(|e| invalid_request(uri, e))?;

        self.send(request, cancel).await
    }

    /// Issue a POST with an `application/x-www-form-urlencoded` body.
    pub async fn post_form(
        &self,
        uri: &Uri,
        pairs: &[(&str, &str)],
        cancel: &CancellationToken,
    ) -> TransportResult<HttpResponse> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri.clone())
            .header(header::USER_AGENT, USER_AGENT)
            .header(header::ACCEPT, "application/json")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Full::new(Bytes::from(encode_form(pairs))))
            .map_err(|e| invalid_request(uri, e))?;

        self.send(request, cancel).await
    }

    /// Send a request, bounded by the request timeout and the cancellation
    /// token. Whichever fires first drops the in-flight exchange, which
    /// aborts the request and releases its connection.
    pub async fn send(
        &self,
        request: Request<Full<Bytes>>,
        cancel: &CancellationToken,
    ) -> TransportResult<HttpResponse> {
        let method = request.method().clone();
        let uri = request.uri().clone();

        let exchange = async {
            let response = self
                .client
                .request(request)
                .await
                .map_err(|e| TransportError::Connect(error_chain(&e)))?;
            let status = response.status();
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| TransportError::Body(error_chain(&e)))?
                .to_bytes();
            Ok::<_, TransportError>(HttpResponse { status, body })
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(%method, %uri, "request cancelled");
                Err(TransportError::Cancelled)
            }
            result = tokio::time::timeout(self.request_timeout, exchange) => match result {
                Ok(outcome) => {
                    match &outcome {
                        Ok(resp) => debug!(%method, %uri, status = %resp.status, bytes = resp.body.len(), "request completed"),
                        Err(e) => debug!(%method, %uri, error = %e, "request failed"),
                    }
                    outcome
                }
                Err(_) => {
                    debug!(%method, %uri, timeout = ?self.request_timeout, "request timed out");
                    Err(TransportError::Timeout(self.request_timeout))
                }
            },
        }
    }
}

/// Parse and validate an `http://host[:port][/path]` URI.
pub fn parse_http_uri(raw: &str) -> TransportResult<Uri> {
    let uri: Uri = raw.trim().parse().map_err(|e: http::uri::InvalidUri| TransportError::InvalidUri {
        uri: raw.to_string(),
        reason: e.to_string(),
    })?;

    match uri.scheme_str() {
        Some("http") => {}
        Some(other) => return Err(TransportError::UnsupportedScheme(other.to_string())),
        None => {
            return Err(TransportError::InvalidUri {
                uri: raw.to_string(),
                reason: "missing scheme".to_string(),
            });
        }
    }

    if uri.host().is_none_or(str::is_empty) {
        return Err(TransportError::InvalidUri {
            uri: raw.to_string(),
            reason: "missing host".to_string(),
        });
    }

    Ok(uri)
}

/// Encode key/value pairs as an `application/x-www-form-urlencoded` body.
pub fn encode_form(pairs: &[(&str, &str)]) -> String {
    let mut out = String::new();
    for (i, (key, value)) in pairs.iter().enumerate() {
        if i > 0 {
            out.push('&');
        }
        encode_component(key, &mut out);
        out.push('=');
        encode_component(value, &mut out);
    }
    out
}

fn encode_component(input: &str, out: &mut String) {
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'*' => out.push(byte as char),
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
}

fn invalid_request(uri: &Uri, err: http::Error) -> TransportError {
    TransportError::InvalidUri {
        uri: uri.to_string(),
        reason: err.to_string(),
    }
}

/// Flatten an error and its sources into one line. hyper's top-level
/// messages ("client error (Connect)") are useless without the cause.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
