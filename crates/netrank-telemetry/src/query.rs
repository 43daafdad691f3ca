//! PromQL builders for node bandwidth queries.
//!
//! The builder performs no I/O. Every fallible check happens when the
//! builder or its [`TimeWindow`] is constructed, so rendering a query for a
//! valid node name cannot fail.

use std::fmt;

use crate::error::{TelemetryError, TelemetryResult};

/// Counter of received bytes exported by node-exporter.
const RECEIVE_BYTES_METRIC: &str = "node_network_receive_bytes_total";

/// Label identifying the node a series belongs to.
pub const NODE_LABEL: &str = "kubernetes_node";

/// Label identifying the network interface.
pub const DEVICE_LABEL: &str = "device";

/// Aggregation window, a strictly positive number of minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeWindow {
    minutes: u32,
}

impl TimeWindow {
    /// Build a window from a minute count. Zero and negative values are
    /// rejected here rather than surfacing later as a backend parse error.
    pub fn from_minutes(minutes: i64) -> TelemetryResult<Self> {
        if minutes <= 0 {
            return Err(TelemetryError::Config(format!(
                "time window must be a positive number of minutes, got {minutes}"
            )));
        }
        let minutes = u32::try_from(minutes).map_err(|_| {
            TelemetryError::Config(format!("time window of {minutes} minutes is too large"))
        })?;
        Ok(Self { minutes })
    }

    pub fn minutes(&self) -> u32 {
        self.minutes
    }
}

/// Renders as a PromQL range selector duration, e.g. `5m`.
impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m", self.minutes)
    }
}

/// Builds bandwidth queries for one network interface and window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryBuilder {
    interface: String,
    window: TimeWindow,
}

impl QueryBuilder {
    pub fn new(interface: impl Into<String>, window: TimeWindow) -> TelemetryResult<Self> {
        let interface = interface.into();
        if interface.trim().is_empty() {
            return Err(TelemetryError::Config(
                "network interface name must not be empty".to_string(),
            ));
        }
        Ok(Self { interface, window })
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn window(&self) -> TimeWindow {
        self.window
    }

    /// Received bytes on the interface of one node, summed over the window.
    pub fn node_bandwidth(&self, node: &str) -> TelemetryResult<String> {
        if node.trim().is_empty() {
            return Err(TelemetryError::Config("node name must not be empty".to_string()));
        }
        Ok(format!(
            "sum_over_time({RECEIVE_BYTES_METRIC}{{{NODE_LABEL}=\"{}\",{DEVICE_LABEL}=\"{}\"}}[{}])",
            escape_label_value(node),
            escape_label_value(&self.interface),
            self.window,
        ))
    }

    /// The single highest per-node value across the cluster for the
    /// interface, used as a normalization baseline.
    pub fn highest_bandwidth(&self) -> String {
        format!(
            "topk(1, sum_over_time({RECEIVE_BYTES_METRIC}{{{DEVICE_LABEL}=\"{}\"}}[{}]))",
            escape_label_value(&self.interface),
            self.window,
        )
    }
}

/// Escape a value for use inside a double-quoted PromQL label matcher.
fn escape_label_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}
