//! Plugin configuration, read from TOML.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use netrank_telemetry::{
    HttpTransport, MetricsClient, QueryBuilder, TimeWindow, TransportConfig, parse_http_uri,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cycle::DEFAULT_PARALLELISM;
use crate::error::{ScoreError, ScoreResult};
use crate::network_traffic::NetworkTraffic;
use crate::plugin::{DEFAULT_MAX_NODE_SCORE, ScorePlugin};
use crate::remote_score::RemoteScore;

/// Which scoring strategy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PluginKind {
    NetworkTraffic,
    RemoteScore,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    pub plugin: PluginKind,
    #[serde(default = "default_max_node_score")]
    pub max_node_score: i64,
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    pub network_traffic: Option<NetworkTrafficArgs>,
    pub remote_score: Option<RemoteScoreArgs>,
    #[serde(default)]
    pub transport: TransportArgs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkTrafficArgs {
    /// Base URL of the Prometheus-compatible backend.
    pub address: String,
    pub network_interface: String,
    pub time_range_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteScoreArgs {
    pub endpoint_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportArgs {
    /// Idle connections kept per host.
    pub max_idle_connections: usize,
    pub idle_connection_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for TransportArgs {
    fn default() -> Self {
        let defaults = TransportConfig::default();
        Self {
            max_idle_connections: defaults.max_idle_connections,
            idle_connection_timeout_secs: defaults.idle_connection_timeout.as_secs(),
            request_timeout_secs: defaults.request_timeout.as_secs(),
        }
    }
}

fn default_max_node_score() -> i64 {
    DEFAULT_MAX_NODE_SCORE
}

fn default_parallelism() -> usize {
    DEFAULT_PARALLELISM
}

impl PluginConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> ScoreResult<Self> {
        toml::from_str(content).map_err(|e| ScoreError::Config(e.to_string()))
    }

    /// Check everything that can be checked without touching the network.
    pub fn validate(&self) -> ScoreResult<()> {
        if self.max_node_score <= 0 {
            return Err(config_err(format!(
                "max_node_score must be positive, got {}",
                self.max_node_score
            )));
        }
        if self.parallelism == 0 {
            return Err(config_err("parallelism must be at least 1"));
        }
        if self.transport.request_timeout_secs == 0 {
            return Err(config_err("transport.request_timeout_secs must be positive"));
        }

        match self.plugin {
            PluginKind::NetworkTraffic => {
                let args = self.network_traffic_args()?;
                check_url("network_traffic.address", &args.address)?;
                if args.network_interface.trim().is_empty() {
                    return Err(config_err("network_traffic.network_interface must not be empty"));
                }
                if args.time_range_minutes <= 0 {
                    return Err(config_err(format!(
                        "network_traffic.time_range_minutes must be positive, got {}",
                        args.time_range_minutes
                    )));
                }
            }
            PluginKind::RemoteScore => {
                let args = self.remote_score_args()?;
                check_url("remote_score.endpoint_url", &args.endpoint_url)?;
            }
        }
        Ok(())
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            max_idle_connections: self.transport.max_idle_connections,
            idle_connection_timeout: Duration::from_secs(self.transport.idle_connection_timeout_secs),
            request_timeout: Duration::from_secs(self.transport.request_timeout_secs),
        }
    }

    /// Validate, then construct the selected plugin with its own transport.
    pub fn build(&self) -> ScoreResult<Arc<dyn ScorePlugin>> {
        self.validate()?;
        let transport = HttpTransport::new(&self.transport_config());

        let plugin: Arc<dyn ScorePlugin> = match self.plugin {
            PluginKind::NetworkTraffic => {
                let args = self.network_traffic_args()?;
                let window = TimeWindow::from_minutes(args.time_range_minutes)
                    .map_err(|e| config_err(e.to_string()))?;
                let queries = QueryBuilder::new(args.network_interface.clone(), window)
                    .map_err(|e| config_err(e.to_string()))?;
                let metrics = MetricsClient::new(&args.address, transport)
                    .map_err(|e| config_err(e.to_string()))?;
                info!(
                    address = %args.address,
                    interface = %args.network_interface,
                    window = %window,
                    "network traffic plugin configured"
                );
                Arc::new(NetworkTraffic::new(queries, metrics, self.max_node_score)?)
            }
            PluginKind::RemoteScore => {
                let args = self.remote_score_args()?;
                info!(endpoint = %args.endpoint_url, "remote score plugin configured");
                Arc::new(RemoteScore::new(&args.endpoint_url, transport, self.max_node_score)?)
            }
        };
        Ok(plugin)
    }

    fn network_traffic_args(&self) -> ScoreResult<&NetworkTrafficArgs> {
        self.network_traffic
            .as_ref()
            .ok_or_else(|| config_err("plugin \"network-traffic\" requires a [network_traffic] section"))
    }

    fn remote_score_args(&self) -> ScoreResult<&RemoteScoreArgs> {
        self.remote_score
            .as_ref()
            .ok_or_else(|| config_err("plugin \"remote-score\" requires a [remote_score] section"))
    }
}

fn config_err(msg: impl Into<String>) -> ScoreError {
    ScoreError::Config(msg.into())
}

fn check_url(field: &str, url: &str) -> ScoreResult<()> {
    if url.trim().is_empty() {
        return Err(config_err(format!("{field} must not be empty")));
    }
    parse_http_uri(url).map_err(|e| config_err(format!("{field}: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const NETWORK_TRAFFIC_TOML: &str = r#"
plugin = "network-traffic"

[network_traffic]
address = "http://prometheus.monitoring:9090"
network_interface = "ens192"
time_range_minutes = 5
"#;

    const REMOTE_SCORE_TOML: &str = r#"
plugin = "remote-score"
max_node_score = 10
parallelism = 4

[remote_score]
endpoint_url = "http://predictor:8080/score"

[transport]
request_timeout_secs = 2
"#;

    fn kind_of(config: &PluginConfig) -> ErrorKind {
        config.validate().unwrap_err().kind()
    }

    #[test]
    fn parses_with_defaults() {
        let config = PluginConfig::from_toml_str(NETWORK_TRAFFIC_TOML).unwrap();
        assert_eq!(config.plugin, PluginKind::NetworkTraffic);
        assert_eq!(config.max_node_score, 100);
        assert_eq!(config.parallelism, 16);
        assert_eq!(config.transport.max_idle_connections, 32);
        assert_eq!(config.transport.idle_connection_timeout_secs, 90);
        assert_eq!(config.transport.request_timeout_secs, 5);
        let args = config.network_traffic.as_ref().unwrap();
        assert_eq!(args.network_interface, "ens192");
        assert_eq!(args.time_range_minutes, 5);
        config.validate().unwrap();
    }

    #[test]
    fn parses_overrides() {
        let config = PluginConfig::from_toml_str(REMOTE_SCORE_TOML).unwrap();
        assert_eq!(config.plugin, PluginKind::RemoteScore);
        assert_eq!(config.max_node_score, 10);
        assert_eq!(config.parallelism, 4);
        // Unset transport keys keep their defaults.
        assert_eq!(config.transport.max_idle_connections, 32);
        let transport = config.transport_config();
        assert_eq!(transport.request_timeout, Duration::from_secs(2));
        assert_eq!(transport.idle_connection_timeout, Duration::from_secs(90));
        config.validate().unwrap();
    }

    #[test]
    fn unknown_plugin_is_config_error() {
        let err = PluginConfig::from_toml_str("plugin = \"cpu\"").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn missing_section_is_rejected() {
        let config = PluginConfig::from_toml_str("plugin = \"network-traffic\"").unwrap();
        assert_eq!(kind_of(&config), ErrorKind::Configuration);
        let config = PluginConfig::from_toml_str("plugin = \"remote-score\"").unwrap();
        assert_eq!(kind_of(&config), ErrorKind::Configuration);
    }

    #[test]
    fn bad_network_traffic_args_are_rejected() {
        let base = PluginConfig::from_toml_str(NETWORK_TRAFFIC_TOML).unwrap();

        let mut config = base.clone();
        config.network_traffic.as_mut().unwrap().network_interface = " ".to_string();
        assert_eq!(kind_of(&config), ErrorKind::Configuration);

        for minutes in [0, -5] {
            let mut config = base.clone();
            config.network_traffic.as_mut().unwrap().time_range_minutes = minutes;
            assert_eq!(kind_of(&config), ErrorKind::Configuration);
        }

        for address in ["", "prometheus:9090/", "https://prometheus:9090", "http://"] {
            let mut config = base.clone();
            config.network_traffic.as_mut().unwrap().address = address.to_string();
            assert!(config.validate().is_err(), "{address:?} accepted");
        }
    }

    #[test]
    fn bad_global_settings_are_rejected() {
        let base = PluginConfig::from_toml_str(REMOTE_SCORE_TOML).unwrap();

        let mut config = base.clone();
        config.max_node_score = 0;
        assert_eq!(kind_of(&config), ErrorKind::Configuration);

        let mut config = base.clone();
        config.parallelism = 0;
        assert_eq!(kind_of(&config), ErrorKind::Configuration);

        let mut config = base.clone();
        config.transport.request_timeout_secs = 0;
        assert_eq!(kind_of(&config), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn builds_selected_plugin() {
        let plugin = PluginConfig::from_toml_str(NETWORK_TRAFFIC_TOML)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(plugin.name(), "NetworkTraffic");

        let plugin = PluginConfig::from_toml_str(REMOTE_SCORE_TOML)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(plugin.name(), "RemoteScore");
    }

    #[tokio::test]
    async fn build_validates_first() {
        let mut config = PluginConfig::from_toml_str(REMOTE_SCORE_TOML).unwrap();
        config.remote_score.as_mut().unwrap().endpoint_url = "ftp://predictor/score".to_string();
        let err = config.build().err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
