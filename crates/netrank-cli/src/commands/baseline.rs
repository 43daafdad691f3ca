use std::path::Path;
use std::time::Duration;

use netrank_plugin::{NetworkTraffic, PluginConfig, PluginKind};
use netrank_telemetry::{HttpTransport, MetricsClient, QueryBuilder, TimeWindow};
use tokio_util::sync::CancellationToken;

pub async fn baseline(config_path: &str, cancel: &CancellationToken) -> anyhow::Result<()> {
    let config = PluginConfig::from_file(Path::new(config_path))?;
    config.validate()?;
    if config.plugin != PluginKind::NetworkTraffic {
        anyhow::bail!("baseline needs plugin = \"network-traffic\"");
    }
    let Some(args) = config.network_traffic.as_ref() else {
        anyhow::bail!("missing [network_traffic] section");
    };

    let transport = HttpTransport::new(&config.transport_config());
    let window = TimeWindow::from_minutes(args.time_range_minutes)?;
    let queries = QueryBuilder::new(args.network_interface.clone(), window)?;
    let metrics = MetricsClient::new(&args.address, transport)?;
    let plugin = NetworkTraffic::new(queries, metrics, config.max_node_score)?;

    let top = plugin.highest_bandwidth(cancel).await?;
    let age = top
        .observed_at
        .elapsed()
        .map(|d| Duration::from_secs(d.as_secs()))
        .unwrap_or_default();
    let node = if top.node.is_empty() { "<unlabelled>" } else { top.node.as_str() };
    println!(
        "{node}: {} bytes received on {} over {window} (sampled {age:?} ago)",
        top.value, args.network_interface,
    );
    Ok(())
}
