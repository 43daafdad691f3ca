use netrank_telemetry::{QueryBuilder, TimeWindow};

pub fn query(interface: &str, window: i64, node: Option<&str>) -> anyhow::Result<()> {
    let builder = QueryBuilder::new(interface, TimeWindow::from_minutes(window)?)?;
    let promql = match node {
        Some(node) => builder.node_bandwidth(node)?,
        None => builder.highest_bandwidth(),
    };
    println!("{promql}");
    Ok(())
}
