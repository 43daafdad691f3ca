use std::fmt::Write as _;
use std::path::Path;

use netrank_plugin::{CycleOutcome, PluginConfig, ScoringCycle};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

#[derive(Serialize)]
struct Report<'a> {
    plugin: &'a str,
    ranking: Vec<RankedNode>,
    failures: Vec<FailedNode>,
}

#[derive(Serialize)]
struct RankedNode {
    node: String,
    score: i64,
}

#[derive(Serialize)]
struct FailedNode {
    node: String,
    kind: String,
    error: String,
}

pub async fn score(
    config_path: &str,
    nodes: &[String],
    format: &str,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let config = PluginConfig::from_file(Path::new(config_path))?;
    let plugin = config.build()?;
    let cycle = ScoringCycle::new(plugin, config.parallelism);

    let outcome = cycle.run(nodes, cancel).await?;
    let report = build_report(cycle.plugin().name(), &outcome);

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print!("{}", format_report(&report)),
    }

    if outcome.scores.is_empty() && !outcome.failures.is_empty() {
        anyhow::bail!("all {} nodes failed to score", outcome.failures.len());
    }
    Ok(())
}

fn build_report<'a>(plugin: &'a str, outcome: &CycleOutcome) -> Report<'a> {
    Report {
        plugin,
        ranking: outcome
            .ranked()
            .into_iter()
            .map(|s| RankedNode {
                node: s.name,
                score: s.score,
            })
            .collect(),
        failures: outcome
            .failures
            .iter()
            .map(|f| FailedNode {
                node: f.node.clone(),
                kind: format!("{:?}", f.error.kind()),
                error: f.error.to_string(),
            })
            .collect(),
    }
}

fn format_report(report: &Report<'_>) -> String {
    let mut out = String::new();
    let width = report
        .ranking
        .iter()
        .map(|r| r.node.len())
        .chain(report.failures.iter().map(|f| f.node.len()))
        .max()
        .unwrap_or(0);

    let _ = writeln!(out, "{} ranking:", report.plugin);
    if report.ranking.is_empty() {
        let _ = writeln!(out, "  (no nodes scored)");
    }
    for (i, r) in report.ranking.iter().enumerate() {
        let _ = writeln!(out, "  {:>2}. {:<width$}  {:>4}", i + 1, r.node, r.score);
    }

    if !report.failures.is_empty() {
        let _ = writeln!(out, "failed:");
        for f in &report.failures {
            let _ = writeln!(out, "  {:<width$}  [{}] {}", f.node, f.kind, f.error);
        }
    }
    out
}
