use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::info;

mod commands;

#[derive(Parser)]
#[command(
    name = "netrank",
    about = "netrank: rank cluster nodes by network load",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scoring cycle over the given nodes and print the ranking.
    Score {
        /// Plugin configuration file (TOML)
        #[arg(short, long)]
        config: String,
        /// Candidate node; repeat for each node
        #[arg(short, long = "node", required = true)]
        nodes: Vec<String>,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Print the PromQL used to measure node bandwidth.
    ///
    /// Without --node, prints the cluster-wide highest-bandwidth query.
    Query {
        #[arg(short, long)]
        interface: String,
        /// Window in minutes
        #[arg(short, long)]
        window: i64,
        #[arg(short, long)]
        node: Option<String>,
    },
    /// Show the busiest node in the cluster for the configured interface.
    Baseline {
        #[arg(short, long)]
        config: String,
    },
}

fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("netrank=info"))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling");
            on_signal.cancel();
        }
    });

    match cli.command {
        Commands::Score { config, nodes, format } => {
            commands::score::score(&config, &nodes, &format, &cancel).await
        }
        Commands::Query { interface, window, node } => {
            commands::query::query(&interface, window, node.as_deref())
        }
        Commands::Baseline { config } => commands::baseline::baseline(&config, &cancel).await,
    }
}
