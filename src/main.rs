//! incident-graph command-line entry point.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use incident_graph::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;

/// Build knowledge graphs from incident reports.
#[derive(Parser, Debug)]
#[command(name = "incident-graph")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the graph of a JSON report file and export it as CSV
    Build {
        /// Input JSON file
        input: PathBuf,
        /// Output directory (defaults to the configured output directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Run without LLM and embedding services
        #[arg(long)]
        offline: bool,
    },
    /// Print equivalence groups of an exported graph
    Groups {
        /// Directory holding the exported CSV tables
        dir: PathBuf,
    },
    /// Show node and edge counts of an exported graph
    Stats {
        /// Directory holding the exported CSV tables
        dir: PathBuf,
    },
    /// Print timelines of an exported graph
    Timeline {
        /// Directory holding the exported CSV tables
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if args.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    match args.command {
        Command::Build {
            input,
            output,
            offline,
        } => {
            let config = if let Some(path) = &args.config {
                Config::from_file(path)?
            } else {
                Config::load()?
            };
            tracing::info!(
                llm_model = %config.llm.model,
                embedding_model = %config.embedding.model,
                offline,
                "Configuration loaded"
            );
            cli::run_build(config, input, output, offline, args.json).await
        }
        Command::Groups { dir } => cli::run_groups(dir, args.json),
        Command::Stats { dir } => cli::run_stats(dir, args.json),
        Command::Timeline { dir } => cli::run_timeline(dir, args.json),
    }
}
