//! Imali CLI — the main entry point.
//!
//! Commands:
//! - `serve`    — Start the HTTP prediction server
//! - `ask`      — Answer one query through the full pipeline
//! - `retrieve` — Show which playbook strategies a query selects
//! - `doctor`   — Diagnose config, playbook and backend

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "imali",
    about = "Imali-Bot — playbook RAG prediction server for financial queries",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ~/.imali/config.toml)
    #[arg(short, long, global = true, env = "IMALI_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP prediction server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,

        /// Override the bind address
        #[arg(long)]
        host: Option<String>,
    },

    /// Answer a single query and exit
    Ask {
        /// The financial question
        query: String,

        /// Print the response as JSON, as `/predict` would return it
        #[arg(long)]
        json: bool,
    },

    /// Print the playbook strategies selected for a query (no generation)
    Retrieve {
        /// The financial question
        query: String,
    },

    /// Diagnose system health
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing. Logs go to stderr so command output stays clean.
    let filter = if cli.verbose { "debug" } else { "info" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false);

    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Serve { port, host } => commands::serve::run(config_path, port, host).await?,
        Commands::Ask { query, json } => commands::ask::run(config_path, &query, json).await?,
        Commands::Retrieve { query } => commands::retrieve::run(config_path, &query)?,
        Commands::Doctor => commands::doctor::run(config_path).await?,
    }

    Ok(())
}
