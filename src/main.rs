use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rdfmap::config::Config;
use rdfmap::engine::OverlayEngine;
use rdfmap::ingest::{HttpFeedClient, IngestService};

#[derive(Parser, Debug)]
#[command(
    name = "rdfmap",
    about = "Decaying line-of-position overlay engine for RDF caller events."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the ingestion loop and decay sweep
    Run {
        /// Config file (default: $RDFMAP_CONFIG or ./rdfmap.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Load and print the resolved configuration, then exit
    CheckConfig {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_env("RDFMAP_LOG")
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run { config } => {
            let config = Config::load_or_default(config.as_deref())?;
            run(config).await
        }
        Command::CheckConfig { config } => {
            let config = Config::load_or_default(config.as_deref())?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn run(config: Config) -> Result<()> {
    info!(
        "Starting rdfmap: events from {} every {}s, decay TTL {}s",
        config.event_url, config.event_poll_secs, config.decay_ttl_secs
    );

    let engine = Arc::new(OverlayEngine::new(&config));
    let feed = Arc::new(HttpFeedClient::new(&config)?);
    let ingest = IngestService::new(
        Arc::clone(&engine),
        feed.clone(),
        feed,
        &config,
    );

    let sweep = Arc::clone(&engine).start_sweep(config.sweep_interval());

    tokio::select! {
        _ = ingest.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    sweep.abort();
    Ok(())
}
