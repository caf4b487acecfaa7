use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use volbot_ledger::TradeLedger;
use volbot_models::VolbotConfig;

/// How often the run loop logs a fleet status line.
const STATUS_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser, Debug)]
#[command(name = "volbot", about = "Multi-agent volume trading bot")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/volbot.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the configured agents until Ctrl-C
    Run,
    /// Print the most recent trades from the ledger as JSON
    History {
        /// Number of records to print, newest first
        #[arg(short, long, default_value_t = 20)]
        limit: usize,

        /// Only show trades of this agent
        #[arg(short, long)]
        agent: Option<String>,

        /// Pretty-print the output JSON
        #[arg(long)]
        pretty: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_str = std::fs::read_to_string(&cli.config)
        .with_context(|| format!("Failed to read config: {}", cli.config))?;
    let config: VolbotConfig =
        toml::from_str(&config_str).with_context(|| "Failed to parse config")?;

    match cli.command {
        Command::Run => run(config).await,
        Command::History {
            limit,
            agent,
            pretty,
        } => history(config, limit, agent, pretty).await,
    }
}

async fn run(config: VolbotConfig) -> Result<()> {
    let fleet = volbot::build_fleet(&config)
        .await
        .context("Failed to build fleet")?;
    volbot::start_fleet(&fleet, &config).await?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Received shutdown signal");
            cancel.cancel();
        });
    }

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(STATUS_INTERVAL) => {
                let active = fleet.agents().iter().filter(|a| a.is_active()).count();
                let trades = fleet.pipeline().ledger().len().await;
                tracing::info!(active, trades, "fleet status");
            }
        }
    }

    fleet.shutdown().await;
    Ok(())
}

async fn history(
    config: VolbotConfig,
    limit: usize,
    agent: Option<String>,
    pretty: bool,
) -> Result<()> {
    let ledger = TradeLedger::open(&config.ledger.path).await;
    let records = match agent {
        Some(agent) => ledger.history_for(&agent, limit).await,
        None => ledger.history(limit).await,
    };

    let output = if pretty {
        serde_json::to_string_pretty(&records)?
    } else {
        serde_json::to_string(&records)?
    };
    println!("{output}");

    Ok(())
}
