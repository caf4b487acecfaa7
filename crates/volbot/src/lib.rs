//! volbot - multi-agent volume trading bot
//!
//! Independently configured agents run fixed strategies against a trading venue. Trades go
//! through a retrying, degrading pipeline, are priced by a cached oracle and end up in a
//! deduplicated ledger.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use volbot::engine::{Fleet, TradeOrigin};
//! use volbot::ledger::TradeLedger;
//! use volbot::models::{StrategyKind, TrackedAsset, VolbotConfig};
//! use volbot::venue::{PaperVenue, VenueGateway};
//! ```

pub use volbot_cache as cache;
pub use volbot_engine as engine;
pub use volbot_ledger as ledger;
pub use volbot_models as models;
pub use volbot_venue as venue;

use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::{info, warn};
use volbot_engine::Fleet;
use volbot_ledger::TradeLedger;
use volbot_models::{Network, VolbotConfig};
use volbot_venue::{PaperVenue, VenueGateway};

/// Build the venue client for the configured network.
///
/// Only the paper venue is built in. Devnet and mainnet need an external `VenueGateway`
/// passed to `Fleet::from_config` directly.
pub fn build_venue(config: &VolbotConfig) -> Result<Arc<dyn VenueGateway>, anyhow::Error> {
    match config.venue.network {
        Network::Paper => {
            let mut venue = PaperVenue::new();
            if let Some(asset) = &config.tracked_asset {
                let paper = &config.venue.paper;
                venue = venue
                    .with_pool(asset, paper.native_reserve, paper.asset_reserve)
                    .context("Invalid paper pool reserves")?;
            }
            Ok(Arc::new(venue))
        }
        network => bail!("No built-in venue client for {network:?}; only paper trading is supported"),
    }
}

/// Build a Fleet from configuration.
pub async fn build_fleet(config: &VolbotConfig) -> Result<Fleet, anyhow::Error> {
    let venue = build_venue(config)?;
    let ledger = Arc::new(TradeLedger::open(&config.ledger.path).await);
    Ok(Fleet::from_config(venue, ledger, config))
}

/// Fund paper agents and activate the agents marked active.
///
/// Agents that fail to activate are logged and left inactive.
pub async fn start_fleet(fleet: &Fleet, config: &VolbotConfig) -> Result<(), anyhow::Error> {
    if config.venue.network == Network::Paper && !config.venue.paper.starting_native.is_zero() {
        for spec in &config.agents {
            fleet
                .airdrop(&spec.id, config.venue.paper.starting_native)
                .await
                .with_context(|| format!("Failed to fund paper agent {}", spec.id))?;
        }
    }

    for spec in config.agents.iter().filter(|s| s.active) {
        if let Err(e) = fleet.activate(&spec.id) {
            warn!(agent = %spec.id, error = %e, "agent not activated");
        }
    }

    info!(
        agents = config.agents.len(),
        active = fleet.agents().iter().filter(|a| a.is_active()).count(),
        "fleet started"
    );
    Ok(())
}
