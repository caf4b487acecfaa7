use std::time::Duration;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::asset::TrackedAsset;
use crate::strategy::{StrategyKind, StrategyProfile};

/// Top-level configuration for volbot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VolbotConfig {
    #[serde(default)]
    pub venue: VenueConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Asset every agent trades. Trading is refused until one is set.
    #[serde(default)]
    pub tracked_asset: Option<TrackedAsset>,
    #[serde(default)]
    pub agents: Vec<AgentSpec>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    /// In-process simulated venue.
    #[default]
    Paper,
    Devnet,
    Mainnet,
}

impl Network {
    /// Whether faucet airdrops exist on this network.
    pub fn has_faucet(&self) -> bool {
        !matches!(self, Network::Mainnet)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VenueConfig {
    #[serde(default)]
    pub network: Network,
    #[serde(default)]
    pub paper: PaperVenueConfig,
}

/// Pool depth and funding of the paper venue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaperVenueConfig {
    #[serde(default = "default_native_reserve")]
    pub native_reserve: Decimal,
    #[serde(default = "default_asset_reserve")]
    pub asset_reserve: Decimal,
    /// Native funds airdropped to every agent at start-up.
    #[serde(default = "default_starting_native")]
    pub starting_native: Decimal,
}

fn default_native_reserve() -> Decimal {
    Decimal::from(1_000)
}

fn default_asset_reserve() -> Decimal {
    Decimal::from(1_000_000_000)
}

fn default_starting_native() -> Decimal {
    Decimal::from(5)
}

impl Default for PaperVenueConfig {
    fn default() -> Self {
        Self {
            native_reserve: default_native_reserve(),
            asset_reserve: default_asset_reserve(),
            starting_native: default_starting_native(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerConfig {
    /// Path of the JSON trade history file.
    #[serde(default = "default_ledger_path")]
    pub path: String,
}

fn default_ledger_path() -> String {
    "data/trades.json".to_string()
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: default_ledger_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OracleConfig {
    /// How long a venue quote is served from cache.
    #[serde(default = "default_oracle_ttl")]
    pub ttl_seconds: u64,
    #[serde(default = "default_oracle_capacity")]
    pub max_capacity: u64,
}

fn default_oracle_ttl() -> u64 {
    60
}

fn default_oracle_capacity() -> u64 {
    1_000
}

impl OracleConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_oracle_ttl(),
            max_capacity: default_oracle_capacity(),
        }
    }
}

/// Backoff parameters for rate-limited venue calls. Read-only once built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    initial_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, backoff_multiplier: f64) -> Self {
        Self {
            max_attempts,
            initial_delay_ms: initial_delay.as_millis() as u64,
            backoff_multiplier,
        }
    }

    /// Total attempts, never less than one.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Multiplier applied to the delay after each rate-limited attempt, clamped to [1, 10].
    pub fn backoff_multiplier(&self) -> f64 {
        if self.backoff_multiplier.is_finite() {
            self.backoff_multiplier.clamp(1.0, 10.0)
        } else {
            default_backoff_multiplier()
        }
    }

    pub fn next_delay(&self, current: Duration) -> Duration {
        current.mul_f64(self.backoff_multiplier())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

/// Per-agent trading parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    /// Slippage tolerance in percent.
    #[serde(default = "default_slippage_pct")]
    pub slippage_pct: Decimal,
    /// Largest single buy, in native units. Also the size of the immediate strategy's buy.
    #[serde(default = "default_max_buy")]
    pub max_buy: Decimal,
    /// Sells are skipped while the price is below this. Zero disables the check.
    #[serde(default)]
    pub min_sell_price: Decimal,
    /// Overrides the strategy's own firing interval.
    #[serde(default)]
    pub trade_interval_secs: Option<u64>,
    #[serde(default)]
    pub support_price: Option<Decimal>,
    #[serde(default)]
    pub profit_price: Option<Decimal>,
}

fn default_slippage_pct() -> Decimal {
    Decimal::new(5, 1)
}

fn default_max_buy() -> Decimal {
    Decimal::new(10, 1)
}

impl AgentConfig {
    /// Slippage tolerance in basis points.
    pub fn slippage_bps(&self) -> u16 {
        (self.slippage_pct * Decimal::from(100))
            .round()
            .to_u16()
            .unwrap_or(u16::MAX)
    }

    /// The strategy profile with this agent's interval override applied.
    pub fn profile_for(&self, strategy: StrategyKind) -> StrategyProfile {
        let profile = strategy.profile();
        match self.trade_interval_secs {
            Some(secs) if secs > 0 => profile.with_interval(Duration::from_secs(secs)),
            _ => profile,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            slippage_pct: default_slippage_pct(),
            max_buy: default_max_buy(),
            min_sell_price: Decimal::ZERO,
            trade_interval_secs: None,
            support_price: None,
            profit_price: None,
        }
    }
}

/// An agent declared in configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentSpec {
    pub id: String,
    pub strategy: StrategyKind,
    /// Activate automatic trading at start-up.
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub config: AgentConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn roundtrip_volbot_config() {
        let config = VolbotConfig {
            tracked_asset: Some(TrackedAsset::new("mint", 6)),
            agents: vec![AgentSpec {
                id: "sniper".to_string(),
                strategy: StrategyKind::Immediate,
                active: true,
                config: AgentConfig::default(),
            }],
            ..Default::default()
        };

        let json = serde_json::to_string(&config).unwrap();
        let deserialized: VolbotConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn agent_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.slippage_pct, dec!(0.5));
        assert_eq!(config.max_buy, dec!(1.0));
        assert_eq!(config.min_sell_price, Decimal::ZERO);
        assert_eq!(config.slippage_bps(), 50);
    }

    #[test]
    fn retry_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 5);
        assert_eq!(policy.initial_delay(), Duration::from_millis(500));
        assert_eq!(
            policy.next_delay(Duration::from_millis(500)),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn retry_policy_is_sanitised() {
        let policy = RetryPolicy::new(0, Duration::from_millis(10), -3.0);
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.backoff_multiplier(), 1.0);
    }

    #[test]
    fn interval_override() {
        let config = AgentConfig {
            trade_interval_secs: Some(7),
            ..Default::default()
        };
        assert_eq!(
            config.profile_for(StrategyKind::Periodic2).interval(),
            Some(Duration::from_secs(7))
        );
        assert_eq!(
            AgentConfig::default()
                .profile_for(StrategyKind::Periodic2)
                .interval(),
            Some(Duration::from_secs(60))
        );
    }

    #[test]
    fn mainnet_has_no_faucet() {
        assert!(Network::Paper.has_faucet());
        assert!(Network::Devnet.has_faucet());
        assert!(!Network::Mainnet.has_faucet());
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config: VolbotConfig = toml::from_str("").unwrap();
        assert_eq!(config, VolbotConfig::default());
        assert_eq!(config.ledger.path, "data/trades.json");
        assert_eq!(config.oracle.ttl_seconds, 60);
    }

    #[test]
    fn config_from_toml() {
        let toml_str = r#"
tracked_asset = { id = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v", decimals = 6 }

[venue]
network = "devnet"

[ledger]
path = "/tmp/trades.json"

[retry]
max_attempts = 3
initial_delay_ms = 100

[[agents]]
id = "sniper"
strategy = "immediate"
active = true

[agents.config]
max_buy = "2.5"

[[agents]]
id = "support"
strategy = "periodic_5"

[agents.config]
support_price = "0.0000009"
trade_interval_secs = 15
"#;

        let config: VolbotConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.venue.network, Network::Devnet);
        assert_eq!(config.ledger.path, "/tmp/trades.json");
        assert_eq!(config.retry.max_attempts(), 3);
        assert_eq!(config.retry.backoff_multiplier(), 2.0);
        assert_eq!(config.tracked_asset.unwrap().decimals, 6);
        assert_eq!(config.agents.len(), 2);
        assert!(config.agents[0].active);
        assert_eq!(config.agents[0].config.max_buy, dec!(2.5));
        assert_eq!(config.agents[0].config.slippage_pct, dec!(0.5));
        assert!(!config.agents[1].active);
        assert_eq!(config.agents[1].config.support_price, Some(dec!(0.0000009)));
        assert_eq!(config.agents[1].config.trade_interval_secs, Some(15));
    }
}
