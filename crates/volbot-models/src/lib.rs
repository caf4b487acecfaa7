pub mod asset;
pub mod config;
pub mod quote;
pub mod strategy;
pub mod trade_record;

pub use asset::{
    from_raw_amount, to_raw_amount, AccountId, AmountError, AssetId, TrackedAsset,
    NATIVE_DECIMALS,
};
pub use config::{
    AgentConfig, AgentSpec, LedgerConfig, Network, OracleConfig, PaperVenueConfig, RetryPolicy,
    VenueConfig, VolbotConfig,
};
pub use quote::{PriceQuote, QuoteSource};
pub use strategy::{SizeRange, StrategyKind, StrategyProfile};
pub use trade_record::{TradeRecord, TradeSide, TradeStatus};
