use rust_decimal::Decimal;
use thiserror::Error;
use volbot_models::{AmountError, Network};
use volbot_venue::{RetryError, VenueError};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TradeError {
    #[error("No tracked asset configured")]
    NoAssetConfigured,

    #[error("Deactivate automatic trading before manual trading")]
    AutomationActive,

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        required: Decimal,
        available: Decimal,
    },

    #[error("Venue still rate limiting after {attempts} attempts: {last}")]
    ExhaustedRetries { attempts: u32, last: VenueError },

    #[error("Venue error: {0}")]
    Venue(VenueError),

    #[error("Agent {0} is not active")]
    AgentInactive(String),

    #[error("Agent {0} is already trading")]
    AgentBusy(String),

    #[error("Agent {0} has a manual trade in progress")]
    ManualTradeInProgress(String),

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("No faucet on {0:?}")]
    FaucetUnavailable(Network),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

impl From<RetryError> for TradeError {
    fn from(e: RetryError) -> Self {
        match e {
            RetryError::Exhausted { attempts, last } => {
                TradeError::ExhaustedRetries { attempts, last }
            }
            RetryError::Venue(e) => TradeError::Venue(e),
        }
    }
}

impl From<AmountError> for TradeError {
    fn from(e: AmountError) -> Self {
        TradeError::InvalidAmount(e.to_string())
    }
}
