use thiserror::Error;
use volbot_models::AssetId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VenueError {
    #[error("Rate limited by venue")]
    RateLimited,

    #[error("No route from {from} to {to}")]
    NoRoute { from: AssetId, to: AssetId },

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Execution rejected: {0}")]
    Rejected(String),

    #[error("Venue unavailable: {0}")]
    Unavailable(String),

    #[error("Not supported by this venue: {0}")]
    Unsupported(String),
}

impl VenueError {
    /// Only rate limiting is worth retrying.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, VenueError::RateLimited)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RetryError {
    #[error("Gave up after {attempts} rate-limited attempts: {last}")]
    Exhausted { attempts: u32, last: VenueError },

    #[error(transparent)]
    Venue(#[from] VenueError),
}

impl RetryError {
    /// The underlying venue error, whichever way the call failed.
    pub fn venue_error(&self) -> &VenueError {
        match self {
            RetryError::Exhausted { last, .. } => last,
            RetryError::Venue(e) => e,
        }
    }
}
