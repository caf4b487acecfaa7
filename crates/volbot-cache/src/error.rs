use rust_decimal::Decimal;
use thiserror::Error;

/// Why a venue quote could not be used. Never escapes the oracle.
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Venue quote failed: {0}")]
    Venue(#[from] volbot_venue::RetryError),

    #[error("Venue quoted a non-positive price: {0}")]
    NonPositive(Decimal),
}
