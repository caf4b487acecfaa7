use std::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mint address of the venue's native settlement asset.
pub const NATIVE_MINT: &str = "So11111111111111111111111111111111111111112";
pub const NATIVE_DECIMALS: u8 = 9;

/// Largest decimal precision the raw/UI conversions accept.
pub const MAX_DECIMALS: u8 = 18;

/// Opaque identifier of an asset on the venue (a mint address on Solana-style venues).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn native() -> Self {
        Self(NATIVE_MINT.to_string())
    }

    pub fn is_native(&self) -> bool {
        self.0 == NATIVE_MINT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to an account (wallet) held at the venue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The asset agents trade against the native asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackedAsset {
    pub id: AssetId,
    pub decimals: u8,
}

impl TrackedAsset {
    pub fn new(id: impl Into<String>, decimals: u8) -> Self {
        Self {
            id: AssetId::new(id),
            decimals,
        }
    }

    /// One whole unit of the asset expressed in raw units.
    pub fn one_unit_raw(&self) -> u64 {
        10u64.saturating_pow(u32::from(self.decimals.min(MAX_DECIMALS)))
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AmountError {
    #[error("Amount cannot be negative: {0}")]
    Negative(Decimal),

    #[error("Amount {amount} with {decimals} decimals overflows u64")]
    Overflow { amount: Decimal, decimals: u8 },

    #[error("Unsupported decimal precision: {0}")]
    UnsupportedDecimals(u8),
}

/// Convert a UI (human readable) amount to raw integer units.
///
/// Fractions below one raw unit are truncated, so a positive amount can come back as zero;
/// callers decide whether that is a no-op or an error.
pub fn to_raw_amount(ui_amount: Decimal, decimals: u8) -> Result<u64, AmountError> {
    if ui_amount < Decimal::ZERO {
        return Err(AmountError::Negative(ui_amount));
    }
    if decimals > MAX_DECIMALS {
        return Err(AmountError::UnsupportedDecimals(decimals));
    }

    let overflow = || AmountError::Overflow {
        amount: ui_amount,
        decimals,
    };
    let multiplier = Decimal::from(10u64.pow(u32::from(decimals)));
    ui_amount
        .checked_mul(multiplier)
        .and_then(|raw| raw.trunc().to_u64())
        .ok_or_else(overflow)
}

/// Convert raw integer units back to a UI amount.
pub fn from_raw_amount(raw_amount: u64, decimals: u8) -> Decimal {
    Decimal::from_i128_with_scale(
        i128::from(raw_amount),
        u32::from(decimals.min(MAX_DECIMALS)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn native_asset_is_recognised() {
        assert!(AssetId::native().is_native());
        assert!(!AssetId::new("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v").is_native());
    }

    #[test]
    fn to_raw_converts_with_decimals() {
        assert_eq!(to_raw_amount(dec!(1.5), 9).unwrap(), 1_500_000_000);
        assert_eq!(to_raw_amount(dec!(0.000001), 6).unwrap(), 1);
        assert_eq!(to_raw_amount(Decimal::ZERO, 9).unwrap(), 0);
    }

    #[test]
    fn to_raw_truncates_dust() {
        assert_eq!(to_raw_amount(dec!(0.0000019), 6).unwrap(), 1);
        assert_eq!(to_raw_amount(dec!(0.0000000001), 9).unwrap(), 0);
    }

    #[test]
    fn to_raw_rejects_negative() {
        assert_eq!(
            to_raw_amount(dec!(-1), 9),
            Err(AmountError::Negative(dec!(-1)))
        );
    }

    #[test]
    fn to_raw_rejects_overflow() {
        let result = to_raw_amount(dec!(100000000000), 9);
        assert!(matches!(result, Err(AmountError::Overflow { .. })));
    }

    #[test]
    fn from_raw_restores_ui_amount() {
        assert_eq!(from_raw_amount(1_500_000_000, 9), dec!(1.5));
        assert_eq!(from_raw_amount(42, 0), dec!(42));
    }

    #[test]
    fn one_unit_raw_matches_decimals() {
        assert_eq!(TrackedAsset::new("mint", 6).one_unit_raw(), 1_000_000);
        assert_eq!(TrackedAsset::new("mint", 0).one_unit_raw(), 1);
    }
}
