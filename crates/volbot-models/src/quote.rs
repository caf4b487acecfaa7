use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteSource {
    /// Realized rate of a route the venue quoted.
    Venue,
    /// Synthetic estimate used when the venue could not quote.
    Fallback,
}

/// Price of one whole unit of the tracked asset, in native units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub value: Decimal,
    pub observed_at: DateTime<Utc>,
    pub source: QuoteSource,
}

impl PriceQuote {
    pub fn from_venue(value: Decimal) -> Self {
        Self {
            value,
            observed_at: Utc::now(),
            source: QuoteSource::Venue,
        }
    }

    pub fn fallback(value: Decimal) -> Self {
        Self {
            value,
            observed_at: Utc::now(),
            source: QuoteSource::Fallback,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == QuoteSource::Fallback
    }

    /// True when the quote came from the venue and is strictly positive.
    pub fn is_usable(&self) -> bool {
        !self.is_fallback() && self.value > Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn fallback_quotes_are_not_usable() {
        assert!(!PriceQuote::fallback(dec!(0.000001)).is_usable());
        assert!(PriceQuote::from_venue(dec!(0.000001)).is_usable());
        assert!(!PriceQuote::from_venue(Decimal::ZERO).is_usable());
    }

    #[test]
    fn source_serializes_snake_case() {
        let quote = PriceQuote::fallback(dec!(0.5));
        let json = serde_json::to_value(&quote).unwrap();
        assert_eq!(json["source"], "fallback");
        assert_eq!(json["value"], "0.5");
    }
}
