use std::sync::Arc;

use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, warn};
use volbot_models::{
    from_raw_amount, AssetId, OracleConfig, PriceQuote, RetryPolicy, TrackedAsset,
    NATIVE_DECIMALS,
};
use volbot_venue::{execute_with_retry, VenueGateway};

use crate::error::OracleError;
use crate::memory::MemoryCache;

/// Price estimate, in native units per token, used when the venue cannot quote.
pub const NOMINAL_PRICE: Decimal = Decimal::from_parts(1, 0, 0, false, 6);

/// Slippage used for quote-only route requests.
const QUOTE_SLIPPAGE_BPS: u16 = 50;

/// Nominal price with up to 5% jitter either way.
pub fn fallback_price() -> Decimal {
    let jitter = rand::thread_rng().gen_range(-0.05..0.05);
    let factor = Decimal::from_f64(1.0 + jitter).unwrap_or(Decimal::ONE);
    (NOMINAL_PRICE * factor).round_dp(12)
}

/// Cached price lookup for tracked assets, shared by every agent.
///
/// Venue quotes are cached per asset for the configured TTL. When the venue cannot quote,
/// a fallback estimate is served and nothing is cached, so the next call tries the venue again.
pub struct PriceOracle {
    venue: Arc<dyn VenueGateway>,
    retry: RetryPolicy,
    cache: MemoryCache<AssetId, PriceQuote>,
}

impl PriceOracle {
    pub fn new(venue: Arc<dyn VenueGateway>, retry: RetryPolicy, config: &OracleConfig) -> Self {
        Self {
            venue,
            retry,
            cache: MemoryCache::new(config.max_capacity, config.ttl()),
        }
    }

    /// Current price of one whole unit of `asset`. Never fails.
    pub async fn get_price(&self, asset: &TrackedAsset) -> PriceQuote {
        match self
            .cache
            .try_get_with(asset.id.clone(), self.quote_from_venue(asset))
            .await
        {
            Ok(quote) => quote,
            Err(e) => {
                let quote = PriceQuote::fallback(fallback_price());
                warn!(asset = %asset.id, error = %e, price = %quote.value, "price lookup failed, using fallback estimate");
                quote
            }
        }
    }

    /// Drop the cached quote for `asset`.
    pub async fn invalidate(&self, asset: &AssetId) {
        self.cache.invalidate(asset).await;
    }

    async fn quote_from_venue(&self, asset: &TrackedAsset) -> Result<PriceQuote, OracleError> {
        let native = AssetId::native();
        let amount = asset.one_unit_raw();
        let route = execute_with_retry(&self.retry, || {
            self.venue
                .find_route(&asset.id, &native, amount, QUOTE_SLIPPAGE_BPS)
        })
        .await?;

        let native_out = from_raw_amount(route.out_amount, NATIVE_DECIMALS);
        let tokens_in = from_raw_amount(route.in_amount, asset.decimals);
        let value = native_out
            .checked_div(tokens_in)
            .unwrap_or(Decimal::ZERO);
        if value <= Decimal::ZERO {
            return Err(OracleError::NonPositive(value));
        }

        debug!(asset = %asset.id, price = %value, "quoted price from venue");
        Ok(PriceQuote::from_venue(value))
    }
}
