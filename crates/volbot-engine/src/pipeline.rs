use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;
use volbot_cache::{PriceOracle, NOMINAL_PRICE};
use volbot_ledger::TradeLedger;
use volbot_models::{
    from_raw_amount, to_raw_amount, AccountId, AssetId, Network, PriceQuote, RetryPolicy,
    TrackedAsset, TradeRecord, TradeSide, TradeStatus, NATIVE_DECIMALS,
};
use volbot_venue::{execute_with_retry, Execution, RetryError, VenueError, VenueGateway};

use crate::agent::{Agent, TradeOrigin, TradePermit};
use crate::error::TradeError;

/// Share of the token balance sold when no usable price is available.
const FALLBACK_SELL_FRACTION: Decimal = Decimal::from_parts(1, 0, 0, false, 1);

enum Outcome {
    Executed(Execution),
    Rejected(VenueError),
    Simulated,
}

fn synthetic_id(prefix: &str) -> String {
    format!(
        "{prefix}_{}_{}",
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple()
    )
}

fn trade_record(
    agent: &Agent,
    side: TradeSide,
    native_amount: Decimal,
    token_amount: Decimal,
    outcome: Outcome,
) -> TradeRecord {
    let (status, transaction_id, error, simulated) = match outcome {
        Outcome::Executed(execution) => {
            (TradeStatus::Completed, execution.transaction_id, None, false)
        }
        Outcome::Rejected(e) => (
            TradeStatus::Failed,
            synthetic_id("failed"),
            Some(e.to_string()),
            false,
        ),
        Outcome::Simulated => (TradeStatus::Completed, synthetic_id("sim"), None, true),
    };

    TradeRecord {
        side,
        timestamp: Utc::now(),
        native_amount,
        token_amount,
        agent_id: agent.id().to_string(),
        strategy: agent.strategy(),
        status,
        transaction_id,
        error,
        simulated,
    }
}

/// Buy and sell operations for agents, shared by the scheduler and manual callers.
///
/// Every swap attempt ends in a ledger record. Route discovery failures become simulated
/// fills and execution failures become FAILED records; only precondition violations and
/// failed balance or account lookups are returned as errors.
pub struct TradePipeline {
    venue: Arc<dyn VenueGateway>,
    oracle: Arc<PriceOracle>,
    ledger: Arc<TradeLedger>,
    retry: RetryPolicy,
    network: Network,
}

impl TradePipeline {
    pub fn new(
        venue: Arc<dyn VenueGateway>,
        oracle: Arc<PriceOracle>,
        ledger: Arc<TradeLedger>,
        retry: RetryPolicy,
        network: Network,
    ) -> Self {
        Self {
            venue,
            oracle,
            ledger,
            retry,
            network,
        }
    }

    pub fn oracle(&self) -> &Arc<PriceOracle> {
        &self.oracle
    }

    pub fn ledger(&self) -> &Arc<TradeLedger> {
        &self.ledger
    }

    pub fn network(&self) -> Network {
        self.network
    }

    async fn with_retry<T, F, Fut>(&self, operation: F) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, VenueError>>,
    {
        execute_with_retry(&self.retry, operation).await
    }

    /// Spend `native_amount` of the native asset on the tracked asset.
    pub async fn buy(
        &self,
        agent: &Agent,
        native_amount: Decimal,
        origin: TradeOrigin,
    ) -> Result<TradeRecord, TradeError> {
        let asset = agent
            .tracked_asset()
            .ok_or(TradeError::NoAssetConfigured)?;
        let _permit = agent.enter(origin).await?;
        self.execute_buy(agent, &asset, native_amount).await
    }

    /// Sell tokens worth roughly `native_amount` at the current price.
    ///
    /// Returns `Ok(None)` when there is nothing to sell or the price is under the agent's
    /// minimum sell price.
    pub async fn sell(
        &self,
        agent: &Agent,
        native_amount: Decimal,
        origin: TradeOrigin,
    ) -> Result<Option<TradeRecord>, TradeError> {
        let asset = agent
            .tracked_asset()
            .ok_or(TradeError::NoAssetConfigured)?;
        let _permit = agent.enter(origin).await?;
        self.execute_sell(agent, &asset, native_amount).await
    }

    /// Sell up to `token_amount` of the tracked asset, clamped to the venue balance.
    pub async fn sell_tokens(
        &self,
        agent: &Agent,
        token_amount: Decimal,
        origin: TradeOrigin,
    ) -> Result<Option<TradeRecord>, TradeError> {
        let asset = agent
            .tracked_asset()
            .ok_or(TradeError::NoAssetConfigured)?;
        let _permit = agent.enter(origin).await?;
        self.execute_sell_tokens(agent, &asset, token_amount).await
    }

    pub(crate) async fn buy_with_permit(
        &self,
        agent: &Agent,
        _permit: &TradePermit,
        native_amount: Decimal,
    ) -> Result<TradeRecord, TradeError> {
        let asset = agent
            .tracked_asset()
            .ok_or(TradeError::NoAssetConfigured)?;
        self.execute_buy(agent, &asset, native_amount).await
    }

    pub(crate) async fn sell_with_permit(
        &self,
        agent: &Agent,
        _permit: &TradePermit,
        native_amount: Decimal,
    ) -> Result<Option<TradeRecord>, TradeError> {
        let asset = agent
            .tracked_asset()
            .ok_or(TradeError::NoAssetConfigured)?;
        self.execute_sell(agent, &asset, native_amount).await
    }

    /// Sell `fraction` of the current token balance.
    pub(crate) async fn sell_fraction_with_permit(
        &self,
        agent: &Agent,
        _permit: &TradePermit,
        fraction: Decimal,
    ) -> Result<Option<TradeRecord>, TradeError> {
        let asset = agent
            .tracked_asset()
            .ok_or(TradeError::NoAssetConfigured)?;
        let balance = self.token_balance_raw(agent, &asset).await?;
        let tokens = from_raw_amount(balance, asset.decimals) * fraction;
        self.execute_sell_tokens(agent, &asset, tokens).await
    }

    /// Current price of the asset the agent trades.
    pub async fn price(&self, agent: &Agent) -> Result<PriceQuote, TradeError> {
        let asset = agent
            .tracked_asset()
            .ok_or(TradeError::NoAssetConfigured)?;
        Ok(self.oracle.get_price(&asset).await)
    }

    async fn execute_buy(
        &self,
        agent: &Agent,
        asset: &TrackedAsset,
        native_amount: Decimal,
    ) -> Result<TradeRecord, TradeError> {
        let lamports = to_raw_amount(native_amount, NATIVE_DECIMALS)?;
        if lamports == 0 {
            return Err(TradeError::InvalidAmount(format!(
                "buy amount must be positive, got {native_amount}"
            )));
        }

        let available = self
            .with_retry(|| self.venue.native_balance(agent.account()))
            .await?;
        if available < lamports {
            return Err(TradeError::InsufficientBalance {
                required: native_amount,
                available: from_raw_amount(available, NATIVE_DECIMALS),
            });
        }

        self.ensure_asset_account(agent, asset).await?;

        let slippage_bps = agent.config().slippage_bps();
        let native = AssetId::native();
        let route = match self
            .with_retry(|| {
                self.venue
                    .find_route(&native, &asset.id, lamports, slippage_bps)
            })
            .await
        {
            Ok(route) => route,
            Err(e) => {
                warn!(agent = %agent.id(), error = %e, amount = %native_amount, "no buy route, recording simulated fill");
                let tokens = native_amount / NOMINAL_PRICE;
                let record = trade_record(
                    agent,
                    TradeSide::Buy,
                    native_amount,
                    tokens,
                    Outcome::Simulated,
                );
                self.ledger.append(record.clone()).await;
                return Ok(record);
            }
        };

        let tokens = from_raw_amount(route.out_amount, asset.decimals);
        let outcome = match self
            .with_retry(|| self.venue.execute_route(agent.account(), &route))
            .await
        {
            Ok(execution) => {
                agent.set_token_balance_hint(agent.token_balance_hint() + tokens);
                Outcome::Executed(execution)
            }
            Err(e) => Outcome::Rejected(e.venue_error().clone()),
        };
        let record = trade_record(agent, TradeSide::Buy, native_amount, tokens, outcome);
        log_outcome(&record);

        self.ledger.append(record.clone()).await;
        Ok(record)
    }

    async fn execute_sell(
        &self,
        agent: &Agent,
        asset: &TrackedAsset,
        native_amount: Decimal,
    ) -> Result<Option<TradeRecord>, TradeError> {
        if native_amount < Decimal::ZERO {
            return Err(TradeError::InvalidAmount(format!(
                "sell amount must not be negative, got {native_amount}"
            )));
        }

        let balance_raw = self.token_balance_raw(agent, asset).await?;
        let balance = from_raw_amount(balance_raw, asset.decimals);
        let quote = self.oracle.get_price(asset).await;
        let config = agent.config();

        let tokens = if quote.is_usable() {
            if config.min_sell_price > Decimal::ZERO && quote.value < config.min_sell_price {
                info!(
                    agent = %agent.id(),
                    price = %quote.value,
                    min_sell_price = %config.min_sell_price,
                    "price below minimum sell price, not selling"
                );
                return Ok(None);
            }
            native_amount
                .checked_div(quote.value)
                .unwrap_or(balance)
                .min(balance)
        } else {
            warn!(agent = %agent.id(), "price unavailable, selling a tenth of the balance");
            balance * FALLBACK_SELL_FRACTION
        };

        self.execute_sell_tokens(agent, asset, tokens).await
    }

    async fn execute_sell_tokens(
        &self,
        agent: &Agent,
        asset: &TrackedAsset,
        token_amount: Decimal,
    ) -> Result<Option<TradeRecord>, TradeError> {
        if token_amount <= Decimal::ZERO {
            debug!(agent = %agent.id(), requested = %token_amount, "nothing to sell");
            return Ok(None);
        }
        let balance = self.token_balance_raw(agent, asset).await?;
        let clamped = token_amount.min(from_raw_amount(balance, asset.decimals));
        let amount = to_raw_amount(clamped, asset.decimals)?;
        if amount == 0 {
            debug!(agent = %agent.id(), requested = %token_amount, "nothing to sell");
            return Ok(None);
        }
        let tokens = from_raw_amount(amount, asset.decimals);

        let slippage_bps = agent.config().slippage_bps();
        let native = AssetId::native();
        let route = match self
            .with_retry(|| {
                self.venue
                    .find_route(&asset.id, &native, amount, slippage_bps)
            })
            .await
        {
            Ok(route) => route,
            Err(e) => {
                warn!(agent = %agent.id(), error = %e, tokens = %tokens, "no sell route, recording simulated fill");
                let record = trade_record(
                    agent,
                    TradeSide::Sell,
                    tokens * NOMINAL_PRICE,
                    tokens,
                    Outcome::Simulated,
                );
                self.ledger.append(record.clone()).await;
                return Ok(Some(record));
            }
        };

        let received = from_raw_amount(route.out_amount, NATIVE_DECIMALS);
        let outcome = match self
            .with_retry(|| self.venue.execute_route(agent.account(), &route))
            .await
        {
            Ok(execution) => {
                agent.set_token_balance_hint(from_raw_amount(balance - amount, asset.decimals));
                Outcome::Executed(execution)
            }
            Err(e) => Outcome::Rejected(e.venue_error().clone()),
        };
        let record = trade_record(agent, TradeSide::Sell, received, tokens, outcome);
        log_outcome(&record);

        self.ledger.append(record.clone()).await;
        Ok(Some(record))
    }

    /// Make sure the agent can receive the asset. Provisioning failures are tolerated
    /// because the swap provisions implicitly.
    async fn ensure_asset_account(
        &self,
        agent: &Agent,
        asset: &TrackedAsset,
    ) -> Result<(), TradeError> {
        let existing = self
            .with_retry(|| self.venue.asset_account(agent.account(), &asset.id))
            .await?;
        if existing.is_some() {
            return Ok(());
        }

        match self
            .with_retry(|| {
                self.venue
                    .provision_asset_account(agent.account(), &asset.id)
            })
            .await
        {
            Ok(account) => {
                info!(agent = %agent.id(), address = %account.address, "provisioned asset account")
            }
            Err(e) => {
                warn!(agent = %agent.id(), error = %e, "asset account provisioning failed, continuing")
            }
        }
        Ok(())
    }

    async fn token_balance_raw(
        &self,
        agent: &Agent,
        asset: &TrackedAsset,
    ) -> Result<u64, TradeError> {
        let account = self
            .with_retry(|| self.venue.asset_account(agent.account(), &asset.id))
            .await?;
        let balance = account.map(|a| a.balance).unwrap_or(0);
        agent.set_token_balance_hint(from_raw_amount(balance, asset.decimals));
        Ok(balance)
    }

    /// Tracked-asset balance at the venue. Refreshes the agent's balance hint.
    pub async fn token_balance(&self, agent: &Agent) -> Result<Decimal, TradeError> {
        let asset = agent
            .tracked_asset()
            .ok_or(TradeError::NoAssetConfigured)?;
        let balance = self.token_balance_raw(agent, &asset).await?;
        Ok(from_raw_amount(balance, asset.decimals))
    }

    pub async fn native_balance(&self, agent: &Agent) -> Result<Decimal, TradeError> {
        let balance = self
            .with_retry(|| self.venue.native_balance(agent.account()))
            .await?;
        Ok(from_raw_amount(balance, NATIVE_DECIMALS))
    }

    /// Request faucet funds for the agent. Test networks only.
    pub async fn airdrop(&self, agent: &Agent, amount: Decimal) -> Result<Execution, TradeError> {
        if !self.network.has_faucet() {
            return Err(TradeError::FaucetUnavailable(self.network));
        }
        let lamports = to_raw_amount(amount, NATIVE_DECIMALS)?;
        let execution = self
            .with_retry(|| self.venue.request_faucet_funds(agent.account(), lamports))
            .await?;
        info!(agent = %agent.id(), amount = %amount, tx = %execution.transaction_id, "airdrop received");
        Ok(execution)
    }

    pub async fn send_native(
        &self,
        agent: &Agent,
        to: &AccountId,
        amount: Decimal,
    ) -> Result<Execution, TradeError> {
        let lamports = to_raw_amount(amount, NATIVE_DECIMALS)?;
        let execution = self
            .with_retry(|| self.venue.transfer_native(agent.account(), to, lamports))
            .await?;
        info!(agent = %agent.id(), to = %to, amount = %amount, tx = %execution.transaction_id, "native transfer sent");
        Ok(execution)
    }

    pub async fn send_tokens(
        &self,
        agent: &Agent,
        to: &AccountId,
        amount: Decimal,
    ) -> Result<Execution, TradeError> {
        let asset = agent
            .tracked_asset()
            .ok_or(TradeError::NoAssetConfigured)?;
        let raw = to_raw_amount(amount, asset.decimals)?;
        let execution = self
            .with_retry(|| {
                self.venue
                    .transfer_asset(agent.account(), to, &asset.id, raw)
            })
            .await?;
        info!(agent = %agent.id(), to = %to, amount = %amount, tx = %execution.transaction_id, "token transfer sent");
        self.token_balance_raw(agent, &asset).await?;
        Ok(execution)
    }
}

fn log_outcome(record: &TradeRecord) {
    match record.status {
        TradeStatus::Completed => info!(
            agent = %record.agent_id,
            side = ?record.side,
            native = %record.native_amount,
            tokens = %record.token_amount,
            tx = %record.transaction_id,
            "trade completed"
        ),
        TradeStatus::Failed => warn!(
            agent = %record.agent_id,
            side = ?record.side,
            native = %record.native_amount,
            error = record.error.as_deref().unwrap_or_default(),
            "trade failed"
        ),
    }
}
