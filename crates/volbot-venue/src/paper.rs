use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;
use volbot_models::{to_raw_amount, AccountId, AmountError, AssetId, TrackedAsset, NATIVE_DECIMALS};

use crate::error::VenueError;
use crate::gateway::{AssetAccount, Execution, Route, VenueGateway};

/// Constant-product pool between the native asset and one tracked asset. Reserves are raw units.
#[derive(Debug, Clone, Copy)]
struct Pool {
    native_reserve: u64,
    asset_reserve: u64,
}

impl Pool {
    /// Output for `amount_in` under `x * y = k`, without fees.
    fn quote(reserve_in: u64, reserve_out: u64, amount_in: u64) -> u64 {
        let (x, y, dx) = (
            u128::from(reserve_in),
            u128::from(reserve_out),
            u128::from(amount_in),
        );
        if x + dx == 0 {
            return 0;
        }
        u64::try_from(y * dx / (x + dx)).unwrap_or(u64::MAX)
    }
}

#[derive(Debug, Default)]
struct Faults {
    rate_limited_calls: u32,
    routes_disabled: bool,
    rejection: Option<String>,
    provisioning_fails: bool,
    latency: Duration,
}

#[derive(Debug, Default)]
struct PaperState {
    native: HashMap<AccountId, u64>,
    holdings: HashMap<(AccountId, AssetId), u64>,
    pools: HashMap<AssetId, Pool>,
    faults: Faults,
}

impl PaperState {
    /// Consume one injected rate-limit failure, if any are queued.
    fn take_rate_limit(&mut self) -> Result<(), VenueError> {
        if self.faults.rate_limited_calls > 0 {
            self.faults.rate_limited_calls -= 1;
            return Err(VenueError::RateLimited);
        }
        Ok(())
    }

    fn asset_account(&self, owner: &AccountId, asset: &AssetId) -> Option<AssetAccount> {
        self.holdings
            .get(&(owner.clone(), asset.clone()))
            .map(|balance| AssetAccount {
                address: format!("{owner}:{asset}"),
                owner: owner.clone(),
                asset: asset.clone(),
                balance: *balance,
            })
    }

    fn debit(&mut self, owner: &AccountId, asset: &AssetId, amount: u64) -> Result<(), VenueError> {
        let balance = if asset.is_native() {
            self.native.get_mut(owner)
        } else {
            self.holdings.get_mut(&(owner.clone(), asset.clone()))
        };
        let balance = match balance {
            Some(balance) if *balance >= amount => balance,
            Some(balance) => {
                return Err(VenueError::InsufficientFunds {
                    required: amount,
                    available: *balance,
                })
            }
            None => {
                return Err(VenueError::InsufficientFunds {
                    required: amount,
                    available: 0,
                })
            }
        };
        *balance -= amount;
        Ok(())
    }

    /// Credits create the receiving account on demand.
    fn credit(&mut self, owner: &AccountId, asset: &AssetId, amount: u64) {
        let balance = if asset.is_native() {
            self.native.entry(owner.clone()).or_insert(0)
        } else {
            self.holdings
                .entry((owner.clone(), asset.clone()))
                .or_insert(0)
        };
        *balance = balance.saturating_add(amount);
    }

    fn route(
        &self,
        from: &AssetId,
        to: &AssetId,
        amount: u64,
        slippage_bps: u16,
    ) -> Result<Route, VenueError> {
        let no_route = || VenueError::NoRoute {
            from: from.clone(),
            to: to.clone(),
        };
        if self.faults.routes_disabled || amount == 0 {
            return Err(no_route());
        }

        let out_amount = match (from.is_native(), to.is_native()) {
            (true, false) => {
                let pool = self.pools.get(to).ok_or_else(no_route)?;
                Pool::quote(pool.native_reserve, pool.asset_reserve, amount)
            }
            (false, true) => {
                let pool = self.pools.get(from).ok_or_else(no_route)?;
                Pool::quote(pool.asset_reserve, pool.native_reserve, amount)
            }
            _ => return Err(no_route()),
        };
        if out_amount == 0 {
            return Err(no_route());
        }

        let tolerance = u128::from(10_000u16.saturating_sub(slippage_bps));
        let min_out_amount = (u128::from(out_amount) * tolerance / 10_000) as u64;

        Ok(Route {
            from: from.clone(),
            to: to.clone(),
            in_amount: amount,
            out_amount,
            min_out_amount,
            slippage_bps,
        })
    }

    fn swap(&mut self, account: &AccountId, route: &Route) -> Result<(), VenueError> {
        let current = self.route(&route.from, &route.to, route.in_amount, route.slippage_bps)?;
        if current.out_amount < route.min_out_amount {
            return Err(VenueError::Rejected(
                "slippage tolerance exceeded".to_string(),
            ));
        }

        self.debit(account, &route.from, route.in_amount)?;
        self.credit(account, &route.to, current.out_amount);

        let (asset, native_in) = if route.from.is_native() {
            (&route.to, true)
        } else {
            (&route.from, false)
        };
        if let Some(pool) = self.pools.get_mut(asset) {
            if native_in {
                pool.native_reserve += route.in_amount;
                pool.asset_reserve -= current.out_amount;
            } else {
                pool.asset_reserve += route.in_amount;
                pool.native_reserve -= current.out_amount;
            }
        }
        Ok(())
    }
}

/// In-process venue backed by constant-product pools.
///
/// Used for paper trading and as the venue in tests. Failure modes can be injected
/// and call counts observed.
#[derive(Debug, Default)]
pub struct PaperVenue {
    state: Mutex<PaperState>,
    route_requests: AtomicUsize,
    balance_requests: AtomicUsize,
    executions: AtomicUsize,
}

impl PaperVenue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a pool for `asset`. Reserves are in UI units.
    pub fn with_pool(
        self,
        asset: &TrackedAsset,
        native_reserve: Decimal,
        asset_reserve: Decimal,
    ) -> Result<Self, AmountError> {
        let pool = Pool {
            native_reserve: to_raw_amount(native_reserve, NATIVE_DECIMALS)?,
            asset_reserve: to_raw_amount(asset_reserve, asset.decimals)?,
        };
        self.state().pools.insert(asset.id.clone(), pool);
        Ok(self)
    }

    fn state(&self) -> MutexGuard<'_, PaperState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn transaction_id() -> String {
        format!("paper_{}", Uuid::new_v4().simple())
    }

    pub fn set_native_balance(&self, account: &AccountId, raw: u64) {
        self.state().native.insert(account.clone(), raw);
    }

    pub fn set_asset_balance(&self, account: &AccountId, asset: &AssetId, raw: u64) {
        self.state()
            .holdings
            .insert((account.clone(), asset.clone()), raw);
    }

    pub fn native_balance_of(&self, account: &AccountId) -> u64 {
        self.state().native.get(account).copied().unwrap_or(0)
    }

    pub fn asset_balance_of(&self, account: &AccountId, asset: &AssetId) -> u64 {
        self.state()
            .holdings
            .get(&(account.clone(), asset.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Fail the next `calls` venue calls with a rate-limit error.
    pub fn fail_next_with_rate_limit(&self, calls: u32) {
        self.state().faults.rate_limited_calls = calls;
    }

    pub fn set_routes_enabled(&self, enabled: bool) {
        self.state().faults.routes_disabled = !enabled;
    }

    /// Reject every swap execution with `reason` until cleared with `None`.
    pub fn reject_executions(&self, reason: Option<&str>) {
        self.state().faults.rejection = reason.map(str::to_string);
    }

    pub fn set_provisioning_fails(&self, fails: bool) {
        self.state().faults.provisioning_fails = fails;
    }

    /// Delay applied to every swap execution.
    pub fn set_execution_latency(&self, latency: Duration) {
        self.state().faults.latency = latency;
    }

    pub fn route_requests(&self) -> usize {
        self.route_requests.load(Ordering::SeqCst)
    }

    pub fn balance_requests(&self) -> usize {
        self.balance_requests.load(Ordering::SeqCst)
    }

    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VenueGateway for PaperVenue {
    async fn native_balance(&self, account: &AccountId) -> Result<u64, VenueError> {
        self.balance_requests.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();
        state.take_rate_limit()?;
        Ok(state.native.get(account).copied().unwrap_or(0))
    }

    async fn asset_account(
        &self,
        account: &AccountId,
        asset: &AssetId,
    ) -> Result<Option<AssetAccount>, VenueError> {
        self.balance_requests.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();
        state.take_rate_limit()?;
        Ok(state.asset_account(account, asset))
    }

    async fn provision_asset_account(
        &self,
        account: &AccountId,
        asset: &AssetId,
    ) -> Result<AssetAccount, VenueError> {
        let mut state = self.state();
        state.take_rate_limit()?;
        if state.faults.provisioning_fails {
            return Err(VenueError::Unavailable(
                "account provisioning failed".to_string(),
            ));
        }
        state.credit(account, asset, 0);
        state
            .asset_account(account, asset)
            .ok_or_else(|| VenueError::AccountNotFound(account.to_string()))
    }

    async fn find_route(
        &self,
        from: &AssetId,
        to: &AssetId,
        amount: u64,
        slippage_bps: u16,
    ) -> Result<Route, VenueError> {
        self.route_requests.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();
        state.take_rate_limit()?;
        state.route(from, to, amount, slippage_bps)
    }

    async fn execute_route(
        &self,
        account: &AccountId,
        route: &Route,
    ) -> Result<Execution, VenueError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        let latency = {
            let mut state = self.state();
            state.take_rate_limit()?;
            state.faults.latency
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state();
        if let Some(reason) = &state.faults.rejection {
            return Err(VenueError::Rejected(reason.clone()));
        }
        state.swap(account, route)?;
        let transaction_id = Self::transaction_id();
        debug!(account = %account, tx = %transaction_id, "paper swap executed");
        Ok(Execution { transaction_id })
    }

    async fn request_faucet_funds(
        &self,
        account: &AccountId,
        amount: u64,
    ) -> Result<Execution, VenueError> {
        let mut state = self.state();
        state.take_rate_limit()?;
        state.credit(account, &AssetId::native(), amount);
        Ok(Execution {
            transaction_id: Self::transaction_id(),
        })
    }

    async fn transfer_native(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: u64,
    ) -> Result<Execution, VenueError> {
        let native = AssetId::native();
        let mut state = self.state();
        state.take_rate_limit()?;
        state.debit(from, &native, amount)?;
        state.credit(to, &native, amount);
        Ok(Execution {
            transaction_id: Self::transaction_id(),
        })
    }

    async fn transfer_asset(
        &self,
        from: &AccountId,
        to: &AccountId,
        asset: &AssetId,
        amount: u64,
    ) -> Result<Execution, VenueError> {
        let mut state = self.state();
        state.take_rate_limit()?;
        if state.asset_account(from, asset).is_none() {
            return Err(VenueError::AccountNotFound(format!("{from}:{asset}")));
        }
        state.debit(from, asset, amount)?;
        state.credit(to, asset, amount);
        Ok(Execution {
            transaction_id: Self::transaction_id(),
        })
    }
}
