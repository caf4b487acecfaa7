use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::OwnedMutexGuard;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use volbot_models::{AccountId, AgentConfig, StrategyKind, TrackedAsset};

use crate::error::TradeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LifecycleState {
    Inactive,
    Active,
}

/// Who asked for a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeOrigin {
    /// An explicit user action. Only allowed while the agent is inactive.
    Manual,
    /// A strategy firing. Only allowed while the agent is active.
    Scheduled,
}

/// Running strategy task of an active agent.
pub(crate) struct ScheduleHandle {
    pub(crate) cancel: CancellationToken,
    pub(crate) task: JoinHandle<()>,
}

struct Lifecycle {
    state: LifecycleState,
    schedule: Option<ScheduleHandle>,
}

/// Exclusive right to trade for one agent. Dropping it releases the agent and clears
/// the manual-override flag.
pub struct TradePermit {
    _guard: OwnedMutexGuard<()>,
    manual_override: Option<Arc<AtomicBool>>,
}

impl Drop for TradePermit {
    fn drop(&mut self) {
        if let Some(flag) = &self.manual_override {
            flag.store(false, Ordering::SeqCst);
        }
    }
}

/// An independently scheduled trading identity owning one venue account.
pub struct Agent {
    id: String,
    account: AccountId,
    strategy: StrategyKind,
    config: RwLock<AgentConfig>,
    tracked_asset: RwLock<Option<TrackedAsset>>,
    token_balance_hint: Mutex<Decimal>,
    lifecycle: Mutex<Lifecycle>,
    trade_lock: Arc<tokio::sync::Mutex<()>>,
    manual_override: Arc<AtomicBool>,
}

impl Agent {
    pub fn new(
        id: impl Into<String>,
        account: AccountId,
        strategy: StrategyKind,
        config: AgentConfig,
    ) -> Self {
        Self {
            id: id.into(),
            account,
            strategy,
            config: RwLock::new(config),
            tracked_asset: RwLock::new(None),
            token_balance_hint: Mutex::new(Decimal::ZERO),
            lifecycle: Mutex::new(Lifecycle {
                state: LifecycleState::Inactive,
                schedule: None,
            }),
            trade_lock: Arc::new(tokio::sync::Mutex::new(())),
            manual_override: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn account(&self) -> &AccountId {
        &self.account
    }

    pub fn strategy(&self) -> StrategyKind {
        self.strategy
    }

    pub fn config(&self) -> AgentConfig {
        self.config.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Takes effect for scheduling on the next activation.
    pub fn set_config(&self, config: AgentConfig) {
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = config;
    }

    pub fn tracked_asset(&self) -> Option<TrackedAsset> {
        self.tracked_asset
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn set_tracked_asset(&self, asset: Option<TrackedAsset>) {
        *self.tracked_asset.write().unwrap_or_else(|e| e.into_inner()) = asset;
    }

    /// Last token balance seen at the venue. May be stale.
    pub fn token_balance_hint(&self) -> Decimal {
        *self
            .token_balance_hint
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn set_token_balance_hint(&self, balance: Decimal) {
        *self
            .token_balance_hint
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = balance;
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle().state
    }

    pub fn is_active(&self) -> bool {
        self.state() == LifecycleState::Active
    }

    /// True while a manual trade holds the agent.
    pub fn manual_override(&self) -> bool {
        self.manual_override.load(Ordering::SeqCst)
    }

    /// Acquire the agent's trade permit.
    ///
    /// Manual callers wait for any running trade to finish and are rejected while the agent
    /// is active. Scheduled callers never wait.
    pub async fn enter(&self, origin: TradeOrigin) -> Result<TradePermit, TradeError> {
        match origin {
            TradeOrigin::Scheduled => self.try_enter_scheduled(),
            TradeOrigin::Manual => {
                if self.is_active() {
                    return Err(TradeError::AutomationActive);
                }
                let guard = self.trade_lock.clone().lock_owned().await;

                let lifecycle = self.lifecycle();
                if lifecycle.state == LifecycleState::Active {
                    return Err(TradeError::AutomationActive);
                }
                self.manual_override.store(true, Ordering::SeqCst);
                drop(lifecycle);

                Ok(TradePermit {
                    _guard: guard,
                    manual_override: Some(self.manual_override.clone()),
                })
            }
        }
    }

    /// Permit for a strategy firing, or an error if the agent is inactive or already trading.
    pub fn try_enter_scheduled(&self) -> Result<TradePermit, TradeError> {
        if !self.is_active() {
            return Err(TradeError::AgentInactive(self.id.clone()));
        }
        let guard = self
            .trade_lock
            .clone()
            .try_lock_owned()
            .map_err(|_| TradeError::AgentBusy(self.id.clone()))?;
        Ok(TradePermit {
            _guard: guard,
            manual_override: None,
        })
    }

    /// Wait until no trade holds the agent.
    pub async fn wait_idle(&self) {
        let _guard = self.trade_lock.lock().await;
    }

    /// INACTIVE -> ACTIVE. `start` runs under the lifecycle lock and only on a real transition.
    ///
    /// Returns false if the agent was already active.
    pub(crate) fn activate_with<F>(&self, start: F) -> Result<bool, TradeError>
    where
        F: FnOnce() -> ScheduleHandle,
    {
        let mut lifecycle = self.lifecycle();
        if self.manual_override() {
            return Err(TradeError::ManualTradeInProgress(self.id.clone()));
        }
        if lifecycle.state == LifecycleState::Active {
            return Ok(false);
        }
        lifecycle.state = LifecycleState::Active;
        lifecycle.schedule = Some(start());
        Ok(true)
    }

    /// ACTIVE -> INACTIVE, handing back the schedule to stop. None if already inactive.
    pub(crate) fn deactivate(&self) -> Option<ScheduleHandle> {
        let mut lifecycle = self.lifecycle();
        if lifecycle.state == LifecycleState::Inactive {
            return None;
        }
        lifecycle.state = LifecycleState::Inactive;
        lifecycle.schedule.take()
    }
}
