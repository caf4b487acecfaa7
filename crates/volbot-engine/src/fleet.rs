use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};
use volbot_cache::PriceOracle;
use volbot_ledger::TradeLedger;
use volbot_models::{
    AccountId, AgentConfig, Network, OracleConfig, RetryPolicy, StrategyKind, TrackedAsset,
    TradeRecord, VolbotConfig,
};
use volbot_venue::{Execution, VenueGateway};

use crate::agent::{Agent, LifecycleState, TradeOrigin};
use crate::error::TradeError;
use crate::pipeline::TradePipeline;
use crate::scheduler::Scheduler;

/// Balance snapshot of one agent. Missing figures mean the venue lookup failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentBalance {
    pub agent_id: String,
    pub account: AccountId,
    pub strategy: StrategyKind,
    pub state: LifecycleState,
    pub native: Option<Decimal>,
    pub token: Option<Decimal>,
}

/// Every agent of the process plus the shared pipeline they trade through.
pub struct Fleet {
    agents: RwLock<BTreeMap<String, Arc<Agent>>>,
    tracked_asset: RwLock<Option<TrackedAsset>>,
    pipeline: Arc<TradePipeline>,
    scheduler: Scheduler,
}

impl Fleet {
    pub fn new(
        venue: Arc<dyn VenueGateway>,
        ledger: Arc<TradeLedger>,
        network: Network,
        retry: RetryPolicy,
        oracle: &OracleConfig,
    ) -> Self {
        let oracle = Arc::new(PriceOracle::new(venue.clone(), retry.clone(), oracle));
        let pipeline = Arc::new(TradePipeline::new(venue, oracle, ledger, retry, network));
        Self {
            agents: RwLock::new(BTreeMap::new()),
            tracked_asset: RwLock::new(None),
            scheduler: Scheduler::new(pipeline.clone()),
            pipeline,
        }
    }

    /// Build a fleet with the configured agents and tracked asset. Nothing is activated.
    pub fn from_config(
        venue: Arc<dyn VenueGateway>,
        ledger: Arc<TradeLedger>,
        config: &VolbotConfig,
    ) -> Self {
        let fleet = Self::new(
            venue,
            ledger,
            config.venue.network,
            config.retry.clone(),
            &config.oracle,
        );
        for spec in &config.agents {
            fleet.add_agent(&spec.id, spec.strategy, spec.config.clone());
        }
        if let Some(asset) = &config.tracked_asset {
            fleet.set_tracked_asset(asset.clone());
        }
        fleet
    }

    pub fn pipeline(&self) -> &Arc<TradePipeline> {
        &self.pipeline
    }

    /// Register an agent trading from an account named after its id.
    ///
    /// An existing agent with the same id is returned unchanged.
    pub fn add_agent(&self, id: &str, strategy: StrategyKind, config: AgentConfig) -> Arc<Agent> {
        let mut agents = self.agents.write().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = agents.get(id) {
            return existing.clone();
        }

        let agent = Arc::new(Agent::new(id, AccountId::new(id), strategy, config));
        agent.set_tracked_asset(self.tracked_asset());
        agents.insert(id.to_string(), agent.clone());
        info!(agent = %id, strategy = %strategy, "agent registered");
        agent
    }

    pub fn agent(&self, id: &str) -> Result<Arc<Agent>, TradeError> {
        self.agents
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
            .ok_or_else(|| TradeError::UnknownAgent(id.to_string()))
    }

    /// All agents, ordered by id.
    pub fn agents(&self) -> Vec<Arc<Agent>> {
        self.agents
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    pub fn tracked_asset(&self) -> Option<TrackedAsset> {
        self.tracked_asset
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Point every agent at `asset`.
    pub fn set_tracked_asset(&self, asset: TrackedAsset) {
        info!(asset = %asset.id, decimals = asset.decimals, "tracked asset set");
        *self.tracked_asset.write().unwrap_or_else(|e| e.into_inner()) = Some(asset.clone());
        for agent in self.agents() {
            agent.set_tracked_asset(Some(asset.clone()));
        }
    }

    pub fn configure(&self, id: &str, config: AgentConfig) -> Result<(), TradeError> {
        self.agent(id)?.set_config(config);
        Ok(())
    }

    pub fn activate(&self, id: &str) -> Result<bool, TradeError> {
        let agent = self.agent(id)?;
        self.scheduler.activate(&agent)
    }

    pub fn deactivate(&self, id: &str) -> Result<bool, TradeError> {
        let agent = self.agent(id)?;
        Ok(self.scheduler.deactivate(&agent).is_some())
    }

    pub async fn manual_buy(&self, id: &str, native_amount: Decimal) -> Result<TradeRecord, TradeError> {
        let agent = self.agent(id)?;
        self.pipeline
            .buy(&agent, native_amount, TradeOrigin::Manual)
            .await
    }

    /// Sell `token_amount` of the tracked asset by hand.
    pub async fn manual_sell(
        &self,
        id: &str,
        token_amount: Decimal,
    ) -> Result<Option<TradeRecord>, TradeError> {
        let agent = self.agent(id)?;
        self.pipeline
            .sell_tokens(&agent, token_amount, TradeOrigin::Manual)
            .await
    }

    pub async fn airdrop(&self, id: &str, amount: Decimal) -> Result<Execution, TradeError> {
        let agent = self.agent(id)?;
        self.pipeline.airdrop(&agent, amount).await
    }

    pub async fn send_native(
        &self,
        id: &str,
        to: &AccountId,
        amount: Decimal,
    ) -> Result<Execution, TradeError> {
        let agent = self.agent(id)?;
        self.pipeline.send_native(&agent, to, amount).await
    }

    pub async fn send_tokens(
        &self,
        id: &str,
        to: &AccountId,
        amount: Decimal,
    ) -> Result<Execution, TradeError> {
        let agent = self.agent(id)?;
        self.pipeline.send_tokens(&agent, to, amount).await
    }

    pub async fn balances(&self) -> Vec<AgentBalance> {
        let mut balances = Vec::new();
        for agent in self.agents() {
            let native = match self.pipeline.native_balance(&agent).await {
                Ok(balance) => Some(balance),
                Err(e) => {
                    warn!(agent = %agent.id(), error = %e, "native balance lookup failed");
                    None
                }
            };
            let token = match self.pipeline.token_balance(&agent).await {
                Ok(balance) => Some(balance),
                Err(TradeError::NoAssetConfigured) => None,
                Err(e) => {
                    warn!(agent = %agent.id(), error = %e, "token balance lookup failed");
                    None
                }
            };
            balances.push(AgentBalance {
                agent_id: agent.id().to_string(),
                account: agent.account().clone(),
                strategy: agent.strategy(),
                state: agent.state(),
                native,
                token,
            });
        }
        balances
    }

    pub async fn history(&self, limit: usize) -> Vec<TradeRecord> {
        self.pipeline.ledger().history(limit).await
    }

    pub async fn history_for(&self, id: &str, limit: usize) -> Vec<TradeRecord> {
        self.pipeline.ledger().history_for(id, limit).await
    }

    /// Deactivate every agent and wait for in-flight trades to finish.
    pub async fn shutdown(&self) {
        let agents = self.agents();
        let mut schedules = Vec::new();
        for agent in &agents {
            if let Some(task) = self.scheduler.deactivate(agent) {
                schedules.push(task);
            }
        }
        for task in schedules {
            if let Err(e) = task.await {
                warn!(error = %e, "schedule task ended abnormally");
            }
        }
        for agent in &agents {
            agent.wait_idle().await;
        }
        info!(agents = agents.len(), "fleet stopped");
    }
}
