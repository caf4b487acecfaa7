use std::sync::Arc;

use rand::Rng;
use rust_decimal::Decimal;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use volbot_models::{AgentConfig, StrategyProfile};

use crate::agent::{Agent, ScheduleHandle, TradePermit};
use crate::error::TradeError;
use crate::pipeline::TradePipeline;

/// What one strategy firing will do, decided before any venue call.
#[derive(Debug, Clone, PartialEq)]
enum Action {
    Buy(Decimal),
    Sell(Decimal),
    BuyBelow { support: Decimal, amount: Decimal },
    SellAbove { target: Decimal, fraction: Decimal },
}

fn plan<R: Rng>(
    profile: &StrategyProfile,
    config: &AgentConfig,
    rng: &mut R,
) -> Option<Action> {
    match profile {
        StrategyProfile::OneShot => Some(Action::Buy(config.max_buy)),
        StrategyProfile::RandomVolume {
            size,
            buy_probability,
            ..
        } => {
            let amount = size.sample(rng);
            if rng.gen_bool(buy_probability.clamp(0.0, 1.0)) {
                Some(Action::Buy(amount.min(config.max_buy)))
            } else {
                Some(Action::Sell(amount))
            }
        }
        StrategyProfile::Support { size, .. } => config.support_price.map(|support| {
            Action::BuyBelow {
                support,
                amount: size.sample(rng).min(config.max_buy),
            }
        }),
        StrategyProfile::ProfitTaking { fraction, .. } => {
            config.profit_price.map(|target| Action::SellAbove {
                target,
                fraction: fraction.sample(rng),
            })
        }
    }
}

/// Starts and stops the per-agent strategy tasks.
pub struct Scheduler {
    pipeline: Arc<TradePipeline>,
}

impl Scheduler {
    pub fn new(pipeline: Arc<TradePipeline>) -> Self {
        Self { pipeline }
    }

    /// Activate automatic trading for `agent`. Must run inside a Tokio runtime.
    ///
    /// Returns false if the agent was already active.
    pub fn activate(&self, agent: &Arc<Agent>) -> Result<bool, TradeError> {
        if agent.tracked_asset().is_none() {
            return Err(TradeError::NoAssetConfigured);
        }

        let started = agent.activate_with(|| self.spawn_schedule(agent.clone()))?;
        if started {
            info!(agent = %agent.id(), strategy = %agent.strategy(), "agent activated");
        } else {
            debug!(agent = %agent.id(), "agent already active");
        }
        Ok(started)
    }

    /// Stop future firings. A trade already dispatched runs to completion.
    ///
    /// Returns the stopped schedule task, or None if the agent was not active.
    pub fn deactivate(&self, agent: &Agent) -> Option<JoinHandle<()>> {
        let schedule = agent.deactivate()?;
        schedule.cancel.cancel();
        info!(agent = %agent.id(), "agent deactivated");
        Some(schedule.task)
    }

    fn spawn_schedule(&self, agent: Arc<Agent>) -> ScheduleHandle {
        let cancel = CancellationToken::new();
        let profile = agent.config().profile_for(agent.strategy());
        let task = tokio::spawn(run_schedule(
            self.pipeline.clone(),
            agent,
            profile,
            cancel.clone(),
        ));
        ScheduleHandle { cancel, task }
    }
}

async fn run_schedule(
    pipeline: Arc<TradePipeline>,
    agent: Arc<Agent>,
    profile: StrategyProfile,
    cancel: CancellationToken,
) {
    let Some(period) = profile.interval() else {
        // One-shot strategies fire once, right away
        if !cancel.is_cancelled() {
            fire(&pipeline, &agent, &profile);
        }
        return;
    };

    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(agent = %agent.id(), "schedule stopped");
                break;
            }
            _ = ticker.tick() => {
                fire(&pipeline, &agent, &profile);
            }
        }
    }
}

/// Take the agent's permit and dispatch one firing on its own task.
///
/// A firing that finds the agent still busy with an earlier trade is skipped.
fn fire(pipeline: &Arc<TradePipeline>, agent: &Arc<Agent>, profile: &StrategyProfile) {
    let permit = match agent.try_enter_scheduled() {
        Ok(permit) => permit,
        Err(e) => {
            debug!(agent = %agent.id(), reason = %e, "skipping firing");
            return;
        }
    };
    let Some(action) = plan(profile, &agent.config(), &mut rand::thread_rng()) else {
        debug!(agent = %agent.id(), "no threshold configured, nothing to do");
        return;
    };

    let pipeline = pipeline.clone();
    let agent = agent.clone();
    tokio::spawn(async move {
        if let Err(e) = execute(&pipeline, &agent, &permit, action).await {
            warn!(agent = %agent.id(), error = %e, "scheduled trade failed");
        }
    });
}

async fn execute(
    pipeline: &TradePipeline,
    agent: &Agent,
    permit: &TradePermit,
    action: Action,
) -> Result<(), TradeError> {
    match action {
        Action::Buy(amount) => {
            pipeline.buy_with_permit(agent, permit, amount).await?;
        }
        Action::Sell(amount) => {
            pipeline.sell_with_permit(agent, permit, amount).await?;
        }
        Action::BuyBelow { support, amount } => {
            let quote = pipeline.price(agent).await?;
            if quote.is_usable() && quote.value < support {
                info!(agent = %agent.id(), price = %quote.value, support = %support, "price under support, buying");
                pipeline.buy_with_permit(agent, permit, amount).await?;
            } else {
                debug!(agent = %agent.id(), price = %quote.value, "price above support");
            }
        }
        Action::SellAbove { target, fraction } => {
            let quote = pipeline.price(agent).await?;
            if quote.is_usable() && quote.value > target {
                info!(agent = %agent.id(), price = %quote.value, target = %target, "price over profit target, selling");
                pipeline
                    .sell_fraction_with_permit(agent, permit, fraction)
                    .await?;
            } else {
                debug!(agent = %agent.id(), price = %quote.value, "price below profit target");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rust_decimal_macros::dec;
    use volbot_models::{SizeRange, StrategyKind};

    #[test]
    fn one_shot_buys_max() {
        let config = AgentConfig {
            max_buy: dec!(2.5),
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(
            plan(&StrategyKind::Immediate.profile(), &config, &mut rng),
            Some(Action::Buy(dec!(2.5)))
        );
    }

    #[test]
    fn random_volume_sizes_stay_in_range() {
        let profile = StrategyKind::Periodic2.profile();
        let config = AgentConfig::default();
        let mut rng = StdRng::seed_from_u64(1);
        let range = SizeRange::new(dec!(0.05), dec!(0.15));

        for _ in 0..100 {
            match plan(&profile, &config, &mut rng) {
                Some(Action::Buy(amount)) | Some(Action::Sell(amount)) => {
                    assert!(range.contains(amount))
                }
                other => panic!("unexpected action: {other:?}"),
            }
        }
    }

    #[test]
    fn random_buys_are_capped_by_max_buy() {
        let profile = StrategyKind::Periodic3.profile();
        let config = AgentConfig {
            max_buy: dec!(0.01),
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            match plan(&profile, &config, &mut rng) {
                Some(Action::Buy(amount)) => assert_eq!(amount, dec!(0.01)),
                Some(Action::Sell(amount)) => assert!(amount >= dec!(0.10)),
                other => panic!("unexpected action: {other:?}"),
            }
        }
    }

    #[test]
    fn periodic_4_leans_toward_buying() {
        let profile = StrategyKind::Periodic4.profile();
        let config = AgentConfig::default();
        let mut rng = StdRng::seed_from_u64(42);

        let buys = (0..2000)
            .filter(|_| matches!(plan(&profile, &config, &mut rng), Some(Action::Buy(_))))
            .count();
        assert!((1000..1400).contains(&buys), "buys = {buys}");
    }

    #[test]
    fn thresholds_are_required() {
        let config = AgentConfig::default();
        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(
            plan(&StrategyKind::Periodic5.profile(), &config, &mut rng),
            None
        );
        assert_eq!(
            plan(&StrategyKind::Periodic6.profile(), &config, &mut rng),
            None
        );
    }

    #[test]
    fn profit_taking_fraction_range() {
        let config = AgentConfig {
            profit_price: Some(dec!(0.000002)),
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..50 {
            match plan(&StrategyKind::Periodic6.profile(), &config, &mut rng) {
                Some(Action::SellAbove { target, fraction }) => {
                    assert_eq!(target, dec!(0.000002));
                    assert!(fraction >= dec!(0.10) && fraction <= dec!(0.30));
                }
                other => panic!("unexpected action: {other:?}"),
            }
        }
    }
}
