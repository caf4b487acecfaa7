use std::collections::HashSet;
use std::path::PathBuf;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use volbot_models::TradeRecord;

use crate::store::JsonStore;

#[derive(Default)]
struct LedgerState {
    records: Vec<TradeRecord>,
    ids: HashSet<String>,
}

impl LedgerState {
    fn from_records(records: Vec<TradeRecord>) -> Self {
        let mut state = Self::default();
        for record in records {
            if state.ids.insert(record.transaction_id.clone()) {
                state.records.push(record);
            }
        }
        state
    }
}

/// Append-only trade history shared by all agents.
///
/// Appends are serialized and deduplicated by transaction id. Persistence failures are
/// logged and never reach the caller.
pub struct TradeLedger {
    store: Option<JsonStore>,
    state: Mutex<LedgerState>,
}

impl TradeLedger {
    /// Open the ledger persisted at `path`. An unreadable file starts an empty ledger.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let store = JsonStore::new(path);
        let records = match store.load().await {
            Ok(records) => records,
            Err(e) => {
                warn!(path = %store.path().display(), error = %e, "unreadable trade ledger, starting empty");
                Vec::new()
            }
        };
        info!(path = %store.path().display(), records = records.len(), "trade ledger opened");

        Self {
            store: Some(store),
            state: Mutex::new(LedgerState::from_records(records)),
        }
    }

    /// A ledger that is never persisted.
    pub fn in_memory() -> Self {
        Self {
            store: None,
            state: Mutex::new(LedgerState::default()),
        }
    }

    /// Record a trade. Returns false if its transaction id is already known.
    pub async fn append(&self, record: TradeRecord) -> bool {
        let mut state = self.state.lock().await;
        if state.ids.contains(&record.transaction_id) {
            debug!(tx = %record.transaction_id, "duplicate trade ignored");
            return false;
        }

        if let Some(store) = &self.store {
            let mut persisted = match store.load().await {
                Ok(records) => records,
                Err(e) => {
                    warn!(error = %e, "trade ledger unreadable, rewriting from memory");
                    state.records.clone()
                }
            };
            if persisted
                .iter()
                .any(|r| r.transaction_id == record.transaction_id)
            {
                debug!(tx = %record.transaction_id, "trade already persisted");
                return false;
            }
            persisted.push(record.clone());
            if let Err(e) = store.save(&persisted).await {
                warn!(tx = %record.transaction_id, error = %e, "failed to persist trade");
            }
        }

        state.ids.insert(record.transaction_id.clone());
        state.records.push(record);
        true
    }

    /// The most recent `limit` records, newest first.
    pub async fn history(&self, limit: usize) -> Vec<TradeRecord> {
        let state = self.state.lock().await;
        state.records.iter().rev().take(limit).cloned().collect()
    }

    /// The most recent `limit` records of one agent, newest first.
    pub async fn history_for(&self, agent_id: &str, limit: usize) -> Vec<TradeRecord> {
        let state = self.state.lock().await;
        state
            .records
            .iter()
            .rev()
            .filter(|r| r.agent_id == agent_id)
            .take(limit)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use volbot_models::{StrategyKind, TradeSide, TradeStatus};

    fn record(agent: &str, id: &str) -> TradeRecord {
        TradeRecord {
            side: TradeSide::Buy,
            timestamp: Utc::now(),
            native_amount: dec!(0.05),
            token_amount: dec!(50000),
            agent_id: agent.to_string(),
            strategy: StrategyKind::Periodic2,
            status: TradeStatus::Completed,
            transaction_id: id.to_string(),
            error: None,
            simulated: false,
        }
    }

    #[tokio::test]
    async fn append_is_idempotent() {
        let ledger = TradeLedger::in_memory();
        assert!(ledger.append(record("a", "tx1")).await);
        assert!(!ledger.append(record("a", "tx1")).await);
        assert_eq!(ledger.len().await, 1);
    }

    #[tokio::test]
    async fn history_is_newest_first() {
        let ledger = TradeLedger::in_memory();
        for id in ["tx1", "tx2", "tx3"] {
            ledger.append(record("a", id)).await;
        }

        let ids: Vec<_> = ledger
            .history(2)
            .await
            .into_iter()
            .map(|r| r.transaction_id)
            .collect();
        assert_eq!(ids, vec!["tx3", "tx2"]);
        assert_eq!(ledger.history(10).await.len(), 3);
        assert!(ledger.history(0).await.is_empty());
    }

    #[tokio::test]
    async fn history_for_filters_by_agent() {
        let ledger = TradeLedger::in_memory();
        ledger.append(record("a", "tx1")).await;
        ledger.append(record("b", "tx2")).await;
        ledger.append(record("a", "tx3")).await;

        let history = ledger.history_for("a", 10).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].transaction_id, "tx3");
        assert!(ledger.history_for("c", 10).await.is_empty());
    }

    #[test]
    fn loaded_duplicates_are_collapsed() {
        let state = LedgerState::from_records(vec![
            record("a", "tx1"),
            record("a", "tx1"),
            record("a", "tx2"),
        ]);
        assert_eq!(state.records.len(), 2);
    }
}
