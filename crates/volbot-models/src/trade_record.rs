use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::strategy::StrategyKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeStatus {
    Completed,
    Failed,
}

/// One attempted trade. Identity is `transaction_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeRecord {
    #[serde(rename = "type")]
    pub side: TradeSide,
    pub timestamp: DateTime<Utc>,
    /// Native asset spent (buy) or received (sell), in UI units.
    pub native_amount: Decimal,
    /// Tracked asset received (buy) or spent (sell), in UI units.
    pub token_amount: Decimal,
    pub agent_id: String,
    pub strategy: StrategyKind,
    pub status: TradeStatus,
    pub transaction_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set on fills fabricated because the venue had no route.
    #[serde(default)]
    pub simulated: bool,
}

impl TradeRecord {
    pub fn is_completed(&self) -> bool {
        self.status == TradeStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample() -> TradeRecord {
        TradeRecord {
            side: TradeSide::Buy,
            timestamp: Utc::now(),
            native_amount: dec!(1.0),
            token_amount: dec!(1000000),
            agent_id: "sniper".to_string(),
            strategy: StrategyKind::Immediate,
            status: TradeStatus::Completed,
            transaction_id: "5xYz".to_string(),
            error: None,
            simulated: false,
        }
    }

    #[test]
    fn wire_names() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["type"], "BUY");
        assert_eq!(json["status"], "COMPLETED");
        assert_eq!(json["strategy"], "immediate");
        assert_eq!(json["native_amount"], "1.0");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn records_without_simulated_flag_deserialize() {
        let json = r#"{
            "type": "SELL",
            "timestamp": "2025-01-01T00:00:00Z",
            "native_amount": "0.25",
            "token_amount": "250000",
            "agent_id": "volume-2",
            "strategy": "periodic_2",
            "status": "FAILED",
            "transaction_id": "failed_1",
            "error": "slippage exceeded"
        }"#;

        let record: TradeRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.side, TradeSide::Sell);
        assert_eq!(record.status, TradeStatus::Failed);
        assert!(!record.simulated);
        assert!(!record.is_completed());
        assert_eq!(record.error.as_deref(), Some("slippage exceeded"));
    }
}
