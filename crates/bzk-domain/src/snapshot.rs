//! Serializable copy of the complete ledger state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::period::BudgetPeriod;

pub const CURRENT_SCHEMA_VERSION: u8 = 1;

fn default_schema_version() -> u8 {
    CURRENT_SCHEMA_VERSION
}

/// Everything the engine owns: the active period plus closed history,
/// oldest closed period first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    #[serde(default = "default_schema_version")]
    pub schema_version: u8,
    pub saved_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<BudgetPeriod>,
    #[serde(default)]
    pub history: Vec<BudgetPeriod>,
}

impl LedgerSnapshot {
    pub fn empty(saved_at: DateTime<Utc>) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            saved_at,
            active: None,
            history: Vec::new(),
        }
    }

    pub fn periods(&self) -> impl Iterator<Item = &BudgetPeriod> {
        self.history.iter().chain(self.active.iter())
    }

    pub fn transaction_count(&self) -> usize {
        self.periods().map(|period| period.transactions.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Transaction;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn snapshot_round_trips_through_json() {
        let at = Utc.with_ymd_and_hms(2025, 2, 3, 20, 0, 0).unwrap();
        let mut closed = BudgetPeriod::new(dec!(100), "Electric Avenue", at);
        closed.add_transaction(Transaction::new(dec!(18.99), "Appetizer Platter", "Sports Bar", at));
        closed.close(at);
        let mut active = BudgetPeriod::new(dec!(50), "Neon Lights Bar", at);
        active.add_transaction(Transaction::new(dec!(0.10), "Dime", "Neon Lights Bar", at));

        let snapshot = LedgerSnapshot {
            schema_version: CURRENT_SCHEMA_VERSION,
            saved_at: at,
            active: Some(active),
            history: vec![closed],
        };

        let json = serde_json::to_string(&snapshot).expect("serialize snapshot");
        let restored: LedgerSnapshot = serde_json::from_str(&json).expect("deserialize snapshot");
        assert_eq!(restored, snapshot);
        assert_eq!(restored.transaction_count(), 2);
        let active = restored.active.as_ref().expect("active period");
        assert_eq!(active.transactions[0].amount.to_string(), "0.10");
    }

    #[test]
    fn missing_schema_version_defaults_to_current() {
        let raw = r#"{"saved_at":"2025-02-03T20:00:00Z"}"#;
        let snapshot: LedgerSnapshot = serde_json::from_str(raw).expect("parse minimal snapshot");
        assert_eq!(snapshot.schema_version, CURRENT_SCHEMA_VERSION);
        assert!(snapshot.active.is_none());
        assert!(snapshot.history.is_empty());
    }
}
