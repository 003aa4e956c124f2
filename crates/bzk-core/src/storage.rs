use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex, PoisonError,
    },
};

use bzk_domain::{LedgerSnapshot, CURRENT_SCHEMA_VERSION};
use rust_decimal::Decimal;

use crate::CoreError;

/// Abstraction over persistence backends that can hold one ledger snapshot.
pub trait SnapshotStore: Send + Sync {
    fn persist_snapshot(&self, snapshot: &LedgerSnapshot) -> Result<(), CoreError>;
    fn load_snapshot(&self) -> Result<Option<LedgerSnapshot>, CoreError>;
}

/// Keeps the latest snapshot in memory. Suitable for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    latest: Mutex<Option<LedgerSnapshot>>,
    writes: AtomicUsize,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: LedgerSnapshot) -> Self {
        Self {
            latest: Mutex::new(Some(snapshot)),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn latest(&self) -> Option<LedgerSnapshot> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn persist_snapshot(&self, snapshot: &LedgerSnapshot) -> Result<(), CoreError> {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(snapshot.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn load_snapshot(&self) -> Result<Option<LedgerSnapshot>, CoreError> {
        Ok(self.latest())
    }
}

/// Rejects snapshots the engine cannot safely adopt.
pub fn validate_snapshot(snapshot: &LedgerSnapshot) -> Result<(), CoreError> {
    if snapshot.schema_version > CURRENT_SCHEMA_VERSION {
        return Err(CoreError::UnsupportedSchema {
            found: snapshot.schema_version,
            supported: CURRENT_SCHEMA_VERSION,
        });
    }

    if let Some(active) = snapshot.active.as_ref() {
        if active.ended_at.is_some() {
            return Err(CoreError::CorruptSnapshot(format!(
                "active period {} has an end timestamp",
                active.id
            )));
        }
    }

    if let Some(open) = snapshot.history.iter().find(|period| period.ended_at.is_none()) {
        return Err(CoreError::CorruptSnapshot(format!(
            "history period {} was never closed",
            open.id
        )));
    }

    let mut period_ids = HashSet::new();
    let mut transaction_ids = HashSet::new();
    for period in snapshot.periods() {
        if !period_ids.insert(period.id) {
            return Err(CoreError::CorruptSnapshot(format!(
                "period {} appears more than once",
                period.id
            )));
        }
        if period.limit < Decimal::ZERO {
            return Err(CoreError::CorruptSnapshot(format!(
                "period {} has negative limit {}",
                period.id, period.limit
            )));
        }
        for txn in &period.transactions {
            if !transaction_ids.insert(txn.id) {
                return Err(CoreError::CorruptSnapshot(format!(
                    "transaction {} appears more than once",
                    txn.id
                )));
            }
            if txn.amount <= Decimal::ZERO {
                return Err(CoreError::CorruptSnapshot(format!(
                    "transaction {} has non-positive amount {}",
                    txn.id, txn.amount
                )));
            }
        }
        if period.spent_with(Decimal::ZERO).is_none() {
            return Err(CoreError::CorruptSnapshot(format!(
                "period {} spends more than can be represented",
                period.id
            )));
        }
    }

    Ok(())
}

/// Detects anomalies that do not prevent loading but are worth surfacing.
pub fn snapshot_warnings(snapshot: &LedgerSnapshot) -> Vec<String> {
    let mut warnings = Vec::new();

    for period in snapshot.periods() {
        if let Some(ended) = period.ended_at {
            if ended < period.started_at {
                warnings.push(format!(
                    "period {} ends before it starts ({} < {})",
                    period.id, ended, period.started_at
                ));
            }
        }
        for txn in &period.transactions {
            if txn.timestamp < period.started_at {
                warnings.push(format!(
                    "transaction {} predates its period {}",
                    txn.id, period.id
                ));
            }
        }
    }

    let out_of_order = snapshot
        .history
        .windows(2)
        .any(|pair| pair[0].ended_at > pair[1].ended_at);
    if out_of_order {
        warnings.push("history is not in close order".into());
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use bzk_domain::{BudgetPeriod, Transaction};
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn base() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 21, 0, 0).unwrap()
    }

    fn closed(limit: Decimal, ended_after_hours: i64) -> BudgetPeriod {
        let mut period = BudgetPeriod::new(limit, "Electric Avenue", base());
        period.close(base() + Duration::hours(ended_after_hours));
        period
    }

    #[test]
    fn memory_store_keeps_latest_snapshot() {
        let store = MemorySnapshotStore::new();
        assert!(store.load_snapshot().unwrap().is_none());

        let snapshot = LedgerSnapshot::empty(base());
        store.persist_snapshot(&snapshot).unwrap();
        assert_eq!(store.load_snapshot().unwrap(), Some(snapshot));
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn rejects_newer_schema() {
        let mut snapshot = LedgerSnapshot::empty(base());
        snapshot.schema_version = CURRENT_SCHEMA_VERSION + 1;
        let err = validate_snapshot(&snapshot).expect_err("future schema must fail");
        assert!(matches!(err, CoreError::UnsupportedSchema { .. }));
    }

    #[test]
    fn rejects_closed_period_in_active_slot() {
        let mut snapshot = LedgerSnapshot::empty(base());
        snapshot.active = Some(closed(dec!(50), 2));
        let err = validate_snapshot(&snapshot).expect_err("closed active must fail");
        assert!(matches!(err, CoreError::CorruptSnapshot(_)));
    }

    #[test]
    fn rejects_duplicate_transaction_ids() {
        let mut period = closed(dec!(50), 2);
        let txn = Transaction::new(dec!(5), "Shot", "Electric Avenue", base());
        period.transactions.push(txn.clone());
        period.transactions.push(txn);
        let mut snapshot = LedgerSnapshot::empty(base());
        snapshot.history.push(period);

        let err = validate_snapshot(&snapshot).expect_err("duplicate ids must fail");
        match err {
            CoreError::CorruptSnapshot(message) => assert!(message.contains("more than once")),
            other => panic!("expected corrupt snapshot, got {other:?}"),
        }
    }

    #[test]
    fn rejects_period_whose_total_overflows() {
        let mut period = closed(dec!(50), 2);
        for _ in 0..2 {
            period
                .transactions
                .push(Transaction::new(Decimal::MAX, "Tab", "Electric Avenue", base()));
        }
        let mut snapshot = LedgerSnapshot::empty(base());
        snapshot.history.push(period);

        let err = validate_snapshot(&snapshot).expect_err("overflowing total must fail");
        assert!(matches!(err, CoreError::CorruptSnapshot(_)));
    }

    #[test]
    fn warns_when_history_out_of_order() {
        let mut snapshot = LedgerSnapshot::empty(base());
        snapshot.history.push(closed(dec!(50), 5));
        snapshot.history.push(closed(dec!(50), 1));
        assert!(validate_snapshot(&snapshot).is_ok());
        let warnings = snapshot_warnings(&snapshot);
        assert!(warnings.iter().any(|w| w.contains("close order")));
    }
}
