//! The budget ledger engine: sole owner and mutator of budget periods.
//!
//! Commands validate before touching state, so a failed call leaves the
//! ledger exactly as it was. Every successful command hands a snapshot to
//! the [`SnapshotStore`]; a store failure is logged and reported through
//! [`LedgerEngine::persistence_status`] but never rolls back memory.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bzk_domain::{
    BudgetPeriod, LedgerSnapshot, PeriodDetail, PeriodId, PeriodSummary, PeriodView, Transaction,
    TransactionId, TransactionPatch, CURRENT_SCHEMA_VERSION,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::{
    storage::{snapshot_warnings, validate_snapshot, SnapshotStore},
    time::Clock,
    CoreError, Result,
};

#[derive(Debug, Default)]
struct LedgerState {
    active: Option<BudgetPeriod>,
    /// Closed periods, oldest first.
    history: Vec<BudgetPeriod>,
    revision: u64,
}

impl LedgerState {
    fn snapshot(&self, saved_at: DateTime<Utc>) -> LedgerSnapshot {
        LedgerSnapshot {
            schema_version: CURRENT_SCHEMA_VERSION,
            saved_at,
            active: self.active.clone(),
            history: self.history.clone(),
        }
    }

    fn commit(&mut self, saved_at: DateTime<Utc>) -> PendingSnapshot {
        self.revision += 1;
        PendingSnapshot {
            revision: self.revision,
            snapshot: self.snapshot(saved_at),
        }
    }

    fn active_mut(&mut self) -> Result<&mut BudgetPeriod> {
        self.active.as_mut().ok_or(CoreError::NoActivePeriod)
    }

    fn find_period(&self, id: PeriodId) -> Option<&BudgetPeriod> {
        self.active
            .iter()
            .chain(self.history.iter())
            .find(|period| period.id == id)
    }
}

struct PendingSnapshot {
    revision: u64,
    snapshot: LedgerSnapshot,
}

#[derive(Debug, Default)]
struct PersistenceState {
    persisted_revision: u64,
    last_error: Option<String>,
}

/// Whether the store holds the latest in-memory state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceStatus {
    Clean,
    Dirty {
        unsaved_revisions: u64,
        last_error: Option<String>,
    },
}

impl PersistenceStatus {
    pub fn is_clean(&self) -> bool {
        matches!(self, PersistenceStatus::Clean)
    }
}

pub struct LedgerEngine {
    state: RwLock<LedgerState>,
    sink: Mutex<PersistenceState>,
    store: Arc<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
    near_limit_threshold: Option<u8>,
    load_warnings: Vec<String>,
}

impl LedgerEngine {
    /// Creates an empty engine. Nothing is read from `store`.
    pub fn new(store: Arc<dyn SnapshotStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(LedgerState::default()),
            sink: Mutex::new(PersistenceState::default()),
            store,
            clock,
            near_limit_threshold: None,
            load_warnings: Vec::new(),
        }
    }

    /// Creates an engine seeded from the store's last snapshot, if any.
    pub fn open(store: Arc<dyn SnapshotStore>, clock: Arc<dyn Clock>) -> Result<Self> {
        let loaded = store.load_snapshot()?;
        let mut engine = Self::new(store, clock);
        let Some(snapshot) = loaded else {
            info!("no ledger snapshot found; starting empty");
            return Ok(engine);
        };

        validate_snapshot(&snapshot)?;
        let warnings = snapshot_warnings(&snapshot);
        for warning in &warnings {
            warn!(%warning, "ledger snapshot anomaly");
        }
        info!(
            history = snapshot.history.len(),
            active = snapshot.active.is_some(),
            "ledger snapshot loaded"
        );

        engine.state = RwLock::new(LedgerState {
            active: snapshot.active,
            history: snapshot.history,
            revision: 0,
        });
        engine.load_warnings = warnings;
        Ok(engine)
    }

    /// Enables the near-limit flag on [`PeriodView`] at `threshold_percent` of the limit.
    pub fn with_near_limit_threshold(mut self, threshold_percent: Option<u8>) -> Self {
        self.near_limit_threshold = threshold_percent;
        self
    }

    pub fn near_limit_threshold(&self) -> Option<u8> {
        self.near_limit_threshold
    }

    pub fn load_warnings(&self) -> &[String] {
        &self.load_warnings
    }

    /// Opens a new active period, archiving any period that is still active.
    pub fn start_period(&self, limit: Decimal, label: impl Into<String>) -> Result<PeriodId> {
        if limit < Decimal::ZERO {
            return Err(CoreError::InvalidLimit(limit));
        }
        let label = label.into();
        let now = self.clock.now();

        let (id, pending) = {
            let mut state = self.write_state();
            if let Some(mut previous) = state.active.take() {
                previous.close(now);
                info!(period = %previous.id, "archived active period before starting a new one");
                state.history.push(previous);
            }
            let period = BudgetPeriod::new(limit, label, now);
            let id = period.id;
            state.active = Some(period);
            (id, state.commit(now))
        };

        info!(period = %id, %limit, "budget period started");
        self.persist(pending);
        Ok(id)
    }

    pub fn record_transaction(
        &self,
        amount: Decimal,
        description: impl Into<String>,
        venue: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Result<TransactionId> {
        let now = self.clock.now();
        let (id, pending) = {
            let mut state = self.write_state();
            let period = state.active_mut()?;
            if amount <= Decimal::ZERO || period.spent_with(amount).is_none() {
                return Err(CoreError::InvalidAmount(amount));
            }
            let id = period.add_transaction(Transaction::new(amount, description, venue, timestamp));
            debug!(period = %period.id, transaction = %id, %amount, spent = %period.spent(), "transaction recorded");
            (id, state.commit(now))
        };

        self.persist(pending);
        Ok(id)
    }

    /// Records a transaction stamped with the engine clock.
    pub fn record_transaction_now(
        &self,
        amount: Decimal,
        description: impl Into<String>,
        venue: impl Into<String>,
    ) -> Result<TransactionId> {
        let timestamp = self.clock.now();
        self.record_transaction(amount, description, venue, timestamp)
    }

    /// Edits a transaction of the active period. Closed periods are immutable,
    /// so their transactions report as not found.
    pub fn edit_transaction(&self, id: TransactionId, patch: TransactionPatch) -> Result<()> {
        let now = self.clock.now();
        let pending = {
            let mut state = self.write_state();
            let period = state
                .active
                .as_mut()
                .ok_or(CoreError::TransactionNotFound(id))?;
            let current = period
                .transaction(id)
                .map(|txn| txn.amount)
                .ok_or(CoreError::TransactionNotFound(id))?;
            if let Some(amount) = patch.amount {
                if amount <= Decimal::ZERO || period.spent_with(amount - current).is_none() {
                    return Err(CoreError::InvalidAmount(amount));
                }
            }
            if patch.is_empty() {
                return Ok(());
            }
            if let Some(txn) = period.transaction_mut(id) {
                txn.apply(&patch, now);
            }
            debug!(transaction = %id, "transaction edited");
            state.commit(now)
        };

        self.persist(pending);
        Ok(())
    }

    /// Removes a transaction from the active period and returns it.
    pub fn delete_transaction(&self, id: TransactionId) -> Result<Transaction> {
        let now = self.clock.now();
        let (removed, pending) = {
            let mut state = self.write_state();
            let removed = state
                .active
                .as_mut()
                .and_then(|period| period.remove_transaction(id))
                .ok_or(CoreError::TransactionNotFound(id))?;
            debug!(transaction = %id, amount = %removed.amount, "transaction deleted");
            (removed, state.commit(now))
        };

        self.persist(pending);
        Ok(removed)
    }

    /// Closes the active period and moves it into history.
    pub fn close_period(&self) -> Result<PeriodSummary> {
        let now = self.clock.now();
        let (summary, pending) = {
            let mut state = self.write_state();
            let mut period = state.active.take().ok_or(CoreError::NoActivePeriod)?;
            period.close(now);
            let summary = period.summary();
            state.history.push(period);
            (summary, state.commit(now))
        };

        info!(
            period = %summary.id,
            spent = %summary.spent,
            over_budget = summary.is_over_budget,
            "budget period closed"
        );
        self.persist(pending);
        Ok(summary)
    }

    pub fn active_period(&self) -> Option<PeriodView> {
        let state = self.read_state();
        state
            .active
            .as_ref()
            .map(|period| PeriodView::from_period(period, self.near_limit_threshold))
    }

    /// Closed periods, most recently closed first.
    pub fn list_history(&self, limit: Option<usize>, offset: Option<usize>) -> Vec<PeriodSummary> {
        let state = self.read_state();
        state
            .history
            .iter()
            .rev()
            .skip(offset.unwrap_or(0))
            .take(limit.unwrap_or(usize::MAX))
            .map(BudgetPeriod::summary)
            .collect()
    }

    pub fn history_len(&self) -> usize {
        self.read_state().history.len()
    }

    pub fn period_detail(&self, id: PeriodId) -> Result<PeriodDetail> {
        let state = self.read_state();
        state
            .find_period(id)
            .map(PeriodDetail::from_period)
            .ok_or(CoreError::PeriodNotFound(id))
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let now = self.clock.now();
        self.read_state().snapshot(now)
    }

    /// Writes the current state if the store is behind.
    pub fn flush(&self) -> Result<()> {
        let now = self.clock.now();
        let pending = {
            let state = self.read_state();
            PendingSnapshot {
                revision: state.revision,
                snapshot: state.snapshot(now),
            }
        };

        let mut sink = self.lock_sink();
        if pending.revision <= sink.persisted_revision {
            return Ok(());
        }
        match self.store.persist_snapshot(&pending.snapshot) {
            Ok(()) => {
                sink.persisted_revision = pending.revision;
                sink.last_error = None;
                info!(revision = pending.revision, "ledger snapshot flushed");
                Ok(())
            }
            Err(err) => {
                warn!(revision = pending.revision, error = %err, "ledger flush failed");
                sink.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    pub fn persistence_status(&self) -> PersistenceStatus {
        let revision = self.read_state().revision;
        let sink = self.lock_sink();
        if revision <= sink.persisted_revision {
            PersistenceStatus::Clean
        } else {
            PersistenceStatus::Dirty {
                unsaved_revisions: revision - sink.persisted_revision,
                last_error: sink.last_error.clone(),
            }
        }
    }

    fn persist(&self, pending: PendingSnapshot) {
        let mut sink = self.lock_sink();
        if pending.revision <= sink.persisted_revision {
            debug!(
                revision = pending.revision,
                persisted = sink.persisted_revision,
                "skipping stale snapshot"
            );
            return;
        }
        match self.store.persist_snapshot(&pending.snapshot) {
            Ok(()) => {
                sink.persisted_revision = pending.revision;
                sink.last_error = None;
            }
            Err(err) => {
                warn!(revision = pending.revision, error = %err, "failed to persist ledger snapshot");
                sink.last_error = Some(err.to_string());
            }
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, LedgerState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, LedgerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_sink(&self) -> MutexGuard<'_, PersistenceState> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for LedgerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read_state();
        f.debug_struct("LedgerEngine")
            .field("active", &state.active.as_ref().map(|period| period.id))
            .field("history", &state.history.len())
            .field("revision", &state.revision)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{storage::MemorySnapshotStore, time::ManualClock};
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn engine() -> (LedgerEngine, Arc<MemorySnapshotStore>, Arc<ManualClock>) {
        let store = Arc::new(MemorySnapshotStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 2, 3, 20, 0, 0).unwrap(),
        ));
        let engine = LedgerEngine::new(store.clone(), clock.clone());
        (engine, store, clock)
    }

    #[test]
    fn every_successful_command_persists() {
        let (engine, store, _) = engine();
        engine.start_period(dec!(50), "Neon Lights Bar").unwrap();
        let txn = engine
            .record_transaction_now(dec!(14.99), "Whiskey Sour", "Neon Lights Bar")
            .unwrap();
        engine
            .edit_transaction(txn, TransactionPatch::amount(dec!(15.99)))
            .unwrap();
        engine.delete_transaction(txn).unwrap();
        engine.close_period().unwrap();

        assert_eq!(store.write_count(), 5);
        assert!(engine.persistence_status().is_clean());
    }

    #[test]
    fn failed_commands_do_not_persist() {
        let (engine, store, _) = engine();
        assert!(engine.start_period(dec!(-1), "Bad").is_err());
        assert!(engine.close_period().is_err());
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn restart_archives_previous_period_atomically() {
        let (engine, store, clock) = engine();
        let first = engine.start_period(dec!(30), "Brew Pub").unwrap();
        clock.advance(Duration::hours(4));
        let second = engine.start_period(dec!(100), "Sports Bar").unwrap();

        let snapshot = store.latest().expect("snapshot persisted");
        assert_eq!(snapshot.active.as_ref().map(|p| p.id), Some(second));
        assert_eq!(snapshot.history.len(), 1);
        assert_eq!(snapshot.history[0].id, first);
        assert_eq!(
            snapshot.history[0].ended_at,
            Some(Utc.with_ymd_and_hms(2025, 2, 4, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn empty_patch_is_a_no_op() {
        let (engine, store, _) = engine();
        engine.start_period(dec!(50), "Brew Pub").unwrap();
        let txn = engine
            .record_transaction_now(dec!(10), "Pint", "Brew Pub")
            .unwrap();
        let writes = store.write_count();

        engine
            .edit_transaction(txn, TransactionPatch::default())
            .unwrap();
        assert_eq!(store.write_count(), writes);
        let view = engine.active_period().unwrap();
        assert_eq!(view.transactions[0].edited_at, None);
    }

    #[test]
    fn near_limit_threshold_feeds_view() {
        let (engine, _, _) = engine();
        let engine = engine.with_near_limit_threshold(Some(80));
        engine.start_period(dec!(50), "Neon Lights Bar").unwrap();
        engine
            .record_transaction_now(dec!(41), "Round", "Neon Lights Bar")
            .unwrap();
        assert!(engine.active_period().unwrap().near_limit);
    }
}
