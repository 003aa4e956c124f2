//! Wires the ledger engine to its JSON store and the user's config.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use bzk_config::{Config, ConfigManager};
use bzk_core::{Clock, LedgerEngine, MemorySnapshotStore, PersistenceStatus, SystemClock};
use bzk_domain::{Decimal, PeriodId};
use bzk_storage_json::{BackupInfo, JsonSnapshotStore, StoragePaths};
use tracing::{info, warn};

use crate::BuzzkillError;

/// Shared handle to the ledger. Clone it freely; every clone talks to the same engine.
pub type LedgerHandle = Arc<LedgerEngine>;

/// Owns one ledger engine plus the config and storage it was opened with.
pub struct Session {
    ledger: LedgerHandle,
    config: Config,
    config_manager: Option<ConfigManager>,
    store: Option<Arc<JsonSnapshotStore>>,
    clock: Arc<dyn Clock>,
    base_dir: Option<PathBuf>,
}

impl Session {
    /// Opens the session rooted at `$BUZZKILL_HOME` or `~/.buzzkill`.
    pub fn open_default() -> Result<Self, BuzzkillError> {
        Self::open(&Config::default_base_dir())
    }

    pub fn open(base_dir: &Path) -> Result<Self, BuzzkillError> {
        Self::open_with_clock(base_dir, Arc::new(SystemClock))
    }

    pub fn open_with_clock(base_dir: &Path, clock: Arc<dyn Clock>) -> Result<Self, BuzzkillError> {
        let config_manager = ConfigManager::with_base_dir(base_dir)?;
        let config = config_manager.load()?;
        let data_root = config.resolve_data_root(base_dir);
        let store = Arc::new(JsonSnapshotStore::with_retention(
            StoragePaths::under(&data_root),
            config.backup_retention,
        )?);
        let engine = LedgerEngine::open(store.clone(), clock.clone())?
            .with_near_limit_threshold(config.near_limit_threshold());
        info!(root = %data_root.display(), "session opened");

        Ok(Self {
            ledger: Arc::new(engine),
            config,
            config_manager: Some(config_manager),
            store: Some(store),
            clock,
            base_dir: Some(base_dir.to_path_buf()),
        })
    }

    /// A session that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self::in_memory_with_clock(Arc::new(SystemClock))
    }

    pub fn in_memory_with_clock(clock: Arc<dyn Clock>) -> Self {
        let config = Config::default();
        let engine = LedgerEngine::new(Arc::new(MemorySnapshotStore::new()), clock.clone())
            .with_near_limit_threshold(config.near_limit_threshold());
        Self {
            ledger: Arc::new(engine),
            config,
            config_manager: None,
            store: None,
            clock,
            base_dir: None,
        }
    }

    pub fn ledger(&self) -> LedgerHandle {
        Arc::clone(&self.ledger)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    pub fn ledger_path(&self) -> Option<&Path> {
        self.store.as_deref().map(JsonSnapshotStore::ledger_path)
    }

    pub fn persistence_status(&self) -> PersistenceStatus {
        self.ledger.persistence_status()
    }

    /// Starts a period at `limit`, or at the suggested limit when none is given,
    /// and remembers the limit for next time. Failing to save the remembered
    /// limit is logged and does not fail the start.
    pub fn start_period(
        &mut self,
        limit: Option<Decimal>,
        label: impl Into<String>,
    ) -> Result<PeriodId, BuzzkillError> {
        let limit = limit.unwrap_or_else(|| self.config.suggested_limit());
        let id = self.ledger.start_period(limit, label)?;

        self.config.last_limit = Some(limit);
        if let Some(manager) = &self.config_manager {
            if let Err(err) = manager.save(&self.config) {
                warn!(error = %err, path = %manager.config_path().display(), "failed to remember last limit");
            }
        }
        Ok(id)
    }

    /// Writes the current ledger state as a named backup.
    pub fn backup(&self, note: Option<&str>) -> Result<BackupInfo, BuzzkillError> {
        let store = self.store.as_ref().ok_or(BuzzkillError::NoBackingStore)?;
        Ok(store.backup(&self.ledger.snapshot(), note)?)
    }

    pub fn backups(&self) -> Result<Vec<BackupInfo>, BuzzkillError> {
        let store = self.store.as_ref().ok_or(BuzzkillError::NoBackingStore)?;
        Ok(store.list_backups()?)
    }

    /// Replaces the ledger with the contents of a backup and reopens the engine.
    /// Handles obtained before the restore keep pointing at the old engine.
    pub fn restore_backup(&mut self, backup_id: &str) -> Result<LedgerHandle, BuzzkillError> {
        let store = self.store.clone().ok_or(BuzzkillError::NoBackingStore)?;
        let backup = store
            .list_backups()?
            .into_iter()
            .find(|info| info.id == backup_id)
            .ok_or_else(|| BuzzkillError::BackupNotFound(backup_id.to_string()))?;
        store.restore_backup(&backup)?;

        let engine = LedgerEngine::open(store, self.clock.clone())?
            .with_near_limit_threshold(self.config.near_limit_threshold());
        self.ledger = Arc::new(engine);
        info!(backup = %backup_id, "ledger restored");
        Ok(self.ledger())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    #[test]
    fn in_memory_session_uses_default_limit() {
        let mut session = Session::in_memory();
        session.start_period(None, "Quiz night").unwrap();
        let view = session.ledger().active_period().expect("active period");
        assert_eq!(view.summary.limit, dec!(50));
        assert_eq!(session.config().last_limit, Some(dec!(50)));
        assert!(matches!(session.backups(), Err(BuzzkillError::NoBackingStore)));
    }

    #[test]
    fn last_limit_is_remembered_across_sessions() {
        let dir = tempdir().unwrap();
        {
            let mut session = Session::open(dir.path()).unwrap();
            session.start_period(Some(dec!(75)), "Birthday").unwrap();
        }
        let mut session = Session::open(dir.path()).unwrap();
        assert_eq!(session.config().suggested_limit(), dec!(75));
        session.ledger().close_period().unwrap();
        session.start_period(None, "Afterparty").unwrap();
        let view = session.ledger().active_period().unwrap();
        assert_eq!(view.summary.limit, dec!(75));
    }

    #[test]
    fn start_succeeds_when_config_cannot_be_saved() {
        let dir = tempdir().unwrap();
        let mut session = Session::open(dir.path()).unwrap();
        session.start_period(Some(dec!(30)), "Pre-drinks").unwrap();
        std::fs::remove_file(dir.path().join("config.json")).unwrap();
        std::fs::create_dir(dir.path().join("config.json")).unwrap();

        session.start_period(Some(dec!(40)), "Club").unwrap();
        let view = session.ledger().active_period().expect("active period");
        assert_eq!(view.summary.limit, dec!(40));
        assert_eq!(session.ledger().history_len(), 1);
        assert_eq!(session.config().last_limit, Some(dec!(40)));
    }

    #[test]
    fn restoring_unknown_backup_fails() {
        let dir = tempdir().unwrap();
        let mut session = Session::open(dir.path()).unwrap();
        let err = session.restore_backup("nope.json").unwrap_err();
        assert!(matches!(err, BuzzkillError::BackupNotFound(_)));
        assert!(err.is_user_error());
    }
}
