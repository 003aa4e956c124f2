//! Filesystem-backed JSON persistence for ledger snapshots.

use std::{
    cmp::Reverse,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use bzk_core::{storage::SnapshotStore, CoreError};
use bzk_domain::LedgerSnapshot;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use tracing::{debug, warn};

const LEDGER_FILE: &str = "ledger.json";
const BACKUP_DIR: &str = "backups";
const BACKUP_PREFIX: &str = "ledger";
const BACKUP_EXTENSION: &str = "json";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const TMP_SUFFIX: &str = "tmp";
pub const DEFAULT_RETENTION: usize = 5;

/// Where the live snapshot and its backups live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    pub ledger_file: PathBuf,
    pub backup_root: PathBuf,
}

impl StoragePaths {
    pub fn under(root: &Path) -> Self {
        Self {
            ledger_file: root.join(LEDGER_FILE),
            backup_root: root.join(BACKUP_DIR),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BackupInfo {
    pub id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
    pub size_bytes: u64,
    pub path: PathBuf,
}

/// Keeps the ledger in a single JSON file, copying the previous version
/// into the backup directory before each overwrite.
#[derive(Debug)]
pub struct JsonSnapshotStore {
    paths: StoragePaths,
    retention: usize,
    write_guard: Mutex<()>,
}

impl JsonSnapshotStore {
    pub fn new(paths: StoragePaths) -> Result<Self, CoreError> {
        Self::with_retention(paths, DEFAULT_RETENTION)
    }

    pub fn with_retention(paths: StoragePaths, retention: usize) -> Result<Self, CoreError> {
        if let Some(parent) = paths.ledger_file.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::create_dir_all(&paths.backup_root)?;
        Ok(Self {
            paths,
            retention: retention.max(1),
            write_guard: Mutex::new(()),
        })
    }

    pub fn ledger_path(&self) -> &Path {
        &self.paths.ledger_file
    }

    pub fn backup_root(&self) -> &Path {
        &self.paths.backup_root
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    /// Writes `snapshot` as a backup alongside the automatic ones. A backup
    /// with a note is kept until removed by hand.
    pub fn backup(
        &self,
        snapshot: &LedgerSnapshot,
        note: Option<&str>,
    ) -> Result<BackupInfo, CoreError> {
        let _guard = self.lock();
        let path = self.next_backup_path(note);
        write_atomic(&path, &serialize_snapshot(snapshot)?)?;
        self.prune_backups()?;
        backup_info(&path)
    }

    /// Backups, newest first.
    pub fn list_backups(&self) -> Result<Vec<BackupInfo>, CoreError> {
        let dir = &self.paths.backup_root;
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|ext| ext.to_str()) != Some(BACKUP_EXTENSION) {
                continue;
            }
            entries.push(backup_info(&path)?);
        }
        entries.sort_by_key(|info| Reverse((info.created_at, info.id.clone())));
        Ok(entries)
    }

    /// Replaces the live file with `backup` and returns its contents.
    pub fn restore_backup(&self, backup: &BackupInfo) -> Result<LedgerSnapshot, CoreError> {
        let _guard = self.lock();
        if !backup.path.exists() {
            return Err(CoreError::Storage(format!(
                "backup `{}` not found",
                backup.id
            )));
        }
        let snapshot = load_snapshot_from_path(&backup.path)?;
        self.backup_existing_file()?;
        save_snapshot_to_path(&snapshot, &self.paths.ledger_file)?;
        debug!(backup = %backup.id, "ledger restored from backup");
        Ok(snapshot)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.write_guard.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_backup_path(&self, note: Option<&str>) -> PathBuf {
        let now = Utc::now();
        let mut stem = format!(
            "{}_{}_{:06}",
            BACKUP_PREFIX,
            now.format(BACKUP_TIMESTAMP_FORMAT),
            now.timestamp_subsec_micros()
        );
        if let Some(label) = sanitize_backup_note(note) {
            stem.push('_');
            stem.push_str(&label);
        }
        self.paths
            .backup_root
            .join(format!("{}.{}", stem, BACKUP_EXTENSION))
    }

    fn backup_existing_file(&self) -> Result<(), CoreError> {
        let live = &self.paths.ledger_file;
        if !live.exists() {
            return Ok(());
        }
        fs::create_dir_all(&self.paths.backup_root)?;
        fs::copy(live, self.next_backup_path(None))?;
        self.prune_backups()
    }

    /// Drops automatic backups past the retention count. Named backups and
    /// files we did not write are left alone.
    fn prune_backups(&self) -> Result<(), CoreError> {
        let automatic = self
            .list_backups()?
            .into_iter()
            .filter(|entry| entry.created_at.is_some() && entry.note.is_none());
        for entry in automatic.skip(self.retention) {
            if let Err(err) = fs::remove_file(&entry.path) {
                warn!(backup = %entry.id, error = %err, "failed to prune backup");
            }
        }
        Ok(())
    }
}

impl SnapshotStore for JsonSnapshotStore {
    fn persist_snapshot(&self, snapshot: &LedgerSnapshot) -> Result<(), CoreError> {
        let _guard = self.lock();
        let payload = serialize_snapshot(snapshot)?;
        self.backup_existing_file()?;
        let path = &self.paths.ledger_file;
        let tmp = tmp_path(path);
        write_atomic(&tmp, &payload)?;
        fs::rename(&tmp, path)?;
        debug!(path = %path.display(), "ledger snapshot written");
        Ok(())
    }

    fn load_snapshot(&self) -> Result<Option<LedgerSnapshot>, CoreError> {
        let path = &self.paths.ledger_file;
        if !path.exists() {
            return Ok(None);
        }
        load_snapshot_from_path(path).map(Some)
    }
}

/// Saves a snapshot to an arbitrary path on disk.
pub fn save_snapshot_to_path(snapshot: &LedgerSnapshot, path: &Path) -> Result<(), CoreError> {
    let tmp = tmp_path(path);
    write_atomic(&tmp, &serialize_snapshot(snapshot)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Loads a snapshot from the provided filesystem path.
pub fn load_snapshot_from_path(path: &Path) -> Result<LedgerSnapshot, CoreError> {
    let data = fs::read_to_string(path)?;
    serde_json::from_str(&data).map_err(|err| CoreError::Serde(err.to_string()))
}

fn backup_info(path: &Path) -> Result<BackupInfo, CoreError> {
    let id = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| CoreError::Storage(format!("invalid backup path {}", path.display())))?;
    let size_bytes = fs::metadata(path).map(|meta| meta.len()).unwrap_or(0);
    let (created_at, note) = parse_backup_name(&id);
    Ok(BackupInfo {
        id,
        created_at,
        note,
        size_bytes,
        path: path.to_path_buf(),
    })
}

/// Splits `ledger_YYYYMMDD_HHMMSS_micros[_note].json` into its timestamp and note.
fn parse_backup_name(name: &str) -> (Option<DateTime<Utc>>, Option<String>) {
    let Some(stem) = name
        .strip_suffix(&format!(".{}", BACKUP_EXTENSION))
        .and_then(|stem| stem.strip_prefix(&format!("{}_", BACKUP_PREFIX)))
    else {
        return (None, None);
    };
    let mut segments = stem.splitn(4, '_');
    let (Some(date), Some(time), Some(micros)) = (segments.next(), segments.next(), segments.next())
    else {
        return (None, None);
    };
    if !is_digits(date, 8) || !is_digits(time, 6) || !is_digits(micros, 6) {
        return (None, None);
    }
    let created_at = NaiveDateTime::parse_from_str(&format!("{date}_{time}"), BACKUP_TIMESTAMP_FORMAT)
        .ok()
        .and_then(|naive| {
            let micros: i64 = micros.parse().ok()?;
            Some(DateTime::from_naive_utc_and_offset(naive, Utc) + Duration::microseconds(micros))
        });
    let note = segments.next().map(str::to_string);
    (created_at, note)
}

fn sanitize_backup_note(note: Option<&str>) -> Option<String> {
    let raw = note?.trim();
    if raw.is_empty() {
        return None;
    }
    let mut sanitized = String::new();
    let mut last_dash = false;
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            sanitized.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if (ch.is_whitespace() || matches!(ch, '-' | '.' | '_'))
            && !sanitized.is_empty()
            && !last_dash
        {
            sanitized.push('-');
            last_dash = true;
        }
    }
    let trimmed = sanitized.trim_matches('-').to_string();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn is_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.chars().all(|c| c.is_ascii_digit())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

fn write_atomic(path: &Path, data: &str) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.flush()?;
    file.sync_all()?;
    Ok(())
}

fn serialize_snapshot(snapshot: &LedgerSnapshot) -> Result<String, CoreError> {
    serde_json::to_string_pretty(snapshot).map_err(|err| CoreError::Serde(err.to_string()))
}
