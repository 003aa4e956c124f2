use bzk_config::ConfigError;
use bzk_core::CoreError;
use thiserror::Error;

/// Top-level failures surfaced by [`crate::Session`].
#[derive(Debug, Error)]
pub enum BuzzkillError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Backup `{0}` not found")]
    BackupNotFound(String),
    #[error("Backups are unavailable for in-memory sessions")]
    NoBackingStore,
}

impl BuzzkillError {
    /// True when the failure came from bad input rather than the environment.
    pub fn is_user_error(&self) -> bool {
        match self {
            BuzzkillError::Core(err) => err.is_validation(),
            BuzzkillError::BackupNotFound(_) | BuzzkillError::NoBackingStore => true,
            _ => false,
        }
    }
}
