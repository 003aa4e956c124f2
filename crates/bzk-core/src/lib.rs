//! bzk-core
//!
//! The budget ledger engine and the seams it talks through.
//! Depends on bzk-domain. No CLI, no terminal I/O, no direct filesystem access.

pub mod engine;
pub mod error;
pub mod storage;
pub mod time;

pub use engine::{LedgerEngine, PersistenceStatus};
pub use error::CoreError;
pub use storage::{MemorySnapshotStore, SnapshotStore};
pub use time::{Clock, ManualClock, SystemClock};

pub type Result<T> = std::result::Result<T, CoreError>;
