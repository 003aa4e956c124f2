//! bzk-domain
//!
//! Pure domain models (BudgetPeriod, Transaction, summaries, snapshots).
//! No I/O, no CLI, no storage. Only data types and derived figures.

pub mod common;
pub mod period;
pub mod snapshot;
pub mod summary;
pub mod transaction;

pub use common::*;
pub use period::*;
pub use snapshot::*;
pub use summary::*;
pub use transaction::*;

pub use rust_decimal::Decimal;
