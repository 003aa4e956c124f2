#![doc(test(attr(deny(warnings))))]

//! Buzzkill keeps a running tab of a night out against a spending limit.
//!
//! The ledger itself lives in `bzk-core`; this crate wires it to JSON storage
//! and user configuration through [`Session`], and ships the `buzzkill_cli` shell.

pub mod cli;
pub mod errors;
pub mod session;
pub mod utils;

pub use errors::BuzzkillError;
pub use session::{LedgerHandle, Session};

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        tracing::info!("Buzzkill tracing initialized.");
    });
}
