#![doc(test(attr(deny(warnings))))]

//! Kas Kiosk keeps the books of a banking-agent kiosk: multi-account balance
//! updates applied atomically per business transaction, reversal by audit id,
//! a same-day duplicate guard, fee tiers and ledger replay.
//!
//! The [`Kiosk`] facade wires the engines from `kas-core` to the JSON document
//! store and the persisted [`kas_config::Config`].

pub mod errors;
pub mod kiosk;
pub mod utils;

pub use errors::{KioskError, KioskResult};
pub use kiosk::Kiosk;

pub use kas_config;
pub use kas_core;
pub use kas_domain;
pub use kas_storage_json;

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        tracing::info!("{} tracing initialized.", utils::build_info::current().summary());
    });
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_does_not_panic() {
        super::init();
        super::init();
    }
}
