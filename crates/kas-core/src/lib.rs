//! kas-core
//!
//! Balance-mutation protocol for the kiosk ledger: the transaction engine, the
//! reversal engine, the duplicate guard and the store abstraction they commit through.
//! Depends on kas-domain. No terminal I/O, no file persistence.

pub mod account_service;
pub mod atomic;
pub mod duplicate;
pub mod engine;
pub mod entry_service;
pub mod error;
pub mod fees;
pub mod memory;
pub mod reconcile;
pub mod report_service;
pub mod reversal;
pub mod roles;
pub mod store;
pub mod time;

pub use account_service::*;
pub use atomic::{run_atomic, RetryPolicy, StoreTxn};
pub use duplicate::*;
pub use engine::*;
pub use entry_service::*;
pub use error::CoreError;
pub use fees::*;
pub use memory::{Documents, MemoryStore};
pub use reconcile::*;
pub use report_service::*;
pub use reversal::*;
pub use roles::AccountRoles;
pub use store::{DocumentStore, WriteBatch, WriteOp};
pub use time::{Clock, LocalDay, ManualClock, SystemClock};
