//! kas-domain
//!
//! Pure domain models for the kiosk ledger (Account, LedgerEntry, AuditRecord, reports).
//! No I/O, no storage, no engine logic. Only data types and core enums.

pub mod account;
pub mod audit;
pub mod common;
pub mod entry;
pub mod report;

pub use account::*;
pub use audit::*;
pub use common::*;
pub use entry::*;
pub use report::*;
