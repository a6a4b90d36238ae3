//! Document-store abstraction the engines commit through.
//!
//! The store mirrors a managed document database: a `kasAccounts` collection whose
//! documents own a ledger-entry sub-collection, one audit collection per
//! [`TransactionKind`], and append-only report collections. Balance mutations only
//! reach the store through [`DocumentStore::commit`], which applies a [`WriteBatch`]
//! entirely or not at all.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use kas_domain::{
    Account, AuditRecord, DailyReportSnapshot, LedgerEntry, ShiftReconciliation, TransactionKind,
};

use crate::CoreError;

/// A single buffered write inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Replaces an account; `account.version` must equal the stored version.
    UpdateAccount(Account),
    /// Removes an account; `version` must equal the stored version.
    DeleteAccount { id: Uuid, version: u64 },
    /// Appends an entry to its account's sub-collection.
    InsertEntry(LedgerEntry),
    DeleteEntry { account_id: Uuid, entry_id: Uuid },
    RenameEntry {
        account_id: Uuid,
        entry_id: Uuid,
        name: String,
    },
    /// Creates an audit record; fails if the id already exists in its collection.
    PutAudit(AuditRecord),
    DeleteAudit { kind: TransactionKind, id: Uuid },
}

/// All-or-nothing unit of writes plus the account versions it was computed from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    /// Accounts read while computing the batch and the versions observed.
    pub reads: Vec<(Uuid, u64)>,
    pub ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Abstraction over document databases capable of atomic multi-document commits.
///
/// `commit` must validate every read version and every write precondition before
/// applying anything. A stale version is reported as [`CoreError::Conflict`], which
/// [`crate::run_atomic`] retries.
pub trait DocumentStore: Send + Sync {
    fn account(&self, id: Uuid) -> Result<Option<Account>, CoreError>;
    fn accounts(&self) -> Result<Vec<Account>, CoreError>;
    /// Creates a new account document (admin provisioning).
    fn insert_account(&self, account: Account) -> Result<(), CoreError>;
    /// Ledger entries of one account in creation order.
    fn entries(&self, account_id: Uuid) -> Result<Vec<LedgerEntry>, CoreError>;
    fn audit(&self, kind: TransactionKind, id: Uuid) -> Result<Option<AuditRecord>, CoreError>;
    /// Audit records of `kind` dated at or after `since`.
    fn audits_since(
        &self,
        kind: TransactionKind,
        since: DateTime<Utc>,
    ) -> Result<Vec<AuditRecord>, CoreError>;
    /// Audit records of every kind dated within `[start, end)`.
    fn audits_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AuditRecord>, CoreError>;
    fn commit(&self, batch: WriteBatch) -> Result<(), CoreError>;
    fn append_daily_report(&self, report: DailyReportSnapshot) -> Result<(), CoreError>;
    fn daily_reports(&self) -> Result<Vec<DailyReportSnapshot>, CoreError>;
    fn append_shift_reconciliation(&self, shift: ShiftReconciliation) -> Result<(), CoreError>;
    fn shift_reconciliations(&self) -> Result<Vec<ShiftReconciliation>, CoreError>;
}
