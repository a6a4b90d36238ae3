//! Optimistic read-validate-write transactions over a [`DocumentStore`].
//!
//! A [`StoreTxn`] records the version of every account it reads and keeps working
//! copies that absorb balance changes, so an account touched twice in one unit
//! chains its before/after snapshots correctly. Nothing reaches the store until
//! [`run_atomic`] commits the resulting [`WriteBatch`]; a version conflict discards
//! the attempt and re-runs the body against fresh reads.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};
use uuid::Uuid;

use kas_domain::{Account, AuditRecord, LedgerEntry, Rupiah, TransactionKind};

use crate::{
    store::{DocumentStore, WriteBatch, WriteOp},
    CoreError,
};

/// Bounded retry budget for conflicting commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub const DEFAULT_ATTEMPTS: u32 = 5;

    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ATTEMPTS)
    }
}

/// Buffered view of the store for the duration of one attempt.
pub struct StoreTxn<'a> {
    store: &'a dyn DocumentStore,
    working: BTreeMap<Uuid, Account>,
    read_versions: BTreeMap<Uuid, u64>,
    dirty: BTreeSet<Uuid>,
    ops: Vec<WriteOp>,
}

impl<'a> StoreTxn<'a> {
    fn new(store: &'a dyn DocumentStore) -> Self {
        Self {
            store,
            working: BTreeMap::new(),
            read_versions: BTreeMap::new(),
            dirty: BTreeSet::new(),
            ops: Vec::new(),
        }
    }

    fn load(&mut self, id: Uuid) -> Result<&mut Account, CoreError> {
        if !self.working.contains_key(&id) {
            let account = self
                .store
                .account(id)?
                .ok_or(CoreError::AccountNotFound(id))?;
            self.read_versions.insert(id, account.version);
            self.working.insert(id, account);
        }
        self.working
            .get_mut(&id)
            .ok_or(CoreError::AccountNotFound(id))
    }

    /// Reads an account, including balance changes already made in this transaction.
    pub fn account(&mut self, id: Uuid) -> Result<&Account, CoreError> {
        self.load(id).map(|account| &*account)
    }

    /// Moves an account's working balance by `delta`, returning `(before, after)`.
    pub fn apply_delta(&mut self, id: Uuid, delta: Rupiah) -> Result<(Rupiah, Rupiah), CoreError> {
        let account = self.load(id)?;
        let before = account.balance;
        let after = before
            .checked_add(delta)
            .ok_or_else(|| CoreError::InvalidAmount(format!("balance overflow on account {id}")))?;
        account.balance = after;
        self.dirty.insert(id);
        Ok((before, after))
    }

    pub fn insert_entry(&mut self, entry: LedgerEntry) {
        self.ops.push(WriteOp::InsertEntry(entry));
    }

    pub fn delete_entry(&mut self, account_id: Uuid, entry_id: Uuid) {
        self.ops.push(WriteOp::DeleteEntry {
            account_id,
            entry_id,
        });
    }

    pub fn rename_entry(&mut self, account_id: Uuid, entry_id: Uuid, name: String) {
        self.ops.push(WriteOp::RenameEntry {
            account_id,
            entry_id,
            name,
        });
    }

    /// Reads the entries of an account and pins its version.
    pub fn entries(&mut self, account_id: Uuid) -> Result<Vec<LedgerEntry>, CoreError> {
        self.load(account_id)?;
        self.store.entries(account_id)
    }

    /// Scans every account's sub-collection for entries correlated with `audit_id`.
    ///
    /// Accounts holding a match have their version pinned, so a concurrent reversal
    /// of the same transaction conflicts instead of double-applying.
    pub fn entries_for_audit(&mut self, audit_id: Uuid) -> Result<Vec<LedgerEntry>, CoreError> {
        let mut matched = Vec::new();
        for account in self.store.accounts()? {
            let entries = self.store.entries(account.id)?;
            let hits: Vec<LedgerEntry> = entries
                .into_iter()
                .filter(|entry| entry.audit_id == Some(audit_id))
                .collect();
            if !hits.is_empty() {
                self.load(account.id)?;
                matched.extend(hits);
            }
        }
        matched.sort_by_key(|entry| entry.sequence);
        Ok(matched)
    }

    pub fn audit(&self, kind: TransactionKind, id: Uuid) -> Result<Option<AuditRecord>, CoreError> {
        self.store.audit(kind, id)
    }

    pub fn put_audit(&mut self, record: AuditRecord) {
        self.ops.push(WriteOp::PutAudit(record));
    }

    pub fn delete_audit(&mut self, kind: TransactionKind, id: Uuid) {
        self.ops.push(WriteOp::DeleteAudit { kind, id });
    }

    pub fn delete_account(&mut self, id: Uuid) -> Result<(), CoreError> {
        let version = self.load(id)?.version;
        self.ops.push(WriteOp::DeleteAccount { id, version });
        Ok(())
    }

    fn into_batch(self) -> WriteBatch {
        let StoreTxn {
            mut working,
            read_versions,
            dirty,
            ops,
            ..
        } = self;
        let mut batch_ops: Vec<WriteOp> = dirty
            .iter()
            .filter_map(|id| working.remove(id))
            .map(WriteOp::UpdateAccount)
            .collect();
        batch_ops.extend(ops);
        WriteBatch {
            reads: read_versions.into_iter().collect(),
            ops: batch_ops,
        }
    }
}

/// Runs `body` inside an optimistic transaction, retrying on write conflicts.
///
/// Errors returned by `body` abort immediately with nothing written. Conflicts are
/// retried up to `policy.max_attempts`; exhaustion and storage failures are surfaced
/// as [`CoreError::TransactionAborted`].
pub fn run_atomic<T, F>(store: &dyn DocumentStore, policy: RetryPolicy, mut body: F) -> Result<T, CoreError>
where
    F: FnMut(&mut StoreTxn<'_>) -> Result<T, CoreError>,
{
    let mut last_conflict = String::new();
    for attempt in 1..=policy.max_attempts {
        let mut txn = StoreTxn::new(store);
        let value = body(&mut txn)?;
        let batch = txn.into_batch();
        if batch.is_empty() {
            return Ok(value);
        }
        match store.commit(batch) {
            Ok(()) => return Ok(value),
            Err(CoreError::Conflict(reason)) => {
                debug!(attempt, %reason, "commit conflict, retrying");
                last_conflict = reason;
            }
            Err(err @ (CoreError::Storage(_) | CoreError::Io(_) | CoreError::Serde(_))) => {
                warn!(attempt, error = %err, "commit failed");
                return Err(CoreError::TransactionAborted(err.to_string()));
            }
            Err(err) => return Err(err),
        }
    }
    Err(CoreError::TransactionAborted(format!(
        "gave up after {} conflicting attempts: {}",
        policy.max_attempts, last_conflict
    )))
}
