//! In-process reference implementation of [`DocumentStore`].
//!
//! [`Documents`] is the whole document set; [`MemoryStore`] guards it with a mutex so
//! that validation and application of a [`WriteBatch`] happen under one lock. Durable
//! stores reuse it through [`MemoryStore::commit_with`], which persists the candidate
//! document set before it becomes visible.

use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use kas_domain::{
    Account, AuditRecord, DailyReportSnapshot, LedgerEntry, ShiftReconciliation, TransactionKind,
};

use crate::{
    store::{DocumentStore, WriteBatch, WriteOp},
    CoreError,
};

/// Every document the kiosk keeps, laid out like the collections of the document database.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Documents {
    #[serde(default)]
    pub kas_accounts: BTreeMap<Uuid, Account>,
    /// Ledger-entry sub-collection of each account, in creation order.
    #[serde(default)]
    pub transactions: BTreeMap<Uuid, Vec<LedgerEntry>>,
    /// Audit collections keyed by collection name.
    #[serde(default)]
    pub audits: BTreeMap<String, BTreeMap<Uuid, AuditRecord>>,
    #[serde(default)]
    pub daily_reports: Vec<DailyReportSnapshot>,
    #[serde(default)]
    pub shift_reconciliations: Vec<ShiftReconciliation>,
    #[serde(default)]
    pub next_sequence: u64,
}

impl Documents {
    pub fn audit_count(&self) -> usize {
        self.audits.values().map(|records| records.len()).sum()
    }

    pub fn entry_count(&self) -> usize {
        self.transactions.values().map(|entries| entries.len()).sum()
    }

    fn find_entry(&self, account_id: Uuid, entry_id: Uuid) -> Option<&LedgerEntry> {
        self.transactions
            .get(&account_id)
            .and_then(|entries| entries.iter().find(|entry| entry.id == entry_id))
    }

    fn check_version(&self, id: Uuid, expected: u64) -> Result<(), CoreError> {
        match self.kas_accounts.get(&id) {
            Some(stored) if stored.version == expected => Ok(()),
            Some(stored) => Err(CoreError::Conflict(format!(
                "account {} changed (read version {}, stored version {})",
                id, expected, stored.version
            ))),
            None => Err(CoreError::Conflict(format!("account {} no longer exists", id))),
        }
    }

    /// Checks every precondition of `batch` without modifying anything.
    pub fn validate(&self, batch: &WriteBatch) -> Result<(), CoreError> {
        for (id, version) in &batch.reads {
            self.check_version(*id, *version)?;
        }
        for op in &batch.ops {
            match op {
                WriteOp::UpdateAccount(account) => self.check_version(account.id, account.version)?,
                WriteOp::DeleteAccount { id, version } => {
                    self.check_version(*id, *version)?;
                    if self
                        .transactions
                        .get(id)
                        .is_some_and(|entries| !entries.is_empty())
                    {
                        return Err(CoreError::Validation(format!(
                            "account {} has linked ledger entries",
                            id
                        )));
                    }
                }
                WriteOp::InsertEntry(entry) => {
                    if !self.kas_accounts.contains_key(&entry.account_id) {
                        return Err(CoreError::AccountNotFound(entry.account_id));
                    }
                    if self.find_entry(entry.account_id, entry.id).is_some() {
                        return Err(CoreError::Conflict(format!(
                            "ledger entry {} already exists",
                            entry.id
                        )));
                    }
                }
                WriteOp::DeleteEntry {
                    account_id,
                    entry_id,
                } => {
                    if self.find_entry(*account_id, *entry_id).is_none() {
                        return Err(CoreError::Conflict(format!(
                            "ledger entry {} was already removed",
                            entry_id
                        )));
                    }
                }
                WriteOp::RenameEntry {
                    account_id,
                    entry_id,
                    ..
                } => {
                    if self.find_entry(*account_id, *entry_id).is_none() {
                        return Err(CoreError::EntryNotFound(*entry_id));
                    }
                }
                WriteOp::PutAudit(record) => {
                    let exists = self
                        .audits
                        .get(record.kind.collection())
                        .is_some_and(|records| records.contains_key(&record.id));
                    if exists {
                        return Err(CoreError::Conflict(format!(
                            "audit record {} already exists",
                            record.id
                        )));
                    }
                }
                WriteOp::DeleteAudit { kind, id } => {
                    let exists = self
                        .audits
                        .get(kind.collection())
                        .is_some_and(|records| records.contains_key(id));
                    if !exists {
                        return Err(CoreError::Conflict(format!(
                            "audit record {} was already removed",
                            id
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Applies a batch that already passed [`Documents::validate`].
    pub fn apply(&mut self, batch: WriteBatch) {
        for op in batch.ops {
            match op {
                WriteOp::UpdateAccount(mut account) => {
                    account.version += 1;
                    account.touch();
                    self.kas_accounts.insert(account.id, account);
                }
                WriteOp::DeleteAccount { id, .. } => {
                    self.kas_accounts.remove(&id);
                    self.transactions.remove(&id);
                }
                WriteOp::InsertEntry(mut entry) => {
                    self.next_sequence += 1;
                    entry.sequence = self.next_sequence;
                    self.transactions
                        .entry(entry.account_id)
                        .or_default()
                        .push(entry);
                }
                WriteOp::DeleteEntry {
                    account_id,
                    entry_id,
                } => {
                    if let Some(entries) = self.transactions.get_mut(&account_id) {
                        entries.retain(|entry| entry.id != entry_id);
                    }
                }
                WriteOp::RenameEntry {
                    account_id,
                    entry_id,
                    name,
                } => {
                    if let Some(entry) = self
                        .transactions
                        .get_mut(&account_id)
                        .and_then(|entries| entries.iter_mut().find(|entry| entry.id == entry_id))
                    {
                        entry.name = name;
                    }
                }
                WriteOp::PutAudit(record) => {
                    self.audits
                        .entry(record.kind.collection().to_string())
                        .or_default()
                        .insert(record.id, record);
                }
                WriteOp::DeleteAudit { kind, id } => {
                    if let Some(records) = self.audits.get_mut(kind.collection()) {
                        records.remove(&id);
                    }
                }
            }
        }
    }

    /// Adds a new account. Labels are unique ignoring case and surrounding space.
    pub fn insert_account(&mut self, account: Account) -> Result<(), CoreError> {
        if self.kas_accounts.contains_key(&account.id) {
            return Err(CoreError::Conflict(format!(
                "account {} already exists",
                account.id
            )));
        }
        let label = account.label.trim().to_lowercase();
        if self
            .kas_accounts
            .values()
            .any(|existing| existing.label.trim().to_lowercase() == label)
        {
            return Err(CoreError::DuplicateLabel(account.label.trim().to_string()));
        }
        self.transactions.entry(account.id).or_default();
        self.kas_accounts.insert(account.id, account);
        Ok(())
    }

    pub fn append_daily_report(&mut self, report: DailyReportSnapshot) -> Result<(), CoreError> {
        if self.daily_reports.iter().any(|saved| saved.id == report.id) {
            return Err(CoreError::ReportExists(report.id));
        }
        self.daily_reports.push(report);
        Ok(())
    }

    pub fn append_shift(&mut self, shift: ShiftReconciliation) -> Result<(), CoreError> {
        if self
            .shift_reconciliations
            .iter()
            .any(|saved| saved.id == shift.id)
        {
            return Err(CoreError::ReportExists(shift.id));
        }
        self.shift_reconciliations.push(shift);
        Ok(())
    }
}

/// Mutex-guarded [`Documents`] implementing the atomic commit contract.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: Mutex<Documents>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_documents(docs: Documents) -> Self {
        Self {
            docs: Mutex::new(docs),
        }
    }

    /// Copy of the current document set.
    pub fn snapshot(&self) -> Documents {
        self.lock().clone()
    }

    /// Commits `batch`, letting `persist` see the resulting documents before they are published.
    ///
    /// If validation or `persist` fails, the visible document set is unchanged.
    pub fn commit_with<F>(&self, batch: WriteBatch, persist: F) -> Result<(), CoreError>
    where
        F: FnOnce(&Documents) -> Result<(), CoreError>,
    {
        self.update_with(
            |docs| {
                docs.validate(&batch)?;
                docs.apply(batch);
                Ok(())
            },
            persist,
        )
    }

    /// Runs `change` against a copy of the documents and publishes it once `persist` succeeds.
    pub fn update_with<T, F, P>(&self, change: F, persist: P) -> Result<T, CoreError>
    where
        F: FnOnce(&mut Documents) -> Result<T, CoreError>,
        P: FnOnce(&Documents) -> Result<(), CoreError>,
    {
        let mut guard = self.lock();
        let mut next = guard.clone();
        let value = change(&mut next)?;
        persist(&next)?;
        *guard = next;
        Ok(value)
    }

    fn lock(&self) -> MutexGuard<'_, Documents> {
        self.docs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DocumentStore for MemoryStore {
    fn account(&self, id: Uuid) -> Result<Option<Account>, CoreError> {
        Ok(self.lock().kas_accounts.get(&id).cloned())
    }

    fn accounts(&self) -> Result<Vec<Account>, CoreError> {
        Ok(self.lock().kas_accounts.values().cloned().collect())
    }

    fn insert_account(&self, account: Account) -> Result<(), CoreError> {
        self.lock().insert_account(account)
    }

    fn entries(&self, account_id: Uuid) -> Result<Vec<LedgerEntry>, CoreError> {
        let docs = self.lock();
        if !docs.kas_accounts.contains_key(&account_id) {
            return Err(CoreError::AccountNotFound(account_id));
        }
        Ok(docs
            .transactions
            .get(&account_id)
            .cloned()
            .unwrap_or_default())
    }

    fn audit(&self, kind: TransactionKind, id: Uuid) -> Result<Option<AuditRecord>, CoreError> {
        Ok(self
            .lock()
            .audits
            .get(kind.collection())
            .and_then(|records| records.get(&id))
            .cloned())
    }

    fn audits_since(
        &self,
        kind: TransactionKind,
        since: DateTime<Utc>,
    ) -> Result<Vec<AuditRecord>, CoreError> {
        let docs = self.lock();
        let mut records: Vec<AuditRecord> = docs
            .audits
            .get(kind.collection())
            .map(|records| {
                records
                    .values()
                    .filter(|record| record.date >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        records.sort_by_key(|record| record.date);
        Ok(records)
    }

    fn audits_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AuditRecord>, CoreError> {
        let docs = self.lock();
        let mut records: Vec<AuditRecord> = docs
            .audits
            .values()
            .flat_map(|records| records.values())
            .filter(|record| record.date >= start && record.date < end)
            .cloned()
            .collect();
        records.sort_by_key(|record| record.date);
        Ok(records)
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), CoreError> {
        let mut docs = self.lock();
        docs.validate(&batch)?;
        docs.apply(batch);
        Ok(())
    }

    fn append_daily_report(&self, report: DailyReportSnapshot) -> Result<(), CoreError> {
        self.lock().append_daily_report(report)
    }

    fn daily_reports(&self) -> Result<Vec<DailyReportSnapshot>, CoreError> {
        Ok(self.lock().daily_reports.clone())
    }

    fn append_shift_reconciliation(&self, shift: ShiftReconciliation) -> Result<(), CoreError> {
        self.lock().append_shift(shift)
    }

    fn shift_reconciliations(&self) -> Result<Vec<ShiftReconciliation>, CoreError> {
        Ok(self.lock().shift_reconciliations.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kas_domain::{AccountKind, EntryDirection};

    fn seeded() -> (MemoryStore, Account) {
        let store = MemoryStore::new();
        let account = Account::new("BRI", AccountKind::Bank, 100_000);
        store.insert_account(account.clone()).unwrap();
        (store, account)
    }

    #[test]
    fn insert_rejects_a_label_already_in_use() {
        let (store, _) = seeded();
        let err = store
            .insert_account(Account::new(" bri ", AccountKind::Bank, 0))
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateLabel(ref label) if label == "bri"));
        assert_eq!(store.accounts().unwrap().len(), 1);
    }

    fn entry_for(account: &Account) -> LedgerEntry {
        LedgerEntry {
            id: Uuid::new_v4(),
            account_id: account.id,
            direction: EntryDirection::Debit,
            name: "memo".into(),
            counterparty_label: String::new(),
            date: Utc::now(),
            amount: 10_000,
            balance_before: 100_000,
            balance_after: 90_000,
            category: "customer_transfer_debit".into(),
            kind: None,
            device_name: String::new(),
            audit_id: None,
            sequence: 0,
        }
    }

    #[test]
    fn stale_version_is_a_conflict_and_applies_nothing() {
        let (store, account) = seeded();
        let mut stale = account.clone();
        stale.version = 7;
        stale.balance = 1;
        let batch = WriteBatch {
            reads: Vec::new(),
            ops: vec![WriteOp::InsertEntry(entry_for(&account)), WriteOp::UpdateAccount(stale)],
        };
        let err = store.commit(batch).expect_err("stale version must conflict");
        assert!(matches!(err, CoreError::Conflict(_)), "unexpected error: {err:?}");
        assert_eq!(store.snapshot().entry_count(), 0);
        assert_eq!(store.account(account.id).unwrap().unwrap().balance, 100_000);
    }

    #[test]
    fn commit_bumps_version_and_assigns_sequence() {
        let (store, account) = seeded();
        let mut updated = account.clone();
        updated.balance = 90_000;
        let batch = WriteBatch {
            reads: vec![(account.id, 0)],
            ops: vec![
                WriteOp::UpdateAccount(updated),
                WriteOp::InsertEntry(entry_for(&account)),
                WriteOp::InsertEntry(entry_for(&account)),
            ],
        };
        store.commit(batch).expect("commit");
        let stored = store.account(account.id).unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.balance, 90_000);
        let sequences: Vec<u64> = store
            .entries(account.id)
            .unwrap()
            .iter()
            .map(|entry| entry.sequence)
            .collect();
        assert_eq!(sequences, vec![1, 2]);
    }

    #[test]
    fn failing_persist_hook_keeps_previous_documents() {
        let (store, account) = seeded();
        let batch = WriteBatch {
            reads: Vec::new(),
            ops: vec![WriteOp::InsertEntry(entry_for(&account))],
        };
        let err = store
            .commit_with(batch, |_| Err(CoreError::Storage("disk full".into())))
            .expect_err("hook failure must surface");
        assert!(matches!(err, CoreError::Storage(_)));
        assert_eq!(store.snapshot().entry_count(), 0);
    }

    #[test]
    fn daily_reports_are_append_only() {
        let store = MemoryStore::new();
        let report = DailyReportSnapshot {
            id: Uuid::new_v4(),
            report_date: Utc::now().date_naive(),
            created_at: Utc::now(),
            device_name: "kasir".into(),
            opening_cash: 0,
            per_kind: BTreeMap::new(),
            spending: Vec::new(),
            balances: Vec::new(),
        };
        store.append_daily_report(report.clone()).unwrap();
        let err = store.append_daily_report(report).unwrap_err();
        assert!(matches!(err, CoreError::ReportExists(_)));
    }
}
