//! Undoing a committed transaction by its audit id.

use std::{collections::BTreeMap, sync::Arc};

use tracing::{info, warn};
use uuid::Uuid;

use kas_domain::{LedgerEntry, Rupiah, TransactionKind};

use crate::{
    atomic::{run_atomic, RetryPolicy},
    store::DocumentStore,
    CoreError,
};

/// What a reversal removed and how balances moved.
#[derive(Debug, Clone, PartialEq)]
pub struct ReversalReport {
    pub audit_id: Option<Uuid>,
    pub kind: Option<TransactionKind>,
    pub audit_deleted: bool,
    pub removed_entries: Vec<LedgerEntry>,
    /// Net balance change per account; the inverse of the original execution.
    pub deltas: BTreeMap<Uuid, Rupiah>,
}

impl ReversalReport {
    pub fn net_delta(&self) -> Rupiah {
        self.deltas.values().sum()
    }
}

fn inverse_deltas(entries: &[LedgerEntry]) -> BTreeMap<Uuid, Rupiah> {
    let mut deltas = BTreeMap::new();
    for entry in entries {
        *deltas.entry(entry.account_id).or_insert(0) -= entry.signed_amount();
    }
    deltas
}

#[derive(Clone)]
pub struct ReversalEngine {
    store: Arc<dyn DocumentStore>,
    retry: RetryPolicy,
}

impl ReversalEngine {
    pub fn new(store: Arc<dyn DocumentStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Reverses the whole transaction `entry` belongs to.
    ///
    /// The audit collection comes from the entry's kind, or from its legacy category
    /// prefix when the kind was never recorded.
    pub fn reverse(&self, entry: &LedgerEntry) -> Result<ReversalReport, CoreError> {
        let audit_id = entry.audit_id.ok_or(CoreError::NonReversible(entry.id))?;
        let kind = entry
            .resolved_kind()
            .ok_or_else(|| CoreError::UnroutableCategory(entry.category.clone()))?;
        self.reverse_audit(kind, audit_id)
    }

    /// Deletes the audit record and every entry carrying its id, restoring balances.
    pub fn reverse_audit(&self, kind: TransactionKind, audit_id: Uuid) -> Result<ReversalReport, CoreError> {
        let report = run_atomic(self.store.as_ref(), self.retry, |txn| {
            let audit = txn.audit(kind, audit_id)?;
            let entries = txn.entries_for_audit(audit_id)?;
            if audit.is_none() && entries.is_empty() {
                return Err(CoreError::AuditNotFound(audit_id));
            }
            if audit.is_none() {
                warn!(
                    audit = %audit_id,
                    collection = kind.collection(),
                    entries = entries.len(),
                    "audit record missing; reversing surviving entries"
                );
            }

            let deltas = inverse_deltas(&entries);
            for entry in &entries {
                txn.delete_entry(entry.account_id, entry.id);
            }
            for (account_id, delta) in &deltas {
                txn.apply_delta(*account_id, *delta)?;
            }
            if audit.is_some() {
                txn.delete_audit(kind, audit_id);
            }
            Ok(ReversalReport {
                audit_id: Some(audit_id),
                kind: Some(kind),
                audit_deleted: audit.is_some(),
                removed_entries: entries,
                deltas,
            })
        })?;

        info!(
            audit = %audit_id,
            kind = %kind,
            entries = report.removed_entries.len(),
            net = report.net_delta(),
            "transaction reversed"
        );
        Ok(report)
    }

    /// Removes one uncorrelated legacy entry and reverts its balance effect.
    ///
    /// Entries that carry an audit id must go through [`Self::reverse`] so the rest
    /// of their transaction is not left behind.
    pub fn reverse_entry_only(&self, entry: &LedgerEntry) -> Result<ReversalReport, CoreError> {
        if let Some(audit_id) = entry.audit_id {
            return Err(CoreError::Validation(format!(
                "entry {} belongs to transaction {audit_id}; reverse the transaction instead",
                entry.id
            )));
        }
        let report = run_atomic(self.store.as_ref(), self.retry, |txn| {
            let stored = txn
                .entries(entry.account_id)?
                .into_iter()
                .find(|candidate| candidate.id == entry.id)
                .ok_or(CoreError::EntryNotFound(entry.id))?;
            let deltas = inverse_deltas(std::slice::from_ref(&stored));
            txn.delete_entry(stored.account_id, stored.id);
            txn.apply_delta(stored.account_id, -stored.signed_amount())?;
            Ok(ReversalReport {
                audit_id: None,
                kind: stored.resolved_kind(),
                audit_deleted: false,
                removed_entries: vec![stored],
                deltas,
            })
        })?;

        warn!(
            entry = %entry.id,
            account = %entry.account_id,
            amount = entry.amount,
            "single entry reversed without audit correlation"
        );
        Ok(report)
    }
}
