//! Replays an account's ledger from its opening balance.

use uuid::Uuid;

use kas_domain::{LedgerEntry, Rupiah};

use crate::{store::DocumentStore, CoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayIssue {
    /// `balance_after` does not follow from `balance_before` and the amount.
    Malformed { entry_id: Uuid, sequence: u64 },
    /// `balance_before` differs from the running balance. Entries written after a
    /// reversed transaction legitimately carry stale snapshots.
    ChainBreak {
        entry_id: Uuid,
        sequence: u64,
        expected_before: Rupiah,
        recorded_before: Rupiah,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayReport {
    pub account_id: Uuid,
    pub opening_balance: Rupiah,
    pub replayed_balance: Rupiah,
    pub stored_balance: Rupiah,
    pub entries: usize,
    pub issues: Vec<ReplayIssue>,
}

impl ReplayReport {
    pub fn malformed(&self) -> impl Iterator<Item = &ReplayIssue> {
        self.issues
            .iter()
            .filter(|issue| matches!(issue, ReplayIssue::Malformed { .. }))
    }

    pub fn chain_breaks(&self) -> usize {
        self.issues
            .iter()
            .filter(|issue| matches!(issue, ReplayIssue::ChainBreak { .. }))
            .count()
    }

    pub fn balance_matches(&self) -> bool {
        self.replayed_balance == self.stored_balance
    }

    pub fn is_consistent(&self) -> bool {
        self.malformed().next().is_none() && self.balance_matches()
    }
}

/// Replays `entries` from `opening_balance` in sequence order.
pub fn replay_entries(
    account_id: Uuid,
    opening_balance: Rupiah,
    stored_balance: Rupiah,
    entries: &[LedgerEntry],
) -> ReplayReport {
    let mut ordered: Vec<&LedgerEntry> = entries.iter().collect();
    ordered.sort_by_key(|entry| entry.sequence);

    let mut running = opening_balance;
    let mut issues = Vec::new();
    for entry in &ordered {
        if !entry.is_well_formed() {
            issues.push(ReplayIssue::Malformed {
                entry_id: entry.id,
                sequence: entry.sequence,
            });
        }
        if entry.balance_before != running {
            issues.push(ReplayIssue::ChainBreak {
                entry_id: entry.id,
                sequence: entry.sequence,
                expected_before: running,
                recorded_before: entry.balance_before,
            });
        }
        running += entry.signed_amount();
    }

    ReplayReport {
        account_id,
        opening_balance,
        replayed_balance: running,
        stored_balance,
        entries: ordered.len(),
        issues,
    }
}

/// Loads an account and its ledger and replays it.
pub fn replay_account(store: &dyn DocumentStore, account_id: Uuid) -> Result<ReplayReport, CoreError> {
    let account = store
        .account(account_id)?
        .ok_or(CoreError::AccountNotFound(account_id))?;
    let entries = store.entries(account_id)?;
    Ok(replay_entries(
        account.id,
        account.opening_balance,
        account.balance,
        &entries,
    ))
}
