//! Ledger entries: the append-only movement log kept per kas account.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{audit::TransactionKind, common::*};

/// Direction of a balance movement on the owning account.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EntryDirection {
    Debit,
    Credit,
}

impl EntryDirection {
    /// Applies `amount` to `balance` in this direction.
    pub fn apply(self, balance: Rupiah, amount: Rupiah) -> Rupiah {
        balance + self.signed(amount)
    }

    /// Signed effect of `amount` on the owning account's balance.
    pub fn signed(self, amount: Rupiah) -> Rupiah {
        match self {
            EntryDirection::Debit => -amount,
            EntryDirection::Credit => amount,
        }
    }
}

impl fmt::Display for EntryDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryDirection::Debit => f.write_str("debit"),
            EntryDirection::Credit => f.write_str("credit"),
        }
    }
}

/// One signed balance movement with its before/after snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub account_id: Uuid,
    pub direction: EntryDirection,
    pub name: String,
    #[serde(default)]
    pub counterparty_label: String,
    pub date: DateTime<Utc>,
    pub amount: Rupiah,
    pub balance_before: Rupiah,
    pub balance_after: Rupiah,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TransactionKind>,
    #[serde(default)]
    pub device_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_id: Option<Uuid>,
    /// Creation order assigned by the store when the entry is committed.
    #[serde(default)]
    pub sequence: u64,
}

impl LedgerEntry {
    /// Signed effect of this entry on its account.
    pub fn signed_amount(&self) -> Rupiah {
        self.direction.signed(self.amount)
    }

    /// Whether `balance_after` matches `balance_before` moved by `amount`.
    pub fn is_well_formed(&self) -> bool {
        self.amount > 0 && self.direction.apply(self.balance_before, self.amount) == self.balance_after
    }

    /// Resolves the transaction kind, falling back to the legacy category prefix.
    pub fn resolved_kind(&self) -> Option<TransactionKind> {
        self.kind
            .or_else(|| TransactionKind::from_category(&self.category))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(direction: EntryDirection, before: Rupiah, amount: Rupiah, after: Rupiah) -> LedgerEntry {
        LedgerEntry {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            direction,
            name: "test".into(),
            counterparty_label: String::new(),
            date: Utc::now(),
            amount,
            balance_before: before,
            balance_after: after,
            category: "ppob_pdam_debit".into(),
            kind: None,
            device_name: String::new(),
            audit_id: None,
            sequence: 0,
        }
    }

    #[test]
    fn well_formed_checks_direction() {
        assert!(entry(EntryDirection::Debit, 100, 40, 60).is_well_formed());
        assert!(entry(EntryDirection::Credit, 100, 40, 140).is_well_formed());
        assert!(!entry(EntryDirection::Credit, 100, 40, 60).is_well_formed());
        assert!(!entry(EntryDirection::Debit, 100, 0, 100).is_well_formed());
    }

    #[test]
    fn resolved_kind_prefers_explicit_kind() {
        let mut legacy = entry(EntryDirection::Debit, 10, 5, 5);
        assert_eq!(legacy.resolved_kind(), Some(TransactionKind::PpobPdam));
        legacy.kind = Some(TransactionKind::Settlement);
        assert_eq!(legacy.resolved_kind(), Some(TransactionKind::Settlement));
    }

    #[test]
    fn direction_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&EntryDirection::Debit).unwrap(), "\"debit\"");
    }
}
