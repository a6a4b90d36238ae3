use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::*;

/// Label the kiosk data has always used for the physical cash drawer.
pub const CASH_DRAWER_LABEL: &str = "Laci";

/// Represents a kas account: a named balance bucket tracked by the kiosk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: Uuid,
    pub label: String,
    pub kind: AccountKind,
    pub balance: Rupiah,
    #[serde(default)]
    pub opening_balance: Rupiah,
    /// Advisory floor surfaced to the operator; never enforced by the engines.
    #[serde(default)]
    pub minimum_balance: Rupiah,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<AccountRole>,
    /// Optimistic concurrency counter, bumped by the store on every committed write.
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Creates a new account whose balance starts at `opening_balance`.
    pub fn new(label: impl Into<String>, kind: AccountKind, opening_balance: Rupiah) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            kind,
            balance: opening_balance,
            opening_balance,
            minimum_balance: 0,
            role: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_role(mut self, role: AccountRole) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_minimum_balance(mut self, minimum: Rupiah) -> Self {
        self.minimum_balance = minimum;
        self
    }

    pub fn is_cash_drawer(&self) -> bool {
        self.role == Some(AccountRole::CashDrawer)
    }

    /// Whether the balance sits below the advisory minimum.
    pub fn below_minimum(&self) -> bool {
        self.balance < self.minimum_balance
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Enumerates the supported account classifications.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum AccountKind {
    Bank,
    EWallet,
    Merchant,
    Ppob,
    Tunai,
    Other,
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AccountKind::Bank => "Bank",
            AccountKind::EWallet => "E-Wallet",
            AccountKind::Merchant => "Merchant",
            AccountKind::Ppob => "PPOB",
            AccountKind::Tunai => "Tunai",
            AccountKind::Other => "Other",
        };
        f.write_str(label)
    }
}

/// Business roles an account can play in the transaction protocol.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AccountRole {
    /// The physical cash drawer that collects cash payments.
    CashDrawer,
}

impl fmt::Display for AccountRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountRole::CashDrawer => f.write_str("cash drawer"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_account_starts_at_opening_balance() {
        let account = Account::new("BRI", AccountKind::Bank, 250_000);
        assert_eq!(account.balance, 250_000);
        assert_eq!(account.opening_balance, 250_000);
        assert_eq!(account.version, 0);
        assert!(!account.is_cash_drawer());
    }

    #[test]
    fn minimum_balance_is_advisory() {
        let account = Account::new("DANA", AccountKind::EWallet, 10_000).with_minimum_balance(50_000);
        assert!(account.below_minimum());
    }

    #[test]
    fn role_survives_serialization() {
        let account = Account::new(CASH_DRAWER_LABEL, AccountKind::Tunai, 0)
            .with_role(AccountRole::CashDrawer);
        let json = serde_json::to_string(&account).expect("serialize");
        let back: Account = serde_json::from_str(&json).expect("deserialize");
        assert!(back.is_cash_drawer());
        assert_eq!(back.label, "Laci");
    }
}
