//! Point-in-time reporting snapshots. Append-only once saved; never read by the engines.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{account::AccountKind, audit::TransactionKind, common::*};

/// Aggregated activity of one transaction kind over a reporting window.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct KindSummary {
    pub count: u32,
    pub principal_volume: Rupiah,
    pub service_fees: Rupiah,
    pub bank_fees: Rupiah,
    pub net_profit: Rupiah,
}

impl KindSummary {
    pub fn absorb(&mut self, principal: Rupiah, service_fee: Rupiah, bank_fee: Rupiah) {
        self.count += 1;
        self.principal_volume += principal;
        self.service_fees += service_fee;
        self.bank_fees += bank_fee;
        self.net_profit += service_fee - bank_fee;
    }
}

/// A manually entered operating expense (electricity, snacks, paper rolls...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpendingItem {
    pub description: String,
    pub amount: Rupiah,
}

/// Balance of one account at the moment a report was taken.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountBalanceSnapshot {
    pub account_id: Uuid,
    pub label: String,
    pub kind: AccountKind,
    pub balance: Rupiah,
}

/// Daily profit/loss and balance snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyReportSnapshot {
    pub id: Uuid,
    pub report_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub device_name: String,
    pub opening_cash: Rupiah,
    pub per_kind: BTreeMap<TransactionKind, KindSummary>,
    #[serde(default)]
    pub spending: Vec<SpendingItem>,
    #[serde(default)]
    pub balances: Vec<AccountBalanceSnapshot>,
}

impl DailyReportSnapshot {
    pub fn transaction_count(&self) -> u32 {
        self.per_kind.values().map(|summary| summary.count).sum()
    }

    pub fn gross_profit(&self) -> Rupiah {
        self.per_kind.values().map(|summary| summary.net_profit).sum()
    }

    pub fn total_spending(&self) -> Rupiah {
        self.spending.iter().map(|item| item.amount).sum()
    }

    /// Profit after manually entered spending.
    pub fn net_income(&self) -> Rupiah {
        self.gross_profit() - self.total_spending()
    }

    pub fn total_balance(&self) -> Rupiah {
        self.balances.iter().map(|row| row.balance).sum()
    }
}

/// End-of-shift comparison of the drawer's expected cash against a physical count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShiftReconciliation {
    pub id: Uuid,
    pub shift_start: DateTime<Utc>,
    pub shift_end: DateTime<Utc>,
    pub device_name: String,
    #[serde(default)]
    pub operator: String,
    pub cash_drawer_account_id: Uuid,
    pub expected_cash: Rupiah,
    pub counted_cash: Rupiah,
    /// `counted_cash - expected_cash`; negative means cash is missing.
    pub difference: Rupiah,
    pub transactions_in_shift: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ShiftReconciliation {
    pub fn is_balanced(&self) -> bool {
        self.difference == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_totals_subtract_spending() {
        let mut per_kind = BTreeMap::new();
        let mut transfers = KindSummary::default();
        transfers.absorb(100_000, 5_000, 0);
        transfers.absorb(2_500_000, 10_000, 2_500);
        per_kind.insert(TransactionKind::CustomerTransfer, transfers);
        let report = DailyReportSnapshot {
            id: Uuid::new_v4(),
            report_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            created_at: Utc::now(),
            device_name: "kasir-1".into(),
            opening_cash: 500_000,
            per_kind,
            spending: vec![SpendingItem {
                description: "Kertas struk".into(),
                amount: 4_000,
            }],
            balances: Vec::new(),
        };
        assert_eq!(report.transaction_count(), 2);
        assert_eq!(report.gross_profit(), 12_500);
        assert_eq!(report.net_income(), 8_500);
    }
}
