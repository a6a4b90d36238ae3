//! Audit records: one canonical document per business transaction.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::*;

/// Every business-transaction kind the kiosk records, each with its own audit collection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    CustomerTransfer,
    CustomerWithdrawal,
    CustomerTopUp,
    CustomerEmoneyTopUp,
    CustomerVaPayment,
    EdcService,
    KjpWithdrawal,
    Ppob,
    PpobPlnPostpaid,
    PpobPdam,
    PpobBpjs,
    PpobWifi,
    PpobPaketTelpon,
    Settlement,
}

impl TransactionKind {
    pub const ALL: [TransactionKind; 14] = [
        TransactionKind::CustomerTransfer,
        TransactionKind::CustomerWithdrawal,
        TransactionKind::CustomerTopUp,
        TransactionKind::CustomerEmoneyTopUp,
        TransactionKind::CustomerVaPayment,
        TransactionKind::EdcService,
        TransactionKind::KjpWithdrawal,
        TransactionKind::Ppob,
        TransactionKind::PpobPlnPostpaid,
        TransactionKind::PpobPdam,
        TransactionKind::PpobBpjs,
        TransactionKind::PpobWifi,
        TransactionKind::PpobPaketTelpon,
        TransactionKind::Settlement,
    ];

    /// Name of the document collection holding this kind's audit records.
    pub fn collection(self) -> &'static str {
        match self {
            TransactionKind::CustomerTransfer => "customerTransfers",
            TransactionKind::CustomerWithdrawal => "customerWithdrawals",
            TransactionKind::CustomerTopUp => "customerTopUps",
            TransactionKind::CustomerEmoneyTopUp => "customerEmoneyTopUps",
            TransactionKind::CustomerVaPayment => "customerVAPayments",
            TransactionKind::EdcService => "edcServices",
            TransactionKind::KjpWithdrawal => "customerKJPWithdrawals",
            TransactionKind::Ppob => "ppobTransactions",
            TransactionKind::PpobPlnPostpaid => "ppobPlnPostpaid",
            TransactionKind::PpobPdam => "ppobPdam",
            TransactionKind::PpobBpjs => "ppobBpjs",
            TransactionKind::PpobWifi => "ppobWifi",
            TransactionKind::PpobPaketTelpon => "ppobPaketTelpon",
            TransactionKind::Settlement => "settlements",
        }
    }

    /// Prefix shared by the category tags of every ledger entry this kind writes.
    pub fn category_prefix(self) -> &'static str {
        match self {
            TransactionKind::CustomerTransfer => "customer_transfer",
            TransactionKind::CustomerWithdrawal => "customer_withdrawal",
            TransactionKind::CustomerTopUp => "customer_topup",
            TransactionKind::CustomerEmoneyTopUp => "customer_emoney_topup",
            TransactionKind::CustomerVaPayment => "customer_va_payment",
            TransactionKind::EdcService => "edc_service",
            TransactionKind::KjpWithdrawal => "customer_kjp_withdrawal",
            TransactionKind::Ppob => "ppob",
            TransactionKind::PpobPlnPostpaid => "ppob_pln_postpaid",
            TransactionKind::PpobPdam => "ppob_pdam",
            TransactionKind::PpobBpjs => "ppob_bpjs",
            TransactionKind::PpobWifi => "ppob_wifi",
            TransactionKind::PpobPaketTelpon => "ppob_paket_telpon",
            TransactionKind::Settlement => "settlement",
        }
    }

    /// Builds the category tag `<prefix>_<suffix>` for a ledger entry.
    pub fn category(self, suffix: &str) -> String {
        format!("{}_{}", self.category_prefix(), suffix)
    }

    /// Routes a legacy category tag to its kind by the longest matching prefix.
    ///
    /// A prefix only matches on a `_` boundary, so `ppob_pdam_debit` resolves to
    /// [`TransactionKind::PpobPdam`] and never to the generic [`TransactionKind::Ppob`].
    pub fn from_category(category: &str) -> Option<TransactionKind> {
        let category = category.trim();
        Self::ALL
            .iter()
            .copied()
            .filter(|kind| {
                let prefix = kind.category_prefix();
                category == prefix
                    || category
                        .strip_prefix(prefix)
                        .is_some_and(|rest| rest.starts_with('_'))
            })
            .max_by_key(|kind| kind.category_prefix().len())
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransactionKind::CustomerTransfer => "Transfer",
            TransactionKind::CustomerWithdrawal => "Tarik Tunai",
            TransactionKind::CustomerTopUp => "Top Up",
            TransactionKind::CustomerEmoneyTopUp => "Top Up E-Money",
            TransactionKind::CustomerVaPayment => "Pembayaran VA",
            TransactionKind::EdcService => "Layanan EDC",
            TransactionKind::KjpWithdrawal => "Tarik Tunai KJP",
            TransactionKind::Ppob => "PPOB",
            TransactionKind::PpobPlnPostpaid => "PLN Pascabayar",
            TransactionKind::PpobPdam => "PDAM",
            TransactionKind::PpobBpjs => "BPJS",
            TransactionKind::PpobWifi => "WiFi",
            TransactionKind::PpobPaketTelpon => "Paket Telpon",
            TransactionKind::Settlement => "Settlement",
        };
        f.write_str(label)
    }
}

/// How the customer pays the kiosk for a transaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PaymentMethod {
    /// Cash into the drawer.
    Tunai,
    /// Transfer into a named kas account.
    Transfer,
    /// Part cash, remainder by transfer.
    Split,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PaymentMethod::Tunai => "Tunai",
            PaymentMethod::Transfer => "Transfer",
            PaymentMethod::Split => "Split",
        };
        f.write_str(label)
    }
}

/// Canonical business-transaction document and the correlation id of its ledger entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditRecord {
    pub id: Uuid,
    pub kind: TransactionKind,
    pub date: DateTime<Utc>,
    pub device_name: String,
    pub counterparty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_detail: Option<String>,
    pub source_account_id: Uuid,
    #[serde(default)]
    pub collecting_account_ids: Vec<Uuid>,
    pub payment_method: PaymentMethod,
    pub principal_amount: Rupiah,
    #[serde(default)]
    pub fee_amount: Rupiah,
    #[serde(default)]
    pub service_fee: Rupiah,
    #[serde(default)]
    pub net_profit: Rupiah,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_cash_amount: Option<Rupiah>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_transfer_amount: Option<Rupiah>,
    #[serde(default)]
    pub entry_ids: Vec<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}
