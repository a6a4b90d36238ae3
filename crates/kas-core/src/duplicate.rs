//! Same-day double-submission heuristic.
//!
//! The guard is advisory: it never blocks on its own, and a failed lookup is treated
//! as "no duplicate". Two near-identical submissions racing each other can both pass;
//! the check runs outside the atomic unit.

use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use kas_domain::{normalize_name, AuditRecord, Rupiah, TransactionKind};

use crate::{
    store::DocumentStore,
    time::{Clock, LocalDay},
};

/// The fields of a pending transaction that identify a probable repeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateCandidate {
    pub kind: TransactionKind,
    pub counterparty: String,
    pub account_id: Uuid,
    pub principal_amount: Rupiah,
}

impl DuplicateCandidate {
    fn matches(&self, record: &AuditRecord) -> bool {
        record.kind == self.kind
            && record.source_account_id == self.account_id
            && record.principal_amount == self.principal_amount
            && normalize_name(&record.counterparty) == normalize_name(&self.counterparty)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DuplicateCheck {
    NoDuplicate,
    Duplicate(Box<AuditRecord>),
}

impl DuplicateCheck {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, DuplicateCheck::Duplicate(_))
    }
}

#[derive(Clone)]
pub struct DuplicateGuard {
    clock: Arc<dyn Clock>,
    local_day: LocalDay,
}

impl DuplicateGuard {
    pub fn new(clock: Arc<dyn Clock>, local_day: LocalDay) -> Self {
        Self { clock, local_day }
    }

    /// Compares `candidate` with the records dated since local midnight.
    ///
    /// Records from earlier days are ignored even when passed in.
    pub fn check(&self, candidate: &DuplicateCandidate, records: &[AuditRecord]) -> DuplicateCheck {
        let midnight = self.local_day.midnight_before(self.clock.now());
        records
            .iter()
            .filter(|record| record.date >= midnight)
            .find(|record| candidate.matches(record))
            .map(|record| DuplicateCheck::Duplicate(Box::new(record.clone())))
            .unwrap_or(DuplicateCheck::NoDuplicate)
    }

    /// Loads today's records of the candidate's kind and checks them, failing open.
    pub fn check_store(&self, store: &dyn DocumentStore, candidate: &DuplicateCandidate) -> DuplicateCheck {
        let midnight = self.local_day.midnight_before(self.clock.now());
        match store.audits_since(candidate.kind, midnight) {
            Ok(records) => self.check(candidate, &records),
            Err(err) => {
                warn!(error = %err, kind = %candidate.kind, "duplicate lookup failed; continuing");
                DuplicateCheck::NoDuplicate
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualClock;
    use chrono::{Duration, TimeZone, Utc};
    use kas_domain::PaymentMethod;

    fn record(account_id: Uuid, counterparty: &str, amount: Rupiah, at: chrono::DateTime<Utc>) -> AuditRecord {
        AuditRecord {
            id: Uuid::new_v4(),
            kind: TransactionKind::CustomerTransfer,
            date: at,
            device_name: "kasir".into(),
            counterparty: counterparty.into(),
            destination_detail: None,
            source_account_id: account_id,
            collecting_account_ids: Vec::new(),
            payment_method: PaymentMethod::Tunai,
            principal_amount: amount,
            fee_amount: 0,
            service_fee: 0,
            net_profit: 0,
            split_cash_amount: None,
            split_transfer_amount: None,
            entry_ids: Vec::new(),
            notes: None,
        }
    }

    #[test]
    fn normalized_names_match() {
        // 10:00 WIB
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 5, 1, 3, 0, 0).unwrap()));
        let guard = DuplicateGuard::new(clock.clone(), LocalDay::wib());
        let account = Uuid::new_v4();
        let records = vec![record(account, "Budi Santoso", 150_000, clock.now() - Duration::hours(1))];
        let candidate = DuplicateCandidate {
            kind: TransactionKind::CustomerTransfer,
            counterparty: "budi  santoso!".into(),
            account_id: account,
            principal_amount: 150_000,
        };
        assert!(guard.check(&candidate, &records).is_duplicate());

        let different_amount = DuplicateCandidate {
            principal_amount: 150_001,
            ..candidate.clone()
        };
        assert!(!guard.check(&different_amount, &records).is_duplicate());

        let different_account = DuplicateCandidate {
            account_id: Uuid::new_v4(),
            ..candidate
        };
        assert!(!guard.check(&different_account, &records).is_duplicate());
    }

    #[test]
    fn records_before_local_midnight_are_ignored() {
        // 00:30 WIB on 2 May; the record was written at 23:50 WIB on 1 May.
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 5, 1, 17, 30, 0).unwrap()));
        let guard = DuplicateGuard::new(clock, LocalDay::wib());
        let account = Uuid::new_v4();
        let yesterday = Utc.with_ymd_and_hms(2025, 5, 1, 16, 50, 0).unwrap();
        let records = vec![record(account, "Siti", 50_000, yesterday)];
        let candidate = DuplicateCandidate {
            kind: TransactionKind::CustomerTransfer,
            counterparty: "Siti".into(),
            account_id: account,
            principal_amount: 50_000,
        };
        assert_eq!(guard.check(&candidate, &records), DuplicateCheck::NoDuplicate);
    }
}
