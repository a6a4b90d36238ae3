//! Daily profit snapshots and end-of-shift cash reconciliation.
//!
//! Reports are read-only views over audit records and balances at the moment they
//! are taken; once saved they are append-only and never feed back into the engines.

use std::{collections::BTreeMap, sync::Arc};

use chrono::{DateTime, NaiveDate, Utc};
use tracing::info;
use uuid::Uuid;

use kas_domain::{
    AccountBalanceSnapshot, DailyReportSnapshot, KindSummary, Rupiah, ShiftReconciliation,
    SpendingItem,
};

use crate::{
    engine::RequestContext,
    roles::AccountRoles,
    store::DocumentStore,
    time::{Clock, LocalDay},
    CoreError,
};

/// Operator input for closing a shift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftInput {
    pub shift_start: DateTime<Utc>,
    /// Defaults to the clock's current time.
    pub shift_end: Option<DateTime<Utc>>,
    pub operator: String,
    pub counted_cash: Rupiah,
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct ReportService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    local_day: LocalDay,
    roles: AccountRoles,
}

impl ReportService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        local_day: LocalDay,
        roles: AccountRoles,
    ) -> Self {
        Self {
            store,
            clock,
            local_day,
            roles,
        }
    }

    /// Aggregates the audit records dated on the local day `date`.
    pub fn daily_report(
        &self,
        date: NaiveDate,
        opening_cash: Rupiah,
        spending: Vec<SpendingItem>,
        ctx: &RequestContext,
    ) -> Result<DailyReportSnapshot, CoreError> {
        if let Some(item) = spending.iter().find(|item| item.amount < 0) {
            return Err(CoreError::InvalidAmount(format!(
                "spending `{}` cannot be negative",
                item.description
            )));
        }
        let (start, end) = self.local_day.bounds(date);
        let mut per_kind: BTreeMap<_, KindSummary> = BTreeMap::new();
        for record in self.store.audits_between(start, end)? {
            per_kind.entry(record.kind).or_default().absorb(
                record.principal_amount,
                record.service_fee,
                record.fee_amount,
            );
        }
        let mut balances: Vec<AccountBalanceSnapshot> = self
            .store
            .accounts()?
            .into_iter()
            .map(|account| AccountBalanceSnapshot {
                account_id: account.id,
                label: account.label,
                kind: account.kind,
                balance: account.balance,
            })
            .collect();
        balances.sort_by(|a, b| a.label.cmp(&b.label));

        Ok(DailyReportSnapshot {
            id: Uuid::new_v4(),
            report_date: date,
            created_at: self.clock.now(),
            device_name: ctx.device_name.clone(),
            opening_cash,
            per_kind,
            spending,
            balances,
        })
    }

    pub fn save_daily_report(&self, report: DailyReportSnapshot) -> Result<(), CoreError> {
        let (id, date, profit) = (report.id, report.report_date, report.net_income());
        self.store.append_daily_report(report)?;
        info!(report = %id, %date, net_income = profit, "daily report saved");
        Ok(())
    }

    /// Compares the drawer's ledger balance with the physically counted cash.
    pub fn reconcile_shift(
        &self,
        input: ShiftInput,
        ctx: &RequestContext,
    ) -> Result<ShiftReconciliation, CoreError> {
        let drawer_id = self.roles.cash_drawer()?;
        let drawer = self
            .store
            .account(drawer_id)?
            .ok_or_else(|| CoreError::RequiredAccountMissing(format!("cash drawer account {drawer_id}")))?;
        let shift_end = input.shift_end.unwrap_or_else(|| self.clock.now());
        if shift_end < input.shift_start {
            return Err(CoreError::Validation("Shift cannot end before it starts".into()));
        }
        if input.counted_cash < 0 {
            return Err(CoreError::InvalidAmount("counted cash cannot be negative".into()));
        }
        let transactions_in_shift = self
            .store
            .audits_between(input.shift_start, shift_end)?
            .iter()
            .filter(|record| {
                record.source_account_id == drawer_id
                    || record.collecting_account_ids.contains(&drawer_id)
            })
            .count() as u32;

        Ok(ShiftReconciliation {
            id: Uuid::new_v4(),
            shift_start: input.shift_start,
            shift_end,
            device_name: ctx.device_name.clone(),
            operator: input.operator,
            cash_drawer_account_id: drawer_id,
            expected_cash: drawer.balance,
            counted_cash: input.counted_cash,
            difference: input.counted_cash - drawer.balance,
            transactions_in_shift,
            notes: input.notes,
        })
    }

    pub fn save_shift(&self, shift: ShiftReconciliation) -> Result<(), CoreError> {
        let (id, difference) = (shift.id, shift.difference);
        self.store.append_shift_reconciliation(shift)?;
        info!(shift = %id, difference, "shift reconciliation saved");
        Ok(())
    }
}
