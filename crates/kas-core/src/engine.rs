//! The transaction engine: one business transaction applied as one atomic set of
//! balance mutations, ledger entries and its audit record.
//!
//! Every kind (transfer, withdrawal, top-up, PPOB purchase, settlement, ...) goes
//! through the same protocol. The source account is debited the principal and, as a
//! separate entry, any bank/admin fee; the collecting account(s) picked by the payment
//! method are credited the principal plus the service fee. The fee has no offsetting
//! credit: it leaves the system to a third-party bank. The net change over all touched
//! accounts is therefore `service_fee - fee_amount`, the transaction's net profit.

use std::{collections::BTreeMap, sync::Arc};

use tracing::{debug, info};
use uuid::Uuid;

use kas_domain::{
    Account, AuditRecord, EntryDirection, LedgerEntry, PaymentMethod, Rupiah, TransactionKind,
};

use crate::{
    atomic::{run_atomic, RetryPolicy, StoreTxn},
    duplicate::{DuplicateCandidate, DuplicateCheck, DuplicateGuard},
    roles::AccountRoles,
    store::DocumentStore,
    time::{Clock, LocalDay},
    CoreError,
};

/// Caller-supplied context, passed per call instead of read from ambient state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub device_name: String,
}

impl RequestContext {
    pub fn new(device_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
        }
    }
}

/// A business transaction as entered by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub kind: TransactionKind,
    pub counterparty: String,
    pub destination_detail: Option<String>,
    pub notes: Option<String>,
    pub source_account_id: Uuid,
    pub payment_method: PaymentMethod,
    pub principal_amount: Rupiah,
    /// Bank/admin fee taken from the source account on top of the principal.
    pub fee_amount: Rupiah,
    /// Margin the customer pays the kiosk, credited with the principal.
    pub service_fee: Rupiah,
    pub transfer_account_id: Option<Uuid>,
    pub split_cash_amount: Option<Rupiah>,
    /// Skips the duplicate guard after the operator confirmed the repeat.
    pub force: bool,
}

impl TransactionRequest {
    /// A cash-paid request; switch collection with [`Self::via_transfer`] or [`Self::split`].
    pub fn new(
        kind: TransactionKind,
        source_account_id: Uuid,
        principal_amount: Rupiah,
        counterparty: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            counterparty: counterparty.into(),
            destination_detail: None,
            notes: None,
            source_account_id,
            payment_method: PaymentMethod::Tunai,
            principal_amount,
            fee_amount: 0,
            service_fee: 0,
            transfer_account_id: None,
            split_cash_amount: None,
            force: false,
        }
    }

    pub fn with_fee(mut self, fee_amount: Rupiah) -> Self {
        self.fee_amount = fee_amount;
        self
    }

    pub fn with_service_fee(mut self, service_fee: Rupiah) -> Self {
        self.service_fee = service_fee;
        self
    }

    pub fn with_destination(mut self, detail: impl Into<String>) -> Self {
        self.destination_detail = Some(detail.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn via_transfer(mut self, account_id: Uuid) -> Self {
        self.payment_method = PaymentMethod::Transfer;
        self.transfer_account_id = Some(account_id);
        self.split_cash_amount = None;
        self
    }

    pub fn split(mut self, cash_amount: Rupiah, transfer_account_id: Uuid) -> Self {
        self.payment_method = PaymentMethod::Split;
        self.split_cash_amount = Some(cash_amount);
        self.transfer_account_id = Some(transfer_account_id);
        self
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    /// Total taken from the source account.
    pub fn source_total(&self) -> Result<Rupiah, CoreError> {
        checked_total(self.principal_amount, self.fee_amount, "principal plus fee")
    }

    /// Total the customer pays the kiosk.
    pub fn customer_total(&self) -> Result<Rupiah, CoreError> {
        checked_total(self.principal_amount, self.service_fee, "principal plus service fee")
    }

    pub fn duplicate_candidate(&self) -> DuplicateCandidate {
        DuplicateCandidate {
            kind: self.kind,
            counterparty: self.counterparty.clone(),
            account_id: self.source_account_id,
            principal_amount: self.principal_amount,
        }
    }

    fn validate_amounts(&self) -> Result<(), CoreError> {
        if self.principal_amount <= 0 {
            return Err(CoreError::InvalidAmount(format!(
                "principal must be positive, got {}",
                self.principal_amount
            )));
        }
        if self.fee_amount < 0 || self.service_fee < 0 {
            return Err(CoreError::InvalidAmount(format!(
                "fees cannot be negative (fee {}, service fee {})",
                self.fee_amount, self.service_fee
            )));
        }
        self.source_total()?;
        self.customer_total()?;
        Ok(())
    }
}

fn checked_total(principal: Rupiah, extra: Rupiah, what: &str) -> Result<Rupiah, CoreError> {
    principal
        .checked_add(extra)
        .ok_or_else(|| CoreError::InvalidAmount(format!("{what} overflows ({principal} + {extra})")))
}

/// One credit to a collecting account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditLeg {
    pub account_id: Uuid,
    pub amount: Rupiah,
    pub suffix: &'static str,
}

/// Splits the customer total over the collecting accounts named by the payment method.
pub fn plan_credits(request: &TransactionRequest, roles: &AccountRoles) -> Result<Vec<CreditLeg>, CoreError> {
    let total = request.customer_total()?;
    match request.payment_method {
        PaymentMethod::Tunai => Ok(vec![CreditLeg {
            account_id: roles.cash_drawer()?,
            amount: total,
            suffix: "credit",
        }]),
        PaymentMethod::Transfer => {
            let account_id = request.transfer_account_id.ok_or_else(|| {
                CoreError::RequiredAccountMissing("transfer destination account".into())
            })?;
            Ok(vec![CreditLeg {
                account_id,
                amount: total,
                suffix: "credit",
            }])
        }
        PaymentMethod::Split => {
            let drawer = roles.cash_drawer()?;
            let transfer_account = request.transfer_account_id.ok_or_else(|| {
                CoreError::InvalidSplit("split payment needs a transfer account".into())
            })?;
            let cash = request.split_cash_amount.unwrap_or(0);
            if cash <= 0 || cash >= total {
                return Err(CoreError::InvalidSplit(format!(
                    "cash portion {} must be between 0 and the total {} (exclusive)",
                    cash, total
                )));
            }
            Ok(vec![
                CreditLeg {
                    account_id: drawer,
                    amount: cash,
                    suffix: "credit_cash",
                },
                CreditLeg {
                    account_id: transfer_account,
                    amount: total - cash,
                    suffix: "credit_transfer",
                },
            ])
        }
    }
}

/// What a committed execution wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReceipt {
    pub audit: AuditRecord,
    pub entries: Vec<LedgerEntry>,
    /// Net balance change per touched account.
    pub deltas: BTreeMap<Uuid, Rupiah>,
}

impl ExecutionReceipt {
    /// Sum of balance changes over every touched account.
    pub fn net_delta(&self) -> Rupiah {
        self.deltas.values().sum()
    }
}

/// Error for a collecting account that is gone; the cash drawer is a required role.
fn missing_collector(roles: &AccountRoles, account_id: Uuid) -> CoreError {
    if Some(account_id) == roles.cash_drawer_id() {
        CoreError::RequiredAccountMissing(format!("cash drawer account {account_id}"))
    } else {
        CoreError::AccountNotFound(account_id)
    }
}

fn insufficient(account: &Account, required: Rupiah) -> CoreError {
    CoreError::InsufficientBalance {
        account: account.label.clone(),
        available: account.balance,
        required,
    }
}

/// Fields shared by every entry of one execution.
struct EntryStamp<'r> {
    request: &'r TransactionRequest,
    audit_id: Uuid,
    device_name: &'r str,
    date: chrono::DateTime<chrono::Utc>,
}

impl EntryStamp<'_> {
    fn post(
        &self,
        txn: &mut StoreTxn<'_>,
        account_id: Uuid,
        direction: EntryDirection,
        amount: Rupiah,
        suffix: &str,
        name: String,
    ) -> Result<LedgerEntry, CoreError> {
        let (balance_before, balance_after) = txn.apply_delta(account_id, direction.signed(amount))?;
        let entry = LedgerEntry {
            id: Uuid::new_v4(),
            account_id,
            direction,
            name,
            counterparty_label: self.request.counterparty.clone(),
            date: self.date,
            amount,
            balance_before,
            balance_after,
            category: self.request.kind.category(suffix),
            kind: Some(self.request.kind),
            device_name: self.device_name.to_string(),
            audit_id: Some(self.audit_id),
            sequence: 0,
        };
        txn.insert_entry(entry.clone());
        Ok(entry)
    }
}

/// Applies business transactions through the atomic store primitive.
#[derive(Clone)]
pub struct TransactionEngine {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    roles: AccountRoles,
    guard: DuplicateGuard,
    retry: RetryPolicy,
}

impl TransactionEngine {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        roles: AccountRoles,
        local_day: LocalDay,
        retry: RetryPolicy,
    ) -> Self {
        let guard = DuplicateGuard::new(clock.clone(), local_day);
        Self {
            store,
            clock,
            roles,
            guard,
            retry,
        }
    }

    pub fn roles(&self) -> &AccountRoles {
        &self.roles
    }

    pub fn guard(&self) -> &DuplicateGuard {
        &self.guard
    }

    /// Cheap checks against current balances, repeated authoritatively inside the commit.
    pub fn preflight(&self, request: &TransactionRequest) -> Result<Vec<CreditLeg>, CoreError> {
        request.validate_amounts()?;
        let source = self
            .store
            .account(request.source_account_id)?
            .ok_or(CoreError::AccountNotFound(request.source_account_id))?;
        let legs = plan_credits(request, &self.roles)?;
        for leg in &legs {
            if self.store.account(leg.account_id)?.is_none() {
                return Err(missing_collector(&self.roles, leg.account_id));
            }
        }
        let required = request.source_total()?;
        if source.balance < required {
            return Err(insufficient(&source, required));
        }
        Ok(legs)
    }

    /// Executes `request` as one atomic unit.
    ///
    /// Unless `request.force` is set, a same-day repeat returns
    /// [`CoreError::DuplicateDetected`] without writing anything.
    pub fn execute(
        &self,
        request: &TransactionRequest,
        ctx: &RequestContext,
    ) -> Result<ExecutionReceipt, CoreError> {
        let legs = self.preflight(request)?;

        if !request.force {
            if let DuplicateCheck::Duplicate(existing) =
                self.guard.check_store(self.store.as_ref(), &request.duplicate_candidate())
            {
                return Err(CoreError::DuplicateDetected {
                    existing: existing.id,
                    kind: existing.kind,
                    counterparty: existing.counterparty.clone(),
                    amount: existing.principal_amount,
                });
            }
        }

        let audit_id = Uuid::new_v4();
        let stamp = EntryStamp {
            request,
            audit_id,
            device_name: &ctx.device_name,
            date: self.clock.now(),
        };
        let kind = request.kind;
        let counterparty = &request.counterparty;
        let required = request.source_total()?;
        let roles = &self.roles;

        let receipt = run_atomic(self.store.as_ref(), self.retry, |txn| {
            let source = txn.account(request.source_account_id)?;
            if source.balance < required {
                return Err(insufficient(source, required));
            }
            for leg in &legs {
                match txn.account(leg.account_id) {
                    Err(CoreError::AccountNotFound(id)) => return Err(missing_collector(roles, id)),
                    Err(err) => return Err(err),
                    Ok(_) => {}
                }
            }

            let mut entries = Vec::with_capacity(legs.len() + 2);
            entries.push(stamp.post(
                txn,
                request.source_account_id,
                EntryDirection::Debit,
                request.principal_amount,
                "debit",
                format!("{kind} - {counterparty}"),
            )?);
            if request.fee_amount > 0 {
                entries.push(stamp.post(
                    txn,
                    request.source_account_id,
                    EntryDirection::Debit,
                    request.fee_amount,
                    "fee",
                    format!("Biaya admin {kind} - {counterparty}"),
                )?);
            }
            for leg in &legs {
                entries.push(stamp.post(
                    txn,
                    leg.account_id,
                    EntryDirection::Credit,
                    leg.amount,
                    leg.suffix,
                    format!("Pembayaran {kind} - {counterparty}"),
                )?);
            }

            let (split_cash_amount, split_transfer_amount) = match request.payment_method {
                PaymentMethod::Split => (Some(legs[0].amount), Some(legs[1].amount)),
                _ => (None, None),
            };
            let audit = AuditRecord {
                id: audit_id,
                kind,
                date: stamp.date,
                device_name: ctx.device_name.clone(),
                counterparty: counterparty.clone(),
                destination_detail: request.destination_detail.clone(),
                source_account_id: request.source_account_id,
                collecting_account_ids: legs.iter().map(|leg| leg.account_id).collect(),
                payment_method: request.payment_method,
                principal_amount: request.principal_amount,
                fee_amount: request.fee_amount,
                service_fee: request.service_fee,
                net_profit: request.service_fee - request.fee_amount,
                split_cash_amount,
                split_transfer_amount,
                entry_ids: entries.iter().map(|entry| entry.id).collect(),
                notes: request.notes.clone(),
            };
            txn.put_audit(audit.clone());

            let mut deltas = BTreeMap::new();
            for entry in &entries {
                *deltas.entry(entry.account_id).or_insert(0) += entry.signed_amount();
            }
            debug!(audit = %audit_id, entries = entries.len(), "execution staged");
            Ok(ExecutionReceipt {
                audit,
                entries,
                deltas,
            })
        })?;

        info!(
            audit = %receipt.audit.id,
            kind = %kind,
            principal = request.principal_amount,
            method = %request.payment_method,
            net = receipt.net_delta(),
            "transaction committed"
        );
        Ok(receipt)
    }
}
