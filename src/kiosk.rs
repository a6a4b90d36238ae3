use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};
use uuid::Uuid;

use kas_config::{Config, FeeTierConfig};
use kas_core::{
    replay_account, AccountRoles, AccountService, Clock, CoreError, DocumentStore, EntryService,
    ExecutionReceipt, FeeSchedule, FeeTable, FeeTier, LocalDay, ReplayReport, ReportService,
    RequestContext, RetryPolicy, ReversalEngine, ReversalReport, ShiftInput, SystemClock,
    TransactionEngine, TransactionRequest,
};
use kas_domain::{
    Account, AccountKind, DailyReportSnapshot, LedgerEntry, Rupiah, ShiftReconciliation,
    SpendingItem, TransactionKind,
};
use kas_storage_json::{BackupInfo, JsonDocumentStore, StoragePaths};

use crate::errors::{KioskError, KioskResult};

/// One kiosk installation: configuration, store, and the engines bound to them.
///
/// Account roles are resolved once when the kiosk is built. Call
/// [`Kiosk::refresh_roles`] after provisioning or restoring accounts that change
/// which account is the cash drawer.
pub struct Kiosk {
    config: Config,
    store: Arc<dyn DocumentStore>,
    json: Option<Arc<JsonDocumentStore>>,
    clock: Arc<dyn Clock>,
    local_day: LocalDay,
    retry: RetryPolicy,
    fees: FeeSchedule,
    roles: AccountRoles,
    engine: TransactionEngine,
    reversal: ReversalEngine,
    reports: ReportService,
}

impl Kiosk {
    /// Opens the JSON document store at the configured locations.
    pub fn open(config: Config) -> KioskResult<Self> {
        config.validate()?;
        let paths = StoragePaths {
            data_root: config.resolve_data_root(),
            backup_root: config.resolve_backup_root(),
        };
        let json = Arc::new(JsonDocumentStore::with_retention(
            paths,
            "kas",
            config.backup_retention,
        )?);
        let store: Arc<dyn DocumentStore> = json.clone();
        let mut kiosk = Self::with_store(config, store, Arc::new(SystemClock))?;
        kiosk.json = Some(json);
        Ok(kiosk)
    }

    /// Builds a kiosk over any store and clock.
    pub fn with_store(
        config: Config,
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
    ) -> KioskResult<Self> {
        config.validate()?;
        let local_day = LocalDay::from_offset_minutes(config.utc_offset_minutes)?;
        let retry = RetryPolicy::new(config.max_commit_attempts);
        let fees = fee_schedule(&config)?;
        let roles = AccountRoles::resolve(
            store.as_ref(),
            config.cash_drawer_account_id,
            &config.cash_drawer_label,
        )?;

        info!(
            device = %config.device_name,
            offset_minutes = config.utc_offset_minutes,
            cash_drawer = ?roles.cash_drawer_id(),
            "kiosk ready"
        );
        Ok(Self {
            engine: TransactionEngine::new(store.clone(), clock.clone(), roles, local_day, retry),
            reversal: ReversalEngine::new(store.clone(), retry),
            reports: ReportService::new(store.clone(), clock.clone(), local_day, roles),
            config,
            store,
            json: None,
            clock,
            local_day,
            retry,
            fees,
            roles,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub fn roles(&self) -> &AccountRoles {
        &self.roles
    }

    pub fn fees(&self) -> &FeeSchedule {
        &self.fees
    }

    pub fn local_day(&self) -> LocalDay {
        self.local_day
    }

    pub fn today(&self) -> NaiveDate {
        self.local_day.date_of(self.clock.now())
    }

    /// Context stamped on everything this kiosk writes.
    pub fn context(&self) -> RequestContext {
        RequestContext::new(self.config.device_name.clone())
    }

    /// Re-resolves account roles and rebinds the engines to them.
    pub fn refresh_roles(&mut self) -> KioskResult<()> {
        let roles = AccountRoles::resolve(
            self.store.as_ref(),
            self.config.cash_drawer_account_id,
            &self.config.cash_drawer_label,
        )?;
        self.roles = roles;
        self.engine = TransactionEngine::new(
            self.store.clone(),
            self.clock.clone(),
            roles,
            self.local_day,
            self.retry,
        );
        self.reports = ReportService::new(self.store.clone(), self.clock.clone(), self.local_day, roles);
        Ok(())
    }

    pub fn suggest_fee(&self, kind: TransactionKind, amount: Rupiah) -> Rupiah {
        self.fees.suggest(kind, amount)
    }

    /// Cash-paid request with the service fee pre-filled from the fee tables.
    pub fn request(
        &self,
        kind: TransactionKind,
        source_account_id: Uuid,
        amount: Rupiah,
        counterparty: impl Into<String>,
    ) -> TransactionRequest {
        TransactionRequest::new(kind, source_account_id, amount, counterparty)
            .with_service_fee(self.suggest_fee(kind, amount))
    }

    pub fn execute(&self, request: &TransactionRequest) -> KioskResult<ExecutionReceipt> {
        Ok(self.engine.execute(request, &self.context())?)
    }

    pub fn reverse(&self, entry: &LedgerEntry) -> KioskResult<ReversalReport> {
        Ok(self.reversal.reverse(entry)?)
    }

    pub fn reverse_audit(&self, kind: TransactionKind, audit_id: Uuid) -> KioskResult<ReversalReport> {
        Ok(self.reversal.reverse_audit(kind, audit_id)?)
    }

    pub fn reverse_entry_only(&self, entry: &LedgerEntry) -> KioskResult<ReversalReport> {
        Ok(self.reversal.reverse_entry_only(entry)?)
    }

    pub fn open_account(
        &self,
        label: &str,
        kind: AccountKind,
        opening_balance: Rupiah,
    ) -> KioskResult<Account> {
        Ok(AccountService::open(
            self.store.as_ref(),
            Account::new(label.trim(), kind, opening_balance),
        )?)
    }

    pub fn provision(&self, account: Account) -> KioskResult<Account> {
        Ok(AccountService::open(self.store.as_ref(), account)?)
    }

    pub fn accounts(&self) -> KioskResult<Vec<Account>> {
        Ok(AccountService::list(self.store.as_ref())?)
    }

    pub fn account_by_label(&self, label: &str) -> KioskResult<Option<Account>> {
        Ok(AccountService::find_by_label(self.store.as_ref(), label)?)
    }

    pub fn remove_account(&self, id: Uuid) -> KioskResult<()> {
        if Some(id) == self.roles.cash_drawer_id() {
            return Err(CoreError::Validation("the cash drawer account cannot be removed".into()).into());
        }
        Ok(AccountService::remove(self.store.as_ref(), self.retry, id)?)
    }

    pub fn rename_entry(&self, account_id: Uuid, entry_id: Uuid, name: &str) -> KioskResult<()> {
        Ok(EntryService::rename(self.store.as_ref(), self.retry, account_id, entry_id, name)?)
    }

    pub fn history(&self, account_id: Uuid) -> KioskResult<Vec<LedgerEntry>> {
        Ok(EntryService::history(self.store.as_ref(), account_id)?)
    }

    pub fn replay(&self, account_id: Uuid) -> KioskResult<ReplayReport> {
        Ok(replay_account(self.store.as_ref(), account_id)?)
    }

    /// Replays every account, logging the ones whose ledger does not add up.
    pub fn replay_all(&self) -> KioskResult<Vec<ReplayReport>> {
        let mut reports = Vec::new();
        for account in self.store.accounts()? {
            let report = replay_account(self.store.as_ref(), account.id)?;
            if !report.is_consistent() {
                warn!(
                    account = %account.label,
                    stored = report.stored_balance,
                    replayed = report.replayed_balance,
                    "ledger replay mismatch"
                );
            }
            reports.push(report);
        }
        Ok(reports)
    }

    pub fn daily_report(
        &self,
        date: NaiveDate,
        opening_cash: Rupiah,
        spending: Vec<SpendingItem>,
    ) -> KioskResult<DailyReportSnapshot> {
        Ok(self
            .reports
            .daily_report(date, opening_cash, spending, &self.context())?)
    }

    pub fn save_daily_report(&self, report: DailyReportSnapshot) -> KioskResult<()> {
        Ok(self.reports.save_daily_report(report)?)
    }

    pub fn reconcile_shift(&self, input: ShiftInput) -> KioskResult<ShiftReconciliation> {
        Ok(self.reports.reconcile_shift(input, &self.context())?)
    }

    pub fn save_shift(&self, shift: ShiftReconciliation) -> KioskResult<()> {
        Ok(self.reports.save_shift(shift)?)
    }

    pub fn backup(&self, note: Option<&str>) -> KioskResult<BackupInfo> {
        Ok(self.json_store()?.backup(note)?)
    }

    pub fn list_backups(&self) -> KioskResult<Vec<BackupInfo>> {
        Ok(self.json_store()?.list_backups()?)
    }

    pub fn delete_backup(&self, backup: &BackupInfo) -> KioskResult<()> {
        Ok(self.json_store()?.delete_backup(backup)?)
    }

    /// Restores a backup and re-resolves roles against the restored accounts.
    pub fn restore_backup(&mut self, backup: &BackupInfo) -> KioskResult<()> {
        self.json_store()?.restore_backup(backup)?;
        self.refresh_roles()
    }

    fn json_store(&self) -> KioskResult<&JsonDocumentStore> {
        self.json
            .as_deref()
            .ok_or_else(|| KioskError::Setup("backups need the JSON document store".into()))
    }
}

/// Standard tables with the configured overrides applied.
fn fee_schedule(config: &Config) -> KioskResult<FeeSchedule> {
    let mut schedule = FeeSchedule::standard();
    for (key, tiers) in &config.fee_overrides {
        let kind = parse_kind(key)?;
        let table = FeeTable::new(tiers.iter().map(to_tier).collect())?;
        schedule.set_table(kind, table);
    }
    Ok(schedule)
}

fn parse_kind(key: &str) -> KioskResult<TransactionKind> {
    serde_json::from_value(serde_json::Value::String(key.trim().to_string()))
        .map_err(|_| KioskError::Setup(format!("unknown transaction kind `{key}` in fee overrides")))
}

fn to_tier(tier: &FeeTierConfig) -> FeeTier {
    FeeTier::new(tier.min, tier.max, tier.fee)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_overrides_replace_standard_tables() {
        let mut config = Config::default();
        config.fee_overrides.insert(
            "customer_transfer".into(),
            vec![FeeTierConfig {
                min: 1,
                max: 1_000_000,
                fee: 4_000,
            }],
        );
        let schedule = fee_schedule(&config).expect("schedule");
        assert_eq!(schedule.suggest(TransactionKind::CustomerTransfer, 20_000), 4_000);
        assert_eq!(schedule.suggest(TransactionKind::CustomerWithdrawal, 20_000), 5_000);
    }

    #[test]
    fn unknown_override_kinds_are_setup_errors() {
        let mut config = Config::default();
        config.fee_overrides.insert("arisan".into(), Vec::new());
        assert!(matches!(fee_schedule(&config), Err(KioskError::Setup(_))));
    }
}
