use tracing::info;
use uuid::Uuid;

use kas_domain::Account;

use crate::{
    atomic::{run_atomic, RetryPolicy},
    store::DocumentStore,
    CoreError,
};

/// Admin provisioning of kas accounts. Balances only move through the engines.
pub struct AccountService;

impl AccountService {
    /// Creates `account`. The store rejects a label already in use, ignoring case,
    /// in the same locked step as the insert.
    pub fn open(store: &dyn DocumentStore, account: Account) -> Result<Account, CoreError> {
        let label = account.label.trim();
        if label.is_empty() {
            return Err(CoreError::Validation("Account label cannot be empty".into()));
        }
        if account.opening_balance < 0 || account.balance != account.opening_balance {
            return Err(CoreError::InvalidAmount(format!(
                "opening balance of `{}` must be non-negative and equal its balance",
                label
            )));
        }
        store.insert_account(account.clone())?;
        info!(account = %account.label, kind = %account.kind, opening = account.opening_balance, "account opened");
        Ok(account)
    }

    pub fn list(store: &dyn DocumentStore) -> Result<Vec<Account>, CoreError> {
        let mut accounts = store.accounts()?;
        accounts.sort_by(|a, b| a.label.to_lowercase().cmp(&b.label.to_lowercase()));
        Ok(accounts)
    }

    pub fn find_by_label(store: &dyn DocumentStore, label: &str) -> Result<Option<Account>, CoreError> {
        let wanted = label.trim().to_lowercase();
        Ok(store
            .accounts()?
            .into_iter()
            .find(|account| account.label.trim().to_lowercase() == wanted))
    }

    /// Deletes an account that has no ledger entries.
    pub fn remove(store: &dyn DocumentStore, retry: RetryPolicy, id: Uuid) -> Result<(), CoreError> {
        run_atomic(store, retry, |txn| txn.delete_account(id))?;
        info!(account = %id, "account removed");
        Ok(())
    }
}
