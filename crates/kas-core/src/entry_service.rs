use uuid::Uuid;

use kas_domain::LedgerEntry;

use crate::{
    atomic::{run_atomic, RetryPolicy},
    store::DocumentStore,
    CoreError,
};

pub struct EntryService;

impl EntryService {
    /// Renames an entry. The only mutation a committed entry allows.
    pub fn rename(
        store: &dyn DocumentStore,
        retry: RetryPolicy,
        account_id: Uuid,
        entry_id: Uuid,
        name: &str,
    ) -> Result<(), CoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::Validation("Entry name cannot be empty".into()));
        }
        run_atomic(store, retry, |txn| {
            txn.rename_entry(account_id, entry_id, name.to_string());
            Ok(())
        })
    }

    /// Entries of an account, newest first.
    pub fn history(store: &dyn DocumentStore, account_id: Uuid) -> Result<Vec<LedgerEntry>, CoreError> {
        let mut entries = store.entries(account_id)?;
        entries.sort_by(|a, b| b.sequence.cmp(&a.sequence).then(b.date.cmp(&a.date)));
        Ok(entries)
    }
}
