//! Resolution of business roles to concrete account ids, done once at setup.

use tracing::{info, warn};
use uuid::Uuid;

use kas_domain::{AccountRole, CASH_DRAWER_LABEL};

use crate::{store::DocumentStore, CoreError};

/// Account ids bound to the roles the transaction protocol needs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountRoles {
    cash_drawer: Option<Uuid>,
}

impl AccountRoles {
    pub fn new(cash_drawer: Option<Uuid>) -> Self {
        Self { cash_drawer }
    }

    pub fn with_cash_drawer(cash_drawer: Uuid) -> Self {
        Self::new(Some(cash_drawer))
    }

    /// Binds the cash drawer by, in order: the pinned id, the account flagged with
    /// [`AccountRole::CashDrawer`], or the account labelled `fallback_label`.
    ///
    /// An unresolved drawer is not an error here: transactions that need it fail with
    /// [`CoreError::RequiredAccountMissing`].
    pub fn resolve(
        store: &dyn DocumentStore,
        pinned: Option<Uuid>,
        fallback_label: &str,
    ) -> Result<Self, CoreError> {
        if let Some(id) = pinned {
            store.account(id)?.ok_or(CoreError::AccountNotFound(id))?;
            return Ok(Self::with_cash_drawer(id));
        }
        let accounts = store.accounts()?;
        let flagged: Vec<_> = accounts
            .iter()
            .filter(|account| account.role == Some(AccountRole::CashDrawer))
            .collect();
        match flagged.as_slice() {
            [drawer] => {
                info!(account = %drawer.label, "cash drawer resolved by role");
                return Ok(Self::with_cash_drawer(drawer.id));
            }
            [] => {}
            _ => {
                return Err(CoreError::Validation(format!(
                    "{} accounts are flagged as cash drawer",
                    flagged.len()
                )))
            }
        }
        let wanted = fallback_label.trim().to_lowercase();
        let by_label = accounts
            .iter()
            .find(|account| account.label.trim().to_lowercase() == wanted);
        match by_label {
            Some(drawer) => {
                warn!(
                    account = %drawer.label,
                    "cash drawer resolved by label; flag the account with the cash drawer role"
                );
                Ok(Self::with_cash_drawer(drawer.id))
            }
            None => {
                warn!(label = fallback_label, "no cash drawer account found");
                Ok(Self::default())
            }
        }
    }

    /// Resolves using the label the kiosk data has always used for the drawer.
    pub fn resolve_default(store: &dyn DocumentStore) -> Result<Self, CoreError> {
        Self::resolve(store, None, CASH_DRAWER_LABEL)
    }

    pub fn cash_drawer(&self) -> Result<Uuid, CoreError> {
        self.cash_drawer.ok_or_else(|| {
            CoreError::RequiredAccountMissing(format!(
                "{} account (`{}`)",
                AccountRole::CashDrawer,
                CASH_DRAWER_LABEL
            ))
        })
    }

    pub fn cash_drawer_id(&self) -> Option<Uuid> {
        self.cash_drawer
    }
}
