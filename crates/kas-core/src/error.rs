use kas_domain::{Rupiah, TransactionKind};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),
    #[error("Required account missing: {0}")]
    RequiredAccountMissing(String),
    #[error("Insufficient balance in account `{account}`: available {available}, required {required}")]
    InsufficientBalance {
        account: String,
        available: Rupiah,
        required: Rupiah,
    },
    #[error("Invalid split payment: {0}")]
    InvalidSplit(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Ledger entry {0} carries no audit id and cannot be reversed as a transaction")]
    NonReversible(Uuid),
    #[error("Category `{0}` does not map to an audit collection")]
    UnroutableCategory(String),
    #[error("Audit record not found: {0}")]
    AuditNotFound(Uuid),
    #[error("Ledger entry not found: {0}")]
    EntryNotFound(Uuid),
    #[error("Possible duplicate of {kind} {existing} for `{counterparty}` (Rp{amount}) recorded today")]
    DuplicateDetected {
        existing: Uuid,
        kind: TransactionKind,
        counterparty: String,
        amount: Rupiah,
    },
    #[error("Account `{0}` already exists")]
    DuplicateLabel(String),
    #[error("Report already saved: {0}")]
    ReportExists(Uuid),
    #[error("Write conflict: {0}")]
    Conflict(String),
    #[error("Transaction aborted: {0}")]
    TransactionAborted(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serde(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Whether the caller may proceed after explicit confirmation.
    pub fn is_advisory(&self) -> bool {
        matches!(self, CoreError::DuplicateDetected { .. })
    }
}
