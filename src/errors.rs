use kas_config::ConfigError;
use kas_core::CoreError;
use thiserror::Error;

/// Error type surfaced by the [`crate::Kiosk`] facade.
#[derive(Debug, Error)]
pub enum KioskError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Kiosk setup failed: {0}")]
    Setup(String),
}

impl KioskError {
    /// Whether the operator may confirm and resubmit (a probable duplicate).
    pub fn is_advisory(&self) -> bool {
        matches!(self, KioskError::Core(err) if err.is_advisory())
    }
}

pub type KioskResult<T> = Result<T, KioskError>;
