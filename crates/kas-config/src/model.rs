use std::{collections::BTreeMap, path::PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ConfigError;

/// One fee bracket as written in the config file, bounds inclusive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeeTierConfig {
    pub min: i64,
    pub max: i64,
    pub fee: i64,
}

/// Stores the settings of one kiosk installation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Written on every ledger entry and audit record.
    #[serde(default = "Config::default_device_name")]
    pub device_name: String,
    /// Offset of the kiosk's local day from UTC; WIB is +420.
    #[serde(default = "Config::default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
    #[serde(default = "Config::default_cash_drawer_label")]
    pub cash_drawer_label: String,
    /// Pins the cash drawer to a specific account, bypassing role and label lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cash_drawer_account_id: Option<Uuid>,
    #[serde(default = "Config::default_max_commit_attempts")]
    pub max_commit_attempts: u32,
    /// Replacement fee tables keyed by transaction kind (`customer_transfer`, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fee_overrides: BTreeMap<String, Vec<FeeTierConfig>>,
    #[serde(default = "Config::default_backup_retention")]
    pub backup_retention: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    /// Optional custom root directory for the document file. Defaults to `~/Documents/Kas`.
    pub data_root: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    /// Optional custom root directory for backups. Defaults to `<data root>/backups`.
    pub backup_root: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_name: Self::default_device_name(),
            utc_offset_minutes: Self::default_utc_offset_minutes(),
            cash_drawer_label: Self::default_cash_drawer_label(),
            cash_drawer_account_id: None,
            max_commit_attempts: Self::default_max_commit_attempts(),
            fee_overrides: BTreeMap::new(),
            backup_retention: Self::default_backup_retention(),
            data_root: None,
            backup_root: None,
        }
    }
}

impl Config {
    pub fn default_device_name() -> String {
        "kiosk".into()
    }

    pub fn default_utc_offset_minutes() -> i32 {
        420
    }

    pub fn default_cash_drawer_label() -> String {
        "Laci".into()
    }

    pub fn default_max_commit_attempts() -> u32 {
        5
    }

    pub fn default_backup_retention() -> usize {
        5
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_name.trim().is_empty() {
            return Err(ConfigError::Invalid("device name cannot be empty".into()));
        }
        if self.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(ConfigError::Invalid(format!(
                "UTC offset of {} minutes is out of range",
                self.utc_offset_minutes
            )));
        }
        if self.max_commit_attempts == 0 {
            return Err(ConfigError::Invalid("max_commit_attempts must be at least 1".into()));
        }
        if self.cash_drawer_label.trim().is_empty() {
            return Err(ConfigError::Invalid("cash drawer label cannot be empty".into()));
        }
        for (kind, tiers) in &self.fee_overrides {
            if let Some(tier) = tiers.iter().find(|tier| tier.min > tier.max || tier.fee < 0) {
                return Err(ConfigError::Invalid(format!(
                    "fee tier {}..={} for `{}` is malformed",
                    tier.min, tier.max, kind
                )));
            }
        }
        Ok(())
    }

    pub fn resolve_data_root(&self) -> PathBuf {
        if let Some(path) = &self.data_root {
            return path.clone();
        }

        let base = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        base.join("Kas")
    }

    pub fn resolve_backup_root(&self) -> PathBuf {
        match &self.backup_root {
            Some(path) => path.clone(),
            None => self.resolve_data_root().join("backups"),
        }
    }
}
