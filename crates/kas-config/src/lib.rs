//! kas-config
//!
//! Kiosk settings: device identity, local time offset, cash drawer binding,
//! commit retry budget, fee-table overrides and storage locations.
//! Owns the Config data structure plus disk persistence helpers.

pub mod error;
pub mod manager;
pub mod model;

pub use error::ConfigError;
pub use manager::ConfigManager;
pub use model::{Config, FeeTierConfig};
