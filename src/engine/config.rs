//! Engine configuration options.

use crate::types::Funds;
use serde::{Deserialize, Serialize};
use std::env;

/// How the buyer's balance is compared with the settlement price before any
/// money moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundsCheck {
    /// Balance must be strictly greater than the price.
    #[default]
    Strict,
    /// Balance equal to the price is enough.
    Inclusive,
}

impl FundsCheck {
    pub fn admits(&self, balance: Funds, price: Funds) -> bool {
        match self {
            FundsCheck::Strict => balance > price,
            FundsCheck::Inclusive => balance >= price,
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Pre-transfer funds comparison.
    pub funds_check: FundsCheck,
    /// Give the buyer's withdrawal back when the seller turns out not to
    /// hold the stock. Off by default: the debit is kept.
    pub refund_on_missing_stock: bool,
}

impl EngineConfig {
    /// Preset under which every settlement conserves funds and stock.
    pub fn conserving() -> Self {
        Self {
            funds_check: FundsCheck::Strict,
            refund_on_missing_stock: true,
        }
    }

    /// Reads `SETTLE_FUNDS_CHECK` and `SETTLE_REFUND_ON_MISSING_STOCK`,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(value) = env::var("SETTLE_FUNDS_CHECK") {
            config.funds_check = parse_funds_check(&value)?;
        }
        if let Ok(value) = env::var("SETTLE_REFUND_ON_MISSING_STOCK") {
            config.refund_on_missing_stock = parse_flag("SETTLE_REFUND_ON_MISSING_STOCK", &value)?;
        }

        Ok(config)
    }
}

fn parse_funds_check(value: &str) -> Result<FundsCheck, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "strict" => Ok(FundsCheck::Strict),
        "inclusive" => Ok(FundsCheck::Inclusive),
        _ => Err(ConfigError::InvalidValue {
            key: "SETTLE_FUNDS_CHECK",
            value: value.to_string(),
        }),
    }
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}
