// 8.0.2: result types for settlement. failures are reported, never returned as Err.

use crate::account::AccountError;
use crate::types::{AccountId, Funds, Price, Symbol, Timestamp};
use serde::{Deserialize, Serialize};

/// Terminal state of one leg for one settlement attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegOutcome {
    Executed,
    Cancelled,
    /// Handed back to the order book to wait for a new match.
    Retry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReport {
    pub buy: LegOutcome,
    pub sell: LegOutcome,
    pub price: Price,
    pub buyer: Option<AccountId>,
    pub seller: Option<AccountId>,
    pub failure: Option<SettlementFailure>,
    pub settled_at: Timestamp,
}

impl SettlementReport {
    pub fn is_executed(&self) -> bool {
        self.buy == LegOutcome::Executed && self.sell == LegOutcome::Executed
    }

    pub fn outcomes(&self) -> (LegOutcome, LegOutcome) {
        (self.buy, self.sell)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum SettlementFailure {
    #[error("Account not found (buyer missing: {buyer_missing}, seller missing: {seller_missing})")]
    AccountNotFound { buyer_missing: bool, seller_missing: bool },

    #[error("Insufficient funds in {account}: required {required}, available {available}")]
    InsufficientFunds {
        account: AccountId,
        required: Funds,
        available: Funds,
    },

    #[error("{account} holds no {symbol}")]
    NoSuchStock { account: AccountId, symbol: Symbol },
}

impl From<AccountError> for SettlementFailure {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::InsufficientFunds {
                account,
                requested,
                available,
            } => SettlementFailure::InsufficientFunds {
                account,
                required: requested,
                available,
            },
            AccountError::NoSuchStock { account, symbol } => {
                SettlementFailure::NoSuchStock { account, symbol }
            }
        }
    }
}
