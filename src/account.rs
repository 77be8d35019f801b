//! Account ledger: funds balance and stock holdings.
//!
//! Every account owns exactly one reentrant lock guarding both the balance and
//! the holdings. The mutating operations live on [`AccountGuard`], so they can
//! only be reached by a caller that holds the lock.

use crate::types::{AccountId, Funds, Symbol};
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;

/// Plain ledger state. Also used as the snapshot form of an account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    pub balance: Funds,
    pub holdings: BTreeMap<Symbol, u64>,
}

impl Ledger {
    pub fn holding(&self, symbol: &Symbol) -> u64 {
        self.holdings.get(symbol).copied().unwrap_or(0)
    }

    pub fn total_lots(&self) -> u64 {
        self.holdings.values().sum()
    }
}

#[derive(Debug)]
pub struct Account {
    id: AccountId,
    // RefCell borrows never outlive a single guard method, so re-locking
    // on the same thread (self-trade) cannot trip a double borrow.
    ledger: ReentrantMutex<RefCell<Ledger>>,
}

impl Account {
    pub fn new(id: AccountId) -> Self {
        Self {
            id,
            ledger: ReentrantMutex::new(RefCell::new(Ledger::default())),
        }
    }

    pub fn with_balance(id: AccountId, balance: Funds) -> Self {
        let account = Self::new(id);
        account.lock().deposit(balance);
        account
    }

    /// Builder helper: seeds `quantity` lots of `symbol`.
    pub fn with_stock(self, symbol: impl Into<Symbol>, quantity: u64) -> Self {
        let symbol = symbol.into();
        {
            let guard = self.lock();
            for _ in 0..quantity {
                guard.add_stock(&symbol);
            }
        }
        self
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    /// Blocks until the account lock is held. Re-entrant on the owning thread.
    pub fn lock(&self) -> AccountGuard<'_> {
        AccountGuard {
            id: self.id,
            inner: self.ledger.lock(),
        }
    }

    pub fn snapshot(&self) -> Ledger {
        self.lock().snapshot()
    }
}

/// Proof of holding an account's lock. Dropping it releases the lock.
pub struct AccountGuard<'a> {
    id: AccountId,
    inner: ReentrantMutexGuard<'a, RefCell<Ledger>>,
}

impl<'a> AccountGuard<'a> {
    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn balance(&self) -> Funds {
        self.inner.borrow().balance
    }

    pub fn holding(&self, symbol: &Symbol) -> u64 {
        self.inner.borrow().holding(symbol)
    }

    pub fn snapshot(&self) -> Ledger {
        self.inner.borrow().clone()
    }

    pub fn withdraw(&self, amount: Funds) -> Result<(), AccountError> {
        debug_assert!(!amount.is_negative());
        let mut ledger = self.inner.borrow_mut();
        if ledger.balance < amount {
            return Err(AccountError::InsufficientFunds {
                account: self.id,
                requested: amount,
                available: ledger.balance,
            });
        }
        ledger.balance = ledger.balance.sub(amount);
        Ok(())
    }

    pub fn deposit(&self, amount: Funds) {
        debug_assert!(!amount.is_negative());
        let mut ledger = self.inner.borrow_mut();
        ledger.balance = ledger.balance.add(amount);
    }

    /// Removes one lot of `symbol`.
    pub fn remove_stock(&self, symbol: &Symbol) -> Result<(), AccountError> {
        let mut ledger = self.inner.borrow_mut();
        match ledger.holding(symbol) {
            0 => Err(AccountError::NoSuchStock {
                account: self.id,
                symbol: symbol.clone(),
            }),
            1 => {
                ledger.holdings.remove(symbol);
                Ok(())
            }
            quantity => {
                ledger.holdings.insert(symbol.clone(), quantity - 1);
                Ok(())
            }
        }
    }

    /// Adds one lot of `symbol`.
    pub fn add_stock(&self, symbol: &Symbol) {
        let mut ledger = self.inner.borrow_mut();
        *ledger.holdings.entry(symbol.clone()).or_insert(0) += 1;
    }
}

impl std::fmt::Debug for AccountGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountGuard").field("id", &self.id).finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountError {
    #[error("Insufficient funds in {account}: requested {requested}, available {available}")]
    InsufficientFunds {
        account: AccountId,
        requested: Funds,
        available: Funds,
    },

    #[error("{account} holds no {symbol}")]
    NoSuchStock { account: AccountId, symbol: Symbol },
}
