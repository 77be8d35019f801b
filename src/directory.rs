//! Account directory: maps (broker, investor) to the account that settles
//! the investor's trades.

use crate::account::Account;
use crate::types::{AccountId, BrokerId, Funds, InvestorId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

/// Lookup used by the engine. Implementations must be safe to call from any
/// worker thread.
pub trait AccountDirectory: Send + Sync {
    fn resolve(&self, broker: BrokerId, investor: InvestorId) -> Option<Arc<Account>>;
}

/// In-memory directory for tests and simulation
#[derive(Debug)]
pub struct InMemoryDirectory {
    accounts: DashMap<(BrokerId, InvestorId), Arc<Account>>,
    // id -> the one live account holding it. lock ordering needs ids unique.
    owners: DashMap<AccountId, Weak<Account>>,
    next_id: AtomicU64,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            owners: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Opens a fresh account with a unique id and registers it.
    pub fn open_account(&self, broker: BrokerId, investor: InvestorId, balance: Funds) -> Arc<Account> {
        let account = loop {
            let id = AccountId(self.next_id.fetch_add(1, Ordering::Relaxed));
            // a concurrent register() may already own this id; take the next one
            if let Some(account) = self.claim(id, || Arc::new(Account::with_balance(id, balance))) {
                break account;
            }
        };
        self.accounts.insert((broker, investor), Arc::clone(&account));
        debug!(id = %account.id(), ?broker, ?investor, %balance, "account opened");
        account
    }

    /// Makes `account` reachable through `broker`. One account may be
    /// registered under several brokers, but its id must not belong to any
    /// other live account.
    pub fn register(
        &self,
        broker: BrokerId,
        investor: InvestorId,
        account: Arc<Account>,
    ) -> Result<Option<Arc<Account>>, DirectoryError> {
        let id = account.id();
        match self.owners.entry(id) {
            Entry::Occupied(mut entry) => match entry.get().upgrade() {
                Some(owner) if !Arc::ptr_eq(&owner, &account) => {
                    return Err(DirectoryError::DuplicateAccountId { id });
                }
                Some(_) => {}
                None => {
                    entry.insert(Arc::downgrade(&account));
                }
            },
            Entry::Vacant(entry) => {
                entry.insert(Arc::downgrade(&account));
            }
        }
        self.next_id.fetch_max(id.0.saturating_add(1), Ordering::Relaxed);
        Ok(self.accounts.insert((broker, investor), account))
    }

    // reserves `id` for a new account unless a live account already holds it
    fn claim(&self, id: AccountId, make: impl FnOnce() -> Arc<Account>) -> Option<Arc<Account>> {
        match self.owners.entry(id) {
            Entry::Occupied(entry) if entry.get().strong_count() > 0 => None,
            Entry::Occupied(mut entry) => {
                let account = make();
                entry.insert(Arc::downgrade(&account));
                Some(account)
            }
            Entry::Vacant(entry) => {
                let account = make();
                entry.insert(Arc::downgrade(&account));
                Some(account)
            }
        }
    }

    pub fn close_account(&self, broker: BrokerId, investor: InvestorId) -> Option<Arc<Account>> {
        self.accounts.remove(&(broker, investor)).map(|(_, account)| account)
    }

    /// Distinct accounts, sorted by id.
    pub fn accounts(&self) -> Vec<Arc<Account>> {
        let mut accounts: Vec<Arc<Account>> = self
            .accounts
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        accounts.sort_by_key(|a| a.id());
        accounts.dedup_by_key(|a| a.id());
        accounts
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    #[error("{id} already belongs to a different account")]
    DuplicateAccountId { id: AccountId },
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountDirectory for InMemoryDirectory {
    fn resolve(&self, broker: BrokerId, investor: InvestorId) -> Option<Arc<Account>> {
        self.accounts.get(&(broker, investor)).map(|entry| Arc::clone(entry.value()))
    }
}
