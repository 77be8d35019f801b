// 8.2: ordered two-account locking. every settlement takes the lower AccountId first,
// so all lock sequences agree with one global order and no cycle can form.

use crate::account::{Account, AccountGuard};
use crate::types::AccountId;
use tracing::trace;

/// Instrumentation hook for lock acquisition and release.
pub trait LockObserver: Send + Sync {
    fn acquired(&self, account: AccountId);
    /// Called right before the lock is released.
    fn released(&self, account: AccountId);
}

struct Held<'a> {
    guard: AccountGuard<'a>,
    observer: Option<&'a dyn LockObserver>,
}

impl<'a> Held<'a> {
    fn lock(account: &'a Account, observer: Option<&'a dyn LockObserver>) -> Self {
        let guard = account.lock();
        trace!(account = %account.id(), "lock acquired");
        if let Some(observer) = observer {
            observer.acquired(account.id());
        }
        Self { guard, observer }
    }
}

impl Drop for Held<'_> {
    fn drop(&mut self) {
        let id = self.guard.id();
        if let Some(observer) = self.observer {
            observer.released(id);
        }
        trace!(account = %id, "lock released");
    }
}

/// Both settlement accounts, locked in ascending id order.
pub struct LockedPair<'a> {
    // fields drop in declaration order: `second` unlocks before `first`
    second: Held<'a>,
    first: Held<'a>,
    buyer_first: bool,
}

impl<'a> LockedPair<'a> {
    /// Blocks until both locks are held. Equal ids (self-trade) re-enter the
    /// same reentrant lock.
    pub fn acquire(
        buyer: &'a Account,
        seller: &'a Account,
        observer: Option<&'a dyn LockObserver>,
    ) -> Self {
        let buyer_first = buyer.id() <= seller.id();
        let (low, high) = if buyer_first { (buyer, seller) } else { (seller, buyer) };

        let first = Held::lock(low, observer);
        let second = Held::lock(high, observer);

        Self {
            second,
            first,
            buyer_first,
        }
    }

    pub fn buyer(&self) -> &AccountGuard<'a> {
        if self.buyer_first {
            &self.first.guard
        } else {
            &self.second.guard
        }
    }

    pub fn seller(&self) -> &AccountGuard<'a> {
        if self.buyer_first {
            &self.second.guard
        } else {
            &self.first.guard
        }
    }

    /// Ids in acquisition order.
    pub fn acquisition_order(&self) -> [AccountId; 2] {
        [self.first.guard.id(), self.second.guard.id()]
    }
}
