// 8.0 engine/settlement.rs: settlement engine. resolves both accounts, locks them in id order,
// checks funds and moves money and stock. holds no state between calls.

use super::config::EngineConfig;
use super::locking::{LockObserver, LockedPair};
use super::results::{LegOutcome, SettlementFailure, SettlementReport};
use crate::directory::AccountDirectory;
use crate::notify::NotificationSink;
use crate::order::{Order, Transaction};
use crate::order_book::OrderBook;
use crate::types::{AccountId, Funds, Price, Timestamp};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, debug_span, info, warn};

/** 8.1: shared by every worker thread. collaborators are external */
pub struct SettlementEngine {
    config: EngineConfig,
    directory: Arc<dyn AccountDirectory>,
    order_book: Arc<dyn OrderBook>,
    sink: Arc<dyn NotificationSink>,
    observer: Option<Arc<dyn LockObserver>>,
}

impl SettlementEngine {
    pub fn new(
        config: EngineConfig,
        directory: Arc<dyn AccountDirectory>,
        order_book: Arc<dyn OrderBook>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            config,
            directory,
            order_book,
            sink,
            observer: None,
        }
    }

    pub fn with_lock_observer(mut self, observer: Arc<dyn LockObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Settles one matched pair. Every anticipated failure ends up as a
    /// Cancelled/Retry outcome, so this never fails.
    ///
    /// The pair must cross (`buy.price >= sell.price`). A non-crossing pair is
    /// a caller bug and trips a debug assertion; release builds settle it at
    /// the buyer's price anyway.
    pub fn settle(&self, transaction: &Transaction) -> SettlementReport {
        let buy = transaction.buy();
        let sell = transaction.sell();
        let span = debug_span!("settle", buy = %buy.id, sell = %sell.id, symbol = %buy.symbol);
        let _entered = span.enter();

        let buyer = self.directory.resolve(buy.broker, buy.investor);
        let seller = self.directory.resolve(sell.broker, sell.investor);
        let (buyer, seller) = match (buyer, seller) {
            (Some(buyer), Some(seller)) => (buyer, seller),
            (buyer, seller) => {
                return self.unresolved(buy, sell, buyer.map(|a| a.id()), seller.map(|a| a.id()))
            }
        };

        // buyer sets the price
        let price = buy.price;
        debug_assert!(
            price >= sell.price,
            "matched pair does not cross: buy {} < sell {}",
            price,
            sell.price
        );

        let pair = LockedPair::acquire(&buyer, &seller, self.observer.as_deref());
        debug!(order = ?pair.acquisition_order(), "accounts locked");
        self.transfer(&pair, buy, sell, price)
    }

    // one or both accounts missing. no locks taken.
    fn unresolved(
        &self,
        buy: &Order,
        sell: &Order,
        buyer: Option<AccountId>,
        seller: Option<AccountId>,
    ) -> SettlementReport {
        if buyer.is_none() {
            self.sink.notify_cancellation(buy);
        }
        if seller.is_none() {
            self.sink.notify_cancellation(sell);
        }

        // the leg whose account exists waits for a new counterparty
        let buy_outcome = if buyer.is_some() {
            self.order_book.post(buy.clone());
            LegOutcome::Retry
        } else {
            LegOutcome::Cancelled
        };
        let sell_outcome = if seller.is_some() {
            self.order_book.post(sell.clone());
            LegOutcome::Retry
        } else {
            LegOutcome::Cancelled
        };

        warn!(
            buyer_missing = buyer.is_none(),
            seller_missing = seller.is_none(),
            "account not found"
        );

        report(
            buy.price,
            (buyer, seller),
            (buy_outcome, sell_outcome),
            Some(SettlementFailure::AccountNotFound {
                buyer_missing: buyer.is_none(),
                seller_missing: seller.is_none(),
            }),
        )
    }

    // runs entirely under both locks
    fn transfer(&self, pair: &LockedPair<'_>, buy: &Order, sell: &Order, price: Price) -> SettlementReport {
        let buyer = pair.buyer();
        let seller = pair.seller();
        let accounts = (Some(buyer.id()), Some(seller.id()));
        let amount = Funds::from(price);

        let available = buyer.balance();
        let funded = if self.config.funds_check.admits(available, amount) {
            buyer.withdraw(amount).map_err(SettlementFailure::from)
        } else {
            Err(SettlementFailure::InsufficientFunds {
                account: buyer.id(),
                required: amount,
                available,
            })
        };
        if let Err(failure) = funded {
            self.order_book.post(sell.clone());
            self.sink.notify_cancellation(buy);
            warn!(%failure, "buy cancelled, sell re-posted");
            return report(price, accounts, (LegOutcome::Cancelled, LegOutcome::Retry), Some(failure));
        }

        if let Err(err) = seller.remove_stock(&buy.symbol) {
            if self.config.refund_on_missing_stock {
                buyer.deposit(amount);
            }
            self.sink.notify_cancellation(sell);
            self.order_book.post(buy.clone());
            warn!(
                %err,
                refunded = self.config.refund_on_missing_stock,
                "sell cancelled, buy re-posted"
            );
            return report(
                price,
                accounts,
                (LegOutcome::Retry, LegOutcome::Cancelled),
                Some(err.into()),
            );
        }

        seller.deposit(amount);
        buyer.add_stock(&buy.symbol);
        self.sink.notify_execution(sell);
        self.sink.notify_execution(buy);
        info!(
            buyer = %buyer.id(),
            seller = %seller.id(),
            %price,
            "settled"
        );

        report(price, accounts, (LegOutcome::Executed, LegOutcome::Executed), None)
    }
}

impl fmt::Debug for SettlementEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettlementEngine")
            .field("config", &self.config)
            .field("observed", &self.observer.is_some())
            .finish_non_exhaustive()
    }
}

fn report(
    price: Price,
    (buyer, seller): (Option<AccountId>, Option<AccountId>),
    (buy, sell): (LegOutcome, LegOutcome),
    failure: Option<SettlementFailure>,
) -> SettlementReport {
    SettlementReport {
        buy,
        sell,
        price,
        buyer,
        seller,
        failure,
        settled_at: Timestamp::now(),
    }
}
