//! Settlement scenarios
//!
//! One matched pair at a time against in-memory collaborators, checking
//! balances, holdings, notifications and re-posts for every outcome path.

use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use settle_core::*;
use std::sync::Arc;

#[derive(Default)]
struct LockTrace {
    events: Mutex<Vec<(&'static str, AccountId)>>,
}

impl LockTrace {
    fn acquisitions(&self) -> Vec<AccountId> {
        self.events
            .lock()
            .iter()
            .filter(|(kind, _)| *kind == "acquire")
            .map(|(_, id)| *id)
            .collect()
    }
}

impl LockObserver for LockTrace {
    fn acquired(&self, account: AccountId) {
        self.events.lock().push(("acquire", account));
    }

    fn released(&self, account: AccountId) {
        self.events.lock().push(("release", account));
    }
}

struct Setup {
    directory: Arc<InMemoryDirectory>,
    book: Arc<InMemoryOrderBook>,
    sink: Arc<RecordingSink>,
    trace: Arc<LockTrace>,
    engine: SettlementEngine,
}

fn setup(config: EngineConfig) -> Setup {
    let directory = Arc::new(InMemoryDirectory::new());
    let book = Arc::new(InMemoryOrderBook::new());
    let sink = Arc::new(RecordingSink::new());
    let trace = Arc::new(LockTrace::default());
    let engine = SettlementEngine::new(config, directory.clone(), book.clone(), sink.clone())
        .with_lock_observer(trace.clone());
    Setup {
        directory,
        book,
        sink,
        trace,
        engine,
    }
}

const BUYER: (BrokerId, InvestorId) = (BrokerId(1), InvestorId(100));
const SELLER: (BrokerId, InvestorId) = (BrokerId(2), InvestorId(200));

fn acme() -> Symbol {
    Symbol::from("ACME")
}

fn transaction(buy_price: Decimal, sell_price: Decimal) -> Transaction {
    Transaction::new(
        Order::buy(OrderId(1), BUYER.0, BUYER.1, "ACME", Price::new_unchecked(buy_price)),
        Order::sell(OrderId(2), SELLER.0, SELLER.1, "ACME", Price::new_unchecked(sell_price)),
    )
    .unwrap()
}

fn open(setup: &Setup, who: (BrokerId, InvestorId), balance: Decimal, lots: u64) -> Arc<Account> {
    let account = setup.directory.open_account(who.0, who.1, Funds::new(balance));
    for _ in 0..lots {
        account.lock().add_stock(&acme());
    }
    account
}

mod outcome_paths {
    use super::*;

    #[test]
    fn funded_buyer_and_holding_seller_execute() {
        let s = setup(EngineConfig::default());
        let buyer = open(&s, BUYER, dec!(100), 0);
        let seller = open(&s, SELLER, dec!(20), 1);

        let report = s.engine.settle(&transaction(dec!(50), dec!(50)));

        assert_eq!(report.outcomes(), (LegOutcome::Executed, LegOutcome::Executed));
        assert!(report.failure.is_none());
        assert_eq!(buyer.snapshot().balance.value(), dec!(50));
        assert_eq!(seller.snapshot().balance.value(), dec!(70));
        assert_eq!(buyer.snapshot().holding(&acme()), 1);
        assert_eq!(seller.snapshot().holding(&acme()), 0);

        // sell leg is notified first
        let notifications = s.sink.notifications();
        assert_eq!(notifications.len(), 2);
        assert_eq!(notifications[0].order_id, OrderId(2));
        assert_eq!(notifications[1].order_id, OrderId(1));
        assert!(notifications.iter().all(|n| n.kind == NotificationKind::Executed));
        assert!(s.book.is_empty());
    }

    #[test]
    fn short_buyer_cancels_buy_and_reposts_sell() {
        let s = setup(EngineConfig::default());
        let buyer = open(&s, BUYER, dec!(30), 0);
        let seller = open(&s, SELLER, dec!(0), 1);

        let report = s.engine.settle(&transaction(dec!(50), dec!(50)));

        assert_eq!(report.outcomes(), (LegOutcome::Cancelled, LegOutcome::Retry));
        assert!(matches!(report.failure, Some(SettlementFailure::InsufficientFunds { .. })));
        assert_eq!(buyer.snapshot().balance.value(), dec!(30));
        assert_eq!(seller.snapshot().balance.value(), dec!(0));
        assert_eq!(seller.snapshot().holding(&acme()), 1);

        assert_eq!(s.sink.for_order(OrderId(1)), vec![NotificationKind::Cancelled]);
        assert!(s.sink.for_order(OrderId(2)).is_empty());
        assert_eq!(s.book.pop().map(|o| o.id), Some(OrderId(2)));
        assert!(s.book.is_empty());
    }

    #[test]
    fn balance_equal_to_price_is_not_enough_by_default() {
        let s = setup(EngineConfig::default());
        open(&s, BUYER, dec!(50), 0);
        open(&s, SELLER, dec!(0), 1);

        let report = s.engine.settle(&transaction(dec!(50), dec!(50)));
        assert_eq!(report.outcomes(), (LegOutcome::Cancelled, LegOutcome::Retry));
    }

    #[test]
    fn seller_without_stock_keeps_buyer_debit() {
        // known non-conserving path: the withdrawal is not reversed
        let s = setup(EngineConfig::default());
        let buyer = open(&s, BUYER, dec!(100), 0);
        let seller = open(&s, SELLER, dec!(0), 0);

        let report = s.engine.settle(&transaction(dec!(50), dec!(50)));

        assert_eq!(report.outcomes(), (LegOutcome::Retry, LegOutcome::Cancelled));
        assert!(matches!(report.failure, Some(SettlementFailure::NoSuchStock { .. })));
        assert_eq!(buyer.snapshot().balance.value(), dec!(50));
        assert_eq!(seller.snapshot().balance.value(), dec!(0));
        assert_eq!(buyer.snapshot().holding(&acme()), 0);

        assert_eq!(s.sink.for_order(OrderId(2)), vec![NotificationKind::Cancelled]);
        assert!(s.sink.for_order(OrderId(1)).is_empty());
        assert_eq!(s.book.pop().map(|o| o.id), Some(OrderId(1)));
    }

    #[test]
    fn seller_without_stock_refunds_under_conserving_config() {
        let s = setup(EngineConfig::conserving());
        let buyer = open(&s, BUYER, dec!(100), 0);
        open(&s, SELLER, dec!(0), 0);

        let report = s.engine.settle(&transaction(dec!(50), dec!(50)));

        assert_eq!(report.outcomes(), (LegOutcome::Retry, LegOutcome::Cancelled));
        assert_eq!(buyer.snapshot().balance.value(), dec!(100));
    }

    #[test]
    fn buyer_limit_sets_the_price() {
        let s = setup(EngineConfig::default());
        let buyer = open(&s, BUYER, dec!(100), 0);
        let seller = open(&s, SELLER, dec!(0), 1);

        let report = s.engine.settle(&transaction(dec!(60), dec!(40)));

        assert!(report.is_executed());
        assert_eq!(report.price.value(), dec!(60));
        assert_eq!(buyer.snapshot().balance.value(), dec!(40));
        assert_eq!(seller.snapshot().balance.value(), dec!(60));
    }
}

mod missing_accounts {
    use super::*;

    #[test]
    fn missing_seller_cancels_sell_and_reposts_buy() {
        let s = setup(EngineConfig::default());
        let buyer = open(&s, BUYER, dec!(100), 0);

        let report = s.engine.settle(&transaction(dec!(50), dec!(50)));

        assert_eq!(report.outcomes(), (LegOutcome::Retry, LegOutcome::Cancelled));
        assert_eq!(
            report.failure,
            Some(SettlementFailure::AccountNotFound {
                buyer_missing: false,
                seller_missing: true,
            })
        );
        assert_eq!(report.seller, None);
        assert_eq!(buyer.snapshot().balance.value(), dec!(100));
        assert_eq!(s.sink.for_order(OrderId(2)), vec![NotificationKind::Cancelled]);
        assert_eq!(s.book.pop().map(|o| o.id), Some(OrderId(1)));
        assert!(s.trace.acquisitions().is_empty(), "no locks taken");
    }

    #[test]
    fn missing_buyer_cancels_buy_and_reposts_sell() {
        let s = setup(EngineConfig::default());
        open(&s, SELLER, dec!(0), 1);

        let report = s.engine.settle(&transaction(dec!(50), dec!(50)));

        assert_eq!(report.outcomes(), (LegOutcome::Cancelled, LegOutcome::Retry));
        assert_eq!(s.sink.for_order(OrderId(1)), vec![NotificationKind::Cancelled]);
        assert_eq!(s.book.pop().map(|o| o.id), Some(OrderId(2)));
        assert!(s.trace.acquisitions().is_empty());
    }

    #[test]
    fn both_missing_cancels_both_without_repost() {
        let s = setup(EngineConfig::default());

        let report = s.engine.settle(&transaction(dec!(50), dec!(50)));

        assert_eq!(report.outcomes(), (LegOutcome::Cancelled, LegOutcome::Cancelled));
        assert_eq!(s.sink.count(NotificationKind::Cancelled), 2);
        assert!(s.book.is_empty());
        assert!(s.trace.acquisitions().is_empty());
    }
}

mod locking {
    use super::*;

    fn register(s: &Setup, who: (BrokerId, InvestorId), id: u64) -> Arc<Account> {
        let account = Arc::new(
            Account::with_balance(AccountId(id), Funds::new(dec!(100))).with_stock("ACME", 1),
        );
        s.directory.register(who.0, who.1, account.clone()).unwrap();
        account
    }

    #[test]
    fn lower_id_locked_first_when_buyer_is_lower() {
        let s = setup(EngineConfig::default());
        register(&s, BUYER, 5);
        register(&s, SELLER, 9);

        s.engine.settle(&transaction(dec!(50), dec!(50)));
        assert_eq!(s.trace.acquisitions(), vec![AccountId(5), AccountId(9)]);
    }

    #[test]
    fn lower_id_locked_first_when_seller_is_lower() {
        let s = setup(EngineConfig::default());
        register(&s, BUYER, 9);
        register(&s, SELLER, 5);

        s.engine.settle(&transaction(dec!(50), dec!(50)));
        assert_eq!(s.trace.acquisitions(), vec![AccountId(5), AccountId(9)]);
    }

    #[test]
    fn locks_released_in_reverse_on_every_path() {
        for (balance, lots) in [(dec!(100), 1), (dec!(10), 1), (dec!(100), 0)] {
            let s = setup(EngineConfig::default());
            let buyer = Arc::new(Account::with_balance(AccountId(9), Funds::new(balance)));
            let seller = Arc::new(Account::new(AccountId(5)).with_stock("ACME", lots));
            s.directory.register(BUYER.0, BUYER.1, buyer).unwrap();
            s.directory.register(SELLER.0, SELLER.1, seller).unwrap();

            s.engine.settle(&transaction(dec!(50), dec!(50)));

            assert_eq!(
                *s.trace.events.lock(),
                vec![
                    ("acquire", AccountId(5)),
                    ("acquire", AccountId(9)),
                    ("release", AccountId(9)),
                    ("release", AccountId(5)),
                ]
            );
        }
    }

    #[test]
    fn self_trade_reenters_single_lock() {
        let s = setup(EngineConfig::default());
        let account = open(&s, BUYER, dec!(100), 1);
        s.directory.register(SELLER.0, SELLER.1, account.clone()).unwrap();

        let report = s.engine.settle(&transaction(dec!(50), dec!(50)));

        assert!(report.is_executed());
        assert_eq!(report.buyer, report.seller);
        assert_eq!(account.snapshot().balance.value(), dec!(100));
        assert_eq!(account.snapshot().holding(&acme()), 1);
        assert_eq!(s.trace.acquisitions(), vec![account.id(), account.id()]);
    }
}

#[test]
#[should_panic(expected = "does not cross")]
#[cfg(debug_assertions)]
fn non_crossing_pair_trips_debug_assertion() {
    let s = setup(EngineConfig::default());
    open(&s, BUYER, dec!(100), 0);
    open(&s, SELLER, dec!(0), 1);

    s.engine.settle(&transaction(dec!(40), dec!(50)));
}

#[test]
fn report_serializes_for_audit() {
    let s = setup(EngineConfig::default());
    open(&s, BUYER, dec!(100), 0);
    open(&s, SELLER, dec!(0), 1);

    let report = s.engine.settle(&transaction(dec!(50), dec!(50)));
    let json = serde_json::to_string(&report).unwrap();
    let back: SettlementReport = serde_json::from_str(&json).unwrap();
    assert_eq!(back, report);
}
