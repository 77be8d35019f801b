//! Settlement engine simulation.
//!
//! Walks through the basic settlement outcomes on a single pair of accounts,
//! then hammers one shared engine from several worker threads and checks that
//! funds and stock are conserved.

use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use settle_core::*;
use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Settlement engine simulator
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level used when RUST_LOG is unset
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// Worker threads calling settle concurrently
    #[arg(short, long, default_value_t = 8)]
    workers: usize,

    /// Accounts in the shared pool
    #[arg(short, long, default_value_t = 16)]
    accounts: u64,

    /// Matched pairs to settle
    #[arg(short, long, default_value_t = 20_000)]
    trades: u64,

    /// RNG seed for the stress workload
    #[arg(short, long, default_value_t = 7)]
    seed: u64,
}

struct Market {
    directory: Arc<InMemoryDirectory>,
    book: Arc<InMemoryOrderBook>,
    engine: SettlementEngine,
}

impl Market {
    fn new(config: EngineConfig, sink: Arc<dyn NotificationSink>) -> Self {
        let directory = Arc::new(InMemoryDirectory::new());
        let book = Arc::new(InMemoryOrderBook::new());
        let engine = SettlementEngine::new(config, directory.clone(), book.clone(), sink);
        Self {
            directory,
            book,
            engine,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("settle_core={0},settle_sim={0}", cli.log_level))
    });
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = EngineConfig::from_env()?;
    info!(?config, "engine configuration");

    println!("Settlement Engine Simulation\n");

    scenario_1_execution(&config)?;
    scenario_2_insufficient_funds(&config)?;
    scenario_3_missing_stock(&config)?;
    scenario_4_missing_account(&config)?;
    scenario_5_concurrent_stress(&cli)?;

    println!("\nAll simulations completed successfully.");
    Ok(())
}

fn price(value: Decimal) -> Price {
    Price::new_unchecked(value)
}

fn matched(buy: (u32, u64), sell: (u32, u64), buy_price: Decimal, sell_price: Decimal) -> Result<Transaction, TransactionError> {
    Transaction::new(
        Order::buy(OrderId(1), BrokerId(buy.0), InvestorId(buy.1), "ACME", price(buy_price)),
        Order::sell(OrderId(2), BrokerId(sell.0), InvestorId(sell.1), "ACME", price(sell_price)),
    )
}

fn print_report(report: &SettlementReport) {
    println!("  Buy leg: {:?}, sell leg: {:?}", report.buy, report.sell);
    if let Some(failure) = &report.failure {
        println!("  Reason: {}", failure);
    }
}

/// Funded buyer, seller holds the stock.
fn scenario_1_execution(config: &EngineConfig) -> Result<(), Box<dyn Error>> {
    println!("Scenario 1: Execution\n");

    let market = Market::new(config.clone(), Arc::new(TracingSink));
    let buyer = market.directory.open_account(BrokerId(1), InvestorId(1), Funds::new(dec!(100)));
    let seller = market.directory.open_account(BrokerId(1), InvestorId(2), Funds::zero());
    seller.lock().add_stock(&Symbol::from("ACME"));

    let report = market.engine.settle(&matched((1, 1), (1, 2), dec!(50), dec!(45))?);
    print_report(&report);

    let acme = Symbol::from("ACME");
    let (b, s) = (buyer.snapshot(), seller.snapshot());
    println!("  Buyer: ${}, {} ACME", b.balance, b.holding(&acme));
    println!("  Seller: ${}, {} ACME\n", s.balance, s.holding(&acme));
    Ok(())
}

/// Buyer cannot cover the price.
fn scenario_2_insufficient_funds(config: &EngineConfig) -> Result<(), Box<dyn Error>> {
    println!("Scenario 2: Insufficient Funds\n");

    let market = Market::new(config.clone(), Arc::new(TracingSink));
    market.directory.open_account(BrokerId(1), InvestorId(1), Funds::new(dec!(30)));
    let seller = market.directory.open_account(BrokerId(1), InvestorId(2), Funds::zero());
    seller.lock().add_stock(&Symbol::from("ACME"));

    let report = market.engine.settle(&matched((1, 1), (1, 2), dec!(50), dec!(50))?);
    print_report(&report);
    println!("  Orders waiting in book: {}\n", market.book.len());
    Ok(())
}

/// Seller does not hold the stock.
fn scenario_3_missing_stock(config: &EngineConfig) -> Result<(), Box<dyn Error>> {
    println!("Scenario 3: Missing Stock\n");

    let market = Market::new(config.clone(), Arc::new(TracingSink));
    let buyer = market.directory.open_account(BrokerId(1), InvestorId(1), Funds::new(dec!(100)));
    market.directory.open_account(BrokerId(1), InvestorId(2), Funds::zero());

    let report = market.engine.settle(&matched((1, 1), (1, 2), dec!(50), dec!(50))?);
    print_report(&report);
    println!(
        "  Buyer balance after abort: ${} (refund on missing stock: {})\n",
        buyer.snapshot().balance,
        config.refund_on_missing_stock
    );
    Ok(())
}

/// Seller's account cannot be resolved.
fn scenario_4_missing_account(config: &EngineConfig) -> Result<(), Box<dyn Error>> {
    println!("Scenario 4: Missing Account\n");

    let market = Market::new(config.clone(), Arc::new(TracingSink));
    market.directory.open_account(BrokerId(1), InvestorId(1), Funds::new(dec!(100)));

    let report = market.engine.settle(&matched((1, 1), (9, 9), dec!(50), dec!(50))?);
    print_report(&report);
    println!("  Orders waiting in book: {}\n", market.book.len());
    Ok(())
}

/// Many workers, one engine, random pairs over a small shared pool.
fn scenario_5_concurrent_stress(cli: &Cli) -> Result<(), Box<dyn Error>> {
    println!("Scenario 5: Concurrent Stress\n");

    let sink = Arc::new(RecordingSink::new());
    let market = Market::new(EngineConfig::conserving(), sink.clone());
    let acme = Symbol::from("ACME");

    let accounts: Vec<_> = (0..cli.accounts.max(2))
        .map(|investor| {
            let account = market
                .directory
                .open_account(BrokerId(1), InvestorId(investor), Funds::new(dec!(1000)));
            for _ in 0..5 {
                account.lock().add_stock(&acme);
            }
            account
        })
        .collect();

    let funds_before: Funds = accounts.iter().map(|a| a.snapshot().balance).sum();
    let lots_before: u64 = accounts.iter().map(|a| a.snapshot().holding(&acme)).sum();

    let mut rng = StdRng::seed_from_u64(cli.seed);
    let pool = accounts.len() as u64;
    let transactions = (0..cli.trades)
        .map(|i| {
            let buyer = rng.gen_range(0..pool);
            let seller = rng.gen_range(0..pool);
            let ask = rng.gen_range(10i64..=60);
            let bid = ask + rng.gen_range(0i64..=5);
            Transaction::new(
                Order::buy(OrderId(2 * i), BrokerId(1), InvestorId(buyer), "ACME", price(Decimal::from(bid))),
                Order::sell(OrderId(2 * i + 1), BrokerId(1), InvestorId(seller), "ACME", price(Decimal::from(ask))),
            )
        })
        .collect::<Result<Vec<_>, _>>()?;

    let executed = AtomicUsize::new(0);
    let workers = cli.workers.max(1);
    let chunk = transactions.len().div_ceil(workers).max(1);
    let started = Instant::now();

    thread::scope(|scope| {
        for batch in transactions.chunks(chunk) {
            let engine = &market.engine;
            let executed = &executed;
            scope.spawn(move || {
                for transaction in batch {
                    if engine.settle(transaction).is_executed() {
                        executed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });

    let elapsed = started.elapsed();
    let funds_after: Funds = accounts.iter().map(|a| a.snapshot().balance).sum();
    let lots_after: u64 = accounts.iter().map(|a| a.snapshot().holding(&acme)).sum();

    println!("  {} settlements on {} workers in {:?}", transactions.len(), workers, elapsed);
    println!("  Executed: {}, re-posted: {}", executed.load(Ordering::Relaxed), market.book.len());
    println!("  Notifications: {}", sink.len());
    println!("  Funds: {} -> {}", funds_before, funds_after);
    println!("  ACME lots: {} -> {}", lots_before, lots_after);

    if funds_before != funds_after || lots_before != lots_after {
        return Err("conservation violated".into());
    }
    Ok(())
}
