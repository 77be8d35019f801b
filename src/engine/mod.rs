// 8.0: settlement engine. takes a matched pair, locks both accounts in id order,
// moves funds and stock, reports per-leg outcomes and re-posts what can retry.

mod config;
mod locking;
mod results;
mod settlement;

pub use config::{ConfigError, EngineConfig, FundsCheck};
pub use locking::{LockObserver, LockedPair};
pub use results::{LegOutcome, SettlementFailure, SettlementReport};
pub use settlement::SettlementEngine;
