// settle-core: trade settlement engine.
// settles already-matched buy/sell pairs against shared account ledgers under
// concurrent callers. deadlock-free via one global lock order on AccountId.
// spawns no threads; the caller's scheduler invokes settle() from its workers.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: AccountId, Price, Funds, Symbol, Side
//   2.x  order.rs: orders and matched transactions
//   3.x  notify.rs: execution/cancellation sink
//   4.x  order_book.rs: re-post target for retried legs
//   5.x  directory.rs: (broker, investor) -> account lookup
//   8.x  engine/: settlement, ordered locking, config, results
//   10.x account.rs: funds + holdings under one reentrant lock

pub mod account;
pub mod directory;
pub mod engine;
pub mod notify;
pub mod order;
pub mod order_book;
pub mod types;

// re exports for convenience
pub use account::*;
pub use directory::*;
pub use engine::*;
pub use notify::*;
pub use order::*;
pub use order_book::*;
pub use types::*;
