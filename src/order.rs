//! Orders and matched transactions.
//!
//! Matching happens elsewhere. Here an order is just what settlement needs to
//! read: who is behind it, what it trades and at which limit.

use crate::types::{BrokerId, InvestorId, OrderId, Price, Side, Symbol, Timestamp};
use serde::{Deserialize, Serialize};

/// A limit order for one lot of `symbol`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub side: Side,
    pub broker: BrokerId,
    pub investor: InvestorId,
    pub symbol: Symbol,
    pub price: Price,
    pub created_at: Timestamp,
}

impl Order {
    pub fn new(
        id: OrderId,
        side: Side,
        broker: BrokerId,
        investor: InvestorId,
        symbol: impl Into<Symbol>,
        price: Price,
    ) -> Self {
        Self {
            id,
            side,
            broker,
            investor,
            symbol: symbol.into(),
            price,
            created_at: Timestamp::now(),
        }
    }

    pub fn buy(
        id: OrderId,
        broker: BrokerId,
        investor: InvestorId,
        symbol: impl Into<Symbol>,
        price: Price,
    ) -> Self {
        Self::new(id, Side::Buy, broker, investor, symbol, price)
    }

    pub fn sell(
        id: OrderId,
        broker: BrokerId,
        investor: InvestorId,
        symbol: impl Into<Symbol>,
        price: Price,
    ) -> Self {
        Self::new(id, Side::Sell, broker, investor, symbol, price)
    }
}

/// A matched pair: exactly one buy and one sell of the same symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    buy: Order,
    sell: Order,
}

impl Transaction {
    pub fn new(buy: Order, sell: Order) -> Result<Self, TransactionError> {
        if buy.side != Side::Buy {
            return Err(TransactionError::WrongSide {
                order: buy.id,
                expected: Side::Buy,
            });
        }
        if sell.side != Side::Sell {
            return Err(TransactionError::WrongSide {
                order: sell.id,
                expected: Side::Sell,
            });
        }
        if buy.symbol != sell.symbol {
            return Err(TransactionError::SymbolMismatch {
                buy: buy.symbol,
                sell: sell.symbol,
            });
        }
        Ok(Self { buy, sell })
    }

    pub fn buy(&self) -> &Order {
        &self.buy
    }

    pub fn sell(&self) -> &Order {
        &self.sell
    }

    pub fn symbol(&self) -> &Symbol {
        &self.buy.symbol
    }

    pub fn into_parts(self) -> (Order, Order) {
        (self.buy, self.sell)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransactionError {
    #[error("Order {order} is not a {expected} order")]
    WrongSide { order: OrderId, expected: Side },

    #[error("Symbol mismatch: buy {buy}, sell {sell}")]
    SymbolMismatch { buy: Symbol, sell: Symbol },
}
