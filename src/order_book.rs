//! Receiving end for re-posted orders.
//!
//! The real book (matching, price-time priority) is external. Settlement only
//! ever hands an order back so it can wait for a new match.

use crate::order::Order;
use parking_lot::Mutex;
use std::collections::VecDeque;

pub trait OrderBook: Send + Sync {
    /// Re-enqueue `order` for future matching. Fire-and-forget.
    fn post(&self, order: Order);
}

/// FIFO book used by tests and the simulator.
#[derive(Debug, Default)]
pub struct InMemoryOrderBook {
    queue: Mutex<VecDeque<Order>>,
}

impl InMemoryOrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pop(&self) -> Option<Order> {
        self.queue.lock().pop_front()
    }

    pub fn drain(&self) -> Vec<Order> {
        self.queue.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

impl OrderBook for InMemoryOrderBook {
    fn post(&self, order: Order) {
        self.queue.lock().push_back(order);
    }
}
