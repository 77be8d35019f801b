// 3.0: per-order execution/cancellation signals. delivery transport is external;
// the engine calls the sink and never looks at what happens next.

use crate::order::Order;
use crate::types::OrderId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;

pub trait NotificationSink: Send + Sync {
    fn notify_execution(&self, order: &Order);
    fn notify_cancellation(&self, order: &Order);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    Executed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub order_id: OrderId,
    pub kind: NotificationKind,
}

/// Keeps every signal in arrival order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    log: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.log.lock().clone()
    }

    pub fn for_order(&self, order_id: OrderId) -> Vec<NotificationKind> {
        self.log
            .lock()
            .iter()
            .filter(|n| n.order_id == order_id)
            .map(|n| n.kind)
            .collect()
    }

    pub fn count(&self, kind: NotificationKind) -> usize {
        self.log.lock().iter().filter(|n| n.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.log.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.lock().is_empty()
    }

    fn record(&self, order: &Order, kind: NotificationKind) {
        self.log.lock().push(Notification {
            order_id: order.id,
            kind,
        });
    }
}

impl NotificationSink for RecordingSink {
    fn notify_execution(&self, order: &Order) {
        self.record(order, NotificationKind::Executed);
    }

    fn notify_cancellation(&self, order: &Order) {
        self.record(order, NotificationKind::Cancelled);
    }
}

/// Logs signals and drops them.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify_execution(&self, order: &Order) {
        info!(order = %order.id, side = %order.side, symbol = %order.symbol, "order executed");
    }

    fn notify_cancellation(&self, order: &Order) {
        info!(order = %order.id, side = %order.side, symbol = %order.symbol, "order cancelled");
    }
}
