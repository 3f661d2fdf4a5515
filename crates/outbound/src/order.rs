use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{OrderId, OrderItemId, ProductId};

/// Outbound order status lifecycle.
///
/// Shipped and Cancelled are terminal; Cancelled is reachable from Pending or
/// Picking only, never once packing has begun. The status is authoritative
/// state advanced by explicit transitions, not recomputed from item sums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Picking,
    Packing,
    Shipped,
    Cancelled,
}

/// Pick-queue priority. Affects ordering only, never ledger correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderPriority {
    Low,
    Medium,
    High,
}

/// One demanded line on an outbound order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product_id: ProductId,
    pub quantity: u64,
    pub picked_quantity: u64,
}

impl OrderItem {
    pub fn remaining_to_pick(&self) -> u64 {
        self.quantity - self.picked_quantity
    }

    pub fn is_fully_picked(&self) -> bool {
        self.picked_quantity >= self.quantity
    }
}

/// Creation request for an outbound order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSpec {
    /// Operator-facing reference (`ORD-2024-001` style), unique per store.
    pub reference: String,
    pub customer: String,
    pub priority: OrderPriority,
    pub items: Vec<OrderItemSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemSpec {
    pub product_id: ProductId,
    pub quantity: u64,
}

/// An outbound order and its fulfillment progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub reference: String,
    pub customer: String,
    pub status: OrderStatus,
    pub priority: OrderPriority,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn item(&self, order_item_id: OrderItemId) -> Option<&OrderItem> {
        self.items.iter().find(|item| item.id == order_item_id)
    }

    pub fn is_fully_picked(&self) -> bool {
        self.items.iter().all(OrderItem::is_fully_picked)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, OrderStatus::Shipped | OrderStatus::Cancelled)
    }

    pub(crate) fn item_mut(&mut self, order_item_id: OrderItemId) -> Option<&mut OrderItem> {
        self.items.iter_mut().find(|item| item.id == order_item_id)
    }
}
