use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{ProductId, PurchaseOrderId};

/// Purchase order status lifecycle.
///
/// Pending moves to Receiving on the first receipt, Receiving to Completed
/// once every line is received in full. Completed is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseOrderStatus {
    Pending,
    Receiving,
    Completed,
}

/// One expected line on a purchase order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoItem {
    pub product_id: ProductId,
    pub expected_quantity: u64,
    pub received_quantity: u64,
}

impl PoItem {
    pub fn outstanding(&self) -> u64 {
        self.expected_quantity.saturating_sub(self.received_quantity)
    }

    pub fn is_fully_received(&self) -> bool {
        self.received_quantity >= self.expected_quantity
    }
}

/// Creation request for a purchase order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderSpec {
    /// Operator-facing reference (`PO-2024-001` style), unique per store.
    pub reference: String,
    pub supplier: String,
    pub expected_date: Option<DateTime<Utc>>,
    /// When set, receipts beyond the expected quantity are accepted and
    /// reported as a discrepancy instead of blocked.
    pub allow_over_receipt: bool,
    pub items: Vec<PoItemSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoItemSpec {
    pub product_id: ProductId,
    pub expected_quantity: u64,
}

/// An inbound purchase order and its receipt progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: PurchaseOrderId,
    pub reference: String,
    pub supplier: String,
    pub status: PurchaseOrderStatus,
    pub expected_date: Option<DateTime<Utc>>,
    pub allow_over_receipt: bool,
    pub items: Vec<PoItem>,
    pub created_at: DateTime<Utc>,
}

impl PurchaseOrder {
    pub fn is_closed(&self) -> bool {
        matches!(self.status, PurchaseOrderStatus::Completed)
    }

    pub fn item(&self, product_id: ProductId) -> Option<&PoItem> {
        self.items.iter().find(|item| item.product_id == product_id)
    }

    /// Expected units not yet received across all lines.
    pub fn outstanding_units(&self) -> u64 {
        self.items.iter().map(PoItem::outstanding).sum()
    }

    pub(crate) fn item_mut(&mut self, product_id: ProductId) -> Option<&mut PoItem> {
        self.items
            .iter_mut()
            .find(|item| item.product_id == product_id)
    }

    /// Recompute status from receipt progress. Called after every receipt;
    /// Completed is never left.
    pub(crate) fn refresh_status(&mut self) {
        if self.items.iter().all(PoItem::is_fully_received) {
            self.status = PurchaseOrderStatus::Completed;
        } else if self.items.iter().any(|item| item.received_quantity > 0) {
            self.status = PurchaseOrderStatus::Receiving;
        }
    }
}

/// Per-line expected/received delta for reconciliation reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptDiscrepancy {
    pub product_id: ProductId,
    pub expected_quantity: u64,
    pub received_quantity: u64,
    /// received - expected: negative under-receipt, positive over-receipt.
    pub delta: i64,
}
