use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{LocationId, OrderItemId, PurchaseOrderId, StockResult, StockroomError};

use crate::facade::Warehouse;

/// One barcode scan from a handheld unit. Each scan moves exactly one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEvent {
    pub barcode: String,
    /// Where the unit physically is. Required for receive tasks.
    pub location_hint: Option<LocationId>,
    pub occurred_at: DateTime<Utc>,
}

/// The work context a scan is applied against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum ScanTask {
    /// Picking one unit for an outbound order line.
    Pick { order_item_id: OrderItemId },
    /// Putting one received unit away against a purchase order.
    Receive { purchase_order_id: PurchaseOrderId },
}

/// What a scan changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum ScanOutcome {
    Picked {
        order_item_id: OrderItemId,
        picked_quantity: u64,
        quantity: u64,
    },
    Received {
        purchase_order_id: PurchaseOrderId,
        location_id: LocationId,
    },
}

impl Warehouse {
    /// Route a barcode scan to its task.
    ///
    /// The barcode resolves through the catalog first; a pick scan must also
    /// match the product on the order line it claims to pick.
    pub fn apply_scan(&self, event: &ScanEvent, task: ScanTask) -> StockResult<ScanOutcome> {
        let product = self.catalog().by_barcode(&event.barcode)?;
        match task {
            ScanTask::Pick { order_item_id } => {
                let (_, item) = self.fulfillment().item(order_item_id)?;
                if item.product_id != product.id {
                    return Err(StockroomError::validation(format!(
                        "scanned {} but order line expects a different product",
                        product.sku
                    )));
                }
                let order = self.confirm_pick(order_item_id, 1)?;
                let item = order
                    .item(order_item_id)
                    .ok_or(StockroomError::UnknownOrderItem(order_item_id))?;
                tracing::info!(%order_item_id, barcode = %event.barcode, "pick scan applied");
                Ok(ScanOutcome::Picked {
                    order_item_id,
                    picked_quantity: item.picked_quantity,
                    quantity: item.quantity,
                })
            }
            ScanTask::Receive { purchase_order_id } => {
                let location_id = event.location_hint.ok_or_else(|| {
                    StockroomError::validation("receive scan needs a putaway location")
                })?;
                self.record_receipt(purchase_order_id, product.id, location_id, 1)?;
                tracing::info!(%purchase_order_id, barcode = %event.barcode, "receive scan applied");
                Ok(ScanOutcome::Received {
                    purchase_order_id,
                    location_id,
                })
            }
        }
    }
}
