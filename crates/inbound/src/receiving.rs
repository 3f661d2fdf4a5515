use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use stockroom_core::{LocationId, ProductId, PurchaseOrderId, StockResult, StockroomError};
use stockroom_ledger::InventoryLedger;

use crate::purchase_order::{
    PurchaseOrder, PurchaseOrderSpec, PoItem, ReceiptDiscrepancy,
    PurchaseOrderStatus,
};

/// Reconciles purchase-order expected quantities against received quantities
/// and posts the increases to the Inventory Ledger.
///
/// Receipt state lives in the authoritative order table, not in
/// processor-local state: partial receipt across calls is cumulative and
/// resumable.
#[derive(Debug)]
pub struct ReceivingProcessor {
    ledger: Arc<InventoryLedger>,
    table: Mutex<Table>,
}

#[derive(Debug, Default)]
struct Table {
    orders: HashMap<PurchaseOrderId, PurchaseOrder>,
    references: HashMap<String, PurchaseOrderId>,
}

impl ReceivingProcessor {
    pub fn new(ledger: Arc<InventoryLedger>) -> Self {
        Self {
            ledger,
            table: Mutex::new(Table::default()),
        }
    }

    pub fn create_purchase_order(&self, spec: PurchaseOrderSpec) -> StockResult<PurchaseOrder> {
        if spec.reference.trim().is_empty() {
            return Err(StockroomError::validation("reference must not be empty"));
        }
        if spec.items.is_empty() {
            return Err(StockroomError::validation(
                "purchase order needs at least one line",
            ));
        }
        for item in &spec.items {
            if item.expected_quantity == 0 {
                return Err(StockroomError::InvalidQuantity { value: 0 });
            }
        }
        let mut seen = std::collections::HashSet::new();
        for item in &spec.items {
            if !seen.insert(item.product_id) {
                return Err(StockroomError::validation(format!(
                    "duplicate line for product {}",
                    item.product_id
                )));
            }
        }

        let mut table = self.lock_table()?;
        if table.references.contains_key(&spec.reference) {
            return Err(StockroomError::DuplicateReference(spec.reference));
        }
        let order = PurchaseOrder {
            id: PurchaseOrderId::new(),
            reference: spec.reference.clone(),
            supplier: spec.supplier,
            status: PurchaseOrderStatus::Pending,
            expected_date: spec.expected_date,
            allow_over_receipt: spec.allow_over_receipt,
            items: spec
                .items
                .into_iter()
                .map(|item| PoItem {
                    product_id: item.product_id,
                    expected_quantity: item.expected_quantity,
                    received_quantity: 0,
                })
                .collect(),
            created_at: Utc::now(),
        };
        table.references.insert(spec.reference, order.id);
        table.orders.insert(order.id, order.clone());
        tracing::info!(po_id = %order.id, reference = %order.reference, "purchase order created");
        Ok(order)
    }

    /// Record one receipt event against a line of the purchase order and put
    /// the goods away into `location_id`.
    ///
    /// A ledger/registry failure (full bin, foreign binding) leaves the
    /// purchase order untouched.
    pub fn record_receipt(
        &self,
        po_id: PurchaseOrderId,
        product_id: ProductId,
        location_id: LocationId,
        qty: u64,
    ) -> StockResult<PurchaseOrder> {
        if qty == 0 {
            return Err(StockroomError::InvalidQuantity { value: 0 });
        }
        let mut table = self.lock_table()?;
        let order = table
            .orders
            .get_mut(&po_id)
            .ok_or(StockroomError::UnknownPurchaseOrder(po_id))?;
        if order.is_closed() {
            return Err(StockroomError::PurchaseOrderClosed(po_id));
        }
        let allow_over_receipt = order.allow_over_receipt;
        let item = order.item_mut(product_id).ok_or(StockroomError::UnknownPoItem {
            purchase_order_id: po_id,
            product_id,
        })?;
        let received_after = item.received_quantity + qty;
        if received_after > item.expected_quantity && !allow_over_receipt {
            return Err(StockroomError::OverReceipt {
                product_id,
                expected: item.expected_quantity,
                received: item.received_quantity,
                requested: qty,
            });
        }

        // Post the stock increase first; only then mutate the order.
        self.ledger.receive(product_id, location_id, qty)?;

        let item = order.item_mut(product_id).ok_or(StockroomError::UnknownPoItem {
            purchase_order_id: po_id,
            product_id,
        })?;
        item.received_quantity = received_after;
        let over_received = received_after > item.expected_quantity;
        order.refresh_status();
        if over_received {
            tracing::warn!(
                %po_id, %product_id, received = received_after,
                "over-receipt accepted by policy"
            );
        }
        tracing::info!(%po_id, %product_id, qty, status = ?order.status, "receipt recorded");
        Ok(order.clone())
    }

    /// Owned snapshot of one purchase order.
    pub fn purchase_order(&self, po_id: PurchaseOrderId) -> StockResult<PurchaseOrder> {
        let table = self.lock_table()?;
        table
            .orders
            .get(&po_id)
            .cloned()
            .ok_or(StockroomError::UnknownPurchaseOrder(po_id))
    }

    /// Snapshots of every purchase order, ordered by id.
    pub fn purchase_orders(&self) -> Vec<PurchaseOrder> {
        let mut out: Vec<PurchaseOrder> = match self.table.lock() {
            Ok(table) => table.orders.values().cloned().collect(),
            Err(_) => return Vec::new(),
        };
        out.sort_by_key(|po| po.id);
        out
    }

    /// Per-line expected/received deltas for reconciliation reporting.
    pub fn discrepancies(&self, po_id: PurchaseOrderId) -> StockResult<Vec<ReceiptDiscrepancy>> {
        let order = self.purchase_order(po_id)?;
        Ok(order
            .items
            .iter()
            .map(|item| ReceiptDiscrepancy {
                product_id: item.product_id,
                expected_quantity: item.expected_quantity,
                received_quantity: item.received_quantity,
                delta: item.received_quantity as i64 - item.expected_quantity as i64,
            })
            .collect())
    }

    /// Expected units not yet received across all open purchase orders.
    pub fn open_units(&self) -> u64 {
        match self.table.lock() {
            Ok(table) => table
                .orders
                .values()
                .filter(|po| !po.is_closed())
                .map(PurchaseOrder::outstanding_units)
                .sum(),
            Err(_) => 0,
        }
    }

    fn lock_table(&self) -> StockResult<MutexGuard<'_, Table>> {
        self.table
            .lock()
            .map_err(|_| StockroomError::corruption("purchase order table lock poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::purchase_order::PoItemSpec;
    use stockroom_locations::{Address, LocationRegistry, LocationSpec};

    struct Fixture {
        ledger: Arc<InventoryLedger>,
        registry: Arc<LocationRegistry>,
        processor: ReceivingProcessor,
        location: LocationId,
    }

    fn fixture(capacity: u64) -> Fixture {
        let registry = Arc::new(LocationRegistry::new());
        let location = registry
            .register(LocationSpec {
                address: Address {
                    zone: "R".to_string(),
                    aisle: 1,
                    rack: 1,
                    bin: 1,
                },
                capacity,
            })
            .unwrap()
            .id;
        let ledger = Arc::new(InventoryLedger::new(Arc::clone(&registry)));
        let processor = ReceivingProcessor::new(Arc::clone(&ledger));
        Fixture {
            ledger,
            registry,
            processor,
            location,
        }
    }

    fn test_spec(product: ProductId, expected: u64, allow_over: bool) -> PurchaseOrderSpec {
        PurchaseOrderSpec {
            reference: "PO-2024-001".to_string(),
            supplier: "Acme Supply Co".to_string(),
            expected_date: None,
            allow_over_receipt: allow_over,
            items: vec![PoItemSpec {
                product_id: product,
                expected_quantity: expected,
            }],
        }
    }

    #[test]
    fn two_partial_receipts_complete_the_order() {
        let fx = fixture(200);
        let product = ProductId::new();
        let po = fx
            .processor
            .create_purchase_order(test_spec(product, 100, false))
            .unwrap();
        assert_eq!(po.status, PurchaseOrderStatus::Pending);

        let po = fx
            .processor
            .record_receipt(po.id, product, fx.location, 60)
            .unwrap();
        assert_eq!(po.status, PurchaseOrderStatus::Receiving);

        let po = fx
            .processor
            .record_receipt(po.id, product, fx.location, 40)
            .unwrap();
        assert_eq!(po.status, PurchaseOrderStatus::Completed);
        assert_eq!(po.items[0].received_quantity, 100);

        assert_eq!(fx.ledger.snapshot(product, fx.location).unwrap().on_hand, 100);
        assert_eq!(fx.registry.snapshot(fx.location).unwrap().occupied, 100);
    }

    #[test]
    fn receipt_against_completed_po_is_rejected_without_effect() {
        let fx = fixture(200);
        let product = ProductId::new();
        let po = fx
            .processor
            .create_purchase_order(test_spec(product, 10, false))
            .unwrap();
        fx.processor
            .record_receipt(po.id, product, fx.location, 10)
            .unwrap();

        let err = fx
            .processor
            .record_receipt(po.id, product, fx.location, 1)
            .unwrap_err();
        assert!(matches!(err, StockroomError::PurchaseOrderClosed(_)));

        let po = fx.processor.purchase_order(po.id).unwrap();
        assert_eq!(po.items[0].received_quantity, 10);
        assert_eq!(fx.ledger.snapshot(product, fx.location).unwrap().on_hand, 10);
    }

    #[test]
    fn over_receipt_is_blocked_by_default() {
        let fx = fixture(200);
        let product = ProductId::new();
        let po = fx
            .processor
            .create_purchase_order(test_spec(product, 10, false))
            .unwrap();

        let err = fx
            .processor
            .record_receipt(po.id, product, fx.location, 11)
            .unwrap_err();
        assert!(matches!(err, StockroomError::OverReceipt { .. }));
        assert!(fx.ledger.snapshot(product, fx.location).is_none());
    }

    #[test]
    fn over_receipt_is_accepted_under_policy_and_reported() {
        let fx = fixture(200);
        let product = ProductId::new();
        let po = fx
            .processor
            .create_purchase_order(test_spec(product, 10, true))
            .unwrap();

        let po = fx
            .processor
            .record_receipt(po.id, product, fx.location, 14)
            .unwrap();
        assert_eq!(po.status, PurchaseOrderStatus::Completed);
        assert_eq!(po.items[0].received_quantity, 14);

        let discrepancies = fx.processor.discrepancies(po.id).unwrap();
        assert_eq!(discrepancies[0].delta, 4);
    }

    #[test]
    fn unknown_line_is_rejected() {
        let fx = fixture(200);
        let po = fx
            .processor
            .create_purchase_order(test_spec(ProductId::new(), 10, false))
            .unwrap();

        let err = fx
            .processor
            .record_receipt(po.id, ProductId::new(), fx.location, 1)
            .unwrap_err();
        assert!(matches!(err, StockroomError::UnknownPoItem { .. }));
    }

    #[test]
    fn ledger_failure_leaves_the_po_untouched() {
        let fx = fixture(50);
        let product = ProductId::new();
        let po = fx
            .processor
            .create_purchase_order(test_spec(product, 100, false))
            .unwrap();

        let err = fx
            .processor
            .record_receipt(po.id, product, fx.location, 60)
            .unwrap_err();
        assert!(matches!(err, StockroomError::CapacityExceeded { .. }));

        let po = fx.processor.purchase_order(po.id).unwrap();
        assert_eq!(po.status, PurchaseOrderStatus::Pending);
        assert_eq!(po.items[0].received_quantity, 0);
    }

    #[test]
    fn duplicate_reference_is_rejected() {
        let fx = fixture(200);
        fx.processor
            .create_purchase_order(test_spec(ProductId::new(), 10, false))
            .unwrap();
        let err = fx
            .processor
            .create_purchase_order(test_spec(ProductId::new(), 5, false))
            .unwrap_err();
        assert!(matches!(err, StockroomError::DuplicateReference(_)));
    }

    #[test]
    fn open_units_track_outstanding_receipts() {
        let fx = fixture(200);
        let product = ProductId::new();
        let po = fx
            .processor
            .create_purchase_order(test_spec(product, 100, false))
            .unwrap();
        assert_eq!(fx.processor.open_units(), 100);

        fx.processor
            .record_receipt(po.id, product, fx.location, 60)
            .unwrap();
        assert_eq!(fx.processor.open_units(), 40);
    }
}
