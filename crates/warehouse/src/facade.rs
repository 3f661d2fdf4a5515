use std::sync::Arc;

use serde::{Deserialize, Serialize};

use stockroom_allocation::{AllocationEngine, AllocationOutcome, AllocationPolicy, Reservation};
use stockroom_catalog::{Catalog, Product, ProductSpec};
use stockroom_core::{
    LocationId, OrderId, OrderItemId, ProductId, PurchaseOrderId, StockResult,
};
use stockroom_inbound::{PurchaseOrder, PurchaseOrderSpec, ReceiptDiscrepancy, ReceivingProcessor};
use stockroom_ledger::{InventoryLedger, InventoryRecord, StockMovement, StockTotals};
use stockroom_locations::{Location, LocationRegistry, LocationSpec};
use stockroom_outbound::{FulfillmentService, Order, OrderSpec, OrderStatus};

/// One-glance operational picture of the warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationsSnapshot {
    /// Orders in Pending or Picking.
    pub orders_to_pick: usize,
    /// Orders in Packing, ready for the dock.
    pub orders_to_ship: usize,
    /// Expected units not yet received across open purchase orders.
    pub open_inbound_units: u64,
    pub stock: StockTotals,
    pub capacity_used: u64,
    pub capacity_total: u64,
}

/// A product whose sellable stock has fallen to or below the threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockEntry {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub available: u64,
    pub threshold: u64,
}

/// The single entry point operators and the HTTP layer talk to.
///
/// Owns the wiring of catalog, registry, ledger, allocation, receiving and
/// fulfillment; every command delegates to the owning component and every
/// query hands back an owned snapshot.
#[derive(Debug)]
pub struct Warehouse {
    catalog: Arc<Catalog>,
    registry: Arc<LocationRegistry>,
    ledger: Arc<InventoryLedger>,
    engine: Arc<AllocationEngine>,
    receiving: ReceivingProcessor,
    fulfillment: FulfillmentService,
}

impl Warehouse {
    pub fn new() -> Self {
        let catalog = Arc::new(Catalog::new());
        let registry = Arc::new(LocationRegistry::new());
        let ledger = Arc::new(InventoryLedger::new(Arc::clone(&registry)));
        let engine = Arc::new(AllocationEngine::new(Arc::clone(&ledger)));
        let receiving = ReceivingProcessor::new(Arc::clone(&ledger));
        let fulfillment = FulfillmentService::new(Arc::clone(&ledger), Arc::clone(&engine));
        Self {
            catalog,
            registry,
            ledger,
            engine,
            receiving,
            fulfillment,
        }
    }

    // --- commands ---

    pub fn register_location(&self, spec: LocationSpec) -> StockResult<Location> {
        self.registry.register(spec)
    }

    pub fn register_product(&self, spec: ProductSpec) -> StockResult<Product> {
        self.catalog.register_product(spec)
    }

    /// Every line must name a product known to the catalog.
    pub fn create_purchase_order(&self, spec: PurchaseOrderSpec) -> StockResult<PurchaseOrder> {
        for item in &spec.items {
            self.catalog.get(item.product_id)?;
        }
        self.receiving.create_purchase_order(spec)
    }

    pub fn record_receipt(
        &self,
        po_id: PurchaseOrderId,
        product_id: ProductId,
        location_id: LocationId,
        qty: u64,
    ) -> StockResult<PurchaseOrder> {
        self.registry.snapshot(location_id)?;
        self.receiving.record_receipt(po_id, product_id, location_id, qty)
    }

    /// Every line must name a product known to the catalog.
    pub fn create_order(&self, spec: OrderSpec) -> StockResult<Order> {
        for item in &spec.items {
            self.catalog.get(item.product_id)?;
        }
        self.fulfillment.create_order(spec)
    }

    pub fn allocate_order(
        &self,
        order_id: OrderId,
        policy: AllocationPolicy,
    ) -> StockResult<Vec<AllocationOutcome>> {
        self.fulfillment.allocate_order(order_id, policy)
    }

    pub fn begin_picking(&self, order_id: OrderId) -> StockResult<Order> {
        self.fulfillment.begin_picking(order_id)
    }

    pub fn confirm_pick(&self, order_item_id: OrderItemId, qty: u64) -> StockResult<Order> {
        self.fulfillment.confirm_pick(order_item_id, qty)
    }

    pub fn begin_packing(&self, order_id: OrderId) -> StockResult<Order> {
        self.fulfillment.begin_packing(order_id)
    }

    pub fn ship_order(&self, order_id: OrderId) -> StockResult<Order> {
        self.fulfillment.ship(order_id)
    }

    pub fn cancel_order(&self, order_id: OrderId) -> StockResult<Order> {
        self.fulfillment.cancel_order(order_id)
    }

    /// Manual stock correction with an operator-supplied reason.
    pub fn adjust_stock(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        delta: i64,
        reason: impl Into<String>,
    ) -> StockResult<InventoryRecord> {
        self.catalog.get(product_id)?;
        self.registry.snapshot(location_id)?;
        self.ledger.adjust(product_id, location_id, delta, reason)
    }

    /// Cycle count: reconcile the record to the physically counted quantity.
    pub fn count_stock(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        counted: u64,
        reason: impl Into<String>,
    ) -> StockResult<InventoryRecord> {
        self.catalog.get(product_id)?;
        self.registry.snapshot(location_id)?;
        self.ledger.count(product_id, location_id, counted, reason)
    }

    // --- snapshot queries ---

    pub fn product(&self, product_id: ProductId) -> StockResult<Product> {
        self.catalog.get(product_id)
    }

    pub fn product_by_barcode(&self, barcode: &str) -> StockResult<Product> {
        self.catalog.by_barcode(barcode)
    }

    pub fn products(&self) -> Vec<Product> {
        self.catalog.list()
    }

    pub fn location(&self, location_id: LocationId) -> StockResult<Location> {
        self.registry.snapshot(location_id)
    }

    pub fn locations(&self) -> Vec<Location> {
        self.registry.list()
    }

    pub fn inventory_for_product(&self, product_id: ProductId) -> StockResult<Vec<InventoryRecord>> {
        self.catalog.get(product_id)?;
        Ok(self.ledger.records_for_product(product_id))
    }

    pub fn inventory(&self) -> Vec<InventoryRecord> {
        self.ledger.records()
    }

    pub fn movements(&self) -> Vec<StockMovement> {
        self.ledger.movements()
    }

    pub fn movements_for_product(&self, product_id: ProductId) -> StockResult<Vec<StockMovement>> {
        self.catalog.get(product_id)?;
        Ok(self.ledger.movements_for_product(product_id))
    }

    pub fn order(&self, order_id: OrderId) -> StockResult<Order> {
        self.fulfillment.order(order_id)
    }

    pub fn orders(&self) -> Vec<Order> {
        self.fulfillment.orders()
    }

    pub fn reservations_for_order(&self, order_id: OrderId) -> StockResult<Vec<Reservation>> {
        self.fulfillment.order(order_id)?;
        Ok(self.engine.reservations_for_order(order_id))
    }

    pub fn purchase_order(&self, po_id: PurchaseOrderId) -> StockResult<PurchaseOrder> {
        self.receiving.purchase_order(po_id)
    }

    pub fn purchase_orders(&self) -> Vec<PurchaseOrder> {
        self.receiving.purchase_orders()
    }

    pub fn receipt_discrepancies(
        &self,
        po_id: PurchaseOrderId,
    ) -> StockResult<Vec<ReceiptDiscrepancy>> {
        self.receiving.discrepancies(po_id)
    }

    /// Orders awaiting picks, High priority first, then oldest first.
    pub fn pick_queue(&self) -> Vec<Order> {
        self.fulfillment.pick_queue()
    }

    /// One-glance counts and totals for the operations dashboard.
    pub fn operations_snapshot(&self) -> OperationsSnapshot {
        let orders = self.fulfillment.orders();
        let orders_to_pick = orders
            .iter()
            .filter(|o| matches!(o.status, OrderStatus::Pending | OrderStatus::Picking))
            .count();
        let orders_to_ship = orders
            .iter()
            .filter(|o| o.status == OrderStatus::Packing)
            .count();
        let locations = self.registry.list();
        OperationsSnapshot {
            orders_to_pick,
            orders_to_ship,
            open_inbound_units: self.receiving.open_units(),
            stock: self.ledger.totals(),
            capacity_used: locations.iter().map(|l| l.occupied).sum(),
            capacity_total: locations.iter().map(|l| l.capacity).sum(),
        }
    }

    /// Products whose aggregate available stock is at or below `threshold`.
    /// Catalog products with no stock at all are included.
    pub fn low_stock(&self, threshold: u64) -> Vec<LowStockEntry> {
        self.products()
            .into_iter()
            .filter_map(|product| {
                let available: u64 = self
                    .ledger
                    .records_for_product(product.id)
                    .iter()
                    .map(InventoryRecord::available)
                    .sum();
                (available <= threshold).then(|| LowStockEntry {
                    product_id: product.id,
                    sku: product.sku,
                    name: product.name,
                    available,
                    threshold,
                })
            })
            .collect()
    }

    pub(crate) fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub(crate) fn fulfillment(&self) -> &FulfillmentService {
        &self.fulfillment
    }
}

impl Default for Warehouse {
    fn default() -> Self {
        Self::new()
    }
}
