use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use stockroom_allocation::{AllocationEngine, AllocationOutcome, AllocationPolicy};
use stockroom_core::{OrderId, OrderItemId, StockResult, StockroomError};
use stockroom_ledger::InventoryLedger;

use crate::order::{Order, OrderItem, OrderSpec, OrderStatus};

/// Drives an order through pending → picking → packing → shipped, consuming
/// reservations along the way.
///
/// The order table is the single writer of order status; a cancel racing an
/// allocation or a pick confirmation serializes here, so either the other
/// operation lands first or it fails `OrderCancelled`.
#[derive(Debug)]
pub struct FulfillmentService {
    ledger: Arc<InventoryLedger>,
    engine: Arc<AllocationEngine>,
    table: Mutex<Table>,
}

#[derive(Debug, Default)]
struct Table {
    orders: HashMap<OrderId, Order>,
    references: HashMap<String, OrderId>,
    item_index: HashMap<OrderItemId, OrderId>,
}

impl FulfillmentService {
    pub fn new(ledger: Arc<InventoryLedger>, engine: Arc<AllocationEngine>) -> Self {
        Self {
            ledger,
            engine,
            table: Mutex::new(Table::default()),
        }
    }

    pub fn create_order(&self, spec: OrderSpec) -> StockResult<Order> {
        if spec.reference.trim().is_empty() {
            return Err(StockroomError::validation("reference must not be empty"));
        }
        if spec.items.is_empty() {
            return Err(StockroomError::validation("order needs at least one line"));
        }
        for item in &spec.items {
            if item.quantity == 0 {
                return Err(StockroomError::InvalidQuantity { value: 0 });
            }
        }

        let mut table = self.lock_table()?;
        if table.references.contains_key(&spec.reference) {
            return Err(StockroomError::DuplicateReference(spec.reference));
        }
        let order = Order {
            id: OrderId::new(),
            reference: spec.reference.clone(),
            customer: spec.customer,
            status: OrderStatus::Pending,
            priority: spec.priority,
            items: spec
                .items
                .into_iter()
                .map(|item| OrderItem {
                    id: OrderItemId::new(),
                    product_id: item.product_id,
                    quantity: item.quantity,
                    picked_quantity: 0,
                })
                .collect(),
            created_at: Utc::now(),
        };
        for item in &order.items {
            table.item_index.insert(item.id, order.id);
        }
        table.references.insert(spec.reference, order.id);
        table.orders.insert(order.id, order.clone());
        tracing::info!(order_id = %order.id, reference = %order.reference, "order created");
        Ok(order)
    }

    /// Reserve stock for every line of the order.
    ///
    /// Under the default all-or-nothing policy a mid-order failure rolls back
    /// the lines already reserved, leaving the order unallocated.
    pub fn allocate_order(
        &self,
        order_id: OrderId,
        policy: AllocationPolicy,
    ) -> StockResult<Vec<AllocationOutcome>> {
        // The table stays locked across the whole loop: a cancel arriving
        // mid-allocation must wait until every reservation exists, so its
        // sweep sees all of them.
        let table = self.lock_table()?;
        let order = table
            .orders
            .get(&order_id)
            .ok_or(StockroomError::UnknownOrder(order_id))?;
        match order.status {
            OrderStatus::Pending => {}
            OrderStatus::Cancelled => return Err(StockroomError::OrderCancelled(order_id)),
            OrderStatus::Shipped => return Err(StockroomError::OrderShipped(order_id)),
            OrderStatus::Picking | OrderStatus::Packing => {
                return Err(StockroomError::PickingStarted(order_id));
            }
        }

        let mut outcomes = Vec::with_capacity(order.items.len());
        for item in &order.items {
            match self
                .engine
                .allocate(order_id, item.id, item.product_id, item.quantity, policy)
            {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    if matches!(policy, AllocationPolicy::AllOrNothing) {
                        // Unwind the lines reserved before the failure.
                        self.engine.cancel(order_id)?;
                    }
                    return Err(e);
                }
            }
        }
        Ok(outcomes)
    }

    /// Pending → Picking. Requires every line fully reserved.
    pub fn begin_picking(&self, order_id: OrderId) -> StockResult<Order> {
        let mut table = self.lock_table()?;
        let order = table
            .orders
            .get_mut(&order_id)
            .ok_or(StockroomError::UnknownOrder(order_id))?;
        match order.status {
            OrderStatus::Pending => {}
            OrderStatus::Cancelled => return Err(StockroomError::OrderCancelled(order_id)),
            OrderStatus::Shipped => return Err(StockroomError::OrderShipped(order_id)),
            OrderStatus::Picking | OrderStatus::Packing => {
                return Err(StockroomError::PickingStarted(order_id));
            }
        }
        for item in &order.items {
            if self.engine.reserved_for_item(item.id) < item.quantity {
                return Err(StockroomError::AllocationIncomplete(order_id));
            }
        }
        order.status = OrderStatus::Picking;
        tracing::info!(%order_id, "picking started");
        Ok(order.clone())
    }

    /// Confirm a pick of `qty` units against one order line, consuming the
    /// matching reservations.
    pub fn confirm_pick(&self, order_item_id: OrderItemId, qty: u64) -> StockResult<Order> {
        if qty == 0 {
            return Err(StockroomError::InvalidQuantity { value: 0 });
        }
        let mut table = self.lock_table()?;
        let order_id = *table
            .item_index
            .get(&order_item_id)
            .ok_or(StockroomError::UnknownOrderItem(order_item_id))?;
        let order = table
            .orders
            .get_mut(&order_id)
            .ok_or(StockroomError::UnknownOrder(order_id))?;
        match order.status {
            OrderStatus::Picking => {}
            OrderStatus::Cancelled => return Err(StockroomError::OrderCancelled(order_id)),
            OrderStatus::Shipped => return Err(StockroomError::OrderShipped(order_id)),
            OrderStatus::Packing => return Err(StockroomError::PackingStarted(order_id)),
            OrderStatus::Pending => return Err(StockroomError::PickingNotStarted(order_id)),
        }
        let item = order
            .item_mut(order_item_id)
            .ok_or(StockroomError::UnknownOrderItem(order_item_id))?;
        if qty > item.remaining_to_pick() {
            return Err(StockroomError::OverPick {
                order_item_id,
                requested: qty,
                remaining: item.remaining_to_pick(),
            });
        }

        self.engine.consume(order_item_id, qty)?;
        let item = order
            .item_mut(order_item_id)
            .ok_or(StockroomError::UnknownOrderItem(order_item_id))?;
        item.picked_quantity += qty;
        tracing::info!(%order_id, %order_item_id, qty, "pick confirmed");
        Ok(order.clone())
    }

    /// Picking → Packing. Requires every line picked in full.
    pub fn begin_packing(&self, order_id: OrderId) -> StockResult<Order> {
        let mut table = self.lock_table()?;
        let order = table
            .orders
            .get_mut(&order_id)
            .ok_or(StockroomError::UnknownOrder(order_id))?;
        match order.status {
            OrderStatus::Picking => {}
            OrderStatus::Cancelled => return Err(StockroomError::OrderCancelled(order_id)),
            OrderStatus::Shipped => return Err(StockroomError::OrderShipped(order_id)),
            OrderStatus::Packing => return Err(StockroomError::PackingStarted(order_id)),
            OrderStatus::Pending => return Err(StockroomError::PickingNotStarted(order_id)),
        }
        if !order.is_fully_picked() {
            return Err(StockroomError::PickingIncomplete(order_id));
        }
        order.status = OrderStatus::Packing;
        tracing::info!(%order_id, "packing started");
        Ok(order.clone())
    }

    /// Packing → Shipped. Posts one ledger ship per consumed reservation leg,
    /// atomically as a set; any failure leaves the order Packing with no
    /// ledger effect.
    pub fn ship(&self, order_id: OrderId) -> StockResult<Order> {
        let mut table = self.lock_table()?;
        let order = table
            .orders
            .get_mut(&order_id)
            .ok_or(StockroomError::UnknownOrder(order_id))?;
        match order.status {
            OrderStatus::Packing => {}
            OrderStatus::Cancelled => return Err(StockroomError::OrderCancelled(order_id)),
            OrderStatus::Shipped => return Err(StockroomError::OrderShipped(order_id)),
            OrderStatus::Pending | OrderStatus::Picking => {
                return Err(StockroomError::PackingNotStarted(order_id));
            }
        }

        let legs = self.engine.consumed_legs(order_id);
        self.ledger.ship_many(&legs)?;
        order.status = OrderStatus::Shipped;
        tracing::info!(%order_id, legs = legs.len(), "order shipped");
        Ok(order.clone())
    }

    /// Pending/Picking → Cancelled. Releases the remaining active
    /// reservations; cancelling a cancelled order re-runs the release
    /// sweep and succeeds.
    pub fn cancel_order(&self, order_id: OrderId) -> StockResult<Order> {
        let mut table = self.lock_table()?;
        let order = table
            .orders
            .get_mut(&order_id)
            .ok_or(StockroomError::UnknownOrder(order_id))?;
        match order.status {
            OrderStatus::Pending | OrderStatus::Picking => {}
            OrderStatus::Cancelled => {
                // Release is idempotent, so a repeat cancel costs nothing
                // and picks up any reservation a racing caller left behind.
                self.engine.cancel(order_id)?;
                return Ok(order.clone());
            }
            OrderStatus::Shipped => return Err(StockroomError::OrderShipped(order_id)),
            OrderStatus::Packing => return Err(StockroomError::PackingStarted(order_id)),
        }

        self.engine.cancel(order_id)?;
        order.status = OrderStatus::Cancelled;
        tracing::info!(%order_id, "order cancelled");
        Ok(order.clone())
    }

    /// Owned snapshot of one order.
    pub fn order(&self, order_id: OrderId) -> StockResult<Order> {
        let table = self.lock_table()?;
        table
            .orders
            .get(&order_id)
            .cloned()
            .ok_or(StockroomError::UnknownOrder(order_id))
    }

    /// Resolve an order item to its order and line snapshot.
    pub fn item(&self, order_item_id: OrderItemId) -> StockResult<(OrderId, OrderItem)> {
        let table = self.lock_table()?;
        let order_id = *table
            .item_index
            .get(&order_item_id)
            .ok_or(StockroomError::UnknownOrderItem(order_item_id))?;
        let order = table
            .orders
            .get(&order_id)
            .ok_or(StockroomError::UnknownOrder(order_id))?;
        let item = order
            .item(order_item_id)
            .ok_or(StockroomError::UnknownOrderItem(order_item_id))?;
        Ok((order_id, item.clone()))
    }

    /// Snapshots of every order, ordered by id.
    pub fn orders(&self) -> Vec<Order> {
        let mut out: Vec<Order> = match self.table.lock() {
            Ok(table) => table.orders.values().cloned().collect(),
            Err(_) => return Vec::new(),
        };
        out.sort_by_key(|order| order.id);
        out
    }

    /// Orders awaiting picks: Pending/Picking, High priority first, then
    /// oldest first.
    pub fn pick_queue(&self) -> Vec<Order> {
        let mut queue: Vec<Order> = self
            .orders()
            .into_iter()
            .filter(|order| {
                matches!(order.status, OrderStatus::Pending | OrderStatus::Picking)
            })
            .collect();
        queue.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.created_at.cmp(&b.created_at))
        });
        queue
    }

    fn lock_table(&self) -> StockResult<MutexGuard<'_, Table>> {
        self.table
            .lock()
            .map_err(|_| StockroomError::corruption("order table lock poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{OrderItemSpec, OrderPriority};
    use stockroom_core::{LocationId, ProductId};
    use stockroom_locations::{Address, LocationRegistry, LocationSpec};

    struct Fixture {
        ledger: Arc<InventoryLedger>,
        engine: Arc<AllocationEngine>,
        service: FulfillmentService,
        registry: Arc<LocationRegistry>,
        bin: u32,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(LocationRegistry::new());
        let ledger = Arc::new(InventoryLedger::new(Arc::clone(&registry)));
        let engine = Arc::new(AllocationEngine::new(Arc::clone(&ledger)));
        let service = FulfillmentService::new(Arc::clone(&ledger), Arc::clone(&engine));
        Fixture {
            ledger,
            engine,
            service,
            registry,
            bin: 0,
        }
    }

    impl Fixture {
        /// Stock `qty` units of a fresh product in a fresh location.
        fn stock(&mut self, qty: u64) -> (ProductId, LocationId) {
            self.bin += 1;
            let product = ProductId::new();
            let location = self
                .registry
                .register(LocationSpec {
                    address: Address {
                        zone: "B".to_string(),
                        aisle: 1,
                        rack: 1,
                        bin: self.bin,
                    },
                    capacity: 1_000,
                })
                .unwrap()
                .id;
            if qty > 0 {
                self.ledger.receive(product, location, qty).unwrap();
            }
            (product, location)
        }

        fn order_for(&self, reference: &str, lines: &[(ProductId, u64)]) -> Order {
            self.service
                .create_order(OrderSpec {
                    reference: reference.to_string(),
                    customer: "Acme Retail".to_string(),
                    priority: OrderPriority::Medium,
                    items: lines
                        .iter()
                        .map(|(product_id, quantity)| OrderItemSpec {
                            product_id: *product_id,
                            quantity: *quantity,
                        })
                        .collect(),
                })
                .unwrap()
        }

        fn reserved_total(&self, product: ProductId) -> u64 {
            self.ledger
                .records_for_product(product)
                .iter()
                .map(|r| r.reserved)
                .sum()
        }
    }

    #[test]
    fn full_lifecycle_ships_and_settles_the_ledger() {
        let mut fx = fixture();
        let (product, location) = fx.stock(100);
        let order = fx.order_for("ORD-1001", &[(product, 40)]);

        fx.service
            .allocate_order(order.id, AllocationPolicy::AllOrNothing)
            .unwrap();
        fx.service.begin_picking(order.id).unwrap();
        fx.service.confirm_pick(order.items[0].id, 25).unwrap();
        fx.service.confirm_pick(order.items[0].id, 15).unwrap();
        fx.service.begin_packing(order.id).unwrap();
        let shipped = fx.service.ship(order.id).unwrap();

        assert_eq!(shipped.status, OrderStatus::Shipped);
        let rec = &fx.ledger.records_for_product(product)[0];
        assert_eq!(rec.on_hand, 60);
        assert_eq!(rec.reserved, 0);
        assert_eq!(rec.location_id, location);
    }

    #[test]
    fn all_or_nothing_failure_leaves_the_order_unallocated() {
        let mut fx = fixture();
        let (stocked, _) = fx.stock(50);
        let (scarce, scarce_loc) = fx.stock(0);
        let order = fx.order_for("ORD-1002", &[(stocked, 30), (scarce, 10)]);

        let err = fx
            .service
            .allocate_order(order.id, AllocationPolicy::AllOrNothing)
            .unwrap_err();
        assert!(matches!(err, StockroomError::InsufficientStock { .. }));

        // The first line's reservation was rolled back.
        assert_eq!(fx.reserved_total(stocked), 0);
        assert_eq!(fx.service.order(order.id).unwrap().status, OrderStatus::Pending);

        // After restocking, the same order allocates cleanly.
        fx.ledger.receive(scarce, scarce_loc, 10).unwrap();
        fx.service
            .allocate_order(order.id, AllocationPolicy::AllOrNothing)
            .unwrap();
        assert_eq!(fx.reserved_total(stocked), 30);
        assert_eq!(fx.reserved_total(scarce), 10);
    }

    #[test]
    fn picking_requires_full_allocation() {
        let mut fx = fixture();
        let (product, _) = fx.stock(100);
        let order = fx.order_for("ORD-1003", &[(product, 10)]);

        let err = fx.service.begin_picking(order.id).unwrap_err();
        assert!(matches!(err, StockroomError::AllocationIncomplete(_)));
    }

    #[test]
    fn pick_before_picking_starts_is_rejected() {
        let mut fx = fixture();
        let (product, _) = fx.stock(100);
        let order = fx.order_for("ORD-1004", &[(product, 10)]);
        fx.service
            .allocate_order(order.id, AllocationPolicy::AllOrNothing)
            .unwrap();

        let err = fx.service.confirm_pick(order.items[0].id, 1).unwrap_err();
        assert!(matches!(err, StockroomError::PickingNotStarted(_)));
    }

    #[test]
    fn over_pick_is_rejected_and_changes_nothing() {
        let mut fx = fixture();
        let (product, _) = fx.stock(100);
        let order = fx.order_for("ORD-1005", &[(product, 10)]);
        fx.service
            .allocate_order(order.id, AllocationPolicy::AllOrNothing)
            .unwrap();
        fx.service.begin_picking(order.id).unwrap();
        fx.service.confirm_pick(order.items[0].id, 8).unwrap();

        let err = fx.service.confirm_pick(order.items[0].id, 3).unwrap_err();
        assert!(matches!(err, StockroomError::OverPick { remaining: 2, .. }));

        let (_, item) = fx.service.item(order.items[0].id).unwrap();
        assert_eq!(item.picked_quantity, 8);
    }

    #[test]
    fn shipping_requires_packing() {
        let mut fx = fixture();
        let (product, _) = fx.stock(100);
        let order = fx.order_for("ORD-1006", &[(product, 10)]);
        fx.service
            .allocate_order(order.id, AllocationPolicy::AllOrNothing)
            .unwrap();
        fx.service.begin_picking(order.id).unwrap();

        let err = fx.service.ship(order.id).unwrap_err();
        assert!(matches!(err, StockroomError::PackingNotStarted(_)));
    }

    #[test]
    fn packing_requires_every_line_picked() {
        let mut fx = fixture();
        let (product, _) = fx.stock(100);
        let order = fx.order_for("ORD-1007", &[(product, 10)]);
        fx.service
            .allocate_order(order.id, AllocationPolicy::AllOrNothing)
            .unwrap();
        fx.service.begin_picking(order.id).unwrap();
        fx.service.confirm_pick(order.items[0].id, 4).unwrap();

        let err = fx.service.begin_packing(order.id).unwrap_err();
        assert!(matches!(err, StockroomError::PickingIncomplete(_)));
    }

    #[test]
    fn cancel_releases_reservations_and_is_idempotent() {
        let mut fx = fixture();
        let (product, _) = fx.stock(100);
        let order = fx.order_for("ORD-1008", &[(product, 40)]);
        fx.service
            .allocate_order(order.id, AllocationPolicy::AllOrNothing)
            .unwrap();
        assert_eq!(fx.reserved_total(product), 40);

        let cancelled = fx.service.cancel_order(order.id).unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(fx.reserved_total(product), 0);

        // Second cancel is a quiet no-op.
        let again = fx.service.cancel_order(order.id).unwrap();
        assert_eq!(again.status, OrderStatus::Cancelled);
    }

    #[test]
    fn cancel_after_packing_begins_is_rejected() {
        let mut fx = fixture();
        let (product, _) = fx.stock(100);
        let order = fx.order_for("ORD-1009", &[(product, 5)]);
        fx.service
            .allocate_order(order.id, AllocationPolicy::AllOrNothing)
            .unwrap();
        fx.service.begin_picking(order.id).unwrap();
        fx.service.confirm_pick(order.items[0].id, 5).unwrap();
        fx.service.begin_packing(order.id).unwrap();

        let err = fx.service.cancel_order(order.id).unwrap_err();
        assert!(matches!(err, StockroomError::PackingStarted(_)));
    }

    #[test]
    fn duplicate_reference_is_rejected() {
        let mut fx = fixture();
        let (product, _) = fx.stock(10);
        fx.order_for("ORD-1010", &[(product, 1)]);

        let err = fx
            .service
            .create_order(OrderSpec {
                reference: "ORD-1010".to_string(),
                customer: "Other".to_string(),
                priority: OrderPriority::Low,
                items: vec![OrderItemSpec {
                    product_id: product,
                    quantity: 1,
                }],
            })
            .unwrap_err();
        assert!(matches!(err, StockroomError::DuplicateReference(_)));
    }

    #[test]
    fn pick_queue_orders_by_priority_then_age() {
        let mut fx = fixture();
        let (product, _) = fx.stock(100);

        let make = |fx: &Fixture, reference: &str, priority: OrderPriority| {
            fx.service
                .create_order(OrderSpec {
                    reference: reference.to_string(),
                    customer: "Acme Retail".to_string(),
                    priority,
                    items: vec![OrderItemSpec {
                        product_id: product,
                        quantity: 1,
                    }],
                })
                .unwrap()
        };
        let low = make(&fx, "ORD-Q1", OrderPriority::Low);
        let high = make(&fx, "ORD-Q2", OrderPriority::High);
        let medium = make(&fx, "ORD-Q3", OrderPriority::Medium);
        let shipped = make(&fx, "ORD-Q4", OrderPriority::High);

        fx.service
            .allocate_order(shipped.id, AllocationPolicy::AllOrNothing)
            .unwrap();
        fx.service.begin_picking(shipped.id).unwrap();
        fx.service.confirm_pick(shipped.items[0].id, 1).unwrap();
        fx.service.begin_packing(shipped.id).unwrap();
        fx.service.ship(shipped.id).unwrap();

        let queue = fx.service.pick_queue();
        let ids: Vec<OrderId> = queue.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![high.id, medium.id, low.id]);
    }

    #[test]
    fn cancel_racing_allocation_leaves_no_reservation_behind() {
        for _ in 0..8 {
            let mut fx = fixture();
            let (product, _) = fx.stock(50);
            let order = fx.order_for("ORD-1012", &[(product, 10)]);

            std::thread::scope(|scope| {
                let allocate = scope.spawn(|| {
                    fx.service
                        .allocate_order(order.id, AllocationPolicy::AllOrNothing)
                });
                let cancel = scope.spawn(|| fx.service.cancel_order(order.id));

                cancel.join().unwrap().unwrap();
                // Either the allocation lands first and the cancel sweeps it,
                // or the cancel lands first and the allocation is refused.
                if let Err(e) = allocate.join().unwrap() {
                    assert!(matches!(e, StockroomError::OrderCancelled(_)));
                }
            });

            assert_eq!(
                fx.service.order(order.id).unwrap().status,
                OrderStatus::Cancelled
            );
            assert_eq!(fx.reserved_total(product), 0);
        }
    }

    #[test]
    fn repeat_cancel_sweeps_reservations_left_by_a_stale_caller() {
        let mut fx = fixture();
        let (product, _) = fx.stock(50);
        let order = fx.order_for("ORD-1013", &[(product, 10)]);
        fx.service.cancel_order(order.id).unwrap();

        // A stale caller reserving directly against the cancelled order.
        fx.engine
            .allocate(
                order.id,
                order.items[0].id,
                product,
                10,
                AllocationPolicy::AllOrNothing,
            )
            .unwrap();
        assert_eq!(fx.reserved_total(product), 10);

        fx.service.cancel_order(order.id).unwrap();
        assert_eq!(fx.reserved_total(product), 0);
    }

    #[test]
    fn shipped_order_rejects_every_further_transition() {
        let mut fx = fixture();
        let (product, _) = fx.stock(10);
        let order = fx.order_for("ORD-1011", &[(product, 2)]);
        fx.service
            .allocate_order(order.id, AllocationPolicy::AllOrNothing)
            .unwrap();
        fx.service.begin_picking(order.id).unwrap();
        fx.service.confirm_pick(order.items[0].id, 2).unwrap();
        fx.service.begin_packing(order.id).unwrap();
        fx.service.ship(order.id).unwrap();

        assert!(matches!(
            fx.service.ship(order.id).unwrap_err(),
            StockroomError::OrderShipped(_)
        ));
        assert!(matches!(
            fx.service.cancel_order(order.id).unwrap_err(),
            StockroomError::OrderShipped(_)
        ));
        assert!(matches!(
            fx.service.begin_picking(order.id).unwrap_err(),
            StockroomError::OrderShipped(_)
        ));
    }
}
