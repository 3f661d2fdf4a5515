use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use stockroom_core::{OrderId, OrderItemId, ProductId, ReservationId, StockResult, StockroomError};
use stockroom_ledger::{InventoryLedger, PostingLeg};

use crate::reservation::{Reservation, ReservationState};

/// What to do when total available stock is short of the demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationPolicy {
    /// Fail the whole call with `InsufficientStock`; nothing is reserved.
    #[default]
    AllOrNothing,
    /// Reserve what is available and report the shortfall.
    Partial,
}

/// Result of one allocation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationOutcome {
    pub reservations: Vec<Reservation>,
    /// Demand left unreserved (only nonzero under `Partial`).
    pub shortfall: u64,
}

/// Reserves available stock against outbound demand.
///
/// Source locations are chosen greedily, largest available first, ties broken
/// by ascending location id, to minimize the number of pick stops. The chosen
/// legs are reserved through the ledger's multi-key posting, so a failed set
/// leaves no reservation behind.
#[derive(Debug)]
pub struct AllocationEngine {
    ledger: Arc<InventoryLedger>,
    table: Mutex<Table>,
}

#[derive(Debug, Default)]
struct Table {
    rows: HashMap<ReservationId, Reservation>,
    by_order: HashMap<OrderId, Vec<ReservationId>>,
    by_item: HashMap<OrderItemId, Vec<ReservationId>>,
}

impl AllocationEngine {
    pub fn new(ledger: Arc<InventoryLedger>) -> Self {
        Self {
            ledger,
            table: Mutex::new(Table::default()),
        }
    }

    /// Reserve `qty` units of `product_id` for one order item.
    pub fn allocate(
        &self,
        order_id: OrderId,
        order_item_id: OrderItemId,
        product_id: ProductId,
        qty: u64,
        policy: AllocationPolicy,
    ) -> StockResult<AllocationOutcome> {
        if qty == 0 {
            return Err(StockroomError::InvalidQuantity { value: 0 });
        }
        let mut table = self.lock_table()?;
        let has_active = table
            .by_item
            .get(&order_item_id)
            .is_some_and(|ids| ids.iter().any(|id| table.rows[id].is_active()));
        if has_active {
            return Err(StockroomError::AlreadyAllocated(order_item_id));
        }

        // Greedy source selection over a consistent availability snapshot.
        let mut sources: Vec<(u64, stockroom_core::LocationId)> = self
            .ledger
            .records_for_product(product_id)
            .into_iter()
            .filter(|rec| rec.available() > 0)
            .map(|rec| (rec.available(), rec.location_id))
            .collect();
        sources.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        let mut legs: Vec<PostingLeg> = Vec::new();
        let mut remaining = qty;
        for (available, location_id) in sources {
            if remaining == 0 {
                break;
            }
            let take = available.min(remaining);
            legs.push(PostingLeg {
                product_id,
                location_id,
                qty: take,
            });
            remaining -= take;
        }

        if remaining > 0 {
            match policy {
                AllocationPolicy::AllOrNothing => {
                    return Err(StockroomError::InsufficientStock {
                        product_id,
                        location_id: None,
                        requested: qty,
                        available: qty - remaining,
                    });
                }
                AllocationPolicy::Partial => {}
            }
        }

        // Transactional as a set: a failed leg reserves nothing.
        self.ledger.reserve_many(&legs)?;

        let mut reservations = Vec::with_capacity(legs.len());
        for leg in &legs {
            let row = Reservation::new(order_id, order_item_id, product_id, leg.location_id, leg.qty);
            table.by_order.entry(order_id).or_default().push(row.id);
            table.by_item.entry(order_item_id).or_default().push(row.id);
            table.rows.insert(row.id, row.clone());
            reservations.push(row);
        }
        tracing::info!(
            %order_id,
            %product_id,
            qty,
            legs = reservations.len(),
            shortfall = remaining,
            "allocated stock"
        );
        Ok(AllocationOutcome {
            reservations,
            shortfall: remaining,
        })
    }

    /// Consume active reservation quantity for an order item, in ascending
    /// location order so replays and tests are stable.
    pub fn consume(&self, order_item_id: OrderItemId, qty: u64) -> StockResult<()> {
        if qty == 0 {
            return Err(StockroomError::InvalidQuantity { value: 0 });
        }
        let mut table = self.lock_table()?;
        let mut ids: Vec<ReservationId> = table
            .by_item
            .get(&order_item_id)
            .cloned()
            .unwrap_or_default();
        ids.retain(|id| table.rows[id].is_active());
        ids.sort_by_key(|id| table.rows[id].location_id);

        let active_total: u64 = ids.iter().map(|id| table.rows[id].active_remainder()).sum();
        if active_total < qty {
            return Err(StockroomError::InsufficientReservation {
                requested: qty,
                reserved: active_total,
            });
        }

        let mut remaining = qty;
        for id in ids {
            if remaining == 0 {
                break;
            }
            let row = table
                .rows
                .get_mut(&id)
                .ok_or_else(|| StockroomError::corruption("reservation index out of step"))?;
            let take = row.active_remainder().min(remaining);
            row.consumed += take;
            if row.consumed == row.quantity {
                row.state = ReservationState::Consumed;
            }
            remaining -= take;
        }
        Ok(())
    }

    /// Release the unconsumed remainder of every reservation for the order.
    ///
    /// Idempotent: already-Released rows are no-ops. A partially consumed row
    /// shrinks to its consumed quantity and goes Consumed; the picked goods
    /// stay reserved until shipped or manually adjusted.
    pub fn cancel(&self, order_id: OrderId) -> StockResult<u64> {
        let mut table = self.lock_table()?;
        let ids = table.by_order.get(&order_id).cloned().unwrap_or_default();
        let mut released_total = 0u64;
        for id in ids {
            let (product_id, location_id, remainder, consumed) = {
                let row = table
                    .rows
                    .get(&id)
                    .ok_or_else(|| StockroomError::corruption("reservation index out of step"))?;
                if !row.is_active() {
                    continue;
                }
                (row.product_id, row.location_id, row.active_remainder(), row.consumed)
            };
            if remainder > 0 {
                self.ledger.release(product_id, location_id, remainder)?;
            }
            let row = table
                .rows
                .get_mut(&id)
                .ok_or_else(|| StockroomError::corruption("reservation index out of step"))?;
            if consumed > 0 {
                row.quantity = row.consumed;
                row.state = ReservationState::Consumed;
            } else {
                row.state = ReservationState::Released;
            }
            released_total += remainder;
        }
        if released_total > 0 {
            tracing::info!(%order_id, released = released_total, "released reservations");
        }
        Ok(released_total)
    }

    /// Total quantity still claimed for an item across Active and Consumed
    /// rows (the order's full entitlement until shipped or cancelled).
    pub fn reserved_for_item(&self, order_item_id: OrderItemId) -> u64 {
        self.with_table(|table| {
            table
                .by_item
                .get(&order_item_id)
                .map(|ids| {
                    ids.iter()
                        .map(|id| &table.rows[id])
                        .filter(|row| !matches!(row.state, ReservationState::Released))
                        .map(|row| row.quantity)
                        .sum()
                })
                .unwrap_or(0)
        })
    }

    /// Consumed-but-unshipped quantities per (product, location), the legs a
    /// ship posting needs.
    pub fn consumed_legs(&self, order_id: OrderId) -> Vec<PostingLeg> {
        self.with_table(|table| {
            let mut merged: HashMap<(ProductId, stockroom_core::LocationId), u64> = HashMap::new();
            if let Some(ids) = table.by_order.get(&order_id) {
                for id in ids {
                    let row = &table.rows[id];
                    if row.consumed > 0 {
                        *merged.entry((row.product_id, row.location_id)).or_insert(0) +=
                            row.consumed;
                    }
                }
            }
            let mut legs: Vec<PostingLeg> = merged
                .into_iter()
                .map(|((product_id, location_id), qty)| PostingLeg {
                    product_id,
                    location_id,
                    qty,
                })
                .collect();
            legs.sort_by_key(|leg| (leg.product_id, leg.location_id));
            legs
        })
    }

    /// Owned snapshots of every reservation for the order, creation order.
    pub fn reservations_for_order(&self, order_id: OrderId) -> Vec<Reservation> {
        self.with_table(|table| {
            table
                .by_order
                .get(&order_id)
                .map(|ids| ids.iter().map(|id| table.rows[id].clone()).collect())
                .unwrap_or_default()
        })
    }

    fn lock_table(&self) -> StockResult<MutexGuard<'_, Table>> {
        self.table
            .lock()
            .map_err(|_| StockroomError::corruption("reservation table lock poisoned"))
    }

    fn with_table<T: Default>(&self, f: impl FnOnce(&Table) -> T) -> T {
        self.table.lock().map(|table| f(&table)).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_core::LocationId;
    use stockroom_locations::{Address, LocationRegistry, LocationSpec};

    struct Fixture {
        ledger: Arc<InventoryLedger>,
        engine: AllocationEngine,
        product: ProductId,
        locations: Vec<LocationId>,
    }

    /// Seed one product across `stocks.len()` locations with the given
    /// on-hand quantities.
    fn fixture(stocks: &[u64]) -> Fixture {
        let registry = Arc::new(LocationRegistry::new());
        let ledger = Arc::new(InventoryLedger::new(Arc::clone(&registry)));
        let product = ProductId::new();
        let mut locations = Vec::new();
        for (i, qty) in stocks.iter().enumerate() {
            let loc = registry
                .register(LocationSpec {
                    address: Address {
                        zone: "A".to_string(),
                        aisle: 1,
                        rack: 1,
                        bin: i as u32,
                    },
                    capacity: 1_000,
                })
                .unwrap()
                .id;
            if *qty > 0 {
                ledger.receive(product, loc, *qty).unwrap();
            }
            locations.push(loc);
        }
        let engine = AllocationEngine::new(Arc::clone(&ledger));
        Fixture {
            ledger,
            engine,
            product,
            locations,
        }
    }

    #[test]
    fn greedy_prefers_largest_available_first() {
        let fx = fixture(&[30, 50]);
        let outcome = fx
            .engine
            .allocate(
                OrderId::new(),
                OrderItemId::new(),
                fx.product,
                60,
                AllocationPolicy::AllOrNothing,
            )
            .unwrap();

        assert_eq!(outcome.shortfall, 0);
        assert_eq!(outcome.reservations.len(), 2);
        // The 50-unit location is drained before touching the 30-unit one.
        assert_eq!(outcome.reservations[0].location_id, fx.locations[1]);
        assert_eq!(outcome.reservations[0].quantity, 50);
        assert_eq!(outcome.reservations[1].location_id, fx.locations[0]);
        assert_eq!(outcome.reservations[1].quantity, 10);
    }

    #[test]
    fn equal_availability_breaks_ties_by_ascending_location_id() {
        let fx = fixture(&[20, 20]);
        let outcome = fx
            .engine
            .allocate(
                OrderId::new(),
                OrderItemId::new(),
                fx.product,
                10,
                AllocationPolicy::AllOrNothing,
            )
            .unwrap();

        let expected = fx.locations.iter().min().copied().unwrap();
        assert_eq!(outcome.reservations.len(), 1);
        assert_eq!(outcome.reservations[0].location_id, expected);
    }

    #[test]
    fn all_or_nothing_shortfall_reserves_nothing() {
        let fx = fixture(&[60, 40]);
        let order_id = OrderId::new();
        let err = fx
            .engine
            .allocate(
                order_id,
                OrderItemId::new(),
                fx.product,
                150,
                AllocationPolicy::AllOrNothing,
            )
            .unwrap_err();

        assert!(matches!(err, StockroomError::InsufficientStock { .. }));
        assert!(fx.engine.reservations_for_order(order_id).is_empty());
        for rec in fx.ledger.records_for_product(fx.product) {
            assert_eq!(rec.reserved, 0);
        }
    }

    #[test]
    fn partial_policy_reserves_what_exists_and_reports_shortfall() {
        let fx = fixture(&[60, 40]);
        let outcome = fx
            .engine
            .allocate(
                OrderId::new(),
                OrderItemId::new(),
                fx.product,
                150,
                AllocationPolicy::Partial,
            )
            .unwrap();

        assert_eq!(outcome.shortfall, 50);
        let reserved: u64 = outcome.reservations.iter().map(|r| r.quantity).sum();
        assert_eq!(reserved, 100);
    }

    #[test]
    fn reallocating_an_active_item_is_rejected() {
        let fx = fixture(&[100]);
        let item = OrderItemId::new();
        fx.engine
            .allocate(OrderId::new(), item, fx.product, 10, AllocationPolicy::AllOrNothing)
            .unwrap();

        let err = fx
            .engine
            .allocate(OrderId::new(), item, fx.product, 5, AllocationPolicy::AllOrNothing)
            .unwrap_err();
        assert!(matches!(err, StockroomError::AlreadyAllocated(_)));
    }

    #[test]
    fn consume_walks_locations_in_ascending_order() {
        let fx = fixture(&[20, 20]);
        let order_id = OrderId::new();
        let item = OrderItemId::new();
        fx.engine
            .allocate(order_id, item, fx.product, 40, AllocationPolicy::AllOrNothing)
            .unwrap();

        fx.engine.consume(item, 25).unwrap();

        let mut rows = fx.engine.reservations_for_order(order_id);
        rows.sort_by_key(|r| r.location_id);
        // The lower location id is drained first, the higher one holds the rest.
        assert_eq!(rows[0].consumed, 20);
        assert_eq!(rows[0].state, ReservationState::Consumed);
        assert_eq!(rows[1].consumed, 5);
        assert_eq!(rows[1].state, ReservationState::Active);
    }

    #[test]
    fn cancel_releases_only_the_active_remainder() {
        let fx = fixture(&[10, 10, 10]);
        let order_id = OrderId::new();
        let item = OrderItemId::new();
        fx.engine
            .allocate(order_id, item, fx.product, 30, AllocationPolicy::AllOrNothing)
            .unwrap();

        // Two of three legs picked.
        fx.engine.consume(item, 20).unwrap();

        let released = fx.engine.cancel(order_id).unwrap();
        assert_eq!(released, 10);

        let rows = fx.engine.reservations_for_order(order_id);
        let consumed: u64 = rows.iter().map(|r| r.consumed).sum();
        assert_eq!(consumed, 20);
        assert!(rows.iter().all(|r| !r.is_active()));

        // Picked goods stay reserved until shipped.
        let reserved: u64 = fx
            .ledger
            .records_for_product(fx.product)
            .iter()
            .map(|r| r.reserved)
            .sum();
        assert_eq!(reserved, 20);

        // Idempotent: a second cancel releases nothing further.
        assert_eq!(fx.engine.cancel(order_id).unwrap(), 0);
    }

    #[test]
    fn consume_beyond_active_remainder_is_rejected() {
        let fx = fixture(&[10]);
        let item = OrderItemId::new();
        fx.engine
            .allocate(OrderId::new(), item, fx.product, 10, AllocationPolicy::AllOrNothing)
            .unwrap();

        let err = fx.engine.consume(item, 11).unwrap_err();
        assert!(matches!(err, StockroomError::InsufficientReservation { .. }));
    }

    #[test]
    fn consumed_legs_merge_per_location() {
        let fx = fixture(&[15, 15]);
        let order_id = OrderId::new();
        let item = OrderItemId::new();
        fx.engine
            .allocate(order_id, item, fx.product, 30, AllocationPolicy::AllOrNothing)
            .unwrap();
        fx.engine.consume(item, 30).unwrap();

        let legs = fx.engine.consumed_legs(order_id);
        assert_eq!(legs.len(), 2);
        assert_eq!(legs.iter().map(|l| l.qty).sum::<u64>(), 30);
        assert!(legs[0].location_id < legs[1].location_id);
    }
}
