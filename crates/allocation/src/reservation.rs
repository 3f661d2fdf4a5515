use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{LocationId, OrderId, OrderItemId, ProductId, ReservationId};

/// Lifecycle of a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationState {
    Active,
    Consumed,
    Released,
}

/// A claim on a specific (product, location) quantity on behalf of an order
/// item.
///
/// Created Active by the Allocation Engine, consumed piecewise by pick
/// confirmations, released on cancellation or allocation rollback. Fully
/// consumed rows keep their stock reserved in the ledger until shipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub order_id: OrderId,
    pub order_item_id: OrderItemId,
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub quantity: u64,
    pub consumed: u64,
    pub state: ReservationState,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    pub(crate) fn new(
        order_id: OrderId,
        order_item_id: OrderItemId,
        product_id: ProductId,
        location_id: LocationId,
        quantity: u64,
    ) -> Self {
        Self {
            id: ReservationId::new(),
            order_id,
            order_item_id,
            product_id,
            location_id,
            quantity,
            consumed: 0,
            state: ReservationState::Active,
            created_at: Utc::now(),
        }
    }

    /// Quantity still claimable by picks (zero unless Active).
    pub fn active_remainder(&self) -> u64 {
        match self.state {
            ReservationState::Active => self.quantity - self.consumed,
            ReservationState::Consumed | ReservationState::Released => 0,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, ReservationState::Active)
    }
}
