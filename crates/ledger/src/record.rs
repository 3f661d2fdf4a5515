use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{LocationId, ProductId, StockResult, StockroomError};

/// Per-(product, location) stock quantities.
///
/// Invariant at all times: `0 <= reserved <= on_hand`, so
/// `available = on_hand - reserved >= 0`. Mutation happens only through the
/// crate-private posting methods invoked by [`crate::InventoryLedger`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub on_hand: u64,
    pub reserved: u64,
    /// Stamped by cycle-count postings.
    pub last_counted: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryRecord {
    pub(crate) fn new(product_id: ProductId, location_id: LocationId) -> Self {
        Self {
            product_id,
            location_id,
            on_hand: 0,
            reserved: 0,
            last_counted: None,
            updated_at: Utc::now(),
        }
    }

    /// Sellable/allocatable quantity.
    pub fn available(&self) -> u64 {
        self.on_hand - self.reserved
    }

    pub fn is_empty(&self) -> bool {
        self.on_hand == 0 && self.reserved == 0
    }

    pub(crate) fn receive(&mut self, qty: u64) {
        self.on_hand += qty;
        self.touch();
    }

    pub(crate) fn check_reserve(&self, qty: u64) -> StockResult<()> {
        if self.available() < qty {
            return Err(StockroomError::InsufficientStock {
                product_id: self.product_id,
                location_id: Some(self.location_id),
                requested: qty,
                available: self.available(),
            });
        }
        Ok(())
    }

    pub(crate) fn reserve(&mut self, qty: u64) -> StockResult<()> {
        self.check_reserve(qty)?;
        self.reserved += qty;
        self.touch();
        Ok(())
    }

    pub(crate) fn release(&mut self, qty: u64) -> StockResult<()> {
        if qty > self.reserved {
            return Err(StockroomError::OverRelease {
                requested: qty,
                reserved: self.reserved,
            });
        }
        self.reserved -= qty;
        self.touch();
        Ok(())
    }

    pub(crate) fn check_ship(&self, qty: u64) -> StockResult<()> {
        if qty > self.reserved {
            return Err(StockroomError::InsufficientReservation {
                requested: qty,
                reserved: self.reserved,
            });
        }
        Ok(())
    }

    /// Shipping always consumes a prior reservation: both on_hand and
    /// reserved drop together, so the invariant cannot break.
    pub(crate) fn ship(&mut self, qty: u64) -> StockResult<()> {
        self.check_ship(qty)?;
        self.reserved -= qty;
        self.on_hand -= qty;
        self.touch();
        Ok(())
    }

    pub(crate) fn check_delta(&self, delta: i64) -> StockResult<()> {
        let next = self.on_hand as i64 + delta;
        if next < self.reserved as i64 {
            return Err(StockroomError::InsufficientStock {
                product_id: self.product_id,
                location_id: Some(self.location_id),
                requested: delta.unsigned_abs(),
                available: self.available(),
            });
        }
        Ok(())
    }

    pub(crate) fn apply_delta(&mut self, delta: i64) -> StockResult<()> {
        self.check_delta(delta)?;
        self.on_hand = (self.on_hand as i64 + delta) as u64;
        self.touch();
        Ok(())
    }

    /// Cycle count: set on_hand to an absolute observed value.
    /// Returns the applied delta.
    pub(crate) fn set_counted(&mut self, counted: u64, at: DateTime<Utc>) -> StockResult<i64> {
        if counted < self.reserved {
            return Err(StockroomError::InsufficientStock {
                product_id: self.product_id,
                location_id: Some(self.location_id),
                requested: counted,
                available: self.available(),
            });
        }
        let delta = counted as i64 - self.on_hand as i64;
        self.on_hand = counted;
        self.last_counted = Some(at);
        self.touch();
        Ok(delta)
    }

    /// Post-posting invariant check. A failure here is corruption, never
    /// silently corrected.
    pub(crate) fn verify(&self) -> StockResult<()> {
        if self.reserved > self.on_hand {
            return Err(StockroomError::corruption(format!(
                "record ({}, {}): reserved {} exceeds on_hand {}",
                self.product_id, self.location_id, self.reserved, self.on_hand
            )));
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_record(on_hand: u64, reserved: u64) -> InventoryRecord {
        let mut rec = InventoryRecord::new(ProductId::new(), LocationId::new());
        rec.on_hand = on_hand;
        rec.reserved = reserved;
        rec
    }

    #[test]
    fn available_is_on_hand_minus_reserved() {
        assert_eq!(test_record(10, 3).available(), 7);
    }

    #[test]
    fn reserve_rejects_beyond_available() {
        let mut rec = test_record(10, 8);
        let err = rec.reserve(3).unwrap_err();
        assert!(matches!(err, StockroomError::InsufficientStock { .. }));
        assert_eq!(rec.reserved, 8);
    }

    #[test]
    fn release_rejects_beyond_reserved() {
        let mut rec = test_record(10, 2);
        let err = rec.release(3).unwrap_err();
        assert!(matches!(err, StockroomError::OverRelease { .. }));
    }

    #[test]
    fn ship_requires_a_reservation() {
        let mut rec = test_record(10, 0);
        let err = rec.ship(1).unwrap_err();
        assert!(matches!(err, StockroomError::InsufficientReservation { .. }));

        rec.reserve(4).unwrap();
        rec.ship(4).unwrap();
        assert_eq!(rec.on_hand, 6);
        assert_eq!(rec.reserved, 0);
    }

    #[test]
    fn adjust_cannot_drive_on_hand_below_reserved() {
        let mut rec = test_record(10, 6);
        let err = rec.apply_delta(-5).unwrap_err();
        assert!(matches!(err, StockroomError::InsufficientStock { .. }));
        rec.apply_delta(-4).unwrap();
        assert_eq!(rec.on_hand, 6);
    }

    #[test]
    fn count_stamps_last_counted() {
        let mut rec = test_record(10, 2);
        let at = Utc::now();
        let delta = rec.set_counted(7, at).unwrap();
        assert_eq!(delta, -3);
        assert_eq!(rec.on_hand, 7);
        assert_eq!(rec.last_counted, Some(at));

        let err = rec.set_counted(1, at).unwrap_err();
        assert!(matches!(err, StockroomError::InsufficientStock { .. }));
    }
}
