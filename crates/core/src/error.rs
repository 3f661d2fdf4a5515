//! Domain error model.

use thiserror::Error;

use crate::id::{LocationId, OrderId, OrderItemId, ProductId, PurchaseOrderId};

/// Result type used across the domain layer.
pub type StockResult<T> = Result<T, StockroomError>;

/// Taxonomy class of a domain failure, used by callers (and the HTTP layer)
/// to decide how to react without matching every variant.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorClass {
    /// Rejected before any mutation; retry with corrected input.
    Validation,
    /// An invariant check failed; no partial effect. Re-evaluate and retry.
    Conflict,
    /// Operation invalid for the entity's current lifecycle state.
    State,
    /// Should-never-happen corruption. Logged, never silently corrected.
    Invariant,
}

/// Domain-level error.
///
/// Keep this focused on deterministic business/domain failures (validation,
/// invariants, conflicts, lifecycle). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StockroomError {
    // --- validation ---
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("quantity must be positive, got {value}")]
    InvalidQuantity { value: i64 },

    #[error("unknown product {0}")]
    UnknownProduct(ProductId),

    #[error("unknown location {0}")]
    UnknownLocation(LocationId),

    #[error("unknown order {0}")]
    UnknownOrder(OrderId),

    #[error("unknown order item {0}")]
    UnknownOrderItem(OrderItemId),

    #[error("unknown purchase order {0}")]
    UnknownPurchaseOrder(PurchaseOrderId),

    #[error("product {product_id} is not a line on purchase order {purchase_order_id}")]
    UnknownPoItem {
        purchase_order_id: PurchaseOrderId,
        product_id: ProductId,
    },

    #[error("no product with barcode {0:?}")]
    UnknownBarcode(String),

    #[error("location {0} already registered")]
    DuplicateLocation(String),

    #[error("SKU {0:?} already registered")]
    DuplicateSku(String),

    #[error("barcode {0:?} already registered")]
    DuplicateBarcode(String),

    #[error("reference {0:?} already in use")]
    DuplicateReference(String),

    // --- conflict ---
    #[error("insufficient stock of {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        location_id: Option<LocationId>,
        requested: u64,
        available: u64,
    },

    #[error("insufficient reservation: requested {requested}, reserved {reserved}")]
    InsufficientReservation { requested: u64, reserved: u64 },

    #[error("capacity of location {location_id} exceeded: capacity {capacity}, would hold {requested}")]
    CapacityExceeded {
        location_id: LocationId,
        capacity: u64,
        requested: u64,
    },

    #[error("occupancy of location {location_id} would go negative")]
    NegativeOccupancy { location_id: LocationId },

    #[error("over-release: requested {requested}, reserved {reserved}")]
    OverRelease { requested: u64, reserved: u64 },

    #[error("over-pick on item {order_item_id}: requested {requested}, remaining {remaining}")]
    OverPick {
        order_item_id: OrderItemId,
        requested: u64,
        remaining: u64,
    },

    #[error("over-receipt of {product_id}: expected {expected}, already received {received}, requested {requested}")]
    OverReceipt {
        product_id: ProductId,
        expected: u64,
        received: u64,
        requested: u64,
    },

    #[error("location {location_id} holds a different product ({bound})")]
    LocationOccupiedByOtherProduct {
        location_id: LocationId,
        bound: ProductId,
    },

    // --- state ---
    #[error("purchase order {0} is completed and accepts no further receipts")]
    PurchaseOrderClosed(PurchaseOrderId),

    #[error("order {0} is cancelled")]
    OrderCancelled(OrderId),

    #[error("order {0} is not fully allocated")]
    AllocationIncomplete(OrderId),

    #[error("order {0} is not fully picked")]
    PickingIncomplete(OrderId),

    #[error("picking has not started for order {0}")]
    PickingNotStarted(OrderId),

    #[error("picking already started for order {0}")]
    PickingStarted(OrderId),

    #[error("packing has not started for order {0}")]
    PackingNotStarted(OrderId),

    #[error("packing already started for order {0}")]
    PackingStarted(OrderId),

    #[error("order {0} already shipped")]
    OrderShipped(OrderId),

    #[error("order item {0} already has an active allocation")]
    AlreadyAllocated(OrderItemId),

    // --- invariant ---
    /// Detected ledger corruption (e.g. reserved > on_hand). Fatal to the
    /// operation; surfaced for operator investigation.
    #[error("ledger corruption: {0}")]
    LedgerCorruption(String),
}

impl StockroomError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn corruption(msg: impl Into<String>) -> Self {
        Self::LedgerCorruption(msg.into())
    }

    /// Taxonomy class of this failure.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Validation(_)
            | Self::InvalidId(_)
            | Self::InvalidQuantity { .. }
            | Self::UnknownProduct(_)
            | Self::UnknownLocation(_)
            | Self::UnknownOrder(_)
            | Self::UnknownOrderItem(_)
            | Self::UnknownPurchaseOrder(_)
            | Self::UnknownPoItem { .. }
            | Self::UnknownBarcode(_)
            | Self::DuplicateLocation(_)
            | Self::DuplicateSku(_)
            | Self::DuplicateBarcode(_)
            | Self::DuplicateReference(_) => ErrorClass::Validation,

            Self::InsufficientStock { .. }
            | Self::InsufficientReservation { .. }
            | Self::CapacityExceeded { .. }
            | Self::NegativeOccupancy { .. }
            | Self::OverRelease { .. }
            | Self::OverPick { .. }
            | Self::OverReceipt { .. }
            | Self::LocationOccupiedByOtherProduct { .. } => ErrorClass::Conflict,

            Self::PurchaseOrderClosed(_)
            | Self::OrderCancelled(_)
            | Self::AllocationIncomplete(_)
            | Self::PickingIncomplete(_)
            | Self::PickingNotStarted(_)
            | Self::PickingStarted(_)
            | Self::PackingNotStarted(_)
            | Self::PackingStarted(_)
            | Self::OrderShipped(_)
            | Self::AlreadyAllocated(_) => ErrorClass::State,

            Self::LedgerCorruption(_) => ErrorClass::Invariant,
        }
    }

    /// True if the failure is a not-found style lookup miss.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::UnknownProduct(_)
                | Self::UnknownLocation(_)
                | Self::UnknownOrder(_)
                | Self::UnknownOrderItem(_)
                | Self::UnknownPurchaseOrder(_)
                | Self::UnknownBarcode(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_follow_the_taxonomy() {
        assert_eq!(
            StockroomError::InvalidQuantity { value: 0 }.class(),
            ErrorClass::Validation
        );
        assert_eq!(
            StockroomError::OverRelease {
                requested: 5,
                reserved: 2
            }
            .class(),
            ErrorClass::Conflict
        );
        assert_eq!(
            StockroomError::OrderCancelled(OrderId::new()).class(),
            ErrorClass::State
        );
        assert_eq!(
            StockroomError::corruption("reserved exceeds on_hand").class(),
            ErrorClass::Invariant
        );
    }

    #[test]
    fn lookup_misses_are_not_found() {
        assert!(StockroomError::UnknownOrder(OrderId::new()).is_not_found());
        assert!(!StockroomError::validation("bad input").is_not_found());
    }
}
