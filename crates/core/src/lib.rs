//! Domain foundation building blocks shared by every stockroom crate.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! strongly-typed identifiers and the shared error taxonomy every stockroom
//! crate reports through.

pub mod error;
pub mod id;

pub use error::{ErrorClass, StockResult, StockroomError};
pub use id::{LocationId, OrderId, OrderItemId, ProductId, PurchaseOrderId, ReservationId};
