//! The Fulfillment Service.
//!
//! Outbound orders move Pending → Picking → Packing → Shipped, with Cancelled
//! reachable until packing begins. Allocation and reservation consumption are
//! delegated to the Allocation Engine; the final ship posts to the Inventory
//! Ledger as one atomic set.

pub mod fulfillment;
pub mod order;

pub use fulfillment::FulfillmentService;
pub use order::{Order, OrderItem, OrderItemSpec, OrderPriority, OrderSpec, OrderStatus};
