//! The Inventory Ledger.
//!
//! Exclusive owner of `InventoryRecord` mutation: every other component moves
//! stock only by invoking ledger postings. Each posting also appends to an
//! append-only movement journal for audit/reporting collaborators.

pub mod ledger;
pub mod movement;
pub mod record;

pub use ledger::{InventoryLedger, PostingLeg, RecordKey, StockTotals};
pub use movement::{MovementKind, StockMovement};
pub use record::InventoryRecord;
