//! The facade tying the warehouse together.
//!
//! Wires catalog, location registry, inventory ledger, allocation engine,
//! receiving and fulfillment into one entry point, and layers operator
//! conveniences on top: scan routing, the operations snapshot, the low-stock
//! report and the pick queue.

pub mod facade;
pub mod scan;

pub use facade::{LowStockEntry, OperationsSnapshot, Warehouse};
pub use scan::{ScanEvent, ScanOutcome, ScanTask};
