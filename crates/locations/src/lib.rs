//! The Location Registry.
//!
//! Owns storage locations, their capacity/occupancy invariants and the
//! single-product binding rule. Occupancy only moves through Inventory Ledger
//! postings.

pub mod registry;

pub use registry::{Address, Location, LocationRegistry, LocationSpec};
