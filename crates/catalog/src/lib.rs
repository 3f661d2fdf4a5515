//! Product reference data (catalog).
//!
//! Read-mostly: products are registered by an external catalog collaborator
//! and consumed by the rest of the core for barcode resolution and reporting.

pub mod product;

pub use product::{Catalog, Dimensions, Product, ProductSpec};
