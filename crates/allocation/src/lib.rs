//! The Allocation Engine.
//!
//! Turns outbound demand into ledger reservations: greedy source selection,
//! transactional multi-leg reserves, deterministic pick consumption and
//! idempotent cancellation.

pub mod engine;
pub mod reservation;

pub use engine::{AllocationEngine, AllocationOutcome, AllocationPolicy};
pub use reservation::{Reservation, ReservationState};
