//! HTTP API application wiring (Axum router on top of the warehouse facade).
//!
//! Layout:
//! - `routes/`: HTTP routes + handlers (one file per domain area)
//! - `dto.rs`: request DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};

use stockroom_warehouse::Warehouse;

pub mod dto;
pub mod errors;
pub mod routes;

/// Runtime knobs read from the environment by `main.rs`.
#[derive(Debug, Clone, Copy)]
pub struct AppConfig {
    pub low_stock_threshold: u64,
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(warehouse: Arc<Warehouse>, config: AppConfig) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router())
        .layer(Extension(warehouse))
        .layer(Extension(config))
}
