use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use stockroom_warehouse::Warehouse;

use crate::app::AppConfig;

pub fn router() -> Router {
    Router::new()
        .route("/operations", get(operations_snapshot))
        .route("/low-stock", get(low_stock))
        .route("/pick-queue", get(pick_queue))
}

pub async fn operations_snapshot(
    Extension(warehouse): Extension<Arc<Warehouse>>,
) -> axum::response::Response {
    Json(warehouse.operations_snapshot()).into_response()
}

#[derive(Debug, Deserialize)]
pub struct LowStockQuery {
    pub threshold: Option<u64>,
}

pub async fn low_stock(
    Extension(warehouse): Extension<Arc<Warehouse>>,
    Extension(config): Extension<AppConfig>,
    Query(query): Query<LowStockQuery>,
) -> axum::response::Response {
    let threshold = query.threshold.unwrap_or(config.low_stock_threshold);
    Json(warehouse.low_stock(threshold)).into_response()
}

pub async fn pick_queue(
    Extension(warehouse): Extension<Arc<Warehouse>>,
) -> axum::response::Response {
    Json(warehouse.pick_queue()).into_response()
}
