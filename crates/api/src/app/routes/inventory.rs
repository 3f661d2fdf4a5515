use std::sync::Arc;

use axum::{
    extract::Extension,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use stockroom_core::{LocationId, ProductId};
use stockroom_warehouse::Warehouse;

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_records))
        .route("/movements", get(list_movements))
        .route("/adjustments", post(adjust_stock))
        .route("/counts", post(count_stock))
}

pub async fn list_records(
    Extension(warehouse): Extension<Arc<Warehouse>>,
) -> axum::response::Response {
    Json(warehouse.inventory()).into_response()
}

pub async fn list_movements(
    Extension(warehouse): Extension<Arc<Warehouse>>,
) -> axum::response::Response {
    Json(warehouse.movements()).into_response()
}

pub async fn adjust_stock(
    Extension(warehouse): Extension<Arc<Warehouse>>,
    Json(body): Json<dto::AdjustStockRequest>,
) -> axum::response::Response {
    let product_id: ProductId = match dto::parse_id(&body.product_id, "product id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let location_id: LocationId = match dto::parse_id(&body.location_id, "location id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match warehouse.adjust_stock(product_id, location_id, body.delta, body.reason) {
        Ok(record) => Json(record).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn count_stock(
    Extension(warehouse): Extension<Arc<Warehouse>>,
    Json(body): Json<dto::CountStockRequest>,
) -> axum::response::Response {
    let product_id: ProductId = match dto::parse_id(&body.product_id, "product id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let location_id: LocationId = match dto::parse_id(&body.location_id, "location id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match warehouse.count_stock(product_id, location_id, body.counted, body.reason) {
        Ok(record) => Json(record).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
