use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use stockroom_core::ProductId;
use stockroom_warehouse::Warehouse;

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_product).get(list_products))
        .route("/:id", get(get_product))
        .route("/:id/inventory", get(product_inventory))
        .route("/:id/movements", get(product_movements))
        .route("/barcode/:barcode", get(get_by_barcode))
}

pub async fn register_product(
    Extension(warehouse): Extension<Arc<Warehouse>>,
    Json(body): Json<dto::RegisterProductRequest>,
) -> axum::response::Response {
    match warehouse.register_product(body.into_spec()) {
        Ok(product) => (StatusCode::CREATED, Json(product)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_products(
    Extension(warehouse): Extension<Arc<Warehouse>>,
) -> axum::response::Response {
    Json(warehouse.products()).into_response()
}

pub async fn get_product(
    Extension(warehouse): Extension<Arc<Warehouse>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match dto::parse_id(&id, "product id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match warehouse.product(product_id) {
        Ok(product) => Json(product).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_by_barcode(
    Extension(warehouse): Extension<Arc<Warehouse>>,
    Path(barcode): Path<String>,
) -> axum::response::Response {
    match warehouse.product_by_barcode(&barcode) {
        Ok(product) => Json(product).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn product_inventory(
    Extension(warehouse): Extension<Arc<Warehouse>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match dto::parse_id(&id, "product id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match warehouse.inventory_for_product(product_id) {
        Ok(records) => Json(records).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn product_movements(
    Extension(warehouse): Extension<Arc<Warehouse>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match dto::parse_id(&id, "product id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match warehouse.movements_for_product(product_id) {
        Ok(movements) => Json(movements).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
