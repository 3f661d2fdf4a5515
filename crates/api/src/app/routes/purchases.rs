use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use stockroom_core::{LocationId, ProductId, PurchaseOrderId};
use stockroom_warehouse::Warehouse;

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_purchase_order).get(list_purchase_orders))
        .route("/:id", get(get_purchase_order))
        .route("/:id/receipts", post(record_receipt))
        .route("/:id/discrepancies", get(get_discrepancies))
}

pub async fn create_purchase_order(
    Extension(warehouse): Extension<Arc<Warehouse>>,
    Json(body): Json<dto::CreatePurchaseOrderRequest>,
) -> axum::response::Response {
    let spec = match body.into_spec() {
        Ok(spec) => spec,
        Err(resp) => return resp,
    };
    match warehouse.create_purchase_order(spec) {
        Ok(po) => (StatusCode::CREATED, Json(po)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_purchase_orders(
    Extension(warehouse): Extension<Arc<Warehouse>>,
) -> axum::response::Response {
    Json(warehouse.purchase_orders()).into_response()
}

pub async fn get_purchase_order(
    Extension(warehouse): Extension<Arc<Warehouse>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let po_id: PurchaseOrderId = match dto::parse_id(&id, "purchase order id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match warehouse.purchase_order(po_id) {
        Ok(po) => Json(po).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn record_receipt(
    Extension(warehouse): Extension<Arc<Warehouse>>,
    Path(id): Path<String>,
    Json(body): Json<dto::RecordReceiptRequest>,
) -> axum::response::Response {
    let po_id: PurchaseOrderId = match dto::parse_id(&id, "purchase order id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let product_id: ProductId = match dto::parse_id(&body.product_id, "product id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let location_id: LocationId = match dto::parse_id(&body.location_id, "location id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match warehouse.record_receipt(po_id, product_id, location_id, body.quantity) {
        Ok(po) => Json(po).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_discrepancies(
    Extension(warehouse): Extension<Arc<Warehouse>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let po_id: PurchaseOrderId = match dto::parse_id(&id, "purchase order id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match warehouse.receipt_discrepancies(po_id) {
        Ok(report) => Json(report).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
