use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use stockroom_core::{OrderId, OrderItemId};
use stockroom_warehouse::Warehouse;

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_order).get(list_orders))
        .route("/:id", get(get_order))
        .route("/:id/allocate", post(allocate_order))
        .route("/:id/picking", post(begin_picking))
        .route("/:id/packing", post(begin_packing))
        .route("/:id/ship", post(ship_order))
        .route("/:id/cancel", post(cancel_order))
        .route("/:id/reservations", get(get_reservations))
        .route("/items/:item_id/picks", post(confirm_pick))
}

pub async fn create_order(
    Extension(warehouse): Extension<Arc<Warehouse>>,
    Json(body): Json<dto::CreateOrderRequest>,
) -> axum::response::Response {
    let spec = match body.into_spec() {
        Ok(spec) => spec,
        Err(resp) => return resp,
    };
    match warehouse.create_order(spec) {
        Ok(order) => (StatusCode::CREATED, Json(order)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_orders(
    Extension(warehouse): Extension<Arc<Warehouse>>,
) -> axum::response::Response {
    Json(warehouse.orders()).into_response()
}

pub async fn get_order(
    Extension(warehouse): Extension<Arc<Warehouse>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id: OrderId = match dto::parse_id(&id, "order id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match warehouse.order(order_id) {
        Ok(order) => Json(order).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn allocate_order(
    Extension(warehouse): Extension<Arc<Warehouse>>,
    Path(id): Path<String>,
    Json(body): Json<dto::AllocateOrderRequest>,
) -> axum::response::Response {
    let order_id: OrderId = match dto::parse_id(&id, "order id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match warehouse.allocate_order(order_id, body.policy) {
        Ok(outcomes) => Json(outcomes).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn begin_picking(
    Extension(warehouse): Extension<Arc<Warehouse>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id: OrderId = match dto::parse_id(&id, "order id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match warehouse.begin_picking(order_id) {
        Ok(order) => Json(order).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn confirm_pick(
    Extension(warehouse): Extension<Arc<Warehouse>>,
    Path(item_id): Path<String>,
    Json(body): Json<dto::ConfirmPickRequest>,
) -> axum::response::Response {
    let order_item_id: OrderItemId = match dto::parse_id(&item_id, "order item id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match warehouse.confirm_pick(order_item_id, body.quantity) {
        Ok(order) => Json(order).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn begin_packing(
    Extension(warehouse): Extension<Arc<Warehouse>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id: OrderId = match dto::parse_id(&id, "order id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match warehouse.begin_packing(order_id) {
        Ok(order) => Json(order).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn ship_order(
    Extension(warehouse): Extension<Arc<Warehouse>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id: OrderId = match dto::parse_id(&id, "order id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match warehouse.ship_order(order_id) {
        Ok(order) => Json(order).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn cancel_order(
    Extension(warehouse): Extension<Arc<Warehouse>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id: OrderId = match dto::parse_id(&id, "order id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match warehouse.cancel_order(order_id) {
        Ok(order) => Json(order).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_reservations(
    Extension(warehouse): Extension<Arc<Warehouse>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id: OrderId = match dto::parse_id(&id, "order id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match warehouse.reservations_for_order(order_id) {
        Ok(reservations) => Json(reservations).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
