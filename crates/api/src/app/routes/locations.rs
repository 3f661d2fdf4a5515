use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use stockroom_core::LocationId;
use stockroom_warehouse::Warehouse;

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_location).get(list_locations))
        .route("/:id", get(get_location))
}

pub async fn register_location(
    Extension(warehouse): Extension<Arc<Warehouse>>,
    Json(body): Json<dto::RegisterLocationRequest>,
) -> axum::response::Response {
    match warehouse.register_location(body.into_spec()) {
        Ok(location) => (StatusCode::CREATED, Json(location)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_locations(
    Extension(warehouse): Extension<Arc<Warehouse>>,
) -> axum::response::Response {
    Json(warehouse.locations()).into_response()
}

pub async fn get_location(
    Extension(warehouse): Extension<Arc<Warehouse>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let location_id: LocationId = match dto::parse_id(&id, "location id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match warehouse.location(location_id) {
        Ok(location) => Json(location).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
