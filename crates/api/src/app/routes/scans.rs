use std::sync::Arc;

use axum::{
    extract::Extension, response::IntoResponse, routing::post, Json, Router,
};
use chrono::Utc;

use stockroom_warehouse::{ScanEvent, Warehouse};

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/", post(apply_scan))
}

pub async fn apply_scan(
    Extension(warehouse): Extension<Arc<Warehouse>>,
    Json(body): Json<dto::ScanRequest>,
) -> axum::response::Response {
    let event = ScanEvent {
        barcode: body.barcode,
        location_hint: body.location_hint,
        occurred_at: body.occurred_at.unwrap_or_else(Utc::now),
    };
    match warehouse.apply_scan(&event, body.task) {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
