use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockroom_core::{ErrorClass, StockroomError};

/// Map a domain failure to its HTTP response.
///
/// Validation → 400 (404 for lookup misses), Conflict → 409, State → 422,
/// Invariant → 500.
pub fn domain_error_to_response(err: StockroomError) -> axum::response::Response {
    let status = match err.class() {
        ErrorClass::Validation if err.is_not_found() => StatusCode::NOT_FOUND,
        ErrorClass::Validation => StatusCode::BAD_REQUEST,
        ErrorClass::Conflict => StatusCode::CONFLICT,
        ErrorClass::State => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorClass::Invariant => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let code = match err.class() {
        ErrorClass::Validation if err.is_not_found() => "not_found",
        ErrorClass::Validation => "validation_error",
        ErrorClass::Conflict => "conflict",
        ErrorClass::State => "invalid_state",
        ErrorClass::Invariant => "invariant_violation",
    };
    if err.class() == ErrorClass::Invariant {
        tracing::error!(error = %err, "invariant violation surfaced to the api");
    }
    json_error(status, code, err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_core::{OrderId, ProductId};

    fn status_of(err: StockroomError) -> StatusCode {
        domain_error_to_response(err).status()
    }

    #[test]
    fn taxonomy_maps_to_http_statuses() {
        assert_eq!(
            status_of(StockroomError::InvalidQuantity { value: 0 }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(StockroomError::UnknownProduct(ProductId::new())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(StockroomError::InsufficientStock {
                product_id: ProductId::new(),
                location_id: None,
                requested: 5,
                available: 2,
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(StockroomError::OrderCancelled(OrderId::new())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(StockroomError::corruption("reserved exceeds on_hand")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
