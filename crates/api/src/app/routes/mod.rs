use axum::Router;

pub mod inventory;
pub mod locations;
pub mod orders;
pub mod products;
pub mod purchases;
pub mod reports;
pub mod scans;
pub mod system;

/// Router for all warehouse endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/products", products::router())
        .nest("/locations", locations::router())
        .nest("/inventory", inventory::router())
        .nest("/purchase-orders", purchases::router())
        .nest("/orders", orders::router())
        .nest("/reports", reports::router())
        .nest("/scans", scans::router())
}
