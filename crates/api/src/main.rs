use std::sync::Arc;

use stockroom_warehouse::Warehouse;

#[tokio::main]
async fn main() {
    stockroom_observability::init();

    let addr = std::env::var("STOCKROOM_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let low_stock_threshold = std::env::var("STOCKROOM_LOW_STOCK_THRESHOLD")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(10);

    let warehouse = Arc::new(Warehouse::new());
    let app = stockroom_api::app::build_app(
        warehouse,
        stockroom_api::app::AppConfig { low_stock_threshold },
    );

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {addr}: {e}"));

    tracing::info!("listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}
