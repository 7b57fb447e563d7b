//! HTTP API for vehicle sale orders.
//!
//! Provides REST endpoints for orders, payments, and gateway webhooks,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::{AppState, create_default_state};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create))
        .route("/orders", get(routes::orders::list))
        .route("/orders/active", get(routes::orders::list_active))
        .route("/orders/status/{status}", get(routes::orders::list_by_status))
        .route(
            "/orders/customer/{customer_id}",
            get(routes::orders::list_by_customer),
        )
        .route("/orders/{id}", get(routes::orders::get))
        .route("/orders/{id}/status", put(routes::orders::update_status))
        .route("/payments/{order_id}", post(routes::payments::create))
        .route("/payments/{order_id}", get(routes::payments::status))
        .route("/webhooks/pagseguro", post(routes::webhooks::pagseguro))
        .route(
            "/webhooks/simulation/{order_id}/{outcome}",
            post(routes::webhooks::simulate),
        )
        .route("/admin/compensations", get(routes::admin::compensations))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
