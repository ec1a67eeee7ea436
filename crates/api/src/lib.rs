//! HTTP surface and process wiring for the fulfillment services.
//!
//! - `order-service` accepts orders over HTTP and publishes `OrderReceived`
//! - `inventory`, `warehouse`, `shipper` and `notification` each run one
//!   consumer loop plus a liveness endpoint
//!
//! Every binary exposes `/v1/healthcheck` and a Prometheus `/metrics`.

pub mod config;
pub mod error;
pub mod routes;
pub mod runner;
pub mod service;
pub mod telemetry;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

fn liveness_routes(metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/v1/healthcheck", get(routes::health::check))
        .merge(metrics_router)
}

/// Liveness and metrics routes, served by every consumer service.
pub fn liveness_router(metrics_handle: PrometheusHandle) -> Router {
    liveness_routes(metrics_handle).layer(TraceLayer::new_for_http())
}

/// The ingestion application: liveness routes plus `POST /v1/orders`.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/v1/orders", post(routes::orders::create))
        .with_state(state)
        .merge(liveness_routes(metrics_handle))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
