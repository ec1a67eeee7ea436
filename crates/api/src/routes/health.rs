//! Liveness endpoint.

use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// GET /v1/healthcheck: always 200 while the process serves HTTP.
pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
