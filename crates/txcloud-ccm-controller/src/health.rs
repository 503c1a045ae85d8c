//! Health and readiness endpoints.

use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    provider: &'static str,
}

async fn healthz_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        service: "txcloud-cloud-controller-manager",
        provider: txcloud_ccm_core::PROVIDER_NAME,
    })
}

async fn readyz_handler() -> impl IntoResponse {
    (StatusCode::OK, "ready")
}

pub fn router() -> Router {
    Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
}
