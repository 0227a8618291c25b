//! Axum Handlers for the REST API
//!
//! The relay itself is served over WebSocket; the only plain HTTP endpoint is
//! the readiness probe. `utoipa` doc comments feed the OpenAPI document.

use axum::response::Json;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema, Debug, PartialEq)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
}

/// Report that the service is up and accepting connections.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is ready", body = HealthResponse)
    )
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
