use axum::Json;

use crate::types::HealthResponse;

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: inkwell_core::VERSION.to_string(),
    })
}
