//! Application router builder.
//!
//! Shared by the daemon and the tests so both exercise the same middleware.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::handlers::{generation, health};
use crate::state::AppState;

/// Route prefix of the generation API
pub const API_PREFIX: &str = "/api/generation";

/// Build the full application [`Router`] with all middleware layers.
///
/// 1. Structured request/response tracing
/// 2. Panic recovery (catch panics, return 500)
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .nest(API_PREFIX, generation_routes())
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

fn generation_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(generation::status))
        .route("/generate", post(generation::generate))
        .route("/stream/{id}", get(generation::stream))
        .route("/generations/{id}", get(generation::show))
        .route("/generations/{id}/cancel", post(generation::cancel))
        .route("/consistency-check", post(generation::consistency_check))
}

/// Render a handler panic as the standard internal-error body
fn panic_response(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "Handler panicked");

    let body = serde_json::json!({
        "error": "An internal error occurred",
        "code": crate::error::code::INTERNAL_ERROR,
    });
    (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response()
}
