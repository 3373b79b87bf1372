//! Generation route handlers

use std::convert::Infallible;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use inkwell_core::application::{AuthOverride, AuthStatus, ConsistencyCheckRequest, ConsistencyReport};
use inkwell_core::error::AppError;
use serde_json::Value;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::types::{CancelResponse, GenerateResponse, JobView, StatusQuery};

/// GET status?force=<authenticated|unauthenticated>
pub async fn status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<Json<AuthStatus>> {
    let force = match query.force.as_deref() {
        None => None,
        Some(_) if !state.config.allow_status_override => {
            debug!("Ignoring status override (disabled)");
            None
        }
        Some(raw) => Some(
            raw.parse::<AuthOverride>()
                .map_err(|e| AppError::InvalidRequest(vec![e]))?,
        ),
    };
    Ok(Json(state.service.status(force).await))
}

/// POST generate
///
/// Responds 202 as soon as the job is registered.
pub async fn generate(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<GenerateResponse>)> {
    let Json(raw) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let id = state.service.generate(&raw).await?;
    Ok((StatusCode::ACCEPTED, Json(GenerateResponse { id })))
}

/// GET stream/{id}
///
/// Replays buffered output then relays live chunks until end-of-stream.
pub async fn stream(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let subscription = state.service.stream(&id).await?;
    debug!(job_id = %id, "Stream subscriber connected");

    let chunks = ReceiverStream::new(subscription.into_inner()).map(Ok::<_, Infallible>);
    Ok((
        [
            (CONTENT_TYPE, "text/plain; charset=utf-8"),
            (CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(chunks),
    )
        .into_response())
}

/// GET generations/{id}
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobView>> {
    let job = state.service.job(&id).await?;
    Ok(Json(job.into()))
}

/// POST generations/{id}/cancel
pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CancelResponse>> {
    let job = state.service.cancel(&id).await?;
    Ok(Json(CancelResponse {
        id: job.id,
        state: job.state,
    }))
}

/// POST consistency-check
pub async fn consistency_check(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<ConsistencyReport>> {
    let Json(raw) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let req: ConsistencyCheckRequest = serde_json::from_value(raw)
        .map_err(|e| AppError::InvalidRequest(vec![format!("body: {}", e)]))?;
    Ok(Json(state.service.consistency_check(&req)))
}
