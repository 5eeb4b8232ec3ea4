//! HTTP endpoint handlers

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Serialize;

use recollect_core::{PostPayload, PostResponse};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::AppState;

/// Health check
pub async fn health() -> &'static str {
    "ok"
}

/// Record one interaction.
///
/// Answers `200` once the interaction is queued and `503` with a `retry`
/// body when the queue could not take it. Bodies that are not a JSON object
/// get the extractor's status with a `malformed-body` error.
pub async fn post_interaction(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<PostPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<PostResponse>), ApiError> {
    let Json(payload) = payload.map_err(|rejection| {
        tracing::info!(user_id = %user.id, "Rejected interaction body: {}", rejection.body_text());
        ApiError::from(rejection)
    })?;

    let response = state.publisher.submit(user.id, &payload).await.map_err(|e| {
        tracing::info!(user_id = %user.id, "Rejected interaction: {}", e);
        ApiError::from(e)
    })?;

    let status = if response.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    Ok((status, Json(response)))
}

/// Queue summary
#[derive(Debug, Serialize)]
pub struct QueueStatus {
    pub name: String,
    pub approximate_depth: Option<usize>,
}

/// Service status
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub maintenance: bool,
    pub queue: QueueStatus,
}

/// Get service status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let queue = state.publisher.queue();
    let approximate_depth = match queue.approximate_depth().await {
        Ok(depth) => Some(depth),
        Err(e) => {
            tracing::warn!(queue = queue.name(), "Failed to read queue depth: {}", e);
            None
        }
    };

    Json(StatusResponse {
        maintenance: state.features.maintenance().is_enabled(),
        queue: QueueStatus {
            name: queue.name().to_string(),
            approximate_depth,
        },
    })
}
