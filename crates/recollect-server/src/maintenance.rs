//! Maintenance mode middleware

use std::sync::Arc;

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};

use crate::error::ApiError;
use crate::AppState;

/// Answers 503 while the maintenance killswitch is on
pub async fn maintenance_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if state.features.maintenance().is_enabled() {
        return Err(ApiError::Maintenance);
    }
    Ok(next.run(request).await)
}
