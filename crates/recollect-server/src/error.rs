//! HTTP error responses

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use recollect_core::ValidationError;
use serde::Serialize;
use thiserror::Error;

/// Message returned while the maintenance killswitch is on
pub const MAINTENANCE_MESSAGE: &str = "Service is undergoing maintenance";

/// JSON body of an error response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
    pub message: String,
}

/// Errors a handler or middleware can answer with
#[derive(Error, Debug)]
pub enum ApiError {
    /// Payload rejected before queueing
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Missing or unusable credentials; `detail` is only shown outside prod
    #[error("unauthorized")]
    Unauthorized { detail: Option<String> },

    /// Body is not a JSON object; `status` is the one the extractor chose
    #[error("malformed body: {message}")]
    MalformedBody { status: StatusCode, message: String },

    /// Maintenance killswitch is on
    #[error("{}", MAINTENANCE_MESSAGE)]
    Maintenance,
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::MalformedBody {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::MalformedBody { status, .. } => *status,
            Self::Maintenance => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            Self::Validation(e) => {
                let body = ErrorBody {
                    code: e.kind.code(),
                    field: Some(e.field),
                    message: e.detail,
                };
                (status, Json(body)).into_response()
            }
            Self::Unauthorized { detail } => {
                let body = ErrorBody {
                    code: "unauthorized",
                    field: None,
                    message: detail.unwrap_or_else(|| "Unauthorized".to_string()),
                };
                (status, Json(body)).into_response()
            }
            Self::MalformedBody { message, .. } => {
                let body = ErrorBody {
                    code: "malformed-body",
                    field: None,
                    message,
                };
                (status, Json(body)).into_response()
            }
            Self::Maintenance => (status, MAINTENANCE_MESSAGE).into_response(),
        }
    }
}
