//! Error responses for the HTTP API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use waitline_engine::{EngineError, ErrorKind};

/// API error body: `{"code": "NOT_FOUND", "message": "..."}`.
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        ApiError {
            status,
            code,
            message: message.into(),
        }
    }

    /// Another path changed the entry before this request's write landed.
    pub fn superseded(entry_id: &str) -> Self {
        Self::new(
            StatusCode::CONFLICT,
            "SUPERSEDED",
            format!("Entry {entry_id} was changed concurrently"),
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err.kind() {
            ErrorKind::Validation => {
                Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", err.to_string())
            }
            ErrorKind::NotFound => Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string()),
            ErrorKind::Conflict => Self::new(StatusCode::CONFLICT, "CONFLICT", err.to_string()),
            ErrorKind::Internal => {
                error!(error = %err, "Internal error while handling request");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error",
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
