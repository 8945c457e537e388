//! API error handling
//!
//! Core errors map 1:1 onto HTTP status codes; the body always carries a
//! stable machine-readable `code` and a human-readable `msg`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use spacehub_types::CoreError;
use thiserror::Error;

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Business or infrastructure error from the core
    #[error(transparent)]
    Core(#[from] CoreError),

    /// `X-Actor-Id` / `X-Actor-Role` missing or malformed
    #[error("Missing or invalid actor: {0}")]
    InvalidActor(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid request body: {0}")]
    InvalidRequestBody(String),
}

impl ApiError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Core(err) => err.error_code(),
            Self::InvalidActor(_) => "INVALID_ACTOR",
            Self::InvalidParameter(_) => "INVALID_PARAMETER",
            Self::InvalidRequestBody(_) => "INVALID_REQUEST_BODY",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Core(err) => match err {
                CoreError::Validation { .. } => StatusCode::BAD_REQUEST,
                CoreError::Authorization { .. } => StatusCode::FORBIDDEN,
                CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
                CoreError::StateConflict { .. } => StatusCode::CONFLICT,
                CoreError::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                CoreError::Infrastructure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::InvalidActor(_) => StatusCode::UNAUTHORIZED,
            Self::InvalidParameter(_) | Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
        }
    }
}

/// Error body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub msg: String,
}

impl From<&ApiError> for ErrorResponse {
    fn from(err: &ApiError) -> Self {
        // Infrastructure details stay in the logs
        let msg = match err {
            ApiError::Core(CoreError::Infrastructure { .. }) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        Self {
            code: err.error_code().to_string(),
            msg,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}
