use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use tasker_types::api::{ErrorResponse, FieldViolation};

/// Every failure a handler can surface. Only `Validation` and `BadRequest`
/// carry detail to the client; the other variants use fixed messages.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Validation failed")]
    Validation(Vec<FieldViolation>),

    #[error("{0}")]
    BadRequest(String),

    #[error("Please authenticate.")]
    Unauthorized,

    /// Write payload named a field outside the allowlist.
    #[error("Invalid create or update!")]
    Forbidden,

    /// Absent and not-owned resources share this variant.
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    /// Logs the cause and hides it behind a 500.
    pub fn internal(err: impl std::fmt::Display) -> Self {
        error!("Internal error: {}", err);
        ApiError::Internal
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = self.to_string();
        let details = match self {
            ApiError::Validation(violations) => violations,
            _ => Vec::new(),
        };
        (status, Json(ErrorResponse { error, details })).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
