use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Crate-wide error taxonomy, mirroring the error classes the core must
/// distinguish between (transport / protocol / validation / not-found /
/// conflict / delivery / storage / fatal).
#[derive(Debug, Error)]
pub enum AppError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("delivery error: {0}")]
    Delivery(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl AppError {
    fn code(&self) -> &'static str {
        match self {
            AppError::Transport(_) => "transport_error",
            AppError::Protocol(_) => "protocol_error",
            AppError::Validation(_) => "validation_error",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Delivery(_) => "delivery_error",
            AppError::Storage(_) => "storage_error",
            AppError::Fatal(_) => "fatal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Transport(_) | AppError::Delivery(_) | AppError::Storage(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::Protocol(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Fatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.code().to_string(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
