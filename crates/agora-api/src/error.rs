//! API error types with HTTP mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use agora_core::DebateError;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),

    /// A session operation was refused
    #[error("{0}")]
    Debate(#[from] DebateError),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Status for a refused session operation
fn debate_status(err: &DebateError) -> StatusCode {
    match err {
        DebateError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        DebateError::InvalidSession(_)
        | DebateError::InvalidTiming(_)
        | DebateError::UnknownRole(_)
        | DebateError::UnknownParticipant(_)
        | DebateError::EmptySpeech
        | DebateError::SpeechTooLong { .. }
        | DebateError::InvalidScore(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DebateError::InvalidTransition { .. }
        | DebateError::WrongPhase { .. }
        | DebateError::NotEnoughParticipants { .. }
        | DebateError::RoleTaken { .. }
        | DebateError::AlreadySeated { .. }
        | DebateError::OutOfTurn { .. }
        | DebateError::SessionCompleted => StatusCode::CONFLICT,
        DebateError::Storage(_) | DebateError::Finalization(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                msg.clone(),
            ),
            ApiError::Internal(msg) => {
                // Don't expose internal errors to clients
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
            ApiError::Debate(err) => {
                if !err.is_validation() {
                    tracing::warn!(error = %err, "Session operation failed");
                }
                (debate_status(err), err.code(), err.to_string())
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<agora_persist::StorageError> for ApiError {
    fn from(e: agora_persist::StorageError) -> Self {
        ApiError::ServiceUnavailable(e.to_string())
    }
}

impl From<agora_llm::ConfigError> for ApiError {
    fn from(e: agora_llm::ConfigError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        ApiError::Internal(e.to_string())
    }
}
