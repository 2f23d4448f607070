use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::fact::Choice;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Fact not found")]
    NotFound,

    #[error("Already voted {previous} on this fact")]
    DuplicateVote { previous: Choice },

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::NotFound => "not_found",
            AppError::DuplicateVote { .. } => "duplicate_vote",
            AppError::StorageUnavailable(_) => "storage_unavailable",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::DuplicateVote { .. } => StatusCode::CONFLICT,
            AppError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Only storage outages are worth retrying unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::StorageUnavailable(_))
    }
}

impl From<redis::RedisError> for AppError {
    fn from(e: redis::RedisError) -> Self {
        AppError::StorageUnavailable(e.to_string())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous_choice: Option<Choice>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match &self {
            // driver details stay in the logs
            AppError::StorageUnavailable(reason) => {
                tracing::error!("Storage unavailable: {reason}");
                "Storage unavailable, try again later".to_string()
            }
            other => other.to_string(),
        };

        let previous_choice = match self {
            AppError::DuplicateVote { previous } => Some(previous),
            _ => None,
        };

        let body = ErrorBody {
            error: self.kind(),
            message,
            previous_choice,
        };

        (status, Json(body)).into_response()
    }
}

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Invalid {key} value: {reason}")]
    Config { key: String, reason: String },

    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}
