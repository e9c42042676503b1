#![allow(dead_code)]

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// Policy: fail closed for missing ledger data (`DataUnavailable` blocks the
/// session), fail visible for generation failures (`Generation` surfaces the
/// underlying detail instead of retrying silently).
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Ledger data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Prompt build error: {0}")]
    PromptBuild(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::DataUnavailable(msg) => {
                tracing::error!("Ledger data unavailable: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "DATA_UNAVAILABLE",
                    format!("Could not load the project ledger: {msg}"),
                )
            }
            AppError::Generation(msg) => {
                tracing::error!("Generation error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "GENERATION_ERROR",
                    format!("The AI service returned an error: {msg}"),
                )
            }
            AppError::PromptBuild(msg) => {
                tracing::error!("Prompt build error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "PROMPT_BUILD_ERROR",
                    "Could not assemble the session prompt".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
