use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::services::inference::InferenceError;

/// Standard error response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,
    /// Underlying cause, present for model and prediction failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown soil category: {0}")]
    UnknownCategory(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Prediction failed: {0}")]
    Prediction(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::UnknownCategory(label) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Prediction failed".to_string(),
                Some(format!("soil label '{}' is not known to the encoder", label)),
            ),
            AppError::ModelUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Recommendation models are not loaded".to_string(),
                Some(msg),
            ),
            AppError::Prediction(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Prediction failed".to_string(),
                Some(msg),
            ),
            AppError::DatabaseError(err) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal database error".to_string(),
                    None,
                )
            }
        };

        (status, axum::Json(ErrorResponse { error, details })).into_response()
    }
}

impl From<InferenceError> for AppError {
    fn from(err: InferenceError) -> Self {
        match err {
            InferenceError::Validation(msg) => AppError::Validation(msg),
            InferenceError::UnknownCategory(label) => AppError::UnknownCategory(label),
            InferenceError::Model(msg) => AppError::Prediction(msg),
        }
    }
}
