use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::external::model_provider::ModelProviderError;
use crate::models::Feature;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Schema error: {0}")]
    Schema(String),
    #[error("Insufficient data: need at least {required} rows, got {got}")]
    InsufficientData { required: usize, got: usize },
    #[error("Degenerate range on channel {channel}: every value equals {value}")]
    DegenerateRange { channel: Feature, value: f64 },
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("Inference timed out after {0:?}")]
    InferenceTimeout(Duration),
    #[error("Inference error: {0}")]
    Inference(String),
}

impl AppError {
    /// True when the caller can fix the failure by changing the request.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::Validation(_)
                | AppError::Schema(_)
                | AppError::InsufficientData { .. }
                | AppError::DegenerateRange { .. }
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::Schema(_) => "schema",
            AppError::InsufficientData { .. } => "insufficient_data",
            AppError::DegenerateRange { .. } => "degenerate_range",
            AppError::ModelUnavailable(_) => "model_unavailable",
            AppError::InferenceTimeout(_) => "inference_timeout",
            AppError::Inference(_) => "inference",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Schema(_) | AppError::InsufficientData { .. } => {
                StatusCode::BAD_REQUEST
            }
            AppError::DegenerateRange { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ModelUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::InferenceTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "kind": self.kind(),
        }));
        (status, body).into_response()
    }
}

impl From<ModelProviderError> for AppError {
    fn from(value: ModelProviderError) -> Self {
        AppError::ModelUnavailable(value.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}
