use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum PayError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Payment amount out of range: {0}")]
    AmountOutOfRange(String),

    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,

    #[error("Webhook signature verification failed: {0}")]
    SignatureInvalid(String),

    #[error("Invalid state: {0}")]
    State(String),

    #[error("Gateway error: {message}")]
    Gateway {
        code: Option<String>,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl PayError {
    pub fn gateway(code: Option<String>, message: impl Into<String>) -> Self {
        Self::Gateway {
            code,
            message: message.into(),
        }
    }

    /// Limit/rate violations are audited as security events before they
    /// propagate out of the services.
    pub fn is_security(&self) -> bool {
        matches!(self, Self::AmountOutOfRange(_) | Self::RateLimited)
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub error_code: String,
    pub timestamp: chrono::DateTime<Utc>,
    pub request_id: String,
}

impl IntoResponse for PayError {
    fn into_response(self) -> Response {
        let request_id = Uuid::new_v4().to_string();

        let (status, error_code) = match &self {
            PayError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            PayError::AmountOutOfRange(_) => (StatusCode::FORBIDDEN, "AMOUNT_OUT_OF_RANGE"),
            PayError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT_EXCEEDED"),
            PayError::SignatureInvalid(_) => (StatusCode::BAD_REQUEST, "INVALID_SIGNATURE"),
            PayError::State(_) => (StatusCode::CONFLICT, "INVALID_STATE"),
            PayError::Gateway { .. } => (StatusCode::BAD_GATEWAY, "GATEWAY_ERROR"),
            PayError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            PayError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        // Unexpected failures are reported generically, without internal detail.
        let message = match &self {
            PayError::Internal(_) => "Internal server error".to_string(),
            PayError::Config(_) => "Server misconfiguration".to_string(),
            other => other.to_string(),
        };

        let body = ErrorResponse {
            success: false,
            error: message,
            error_code: error_code.to_string(),
            timestamp: Utc::now(),
            request_id,
        };

        tracing::error!(
            error = ?self,
            error_code = error_code,
            "Request failed"
        );

        (status, Json(body)).into_response()
    }
}
