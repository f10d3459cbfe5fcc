//! API error taxonomy and its HTTP mapping.
//!
//! Every rejected request gets a JSON body with a machine-readable `detail`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;
use crate::web::signature::SignatureError;

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// Signature missing or invalid
    #[error("invalid signature")]
    Unauthorized,

    /// Webhook secret absent from configuration
    #[error("server misconfigured")]
    ServiceMisconfigured,

    /// Payload or query parameters violate the expected shape
    #[error("invalid payload: {} violation(s)", .0.len())]
    InvalidPayload(Vec<FieldError>),

    /// Storage could not be reached
    #[error("storage unavailable")]
    Unavailable,

    #[error("internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::ServiceMisconfigured | ApiError::Unavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::InvalidPayload(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Single-field validation error.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::InvalidPayload(vec![FieldError::new(field, message)])
    }
}

impl From<SignatureError> for ApiError {
    fn from(err: SignatureError) -> Self {
        match err {
            SignatureError::Missing | SignatureError::Mismatch => ApiError::Unauthorized,
            SignatureError::SecretNotConfigured => ApiError::ServiceMisconfigured,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        if err.is_unavailable() {
            ApiError::Unavailable
        } else {
            ApiError::Internal
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::InvalidPayload(errors) => json!({ "detail": errors }),
            other => json!({ "detail": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
