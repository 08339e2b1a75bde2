//! HTTP-facing error type and its OpenAI-shaped response body.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::debug;

use crate::body::BodyReadError;
use crate::models::ErrorResponse;

/// Message returned with the simulated 402.
pub const INSUFFICIENT_QUOTA_MESSAGE: &str = "You exceeded your current quota, please check your plan and billing details. For more information on this error, read the docs: https://platform.openai.com/docs/guides/error-codes/api-errors.";

/// Errors the server reports to clients.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The body stream failed before it was fully read.
    #[error("Failed to read request body")]
    BodyRead,

    /// The body exceeded the buffering cap.
    #[error("Request body exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    /// The body is not the JSON the interceptor needs.
    #[error("Failed to parse request body")]
    MalformedBody,

    /// The body failed schema validation in a typed handler.
    #[error("{0}")]
    InvalidRequest(String),

    /// Simulated quota exhaustion.
    #[error("{}", INSUFFICIENT_QUOTA_MESSAGE)]
    InsufficientQuota,

    /// A streaming response body could not be constructed.
    #[error("Streaming not supported")]
    StreamingUnsupported,

    /// The operation is declared but has no mock behavior.
    #[error("Operation '{0}' is not implemented by this mock")]
    NotImplemented(&'static str),
}

impl ApiError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BodyRead | Self::MalformedBody | Self::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::InsufficientQuota => StatusCode::PAYMENT_REQUIRED,
            Self::StreamingUnsupported => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
        }
    }

    const fn error_type(&self) -> &'static str {
        match self {
            Self::BodyRead
            | Self::PayloadTooLarge { .. }
            | Self::MalformedBody
            | Self::InvalidRequest(_) => "invalid_request_error",
            Self::InsufficientQuota => "insufficient_quota",
            Self::StreamingUnsupported | Self::NotImplemented(_) => "server_error",
        }
    }

    const fn code(&self) -> Option<&'static str> {
        match self {
            Self::InsufficientQuota => Some("insufficient_quota"),
            Self::NotImplemented(_) => Some("not_implemented"),
            _ => None,
        }
    }

    /// The JSON body sent for this error.
    pub fn body(&self) -> ErrorResponse {
        match self.code() {
            Some(code) => ErrorResponse::with_code(self.to_string(), self.error_type(), code),
            None => ErrorResponse::new(self.to_string(), self.error_type()),
        }
    }
}

impl From<BodyReadError> for ApiError {
    fn from(err: BodyReadError) -> Self {
        match err {
            BodyReadError::TooLarge { limit } => Self::PayloadTooLarge { limit },
            BodyReadError::Stream(_) => Self::BodyRead,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        debug!(status = %status, error = %self, "Responding with error");
        (status, Json(self.body())).into_response()
    }
}
