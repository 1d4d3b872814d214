//! Error handling for the gateway.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// Malformed request, e.g. an unparseable last-known-id token.
    BadRequest(String),
    /// The `Accept` header asks for a representation we do not serve.
    NotAcceptable(String),
    /// Internal server error.
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error flag.
    pub error: bool,
    /// Error code.
    pub code: String,
    /// Error message.
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Unsupported Accept values are reported as a plain bad request.
        let (status, code, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            AppError::NotAcceptable(msg) => (StatusCode::BAD_REQUEST, "UNSUPPORTED_ACCEPT", msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
        };

        if status.is_server_error() {
            tracing::error!(code, message = %message, "request failed");
        }

        let body = ErrorResponse {
            error: true,
            code: code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<flightfeed_core::Error> for AppError {
    fn from(err: flightfeed_core::Error) -> Self {
        match err {
            flightfeed_core::Error::InvalidIdentifier(token) => {
                AppError::BadRequest(format!("malformed last-known-id `{token}`"))
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}
