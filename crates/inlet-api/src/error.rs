//! HTTP error mapping for API handlers.
//!
//! Wraps the core error taxonomy so handlers can use `?` and still
//! produce the structured error body with a stable code and the right
//! status for each failure class.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use inlet_core::IntakeError;
use serde::Serialize;

/// Error response with code and message.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error details including code and message
    pub error: ErrorDetail,
}

/// Detailed error information.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Stable machine-readable error code
    pub code: String,
    /// Human-readable error description
    pub message: String,
}

/// Error type returned by API handlers.
#[derive(Debug)]
pub struct ApiError(pub IntakeError);

impl ApiError {
    /// HTTP status for the wrapped error.
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            IntakeError::UnknownSource { .. } | IntakeError::EventNotFound { .. } => {
                StatusCode::NOT_FOUND
            },
            IntakeError::MissingSignature { .. }
            | IntakeError::MalformedPayload { .. }
            | IntakeError::UnknownTask { .. } => StatusCode::BAD_REQUEST,
            IntakeError::InvalidSignature => StatusCode::UNAUTHORIZED,
            IntakeError::VerifierUnavailable { .. } => StatusCode::NOT_IMPLEMENTED,
            IntakeError::DuplicateSource { .. }
            | IntakeError::TransientProcessing { .. }
            | IntakeError::RetriesExhausted { .. }
            | IntakeError::Database(_)
            | IntakeError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable code for the wrapped error.
    pub fn code(&self) -> &'static str {
        match &self.0 {
            IntakeError::DuplicateSource { .. } => "duplicate_source",
            IntakeError::UnknownSource { .. } => "unknown_source",
            IntakeError::UnknownTask { .. } => "unknown_task",
            IntakeError::VerifierUnavailable { .. } => "verifier_unavailable",
            IntakeError::MissingSignature { .. } => "missing_signature",
            IntakeError::InvalidSignature => "invalid_signature",
            IntakeError::MalformedPayload { .. } => "malformed_payload",
            IntakeError::TransientProcessing { .. } => "transient_processing",
            IntakeError::RetriesExhausted { .. } => "retries_exhausted",
            IntakeError::EventNotFound { .. } => "event_not_found",
            IntakeError::Database(_) => "database_error",
            IntakeError::Other(_) => "internal_error",
        }
    }
}

impl From<IntakeError> for ApiError {
    fn from(error: IntakeError) -> Self {
        Self(error)
    }
}

impl From<inlet_queue::QueueError> for ApiError {
    fn from(error: inlet_queue::QueueError) -> Self {
        Self(IntakeError::Other(anyhow::anyhow!(error)))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal detail stays in the logs, not in the response body
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "internal server error".to_string()
        } else {
            self.0.to_string()
        };

        let body = ErrorResponse {
            error: ErrorDetail { code: self.code().to_string(), message },
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_failure_class() {
        assert_eq!(
            ApiError(IntakeError::UnknownSource { source: "gitlab".into() }).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError(IntakeError::MissingSignature { header: "x-hub-signature-256".into() })
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError(IntakeError::InvalidSignature).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError(IntakeError::VerifierUnavailable { source: "square".into() }).status(),
            StatusCode::NOT_IMPLEMENTED
        );
        assert_eq!(
            ApiError(IntakeError::Database(sqlx::Error::Protocol("down".into()))).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_errors_do_not_leak_detail() {
        let error = ApiError(IntakeError::Database(sqlx::Error::Protocol(
            "password authentication failed".into(),
        )));

        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
