//! Service error types with HTTP status code mapping.
//!
//! [`SettlementError`] is the central error type for the service. Each
//! variant maps to a specific HTTP status code and structured JSON error
//! response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "invalid request: amount must be non-negative",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`SettlementError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category          | HTTP Status                |
/// |-----------|-------------------|----------------------------|
/// | 1000–1999 | Validation        | 400 Bad Request            |
/// | 2000–2999 | Not Found         | 404 Not Found              |
/// | 3000–3999 | Server/External   | 500 / 502                  |
/// | 4000–4999 | Domain State      | 422 Unprocessable Entity   |
/// | 4100      | Webhook Signature | 401 Unauthorized           |
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Unsupported booking status or source string.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// Booking with the given ID was not found.
    #[error("booking not found: {0}")]
    BookingNotFound(uuid::Uuid),

    /// Payout with the given ID was not found.
    #[error("payout not found: {0}")]
    PayoutNotFound(uuid::Uuid),

    /// Partner with the given ID was not found.
    #[error("partner not found: {0}")]
    PartnerNotFound(uuid::Uuid),

    /// User with the given ID was not found.
    #[error("user not found: {0}")]
    UserNotFound(uuid::Uuid),

    /// A state transition that the booking or payout lifecycle forbids.
    #[error("invalid transition from '{from}' to '{to}'")]
    InvalidTransition {
        /// Current state.
        from: String,
        /// Requested state.
        to: String,
    },

    /// Inbound webhook signature could not be verified.
    #[error("webhook signature rejected: {0}")]
    WebhookSignature(String),

    /// Payments processor call failed in a way that is not a transfer
    /// rejection (e.g. the request could not even be built).
    #[error("processor error: {0}")]
    Processor(String),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SettlementError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidValue(_) => 1002,
            Self::BookingNotFound(_) => 2001,
            Self::PayoutNotFound(_) => 2002,
            Self::PartnerNotFound(_) => 2003,
            Self::UserNotFound(_) => 2004,
            Self::InvalidTransition { .. } => 4001,
            Self::WebhookSignature(_) => 4100,
            Self::Processor(_) => 3002,
            Self::PersistenceError(_) => 3001,
            Self::Internal(_) => 3000,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidValue(_) => StatusCode::BAD_REQUEST,
            Self::BookingNotFound(_)
            | Self::PayoutNotFound(_)
            | Self::PartnerNotFound(_)
            | Self::UserNotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::WebhookSignature(_) => StatusCode::UNAUTHORIZED,
            Self::Processor(_) => StatusCode::BAD_GATEWAY,
            Self::PersistenceError(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for SettlementError {
    fn from(err: sqlx::Error) -> Self {
        Self::PersistenceError(err.to_string())
    }
}

impl IntoResponse for SettlementError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_map_to_400() {
        let err = SettlementError::InvalidRequest("amount must be non-negative".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), 1001);
    }

    #[test]
    fn not_found_errors_map_to_404() {
        let err = SettlementError::BookingNotFound(uuid::Uuid::new_v4());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.error_code(), 2001);
    }

    #[test]
    fn webhook_signature_maps_to_401() {
        let err = SettlementError::WebhookSignature("timestamp outside tolerance".to_string());
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.error_code(), 4100);
    }

    #[test]
    fn invalid_transition_maps_to_422() {
        let err = SettlementError::InvalidTransition {
            from: "cancelled".to_string(),
            to: "confirmed".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.to_string().contains("cancelled"));
    }
}
