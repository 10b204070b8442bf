use crate::error::PaymentError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt::Display;

/// Error body returned by every endpoint: `{"error": ..., "details": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

/// Message of `err`, or `Unknown error` when it carries none.
pub fn details_of(err: &dyn Display) -> String {
    let message = err.to_string();
    if message.trim().is_empty() {
        "Unknown error".to_string()
    } else {
        message
    }
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>, details: Option<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: error.into(),
                details,
            },
        }
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error, None)
    }

    /// Maps a failed operation to a response. `context` names the operation
    /// for 500s, e.g. `Failed to capture payment`.
    pub fn from_payment_error(context: &str, err: PaymentError) -> Self {
        match &err {
            PaymentError::ValidationError(message) => Self::bad_request(message.clone()),
            PaymentError::WebhookVerificationError(_) => {
                Self::new(StatusCode::BAD_REQUEST, context, Some(details_of(&err)))
            }
            PaymentError::DistributionNotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, details_of(&err), None)
            }
            PaymentError::NoHoldbackAvailableError => {
                Self::new(StatusCode::CONFLICT, details_of(&err), None)
            }
            _ => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                context,
                Some(details_of(&err)),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
