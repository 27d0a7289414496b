use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::DbErr;
use serde::Serialize;
use uuid::Uuid;

pub type AppResult<T> = Result<T, AppError>;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidParam {
    pub name: String,
    pub reason: String,
}

impl InvalidParam {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid purchase request ({} problems)", .0.len())]
    Validation(Vec<InvalidParam>),

    #[error("Seat {0} is already taken")]
    SeatAlreadyTaken(Uuid),

    #[error("Payment gateway unavailable: {0}")]
    PaymentGatewayUnavailable(String),

    #[error("Unknown payment session: {0}")]
    UnknownSession(String),

    #[error("Payment session {0} belongs to an order that was already released")]
    StaleSession(String),

    #[error("Operation timed out")]
    Timeout,

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) | AppError::UnknownSession(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) | AppError::SeatAlreadyTaken(_) | AppError::StaleSession(_) => {
                StatusCode::CONFLICT
            }
            AppError::PaymentGatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::Timeout => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable problem type, used by clients to tell error classes apart.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not-found",
            AppError::BadRequest(_) => "bad-request",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::Conflict(_) => "conflict",
            AppError::Validation(_) => "invalid-purchase-data",
            AppError::SeatAlreadyTaken(_) => "taken-seat",
            AppError::PaymentGatewayUnavailable(_) => "payment",
            AppError::UnknownSession(_) => "non-existing-session",
            AppError::StaleSession(_) => "stale-session",
            AppError::Timeout => "timeout",
            AppError::Database(_) | AppError::Internal(_) => "internal",
        }
    }

    /// Whether the same request may succeed if retried later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Timeout | AppError::PaymentGatewayUnavailable(_)
        )
    }
}

#[derive(Debug, Serialize)]
struct Problem {
    #[serde(rename = "type")]
    kind: &'static str,
    title: String,
    status: u16,
    detail: String,
    retryable: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    invalid_params: Vec<InvalidParam>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let detail = match &self {
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                "Internal server error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                "Internal server error".to_string()
            }
            AppError::PaymentGatewayUnavailable(msg) => {
                tracing::warn!(error = %msg, "Payment gateway failure");
                "The payment provider is unavailable, please try again later".to_string()
            }
            other => other.to_string(),
        };

        let body = Problem {
            kind: self.kind(),
            title: status
                .canonical_reason()
                .unwrap_or("Error")
                .to_string(),
            status: status.as_u16(),
            detail,
            retryable: self.is_retryable(),
            invalid_params: match self {
                AppError::Validation(params) => params,
                _ => Vec::new(),
            },
        };

        (status, Json(body)).into_response()
    }
}
