use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Quantity {quantity} is outside 1..={max}")]
    InvalidQuantity { quantity: i64, max: u32 },

    #[error("Unknown ticket tier '{0}'")]
    UnknownTier(String),

    #[error("Malformed credential: {0}")]
    MalformedCredential(String),

    #[error("Payment rejected: {0}")]
    PaymentRejected(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Ticket {0} not found")]
    TicketNotFound(String),

    #[error("Ticket {ticket_id} is already checked in")]
    AlreadyCheckedIn {
        ticket_id: Uuid,
        checked_in_at: Option<DateTime<Utc>>,
        checked_in_by: Option<String>,
    },

    #[error("Ticket {0} is not checked in")]
    NotCheckedIn(Uuid),

    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Internal server error")]
    InternalServerError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_)
            | AppError::InvalidQuantity { .. }
            | AppError::UnknownTier(_)
            | AppError::MalformedCredential(_)
            | AppError::PaymentRejected(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::TicketNotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyCheckedIn { .. } | AppError::NotCheckedIn(_) => StatusCode::CONFLICT,
            AppError::GatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::InvalidQuantity { .. } => "INVALID_QUANTITY",
            AppError::UnknownTier(_) => "UNKNOWN_TIER",
            AppError::MalformedCredential(_) => "MALFORMED_CREDENTIAL",
            AppError::PaymentRejected(_) => "PAYMENT_REJECTED",
            AppError::AuthError(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::TicketNotFound(_) => "TICKET_NOT_FOUND",
            AppError::AlreadyCheckedIn { .. } => "ALREADY_CHECKED_IN",
            AppError::NotCheckedIn(_) => "NOT_CHECKED_IN",
            AppError::GatewayUnavailable(_) => "GATEWAY_UNAVAILABLE",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Message safe to hand to the client.
    pub fn public_message(&self) -> String {
        match self {
            AppError::ValidationError(msg)
            | AppError::MalformedCredential(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::GatewayUnavailable(msg) => msg.clone(),
            AppError::PaymentRejected(_) => "Payment could not be verified".to_string(),
            AppError::AlreadyCheckedIn { .. } => {
                "Ticket is valid but already checked in".to_string()
            }
            AppError::DatabaseError(_) => "A database error occurred".to_string(),
            AppError::InternalServerError(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            AppError::InvalidQuantity { quantity, max } => {
                Some(json!({ "quantity": quantity, "min": 1, "max": max }))
            }
            AppError::AlreadyCheckedIn {
                ticket_id,
                checked_in_at,
                checked_in_by,
            } => Some(json!({
                "ticketId": ticket_id,
                "checkedInAt": checked_in_at,
                "checkedInBy": checked_in_by,
            })),
            _ => None,
        }
    }

    fn log(&self) {
        match self {
            AppError::DatabaseError(e) => {
                error!(error = ?e, "Database error");
            }
            AppError::InternalServerError(msg) | AppError::GatewayUnavailable(msg) => {
                error!(code = self.code(), message = %msg, "Application error");
            }
            AppError::PaymentRejected(reason) => {
                warn!(reason = %reason, "Payment verification rejected");
            }
            _ => {
                warn!(code = self.code(), error = %self, "Request failed");
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        self.log();

        error_response(code, self.public_message(), self.details(), status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_conflicts_are_distinct_from_not_found() {
        let already = AppError::AlreadyCheckedIn {
            ticket_id: Uuid::new_v4(),
            checked_in_at: Some(Utc::now()),
            checked_in_by: Some("gate-1".to_string()),
        };
        let missing = AppError::TicketNotFound("abc".to_string());

        assert_eq!(already.status_code(), StatusCode::CONFLICT);
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
        assert_ne!(already.code(), missing.code());
        assert!(already.details().is_some());
    }

    #[test]
    fn test_rejection_message_hides_reason() {
        let err = AppError::PaymentRejected("signature mismatch".to_string());
        assert_eq!(err.code(), "PAYMENT_REJECTED");
        assert!(!err.public_message().contains("signature"));
    }

    #[test]
    fn test_auth_and_forbidden_codes() {
        assert_eq!(
            AppError::AuthError("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::Forbidden("x".into()).code(), "FORBIDDEN");
    }
}
