use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

use crate::lifecycle::LifecycleError;
use crate::utils::response::error as error_response;

const UNIQUE_VIOLATION: &str = "23505";
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Lost the race to sell a ticket.
    #[error("Ticket already sold")]
    AlreadySold,

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Internal server error")]
    InternalServerError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) | AppError::AlreadySold => StatusCode::CONFLICT,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::AlreadySold => "ALREADY_SOLD",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::ExternalServiceError(_) => "EXTERNAL_SERVICE_ERROR",
            AppError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn not_found(what: &str, id: impl std::fmt::Display) -> Self {
        AppError::NotFound(format!("{} with id '{}' was not found", what, id))
    }

    /// Maps constraint and serialization failures of a write to `Conflict`
    /// with a message the client can show. Anything else stays a database
    /// error.
    pub fn from_write(err: sqlx::Error, conflict_message: &str) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            match db_err.code().as_deref() {
                Some(UNIQUE_VIOLATION) => return AppError::Conflict(conflict_message.to_string()),
                Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) => {
                    return AppError::Conflict(
                        "The listing changed while you were acting on it, please retry".to_string(),
                    )
                }
                _ => {}
            }
        }
        AppError::DatabaseError(err)
    }

    fn log(&self) {
        match self {
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg) => {
                warn!(error = ?self, message = %msg, "Request rejected");
            }
            AppError::Conflict(msg) => {
                warn!(message = %msg, "Write conflict");
            }
            AppError::AlreadySold => {
                warn!("Accept lost the race for a ticket");
            }
            AppError::ExternalServiceError(msg) | AppError::InternalServerError(msg) => {
                error!(error = ?self, message = %msg, "Application error");
            }
            AppError::DatabaseError(e) => {
                error!(error = ?e, "Database error");
            }
        }
    }
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        let message = err.to_string();
        match err {
            LifecycleError::AlreadySold => AppError::AlreadySold,
            LifecycleError::NotSeller
            | LifecycleError::NotBuyer
            | LifecycleError::NotParticipant
            | LifecycleError::Unverified => AppError::Forbidden(message),
            LifecycleError::DuplicateOffer
            | LifecycleError::TicketRemoved
            | LifecycleError::InvalidTicketTransition { .. }
            | LifecycleError::InvalidOfferTransition { .. }
            | LifecycleError::ThreadClosed => AppError::Conflict(message),
            LifecycleError::OwnTicket
            | LifecycleError::NonPositiveAmount
            | LifecycleError::AmountTooLarge
            | LifecycleError::TooManyDecimals
            | LifecycleError::MissingPhone
            | LifecycleError::NoCompletedPurchase
            | LifecycleError::SelfRating
            | LifecycleError::ScoreOutOfRange
            | LifecycleError::EmptyMessage
            | LifecycleError::MessageTooLong => AppError::ValidationError(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Log internal details
        self.log();

        // Only expose high-level message to the client
        let public_message = match &self {
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => msg.clone(),
            AppError::AlreadySold => "This ticket has already been sold".to_string(),
            AppError::ExternalServiceError(_) => "An upstream service failed".to_string(),
            AppError::InternalServerError(_) => "Something went wrong".to_string(),
            AppError::DatabaseError(_) => "A database error occurred".to_string(),
        };

        error_response(code, public_message, None, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{OfferEvent, TicketEvent};
    use crate::models::{OfferStatus, TicketStatus};

    #[test]
    fn test_already_sold_is_its_own_kind() {
        let err = AppError::from(LifecycleError::AlreadySold);
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "ALREADY_SOLD");
    }

    #[test]
    fn test_lifecycle_errors_map_to_http_kinds() {
        assert_eq!(
            AppError::from(LifecycleError::NotSeller).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::from(LifecycleError::NonPositiveAmount).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(LifecycleError::InvalidOfferTransition {
                from: OfferStatus::Accepted,
                event: OfferEvent::Decline,
            })
            .code(),
            "CONFLICT"
        );
        assert_eq!(
            AppError::from(LifecycleError::InvalidTicketTransition {
                from: TicketStatus::Available,
                event: TicketEvent::OfferAccepted,
            })
            .code(),
            "CONFLICT"
        );
    }

    #[test]
    fn test_non_database_write_error_stays_database_error() {
        let err = AppError::from_write(sqlx::Error::RowNotFound, "duplicate");
        assert_eq!(err.code(), "DATABASE_ERROR");
    }
}
