//! Error taxonomy of the booking & earnings core.
//!
//! Business-rule violations are recoverable and leave no side effects.
//! `Infrastructure` is the only fatal kind and is kept distinct so callers can
//! tell "you may not" from "we could not".

use thiserror::Error;

use crate::Money;

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Malformed amount, unsupported payment method, missing field
    #[error("Validation failed: {field} - {reason}")]
    Validation { field: String, reason: String },

    /// Booking, host or earning absent
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// Actor lacks the role or ownership for the operation
    #[error("Not authorized: {reason}")]
    Authorization { reason: String },

    /// Illegal state transition, or a concurrent writer won the race
    #[error("State conflict: {reason}")]
    StateConflict { reason: String },

    /// Withdrawal exceeds the available balance
    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: Money, available: Money },

    /// Persistence unavailable or returned garbage
    #[error("Infrastructure error: {message}")]
    Infrastructure { message: String },
}

impl CoreError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Authorization {
            reason: reason.into(),
        }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::StateConflict {
            reason: reason.into(),
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        Self::Infrastructure {
            message: message.into(),
        }
    }

    /// Stable machine-readable code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Authorization { .. } => "AUTHORIZATION_ERROR",
            Self::StateConflict { .. } => "STATE_CONFLICT",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::Infrastructure { .. } => "INFRASTRUCTURE_ERROR",
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Infrastructure { .. })
    }
}
