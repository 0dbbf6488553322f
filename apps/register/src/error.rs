//! # Register Error Type
//!
//! What a caller of [`crate::Register`] sees when an operation fails.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  ValidationError ──► CoreError ──► DbError ──► RegisterError            │
//! │                                                  { code, message }      │
//! │                                                                         │
//! │  Business rule?  ── message names the violated constraint               │
//! │                     "insufficient cash: available $1300.00, ..."        │
//! │                                                                         │
//! │  Storage fault?  ── logged at error, generic message to the user        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Serialized for UI callers:
//! ```json
//! { "code": "INSUFFICIENT_CASH", "message": "insufficient cash: available $1300.00, requested $2000.00" }
//! ```

use serde::Serialize;
use ts_rs::TS;

use crate::config::ConfigError;
use kiosco_core::CoreError;
use kiosco_db::DbError;

/// Error returned by every register operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RegisterError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Bad input shape or range
    ValidationError,

    /// A shift is already active, or legacy data was already imported
    Conflict,

    NoActiveShift,

    InsufficientCash,

    /// Combined payment split does not add up to the total
    PaymentMismatch,

    /// Another process changed the shift first; reload and retry
    StaleWrite,

    StorageError,

    NotFound,

    /// Irreversible action called without its confirmation flag
    ConfirmationRequired,

    ConfigError,

    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::NoActiveShift => "NO_ACTIVE_SHIFT",
            ErrorCode::InsufficientCash => "INSUFFICIENT_CASH",
            ErrorCode::PaymentMismatch => "PAYMENT_MISMATCH",
            ErrorCode::StaleWrite => "STALE_WRITE",
            ErrorCode::StorageError => "STORAGE_ERROR",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::ConfirmationRequired => "CONFIRMATION_REQUIRED",
            ErrorCode::ConfigError => "CONFIG_ERROR",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

impl RegisterError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        RegisterError {
            code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        RegisterError::new(ErrorCode::ValidationError, message)
    }

    pub fn confirmation_required(message: impl Into<String>) -> Self {
        RegisterError::new(ErrorCode::ConfirmationRequired, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        RegisterError::new(ErrorCode::Internal, message)
    }

    fn storage(message: &str, cause: impl std::fmt::Display) -> Self {
        tracing::error!(error = %cause, "{}", message);
        RegisterError::new(ErrorCode::StorageError, message)
    }
}

impl From<CoreError> for RegisterError {
    fn from(err: CoreError) -> Self {
        let code = match &err {
            CoreError::ShiftAlreadyActive { .. } => ErrorCode::Conflict,
            CoreError::NoActiveShift => ErrorCode::NoActiveShift,
            CoreError::InsufficientCash { .. } => ErrorCode::InsufficientCash,
            CoreError::PaymentMismatch { .. } => ErrorCode::PaymentMismatch,
            CoreError::EmptySale | CoreError::Validation(_) => ErrorCode::ValidationError,
        };
        RegisterError::new(code, err.to_string())
    }
}

impl From<DbError> for RegisterError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Domain(e) => e.into(),
            DbError::NotFound { .. } => RegisterError::new(ErrorCode::NotFound, err.to_string()),
            DbError::StaleWrite { .. } => RegisterError::new(ErrorCode::StaleWrite, err.to_string()),
            DbError::UniqueViolation { .. } | DbError::AlreadyImported => {
                RegisterError::new(ErrorCode::Conflict, err.to_string())
            }
            DbError::Corrupt { .. } => RegisterError::storage("Stored data is damaged", &err),
            DbError::ConnectionFailed(_) => RegisterError::storage("Storage is unavailable", &err),
            DbError::MigrationFailed(_) => {
                RegisterError::storage("Storage schema could not be updated", &err)
            }
            DbError::QueryFailed(_) | DbError::ForeignKeyViolation { .. } => {
                RegisterError::storage("Storage operation failed", &err)
            }
            DbError::TransactionFailed(_) => {
                RegisterError::storage("Storage transaction failed", &err)
            }
            DbError::PoolExhausted => RegisterError::storage("Storage is busy", &err),
            DbError::Internal(e) => {
                tracing::error!(error = %e, "Internal storage error");
                RegisterError::internal("Internal error")
            }
        }
    }
}

impl From<ConfigError> for RegisterError {
    fn from(err: ConfigError) -> Self {
        RegisterError::new(ErrorCode::ConfigError, err.to_string())
    }
}

impl std::fmt::Display for RegisterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for RegisterError {}

#[cfg(test)]
mod tests {
    use super::*;
    use kiosco_core::Money;

    #[test]
    fn test_business_errors_keep_their_message() {
        let err: RegisterError = DbError::Domain(CoreError::InsufficientCash {
            available: Money::from_pesos(1300),
            requested: Money::from_pesos(2000),
        })
        .into();
        assert_eq!(err.code, ErrorCode::InsufficientCash);
        assert_eq!(
            err.message,
            "insufficient cash: available $1300.00, requested $2000.00"
        );
    }

    #[test]
    fn test_storage_errors_are_generic() {
        let err: RegisterError = DbError::QueryFailed("disk I/O error at page 7".to_string()).into();
        assert_eq!(err.code, ErrorCode::StorageError);
        assert!(!err.message.contains("page 7"));
    }

    #[test]
    fn test_serializes_screaming_code() {
        let err = RegisterError::confirmation_required("confirm");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "CONFIRMATION_REQUIRED");
        assert_eq!(json["code"], err.code.as_str());
        assert_eq!(err.to_string(), "[CONFIRMATION_REQUIRED] confirm");
    }

    #[test]
    fn test_conflicts() {
        let err: RegisterError = DbError::Domain(CoreError::ShiftAlreadyActive {
            admin_name: "Marta".to_string(),
        })
        .into();
        assert_eq!(err.code, ErrorCode::Conflict);

        let err: RegisterError = DbError::AlreadyImported.into();
        assert_eq!(err.code, ErrorCode::Conflict);

        let err: RegisterError = DbError::stale("Shift", "s-1").into();
        assert_eq!(err.code, ErrorCode::StaleWrite);
    }
}
