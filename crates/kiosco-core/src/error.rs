//! # Error Types
//!
//! Domain-specific error types for kiosco-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  kiosco-core errors (this file)                                        │
//! │  ├── CoreError        - Shift and payment rule violations              │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  kiosco-db errors (separate crate)                                     │
//! │  └── DbError          - Storage failures, stale writes                 │
//! │                                                                         │
//! │  Register errors (in app)                                              │
//! │  └── RegisterError    - What the cashier sees (code + message)         │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → RegisterError           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Messages name the violated constraint and the amounts involved
//! 3. Errors are enum variants, never String
//! 4. A rejected operation never leaves partial state behind

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Shift ledger rule violations.
///
/// Every variant is raised BEFORE anything is mutated, so the caller can
/// surface it and discard the attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A shift is already open.
    ///
    /// ## When This Occurs
    /// - An administrator tries to open a shift while another one is active
    /// - Two registers race to open a shift on the same store
    #[error("a shift is already active (opened by {admin_name})")]
    ShiftAlreadyActive { admin_name: String },

    /// The operation needs an active shift and there is none.
    ///
    /// ## When This Occurs
    /// - Checkout attempted before opening a shift
    /// - Any mutation on a shift that has already been closed
    #[error("no active shift")]
    NoActiveShift,

    /// A cash outflow exceeds cash on hand.
    ///
    /// ## User Workflow
    /// ```text
    /// Retiro de caja: $2000
    ///      │
    ///      ▼
    /// Recompute arqueo: efectivo = $1300
    ///      │
    ///      ▼
    /// InsufficientCash { available: $1300.00, requested: $2000.00 }
    ///      │
    ///      ▼
    /// UI shows: "insufficient cash: available $1300.00, requested $2000.00"
    /// ```
    #[error("insufficient cash: available {available}, requested {requested}")]
    InsufficientCash { available: Money, requested: Money },

    /// A combined payment split does not add up to the sale total.
    #[error("payment mismatch: sale total is {expected}, payment split adds up to {received}")]
    PaymentMismatch { expected: Money, received: Money },

    /// Checkout with no line items.
    #[error("a sale needs at least one item")]
    EmptySale,

    /// Validation error (wraps ValidationError).
    #[error("{0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Amount above [`crate::MAX_AMOUNT`].
    #[error("{field} must not exceed {max}")]
    TooLarge { field: String, max: Money },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., malformed amount, unknown date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
