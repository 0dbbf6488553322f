//! # kiosco-core: Shift Ledger Logic for Kiosco Digital
//!
//! Everything the register knows about money lives here: how a sale is
//! split across payment rails, what a shift's totals are, when cash may
//! leave the drawer and what a closed shift looks like. No I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Kiosco Digital Architecture                        │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  kiosco-register (front desk)                   │   │
//! │  │   open ──► sell ──► withdraw / expense ──► close ──► export     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ kiosco-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐          │   │
//! │  │   │ payment  │ │  ledger  │ │  guard   │ │  shift   │          │   │
//! │  │   │normalizer│ │aggregator│ │ cash out │ │lifecycle │          │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────┘          │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐                       │   │
//! │  │   │ closure  │ │  export  │ │  legacy  │                       │   │
//! │  │   │ history  │ │   CSV    │ │ backfill │                       │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘                       │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO CLOCK • NO COUNTERS • INTEGER CENTAVOS           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                kiosco-db (record store, SQLite)                 │   │
//! │  │      shifts, sales, withdrawals, expenses, closures, counters   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Money in centavos
//! - [`types`] - Records (Sale, Withdrawal, Expense, Shift, TurnClosure)
//! - [`payment`] - Payment breakdown normalizer
//! - [`ledger`] - Transaction list and shift totals
//! - [`guard`] - Cash outflow check
//! - [`shift`] - Shift lifecycle
//! - [`closure`] - Closure history filters and summaries
//! - [`export`] - CSV exports
//! - [`legacy`] - Backfill of the old JSON backup
//! - [`validation`] - Input rules
//! - [`error`] - Domain errors
//!
//! ## Example Usage
//!
//! ```rust
//! use kiosco_core::money::Money;
//! use kiosco_core::payment::normalize_breakdown;
//! use kiosco_core::types::PaymentMethod;
//!
//! let split = normalize_breakdown(Money::from_pesos(300), PaymentMethod::Cash, None);
//! assert_eq!(split.cash, Money::from_pesos(300));
//! assert_eq!(split.sum(), Money::from_pesos(300));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod closure;
pub mod error;
pub mod export;
pub mod guard;
pub mod ledger;
pub mod legacy;
pub mod money;
pub mod payment;
pub mod shift;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use ledger::{LedgerEntry, ShiftTotals, TransactionKind};
pub use money::Money;
pub use payment::PaymentBreakdown;
pub use shift::{OpenShift, SaleDraft, ShiftLedger, Stamp};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Largest amount a single record may carry: $1,000,000,000.00.
///
/// Keeps every sum the ledger forms well inside `i64` centavos.
pub const MAX_AMOUNT: Money = Money::from_cents(100_000_000_000);

/// Maximum line items in a single sale.
pub const MAX_SALE_ITEMS: usize = 100;

/// Maximum quantity of a single line item.
///
/// ## Business Reason
/// Catches typing 1000 instead of 10 at the register.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum length of administrator and customer names, in characters.
pub const MAX_NAME_LEN: usize = 80;

/// Maximum length of a lot number.
pub const MAX_LOT_LEN: usize = 20;

/// Maximum length of free text (withdrawal notes, expense concept/detail).
pub const MAX_TEXT_LEN: usize = 500;
