//! # Domain Types
//!
//! Core domain types used throughout the kiosk ledger.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Shift       │   │      Sale       │   │   Withdrawal    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │◄──│  shift_id (FK)  │   │  shift_id (FK)  │──┐    │
//! │  │  admin_name     │   │  receipt_number │   │  withdrawal_id  │  │    │
//! │  │  status         │   │  items[]        │   │  amount, note   │  │    │
//! │  │  version        │   │  breakdown      │   └─────────────────┘  │    │
//! │  └─────────────────┘   └─────────────────┘   ┌─────────────────┐  │    │
//! │          ▲                                   │    Expense      │  │    │
//! │          │                                   │  shift_id (FK)  │──┤    │
//! │          └───────────────────────────────────┴─────────────────┘◄─┘    │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  TurnClosure: frozen copy of one shift's records + totals       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every record has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (`KD-2025-000042`, `RETIRO-0007`) - printed on receipts

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::ledger::ShiftTotals;
use crate::money::Money;
use crate::payment::PaymentBreakdown;

/// Customer-name marker the kiosk used for the opening cash pseudo-sale
/// before sales carried an explicit kind.
pub const INITIAL_CASH_SENTINEL: &str = "Caja Inicial";

/// Product category of the opening cash pseudo-sale.
pub const INITIAL_CASH_CATEGORY: &str = "Administrativo";

// =============================================================================
// Receipt Numbers
// =============================================================================

/// Formats a sale/expense/withdrawal receipt number: `KD-<year>-<6-digit seq>`.
///
/// ## Example
/// ```rust
/// use kiosco_core::types::format_receipt_number;
///
/// assert_eq!(format_receipt_number(2025, 42), "KD-2025-000042");
/// ```
pub fn format_receipt_number(year: i32, seq: i64) -> String {
    format!("KD-{year}-{seq:06}")
}

/// Formats a cash withdrawal id: `RETIRO-<4-digit seq>`.
///
/// ## Example
/// ```rust
/// use kiosco_core::types::format_withdrawal_id;
///
/// assert_eq!(format_withdrawal_id(7), "RETIRO-0007");
/// ```
pub fn format_withdrawal_id(seq: i64) -> String {
    format!("RETIRO-{seq:04}")
}

/// Receipt number for a record created at `at`.
pub fn receipt_number_at(at: DateTime<Utc>, seq: i64) -> String {
    format_receipt_number(at.year(), seq)
}

// =============================================================================
// Payment Method
// =============================================================================

/// The rail a sale was paid on.
///
/// Serialized in English (`cash`, `account_credit`, ...). Displayed with
/// the kiosk's Spanish codes, which `FromStr` also accepts.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash (efectivo).
    Cash,
    /// Bank transfer (transferencia).
    Transfer,
    /// Billed to the customer's lot (expensa).
    AccountCredit,
    /// Split across more than one rail (combinado).
    Combined,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 4] = [
        PaymentMethod::Cash,
        PaymentMethod::Transfer,
        PaymentMethod::AccountCredit,
        PaymentMethod::Combined,
    ];

    /// Spanish code as stored by the kiosk (`efectivo`, `combinado`, ...).
    pub const fn code(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "efectivo",
            PaymentMethod::Transfer => "transferencia",
            PaymentMethod::AccountCredit => "expensa",
            PaymentMethod::Combined => "combinado",
        }
    }

    /// Capitalized label used when listing the rails of a combined payment.
    pub const fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Efectivo",
            PaymentMethod::Transfer => "Transferencia",
            PaymentMethod::AccountCredit => "Expensa",
            PaymentMethod::Combined => "Combinado",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "efectivo" | "cash" => Ok(PaymentMethod::Cash),
            "transferencia" | "transfer" => Ok(PaymentMethod::Transfer),
            "expensa" | "account_credit" => Ok(PaymentMethod::AccountCredit),
            "combinado" | "combined" => Ok(PaymentMethod::Combined),
            _ => Err(ValidationError::NotAllowed {
                field: "payment_method".to_string(),
                allowed: PaymentMethod::ALL.iter().map(|m| m.code().to_string()).collect(),
            }),
        }
    }
}

// =============================================================================
// Sale Kind
// =============================================================================

/// Distinguishes real checkouts from the opening cash pseudo-sale.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleKind {
    /// A checkout at the kiosk.
    #[default]
    Ordinary,
    /// The "caja inicial" seed recorded when a shift opens with cash.
    InitialCash,
}

// =============================================================================
// Sale Item
// =============================================================================

/// Product data frozen at the moment of sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductSnapshot {
    pub id: String,
    pub name: String,
    pub category: String,
    /// Catalog price at time of sale.
    pub price: Money,
}

/// A line item in a sale.
/// Uses snapshot pattern to freeze product data at time of sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleItem {
    pub product: ProductSnapshot,
    pub quantity: i64,
    /// Price typed by the cashier, overriding the catalog price.
    pub custom_price: Option<Money>,
    /// Effective unit price × quantity.
    pub subtotal: Money,
}

impl SaleItem {
    /// Builds a line item, computing its subtotal.
    pub fn new(product: ProductSnapshot, quantity: i64, custom_price: Option<Money>) -> Self {
        let unit = custom_price.unwrap_or(product.price);
        SaleItem {
            product,
            quantity,
            custom_price,
            subtotal: unit.multiply_quantity(quantity),
        }
    }

    /// Returns the price actually charged per unit.
    #[inline]
    pub fn unit_price(&self) -> Money {
        self.custom_price.unwrap_or(self.product.price)
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A completed checkout. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub shift_id: String,
    pub receipt_number: String,
    pub kind: SaleKind,
    pub items: Vec<SaleItem>,
    pub total: Money,
    pub payment_method: PaymentMethod,
    /// Always present; sums to `total`.
    pub breakdown: PaymentBreakdown,
    pub customer_name: Option<String>,
    pub lot_number: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Withdrawal
// =============================================================================

/// Cash taken out of the drawer during a shift (retiro de caja).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Withdrawal {
    pub id: String,
    pub shift_id: String,
    pub receipt_number: String,
    /// `RETIRO-0001`
    pub withdrawal_id: String,
    /// Positive; the drawer loses this much cash.
    pub amount: Money,
    pub admin_name: String,
    pub note: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Expense
// =============================================================================

/// A purchase paid out of the drawer (gasto). Always cash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Expense {
    pub id: String,
    pub shift_id: String,
    pub receipt_number: String,
    pub concept: String,
    pub detail: String,
    /// Positive; the drawer loses this much cash.
    pub amount: Money,
    pub payment_method: PaymentMethod,
    pub admin_name: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Shift
// =============================================================================

/// Lifecycle state of a shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ShiftStatus {
    Active,
    Closed,
}

/// An administrative shift (turno).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Shift {
    pub id: String,
    pub admin_name: String,
    #[ts(as = "String")]
    pub started_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub ended_at: Option<DateTime<Utc>>,
    pub status: ShiftStatus,
    /// Last totals written with the shift. Display only: financial checks
    /// always recompute from the shift's records.
    pub cached_totals: ShiftTotals,
    /// Bumped on every mutation; storage rejects writes carrying a stale one.
    pub version: i64,
}

impl Shift {
    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == ShiftStatus::Active
    }
}

// =============================================================================
// Turn Closure
// =============================================================================

/// The audit record produced when a shift closes. Never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TurnClosure {
    pub id: String,
    pub shift_id: String,
    pub admin_name: String,
    #[ts(as = "String")]
    pub started_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub ended_at: DateTime<Utc>,
    /// Deep copies, including the opening cash seed.
    pub sales: Vec<Sale>,
    pub withdrawals: Vec<Withdrawal>,
    pub expenses: Vec<Expense>,
    pub totals: ShiftTotals,
    /// Checkouts only; the opening cash seed is not a sale.
    pub sales_count: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
