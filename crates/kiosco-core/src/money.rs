//! # Money Module
//!
//! Provides the `Money` type for handling peso amounts safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In JavaScript/floating point:                                          │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  At the register, a drift like that breaks the arqueo:                  │
//! │    cash + transfer + expensa != general  → the shift "doesn't close"    │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Centavos                                         │
//! │    $500 split three ways = 16667 + 16667 + 16666 centavos               │
//! │    The remainder is placed explicitly, never lost                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use kiosco_core::money::Money;
//!
//! // Create from centavos (preferred)
//! let price = Money::from_cents(30_000); // $300.00
//!
//! // Arithmetic operations
//! let doubled = price * 2;                      // $600.00
//! let total = price + Money::from_cents(5_050); // $350.50
//! assert_eq!(total.to_string(), "$350.50");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;

/// Largest difference accepted between a combined payment split and the
/// sale total: one centavo.
pub const PAYMENT_TOLERANCE: Money = Money::from_cents(1);

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in centavos (1/100 of a peso).
///
/// ## Design Decisions
/// - **i64 (signed)**: withdrawals and expenses enter the ledger as negative
///   amounts, so the general total is a plain sum
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Derives**: serializes as a bare integer of centavos
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  SaleItem.subtotal ──► Sale.total ──► PaymentBreakdown {cash, ...}     │
/// │                                            │                            │
/// │  Withdrawal.amount ──┐                     ▼                            │
/// │  Expense.amount ─────┴──────────► ShiftTotals ──► TurnClosure.totals   │
/// │                                                                         │
/// │  EVERY monetary value in the ledger flows through this type            │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from centavos.
    ///
    /// ## Example
    /// ```rust
    /// use kiosco_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // Represents $10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from whole pesos.
    ///
    /// ## Example
    /// ```rust
    /// use kiosco_core::money::Money;
    ///
    /// assert_eq!(Money::from_pesos(1000).cents(), 100_000);
    /// ```
    #[inline]
    pub const fn from_pesos(pesos: i64) -> Self {
        Money(pesos * 100)
    }

    /// Converts a floating point amount (as found in legacy JSON backups)
    /// into centavos, rounding half away from zero.
    ///
    /// Returns `None` for NaN, infinities and values outside the i64 range.
    ///
    /// ## Example
    /// ```rust
    /// use kiosco_core::money::Money;
    ///
    /// assert_eq!(Money::from_decimal(166.665).map(|m| m.cents()), Some(16667));
    /// assert_eq!(Money::from_decimal(f64::NAN), None);
    /// ```
    pub fn from_decimal(amount: f64) -> Option<Self> {
        if !amount.is_finite() {
            return None;
        }
        // Round the scaled value once; the small bias absorbs binary noise
        // such as 166.665 being stored as 166.66499999...
        let scaled = amount * 100.0;
        let rounded = (scaled + scaled.signum() * 1e-6).round();
        if rounded.abs() >= i64::MAX as f64 {
            return None;
        }
        Some(Money(rounded as i64))
    }

    /// Returns the value in centavos.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the whole-peso portion (truncated toward zero).
    #[inline]
    pub const fn pesos(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the centavo portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Multiplies money by a quantity, saturating at the `i64` bounds so an
    /// absurd line can still reach validation.
    ///
    /// ## Example
    /// ```rust
    /// use kiosco_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(150_000);
    /// assert_eq!(unit_price.multiply_quantity(2).cents(), 300_000);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }

    /// Divides by `parts`, rounding to the nearest centavo (half away from
    /// zero). Returns zero when `parts` is zero.
    ///
    /// ## Example
    /// ```rust
    /// use kiosco_core::money::Money;
    ///
    /// // $500 / 3 = 166.666... → 16667 centavos
    /// assert_eq!(Money::from_pesos(500).div_round(3).cents(), 16667);
    /// ```
    pub fn div_round(&self, parts: i64) -> Money {
        if parts == 0 {
            return Money::zero();
        }
        let num = self.0 as i128;
        let den = parts as i128;
        let quotient = num / den;
        let remainder = num % den;
        // Compare 2·|r| against |d| to decide the half-away-from-zero step
        let adjust = if 2 * remainder.abs() >= den.abs() {
            if (num < 0) ^ (den < 0) {
                -1
            } else {
                1
            }
        } else {
            0
        };
        Money((quotient + adjust) as i64)
    }

    /// Renders the amount the way the kiosk's spreadsheets expect: a bare
    /// number with no currency sign and no trailing zeros.
    ///
    /// ## Example
    /// ```rust
    /// use kiosco_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(30_000).to_plain_string(), "300");
    /// assert_eq!(Money::from_cents(30_050).to_plain_string(), "300.5");
    /// assert_eq!(Money::from_cents(-1_005).to_plain_string(), "-10.05");
    /// ```
    pub fn to_plain_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let pesos = self.pesos().abs();
        match self.cents_part() {
            0 => format!("{sign}{pesos}"),
            c if c % 10 == 0 => format!("{sign}{pesos}.{}", c / 10),
            c => format!("{sign}{pesos}.{c:02}"),
        }
    }

    /// Renders the amount with exactly two decimals and no currency sign.
    ///
    /// ## Example
    /// ```rust
    /// use kiosco_core::money::Money;
    ///
    /// assert_eq!(Money::from_pesos(1300).to_fixed_string(), "1300.00");
    /// ```
    pub fn to_fixed_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        format!("{sign}{}.{:02}", self.pesos().abs(), self.cents_part())
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display shows money as `$1300.00`, the form used in logs and in
/// user-facing error messages.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}${}.{:02}", sign, self.pesos().abs(), self.cents_part())
    }
}

/// Parses an amount typed at the register: an optional `$`, digits, and up
/// to two decimals after `.` or `,` (`1000`, `$12.5`, `12,05`). Thousands
/// separators are rejected.
impl FromStr for Money {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "amount".to_string(),
            reason: reason.to_string(),
        };

        let trimmed = s.trim();
        let (negative, rest) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let rest = rest.strip_prefix('$').unwrap_or(rest);
        if rest.is_empty() {
            return Err(invalid("expected a number"));
        }

        let (whole, frac) = match rest.find(['.', ',']) {
            Some(idx) => (&rest[..idx], &rest[idx + 1..]),
            None => (rest, ""),
        };
        if whole.is_empty() || !whole.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("expected a number"));
        }
        if frac.len() > 2 || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("at most two decimals are allowed"));
        }

        let pesos: i64 = whole.parse().map_err(|_| invalid("amount is too large"))?;
        let cents: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| invalid("expected a number"))? * 10,
            _ => frac.parse().map_err(|_| invalid("expected a number"))?,
        };
        let total = pesos
            .checked_mul(100)
            .and_then(|p| p.checked_add(cents))
            .ok_or_else(|| invalid("amount is too large"))?;

        Ok(Money(if negative { -total } else { total }))
    }
}

/// Default money is zero.
impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

/// Multiplication by i64 (for quantity calculations).
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
