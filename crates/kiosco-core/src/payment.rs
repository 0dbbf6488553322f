//! # Payment Breakdown Normalizer
//!
//! Every sale carries a three-way split of its total across the kiosk's
//! payment rails. This module produces that split.
//!
//! ## Normalization Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  method          supplied split       result                           │
//! │  ─────────────   ──────────────────   ───────────────────────────────  │
//! │  efectivo        (ignored)            { total, 0, 0 }                  │
//! │  transferencia   (ignored)            { 0, total, 0 }                  │
//! │  expensa         (ignored)            { 0, 0, total }                  │
//! │  combinado       { c, t, e }          { c, t, e } (checked at checkout)│
//! │  combinado       none (legacy)        { ⅓, ⅓, total − 2·⅓ }            │
//! │                                                                         │
//! │  Guarantee: cash + transfer + account_credit == total, exactly         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`normalize_breakdown`] never fails; it is what legacy backfill uses.
//! [`settle_payment`] is the checkout path and rejects a combined split
//! that does not add up.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Neg};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{Money, PAYMENT_TOLERANCE};
use crate::types::PaymentMethod;

// =============================================================================
// Payment Breakdown
// =============================================================================

/// Amounts paid on each rail.
///
/// Stored breakdowns of sales are non-negative. Ledger entries for cash
/// outflows reuse the type with a negative `cash` component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentBreakdown {
    pub cash: Money,
    pub transfer: Money,
    pub account_credit: Money,
}

impl PaymentBreakdown {
    pub const fn zero() -> Self {
        PaymentBreakdown {
            cash: Money::zero(),
            transfer: Money::zero(),
            account_credit: Money::zero(),
        }
    }

    /// A breakdown with the whole `amount` on one rail.
    ///
    /// `Combined` has no rail of its own; it yields the legacy even split.
    pub fn single(method: PaymentMethod, amount: Money) -> Self {
        match method {
            PaymentMethod::Cash => PaymentBreakdown {
                cash: amount,
                ..Self::zero()
            },
            PaymentMethod::Transfer => PaymentBreakdown {
                transfer: amount,
                ..Self::zero()
            },
            PaymentMethod::AccountCredit => PaymentBreakdown {
                account_credit: amount,
                ..Self::zero()
            },
            PaymentMethod::Combined => Self::even_split(amount),
        }
    }

    /// Splits `total` in thirds; account credit takes the remainder.
    ///
    /// ## Example
    /// ```rust
    /// use kiosco_core::money::Money;
    /// use kiosco_core::payment::PaymentBreakdown;
    ///
    /// let split = PaymentBreakdown::even_split(Money::from_pesos(500));
    /// assert_eq!(split.cash.cents(), 16_667);
    /// assert_eq!(split.transfer.cents(), 16_667);
    /// assert_eq!(split.account_credit.cents(), 16_666);
    /// ```
    pub fn even_split(total: Money) -> Self {
        let third = total.div_round(3);
        PaymentBreakdown {
            cash: third,
            transfer: third,
            account_credit: total - third - third,
        }
    }

    /// Sum of the three rails.
    #[inline]
    pub fn sum(&self) -> Money {
        self.cash + self.transfer + self.account_credit
    }

    /// Rails carrying a positive amount, in display order.
    pub fn methods_used(&self) -> Vec<PaymentMethod> {
        [
            (PaymentMethod::Cash, self.cash),
            (PaymentMethod::Transfer, self.transfer),
            (PaymentMethod::AccountCredit, self.account_credit),
        ]
        .into_iter()
        .filter(|(_, amount)| amount.is_positive())
        .map(|(method, _)| method)
        .collect()
    }

    fn has_negative(&self) -> bool {
        self.cash.is_negative() || self.transfer.is_negative() || self.account_credit.is_negative()
    }

    /// Adds `delta` to the largest rail (cash wins ties, then transfer).
    fn absorb(mut self, delta: Money) -> Self {
        if self.cash >= self.transfer && self.cash >= self.account_credit {
            self.cash += delta;
        } else if self.transfer >= self.account_credit {
            self.transfer += delta;
        } else {
            self.account_credit += delta;
        }
        self
    }
}

impl Add for PaymentBreakdown {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        PaymentBreakdown {
            cash: self.cash + other.cash,
            transfer: self.transfer + other.transfer,
            account_credit: self.account_credit + other.account_credit,
        }
    }
}

impl AddAssign for PaymentBreakdown {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl Neg for PaymentBreakdown {
    type Output = Self;

    fn neg(self) -> Self {
        PaymentBreakdown {
            cash: -self.cash,
            transfer: -self.transfer,
            account_credit: -self.account_credit,
        }
    }
}

// =============================================================================
// Normalizer
// =============================================================================

/// Produces the canonical split for a transaction. Never fails.
///
/// A supplied split is only consulted for `Combined` and passes through
/// verbatim; checking that it adds up is [`settle_payment`]'s job.
pub fn normalize_breakdown(
    total: Money,
    method: PaymentMethod,
    supplied: Option<PaymentBreakdown>,
) -> PaymentBreakdown {
    match (method, supplied) {
        (PaymentMethod::Combined, Some(split)) => split,
        (PaymentMethod::Combined, None) => PaymentBreakdown::even_split(total),
        (single, _) => PaymentBreakdown::single(single, total),
    }
}

/// Validates and normalizes the payment of a checkout.
///
/// ## Rules
/// - `total` must not be negative
/// - A supplied combined split must have no negative rail
/// - `|split.sum() − total|` must be at most one centavo, otherwise
///   [`CoreError::PaymentMismatch`]
/// - A one-centavo residual is moved into the largest rail so the stored
///   split sums to `total` exactly
///
/// ## Example
/// ```rust
/// use kiosco_core::money::Money;
/// use kiosco_core::payment::{settle_payment, PaymentBreakdown};
/// use kiosco_core::types::PaymentMethod;
///
/// let split = PaymentBreakdown {
///     cash: Money::from_pesos(200),
///     transfer: Money::from_pesos(200),
///     account_credit: Money::from_pesos(80),
/// };
/// let err = settle_payment(Money::from_pesos(500), PaymentMethod::Combined, Some(split));
/// assert!(err.is_err());
/// ```
pub fn settle_payment(
    total: Money,
    method: PaymentMethod,
    supplied: Option<PaymentBreakdown>,
) -> CoreResult<PaymentBreakdown> {
    if total.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "total".to_string(),
        }
        .into());
    }

    let breakdown = normalize_breakdown(total, method, supplied);
    if method != PaymentMethod::Combined || supplied.is_none() {
        return Ok(breakdown);
    }

    if breakdown.has_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "payment_breakdown".to_string(),
        }
        .into());
    }

    let received = breakdown.sum();
    let residual = total - received;
    if residual.abs() > PAYMENT_TOLERANCE {
        return Err(CoreError::PaymentMismatch {
            expected: total,
            received,
        });
    }

    Ok(if residual.is_zero() {
        breakdown
    } else {
        breakdown.absorb(residual)
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
