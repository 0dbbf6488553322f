//! # Withdrawal/Expense Guard
//!
//! Cash can only leave the drawer if it is there. This is the one check in
//! the ledger that protects money directly, so it has its own module.
//!
//! ```text
//! amount ≤ 0 ?            ──► ValidationError (amount must be positive)
//! justification blank ?   ──► ValidationError (note/concept is required)
//! amount > totals.cash ?  ──► InsufficientCash { available, requested }
//! otherwise               ──► Ok(trimmed justification)
//! ```
//!
//! `totals` MUST be freshly recomputed from the shift's records
//! ([`crate::ledger::compute_totals`]), never the shift's cached totals:
//! two quick withdrawals against a stale figure would both pass.

use crate::error::{CoreError, CoreResult};
use crate::ledger::ShiftTotals;
use crate::money::Money;
use crate::validation::{validate_note, validate_positive};

/// Checks a cash outflow against the cash on hand.
///
/// `field` names the justification in the error message (`note` for
/// withdrawals, `concept` for expenses).
///
/// ## Example
/// ```rust
/// use kiosco_core::guard::check_cash_outflow;
/// use kiosco_core::ledger::ShiftTotals;
/// use kiosco_core::money::Money;
///
/// let totals = ShiftTotals { cash: Money::from_pesos(1300), ..ShiftTotals::zero() };
/// assert!(check_cash_outflow(&totals, Money::from_pesos(1300), "Depósito", "note").is_ok());
/// assert!(check_cash_outflow(&totals, Money::from_pesos(2000), "Depósito", "note").is_err());
/// ```
pub fn check_cash_outflow(
    totals: &ShiftTotals,
    amount: Money,
    justification: &str,
    field: &str,
) -> CoreResult<String> {
    validate_positive(amount, "amount")?;
    let justification = validate_note(justification, field)?;

    if amount > totals.cash {
        return Err(CoreError::InsufficientCash {
            available: totals.cash,
            requested: amount,
        });
    }

    Ok(justification)
}
