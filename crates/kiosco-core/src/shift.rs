//! # Shift Lifecycle
//!
//! State machine for a shift and everything recorded in it.
//!
//! ## States
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   none active ──── open(admin, initial_cash) ────► ACTIVE               │
//! │        ▲                                             │   ▲              │
//! │        │                          record_sale        │   │              │
//! │        │                          record_withdrawal  └───┘              │
//! │        │                          record_expense                        │
//! │        │                                             │                  │
//! │        └─────────────── close() ◄────────────────────┘                  │
//! │                            │                                            │
//! │                            ▼                                            │
//! │                     CLOSED + TurnClosure (frozen, never mutated)        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Failure Semantics
//! Every operation validates completely before touching `self`. A returned
//! error means the ledger is exactly as it was.
//!
//! ## No Clocks, No Counters
//! Ids, receipt numbers and timestamps arrive pre-allocated in a [`Stamp`].
//! The storage layer allocates them inside the same database transaction
//! that persists the result, so a rejected operation consumes nothing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::guard::check_cash_outflow;
use crate::ledger::{compute_totals, shift_entries, LedgerEntry, ShiftTotals};
use crate::money::Money;
use crate::payment::{settle_payment, PaymentBreakdown};
use crate::types::{
    Expense, PaymentMethod, ProductSnapshot, Sale, SaleItem, SaleKind, Shift, ShiftStatus,
    TurnClosure, Withdrawal, INITIAL_CASH_CATEGORY, INITIAL_CASH_SENTINEL,
};
use crate::validation::{
    optional_text, validate_admin_name, validate_amount_limit, validate_non_negative,
    validate_sale_items,
};
use crate::{MAX_LOT_LEN, MAX_NAME_LEN, MAX_TEXT_LEN};

// =============================================================================
// Inputs
// =============================================================================

/// Identity of a record about to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamp {
    pub id: String,
    pub receipt_number: String,
    pub at: DateTime<Utc>,
}

/// Request to open a shift.
#[derive(Debug, Clone)]
pub struct OpenShift {
    pub shift_id: String,
    pub admin_name: String,
    pub initial_cash: Money,
    pub opened_at: DateTime<Utc>,
}

/// A checkout as entered at the register.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleDraft {
    pub items: Vec<SaleItem>,
    pub payment_method: PaymentMethod,
    /// Only read for combined payments.
    pub breakdown: Option<PaymentBreakdown>,
    pub customer_name: Option<String>,
    pub lot_number: Option<String>,
}

// =============================================================================
// Shift Ledger
// =============================================================================

/// A shift together with its records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftLedger {
    pub shift: Shift,
    pub sales: Vec<Sale>,
    pub withdrawals: Vec<Withdrawal>,
    pub expenses: Vec<Expense>,
}

impl ShiftLedger {
    /// Validates an open request without building anything.
    ///
    /// Returns the trimmed administrator name. Storage calls this before
    /// allocating the opening cash receipt.
    pub fn check_open(
        active: Option<&Shift>,
        admin_name: &str,
        initial_cash: Money,
    ) -> CoreResult<String> {
        let admin_name = validate_admin_name(admin_name)?;
        validate_non_negative(initial_cash, "initial_cash")?;

        if let Some(current) = active.filter(|s| s.is_active()) {
            return Err(CoreError::ShiftAlreadyActive {
                admin_name: current.admin_name.clone(),
            });
        }

        Ok(admin_name)
    }

    /// Opens a shift.
    ///
    /// `active` is the currently active shift, if any. When `initial_cash`
    /// is positive, `seed` must carry the stamp of the "Caja Inicial"
    /// pseudo-sale, which is recorded entirely as cash.
    pub fn open(
        active: Option<&Shift>,
        request: OpenShift,
        seed: Option<Stamp>,
    ) -> CoreResult<Self> {
        let admin_name = Self::check_open(active, &request.admin_name, request.initial_cash)?;

        let mut ledger = ShiftLedger {
            shift: Shift {
                id: request.shift_id,
                admin_name: admin_name.clone(),
                started_at: request.opened_at,
                ended_at: None,
                status: ShiftStatus::Active,
                cached_totals: ShiftTotals::zero(),
                version: 1,
            },
            sales: Vec::new(),
            withdrawals: Vec::new(),
            expenses: Vec::new(),
        };

        if request.initial_cash.is_positive() {
            let stamp = seed.ok_or_else(|| ValidationError::Required {
                field: "initial_cash_receipt".to_string(),
            })?;
            let item = SaleItem::new(
                ProductSnapshot {
                    id: format!("caja-inicial-{}", stamp.id),
                    name: INITIAL_CASH_SENTINEL.to_string(),
                    category: INITIAL_CASH_CATEGORY.to_string(),
                    price: request.initial_cash,
                },
                1,
                None,
            );
            ledger.sales.push(Sale {
                id: stamp.id,
                shift_id: ledger.shift.id.clone(),
                receipt_number: stamp.receipt_number,
                kind: SaleKind::InitialCash,
                items: vec![item],
                total: request.initial_cash,
                payment_method: PaymentMethod::Cash,
                breakdown: PaymentBreakdown::single(PaymentMethod::Cash, request.initial_cash),
                customer_name: Some(format!("{INITIAL_CASH_SENTINEL} - {admin_name}")),
                lot_number: None,
                created_at: stamp.at,
            });
        }

        ledger.shift.cached_totals = ledger.totals();
        Ok(ledger)
    }

    /// Transaction list of this shift, newest first.
    pub fn entries(&self) -> Vec<LedgerEntry> {
        shift_entries(&self.shift, &self.sales, &self.withdrawals, &self.expenses)
    }

    /// Totals recomputed from the records.
    pub fn totals(&self) -> ShiftTotals {
        compute_totals(&self.entries())
    }

    /// Number of checkouts, excluding the opening cash seed.
    pub fn sales_count(&self) -> i64 {
        self.sales
            .iter()
            .filter(|s| s.kind == SaleKind::Ordinary && !s.total.is_negative())
            .count() as i64
    }

    /// Records a checkout.
    pub fn record_sale(&mut self, draft: SaleDraft, stamp: Stamp) -> CoreResult<Sale> {
        self.ensure_active()?;

        if draft.items.is_empty() {
            return Err(CoreError::EmptySale);
        }
        validate_sale_items(&draft.items)?;

        let total: Money = draft.items.iter().map(|item| item.subtotal).sum();
        validate_amount_limit(total, "total")?;
        let breakdown = settle_payment(total, draft.payment_method, draft.breakdown)?;

        let customer_name =
            optional_text(draft.customer_name.as_deref(), "customer_name", MAX_NAME_LEN)?;
        let lot_number = optional_text(draft.lot_number.as_deref(), "lot_number", MAX_LOT_LEN)?;

        // Account credit is billed to a lot; both identifiers are mandatory
        if breakdown.account_credit.is_positive()
            || draft.payment_method == PaymentMethod::AccountCredit
        {
            if customer_name.is_none() {
                return Err(ValidationError::Required {
                    field: "customer_name".to_string(),
                }
                .into());
            }
            if lot_number.is_none() {
                return Err(ValidationError::Required {
                    field: "lot_number".to_string(),
                }
                .into());
            }
        }

        let sale = Sale {
            id: stamp.id,
            shift_id: self.shift.id.clone(),
            receipt_number: stamp.receipt_number,
            kind: SaleKind::Ordinary,
            items: draft.items,
            total,
            payment_method: draft.payment_method,
            breakdown,
            customer_name,
            lot_number,
            created_at: stamp.at,
        };

        self.sales.push(sale.clone());
        self.touch();
        Ok(sale)
    }

    /// Records a cash withdrawal (retiro de caja).
    pub fn record_withdrawal(
        &mut self,
        amount: Money,
        note: &str,
        stamp: Stamp,
        withdrawal_id: String,
    ) -> CoreResult<Withdrawal> {
        self.ensure_active()?;
        let note = check_cash_outflow(&self.totals(), amount, note, "note")?;

        let withdrawal = Withdrawal {
            id: stamp.id,
            shift_id: self.shift.id.clone(),
            receipt_number: stamp.receipt_number,
            withdrawal_id,
            amount,
            admin_name: self.shift.admin_name.clone(),
            note,
            created_at: stamp.at,
        };

        self.withdrawals.push(withdrawal.clone());
        self.touch();
        Ok(withdrawal)
    }

    /// Records an expense paid from the drawer.
    pub fn record_expense(
        &mut self,
        amount: Money,
        concept: &str,
        detail: &str,
        stamp: Stamp,
    ) -> CoreResult<Expense> {
        self.ensure_active()?;
        let concept = check_cash_outflow(&self.totals(), amount, concept, "concept")?;
        let detail = optional_text(Some(detail), "detail", MAX_TEXT_LEN)?.unwrap_or_default();

        let expense = Expense {
            id: stamp.id,
            shift_id: self.shift.id.clone(),
            receipt_number: stamp.receipt_number,
            concept,
            detail,
            amount,
            payment_method: PaymentMethod::Cash,
            admin_name: self.shift.admin_name.clone(),
            created_at: stamp.at,
        };

        self.expenses.push(expense.clone());
        self.touch();
        Ok(expense)
    }

    /// Closes the shift and returns its audit record.
    ///
    /// The closure holds copies of every record; later changes to this
    /// ledger (there can be none, it is closed) would not reach it.
    pub fn close(&mut self, closure_id: String, at: DateTime<Utc>) -> CoreResult<TurnClosure> {
        self.ensure_active()?;

        let closure = TurnClosure {
            id: closure_id,
            shift_id: self.shift.id.clone(),
            admin_name: self.shift.admin_name.clone(),
            started_at: self.shift.started_at,
            ended_at: at,
            sales: self.sales.clone(),
            withdrawals: self.withdrawals.clone(),
            expenses: self.expenses.clone(),
            totals: self.totals(),
            sales_count: self.sales_count(),
            created_at: at,
        };

        self.shift.status = ShiftStatus::Closed;
        self.shift.ended_at = Some(at);
        self.touch();
        Ok(closure)
    }

    fn ensure_active(&self) -> CoreResult<()> {
        if self.shift.is_active() {
            Ok(())
        } else {
            Err(CoreError::NoActiveShift)
        }
    }

    fn touch(&mut self) {
        self.shift.version += 1;
        self.shift.cached_totals = self.totals();
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap()
    }

    struct Clock {
        seq: i64,
    }

    impl Clock {
        fn new() -> Self {
            Clock { seq: 0 }
        }

        fn stamp(&mut self) -> Stamp {
            self.seq += 1;
            Stamp {
                id: format!("rec-{}", self.seq),
                receipt_number: format!("KD-2025-{:06}", self.seq),
                at: t0() + Duration::minutes(self.seq),
            }
        }
    }

    fn open_with(clock: &mut Clock, initial: i64) -> ShiftLedger {
        let seed = (initial > 0).then(|| clock.stamp());
        ShiftLedger::open(
            None,
            OpenShift {
                shift_id: "shift-1".to_string(),
                admin_name: "Marta".to_string(),
                initial_cash: Money::from_pesos(initial),
                opened_at: t0(),
            },
            seed,
        )
        .unwrap()
    }

    fn item(pesos: i64, qty: i64) -> SaleItem {
        SaleItem::new(
            ProductSnapshot {
                id: "p-1".to_string(),
                name: "Gaseosa".to_string(),
                category: "Bebidas".to_string(),
                price: Money::from_pesos(pesos),
            },
            qty,
            None,
        )
    }

    fn draft(pesos: i64, method: PaymentMethod, breakdown: Option<PaymentBreakdown>) -> SaleDraft {
        SaleDraft {
            items: vec![item(pesos, 1)],
            payment_method: method,
            breakdown,
            customer_name: None,
            lot_number: None,
        }
    }

    fn pesos(cash: i64, transfer: i64, credit: i64) -> PaymentBreakdown {
        PaymentBreakdown {
            cash: Money::from_pesos(cash),
            transfer: Money::from_pesos(transfer),
            account_credit: Money::from_pesos(credit),
        }
    }

    fn totals(cash: i64, transfer: i64, credit: i64, general: i64) -> ShiftTotals {
        ShiftTotals {
            cash: Money::from_pesos(cash),
            transfer: Money::from_pesos(transfer),
            account_credit: Money::from_pesos(credit),
            general: Money::from_pesos(general),
        }
    }

    // -------------------------------------------------------------------------
    // Opening, selling, withdrawing, closing
    // -------------------------------------------------------------------------

    #[test]
    fn test_open_with_initial_cash_seeds_cash() {
        let mut clock = Clock::new();
        let ledger = open_with(&mut clock, 1000);

        assert_eq!(ledger.totals(), totals(1000, 0, 0, 1000));
        assert_eq!(ledger.sales.len(), 1);
        assert_eq!(ledger.sales[0].kind, SaleKind::InitialCash);
        assert_eq!(ledger.sales[0].customer_name.as_deref(), Some("Caja Inicial - Marta"));
        assert_eq!(ledger.shift.cached_totals, ledger.totals());
    }

    #[test]
    fn test_cash_sale_adds_to_cash() {
        let mut clock = Clock::new();
        let mut ledger = open_with(&mut clock, 1000);

        let sale = ledger
            .record_sale(draft(300, PaymentMethod::Cash, None), clock.stamp())
            .unwrap();
        assert_eq!(sale.breakdown, pesos(300, 0, 0));
        assert_eq!(ledger.totals(), totals(1300, 0, 0, 1300));
    }

    #[test]
    fn test_combined_sale_with_exact_split() {
        let mut clock = Clock::new();
        let mut ledger = open_with(&mut clock, 1000);
        ledger
            .record_sale(draft(300, PaymentMethod::Cash, None), clock.stamp())
            .unwrap();

        let mut d = draft(500, PaymentMethod::Combined, Some(pesos(200, 200, 100)));
        d.customer_name = Some("Lucía".to_string());
        d.lot_number = Some("14".to_string());
        ledger.record_sale(d, clock.stamp()).unwrap();

        assert_eq!(ledger.totals(), totals(1500, 200, 100, 1800));
        assert!(ledger.totals().is_balanced());
    }

    #[test]
    fn test_mismatched_split_is_rejected_without_mutation() {
        let mut clock = Clock::new();
        let mut ledger = open_with(&mut clock, 1000);
        ledger
            .record_sale(draft(300, PaymentMethod::Cash, None), clock.stamp())
            .unwrap();
        let before = ledger.clone();

        let err = ledger
            .record_sale(
                draft(500, PaymentMethod::Combined, Some(pesos(200, 200, 80))),
                clock.stamp(),
            )
            .unwrap_err();

        assert!(matches!(err, CoreError::PaymentMismatch { .. }));
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_withdrawal_over_cash_is_rejected() {
        let mut clock = Clock::new();
        let mut ledger = open_with(&mut clock, 1000);
        ledger
            .record_sale(draft(300, PaymentMethod::Cash, None), clock.stamp())
            .unwrap();
        let before = ledger.clone();

        let err = ledger
            .record_withdrawal(
                Money::from_pesos(2000),
                "Depósito",
                clock.stamp(),
                "RETIRO-0001".to_string(),
            )
            .unwrap_err();

        assert_eq!(
            err,
            CoreError::InsufficientCash {
                available: Money::from_pesos(1300),
                requested: Money::from_pesos(2000),
            }
        );
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_close_freezes_totals_and_counts_sales() {
        let mut clock = Clock::new();
        let mut ledger = open_with(&mut clock, 1000);
        ledger
            .record_sale(draft(300, PaymentMethod::Cash, None), clock.stamp())
            .unwrap();

        let closed_at = t0() + Duration::hours(8);
        let closure = ledger.close("closure-1".to_string(), closed_at).unwrap();

        assert_eq!(closure.totals.general, Money::from_pesos(1300));
        // The opening cash seed is copied but not counted as a sale
        assert_eq!(closure.sales_count, 1);
        assert_eq!(closure.sales.len(), 2);
        assert_eq!(ledger.shift.status, ShiftStatus::Closed);
        assert_eq!(ledger.shift.ended_at, Some(closed_at));
    }

    #[test]
    fn test_oversized_sale_is_rejected_without_mutation() {
        let mut clock = Clock::new();
        let mut ledger = open_with(&mut clock, 1000);
        let before = ledger.clone();

        let mut line = item(1, 999);
        line.custom_price = Some(Money::from_cents(9_000_000_000_000_000));
        line.subtotal = line.unit_price().multiply_quantity(999);
        line.quantity = 999;
        let mut d = draft(1, PaymentMethod::Cash, None);
        d.items = vec![line];

        let err = ledger.record_sale(d, clock.stamp()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::TooLarge { .. })
        ));
        assert_eq!(ledger, before);

        // Many lines that each fit can still add up past the limit
        let big = SaleItem::new(item(1, 1).product, 999, Some(Money::from_pesos(1_000_000)));
        let mut d = draft(1, PaymentMethod::Cash, None);
        d.items = vec![big; 2];
        let err = ledger.record_sale(d, clock.stamp()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::TooLarge { ref field, .. }) if field == "total"
        ));
        assert_eq!(ledger, before);
    }

    // -------------------------------------------------------------------------
    // Lifecycle rules
    // -------------------------------------------------------------------------

    #[test]
    fn test_open_rejects_second_active_shift() {
        let mut clock = Clock::new();
        let existing = open_with(&mut clock, 0);

        let err = ShiftLedger::open(
            Some(&existing.shift),
            OpenShift {
                shift_id: "shift-2".to_string(),
                admin_name: "Jorge".to_string(),
                initial_cash: Money::zero(),
                opened_at: t0(),
            },
            None,
        )
        .unwrap_err();
        assert_eq!(
            err,
            CoreError::ShiftAlreadyActive {
                admin_name: "Marta".to_string()
            }
        );
    }

    #[test]
    fn test_open_validates_input() {
        assert!(matches!(
            ShiftLedger::check_open(None, "  ", Money::zero()),
            Err(CoreError::Validation(ValidationError::Required { .. }))
        ));
        assert!(matches!(
            ShiftLedger::check_open(None, "Marta", Money::from_cents(-1)),
            Err(CoreError::Validation(ValidationError::MustNotBeNegative { .. }))
        ));
    }

    #[test]
    fn test_open_with_zero_cash_has_no_seed() {
        let mut clock = Clock::new();
        let ledger = open_with(&mut clock, 0);
        assert!(ledger.sales.is_empty());
        assert_eq!(ledger.totals(), ShiftTotals::zero());
    }

    #[test]
    fn test_closed_shift_rejects_every_mutation() {
        let mut clock = Clock::new();
        let mut ledger = open_with(&mut clock, 1000);
        let closure = ledger.close("closure-1".to_string(), t0()).unwrap();
        let frozen = closure.clone();

        assert_eq!(
            ledger
                .record_sale(draft(10, PaymentMethod::Cash, None), clock.stamp())
                .unwrap_err(),
            CoreError::NoActiveShift
        );
        assert_eq!(
            ledger
                .record_withdrawal(Money::from_pesos(1), "x", clock.stamp(), "RETIRO-0001".into())
                .unwrap_err(),
            CoreError::NoActiveShift
        );
        assert_eq!(
            ledger
                .record_expense(Money::from_pesos(1), "x", "", clock.stamp())
                .unwrap_err(),
            CoreError::NoActiveShift
        );
        assert_eq!(
            ledger.close("closure-2".to_string(), t0()).unwrap_err(),
            CoreError::NoActiveShift
        );
        assert_eq!(closure, frozen);
    }

    #[test]
    fn test_withdrawals_use_fresh_totals() {
        let mut clock = Clock::new();
        let mut ledger = open_with(&mut clock, 1000);

        ledger
            .record_withdrawal(Money::from_pesos(600), "Banco", clock.stamp(), "RETIRO-0001".into())
            .unwrap();
        // Only $400 left; a second $600 must fail even though the first
        // check passed against $1000
        let err = ledger
            .record_withdrawal(Money::from_pesos(600), "Banco", clock.stamp(), "RETIRO-0002".into())
            .unwrap_err();
        assert!(matches!(err, CoreError::InsufficientCash { .. }));
        assert_eq!(ledger.totals(), totals(400, 0, 0, 400));
    }

    #[test]
    fn test_expense_reduces_cash() {
        let mut clock = Clock::new();
        let mut ledger = open_with(&mut clock, 1000);

        let expense = ledger
            .record_expense(Money::from_pesos(150), " Limpieza ", "lavandina", clock.stamp())
            .unwrap();
        assert_eq!(expense.concept, "Limpieza");
        assert_eq!(expense.payment_method, PaymentMethod::Cash);
        assert_eq!(ledger.totals(), totals(850, 0, 0, 850));

        let err = ledger
            .record_expense(Money::from_pesos(10), "", "", clock.stamp())
            .unwrap_err();
        assert_eq!(err.to_string(), "concept is required");
    }

    #[test]
    fn test_account_credit_requires_customer_and_lot() {
        let mut clock = Clock::new();
        let mut ledger = open_with(&mut clock, 0);

        let err = ledger
            .record_sale(draft(100, PaymentMethod::AccountCredit, None), clock.stamp())
            .unwrap_err();
        assert_eq!(err.to_string(), "customer_name is required");

        let mut d = draft(100, PaymentMethod::Combined, Some(pesos(50, 0, 50)));
        d.customer_name = Some("Lucía".to_string());
        let err = ledger.record_sale(d, clock.stamp()).unwrap_err();
        assert_eq!(err.to_string(), "lot_number is required");

        let mut d = draft(100, PaymentMethod::AccountCredit, None);
        d.customer_name = Some("Lucía".to_string());
        d.lot_number = Some("14".to_string());
        assert!(ledger.record_sale(d, clock.stamp()).is_ok());
    }

    #[test]
    fn test_empty_sale_is_rejected() {
        let mut clock = Clock::new();
        let mut ledger = open_with(&mut clock, 0);
        let mut d = draft(100, PaymentMethod::Cash, None);
        d.items.clear();
        assert_eq!(
            ledger.record_sale(d, clock.stamp()).unwrap_err(),
            CoreError::EmptySale
        );
    }

    #[test]
    fn test_version_increments_on_each_mutation() {
        let mut clock = Clock::new();
        let mut ledger = open_with(&mut clock, 1000);
        assert_eq!(ledger.shift.version, 1);

        ledger
            .record_sale(draft(300, PaymentMethod::Cash, None), clock.stamp())
            .unwrap();
        assert_eq!(ledger.shift.version, 2);

        // Rejected operations leave the version alone
        let _ = ledger.record_withdrawal(
            Money::from_pesos(99_999),
            "x",
            clock.stamp(),
            "RETIRO-0001".into(),
        );
        assert_eq!(ledger.shift.version, 2);
    }
}
