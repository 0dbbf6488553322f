//! # Shift Aggregator
//!
//! Turns a shift's raw records into display entries and running totals
//! (the arqueo). Totals are always recomputed from records; nothing here
//! reads a cached value.
//!
//! ## Aggregation Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  sales[] ──────┐                                                        │
//! │  withdrawals[] ├──► filter shift_id ──► classify ──► sort (newest 1st) │
//! │  expenses[] ───┘                                          │             │
//! │                                                           ▼             │
//! │                                                   Vec<LedgerEntry>      │
//! │                                                           │             │
//! │                                  compute_totals ◄─────────┘             │
//! │                                        │                                │
//! │                                        ▼                                │
//! │              ShiftTotals { cash, transfer, account_credit, general }    │
//! │                                                                         │
//! │  general == cash + transfer + account_credit, always                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::payment::PaymentBreakdown;
use crate::types::{Expense, PaymentMethod, Sale, SaleItem, SaleKind, Shift, Withdrawal};

// =============================================================================
// Transaction Kind
// =============================================================================

/// How an entry is presented and exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// A checkout at the kiosk.
    Sale,
    /// The opening cash seed.
    InitialCash,
    /// Cash taken out of the drawer.
    Withdrawal,
    /// A purchase paid from the drawer.
    Expense,
}

impl TransactionKind {
    /// Spanish label printed in exports.
    pub const fn label(&self) -> &'static str {
        match self {
            TransactionKind::Sale => "Kiosco",
            TransactionKind::InitialCash => "Caja Inicial",
            TransactionKind::Withdrawal => "Retiro",
            TransactionKind::Expense => "Gasto",
        }
    }
}

/// Classifies a sale record.
///
/// A negative total means the record is a withdrawal written as a sale
/// (older kiosk data); the kind flag identifies the opening cash seed.
pub fn classify_sale(sale: &Sale) -> TransactionKind {
    if sale.total.is_negative() {
        TransactionKind::Withdrawal
    } else if sale.kind == SaleKind::InitialCash {
        TransactionKind::InitialCash
    } else {
        TransactionKind::Sale
    }
}

// =============================================================================
// Ledger Entry
// =============================================================================

/// One row of the shift's transaction list.
///
/// `total` is signed: outflows are negative, and `breakdown` carries the
/// same sign so that `breakdown.sum() == total` holds for every entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LedgerEntry {
    pub id: String,
    pub kind: TransactionKind,
    pub receipt_number: String,
    pub withdrawal_id: Option<String>,
    pub customer: String,
    pub lot: String,
    pub origin: String,
    pub items: Vec<SaleItem>,
    pub total: Money,
    pub payment_method: PaymentMethod,
    pub breakdown: PaymentBreakdown,
    pub admin_name: Option<String>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn from_sale(sale: &Sale) -> Self {
        let kind = classify_sale(sale);
        let origin = match kind {
            TransactionKind::Withdrawal => "Retiro de Caja",
            TransactionKind::InitialCash => "Caja Inicial",
            _ => "Kiosco",
        };

        LedgerEntry {
            id: sale.id.clone(),
            kind,
            receipt_number: sale.receipt_number.clone(),
            withdrawal_id: None,
            customer: sale
                .customer_name
                .clone()
                .unwrap_or_else(|| "Cliente general".to_string()),
            lot: sale.lot_number.clone().unwrap_or_else(|| "0".to_string()),
            origin: origin.to_string(),
            items: sale.items.clone(),
            total: sale.total,
            payment_method: sale.payment_method,
            breakdown: sale.breakdown,
            admin_name: None,
            notes: None,
            created_at: sale.created_at,
        }
    }

    pub fn from_withdrawal(withdrawal: &Withdrawal) -> Self {
        let outflow = -withdrawal.amount.abs();
        LedgerEntry {
            id: withdrawal.id.clone(),
            kind: TransactionKind::Withdrawal,
            receipt_number: withdrawal.receipt_number.clone(),
            withdrawal_id: Some(withdrawal.withdrawal_id.clone()),
            customer: format!("Retiro - {}", withdrawal.admin_name),
            lot: "0".to_string(),
            origin: "Retiro de Caja".to_string(),
            items: Vec::new(),
            total: outflow,
            payment_method: PaymentMethod::Cash,
            breakdown: PaymentBreakdown::single(PaymentMethod::Cash, outflow),
            admin_name: Some(withdrawal.admin_name.clone()),
            notes: Some(withdrawal.note.clone()),
            created_at: withdrawal.created_at,
        }
    }

    pub fn from_expense(expense: &Expense) -> Self {
        let outflow = -expense.amount.abs();
        LedgerEntry {
            id: expense.id.clone(),
            kind: TransactionKind::Expense,
            receipt_number: expense.receipt_number.clone(),
            withdrawal_id: None,
            customer: format!("Gasto - {}", expense.admin_name),
            lot: "0".to_string(),
            origin: expense.concept.clone(),
            items: Vec::new(),
            total: outflow,
            payment_method: PaymentMethod::Cash,
            breakdown: PaymentBreakdown::single(PaymentMethod::Cash, outflow),
            admin_name: Some(expense.admin_name.clone()),
            notes: Some(expense.detail.clone()).filter(|d| !d.is_empty()),
            created_at: expense.created_at,
        }
    }

    /// Text for the method column: the Spanish code, or the rails of a
    /// combined payment joined with ` + `.
    pub fn method_text(&self) -> String {
        match self.payment_method {
            PaymentMethod::Combined => self
                .breakdown
                .methods_used()
                .iter()
                .map(PaymentMethod::label)
                .collect::<Vec<_>>()
                .join(" + "),
            single => single.code().to_string(),
        }
    }
}

/// Builds the shift's transaction list, newest first.
///
/// Membership is decided by `shift_id`; records of other shifts are
/// ignored. Ties on timestamp are ordered by receipt number, newest first,
/// so the listing is stable across calls.
pub fn shift_entries(
    shift: &Shift,
    sales: &[Sale],
    withdrawals: &[Withdrawal],
    expenses: &[Expense],
) -> Vec<LedgerEntry> {
    let mut entries: Vec<LedgerEntry> = sales
        .iter()
        .filter(|s| s.shift_id == shift.id)
        .map(LedgerEntry::from_sale)
        .chain(
            withdrawals
                .iter()
                .filter(|w| w.shift_id == shift.id)
                .map(LedgerEntry::from_withdrawal),
        )
        .chain(
            expenses
                .iter()
                .filter(|e| e.shift_id == shift.id)
                .map(LedgerEntry::from_expense),
        )
        .collect();

    entries.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.receipt_number.cmp(&a.receipt_number))
    });
    entries
}

// =============================================================================
// Shift Totals
// =============================================================================

/// Running totals of a shift per payment rail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShiftTotals {
    pub cash: Money,
    pub transfer: Money,
    pub account_credit: Money,
    /// Sum of every entry's signed total.
    pub general: Money,
}

impl ShiftTotals {
    pub const fn zero() -> Self {
        ShiftTotals {
            cash: Money::zero(),
            transfer: Money::zero(),
            account_credit: Money::zero(),
            general: Money::zero(),
        }
    }

    /// `general == cash + transfer + account_credit`
    pub fn is_balanced(&self) -> bool {
        self.general == self.cash + self.transfer + self.account_credit
    }

    fn add_entry(&mut self, entry: &LedgerEntry) {
        self.cash += entry.breakdown.cash;
        self.transfer += entry.breakdown.transfer;
        self.account_credit += entry.breakdown.account_credit;
        self.general += entry.total;
    }
}

/// Reduces entries to totals. Pure: the same entries always give the same
/// totals, in any order.
pub fn compute_totals(entries: &[LedgerEntry]) -> ShiftTotals {
    entries.iter().fold(ShiftTotals::zero(), |mut totals, entry| {
        totals.add_entry(entry);
        totals
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
