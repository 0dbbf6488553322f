//! # Legacy Backfill
//!
//! One-time conversion of the kiosk's JSON backup (the `exportData` file
//! of the browser version) into current records.
//!
//! ## What Changes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Backup (browser)                     Current records                  │
//! │  ─────────────────────────────────    ───────────────────────────────  │
//! │  amounts as floats                 →  Money (centavos, rounded)        │
//! │  "efectivo" / "combinado" ...      →  PaymentMethod                    │
//! │  paymentBreakdown missing          →  normalize_breakdown backfill     │
//! │  customerName "Caja Inicial - X"   →  SaleKind::InitialCash            │
//! │  sale ∈ turn by createdAt ≥ start  →  explicit shift_id                │
//! │  turn.transactions / expenses      →  Withdrawal / Expense rows        │
//! │  turnClosures                      →  TurnClosure (totals kept frozen) │
//! │  counters                          →  receipt / withdrawal counters    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Fail Closed
//! A record whose timestamp, amount or payment method cannot be read is
//! left out and reported in [`LegacyMigration::skipped`]; nothing is
//! guessed. This is the only place timestamps decide shift membership.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};
use ts_rs::TS;

use crate::ledger::ShiftTotals;
use crate::money::Money;
use crate::payment::{normalize_breakdown, settle_payment, PaymentBreakdown};
use crate::shift::ShiftLedger;
use crate::{MAX_AMOUNT, MAX_ITEM_QUANTITY};
use crate::types::{
    Expense, PaymentMethod, ProductSnapshot, Sale, SaleItem, SaleKind, Shift, ShiftStatus,
    TurnClosure, Withdrawal, INITIAL_CASH_SENTINEL,
};

// =============================================================================
// Backup Format
// =============================================================================

/// The parts of a kiosk backup the ledger imports. Products, movements and
/// settings are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacySnapshot {
    #[serde(default)]
    pub sales: Vec<LegacySale>,
    #[serde(default)]
    pub admin_turns: Vec<LegacyTurn>,
    #[serde(default)]
    pub turn_closures: Vec<LegacyClosure>,
    #[serde(default)]
    pub counters: LegacyCounters,
}

impl LegacySnapshot {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyCounters {
    #[serde(default)]
    pub receipt_counter: i64,
    #[serde(default)]
    pub withdrawal_counter: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyBreakdown {
    #[serde(default)]
    pub efectivo: f64,
    #[serde(default)]
    pub transferencia: f64,
    #[serde(default)]
    pub expensa: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyTotals {
    #[serde(default)]
    pub efectivo: f64,
    #[serde(default)]
    pub transferencia: f64,
    #[serde(default)]
    pub expensa: f64,
    #[serde(default, alias = "total")]
    pub general: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyProduct {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub price: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacySaleItem {
    #[serde(default)]
    pub product: LegacyProduct,
    #[serde(default)]
    pub quantity: f64,
    pub subtotal: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacySale {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub receipt_number: String,
    #[serde(default)]
    pub items: Vec<LegacySaleItem>,
    #[serde(default)]
    pub total: f64,
    pub payment_method: Option<String>,
    pub customer_name: Option<String>,
    pub lot_number: Option<String>,
    pub payment_breakdown: Option<LegacyBreakdown>,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyWithdrawal {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub receipt_number: String,
    pub withdrawal_id: Option<String>,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub admin_name: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyExpense {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub receipt_number: String,
    #[serde(default)]
    pub concept: String,
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub admin_name: String,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyTurn {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub admin_name: String,
    #[serde(default)]
    pub start_date: String,
    pub end_date: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub sales: Vec<LegacySale>,
    #[serde(default)]
    pub transactions: Vec<LegacyWithdrawal>,
    #[serde(default)]
    pub expenses: Vec<LegacyExpense>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyClosure {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub turn_id: String,
    #[serde(default)]
    pub admin_name: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default)]
    pub sales: Vec<LegacySale>,
    #[serde(default)]
    pub transactions: Vec<LegacyWithdrawal>,
    #[serde(default)]
    pub expenses: Vec<LegacyExpense>,
    #[serde(default)]
    pub totals: LegacyTotals,
    #[serde(default)]
    pub sales_count: i64,
    pub created_at: Option<String>,
}

// =============================================================================
// Migration Result
// =============================================================================

/// A record left out of the import, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SkippedRecord {
    pub entity: String,
    pub id: String,
    pub reason: String,
}

/// Backfilled records, ready to be written.
#[derive(Debug, Clone, Default)]
pub struct LegacyMigration {
    /// Shifts with their sales, withdrawals and expenses. At most one is
    /// active.
    pub shifts: Vec<ShiftLedger>,
    pub closures: Vec<TurnClosure>,
    pub receipt_counter: i64,
    pub withdrawal_counter: i64,
    pub skipped: Vec<SkippedRecord>,
}

impl LegacyMigration {
    pub fn sale_count(&self) -> usize {
        self.shifts.iter().map(|l| l.sales.len()).sum()
    }
}

// =============================================================================
// Backfill
// =============================================================================

fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Sequence number of a `KD-<year>-<seq>` or `RETIRO-<seq>` identifier.
fn trailing_seq(raw: &str) -> Option<i64> {
    raw.rsplit('-').next().and_then(|s| s.parse().ok())
}

#[derive(Default)]
struct Backfill {
    skipped: Vec<SkippedRecord>,
}

impl Backfill {
    fn skip(&mut self, entity: &str, id: &str, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(entity, id, reason = %reason, "Skipping legacy record");
        self.skipped.push(SkippedRecord {
            entity: entity.to_string(),
            id: id.to_string(),
            reason,
        });
    }

    fn money(&mut self, entity: &str, id: &str, field: &str, amount: f64) -> Option<Money> {
        match Money::from_decimal(amount) {
            None => {
                self.skip(entity, id, format!("{field} is not a usable amount"));
                None
            }
            Some(m) if m.abs() > MAX_AMOUNT => {
                self.skip(entity, id, format!("{field} exceeds {MAX_AMOUNT}"));
                None
            }
            Some(m) => Some(m),
        }
    }

    fn quantity(&mut self, id: &str, raw: f64) -> Option<i64> {
        let rounded = raw.round();
        if !rounded.is_finite() || rounded < 1.0 || rounded > MAX_ITEM_QUANTITY as f64 {
            self.skip(
                "sale",
                id,
                format!("item quantity {raw} is outside 1..={MAX_ITEM_QUANTITY}"),
            );
            return None;
        }
        Some(rounded as i64)
    }

    fn time(&mut self, entity: &str, id: &str, raw: &str) -> Option<DateTime<Utc>> {
        let parsed = parse_time(raw);
        if parsed.is_none() {
            self.skip(entity, id, format!("unreadable timestamp '{raw}'"));
        }
        parsed
    }

    fn sale(&mut self, legacy: &LegacySale, shift_id: &str) -> Option<Sale> {
        let id = legacy.id.as_str();
        if id.is_empty() {
            self.skip("sale", id, "missing id");
            return None;
        }
        let created_at = self.time("sale", id, &legacy.created_at)?;
        let total = self.money("sale", id, "total", legacy.total)?;

        let method = match legacy.payment_method.as_deref() {
            None => PaymentMethod::Cash,
            Some(code) => match code.parse::<PaymentMethod>() {
                Ok(method) => method,
                Err(_) => {
                    self.skip("sale", id, format!("unknown payment method '{code}'"));
                    return None;
                }
            },
        };

        let supplied = match &legacy.payment_breakdown {
            Some(b) => Some(PaymentBreakdown {
                cash: self.money("sale", id, "paymentBreakdown.efectivo", b.efectivo)?,
                transfer: self.money("sale", id, "paymentBreakdown.transferencia", b.transferencia)?,
                account_credit: self.money("sale", id, "paymentBreakdown.expensa", b.expensa)?,
            }),
            None => None,
        };
        let breakdown = settle_payment(total, method, supplied).unwrap_or_else(|err| {
            debug!(sale_id = id, error = %err, "Recomputing legacy payment breakdown");
            normalize_breakdown(total, method, None)
        });

        let mut items = Vec::with_capacity(legacy.items.len());
        for item in &legacy.items {
            let price = self.money("sale", id, "items.product.price", item.product.price)?;
            let quantity = self.quantity(id, item.quantity)?;
            let subtotal = match item.subtotal {
                Some(subtotal) => self.money("sale", id, "items.subtotal", subtotal)?,
                None => price.multiply_quantity(quantity),
            };
            let custom_price = (subtotal != price.multiply_quantity(quantity))
                .then(|| subtotal.div_round(quantity));
            items.push(SaleItem {
                product: ProductSnapshot {
                    id: item.product.id.clone(),
                    name: item.product.name.clone(),
                    category: item.product.category.clone(),
                    price,
                },
                quantity,
                custom_price,
                subtotal,
            });
        }

        let is_seed = legacy
            .customer_name
            .as_deref()
            .is_some_and(|name| name.contains(INITIAL_CASH_SENTINEL));

        Some(Sale {
            id: legacy.id.clone(),
            shift_id: shift_id.to_string(),
            receipt_number: legacy.receipt_number.clone(),
            kind: if is_seed {
                SaleKind::InitialCash
            } else {
                SaleKind::Ordinary
            },
            items,
            total,
            payment_method: method,
            breakdown,
            customer_name: legacy.customer_name.clone().filter(|n| !n.trim().is_empty()),
            lot_number: legacy.lot_number.clone().filter(|n| !n.trim().is_empty()),
            created_at,
        })
    }

    fn withdrawal(&mut self, legacy: &LegacyWithdrawal, shift_id: &str) -> Option<Withdrawal> {
        let id = legacy.id.as_str();
        if id.is_empty() {
            self.skip("withdrawal", id, "missing id");
            return None;
        }
        let created_at = self.time("withdrawal", id, &legacy.created_at)?;
        let amount = self.money("withdrawal", id, "amount", legacy.amount)?;
        Some(Withdrawal {
            id: legacy.id.clone(),
            shift_id: shift_id.to_string(),
            receipt_number: legacy.receipt_number.clone(),
            withdrawal_id: legacy.withdrawal_id.clone().unwrap_or_default(),
            amount: amount.abs(),
            admin_name: legacy.admin_name.clone(),
            note: legacy.notes.clone(),
            created_at,
        })
    }

    fn expense(&mut self, legacy: &LegacyExpense, shift_id: &str) -> Option<Expense> {
        let id = legacy.id.as_str();
        if id.is_empty() {
            self.skip("expense", id, "missing id");
            return None;
        }
        let created_at = self.time("expense", id, &legacy.created_at)?;
        let amount = self.money("expense", id, "amount", legacy.amount)?;
        Some(Expense {
            id: legacy.id.clone(),
            shift_id: shift_id.to_string(),
            receipt_number: legacy.receipt_number.clone(),
            concept: legacy.concept.clone(),
            detail: legacy.detail.clone(),
            amount: amount.abs(),
            payment_method: PaymentMethod::Cash,
            admin_name: legacy.admin_name.clone(),
            created_at,
        })
    }

    fn totals(&mut self, id: &str, legacy: &LegacyTotals) -> Option<ShiftTotals> {
        Some(ShiftTotals {
            cash: self.money("closure", id, "totals.efectivo", legacy.efectivo)?,
            transfer: self.money("closure", id, "totals.transferencia", legacy.transferencia)?,
            account_credit: self.money("closure", id, "totals.expensa", legacy.expensa)?,
            general: self.money("closure", id, "totals.general", legacy.general)?,
        })
    }
}

/// Converts a kiosk backup into current records.
///
/// ## Steps
/// 1. Turns become shifts. If the backup has several `active` turns, only
///    the most recent stays active; the others are closed at the start of
///    the next one.
/// 2. Each sale (top-level or embedded in a turn, deduplicated by id) goes
///    to the latest shift started at or before it. Sales before the first
///    shift, or after a closed shift ended, are skipped.
/// 3. Withdrawals and expenses stay with the turn that embedded them.
/// 4. Closures keep their frozen totals. A closure whose turn is missing
///    gets a closed, empty shift so it can still be stored.
/// 5. Counters are raised to the highest sequence seen in the records.
pub fn backfill(snapshot: &LegacySnapshot) -> LegacyMigration {
    let mut bf = Backfill::default();

    // -- 1. Shifts ------------------------------------------------------------
    let mut shifts: Vec<ShiftLedger> = Vec::new();
    let mut seen_turns = HashSet::new();
    for turn in &snapshot.admin_turns {
        if turn.id.is_empty() || !seen_turns.insert(turn.id.clone()) {
            bf.skip("shift", &turn.id, "missing or duplicate id");
            continue;
        }
        let Some(started_at) = bf.time("shift", &turn.id, &turn.start_date) else {
            continue;
        };
        let status = match turn.status.as_str() {
            "active" => ShiftStatus::Active,
            "closed" => ShiftStatus::Closed,
            other => {
                bf.skip("shift", &turn.id, format!("unknown status '{other}'"));
                continue;
            }
        };
        let ended_at = turn.end_date.as_deref().and_then(parse_time);
        if status == ShiftStatus::Closed && ended_at.is_none() {
            bf.skip("shift", &turn.id, "closed turn without a readable end date");
            continue;
        }

        shifts.push(ShiftLedger {
            shift: Shift {
                id: turn.id.clone(),
                admin_name: turn.admin_name.clone(),
                started_at,
                ended_at: if status == ShiftStatus::Active { None } else { ended_at },
                status,
                cached_totals: ShiftTotals::zero(),
                version: 1,
            },
            sales: Vec::new(),
            withdrawals: Vec::new(),
            expenses: Vec::new(),
        });
    }
    shifts.sort_by(|a, b| a.shift.started_at.cmp(&b.shift.started_at));

    // Keep only the most recent active shift active
    let last_active = shifts.iter().rposition(|l| l.shift.is_active());
    for i in 0..shifts.len() {
        if shifts[i].shift.is_active() && Some(i) != last_active {
            let next_start = shifts.get(i + 1).map(|n| n.shift.started_at);
            let ledger = &mut shifts[i];
            warn!(shift_id = %ledger.shift.id, "Closing extra active legacy turn");
            ledger.shift.status = ShiftStatus::Closed;
            ledger.shift.ended_at = Some(next_start.unwrap_or(ledger.shift.started_at));
        }
    }

    // -- 2. Sales by timestamp membership -------------------------------------
    let embedded = snapshot.admin_turns.iter().flat_map(|t| t.sales.iter());
    let mut seen_sales = HashSet::new();
    for legacy in snapshot.sales.iter().chain(embedded) {
        if !legacy.id.is_empty() && !seen_sales.insert(legacy.id.clone()) {
            continue;
        }
        let Some(at) = parse_time(&legacy.created_at) else {
            bf.skip("sale", &legacy.id, format!("unreadable timestamp '{}'", legacy.created_at));
            continue;
        };
        let owner = shifts
            .iter()
            .rposition(|l| l.shift.started_at <= at)
            .filter(|&i| shifts[i].shift.ended_at.map_or(true, |end| at <= end));
        let Some(index) = owner else {
            bf.skip("sale", &legacy.id, "not inside any shift");
            continue;
        };
        let shift_id = shifts[index].shift.id.clone();
        if let Some(sale) = bf.sale(legacy, &shift_id) {
            shifts[index].sales.push(sale);
        }
    }

    // -- 3. Embedded withdrawals and expenses ---------------------------------
    let index_of: HashMap<String, usize> = shifts
        .iter()
        .enumerate()
        .map(|(i, l)| (l.shift.id.clone(), i))
        .collect();
    for turn in &snapshot.admin_turns {
        let Some(&index) = index_of.get(&turn.id) else {
            continue;
        };
        for legacy in &turn.transactions {
            if let Some(w) = bf.withdrawal(legacy, &turn.id) {
                shifts[index].withdrawals.push(w);
            }
        }
        for legacy in &turn.expenses {
            if let Some(e) = bf.expense(legacy, &turn.id) {
                shifts[index].expenses.push(e);
            }
        }
    }

    for ledger in &mut shifts {
        ledger.shift.cached_totals = ledger.totals();
    }

    // -- 4. Closures -----------------------------------------------------------
    let mut closures: Vec<TurnClosure> = Vec::new();
    let mut closed_shifts = HashSet::new();
    for legacy in &snapshot.turn_closures {
        let id = legacy.id.as_str();
        if id.is_empty() || legacy.turn_id.is_empty() {
            bf.skip("closure", id, "missing closure or turn id");
            continue;
        }
        if !closed_shifts.insert(legacy.turn_id.clone()) {
            bf.skip("closure", id, "shift already has a closure");
            continue;
        }
        let Some(started_at) = bf.time("closure", id, &legacy.start_date) else {
            continue;
        };
        let Some(ended_at) = bf.time("closure", id, &legacy.end_date) else {
            continue;
        };
        let Some(totals) = bf.totals(id, &legacy.totals) else {
            continue;
        };

        let turn_id = legacy.turn_id.as_str();
        let known = index_of.get(turn_id).copied();
        if known.is_some_and(|i| shifts[i].shift.is_active()) {
            bf.skip("closure", id, "its shift is still active");
            continue;
        }

        let sales = legacy.sales.iter().filter_map(|s| bf.sale(s, turn_id)).collect();
        let withdrawals = legacy
            .transactions
            .iter()
            .filter_map(|w| bf.withdrawal(w, turn_id))
            .collect();
        let expenses = legacy.expenses.iter().filter_map(|e| bf.expense(e, turn_id)).collect();

        if known.is_none() {
            shifts.push(ShiftLedger {
                shift: Shift {
                    id: turn_id.to_string(),
                    admin_name: legacy.admin_name.clone(),
                    started_at,
                    ended_at: Some(ended_at),
                    status: ShiftStatus::Closed,
                    cached_totals: totals,
                    version: 1,
                },
                sales: Vec::new(),
                withdrawals: Vec::new(),
                expenses: Vec::new(),
            });
        }

        closures.push(TurnClosure {
            id: legacy.id.clone(),
            shift_id: turn_id.to_string(),
            admin_name: legacy.admin_name.clone(),
            started_at,
            ended_at,
            sales,
            withdrawals,
            expenses,
            totals,
            sales_count: legacy.sales_count,
            created_at: legacy.created_at.as_deref().and_then(parse_time).unwrap_or(ended_at),
        });
    }

    // -- 5. Counters -----------------------------------------------------------
    let receipts = shifts
        .iter()
        .flat_map(|l| {
            l.sales
                .iter()
                .map(|s| s.receipt_number.as_str())
                .chain(l.withdrawals.iter().map(|w| w.receipt_number.as_str()))
                .chain(l.expenses.iter().map(|e| e.receipt_number.as_str()))
        })
        .filter_map(trailing_seq)
        .max()
        .unwrap_or(0);
    let withdrawal_ids = shifts
        .iter()
        .flat_map(|l| l.withdrawals.iter().map(|w| w.withdrawal_id.as_str()))
        .filter_map(trailing_seq)
        .max()
        .unwrap_or(0);

    LegacyMigration {
        shifts,
        closures,
        receipt_counter: snapshot.counters.receipt_counter.max(receipts),
        withdrawal_counter: snapshot.counters.withdrawal_counter.max(withdrawal_ids),
        skipped: bf.skipped,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const BACKUP: &str = r#"{
      "products": [{"id": "p1", "name": "Alfajor", "price": 150, "stock": 10}],
      "sales": [
        {"id": "s-seed", "receiptNumber": "KD-2025-000001", "items": [], "total": 1000,
         "paymentMethod": "efectivo", "customerName": "Caja Inicial - Marta",
         "createdAt": "2025-03-14T12:00:00.000Z"},
        {"id": "s-1", "receiptNumber": "KD-2025-000002",
         "items": [{"product": {"id": "p1", "name": "Alfajor", "category": "Golosinas", "price": 150},
                    "quantity": 2, "subtotal": 300}],
         "total": 300, "paymentMethod": "efectivo", "createdAt": "2025-03-14T12:10:00.000Z"},
        {"id": "s-2", "receiptNumber": "KD-2025-000003", "items": [], "total": 500,
         "paymentMethod": "combinado", "createdAt": "2025-03-14T12:20:00.000Z"},
        {"id": "s-old", "receiptNumber": "KD-2025-000009", "items": [], "total": 50,
         "paymentMethod": "transferencia", "createdAt": "2025-03-01T12:00:00.000Z"},
        {"id": "s-bad", "receiptNumber": "KD-2025-000004", "items": [], "total": 10,
         "paymentMethod": "efectivo", "createdAt": "not a date"}
      ],
      "adminTurns": [
        {"id": "t-1", "adminName": "Marta", "startDate": "2025-03-14T12:00:00.000Z",
         "status": "active", "sales": [],
         "transactions": [{"id": "w-1", "type": "retiro", "receiptNumber": "KD-2025-000005",
                           "withdrawalId": "RETIRO-0003", "amount": 200, "adminName": "Marta",
                           "notes": "Banco", "createdAt": "2025-03-14T13:00:00.000Z"}],
         "expenses": [],
         "totals": {"efectivo": 0, "transferencia": 0, "expensa": 0, "total": 0}},
        {"id": "t-0", "adminName": "Jorge", "startDate": "2025-03-13T12:00:00.000Z",
         "endDate": "2025-03-13T20:00:00.000Z", "status": "closed", "sales": []}
      ],
      "turnClosures": [
        {"id": "c-0", "turnId": "t-0", "adminName": "Jorge",
         "startDate": "2025-03-13T12:00:00.000Z", "endDate": "2025-03-13T20:00:00.000Z",
         "sales": [], "totals": {"efectivo": 100.5, "transferencia": 0, "expensa": 0, "general": 100.5},
         "salesCount": 1, "createdAt": "2025-03-13T20:00:00.000Z"},
        {"id": "c-x", "turnId": "t-gone", "adminName": "Ana",
         "startDate": "2025-02-01T12:00:00.000Z", "endDate": "2025-02-01T20:00:00.000Z",
         "totals": {"efectivo": 10, "transferencia": 0, "expensa": 0, "total": 10}, "salesCount": 0}
      ],
      "counters": {"receiptCounter": 7, "withdrawalCounter": 2}
    }"#;

    fn migrate() -> LegacyMigration {
        backfill(&LegacySnapshot::from_json(BACKUP).unwrap())
    }

    fn shift<'a>(m: &'a LegacyMigration, id: &str) -> &'a ShiftLedger {
        m.shifts.iter().find(|l| l.shift.id == id).unwrap()
    }

    #[test]
    fn test_sales_are_assigned_to_the_covering_shift() {
        let m = migrate();
        let active = shift(&m, "t-1");
        let ids: Vec<&str> = active.sales.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["s-seed", "s-1", "s-2"]);
        assert!(shift(&m, "t-0").sales.is_empty());
    }

    #[test]
    fn test_breakdowns_are_backfilled() {
        let m = migrate();
        let active = shift(&m, "t-1");
        for sale in &active.sales {
            assert_eq!(sale.breakdown.sum(), sale.total);
        }
        let combined = active.sales.iter().find(|s| s.id == "s-2").unwrap();
        assert_eq!(combined.breakdown.cash, Money::from_cents(16_667));
        assert_eq!(combined.breakdown.account_credit, Money::from_cents(16_666));
    }

    #[test]
    fn test_seed_is_recognized_by_sentinel() {
        let m = migrate();
        let seed = shift(&m, "t-1").sales.iter().find(|s| s.id == "s-seed").unwrap();
        assert_eq!(seed.kind, SaleKind::InitialCash);
    }

    #[test]
    fn test_unreadable_and_orphan_records_are_reported() {
        let m = migrate();
        let skipped: Vec<&str> = m.skipped.iter().map(|s| s.id.as_str()).collect();
        assert!(skipped.contains(&"s-bad"));
        assert!(skipped.contains(&"s-old"));
        assert_eq!(m.sale_count(), 3);
    }

    #[test]
    fn test_active_shift_totals_include_withdrawals() {
        let m = migrate();
        let active = shift(&m, "t-1");
        assert!(active.shift.is_active());
        assert_eq!(active.withdrawals.len(), 1);
        // 1000 + 300 + 500 combined (166.67 cash) - 200
        let totals = active.totals();
        assert_eq!(totals.general, Money::from_pesos(1600));
        assert_eq!(totals.cash, Money::from_cents(100_000 + 30_000 + 16_667 - 20_000));
        assert!(totals.is_balanced());
        assert_eq!(active.shift.cached_totals, totals);
    }

    #[test]
    fn test_closures_keep_frozen_totals() {
        let m = migrate();
        assert_eq!(m.closures.len(), 2);
        let c0 = m.closures.iter().find(|c| c.id == "c-0").unwrap();
        assert_eq!(c0.totals.general, Money::from_cents(10_050));
        assert_eq!(c0.sales_count, 1);

        // Closure without its turn gets a synthesized closed shift
        let synthesized = shift(&m, "t-gone");
        assert_eq!(synthesized.shift.status, ShiftStatus::Closed);
        let cx = m.closures.iter().find(|c| c.id == "c-x").unwrap();
        assert_eq!(cx.totals.general, Money::from_pesos(10));
    }

    #[test]
    fn test_counters_cover_highest_sequence() {
        let m = migrate();
        assert_eq!(m.receipt_counter, 7);
        assert_eq!(m.withdrawal_counter, 3);
    }

    #[test]
    fn test_malformed_amounts_and_quantities_are_skipped() {
        let json = r#"{
          "adminTurns": [{"id": "t", "adminName": "A", "startDate": "2025-01-01T10:00:00Z",
                          "status": "active",
                          "transactions": [{"id": "w-huge", "amount": 1e30, "notes": "x",
                                            "createdAt": "2025-01-01T10:30:00Z"}]}],
          "sales": [
            {"id": "s-qty", "items": [{"product": {"id": "p", "name": "P", "price": 1}, "quantity": 1e20}],
             "total": 1, "createdAt": "2025-01-01T11:00:00Z"},
            {"id": "s-zero", "items": [{"product": {"id": "p", "name": "P", "price": 1}, "quantity": 0}],
             "total": 0, "createdAt": "2025-01-01T11:01:00Z"},
            {"id": "s-total", "items": [], "total": 9e16, "createdAt": "2025-01-01T11:02:00Z"},
            {"id": "s-ok", "items": [{"product": {"id": "p", "name": "P", "price": 1}, "quantity": 3}],
             "total": 3, "createdAt": "2025-01-01T11:03:00Z"}
          ]
        }"#;
        let m = backfill(&LegacySnapshot::from_json(json).unwrap());

        let skipped: Vec<&str> = m.skipped.iter().map(|s| s.id.as_str()).collect();
        for id in ["w-huge", "s-qty", "s-zero", "s-total"] {
            assert!(skipped.contains(&id), "{id} should be skipped");
        }
        let ledger = shift(&m, "t");
        assert_eq!(ledger.sales.len(), 1);
        assert_eq!(ledger.sales[0].items[0].quantity, 3);
        assert!(ledger.withdrawals.is_empty());
        assert_eq!(ledger.totals().general, Money::from_pesos(3));
    }

    #[test]
    fn test_only_one_active_shift_survives() {
        let json = r#"{"adminTurns": [
            {"id": "a", "adminName": "A", "startDate": "2025-01-01T10:00:00Z", "status": "active"},
            {"id": "b", "adminName": "B", "startDate": "2025-01-02T10:00:00Z", "status": "active"}
        ]}"#;
        let m = backfill(&LegacySnapshot::from_json(json).unwrap());
        let active: Vec<&str> = m
            .shifts
            .iter()
            .filter(|l| l.shift.is_active())
            .map(|l| l.shift.id.as_str())
            .collect();
        assert_eq!(active, vec!["b"]);
        assert_eq!(
            shift(&m, "a").shift.ended_at.map(|t| t.to_rfc3339()),
            Some("2025-01-02T10:00:00+00:00".to_string())
        );
    }
}
