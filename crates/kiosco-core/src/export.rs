//! # CSV Export
//!
//! Spreadsheet exports of the arqueo and of the closure history, in the
//! column layout the kiosk's accountant already imports.
//!
//! ## Transactions Layout
//! ```text
//! ┌────────────────────── repeated on every row ──────────────────────┐
//! │ Fecha │ Hora │ Tipo │ Recibo │ Cliente │ Lote │ Origen            │
//! ├──────────────────────── one per line item ────────────────────────┤
//! │ Item │ Cantidad │ Precio Unitario │ Subtotal Item                 │
//! ├───────────── first row of the transaction only ───────────────────┤
//! │ Total Transacción │ Método │ Efectivo │ Transferencia │ Expensa │ │
//! │ Notas                                                             │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every cell is double-quoted, rows are joined with `\n`, amounts are
//! plain numbers (`300`, `300.5`). "Precio Unitario" is the catalog price
//! captured with the item; a custom price only shows in the subtotal. Dates are rendered in the store's UTC
//! offset as `d/m/yyyy` and `H:MM:SS`.

use chrono::{DateTime, FixedOffset, Utc};

use crate::closure::{average_per_sale, duration_hours};
use crate::ledger::LedgerEntry;
use crate::types::TurnClosure;

pub const TRANSACTION_HEADERS: [&str; 17] = [
    "Fecha",
    "Hora",
    "Tipo",
    "Recibo",
    "Cliente",
    "Lote",
    "Origen",
    "Item",
    "Cantidad",
    "Precio Unitario",
    "Subtotal Item",
    "Total Transacción",
    "Método",
    "Efectivo",
    "Transferencia",
    "Expensa",
    "Notas",
];

pub const CLOSURE_HEADERS: [&str; 11] = [
    "ID Cierre",
    "Administrador",
    "Fecha Inicio",
    "Fecha Fin",
    "Duración (horas)",
    "Cantidad Ventas",
    "Total Efectivo",
    "Total Transferencia",
    "Total Expensa",
    "Total General",
    "Promedio por Venta",
];

/// Placeholder item for entries without line items (withdrawals, expenses).
const NO_ITEMS: &str = "Sin items detallados";

fn quote(cell: &str) -> String {
    format!("\"{}\"", cell.replace('"', "\"\""))
}

fn render<I, R>(headers: &[&str], rows: I) -> String
where
    I: IntoIterator<Item = R>,
    R: AsRef<[String]>,
{
    let mut lines = vec![headers.iter().map(|h| quote(h)).collect::<Vec<_>>().join(",")];
    lines.extend(
        rows.into_iter()
            .map(|row| row.as_ref().iter().map(|c| quote(c)).collect::<Vec<_>>().join(",")),
    );
    lines.join("\n")
}

fn local_date(at: DateTime<Utc>, offset: FixedOffset) -> String {
    at.with_timezone(&offset).format("%-d/%-m/%Y").to_string()
}

fn local_time(at: DateTime<Utc>, offset: FixedOffset) -> String {
    at.with_timezone(&offset).format("%-H:%M:%S").to_string()
}

// =============================================================================
// Transactions
// =============================================================================

/// Renders the shift's transaction list, one row per line item.
///
/// Entries are written in the order given (the ledger lists newest first).
pub fn transactions_csv(entries: &[LedgerEntry], offset: FixedOffset) -> String {
    let mut rows: Vec<Vec<String>> = Vec::new();

    for entry in entries {
        let base = [
            local_date(entry.created_at, offset),
            local_time(entry.created_at, offset),
            entry.kind.label().to_string(),
            entry.receipt_number.clone(),
            entry.customer.clone(),
            entry.lot.clone(),
            entry.origin.clone(),
        ];
        let money_cells = [
            entry.total.to_plain_string(),
            entry.method_text(),
            entry.breakdown.cash.to_plain_string(),
            entry.breakdown.transfer.to_plain_string(),
            entry.breakdown.account_credit.to_plain_string(),
            entry.notes.clone().unwrap_or_default(),
        ];

        if entry.items.is_empty() {
            let total = entry.total.to_plain_string();
            let mut row = base.to_vec();
            row.extend([NO_ITEMS.to_string(), "1".to_string(), total.clone(), total]);
            row.extend(money_cells);
            rows.push(row);
            continue;
        }

        for (index, item) in entry.items.iter().enumerate() {
            let mut row = base.to_vec();
            row.extend([
                item.product.name.clone(),
                item.quantity.to_string(),
                item.product.price.to_plain_string(),
                item.subtotal.to_plain_string(),
            ]);
            if index == 0 {
                row.extend(money_cells.iter().cloned());
            } else {
                row.extend(std::iter::repeat(String::new()).take(money_cells.len()));
            }
            rows.push(row);
        }
    }

    render(&TRANSACTION_HEADERS, rows)
}

// =============================================================================
// Closures
// =============================================================================

/// Renders one row per closure.
pub fn closures_csv(closures: &[TurnClosure], offset: FixedOffset) -> String {
    let rows = closures.iter().map(|c| {
        let short_id: String = {
            let chars: Vec<char> = c.id.chars().collect();
            chars[chars.len().saturating_sub(8)..].iter().collect()
        };
        vec![
            short_id,
            c.admin_name.clone(),
            format!("{} {}", local_date(c.started_at, offset), local_time(c.started_at, offset)),
            format!("{} {}", local_date(c.ended_at, offset), local_time(c.ended_at, offset)),
            format!("{:.2}", duration_hours(c)),
            c.sales_count.to_string(),
            c.totals.cash.to_fixed_string(),
            c.totals.transfer.to_fixed_string(),
            c.totals.account_credit.to_fixed_string(),
            c.totals.general.to_fixed_string(),
            average_per_sale(c).to_fixed_string(),
        ]
    });

    render(&CLOSURE_HEADERS, rows)
}

// =============================================================================
// Unit Tests
// =============================================================================
