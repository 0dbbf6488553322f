//! # Sale Repository
//!
//! Storage for sales and their line items.
//!
//! ## Layout
//! ```text
//! ┌───────────────────────────────┐        ┌──────────────────────────────┐
//! │ sales                         │ 1    n │ sale_items                   │
//! │  id, shift_id (FK)            │───────►│  (sale_id, position)         │
//! │  receipt_number, kind         │        │  product snapshot            │
//! │  total_cents, payment_method  │        │  quantity, custom price      │
//! │  cash/transfer/credit cents   │        │  subtotal_cents              │
//! └───────────────────────────────┘        └──────────────────────────────┘
//! ```
//!
//! Sales are append-only. They are written by the shift operations in
//! [`super::shift`], inside the same transaction that bumps the shift
//! version; this repository only reads.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::debug;

use crate::error::DbResult;
use kiosco_core::{
    Money, PaymentBreakdown, PaymentMethod, ProductSnapshot, Sale, SaleItem, SaleKind,
};

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, FromRow)]
struct SaleRow {
    id: String,
    shift_id: String,
    receipt_number: String,
    kind: SaleKind,
    total_cents: i64,
    payment_method: PaymentMethod,
    cash_cents: i64,
    transfer_cents: i64,
    account_credit_cents: i64,
    customer_name: Option<String>,
    lot_number: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct SaleItemRow {
    sale_id: String,
    product_id: String,
    product_name: String,
    product_category: String,
    product_price_cents: i64,
    custom_price_cents: Option<i64>,
    quantity: i64,
    subtotal_cents: i64,
}

impl SaleRow {
    fn into_sale(self, items: Vec<SaleItem>) -> Sale {
        Sale {
            id: self.id,
            shift_id: self.shift_id,
            receipt_number: self.receipt_number,
            kind: self.kind,
            items,
            total: Money::from_cents(self.total_cents),
            payment_method: self.payment_method,
            breakdown: PaymentBreakdown {
                cash: Money::from_cents(self.cash_cents),
                transfer: Money::from_cents(self.transfer_cents),
                account_credit: Money::from_cents(self.account_credit_cents),
            },
            customer_name: self.customer_name,
            lot_number: self.lot_number,
            created_at: self.created_at,
        }
    }
}

impl From<SaleItemRow> for SaleItem {
    fn from(row: SaleItemRow) -> Self {
        SaleItem {
            product: ProductSnapshot {
                id: row.product_id,
                name: row.product_name,
                category: row.product_category,
                price: Money::from_cents(row.product_price_cents),
            },
            quantity: row.quantity,
            custom_price: row.custom_price_cents.map(Money::from_cents),
            subtotal: Money::from_cents(row.subtotal_cents),
        }
    }
}

const SALE_COLUMNS: &str = r#"
    id, shift_id, receipt_number, kind, total_cents, payment_method,
    cash_cents, transfer_cents, account_credit_cents,
    customer_name, lot_number, created_at
"#;

const ITEM_COLUMNS: &str = r#"
    si.sale_id, si.product_id, si.product_name, si.product_category,
    si.product_price_cents, si.custom_price_cents, si.quantity, si.subtotal_cents
"#;

/// Attaches items to their sales, keeping each sale's item order.
fn assemble(rows: Vec<SaleRow>, items: Vec<SaleItemRow>) -> Vec<Sale> {
    let mut by_sale: HashMap<String, Vec<SaleItem>> = HashMap::new();
    for item in items {
        by_sale.entry(item.sale_id.clone()).or_default().push(item.into());
    }
    rows.into_iter()
        .map(|row| {
            let items = by_sale.remove(&row.id).unwrap_or_default();
            row.into_sale(items)
        })
        .collect()
}

// =============================================================================
// Connection-level Operations (used inside shift transactions)
// =============================================================================

/// Inserts a sale and its items.
pub(crate) async fn insert_sale(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
    debug!(id = %sale.id, receipt_number = %sale.receipt_number, total = %sale.total, "Inserting sale");

    sqlx::query(
        r#"
        INSERT INTO sales (
            id, shift_id, receipt_number, kind, total_cents, payment_method,
            cash_cents, transfer_cents, account_credit_cents,
            customer_name, lot_number, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.shift_id)
    .bind(&sale.receipt_number)
    .bind(sale.kind)
    .bind(sale.total.cents())
    .bind(sale.payment_method)
    .bind(sale.breakdown.cash.cents())
    .bind(sale.breakdown.transfer.cents())
    .bind(sale.breakdown.account_credit.cents())
    .bind(&sale.customer_name)
    .bind(&sale.lot_number)
    .bind(sale.created_at)
    .execute(&mut *conn)
    .await?;

    for (position, item) in sale.items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO sale_items (
                sale_id, position, product_id, product_name, product_category,
                product_price_cents, custom_price_cents, quantity, subtotal_cents
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&sale.id)
        .bind(position as i64)
        .bind(&item.product.id)
        .bind(&item.product.name)
        .bind(&item.product.category)
        .bind(item.product.price.cents())
        .bind(item.custom_price.map(|p| p.cents()))
        .bind(item.quantity)
        .bind(item.subtotal.cents())
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// All sales of a shift, oldest first.
pub(crate) async fn fetch_by_shift(
    conn: &mut SqliteConnection,
    shift_id: &str,
) -> DbResult<Vec<Sale>> {
    let rows: Vec<SaleRow> = sqlx::query_as(&format!(
        "SELECT {SALE_COLUMNS} FROM sales WHERE shift_id = ?1 ORDER BY created_at, receipt_number"
    ))
    .bind(shift_id)
    .fetch_all(&mut *conn)
    .await?;

    let items: Vec<SaleItemRow> = sqlx::query_as(&format!(
        r#"
        SELECT {ITEM_COLUMNS}
        FROM sale_items si
        JOIN sales s ON s.id = si.sale_id
        WHERE s.shift_id = ?1
        ORDER BY si.sale_id, si.position
        "#
    ))
    .bind(shift_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(assemble(rows, items))
}

// =============================================================================
// Repository
// =============================================================================

/// Read access to sales.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Sales recorded in a shift, oldest first.
    pub async fn list_by_shift(&self, shift_id: &str) -> DbResult<Vec<Sale>> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_shift(&mut conn, shift_id).await
    }

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let row: Option<SaleRow> =
            sqlx::query_as(&format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items: Vec<SaleItemRow> = sqlx::query_as(&format!(
            "SELECT {ITEM_COLUMNS} FROM sale_items si WHERE si.sale_id = ?1 ORDER BY si.position"
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(assemble(vec![row], items).pop())
    }

    /// Every sale in the store, newest first.
    pub async fn list_all(&self) -> DbResult<Vec<Sale>> {
        let rows: Vec<SaleRow> = sqlx::query_as(&format!(
            "SELECT {SALE_COLUMNS} FROM sales ORDER BY created_at DESC, receipt_number DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        let items: Vec<SaleItemRow> = sqlx::query_as(&format!(
            "SELECT {ITEM_COLUMNS} FROM sale_items si ORDER BY si.sale_id, si.position"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(assemble(rows, items))
    }

    /// Number of stored sales.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
