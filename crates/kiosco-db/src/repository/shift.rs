//! # Shift Repository
//!
//! Atomic shift operations. Each one runs the ledger state machine from
//! `kiosco-core` inside a single SQLite transaction.
//!
//! ## Operation Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN IMMEDIATE  (write lock taken up front; other writers wait)      │
//! │    │                                                                    │
//! │    ├── load shift + sales + withdrawals + expenses                      │
//! │    │     └── shift.version ≠ expected ? ──► StaleWrite (rollback)       │
//! │    │                                                                    │
//! │    ├── allocate receipt / withdrawal numbers (counters table)          │
//! │    │                                                                    │
//! │    ├── ShiftLedger::record_* / close   ──► CoreError ? (rollback)       │
//! │    │                                                                    │
//! │    ├── INSERT the new record                                            │
//! │    │                                                                    │
//! │    └── UPDATE shifts ... WHERE id = ? AND version = ?                   │
//! │          └── 0 rows ? ──► StaleWrite (rollback)                         │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A rollback also returns the allocated numbers, so rejected operations
//! leave no gaps in the receipt sequence.
//!
//! Taking the write lock at BEGIN means a second store on the same file
//! queues behind the first (up to the busy timeout) and then reads the
//! bumped version, so a lost race surfaces as `StaleWrite` rather than a
//! lock error.

use chrono::{DateTime, SubsecRound, Utc};
use sqlx::{FromRow, Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::closure::insert_closure;
use crate::repository::counter::{allocate_receipt, allocate_withdrawal_id};
use crate::repository::outflow::{
    fetch_expenses, fetch_withdrawals, insert_expense, insert_withdrawal,
};
use crate::repository::sale::{fetch_by_shift, insert_sale};
use kiosco_core::{
    CoreError, Expense, Money, OpenShift, Sale, SaleDraft, Shift, ShiftLedger, ShiftStatus,
    ShiftTotals, Stamp, TurnClosure, Withdrawal,
};

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, FromRow)]
struct ShiftRow {
    id: String,
    admin_name: String,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    status: ShiftStatus,
    cash_cents: i64,
    transfer_cents: i64,
    account_credit_cents: i64,
    general_cents: i64,
    version: i64,
}

impl From<ShiftRow> for Shift {
    fn from(row: ShiftRow) -> Self {
        Shift {
            id: row.id,
            admin_name: row.admin_name,
            started_at: row.started_at,
            ended_at: row.ended_at,
            status: row.status,
            cached_totals: ShiftTotals {
                cash: Money::from_cents(row.cash_cents),
                transfer: Money::from_cents(row.transfer_cents),
                account_credit: Money::from_cents(row.account_credit_cents),
                general: Money::from_cents(row.general_cents),
            },
            version: row.version,
        }
    }
}

const SHIFT_COLUMNS: &str = r#"
    id, admin_name, started_at, ended_at, status,
    cash_cents, transfer_cents, account_credit_cents, general_cents, version
"#;

/// A record written by a shift operation, with the shift as it is now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded<T> {
    pub record: T,
    pub shift: Shift,
}

/// Timestamps are kept at millisecond precision.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Connection-level Operations
// =============================================================================

pub(crate) async fn fetch_shift(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Shift>> {
    let row: Option<ShiftRow> =
        sqlx::query_as(&format!("SELECT {SHIFT_COLUMNS} FROM shifts WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(row.map(Shift::from))
}

pub(crate) async fn fetch_active(conn: &mut SqliteConnection) -> DbResult<Option<Shift>> {
    let row: Option<ShiftRow> = sqlx::query_as(&format!(
        "SELECT {SHIFT_COLUMNS} FROM shifts WHERE status = 'active'"
    ))
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.map(Shift::from))
}

pub(crate) async fn fetch_ledger(conn: &mut SqliteConnection, shift: Shift) -> DbResult<ShiftLedger> {
    let sales = fetch_by_shift(conn, &shift.id).await?;
    let withdrawals = fetch_withdrawals(conn, &shift.id).await?;
    let expenses = fetch_expenses(conn, &shift.id).await?;
    Ok(ShiftLedger {
        shift,
        sales,
        withdrawals,
        expenses,
    })
}

pub(crate) async fn insert_shift(conn: &mut SqliteConnection, shift: &Shift) -> DbResult<()> {
    debug!(id = %shift.id, admin = %shift.admin_name, status = ?shift.status, "Inserting shift");

    let totals = shift.cached_totals;
    sqlx::query(
        r#"
        INSERT INTO shifts (
            id, admin_name, started_at, ended_at, status,
            cash_cents, transfer_cents, account_credit_cents, general_cents, version
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&shift.id)
    .bind(&shift.admin_name)
    .bind(shift.started_at)
    .bind(shift.ended_at)
    .bind(shift.status)
    .bind(totals.cash.cents())
    .bind(totals.transfer.cents())
    .bind(totals.account_credit.cents())
    .bind(totals.general.cents())
    .bind(shift.version)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Compare-and-set write of the shift row.
async fn write_shift(
    conn: &mut SqliteConnection,
    shift: &Shift,
    expected_version: i64,
) -> DbResult<()> {
    let totals = shift.cached_totals;
    let result = sqlx::query(
        r#"
        UPDATE shifts SET
            status = ?1,
            ended_at = ?2,
            cash_cents = ?3,
            transfer_cents = ?4,
            account_credit_cents = ?5,
            general_cents = ?6,
            version = ?7
        WHERE id = ?8 AND version = ?9
        "#,
    )
    .bind(shift.status)
    .bind(shift.ended_at)
    .bind(totals.cash.cents())
    .bind(totals.transfer.cents())
    .bind(totals.account_credit.cents())
    .bind(totals.general.cents())
    .bind(shift.version)
    .bind(&shift.id)
    .bind(expected_version)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::stale("Shift", &shift.id));
    }
    Ok(())
}

/// Loads a shift for mutation, checking it is active and unchanged.
async fn load_for_write(
    conn: &mut SqliteConnection,
    shift_id: &str,
    expected_version: i64,
) -> DbResult<ShiftLedger> {
    let shift = fetch_shift(conn, shift_id)
        .await?
        .ok_or_else(|| DbError::not_found("Shift", shift_id))?;

    if !shift.is_active() {
        return Err(CoreError::NoActiveShift.into());
    }
    if shift.version != expected_version {
        return Err(DbError::stale("Shift", shift_id));
    }

    fetch_ledger(conn, shift).await
}

/// Starts a transaction that holds the database write lock from the start.
pub(crate) async fn begin_write(pool: &SqlitePool) -> DbResult<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

async fn new_stamp(conn: &mut SqliteConnection, at: DateTime<Utc>) -> DbResult<Stamp> {
    Ok(Stamp {
        id: new_id(),
        receipt_number: allocate_receipt(conn, at).await?,
        at,
    })
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for shifts and the records they own.
#[derive(Debug, Clone)]
pub struct ShiftRepository {
    pool: SqlitePool,
}

impl ShiftRepository {
    /// Creates a new ShiftRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ShiftRepository { pool }
    }

    /// The active shift, if any. Backed by the single-active unique index.
    pub async fn get_active(&self) -> DbResult<Option<Shift>> {
        let mut conn = self.pool.acquire().await?;
        fetch_active(&mut conn).await
    }

    /// Gets a shift by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Shift>> {
        let mut conn = self.pool.acquire().await?;
        fetch_shift(&mut conn, id).await
    }

    /// A shift with all of its records.
    pub async fn load_ledger(&self, id: &str) -> DbResult<ShiftLedger> {
        let mut conn = self.pool.acquire().await?;
        let shift = fetch_shift(&mut conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Shift", id))?;
        fetch_ledger(&mut conn, shift).await
    }

    /// The active shift with all of its records, if any.
    pub async fn active_ledger(&self) -> DbResult<Option<ShiftLedger>> {
        let mut conn = self.pool.acquire().await?;
        match fetch_active(&mut conn).await? {
            Some(shift) => Ok(Some(fetch_ledger(&mut conn, shift).await?)),
            None => Ok(None),
        }
    }

    /// Every shift, newest first.
    pub async fn list_all(&self) -> DbResult<Vec<Shift>> {
        let rows: Vec<ShiftRow> = sqlx::query_as(&format!(
            "SELECT {SHIFT_COLUMNS} FROM shifts ORDER BY started_at DESC, rowid DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Shift::from).collect())
    }

    /// Opens a shift, seeding it with the opening cash when positive.
    ///
    /// ## Errors
    /// - `Domain(ShiftAlreadyActive)` if a shift is active, including one
    ///   opened by another process between our read and our insert
    /// - `Domain(Validation)` for a blank name or negative cash
    pub async fn open(&self, admin_name: &str, initial_cash: Money) -> DbResult<ShiftLedger> {
        let mut tx = begin_write(&self.pool).await?;

        let active = fetch_active(&mut tx).await?;
        ShiftLedger::check_open(active.as_ref(), admin_name, initial_cash)?;

        let opened_at = now();
        let seed = if initial_cash.is_positive() {
            Some(new_stamp(&mut tx, opened_at).await?)
        } else {
            None
        };

        let ledger = ShiftLedger::open(
            active.as_ref(),
            OpenShift {
                shift_id: new_id(),
                admin_name: admin_name.to_string(),
                initial_cash,
                opened_at,
            },
            seed,
        )?;

        insert_shift(&mut tx, &ledger.shift).await.map_err(|e| {
            if e.is_active_shift_conflict() {
                CoreError::ShiftAlreadyActive {
                    admin_name: "another register".to_string(),
                }
                .into()
            } else {
                e
            }
        })?;
        for sale in &ledger.sales {
            insert_sale(&mut tx, sale).await?;
        }

        tx.commit().await?;

        info!(
            shift_id = %ledger.shift.id,
            admin = %ledger.shift.admin_name,
            initial_cash = %initial_cash,
            "Shift opened"
        );
        Ok(ledger)
    }

    /// Records a checkout in an active shift.
    pub async fn record_sale(
        &self,
        shift_id: &str,
        expected_version: i64,
        draft: SaleDraft,
    ) -> DbResult<Recorded<Sale>> {
        let mut tx = begin_write(&self.pool).await?;
        let mut ledger = load_for_write(&mut tx, shift_id, expected_version).await?;

        let stamp = new_stamp(&mut tx, now()).await?;
        let sale = ledger.record_sale(draft, stamp)?;

        insert_sale(&mut tx, &sale).await?;
        write_shift(&mut tx, &ledger.shift, expected_version).await?;
        tx.commit().await?;

        info!(
            shift_id,
            receipt_number = %sale.receipt_number,
            total = %sale.total,
            method = %sale.payment_method,
            "Sale recorded"
        );
        Ok(Recorded {
            record: sale,
            shift: ledger.shift,
        })
    }

    /// Records a cash withdrawal in an active shift.
    pub async fn record_withdrawal(
        &self,
        shift_id: &str,
        expected_version: i64,
        amount: Money,
        note: &str,
    ) -> DbResult<Recorded<Withdrawal>> {
        let mut tx = begin_write(&self.pool).await?;
        let mut ledger = load_for_write(&mut tx, shift_id, expected_version).await?;

        let stamp = new_stamp(&mut tx, now()).await?;
        let withdrawal_id = allocate_withdrawal_id(&mut tx).await?;
        let withdrawal = ledger.record_withdrawal(amount, note, stamp, withdrawal_id)?;

        insert_withdrawal(&mut tx, &withdrawal).await?;
        write_shift(&mut tx, &ledger.shift, expected_version).await?;
        tx.commit().await?;

        info!(
            shift_id,
            withdrawal_id = %withdrawal.withdrawal_id,
            amount = %withdrawal.amount,
            "Withdrawal recorded"
        );
        Ok(Recorded {
            record: withdrawal,
            shift: ledger.shift,
        })
    }

    /// Records an expense paid from the drawer.
    pub async fn record_expense(
        &self,
        shift_id: &str,
        expected_version: i64,
        amount: Money,
        concept: &str,
        detail: &str,
    ) -> DbResult<Recorded<Expense>> {
        let mut tx = begin_write(&self.pool).await?;
        let mut ledger = load_for_write(&mut tx, shift_id, expected_version).await?;

        let stamp = new_stamp(&mut tx, now()).await?;
        let expense = ledger.record_expense(amount, concept, detail, stamp)?;

        insert_expense(&mut tx, &expense).await?;
        write_shift(&mut tx, &ledger.shift, expected_version).await?;
        tx.commit().await?;

        info!(
            shift_id,
            receipt_number = %expense.receipt_number,
            amount = %expense.amount,
            "Expense recorded"
        );
        Ok(Recorded {
            record: expense,
            shift: ledger.shift,
        })
    }

    /// Closes an active shift and stores its closure.
    pub async fn close(
        &self,
        shift_id: &str,
        expected_version: i64,
    ) -> DbResult<Recorded<TurnClosure>> {
        let mut tx = begin_write(&self.pool).await?;
        let mut ledger = load_for_write(&mut tx, shift_id, expected_version).await?;

        let closure = ledger.close(new_id(), now())?;

        insert_closure(&mut tx, &closure).await?;
        write_shift(&mut tx, &ledger.shift, expected_version).await?;
        tx.commit().await?;

        info!(
            shift_id,
            closure_id = %closure.id,
            general = %closure.totals.general,
            sales_count = closure.sales_count,
            "Shift closed"
        );
        Ok(Recorded {
            record: closure,
            shift: ledger.shift,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
