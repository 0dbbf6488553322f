//! Withdrawal and expense rows.
//!
//! Both only exist inside a shift, so they are written and read through
//! [`super::shift::ShiftRepository`].

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection};
use tracing::debug;

use crate::error::DbResult;
use kiosco_core::{Expense, Money, PaymentMethod, Withdrawal};

#[derive(Debug, FromRow)]
struct WithdrawalRow {
    id: String,
    shift_id: String,
    receipt_number: String,
    withdrawal_id: String,
    amount_cents: i64,
    admin_name: String,
    note: String,
    created_at: DateTime<Utc>,
}

impl From<WithdrawalRow> for Withdrawal {
    fn from(row: WithdrawalRow) -> Self {
        Withdrawal {
            id: row.id,
            shift_id: row.shift_id,
            receipt_number: row.receipt_number,
            withdrawal_id: row.withdrawal_id,
            amount: Money::from_cents(row.amount_cents),
            admin_name: row.admin_name,
            note: row.note,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ExpenseRow {
    id: String,
    shift_id: String,
    receipt_number: String,
    concept: String,
    detail: String,
    amount_cents: i64,
    payment_method: PaymentMethod,
    admin_name: String,
    created_at: DateTime<Utc>,
}

impl From<ExpenseRow> for Expense {
    fn from(row: ExpenseRow) -> Self {
        Expense {
            id: row.id,
            shift_id: row.shift_id,
            receipt_number: row.receipt_number,
            concept: row.concept,
            detail: row.detail,
            amount: Money::from_cents(row.amount_cents),
            payment_method: row.payment_method,
            admin_name: row.admin_name,
            created_at: row.created_at,
        }
    }
}

pub(crate) async fn insert_withdrawal(
    conn: &mut SqliteConnection,
    withdrawal: &Withdrawal,
) -> DbResult<()> {
    debug!(
        id = %withdrawal.id,
        withdrawal_id = %withdrawal.withdrawal_id,
        amount = %withdrawal.amount,
        "Inserting withdrawal"
    );

    sqlx::query(
        r#"
        INSERT INTO withdrawals (
            id, shift_id, receipt_number, withdrawal_id,
            amount_cents, admin_name, note, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&withdrawal.id)
    .bind(&withdrawal.shift_id)
    .bind(&withdrawal.receipt_number)
    .bind(&withdrawal.withdrawal_id)
    .bind(withdrawal.amount.cents())
    .bind(&withdrawal.admin_name)
    .bind(&withdrawal.note)
    .bind(withdrawal.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn insert_expense(conn: &mut SqliteConnection, expense: &Expense) -> DbResult<()> {
    debug!(id = %expense.id, concept = %expense.concept, amount = %expense.amount, "Inserting expense");

    sqlx::query(
        r#"
        INSERT INTO expenses (
            id, shift_id, receipt_number, concept, detail,
            amount_cents, payment_method, admin_name, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&expense.id)
    .bind(&expense.shift_id)
    .bind(&expense.receipt_number)
    .bind(&expense.concept)
    .bind(&expense.detail)
    .bind(expense.amount.cents())
    .bind(expense.payment_method)
    .bind(&expense.admin_name)
    .bind(expense.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn fetch_withdrawals(
    conn: &mut SqliteConnection,
    shift_id: &str,
) -> DbResult<Vec<Withdrawal>> {
    let rows: Vec<WithdrawalRow> = sqlx::query_as(
        r#"
        SELECT id, shift_id, receipt_number, withdrawal_id,
               amount_cents, admin_name, note, created_at
        FROM withdrawals
        WHERE shift_id = ?1
        ORDER BY created_at, receipt_number
        "#,
    )
    .bind(shift_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(Withdrawal::from).collect())
}

pub(crate) async fn fetch_expenses(
    conn: &mut SqliteConnection,
    shift_id: &str,
) -> DbResult<Vec<Expense>> {
    let rows: Vec<ExpenseRow> = sqlx::query_as(
        r#"
        SELECT id, shift_id, receipt_number, concept, detail,
               amount_cents, payment_method, admin_name, created_at
        FROM expenses
        WHERE shift_id = ?1
        ORDER BY created_at, receipt_number
        "#,
    )
    .bind(shift_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(Expense::from).collect())
}
