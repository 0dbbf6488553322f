//! # Counter Repository
//!
//! Monotonic sequences behind receipt numbers (`KD-2025-000042`) and
//! withdrawal ids (`RETIRO-0007`).
//!
//! ```text
//! INSERT INTO counters (name, value) VALUES (?, 1)
//! ON CONFLICT(name) DO UPDATE SET value = value + 1
//! RETURNING value
//! ```
//!
//! Allocation runs on the caller's connection, so a shift operation that
//! allocates inside its transaction and then rolls back gives the number
//! back.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use kiosco_core::types::{format_withdrawal_id, receipt_number_at};

/// Counter behind every `KD-<year>-<seq>` receipt.
pub const RECEIPT_COUNTER: &str = "receipt";

/// Counter behind every `RETIRO-<seq>` id.
pub const WITHDRAWAL_COUNTER: &str = "withdrawal";

/// Increments `name` and returns the new value (first value is 1).
pub(crate) async fn allocate(conn: &mut SqliteConnection, name: &str) -> DbResult<i64> {
    let value: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO counters (name, value) VALUES (?1, 1)
        ON CONFLICT(name) DO UPDATE SET value = value + 1
        RETURNING value
        "#,
    )
    .bind(name)
    .fetch_one(&mut *conn)
    .await?;

    debug!(counter = name, value, "Allocated sequence number");
    Ok(value)
}

/// Allocates the next receipt number for a record created at `at`.
pub(crate) async fn allocate_receipt(
    conn: &mut SqliteConnection,
    at: DateTime<Utc>,
) -> DbResult<String> {
    let seq = allocate(conn, RECEIPT_COUNTER).await?;
    Ok(receipt_number_at(at, seq))
}

/// Allocates the next withdrawal id.
pub(crate) async fn allocate_withdrawal_id(conn: &mut SqliteConnection) -> DbResult<String> {
    let seq = allocate(conn, WITHDRAWAL_COUNTER).await?;
    Ok(format_withdrawal_id(seq))
}

/// Raises `name` to at least `value`. Never lowers it.
pub(crate) async fn raise(conn: &mut SqliteConnection, name: &str, value: i64) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO counters (name, value) VALUES (?1, ?2)
        ON CONFLICT(name) DO UPDATE SET value = MAX(value, excluded.value)
        "#,
    )
    .bind(name)
    .bind(value)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Repository for the sequence counters.
#[derive(Debug, Clone)]
pub struct CounterRepository {
    pool: SqlitePool,
}

impl CounterRepository {
    /// Creates a new CounterRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CounterRepository { pool }
    }

    /// Allocates a receipt number outside any shift operation.
    pub async fn next_receipt_number(&self, at: DateTime<Utc>) -> DbResult<String> {
        let mut conn = self.pool.acquire().await?;
        allocate_receipt(&mut conn, at).await
    }

    /// Allocates a withdrawal id outside any shift operation.
    pub async fn next_withdrawal_id(&self) -> DbResult<String> {
        let mut conn = self.pool.acquire().await?;
        allocate_withdrawal_id(&mut conn).await
    }

    /// Last value handed out by `name` (0 if never used).
    pub async fn current(&self, name: &str) -> DbResult<i64> {
        let value: Option<i64> = sqlx::query_scalar("SELECT value FROM counters WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value.unwrap_or(0))
    }

    /// Raises `name` to at least `value`.
    pub async fn raise_to(&self, name: &str, value: i64) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        raise(&mut conn, name, value).await
    }
}
