//! # Closure Repository
//!
//! Turn closures are the audit records of closed shifts. The frozen totals
//! live in columns (so listings need no JSON), the copied records in a JSON
//! `snapshot` column.
//!
//! Rows are append-only (trigger) and one per shift (unique `shift_id`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use kiosco_core::{Expense, Money, Sale, ShiftTotals, TurnClosure, Withdrawal};

/// Records copied into a closure.
#[derive(Debug, Serialize, Deserialize)]
struct ClosureSnapshot {
    sales: Vec<Sale>,
    withdrawals: Vec<Withdrawal>,
    expenses: Vec<Expense>,
}

#[derive(Debug, FromRow)]
struct ClosureRow {
    id: String,
    shift_id: String,
    admin_name: String,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
    cash_cents: i64,
    transfer_cents: i64,
    account_credit_cents: i64,
    general_cents: i64,
    sales_count: i64,
    snapshot: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ClosureRow> for TurnClosure {
    type Error = DbError;

    fn try_from(row: ClosureRow) -> DbResult<Self> {
        let snapshot: ClosureSnapshot = serde_json::from_str(&row.snapshot)
            .map_err(|e| DbError::corrupt("TurnClosure", &row.id, e.to_string()))?;

        Ok(TurnClosure {
            id: row.id,
            shift_id: row.shift_id,
            admin_name: row.admin_name,
            started_at: row.started_at,
            ended_at: row.ended_at,
            sales: snapshot.sales,
            withdrawals: snapshot.withdrawals,
            expenses: snapshot.expenses,
            totals: ShiftTotals {
                cash: Money::from_cents(row.cash_cents),
                transfer: Money::from_cents(row.transfer_cents),
                account_credit: Money::from_cents(row.account_credit_cents),
                general: Money::from_cents(row.general_cents),
            },
            sales_count: row.sales_count,
            created_at: row.created_at,
        })
    }
}

const CLOSURE_COLUMNS: &str = r#"
    id, shift_id, admin_name, started_at, ended_at,
    cash_cents, transfer_cents, account_credit_cents, general_cents,
    sales_count, snapshot, created_at
"#;

pub(crate) async fn insert_closure(conn: &mut SqliteConnection, closure: &TurnClosure) -> DbResult<()> {
    debug!(id = %closure.id, shift_id = %closure.shift_id, "Inserting turn closure");

    let snapshot = serde_json::to_string(&ClosureSnapshot {
        sales: closure.sales.clone(),
        withdrawals: closure.withdrawals.clone(),
        expenses: closure.expenses.clone(),
    })
    .map_err(|e| DbError::Internal(e.to_string()))?;

    sqlx::query(
        r#"
        INSERT INTO turn_closures (
            id, shift_id, admin_name, started_at, ended_at,
            cash_cents, transfer_cents, account_credit_cents, general_cents,
            sales_count, snapshot, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )
    .bind(&closure.id)
    .bind(&closure.shift_id)
    .bind(&closure.admin_name)
    .bind(closure.started_at)
    .bind(closure.ended_at)
    .bind(closure.totals.cash.cents())
    .bind(closure.totals.transfer.cents())
    .bind(closure.totals.account_credit.cents())
    .bind(closure.totals.general.cents())
    .bind(closure.sales_count)
    .bind(snapshot)
    .bind(closure.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Read access to turn closures.
#[derive(Debug, Clone)]
pub struct ClosureRepository {
    pool: SqlitePool,
}

impl ClosureRepository {
    /// Creates a new ClosureRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ClosureRepository { pool }
    }

    /// Every closure, most recently ended first.
    ///
    /// Filtering and sorting for display is done in memory by
    /// `kiosco_core::closure::filter_closures`.
    pub async fn list_all(&self) -> DbResult<Vec<TurnClosure>> {
        let rows: Vec<ClosureRow> = sqlx::query_as(&format!(
            "SELECT {CLOSURE_COLUMNS} FROM turn_closures ORDER BY ended_at DESC, rowid DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TurnClosure::try_from).collect()
    }

    /// The closure of a shift, if it was closed.
    pub async fn get_by_shift(&self, shift_id: &str) -> DbResult<Option<TurnClosure>> {
        let row: Option<ClosureRow> = sqlx::query_as(&format!(
            "SELECT {CLOSURE_COLUMNS} FROM turn_closures WHERE shift_id = ?1"
        ))
        .bind(shift_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TurnClosure::try_from).transpose()
    }

    /// Gets a closure by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<TurnClosure>> {
        let row: Option<ClosureRow> =
            sqlx::query_as(&format!("SELECT {CLOSURE_COLUMNS} FROM turn_closures WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(TurnClosure::try_from).transpose()
    }
}

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig, DbError};
    use kiosco_core::Money;

    #[tokio::test]
    async fn test_list_all_newest_first() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        for admin in ["Marta", "Jorge"] {
            let ledger = db.shifts().open(admin, Money::from_pesos(100)).await.unwrap();
            db.shifts().close(&ledger.shift.id, ledger.shift.version).await.unwrap();
        }

        let closures = db.closures().list_all().await.unwrap();
        let admins: Vec<&str> = closures.iter().map(|c| c.admin_name.as_str()).collect();
        assert_eq!(admins, vec!["Jorge", "Marta"]);
        assert_eq!(closures[0].sales.len(), 1);
        assert_eq!(closures[0].sales_count, 0);

        let by_id = db.closures().get_by_id(&closures[1].id).await.unwrap();
        assert_eq!(by_id.as_ref(), Some(&closures[1]));
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_reported() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ledger = db.shifts().open("Marta", Money::zero()).await.unwrap();
        let closed = db.shifts().close(&ledger.shift.id, 1).await.unwrap();

        // Bypass the append-only trigger to simulate a damaged file
        sqlx::query("DROP TRIGGER trg_turn_closures_append_only")
            .execute(db.pool())
            .await
            .unwrap();
        sqlx::query("UPDATE turn_closures SET snapshot = 'not json'")
            .execute(db.pool())
            .await
            .unwrap();

        let err = db.closures().get_by_id(&closed.record.id).await.unwrap_err();
        assert!(matches!(err, DbError::Corrupt { .. }));
    }
}
