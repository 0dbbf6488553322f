//! # Legacy Import
//!
//! Writes a backfilled legacy snapshot ([`kiosco_core::legacy::backfill`])
//! into the store, once.
//!
//! ```text
//! BEGIN
//!   meta['legacy_import'] exists ?                      ──► AlreadyImported
//!   legacy has an active shift and so does the store ?  ──► ShiftAlreadyActive
//!   a legacy receipt number is already in the store ?   ──► UniqueViolation
//!   INSERT shifts, sales, withdrawals, expenses, turn_closures
//!   raise receipt / withdrawal counters
//!   INSERT meta['legacy_import'] = report
//! COMMIT
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::closure::insert_closure;
use crate::repository::counter::{raise, RECEIPT_COUNTER, WITHDRAWAL_COUNTER};
use crate::repository::outflow::{insert_expense, insert_withdrawal};
use crate::repository::sale::insert_sale;
use crate::repository::shift::{begin_write, fetch_active, insert_shift};
use kiosco_core::legacy::LegacyMigration;
use kiosco_core::CoreError;

const LEGACY_IMPORT_KEY: &str = "legacy_import";

/// What a legacy import wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub shifts: usize,
    pub sales: usize,
    pub withdrawals: usize,
    pub expenses: usize,
    pub closures: usize,
    /// Records the backfill left out (see `LegacyMigration::skipped`).
    pub skipped: usize,
}

impl Database {
    /// True once a legacy snapshot has been imported.
    pub async fn is_legacy_imported(&self) -> DbResult<bool> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM meta WHERE key = ?1")
            .bind(LEGACY_IMPORT_KEY)
            .fetch_optional(self.pool())
            .await?;
        Ok(value.is_some())
    }

    /// Imports a backfilled legacy snapshot in one transaction.
    ///
    /// ## Errors
    /// - `AlreadyImported` on the second call
    /// - `Domain(ShiftAlreadyActive)` if both the store and the snapshot have
    ///   an active shift
    /// - `UniqueViolation` on `receipt_number` if the store already issued a
    ///   receipt number the snapshot uses. Imports are meant for a fresh
    ///   store; nothing is written when this happens.
    pub async fn import_legacy(&self, migration: &LegacyMigration) -> DbResult<ImportReport> {
        let mut tx = begin_write(self.pool()).await?;

        let done: Option<String> = sqlx::query_scalar("SELECT value FROM meta WHERE key = ?1")
            .bind(LEGACY_IMPORT_KEY)
            .fetch_optional(&mut *tx)
            .await?;
        if done.is_some() {
            return Err(DbError::AlreadyImported);
        }

        if migration.shifts.iter().any(|l| l.shift.is_active()) {
            if let Some(current) = fetch_active(&mut tx).await? {
                return Err(CoreError::ShiftAlreadyActive {
                    admin_name: current.admin_name,
                }
                .into());
            }
        }

        for receipt in legacy_receipts(migration) {
            if receipt_taken(&mut tx, receipt).await? {
                return Err(DbError::UniqueViolation {
                    field: "receipt_number".to_string(),
                    value: receipt.to_string(),
                });
            }
        }

        let mut report = ImportReport {
            skipped: migration.skipped.len(),
            ..ImportReport::default()
        };

        for ledger in &migration.shifts {
            insert_shift(&mut tx, &ledger.shift).await?;
            for sale in &ledger.sales {
                insert_sale(&mut tx, sale).await?;
            }
            for withdrawal in &ledger.withdrawals {
                insert_withdrawal(&mut tx, withdrawal).await?;
            }
            for expense in &ledger.expenses {
                insert_expense(&mut tx, expense).await?;
            }
            report.shifts += 1;
            report.sales += ledger.sales.len();
            report.withdrawals += ledger.withdrawals.len();
            report.expenses += ledger.expenses.len();
        }

        for closure in &migration.closures {
            insert_closure(&mut tx, closure).await?;
            report.closures += 1;
        }

        raise(&mut tx, RECEIPT_COUNTER, migration.receipt_counter).await?;
        raise(&mut tx, WITHDRAWAL_COUNTER, migration.withdrawal_counter).await?;

        let summary = serde_json::to_string(&report).map_err(|e| DbError::Internal(e.to_string()))?;
        sqlx::query("INSERT INTO meta (key, value, updated_at) VALUES (?1, ?2, ?3)")
            .bind(LEGACY_IMPORT_KEY)
            .bind(summary)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            shifts = report.shifts,
            sales = report.sales,
            withdrawals = report.withdrawals,
            expenses = report.expenses,
            closures = report.closures,
            skipped = report.skipped,
            "Legacy data imported"
        );
        Ok(report)
    }
}

fn legacy_receipts(migration: &LegacyMigration) -> impl Iterator<Item = &str> {
    migration.shifts.iter().flat_map(|ledger| {
        let sales = ledger.sales.iter().map(|s| s.receipt_number.as_str());
        let withdrawals = ledger.withdrawals.iter().map(|w| w.receipt_number.as_str());
        let expenses = ledger.expenses.iter().map(|e| e.receipt_number.as_str());
        sales.chain(withdrawals).chain(expenses)
    })
}

async fn receipt_taken(conn: &mut SqliteConnection, receipt: &str) -> DbResult<bool> {
    let found: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM sales WHERE receipt_number = ?1 \
         UNION ALL SELECT 1 FROM withdrawals WHERE receipt_number = ?1 \
         UNION ALL SELECT 1 FROM expenses WHERE receipt_number = ?1 \
         LIMIT 1",
    )
    .bind(receipt)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(found.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DbConfig;
    use kiosco_core::legacy::{backfill, LegacySnapshot};
    use kiosco_core::Money;

    const BACKUP: &str = r#"{
      "sales": [
        {"id": "s-seed", "receiptNumber": "KD-2025-000001", "items": [], "total": 1000,
         "paymentMethod": "efectivo", "customerName": "Caja Inicial - Marta",
         "createdAt": "2025-03-14T12:00:00.000Z"},
        {"id": "s-1", "receiptNumber": "KD-2025-000002",
         "items": [{"product": {"id": "p1", "name": "Alfajor", "category": "Golosinas", "price": 150},
                    "quantity": 2, "subtotal": 300}],
         "total": 300, "paymentMethod": "efectivo", "createdAt": "2025-03-14T12:10:00.000Z"}
      ],
      "adminTurns": [
        {"id": "t-1", "adminName": "Marta", "startDate": "2025-03-14T12:00:00.000Z",
         "status": "active",
         "transactions": [{"id": "w-1", "receiptNumber": "KD-2025-000003",
                           "withdrawalId": "RETIRO-0001", "amount": 200, "adminName": "Marta",
                           "notes": "Banco", "createdAt": "2025-03-14T13:00:00.000Z"}]},
        {"id": "t-0", "adminName": "Jorge", "startDate": "2025-03-13T12:00:00.000Z",
         "endDate": "2025-03-13T20:00:00.000Z", "status": "closed"}
      ],
      "turnClosures": [
        {"id": "c-0", "turnId": "t-0", "adminName": "Jorge",
         "startDate": "2025-03-13T12:00:00.000Z", "endDate": "2025-03-13T20:00:00.000Z",
         "totals": {"efectivo": 100, "transferencia": 0, "expensa": 0, "total": 100},
         "salesCount": 1}
      ],
      "counters": {"receiptCounter": 3, "withdrawalCounter": 1}
    }"#;

    fn migration() -> LegacyMigration {
        backfill(&LegacySnapshot::from_json(BACKUP).unwrap())
    }

    #[tokio::test]
    async fn test_import_writes_everything_once() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(!db.is_legacy_imported().await.unwrap());

        let report = db.import_legacy(&migration()).await.unwrap();
        assert_eq!(report.shifts, 2);
        assert_eq!(report.sales, 2);
        assert_eq!(report.withdrawals, 1);
        assert_eq!(report.closures, 1);
        assert!(db.is_legacy_imported().await.unwrap());

        let active = db.shifts().active_ledger().await.unwrap().unwrap();
        assert_eq!(active.shift.id, "t-1");
        let totals = active.totals();
        assert_eq!(totals.cash, Money::from_pesos(1100));
        assert!(totals.is_balanced());

        let err = db.import_legacy(&migration()).await.unwrap_err();
        assert!(matches!(err, DbError::AlreadyImported));
    }

    #[tokio::test]
    async fn test_counters_continue_after_import() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.import_legacy(&migration()).await.unwrap();

        let active = db.shifts().get_active().await.unwrap().unwrap();
        let r = db
            .shifts()
            .record_withdrawal(&active.id, active.version, Money::from_pesos(100), "Banco")
            .await
            .unwrap();
        assert!(r.record.receipt_number.ends_with("-000004"));
        assert_eq!(r.record.withdrawal_id, "RETIRO-0002");
    }

    #[tokio::test]
    async fn test_import_refuses_second_active_shift() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.shifts().open("Ana", Money::zero()).await.unwrap();

        let err = db.import_legacy(&migration()).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::ShiftAlreadyActive { .. })
        ));
        assert!(!db.is_legacy_imported().await.unwrap());
        assert_eq!(db.sales().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_imported_closure_is_listed() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.import_legacy(&migration()).await.unwrap();

        let closures = db.closures().list_all().await.unwrap();
        assert_eq!(closures.len(), 1);
        assert_eq!(closures[0].totals.general, Money::from_pesos(100));

        // The imported active shift keeps working like any other
        let active = db.shifts().get_active().await.unwrap().unwrap();
        let closed = db.shifts().close(&active.id, active.version).await.unwrap();
        assert_eq!(closed.record.totals.general, Money::from_pesos(1100));
        assert_eq!(db.closures().list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_import_refuses_receipts_already_issued() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let opened = db.shifts().open("Ana", Money::from_pesos(50)).await.unwrap();
        let issued = opened.sales[0].receipt_number.clone();
        db.shifts()
            .close(&opened.shift.id, opened.shift.version)
            .await
            .unwrap();

        let mut legacy = migration();
        let ledger = legacy
            .shifts
            .iter_mut()
            .find(|l| !l.sales.is_empty())
            .unwrap();
        ledger.sales[0].receipt_number = issued.clone();

        let err = db.import_legacy(&legacy).await.unwrap_err();
        match err {
            DbError::UniqueViolation { field, value } => {
                assert_eq!(field, "receipt_number");
                assert_eq!(value, issued);
            }
            other => panic!("expected UniqueViolation, got {other:?}"),
        }
        assert!(!db.is_legacy_imported().await.unwrap());
        assert_eq!(db.sales().count().await.unwrap(), 1);
        assert_eq!(db.closures().list_all().await.unwrap().len(), 1);

        // Same snapshot without the clash goes through
        let report = db.import_legacy(&migration()).await.unwrap();
        assert_eq!(report.sales, 2);
    }
}
