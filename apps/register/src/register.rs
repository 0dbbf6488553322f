//! # Register Facade
//!
//! The operations the register screens call, in one place.
//!
//! ## One Mutation at a Time
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  open_shift ──┐                                                         │
//! │  record_sale ─┤                                                         │
//! │  withdraw ────┼──► mutation lock ──► read active shift ──► repository   │
//! │  expense ─────┤     (tokio Mutex)     (fresh version)      operation    │
//! │  close_shift ─┘                                            (one tx)     │
//! │                                                                         │
//! │  Reads (totals, closures, exports) do not take the lock.                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The lock keeps this process from interleaving two mutations. Writers in
//! other processes are caught by the shift version and surface as
//! `STALE_WRITE`.
//!
//! ## Confirmations
//! Opening a shift with no cash and closing a shift take an explicit
//! `confirmed` flag. Without it nothing is written and the call fails with
//! `CONFIRMATION_REQUIRED`.

use chrono::{FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use ts_rs::TS;

use crate::config::RegisterConfig;
use crate::error::RegisterError;
use kiosco_core::closure::{
    closure_admins, filter_closures, summarize_closures, ClosureFilter, ClosureSort, ClosureSummary,
};
use kiosco_core::export::{closures_csv, transactions_csv};
use kiosco_core::legacy::{backfill, LegacySnapshot};
use kiosco_core::{
    CoreError, Expense, LedgerEntry, Money, PaymentBreakdown, PaymentMethod, ProductSnapshot, Sale,
    SaleDraft, SaleItem, Shift, ShiftLedger, ShiftTotals, TurnClosure, Withdrawal,
};
use kiosco_db::{Database, ImportReport, StorageBackend};

type Result<T> = std::result::Result<T, RegisterError>;

// =============================================================================
// Requests
// =============================================================================

/// A product line as picked at the register. Subtotals are computed here,
/// never taken from the caller.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleLine {
    pub product: ProductSnapshot,
    pub quantity: i64,
    pub custom_price: Option<Money>,
}

/// A checkout.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleRequest {
    pub lines: Vec<SaleLine>,
    pub payment_method: PaymentMethod,
    /// Only read for combined payments.
    pub breakdown: Option<PaymentBreakdown>,
    pub customer_name: Option<String>,
    pub lot_number: Option<String>,
}

impl SaleRequest {
    fn into_draft(self) -> SaleDraft {
        SaleDraft {
            items: self
                .lines
                .into_iter()
                .map(|line| SaleItem::new(line.product, line.quantity, line.custom_price))
                .collect(),
            payment_method: self.payment_method,
            breakdown: self.breakdown,
            customer_name: self.customer_name,
            lot_number: self.lot_number,
        }
    }
}

// =============================================================================
// Register
// =============================================================================

/// Register facade over the record store.
#[derive(Debug)]
pub struct Register {
    db: Database,
    offset: FixedOffset,
    store_name: String,
    mutations: Mutex<()>,
}

impl Register {
    /// Connects the configured backends and runs the one-time legacy import.
    ///
    /// ## Startup Sequence
    /// 1. Primary database, then the fallback (each failure logged at warn)
    /// 2. Pending migrations
    /// 3. Legacy snapshot import, if configured and not done yet
    pub async fn open(config: &RegisterConfig) -> Result<Self> {
        let offset = config.offset()?;
        let db = Database::connect_ranked(config.storage_backends()).await?;

        let backend = db.backend();
        info!(
            store = %config.store_name,
            backend = %backend.label,
            path = %backend.path.display(),
            "Register storage ready"
        );

        let register = Register::new(db, offset, config.store_name.clone());

        if let Some(path) = &config.legacy_snapshot {
            if register.db.is_legacy_imported().await? {
                debug!(path = %path.display(), "Legacy snapshot already imported");
            } else {
                let json = tokio::fs::read_to_string(path).await.map_err(|e| {
                    RegisterError::validation(format!(
                        "cannot read legacy snapshot {}: {e}",
                        path.display()
                    ))
                })?;
                register.import_legacy_json(&json).await?;
            }
        }

        Ok(register)
    }

    /// Wraps an already connected database.
    pub fn new(db: Database, offset: FixedOffset, store_name: impl Into<String>) -> Self {
        Register {
            db,
            offset,
            store_name: store_name.into(),
            mutations: Mutex::new(()),
        }
    }

    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    /// Which storage backend is in use.
    pub fn storage_backend(&self) -> &StorageBackend {
        self.db.backend()
    }

    async fn require_active(&self) -> Result<Shift> {
        self.db
            .shifts()
            .get_active()
            .await?
            .ok_or_else(|| CoreError::NoActiveShift.into())
    }

    // =========================================================================
    // Shift Lifecycle
    // =========================================================================

    /// Opens a shift for `admin_name` with `initial_cash` in the drawer.
    pub async fn open_shift(
        &self,
        admin_name: &str,
        initial_cash: Money,
        zero_cash_confirmed: bool,
    ) -> Result<ShiftLedger> {
        if initial_cash.is_zero() && !zero_cash_confirmed {
            return Err(RegisterError::confirmation_required(
                "opening a shift with no initial cash must be confirmed",
            ));
        }

        let _guard = self.mutations.lock().await;
        Ok(self.db.shifts().open(admin_name, initial_cash).await?)
    }

    /// The active shift with its records, if any.
    pub async fn get_active_shift(&self) -> Result<Option<ShiftLedger>> {
        Ok(self.db.shifts().active_ledger().await?)
    }

    /// Closes the active shift. Irreversible, so it needs `confirmed`.
    pub async fn close_shift(&self, confirmed: bool) -> Result<TurnClosure> {
        if !confirmed {
            return Err(RegisterError::confirmation_required(
                "closing a shift cannot be undone and must be confirmed",
            ));
        }

        let _guard = self.mutations.lock().await;
        let shift = self.require_active().await?;
        let closed = self.db.shifts().close(&shift.id, shift.version).await?;
        Ok(closed.record)
    }

    // =========================================================================
    // Recording
    // =========================================================================

    /// Records a checkout in the active shift.
    pub async fn record_sale(&self, request: SaleRequest) -> Result<Sale> {
        let _guard = self.mutations.lock().await;
        let shift = self.require_active().await?;
        let recorded = self
            .db
            .shifts()
            .record_sale(&shift.id, shift.version, request.into_draft())
            .await?;
        Ok(recorded.record)
    }

    /// Takes cash out of the drawer.
    pub async fn record_withdrawal(&self, amount: Money, note: &str) -> Result<Withdrawal> {
        let _guard = self.mutations.lock().await;
        let shift = self.require_active().await?;
        let recorded = self
            .db
            .shifts()
            .record_withdrawal(&shift.id, shift.version, amount, note)
            .await?;
        Ok(recorded.record)
    }

    /// Pays an expense from the drawer.
    pub async fn record_expense(&self, amount: Money, concept: &str, detail: &str) -> Result<Expense> {
        let _guard = self.mutations.lock().await;
        let shift = self.require_active().await?;
        let recorded = self
            .db
            .shifts()
            .record_expense(&shift.id, shift.version, amount, concept, detail)
            .await?;
        Ok(recorded.record)
    }

    // =========================================================================
    // Reporting
    // =========================================================================

    /// Totals of a shift, recomputed from its records.
    pub async fn get_shift_totals(&self, shift_id: &str) -> Result<ShiftTotals> {
        let ledger = self.db.shifts().load_ledger(shift_id).await?;
        let totals = ledger.totals();
        if totals != ledger.shift.cached_totals {
            warn!(shift_id, "Cached shift totals differ from records");
        }
        Ok(totals)
    }

    /// Transaction list of a shift, newest first.
    pub async fn shift_transactions(&self, shift_id: &str) -> Result<Vec<LedgerEntry>> {
        Ok(self.db.shifts().load_ledger(shift_id).await?.entries())
    }

    /// Closures matching `filter`, in `sort` order.
    pub async fn list_closures(
        &self,
        filter: &ClosureFilter,
        sort: ClosureSort,
    ) -> Result<Vec<TurnClosure>> {
        let all = self.db.closures().list_all().await?;
        Ok(filter_closures(&all, filter, sort, Utc::now(), self.offset))
    }

    /// Aggregate of the closures matching `filter`.
    pub async fn closure_summary(&self, filter: &ClosureFilter) -> Result<ClosureSummary> {
        let closures = self.list_closures(filter, ClosureSort::default()).await?;
        Ok(summarize_closures(&closures))
    }

    /// Administrators that have closed at least one shift.
    pub async fn closure_admins(&self) -> Result<Vec<String>> {
        Ok(closure_admins(&self.db.closures().list_all().await?))
    }

    // =========================================================================
    // Export & Import
    // =========================================================================

    /// Transaction CSV of a shift.
    pub async fn export_transactions_csv(&self, shift_id: &str) -> Result<String> {
        let entries = self.shift_transactions(shift_id).await?;
        Ok(transactions_csv(&entries, self.offset))
    }

    /// Closure history CSV.
    pub async fn export_closures_csv(
        &self,
        filter: &ClosureFilter,
        sort: ClosureSort,
    ) -> Result<String> {
        let closures = self.list_closures(filter, sort).await?;
        Ok(closures_csv(&closures, self.offset))
    }

    /// Imports a legacy JSON backup. Works once per database.
    pub async fn import_legacy_json(&self, json: &str) -> Result<ImportReport> {
        let snapshot = LegacySnapshot::from_json(json)
            .map_err(|e| RegisterError::validation(format!("legacy snapshot is not valid: {e}")))?;
        let migration = backfill(&snapshot);

        let _guard = self.mutations.lock().await;
        Ok(self.db.import_legacy(&migration).await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use kiosco_core::closure::{ClosureSortBy, DatePreset, SortOrder};
    use kiosco_core::{SaleKind, ShiftStatus};
    use kiosco_db::DbConfig;
    use std::sync::Arc;

    async fn register() -> Register {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        Register::new(db, FixedOffset::west_opt(3 * 3600).unwrap(), "Kiosco Test")
    }

    fn line(name: &str, pesos: i64, quantity: i64) -> SaleLine {
        SaleLine {
            product: ProductSnapshot {
                id: format!("p-{name}"),
                name: name.to_string(),
                category: "Almacén".to_string(),
                price: Money::from_pesos(pesos),
            },
            quantity,
            custom_price: None,
        }
    }

    fn sale(pesos: i64, method: PaymentMethod, breakdown: Option<PaymentBreakdown>) -> SaleRequest {
        SaleRequest {
            lines: vec![line("Producto", pesos, 1)],
            payment_method: method,
            breakdown,
            customer_name: Some("Lucía".to_string()),
            lot_number: Some("14".to_string()),
        }
    }

    fn split(cash: i64, transfer: i64, credit: i64) -> PaymentBreakdown {
        PaymentBreakdown {
            cash: Money::from_pesos(cash),
            transfer: Money::from_pesos(transfer),
            account_credit: Money::from_pesos(credit),
        }
    }

    fn totals(cash: i64, transfer: i64, credit: i64) -> ShiftTotals {
        ShiftTotals {
            cash: Money::from_pesos(cash),
            transfer: Money::from_pesos(transfer),
            account_credit: Money::from_pesos(credit),
            general: Money::from_pesos(cash + transfer + credit),
        }
    }

    #[tokio::test]
    async fn test_open_sell_withdraw_close_reconciles() {
        let register = register().await;

        // Opening cash is the first cash in the drawer
        let ledger = register
            .open_shift("Marta", Money::from_pesos(1000), false)
            .await
            .unwrap();
        let id = ledger.shift.id.clone();
        assert_eq!(register.get_shift_totals(&id).await.unwrap(), totals(1000, 0, 0));

        let s = register
            .record_sale(sale(300, PaymentMethod::Cash, None))
            .await
            .unwrap();
        assert_eq!(s.breakdown, split(300, 0, 0));
        assert_eq!(register.get_shift_totals(&id).await.unwrap(), totals(1300, 0, 0));

        // A split that does not add up changes nothing
        let err = register
            .record_sale(sale(500, PaymentMethod::Combined, Some(split(200, 200, 80))))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::PaymentMismatch);
        assert_eq!(register.get_shift_totals(&id).await.unwrap(), totals(1300, 0, 0));

        // Cannot withdraw more cash than the drawer holds
        let err = register
            .record_withdrawal(Money::from_pesos(2000), "Banco")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientCash);
        assert_eq!(
            err.message,
            "insufficient cash: available $1300.00, requested $2000.00"
        );
        assert!(register
            .get_active_shift()
            .await
            .unwrap()
            .unwrap()
            .withdrawals
            .is_empty());

        // The seed is in the closure but not in its sales count
        let closure = register.close_shift(true).await.unwrap();
        assert_eq!(closure.totals.general, Money::from_pesos(1300));
        assert_eq!(closure.sales_count, 1);
        assert_eq!(closure.sales.len(), 2);
        assert!(closure.sales.iter().any(|s| s.kind == SaleKind::InitialCash));
        assert!(register.get_active_shift().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_combined_sale_splits_totals() {
        let register = register().await;
        let ledger = register
            .open_shift("Marta", Money::from_pesos(1000), false)
            .await
            .unwrap();
        register
            .record_sale(sale(300, PaymentMethod::Cash, None))
            .await
            .unwrap();

        let s = register
            .record_sale(sale(500, PaymentMethod::Combined, Some(split(200, 200, 100))))
            .await
            .unwrap();
        assert_eq!(s.breakdown, split(200, 200, 100));

        let t = register.get_shift_totals(&ledger.shift.id).await.unwrap();
        assert_eq!(t, totals(1500, 200, 100));
        assert!(t.is_balanced());
    }

    #[tokio::test]
    async fn test_oversized_amounts_are_rejected() {
        let register = register().await;

        let err = register
            .open_shift("Marta", Money::from_cents(9_000_000_000_000_000_000), false)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert!(register.get_active_shift().await.unwrap().is_none());

        let ledger = register
            .open_shift("Marta", Money::from_pesos(1000), false)
            .await
            .unwrap();

        let mut request = sale(1, PaymentMethod::Cash, None);
        request.lines[0].quantity = 999;
        request.lines[0].custom_price = Some(Money::from_cents(9_000_000_000_000_000));
        let err = register.record_sale(request).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err = register
            .record_withdrawal(Money::from_cents(i64::MAX), "Banco")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        // Nothing was written and the lock is free again
        let t = register.get_shift_totals(&ledger.shift.id).await.unwrap();
        assert_eq!(t, totals(1000, 0, 0));
        register
            .record_sale(sale(300, PaymentMethod::Cash, None))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_confirmations_are_required() {
        let register = register().await;

        let err = register.open_shift("Marta", Money::zero(), false).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfirmationRequired);
        assert!(register.get_active_shift().await.unwrap().is_none());

        register.open_shift("Marta", Money::zero(), true).await.unwrap();

        let err = register.close_shift(false).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfirmationRequired);
        let active = register.get_active_shift().await.unwrap().unwrap();
        assert_eq!(active.shift.status, ShiftStatus::Active);
    }

    #[tokio::test]
    async fn test_second_open_is_a_conflict() {
        let register = register().await;
        register
            .open_shift("Marta", Money::from_pesos(100), false)
            .await
            .unwrap();

        let err = register
            .open_shift("Jorge", Money::from_pesos(100), false)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Conflict);
        assert!(err.message.contains("Marta"));
    }

    #[tokio::test]
    async fn test_mutations_without_shift_fail() {
        let register = register().await;

        let err = register
            .record_sale(sale(100, PaymentMethod::Cash, None))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NoActiveShift);

        let err = register.close_shift(true).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NoActiveShift);

        let err = register.get_shift_totals("missing").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_concurrent_withdrawals_are_serialized() {
        let register = Arc::new(register().await);
        register
            .open_shift("Marta", Money::from_pesos(1000), false)
            .await
            .unwrap();

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let register = Arc::clone(&register);
                tokio::spawn(async move {
                    register.record_withdrawal(Money::from_pesos(600), "Banco").await
                })
            })
            .collect();

        let mut ok = 0;
        let mut insufficient = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(e) if e.code == ErrorCode::InsufficientCash => insufficient += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!((ok, insufficient), (1, 1));

        let active = register.get_active_shift().await.unwrap().unwrap();
        assert_eq!(active.totals().cash, Money::from_pesos(400));
    }

    #[tokio::test]
    async fn test_expense_reduces_cash() {
        let register = register().await;
        let ledger = register
            .open_shift("Marta", Money::from_pesos(500), false)
            .await
            .unwrap();

        let expense = register
            .record_expense(Money::from_pesos(120), "Limpieza", "lavandina")
            .await
            .unwrap();
        assert!(expense.receipt_number.starts_with("KD-"));

        let err = register
            .record_expense(Money::from_pesos(1000), "Proveedor", "")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientCash);

        let t = register.get_shift_totals(&ledger.shift.id).await.unwrap();
        assert_eq!(t, totals(380, 0, 0));
    }

    #[tokio::test]
    async fn test_closure_listing_and_summary() {
        let register = register().await;
        for (admin, cash) in [("Marta", 100), ("jorge", 300), ("Ana", 200)] {
            register
                .open_shift(admin, Money::from_pesos(cash), false)
                .await
                .unwrap();
            register.close_shift(true).await.unwrap();
        }

        let by_total = register
            .list_closures(
                &ClosureFilter::default(),
                ClosureSort {
                    by: ClosureSortBy::Total,
                    order: SortOrder::Desc,
                },
            )
            .await
            .unwrap();
        let admins: Vec<&str> = by_total.iter().map(|c| c.admin_name.as_str()).collect();
        assert_eq!(admins, vec!["jorge", "Ana", "Marta"]);

        let filter = ClosureFilter {
            search: Some("MAR".to_string()),
            admin_name: None,
            date: DatePreset::Today,
        };
        let summary = register.closure_summary(&filter).await.unwrap();
        assert_eq!(summary.closures, 1);
        assert_eq!(summary.general, Money::from_pesos(100));

        let all = register.closure_summary(&ClosureFilter::default()).await.unwrap();
        assert_eq!(all.closures, 3);
        assert_eq!(all.cash, Money::from_pesos(600));
        assert_eq!(all.sales_count, 0);

        assert_eq!(
            register.closure_admins().await.unwrap(),
            vec!["Ana", "jorge", "Marta"]
        );
    }

    #[tokio::test]
    async fn test_exports() {
        let register = register().await;
        let ledger = register
            .open_shift("Marta", Money::from_pesos(1000), false)
            .await
            .unwrap();
        register
            .record_sale(SaleRequest {
                lines: vec![line("Alfajor", 150, 2), line("Agua", 80, 1)],
                payment_method: PaymentMethod::Cash,
                breakdown: None,
                customer_name: Some("Lucía".to_string()),
                lot_number: Some("12".to_string()),
            })
            .await
            .unwrap();

        let csv = register.export_transactions_csv(&ledger.shift.id).await.unwrap();
        let rows: Vec<&str> = csv.split('\n').collect();
        // header + 2 item rows + seed row
        assert_eq!(rows.len(), 4);
        assert!(rows[0].starts_with("\"Fecha\""));
        assert!(csv.contains("\"Alfajor\""));
        assert!(csv.contains("\"380\""));

        register.close_shift(true).await.unwrap();
        let csv = register
            .export_closures_csv(&ClosureFilter::default(), ClosureSort::default())
            .await
            .unwrap();
        assert_eq!(csv.split('\n').count(), 2);
        assert!(csv.contains("\"Marta\""));
        assert!(csv.contains("\"1380.00\""));
    }

    #[tokio::test]
    async fn test_legacy_import_once() {
        let register = register().await;
        let json = r#"{
          "sales": [
            {"id": "s-1", "receiptNumber": "KD-2025-000010", "items": [], "total": 250,
             "paymentMethod": "transferencia", "createdAt": "2025-03-14T12:10:00.000Z"}
          ],
          "adminTurns": [
            {"id": "t-1", "adminName": "Marta", "startDate": "2025-03-14T12:00:00.000Z",
             "status": "active"}
          ],
          "counters": {"receiptCounter": 10, "withdrawalCounter": 0}
        }"#;

        let report = register.import_legacy_json(json).await.unwrap();
        assert_eq!((report.shifts, report.sales), (1, 1));

        let active = register.get_active_shift().await.unwrap().unwrap();
        assert_eq!(active.totals(), totals(0, 250, 0));

        let err = register.import_legacy_json(json).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Conflict);

        let err = register.import_legacy_json("not json").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    fn scratch_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("kiosco-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[tokio::test]
    async fn test_open_creates_missing_directories() {
        let root = scratch_dir("fresh-install");
        let config = RegisterConfig {
            database_path: root.join("data").join("kiosco.db"),
            fallback_database_path: Some(root.join("cache").join("kiosco-fallback.db")),
            ..RegisterConfig::default()
        };

        let register = Register::open(&config).await.unwrap();
        assert_eq!(register.storage_backend().label, "primary");
        assert!(root.join("data").join("kiosco.db").exists());
        register.open_shift("Marta", Money::from_pesos(100), false).await.unwrap();

        drop(register);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_open_uses_fallback_backend() {
        let root = scratch_dir("fallback");
        std::fs::create_dir_all(&root).unwrap();
        // A regular file where the primary's directory should be
        let blocker = root.join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();

        let config = RegisterConfig {
            database_path: blocker.join("kiosco.db"),
            fallback_database_path: Some(root.join("cache").join("kiosco-fallback.db")),
            ..RegisterConfig::default()
        };

        let register = Register::open(&config).await.unwrap();
        assert_eq!(register.storage_backend().label, "fallback");
        assert_eq!(register.storage_backend().rank, 1);
        assert!(register.get_active_shift().await.unwrap().is_none());

        drop(register);
        let _ = std::fs::remove_dir_all(&root);
    }
}
