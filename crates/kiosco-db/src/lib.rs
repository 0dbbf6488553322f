//! # kiosco-db: Record Store for the Kiosk Register
//!
//! Durable storage for shifts, sales, withdrawals, expenses and turn
//! closures. SQLite through sqlx, with every shift operation committed as
//! one transaction.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Kiosk Register Data Flow                         │
//! │                                                                         │
//! │  Register facade (record_sale, close_shift, ...)                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     kiosco-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ ShiftRepo     │    │              │  │   │
//! │  │   │ ranked        │◄───│ SaleRepo      │    │ 001_initial  │  │   │
//! │  │   │ backends      │    │ ClosureRepo   │    │  _schema.sql │  │   │
//! │  │   │               │    │ CounterRepo   │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │          │                                                      │   │
//! │  │          └── import.rs: one-time legacy backup import           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │   kiosco.db (primary)  ──fails──►  fallback path  ──►  ...      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool, ranked backend selection
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Shift, sale, closure and counter repositories
//! - [`import`] - Legacy backup import
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kiosco_db::{Database, DbConfig};
//! use kiosco_core::Money;
//!
//! let db = Database::new(DbConfig::new("kiosco.db")).await?;
//!
//! let ledger = db.shifts().open("Marta", Money::from_pesos(1000)).await?;
//! let closure = db.shifts().close(&ledger.shift.id, ledger.shift.version).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod import;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use import::ImportReport;
pub use pool::{Database, DbConfig, StorageBackend};

// Repository re-exports for convenience
pub use repository::closure::ClosureRepository;
pub use repository::counter::CounterRepository;
pub use repository::sale::SaleRepository;
pub use repository::shift::{Recorded, ShiftRepository};
