//! # Kiosco Register
//!
//! Application layer of the kiosk register: the [`Register`] facade that
//! screens and scripts call, plus configuration and logging setup.
//!
//! ## Module Organization
//! ```text
//! kiosco_register/
//! ├── lib.rs          ◄─── You are here (logging setup & exports)
//! ├── config.rs       ◄─── RegisterConfig: env > TOML > defaults
//! ├── error.rs        ◄─── RegisterError { code, message }
//! ├── register.rs     ◄─── Register facade, mutation lock
//! └── main.rs         ◄─── `kiosco-register` command line
//! ```
//!
//! ## Layering
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   kiosco-register   Register::record_withdrawal(amount, note)           │
//! │         │              confirmation flags, mutation lock, error codes   │
//! │         ▼                                                               │
//! │   kiosco-db         ShiftRepository::record_withdrawal(id, version, ..) │
//! │         │              one transaction, counters, version check         │
//! │         ▼                                                               │
//! │   kiosco-core       ShiftLedger::record_withdrawal(..)                  │
//! │                        guard, totals, no I/O                            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod register;

pub use config::{ConfigError, RegisterConfig};
pub use error::{ErrorCode, RegisterError};
pub use register::{Register, SaleLine, SaleRequest};

use tracing_subscriber::EnvFilter;

/// Default log directives when neither `RUST_LOG` nor the config sets one.
pub const DEFAULT_LOG_FILTER: &str = "info,kiosco=debug,sqlx=warn";

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=kiosco_db=trace` - Trace the record store only
/// - otherwise `log_filter` from the config, then [`DEFAULT_LOG_FILTER`]
///
/// Calling it twice keeps the first subscriber.
pub fn init_tracing(log_filter: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_filter.unwrap_or(DEFAULT_LOG_FILTER)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
