//! # Database Pool Management
//!
//! Connection pool creation, configuration and backend fallback.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Connection Pool                           │
//! │                                                                         │
//! │  Register startup                                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  [DbConfig primary, DbConfig fallback] ← ranked backends               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::connect_ranked(configs).await                               │
//! │       │                                                                 │
//! │       ├── primary ok? ─────────────► use it                            │
//! │       └── primary failed (warn!) ──► try fallback ──► use it           │
//! │                                            │                            │
//! │                                            └── failed ──► last error   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │            SqlitePool                    │                           │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐       │                           │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│ ...   │  (max_connections)        │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘       │                           │
//! │  └─────────────────────────────────────────┘                           │
//! │                                                                         │
//! │  Database::backend() tells which one won.                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! SQLite WAL (Write-Ahead Logging) mode is enabled for:
//! - Readers don't block writers
//! - Writers don't block readers
//! - Better crash recovery

use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::closure::ClosureRepository;
use crate::repository::counter::CounterRepository;
use crate::repository::sale::SaleRepository;
use crate::repository::shift::ShiftRepository;

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/path/to/kiosco.db")
///     .label("primary")
///     .max_connections(5);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Name reported by [`Database::backend`].
    pub label: String,

    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// Connection timeout duration.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    ///
    /// ## Arguments
    /// * `path` - Path to the SQLite database file. Will be created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            label: "primary".to_string(),
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
        }
    }

    /// Sets the backend label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let db = Database::new(DbConfig::in_memory()).await?;
    /// // Database is isolated, perfect for tests
    /// ```
    pub fn in_memory() -> Self {
        DbConfig {
            label: "memory".to_string(),
            database_path: PathBuf::from(":memory:"),
            max_connections: 1, // In-memory requires single connection
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            run_migrations: true,
        }
    }
}

/// The backend a [`Database`] ended up connected to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageBackend {
    pub label: String,
    pub path: PathBuf,
    /// Position in the ranked list (0 = primary).
    pub rank: usize,
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing repository access.
///
/// Cheap to clone: clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    /// The SQLite connection pool.
    pool: SqlitePool,
    backend: StorageBackend,
}

impl Database {
    /// Creates a new database connection pool.
    ///
    /// ## What This Does
    /// 1. Creates the database file and its directory if they don't exist
    /// 2. Configures SQLite: WAL, NORMAL synchronous, foreign keys on
    /// 3. Creates the connection pool
    /// 4. Runs migrations (if enabled)
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        Self::connect_at(config, 0).await
    }

    /// Tries each backend in order and returns the first that connects and
    /// migrates.
    ///
    /// Every failure is logged at `warn` with the backend label. When all
    /// fail, the last error is returned.
    pub async fn connect_ranked(configs: impl IntoIterator<Item = DbConfig>) -> DbResult<Self> {
        let mut last_error = DbError::ConnectionFailed("no storage backend configured".to_string());

        for (rank, config) in configs.into_iter().enumerate() {
            let label = config.label.clone();
            match Self::connect_at(config, rank).await {
                Ok(db) => {
                    if rank > 0 {
                        warn!(backend = %label, rank, "Using fallback storage backend");
                    }
                    return Ok(db);
                }
                Err(e) => {
                    warn!(backend = %label, rank, error = %e, "Storage backend unavailable");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    async fn connect_at(config: DbConfig, rank: usize) -> DbResult<Self> {
        info!(
            backend = %config.label,
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        // SQLite creates the file but not the directory holding it
        if let Some(dir) = config
            .database_path
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
        {
            std::fs::create_dir_all(dir).map_err(|e| {
                DbError::ConnectionFailed(format!("cannot create {}: {e}", dir.display()))
            })?;
        }

        // sqlite://path creates file if not exists
        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // SQLite has them disabled by default
            .foreign_keys(true)
            .create_if_missing(true);

        debug!("Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database {
            pool,
            backend: StorageBackend {
                label: config.label,
                path: config.database_path,
                rank,
            },
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Runs database migrations. Idempotent.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Which backend this handle is connected to.
    pub fn backend(&self) -> &StorageBackend {
        &self.backend
    }

    /// Returns the shift repository.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let active = db.shifts().get_active().await?;
    /// ```
    pub fn shifts(&self) -> ShiftRepository {
        ShiftRepository::new(self.pool.clone())
    }

    /// Returns the sale repository.
    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.pool.clone())
    }

    /// Returns the closure repository.
    pub fn closures(&self) -> ClosureRepository {
        ClosureRepository::new(self.pool.clone())
    }

    /// Returns the counter repository.
    pub fn counters(&self) -> CounterRepository {
        CounterRepository::new(self.pool.clone())
    }

    /// Closes the database connection pool.
    ///
    /// ## Note
    /// After calling close, all repository operations will fail.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// Checks if the database is healthy (can execute queries).
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        assert!(db.health_check().await);
        assert_eq!(db.backend().label, "memory");
        assert_eq!(db.backend().rank, 0);
    }

    #[tokio::test]
    async fn test_config_builder() {
        let config = DbConfig::new("/tmp/test.db")
            .label("fallback")
            .max_connections(10)
            .min_connections(2);

        assert_eq!(config.label, "fallback");
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
    }

    #[tokio::test]
    async fn test_missing_directories_are_created() {
        let root = std::env::temp_dir().join(format!("kiosco-dirs-{}", uuid::Uuid::new_v4()));
        let path = root.join("data").join("nested").join("kiosco.db");

        let db = Database::new(DbConfig::new(path.clone())).await.unwrap();
        assert!(db.health_check().await);
        assert!(path.exists());

        db.close().await;
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_connect_ranked_falls_back() {
        // A regular file where the directory should be cannot be created
        let blocker = std::env::temp_dir().join(format!("kiosco-blocker-{}", uuid::Uuid::new_v4()));
        std::fs::write(&blocker, b"").unwrap();

        let broken = DbConfig::new(blocker.join("kiosco.db"))
            .label("primary")
            .connect_timeout(Duration::from_secs(1));
        let db = Database::connect_ranked([broken, DbConfig::in_memory().label("fallback")])
            .await
            .unwrap();

        assert_eq!(db.backend().label, "fallback");
        assert_eq!(db.backend().rank, 1);
        assert!(db.health_check().await);

        let _ = std::fs::remove_file(&blocker);
    }

    #[tokio::test]
    async fn test_connect_ranked_with_no_backends_fails() {
        let err = Database::connect_ranked(Vec::new()).await.unwrap_err();
        assert!(matches!(err, DbError::ConnectionFailed(_)));
    }
}
