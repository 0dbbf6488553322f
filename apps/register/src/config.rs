//! # Register Configuration
//!
//! Settings loaded once at startup.
//!
//! ## Configuration Sources (Priority Order)
//! 1. Environment variables (`KIOSCO_*`)
//! 2. Config file (`register.toml` in the platform config directory, or the
//!    file named by `KIOSCO_CONFIG`)
//! 3. Defaults (this file)
//!
//! ## Environment Variables
//! ```text
//! KIOSCO_CONFIG              path of the TOML file
//! KIOSCO_DB_PATH             database_path
//! KIOSCO_FALLBACK_DB_PATH    fallback_database_path ("" disables it)
//! KIOSCO_STORE_NAME          store_name
//! KIOSCO_UTC_OFFSET_MINUTES  utc_offset_minutes
//! KIOSCO_LEGACY_SNAPSHOT     legacy_snapshot
//! KIOSCO_LOG                 log_filter
//! ```
//!
//! ## Example `register.toml`
//! ```toml
//! database_path = "/var/lib/kiosco/kiosco.db"
//! fallback_database_path = "/tmp/kiosco-fallback.db"
//! store_name = "Kiosco Barrio Norte"
//! utc_offset_minutes = -180
//! ```

use chrono::FixedOffset;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use kiosco_db::DbConfig;

const CONFIG_FILE: &str = "register.toml";
const DATABASE_FILE: &str = "kiosco.db";
const FALLBACK_DATABASE_FILE: &str = "kiosco-fallback.db";

/// Register configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterConfig {
    /// Primary SQLite file.
    pub database_path: PathBuf,

    /// Second backend, tried once when the primary cannot be opened.
    pub fallback_database_path: Option<PathBuf>,

    /// Shown in the CLI header and logs.
    pub store_name: String,

    /// Offset of the store's wall clock, for calendar days in closure
    /// filters and for CSV dates.
    /// Default: -180 (Argentina)
    pub utc_offset_minutes: i32,

    /// Legacy JSON backup imported once at startup, if set.
    pub legacy_snapshot: Option<PathBuf>,

    /// `EnvFilter` directives. `RUST_LOG` still wins.
    pub log_filter: Option<String>,
}

impl Default for RegisterConfig {
    fn default() -> Self {
        let dirs = project_dirs();
        RegisterConfig {
            database_path: dirs
                .as_ref()
                .map(|d| d.data_dir().join(DATABASE_FILE))
                .unwrap_or_else(|| PathBuf::from(DATABASE_FILE)),
            fallback_database_path: dirs.as_ref().map(|d| d.cache_dir().join(FALLBACK_DATABASE_FILE)),
            store_name: "Kiosco Digital".to_string(),
            utc_offset_minutes: -180,
            legacy_snapshot: None,
            log_filter: None,
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("ar", "kiosco", "register")
}

impl RegisterConfig {
    /// Loads the configuration from the process environment and the config
    /// file.
    ///
    /// A missing default config file is fine; a missing file named by
    /// `KIOSCO_CONFIG` is an error.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| env::var(key).ok())
    }

    /// Same as [`load`](Self::load) with an explicit variable lookup.
    pub fn load_with(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = match var("KIOSCO_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => match project_dirs().map(|d| d.config_dir().join(CONFIG_FILE)) {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env(var)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a TOML file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&text).map_err(|e| match e {
            ConfigError::Malformed { reason, .. } => ConfigError::Malformed {
                path: path.display().to_string(),
                reason,
            },
            other => other,
        })
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Malformed {
            path: CONFIG_FILE.to_string(),
            reason: e.to_string(),
        })
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(path) = var("KIOSCO_DB_PATH") {
            self.database_path = PathBuf::from(path);
        }
        if let Some(path) = var("KIOSCO_FALLBACK_DB_PATH") {
            self.fallback_database_path = Some(PathBuf::from(path)).filter(|p| !p.as_os_str().is_empty());
        }
        if let Some(name) = var("KIOSCO_STORE_NAME") {
            self.store_name = name;
        }
        if let Some(minutes) = var("KIOSCO_UTC_OFFSET_MINUTES") {
            self.utc_offset_minutes = minutes
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue("KIOSCO_UTC_OFFSET_MINUTES".to_string()))?;
        }
        if let Some(path) = var("KIOSCO_LEGACY_SNAPSHOT") {
            self.legacy_snapshot = Some(PathBuf::from(path));
        }
        if let Some(filter) = var("KIOSCO_LOG") {
            self.log_filter = Some(filter);
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.offset()?;
        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingRequired("database_path".to_string()));
        }
        Ok(())
    }

    /// The store's UTC offset.
    pub fn offset(&self) -> Result<FixedOffset, ConfigError> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .ok_or_else(|| ConfigError::InvalidValue("utc_offset_minutes".to_string()))
    }

    /// Storage backends in the order they should be tried.
    pub fn storage_backends(&self) -> Vec<DbConfig> {
        let mut backends = vec![DbConfig::new(&self.database_path).label("primary")];
        if let Some(fallback) = &self.fallback_database_path {
            if fallback != &self.database_path {
                backends.push(DbConfig::new(fallback).label("fallback"));
            }
        }
        backends
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Cannot read {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("Invalid configuration in {path}: {reason}")]
    Malformed { path: String, reason: String },
}

// =============================================================================
// Unit Tests
// =============================================================================
