//! Configuration management

use std::path::PathBuf;

use serde::Serialize;

use crate::schema::Dialect;
use crate::store::StoreConfig;

// ============================================================================
// Ingestion Configuration Constants
// ============================================================================

/// Default folder scanned for spreadsheets.
pub const DEFAULT_INPUT_FOLDER: &str = "./storage";

/// Default number of files processed concurrently.
pub const DEFAULT_WORKERS: usize = 4;

/// Default store URL (file-embedded dialect).
pub const DEFAULT_DATABASE_URL: &str = "sqlite://sheetload.db";

/// Default maximum store connections in the pool.
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;

/// Default store connection timeout in seconds.
pub const DEFAULT_DB_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Ingestion configuration
#[derive(Debug, Clone, Serialize)]
pub struct IngestConfig {
    pub input_folder: PathBuf,
    pub workers: usize,
    pub database: StoreConfig,
    pub report: ReportConfig,
}

/// Where scan reports go
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportConfig {
    /// Address the report is meant for; carried into the report header
    pub recipient: Option<String>,
    /// Directory reports are written to; `None` disables delivery
    pub output_dir: Option<PathBuf>,
}

impl IngestConfig {
    /// Read configuration from `.env`, the environment and defaults
    ///
    /// Not validated, so command-line overrides can be layered on first.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from any key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            input_folder: non_empty("SHEETLOAD_INPUT_FOLDER")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_INPUT_FOLDER)),
            workers: non_empty("SHEETLOAD_WORKERS")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(DEFAULT_WORKERS),
            database: StoreConfig {
                url: non_empty("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
                max_connections: non_empty("SHEETLOAD_DB_MAX_CONNECTIONS")
                    .and_then(|s| s.trim().parse().ok())
                    .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS),
                connect_timeout_secs: non_empty("SHEETLOAD_DB_CONNECT_TIMEOUT")
                    .and_then(|s| s.trim().parse().ok())
                    .unwrap_or(DEFAULT_DB_CONNECT_TIMEOUT_SECS),
            },
            report: ReportConfig {
                recipient: non_empty("SHEETLOAD_REPORT_EMAIL"),
                output_dir: non_empty("SHEETLOAD_REPORT_DIR").map(PathBuf::from),
            },
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.workers == 0 {
            anyhow::bail!("Worker count must be greater than 0");
        }

        if self.database.url.trim().is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if Dialect::from_url(&self.database.url).is_none() {
            anyhow::bail!(
                "Unsupported database URL '{}': expected sqlite://, postgres:// or postgresql://",
                self.database.url
            );
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        if self.input_folder.as_os_str().is_empty() {
            tracing::warn!("No input folder configured");
        }

        Ok(())
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            input_folder: PathBuf::from(DEFAULT_INPUT_FOLDER),
            workers: DEFAULT_WORKERS,
            database: StoreConfig::new(DEFAULT_DATABASE_URL),
            report: ReportConfig::default(),
        }
    }
}
