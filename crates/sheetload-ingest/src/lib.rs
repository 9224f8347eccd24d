//! Sheetload Ingest Library
//!
//! Loads folders of spreadsheets into a relational store.
//!
//! # Pipeline
//!
//! - **Normalizer** ([`normalize`]): header and file names to SQL-safe identifiers
//! - **Reader** ([`reader`]) and **dataset** ([`dataset`]): first worksheet to typed columns
//! - **Schema** ([`schema`]): type inference and dialect-specific DDL
//! - **Deduplicator** ([`dedup`]): content-hashed, conflict-tolerant inserts
//! - **Ingestor** ([`ingestor`]): one file end to end, never failing past its boundary
//! - **Coordinator** ([`coordinator`]): bounded parallel scan of a folder
//!
//! # Example
//!
//! ```no_run
//! use sheetload_ingest::{FileIngestor, IngestionCoordinator, RunLog, Store, StoreConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Store::connect(&StoreConfig::new("sqlite://sheetload.db")).await?;
//!     let coordinator = IngestionCoordinator::new(FileIngestor::new(store.clone()), 4);
//!
//!     let run_log = RunLog::new();
//!     let report = coordinator.run_scan(std::path::Path::new("./storage"), &run_log).await;
//!     println!("{} ok, {} failed", report.succeeded(), report.failed());
//!
//!     store.close().await;
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod dataset;
pub mod dedup;
pub mod error;
pub mod ingestor;
pub mod normalize;
pub mod reader;
pub mod report;
pub mod runlog;
pub mod schema;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::IngestConfig;
pub use coordinator::IngestionCoordinator;
pub use error::{ErrorKind, IngestError, Result};
pub use ingestor::FileIngestor;
pub use runlog::{LogSink, RunLog};
pub use store::{Store, StoreConfig};
pub use types::{IngestionOutcome, ScanReport, SourceFile};
