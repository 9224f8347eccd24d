//! Single-file ingestion
//!
//! Drives one spreadsheet through
//! `NotStarted → Read → Normalized → TableEnsured → RowsInserted → Done`,
//! logging each step. Failures at any stage end the file early with a failed
//! outcome; nothing escapes [`FileIngestor::ingest`].

use std::path::{Path, PathBuf};

use sheetload_common::checksum::compute_file_checksum;
use tracing::instrument;

use crate::dataset::Dataset;
use crate::dedup::{insert_dataset, InsertSummary};
use crate::error::IngestError;
use crate::normalize::{table_name_from_path, SURROGATE_KEY};
use crate::reader::read_spreadsheet;
use crate::runlog::{FileLog, LogSink};
use crate::schema::{TableSchema, ROW_HASH_COLUMN};
use crate::store::Store;
use crate::types::{IngestStage, IngestionOutcome, SourceFile, Verdict};

/// Loads one spreadsheet into its target table
#[derive(Debug, Clone)]
pub struct FileIngestor {
    store: Store,
}

impl FileIngestor {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Ingest the spreadsheet at `path`, never failing past this boundary
    pub async fn ingest(&self, path: &Path) -> IngestionOutcome {
        let source = SourceFile::new(path);
        let log = FileLog::new(source.file_name.clone());
        let verdict = self.ingest_logged(&source, &log).await;
        IngestionOutcome::from_verdict(&source, verdict, log.take_lines())
    }

    /// Run the stage machine for `source`, writing progress into `log`
    #[instrument(skip_all, fields(file = %source.file_name))]
    pub async fn ingest_logged(&self, source: &SourceFile, log: &FileLog) -> Verdict {
        let mut stage = IngestStage::NotStarted;
        let mut table_name = None;

        match self.run(source, log, &mut stage, &mut table_name).await {
            Ok(summary) => {
                log.info("Processing finished successfully.");
                Verdict { table_name, stage: IngestStage::Done, result: Ok(summary) }
            },
            Err(err) => {
                log.error(&err.to_string());
                Verdict::failed(table_name, stage, err)
            },
        }
    }

    async fn run(
        &self,
        source: &SourceFile,
        log: &FileLog,
        stage: &mut IngestStage,
        table_name: &mut Option<String>,
    ) -> Result<InsertSummary, IngestError> {
        let path = source.path.clone();
        if !path.is_file() {
            return Err(IngestError::NotFound(path.display().to_string()));
        }

        log.info(&format!("Reading spreadsheet: {}", path.display()));
        let dataset = read_prepared(path).await?;
        *stage = IngestStage::Read;

        if dataset.is_empty() {
            return Err(IngestError::EmptyInput);
        }
        log.info(&format!(
            "Read {} row(s) and {} column(s).",
            dataset.len(),
            dataset.columns.len() + dataset.dropped_columns.len()
        ));

        log.info("Normalizing headers and data types...");
        if !dataset.dropped_columns.is_empty() {
            log.info(&format!(
                "Dropped empty column(s): {}",
                dataset.dropped_columns.join(", ")
            ));
        }
        let name = table_name_from_path(&source.path);
        log.info(&format!("Target table derived from file: '{}'", name));
        *table_name = Some(name.clone());
        *stage = IngestStage::Normalized;

        let schema = TableSchema::from_dataset(name, &dataset);
        self.ensure_table(&schema, log).await?;
        *stage = IngestStage::TableEnsured;

        log.info(&format!(
            "Inserting {} row(s) into '{}'...",
            dataset.len(),
            schema.name
        ));
        let summary = insert_dataset(&self.store, &schema, &dataset).await?;
        log.info(&format!(
            "Insert finished: {}/{} row(s) inserted (the rest already existed).",
            summary.inserted, summary.attempted
        ));
        *stage = IngestStage::RowsInserted;

        Ok(summary)
    }

    /// Create the table if absent; an existing table must already hold
    /// every incoming column
    async fn ensure_table(&self, schema: &TableSchema, log: &FileLog) -> Result<(), IngestError> {
        log.info(&format!("Creating/verifying table '{}'...", schema.name));

        match self.store.table_columns(&schema.name).await? {
            Some(existing) => {
                let missing = schema.missing_from(&existing);
                if !missing.is_empty() {
                    let known: Vec<&str> = existing
                        .iter()
                        .map(String::as_str)
                        .filter(|c| *c != SURROGATE_KEY && *c != ROW_HASH_COLUMN)
                        .collect();
                    return Err(IngestError::SchemaMismatch {
                        table: schema.name.clone(),
                        detail: format!(
                            "existing table has no column(s) {} (table columns: {})",
                            missing.join(", "),
                            known.join(", ")
                        ),
                    });
                }
            },
            None => self.store.ensure_table(schema).await?,
        }

        log.info(&format!("Table '{}' ready to receive data.", schema.name));
        Ok(())
    }
}

/// Decode and prepare on the blocking pool
async fn read_prepared(path: PathBuf) -> Result<Dataset, IngestError> {
    tokio::task::spawn_blocking(move || {
        let raw = read_spreadsheet(&path)?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            if let Some(sha256) = source_checksum(&path) {
                tracing::debug!(path = %path.display(), %sha256, "Spreadsheet decoded");
            }
        }
        Ok(Dataset::prepare(raw))
    })
    .await?
}

/// SHA-256 of a source file for debug logs; never fails the file
fn source_checksum(path: &Path) -> Option<String> {
    match compute_file_checksum(path) {
        Ok(sum) => Some(sum),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "Checksum unavailable");
            None
        },
    }
}
