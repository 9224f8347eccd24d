//! Records exchanged between the ingestor, the coordinator and reporting

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::dedup::InsertSummary;
use crate::error::{ErrorKind, IngestError};
use crate::runlog::LogLine;

/// A spreadsheet found during a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFile {
    pub path: PathBuf,
    /// File name including extension, used to tag log lines
    pub file_name: String,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { path, file_name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Processing stages of one file, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStage {
    NotStarted,
    Read,
    Normalized,
    TableEnsured,
    RowsInserted,
    Done,
}

/// What the ingestor concluded about a file, before log lines are attached
#[derive(Debug)]
pub struct Verdict {
    pub table_name: Option<String>,
    /// Last stage reached
    pub stage: IngestStage,
    pub result: Result<InsertSummary, IngestError>,
}

impl Verdict {
    pub fn failed(table_name: Option<String>, stage: IngestStage, error: IngestError) -> Self {
        Self { table_name, stage, result: Err(error) }
    }
}

/// Result of processing one file
#[derive(Debug, Clone, Serialize)]
pub struct IngestionOutcome {
    pub file_name: String,
    pub file_path: PathBuf,
    pub table_name: Option<String>,
    pub ok: bool,
    pub message: String,
    pub error_kind: Option<ErrorKind>,
    /// Last stage reached; `Done` on success
    pub stage: IngestStage,
    pub rows_total: usize,
    pub rows_inserted: u64,
    /// Lines produced while processing this file only
    pub log: Vec<LogLine>,
}

impl IngestionOutcome {
    pub fn from_verdict(source: &SourceFile, verdict: Verdict, log: Vec<LogLine>) -> Self {
        let (ok, message, error_kind, rows_total, rows_inserted) = match verdict.result {
            Ok(summary) => (
                true,
                success_message(verdict.table_name.as_deref().unwrap_or("-"), &summary),
                None,
                summary.attempted,
                summary.inserted,
            ),
            Err(err) => (false, err.to_string(), Some(err.kind()), 0, 0),
        };

        Self {
            file_name: source.file_name.clone(),
            file_path: source.path.clone(),
            table_name: verdict.table_name,
            ok,
            message,
            error_kind,
            stage: verdict.stage,
            rows_total,
            rows_inserted,
            log,
        }
    }
}

fn success_message(table: &str, summary: &InsertSummary) -> String {
    format!(
        "Import into table '{}' finished: {} row(s) processed, {} inserted, {} duplicate(s) skipped.",
        table,
        summary.attempted,
        summary.inserted,
        summary.skipped()
    )
}

/// Aggregate result of one folder scan
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub folder: PathBuf,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    /// In completion order, which varies between runs
    pub outcomes: Vec<IngestionOutcome>,
}

impl ScanReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.ok).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(|o| !o.ok)
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn rows_inserted(&self) -> u64 {
        self.outcomes.iter().map(|o| o.rows_inserted).sum()
    }
}
