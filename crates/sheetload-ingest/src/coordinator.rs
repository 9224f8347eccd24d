//! Parallel folder ingestion
//!
//! Discovers spreadsheets in a folder and runs a [`FileIngestor`] per file on
//! a bounded number of concurrent tasks (`buffer_unordered` over spawned
//! tasks). Each file logs into its own buffer; the buffer is merged into the
//! shared [`RunLog`] in one piece when the file finishes, and outcomes are
//! collected in completion order.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use futures::stream::{self, StreamExt};
use tracing::{error, info};

use crate::error::IngestError;
use crate::ingestor::FileIngestor;
use crate::reader::is_spreadsheet;
use crate::runlog::{FileLog, LogSink, RunLog};
use crate::types::{IngestStage, IngestionOutcome, ScanReport, SourceFile, Verdict};

/// Fans files out to a bounded pool of ingestion tasks
#[derive(Debug, Clone)]
pub struct IngestionCoordinator {
    ingestor: Arc<FileIngestor>,
    workers: usize,
}

impl IngestionCoordinator {
    pub fn new(ingestor: FileIngestor, workers: usize) -> Self {
        Self { ingestor: Arc::new(ingestor), workers: workers.max(1) }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Ingest every spreadsheet directly inside `folder`
    ///
    /// Returns one outcome per discovered file, in completion order. A
    /// missing folder or a folder without spreadsheets yields an empty list.
    pub async fn ingest_folder(&self, folder: &Path, run_log: &RunLog) -> Vec<IngestionOutcome> {
        run_log.info(&format!("Scan started in folder: {}", folder.display()));

        let files = match discover_files(folder) {
            Ok(files) => files,
            Err(err) => {
                tracing::debug!(error = %err, "Folder discovery failed");
                run_log.warn(&format!("Input folder is invalid or missing: {}", folder.display()));
                return Vec::new();
            },
        };

        if files.is_empty() {
            run_log.info("No spreadsheet files (*.xlsx / *.xls) found in the folder.");
            return Vec::new();
        }

        run_log.info(&format!(
            "{} spreadsheet file(s) found, processing with {} worker(s).",
            files.len(),
            self.workers
        ));

        let ingestor = Arc::clone(&self.ingestor);
        let work = move |source: SourceFile, log: Arc<FileLog>| {
            let ingestor = Arc::clone(&ingestor);
            async move { ingestor.ingest_logged(&source, &log).await }
        };
        let outcomes = fan_out(files, self.workers, run_log, work).await;

        run_log.info("Folder scan finished.");
        info!(
            succeeded = outcomes.iter().filter(|o| o.ok).count(),
            failed = outcomes.iter().filter(|o| !o.ok).count(),
            "Scan complete"
        );

        outcomes
    }

    /// [`ingest_folder`](Self::ingest_folder) wrapped with timing
    pub async fn run_scan(&self, folder: &Path, run_log: &RunLog) -> ScanReport {
        let started_at = Local::now();
        let outcomes = self.ingest_folder(folder, run_log).await;

        ScanReport {
            folder: folder.to_path_buf(),
            started_at,
            finished_at: Local::now(),
            outcomes,
        }
    }
}

/// Run `work` for every file with at most `workers` in flight
///
/// Each outcome's log lines are merged into `run_log` as soon as that file
/// completes, so a file's lines stay contiguous in the run log.
async fn fan_out<F, Fut>(
    files: Vec<SourceFile>,
    workers: usize,
    run_log: &RunLog,
    work: F,
) -> Vec<IngestionOutcome>
where
    F: Fn(SourceFile, Arc<FileLog>) -> Fut,
    Fut: Future<Output = Verdict> + Send + 'static,
{
    let total = files.len();
    let mut completions = stream::iter(files)
        .map(|source| isolate(source, &work))
        .buffer_unordered(workers.max(1));

    let mut outcomes = Vec::with_capacity(total);
    while let Some(outcome) = completions.next().await {
        run_log.absorb(&outcome.log);
        outcomes.push(outcome);
    }
    outcomes
}

/// Process one file on its own task; panics become failed outcomes
async fn isolate<F, Fut>(source: SourceFile, work: &F) -> IngestionOutcome
where
    F: Fn(SourceFile, Arc<FileLog>) -> Fut,
    Fut: Future<Output = Verdict> + Send + 'static,
{
    let log = Arc::new(FileLog::new(source.file_name.clone()));
    let job = work(source.clone(), Arc::clone(&log));

    let task = {
        let log = Arc::clone(&log);
        let file_name = source.file_name.clone();
        tokio::spawn(async move {
            log.info(&format!("--- Starting file: {} ---", file_name));
            let verdict = job.await;
            let status = if verdict.result.is_ok() { "SUCCESS" } else { "ERROR" };
            log.info(&format!("--- Finished with {} for file: {} ---", status, file_name));
            verdict
        })
    };

    let verdict = match task.await {
        Ok(verdict) => verdict,
        Err(join_err) => {
            let err = IngestError::from(join_err);
            error!(file = %source.file_name, error = %err, "Worker failed");
            log.error(&err.to_string());
            log.info(&format!("--- Finished with ERROR for file: {} ---", source.file_name));
            Verdict::failed(None, IngestStage::NotStarted, err)
        },
    };

    IngestionOutcome::from_verdict(&source, verdict, log.take_lines())
}

/// Spreadsheets directly inside `folder`, sorted by file name
pub fn discover_files(folder: &Path) -> Result<Vec<SourceFile>, IngestError> {
    if folder.as_os_str().is_empty() || !folder.is_dir() {
        return Err(IngestError::NotFound(folder.display().to_string()));
    }

    let entries = std::fs::read_dir(folder)
        .map_err(|e| IngestError::NotFound(format!("{}: {}", folder.display(), e)))?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .map(|n| is_spreadsheet(&n.to_string_lossy()))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();

    Ok(paths.into_iter().map(SourceFile::new).collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dedup::InsertSummary;
    use crate::error::ErrorKind;

    fn done(rows: usize) -> Verdict {
        Verdict {
            table_name: Some("t".to_string()),
            stage: IngestStage::Done,
            result: Ok(InsertSummary { attempted: rows, inserted: rows as u64 }),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_file_fails_alone() {
        let files: Vec<SourceFile> =
            ["a.xlsx", "boom.xlsx", "c.xlsx", "d.xlsx"].into_iter().map(SourceFile::new).collect();
        let run_log = RunLog::new();

        let outcomes = fan_out(files, 2, &run_log, |source: SourceFile, log: Arc<FileLog>| async move {
            log.info("Reading spreadsheet");
            if source.file_name == "boom.xlsx" {
                panic!("sheet exploded");
            }
            done(2)
        })
        .await;

        assert_eq!(outcomes.len(), 4);
        assert_eq!(outcomes.iter().filter(|o| o.ok).count(), 3);

        let boom = outcomes.iter().find(|o| o.file_name == "boom.xlsx").unwrap();
        assert!(!boom.ok);
        assert_eq!(boom.error_kind, Some(ErrorKind::Unexpected));
        assert_eq!(boom.stage, IngestStage::NotStarted);
        assert!(boom.message.contains("sheet exploded"), "{}", boom.message);

        let messages: Vec<&str> = boom.log.iter().map(|l| l.message.as_str()).collect();
        assert_eq!(messages[0], "--- Starting file: boom.xlsx ---");
        assert_eq!(messages[1], "Reading spreadsheet");
        assert!(messages[2].contains("sheet exploded"));
        assert_eq!(messages.last().copied(), Some("--- Finished with ERROR for file: boom.xlsx ---"));

        for outcome in outcomes.iter().filter(|o| o.file_name != "boom.xlsx") {
            assert_eq!(outcome.rows_inserted, 2);
            assert_eq!(
                outcome.log.last().unwrap().message,
                format!("--- Finished with SUCCESS for file: {} ---", outcome.file_name)
            );
        }

        let merged = run_log.lines();
        assert_eq!(merged.len(), outcomes.iter().map(|o| o.log.len()).sum::<usize>());
    }

    #[test]
    fn test_discover_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.xlsx", "A.XLS", "notes.txt", "data.csv", "c.xlsx.tmp"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.xlsx")).unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("deep.xlsx"), b"x").unwrap();

        let files = discover_files(dir.path()).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, vec!["A.XLS", "b.xlsx"]);
    }

    #[test]
    fn test_discover_missing_folder() {
        let err = discover_files(Path::new("/no/such/folder")).unwrap_err();
        assert!(matches!(err, IngestError::NotFound(_)));
        assert!(discover_files(Path::new("")).is_err());
    }
}
