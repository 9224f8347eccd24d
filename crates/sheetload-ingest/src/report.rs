//! Scan report rendering and delivery
//!
//! A [`ReportSink`] receives the finished [`ScanReport`] together with the run
//! log. [`HtmlFileReporter`] drops the rendered summary (and, when something
//! failed, the plain-text log) into a directory.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Local;

use crate::runlog::{LogLine, LogSink, RunLog};
use crate::types::ScanReport;

/// Receives a finished scan
pub trait ReportSink: Send + Sync {
    fn deliver(&self, report: &ScanReport, log: &[LogLine]) -> anyhow::Result<()>;
}

/// Escape text for HTML element content and attribute values
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const CELL_STYLE: &str = "padding:4px 8px;border:1px solid #555;";
const HEADER_STYLE: &str = "padding:6px 8px;border:1px solid #555;";

/// Summary table with one row per outcome: file, table, status, message
pub fn render_html(report: &ScanReport, recipient: Option<&str>) -> String {
    let mut rows = String::new();
    for outcome in &report.outcomes {
        let (icon, color) = if outcome.ok { ("&#10004;", "#4CAF50") } else { ("&#10008;", "#FF5252") };
        rows.push_str(&format!(
            "      <tr>\n\
             \x20       <td style=\"{cell}\">{file}</td>\n\
             \x20       <td style=\"{cell}\">{table}</td>\n\
             \x20       <td style=\"{cell}text-align:center;color:{color};\">{icon}</td>\n\
             \x20       <td style=\"{cell}\">{message}</td>\n\
             \x20     </tr>\n",
            cell = CELL_STYLE,
            file = escape_html(&outcome.file_name),
            table = escape_html(outcome.table_name.as_deref().unwrap_or("-")),
            color = color,
            icon = icon,
            message = escape_html(&outcome.message),
        ));
    }

    let recipient_line = recipient
        .map(|r| format!("    <p style=\"margin-top:0;\">To: {}</p>\n", escape_html(r)))
        .unwrap_or_default();

    format!(
        "<html>\n\
         <body style=\"font-family: Arial, sans-serif; background-color:#202020; color:#FFFFFF;\">\n\
         \x20   <h2 style=\"margin-bottom:4px;\">Spreadsheet upload report</h2>\n\
         \x20   <p style=\"margin-top:0;\">Date: {date}</p>\n\
         \x20   <p style=\"margin-top:0;\">Folder: {folder}</p>\n\
         {recipient_line}\
         \x20   <p style=\"margin-top:0;\">Success: {ok}, Errors: {failed}</p>\n\
         \x20   <table style=\"border-collapse: collapse; width: 100%; margin-top:10px; font-size:13px;\">\n\
         \x20     <tr style=\"background-color:#333333;\">\n\
         \x20       <th style=\"{th}\">File</th>\n\
         \x20       <th style=\"{th}\">Table</th>\n\
         \x20       <th style=\"{th}\">Status</th>\n\
         \x20       <th style=\"{th}\">Message</th>\n\
         \x20     </tr>\n\
         {rows}\
         \x20   </table>\n\
         \x20   <p style=\"margin-top:16px;font-size:11px;color:#CCCCCC;\">Generated automatically by sheetload.</p>\n\
         </body>\n\
         </html>\n",
        date = report.finished_at.format("%d/%m/%Y %H:%M:%S"),
        folder = escape_html(&report.folder.display().to_string()),
        recipient_line = recipient_line,
        ok = report.succeeded(),
        failed = report.failed(),
        th = HEADER_STYLE,
        rows = rows,
    )
}

/// Rendered run log, one line per entry
pub fn render_log(log: &[LogLine]) -> String {
    let mut text = log.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n");
    if !text.is_empty() {
        text.push('\n');
    }
    text
}

/// Writes `report-<stamp>.html`, plus `log-<stamp>.txt` when the scan had failures
#[derive(Debug, Clone)]
pub struct HtmlFileReporter {
    output_dir: PathBuf,
    recipient: Option<String>,
}

impl HtmlFileReporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self { output_dir: output_dir.into(), recipient: None }
    }

    pub fn with_recipient(mut self, recipient: Option<String>) -> Self {
        self.recipient = recipient;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

impl ReportSink for HtmlFileReporter {
    fn deliver(&self, report: &ScanReport, log: &[LogLine]) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("Failed to create report directory {}", self.output_dir.display())
        })?;

        let stamp = report.finished_at.format("%Y%m%d-%H%M%S");

        let html_path = self.output_dir.join(format!("report-{}.html", stamp));
        std::fs::write(&html_path, render_html(report, self.recipient.as_deref()))
            .with_context(|| format!("Failed to write {}", html_path.display()))?;

        if report.has_failures() {
            let log_path = self.output_dir.join(format!("log-{}.txt", stamp));
            std::fs::write(&log_path, render_log(log))
                .with_context(|| format!("Failed to write {}", log_path.display()))?;
        }

        Ok(())
    }
}

/// Hand the scan to `sink`; never fails
///
/// An empty scan is not reported. Sink errors are written to the run log and
/// dropped.
pub fn deliver_report(sink: &dyn ReportSink, report: &ScanReport, run_log: &RunLog) {
    if report.is_empty() {
        run_log.info("No file processed, report will not be sent.");
        return;
    }

    run_log.info("Preparing HTML report...");
    if report.has_failures() {
        run_log.info("Errors were detected, attaching the run log to the report...");
    }

    let started = Local::now();
    match sink.deliver(report, &run_log.lines()) {
        Ok(()) => {
            tracing::debug!(elapsed_ms = (Local::now() - started).num_milliseconds(), "Report delivered");
            run_log.info("Report delivered successfully.");
        },
        Err(err) => run_log.error(&format!("Failed to deliver report: {:#}", err)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dedup::InsertSummary;
    use crate::error::IngestError;
    use crate::types::{IngestStage, IngestionOutcome, SourceFile, Verdict};
    use std::sync::Mutex;

    fn outcome(name: &str, ok: bool) -> IngestionOutcome {
        let verdict = if ok {
            Verdict {
                table_name: Some("sales".into()),
                stage: IngestStage::Done,
                result: Ok(InsertSummary { attempted: 3, inserted: 3 }),
            }
        } else {
            Verdict::failed(None, IngestStage::Read, IngestError::decode("bad <zip> & more"))
        };
        IngestionOutcome::from_verdict(&SourceFile::new(name), verdict, Vec::new())
    }

    fn report(outcomes: Vec<IngestionOutcome>) -> ScanReport {
        ScanReport {
            folder: PathBuf::from("/in"),
            started_at: Local::now(),
            finished_at: Local::now(),
            outcomes,
        }
    }

    #[derive(Default)]
    struct Capture {
        delivered: Mutex<usize>,
        fail: bool,
    }

    impl ReportSink for Capture {
        fn deliver(&self, _report: &ScanReport, _log: &[LogLine]) -> anyhow::Result<()> {
            *self.delivered.lock().unwrap() += 1;
            if self.fail {
                anyhow::bail!("smtp down");
            }
            Ok(())
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_render_html_escapes_cells() {
        let html = render_html(&report(vec![outcome("a&b.xlsx", true), outcome("c.xlsx", false)]), None);
        assert!(html.contains("a&amp;b.xlsx"));
        assert!(html.contains("bad &lt;zip&gt; &amp; more"));
        assert!(!html.contains("<zip>"));
        assert!(html.contains("Success: 1, Errors: 1"));
        assert_eq!(html.matches("<tr>").count(), 2);
        assert!(html.contains("color:#4CAF50;\">&#10004;</td>"));
        assert!(html.contains("color:#FF5252;\">&#10008;</td>"));
    }

    #[test]
    fn test_file_reporter_attaches_log_only_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = HtmlFileReporter::new(dir.path().join("ok"));
        reporter.deliver(&report(vec![outcome("a.xlsx", true)]), &[]).unwrap();

        let names: Vec<String> = std::fs::read_dir(reporter.output_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("report-") && names[0].ends_with(".html"));

        let reporter = HtmlFileReporter::new(dir.path().join("bad"));
        reporter.deliver(&report(vec![outcome("b.xlsx", false)]), &[]).unwrap();
        let count = std::fs::read_dir(reporter.output_dir()).unwrap().count();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_deliver_skips_empty_scan() {
        let sink = Capture::default();
        let run_log = RunLog::new();
        deliver_report(&sink, &report(Vec::new()), &run_log);
        assert_eq!(*sink.delivered.lock().unwrap(), 0);
    }

    #[test]
    fn test_deliver_swallows_sink_errors() {
        let sink = Capture { fail: true, ..Default::default() };
        let run_log = RunLog::new();
        deliver_report(&sink, &report(vec![outcome("a.xlsx", true)]), &run_log);

        assert_eq!(*sink.delivered.lock().unwrap(), 1);
        let last = run_log.lines().pop().unwrap();
        assert!(last.message.contains("smtp down"));
    }
}
