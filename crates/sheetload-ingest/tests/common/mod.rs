//! Common test utilities for sheetload integration tests
//!
//! - tracing routed to the test writer
//! - SQLite stores in temporary directories
//! - a minimal `.xlsx` writer (one worksheet, inline strings, a date style)

#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use sheetload_ingest::{Store, StoreConfig};
use tempfile::TempDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,sheetload_ingest=debug,sqlx=warn")),
        )
        .with_test_writer()
        .try_init();
}

// ============================================================================
// SQLite Test Store
// ============================================================================

/// SQLite store backed by a file in its own temporary directory
pub struct TestStore {
    pub store: Store,
    pub path: PathBuf,
    _dir: TempDir,
}

impl TestStore {
    pub async fn start() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("sheetload-test.db");
        let store = Store::connect(&StoreConfig::new(format!("sqlite://{}", path.display()))).await?;
        Ok(Self { store, path, _dir: dir })
    }

    pub fn store(&self) -> Store {
        self.store.clone()
    }

    pub fn pool(&self) -> &sqlx::SqlitePool {
        match self.store {
            Store::Sqlite(ref pool) => pool,
            Store::Postgres(_) => unreachable!("test store is always SQLite"),
        }
    }

    /// User tables currently in the database
    pub async fn tables(&self) -> Result<Vec<String>> {
        let names = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(names)
    }

    /// `(name, declared type)` of every column of `table`
    pub async fn column_types(&self, table: &str) -> Result<Vec<(String, String)>> {
        let rows = sqlx::query_as("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")
            .bind(table)
            .fetch_all(self.pool())
            .await?;
        Ok(rows)
    }
}

// ============================================================================
// XLSX Fixtures
// ============================================================================

/// One worksheet cell
#[derive(Debug, Clone)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// Excel serial date, rendered with a date number format
    Date(f64),
}

pub fn text(value: &str) -> Cell {
    Cell::Text(value.to_string())
}

pub fn num(value: f64) -> Cell {
    Cell::Number(value)
}

/// Excel serial for a calendar date (1900 date system)
pub fn date(year: i32, month: u32, day: u32) -> Cell {
    let epoch = chrono::NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or_default();
    let day = chrono::NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default();
    Cell::Date((day - epoch).num_days() as f64)
}

/// Header row of text cells
pub fn header(names: &[&str]) -> Vec<Cell> {
    names.iter().map(|n| text(n)).collect()
}

fn column_letters(mut idx: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (idx % 26) as u8);
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn sheet_xml(rows: &[Vec<Cell>]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );

    for (r, row) in rows.iter().enumerate() {
        xml.push_str(&format!(r#"<row r="{}">"#, r + 1));
        for (c, cell) in row.iter().enumerate() {
            let reference = format!("{}{}", column_letters(c), r + 1);
            match cell {
                Cell::Empty => {},
                Cell::Text(v) => xml.push_str(&format!(
                    r#"<c r="{}" t="inlineStr"><is><t>{}</t></is></c>"#,
                    reference,
                    escape_xml(v)
                )),
                Cell::Number(v) => xml.push_str(&format!(r#"<c r="{}"><v>{}</v></c>"#, reference, v)),
                Cell::Bool(v) => xml.push_str(&format!(
                    r#"<c r="{}" t="b"><v>{}</v></c>"#,
                    reference,
                    u8::from(*v)
                )),
                Cell::Date(v) => xml.push_str(&format!(r#"<c r="{}" s="1"><v>{}</v></c>"#, reference, v)),
            }
        }
        xml.push_str("</row>");
    }

    xml.push_str("</sheetData></worksheet>");
    xml
}

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
</Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#;

const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets>
</workbook>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#;

// xf 0 is General, xf 1 is the built-in "m/d/yy h:mm" date format
const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts>
<fills count="1"><fill><patternFill patternType="none"/></fill></fills>
<borders count="1"><border/></borders>
<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
<cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="22" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/></cellXfs>
</styleSheet>"#;

/// Write a single-sheet workbook to `path`; the first row is the header
pub fn write_xlsx(path: &Path, rows: &[Vec<Cell>]) -> Result<()> {
    let mut zip = ZipWriter::new(File::create(path)?);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let parts = [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", ROOT_RELS.to_string()),
        ("xl/workbook.xml", WORKBOOK.to_string()),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.to_string()),
        ("xl/styles.xml", STYLES.to_string()),
        ("xl/worksheets/sheet1.xml", sheet_xml(rows)),
    ];
    for (name, body) in parts {
        zip.start_file(name, options)?;
        zip.write_all(body.as_bytes())?;
    }

    zip.finish()?;
    Ok(())
}

/// The `sales.xlsx` fixture: three orders, one without an amount
pub fn sales_rows() -> Vec<Vec<Cell>> {
    vec![
        header(&["Order ID", "Amount", "Date"]),
        vec![num(1001.0), num(10.5), date(2024, 1, 15)],
        vec![num(1002.0), Cell::Empty, date(2024, 2, 1)],
        vec![num(1003.0), num(20.25), date(2024, 3, 10)],
    ]
}
