//! Spreadsheet decoding
//!
//! Reads the first worksheet of an `.xlsx`/`.xls` workbook with `calamine`.
//! Row 1 is the header; fully blank rows are skipped and short rows are
//! padded with nulls.

use std::path::Path;

use calamine::{open_workbook_auto, Data, DataType, Reader};

use crate::dataset::{CellValue, RawSheet};
use crate::error::{IngestError, Result};

/// File extensions the coordinator picks up (compared case-insensitively)
pub const SPREADSHEET_EXTENSIONS: [&str; 2] = ["xlsx", "xls"];

/// Whether a file name carries a spreadsheet extension
pub fn is_spreadsheet(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    SPREADSHEET_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(&format!(".{}", ext)))
}

/// Decode the first worksheet of the workbook at `path`
///
/// Blocking; call it from a blocking-capable thread.
pub fn read_spreadsheet(path: &Path) -> Result<RawSheet> {
    if !path.is_file() {
        return Err(IngestError::NotFound(path.display().to_string()));
    }

    let mut workbook = open_workbook_auto(path)?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range?,
        None => return Err(IngestError::EmptyInput),
    };

    let mut rows = range.rows();
    let header_cells = match rows.next() {
        Some(cells) => cells,
        None => return Ok(RawSheet::default()),
    };

    let headers: Vec<String> = header_cells
        .iter()
        .enumerate()
        .map(|(idx, cell)| header_text(idx, cell))
        .collect();

    let width = headers.len();
    let rows = rows
        .map(|cells| {
            let mut values: Vec<CellValue> = cells.iter().take(width).map(cell_value).collect();
            values.resize(width, CellValue::Null);
            values
        })
        .filter(|values| values.iter().any(|v| !v.is_null()))
        .collect();

    Ok(RawSheet { headers, rows })
}

fn header_text(idx: usize, cell: &Data) -> String {
    match cell_value(cell).to_text() {
        Some(text) if !text.trim().is_empty() => text,
        _ => format!("Unnamed: {}", idx),
    }
}

/// Map a calamine cell onto the dataset's scalar model
fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Null,
        Data::Int(v) => CellValue::Int(*v),
        Data::Float(v) => CellValue::Float(*v),
        Data::Bool(v) => CellValue::Bool(*v),
        Data::String(s) if s.trim().is_empty() => CellValue::Null,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::DateTime(_) | Data::DateTimeIso(_) => match cell.as_datetime() {
            Some(ts) => CellValue::Timestamp(ts),
            None => CellValue::Text(cell.to_string()),
        },
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(e.to_string()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_is_spreadsheet() {
        assert!(is_spreadsheet("sales.xlsx"));
        assert!(is_spreadsheet("LEGACY.XLS"));
        assert!(is_spreadsheet("mixed.XlSx"));
        assert!(!is_spreadsheet("notes.csv"));
        assert!(!is_spreadsheet("xlsx"));
        assert!(!is_spreadsheet("archive.xlsx.bak"));
    }

    #[test]
    fn test_cell_values() {
        assert_eq!(cell_value(&Data::Empty), CellValue::Null);
        assert_eq!(cell_value(&Data::Float(1.5)), CellValue::Float(1.5));
        assert_eq!(cell_value(&Data::String("  ".into())), CellValue::Null);
        assert_eq!(cell_value(&Data::String("abc".into())), CellValue::Text("abc".into()));
        assert_eq!(cell_value(&Data::Bool(true)), CellValue::Bool(true));
    }

    #[test]
    fn test_iso_datetime_cells() {
        let value = cell_value(&Data::DateTimeIso("2024-03-05T10:30:00".into()));
        match value {
            CellValue::Timestamp(ts) => {
                assert_eq!(ts.format("%Y-%m-%d %H:%M:%S").to_string(), "2024-03-05 10:30:00")
            },
            other => panic!("expected timestamp, got {:?}", other),
        }
    }

    #[test]
    fn test_blank_headers_are_named_by_position() {
        assert_eq!(header_text(3, &Data::Empty), "Unnamed: 3");
        assert_eq!(header_text(0, &Data::Float(2024.0)), "2024");
        assert_eq!(header_text(1, &Data::String("Amount".into())), "Amount");
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = read_spreadsheet(Path::new("/definitely/not/here.xlsx")).unwrap_err();
        assert!(matches!(err, IngestError::NotFound(_)));
    }

    #[test]
    fn test_garbage_bytes_fail_to_decode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        std::fs::write(&path, b"this is not a zip archive").unwrap();

        let err = read_spreadsheet(&path).unwrap_err();
        assert!(matches!(err, IngestError::Decode(_)), "got {:?}", err);
    }
}
