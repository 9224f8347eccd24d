//! In-memory tabular data decoded from one spreadsheet

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::normalize::unique_identifiers;
use crate::schema::infer_column_type;

/// Format every timestamp cell is stored and hashed in
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single decoded cell
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Timestamp(NaiveDateTime),
    Text(String),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Integer view of a numeric cell without a fractional part
    pub fn as_integral(&self) -> Option<i64> {
        match *self {
            CellValue::Int(v) => Some(v),
            CellValue::Float(v)
                if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 =>
            {
                Some(v as i64)
            },
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match *self {
            CellValue::Int(v) => Some(v as f64),
            CellValue::Float(v) => Some(v),
            _ => None,
        }
    }

    /// Text rendering used when a column falls back to `TEXT`
    pub fn to_text(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            CellValue::Int(v) => Some(v.to_string()),
            CellValue::Float(_) => match self.as_integral() {
                Some(v) => Some(v.to_string()),
                None => self.as_float().map(|v| v.to_string()),
            },
            CellValue::Bool(v) => Some(v.to_string()),
            CellValue::Timestamp(ts) => Some(ts.format(TIMESTAMP_FORMAT).to_string()),
            CellValue::Text(s) => Some(s.clone()),
        }
    }
}

/// Semantic type of a column, after inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Float,
    Timestamp,
    Boolean,
    Text,
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Boolean => "boolean",
            ColumnType::Text => "text",
        };
        f.write_str(name)
    }
}

/// Rows exactly as they came out of the worksheet
#[derive(Debug, Clone, Default)]
pub struct RawSheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl RawSheet {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A prepared column of a [`Dataset`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    /// Canonical identifier
    pub name: String,
    /// Header text as found in the file
    pub source_name: String,
    pub kind: ColumnType,
}

/// Normalized, typed rows ready for insertion
///
/// Every row holds exactly one value per column, already coerced to the
/// column's type: integers in integer columns, floats in float columns,
/// `Timestamp` and `Text` columns hold text, booleans stay booleans.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<CellValue>>,
    /// Source headers whose columns were entirely empty
    pub dropped_columns: Vec<String>,
}

impl Dataset {
    /// Normalize headers, infer types, drop all-null columns, coerce values
    pub fn prepare(raw: RawSheet) -> Self {
        let RawSheet { headers, rows } = raw;
        let names = unique_identifiers(&headers);

        let mut columns = Vec::new();
        let mut keep = Vec::new();
        let mut dropped_columns = Vec::new();

        for (idx, (source_name, name)) in headers.into_iter().zip(names).enumerate() {
            let values: Vec<&CellValue> = rows
                .iter()
                .map(|row| row.get(idx).unwrap_or(&CellValue::Null))
                .collect();

            if values.iter().all(|v| v.is_null()) {
                dropped_columns.push(source_name);
                continue;
            }

            let kind = infer_column_type(values.iter().copied());
            columns.push(Column { name, source_name, kind });
            keep.push(idx);
        }

        let rows = rows
            .iter()
            .map(|row| {
                keep.iter()
                    .zip(&columns)
                    .map(|(&idx, column)| {
                        coerce(row.get(idx).unwrap_or(&CellValue::Null), column.kind)
                    })
                    .collect()
            })
            .collect();

        Self { columns, rows, dropped_columns }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// Convert a cell to the representation its column stores
fn coerce(value: &CellValue, kind: ColumnType) -> CellValue {
    if value.is_null() {
        return CellValue::Null;
    }

    let coerced = match kind {
        ColumnType::Integer => value.as_integral().map(CellValue::Int),
        ColumnType::Float => value.as_float().map(CellValue::Float),
        ColumnType::Timestamp => match value {
            CellValue::Timestamp(ts) => Some(CellValue::Text(ts.format(TIMESTAMP_FORMAT).to_string())),
            _ => None,
        },
        ColumnType::Boolean => match value {
            CellValue::Bool(b) => Some(CellValue::Bool(*b)),
            _ => None,
        },
        ColumnType::Text => None,
    };

    coerced.unwrap_or_else(|| value.to_text().map(CellValue::Text).unwrap_or(CellValue::Null))
}
