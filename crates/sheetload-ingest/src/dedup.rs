//! Content-addressed row deduplication
//!
//! Each row is reduced to a canonical JSON object (keys sorted, nulls
//! explicit) and hashed with SHA-256. The hash lands in the table's unique
//! `_row_hash` column, so inserting the same row twice is a no-op.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use sheetload_common::checksum::sha256_hex;

use crate::dataset::{CellValue, Dataset};
use crate::error::IngestError;
use crate::schema::TableSchema;
use crate::store::Store;

/// A row plus its content hash, ready to bind
#[derive(Debug, Clone)]
pub struct HashedRow {
    pub values: Vec<CellValue>,
    pub hash: String,
}

/// Counts reported by one insert pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InsertSummary {
    pub attempted: usize,
    pub inserted: u64,
}

impl InsertSummary {
    pub fn skipped(&self) -> u64 {
        (self.attempted as u64).saturating_sub(self.inserted)
    }
}

fn json_value(value: &CellValue) -> Value {
    match value {
        CellValue::Null => Value::Null,
        CellValue::Int(v) => Value::from(*v),
        // NaN and infinities have no JSON form and become null
        CellValue::Float(v) => Value::from(*v),
        CellValue::Bool(v) => Value::Bool(*v),
        CellValue::Timestamp(_) | CellValue::Text(_) => {
            value.to_text().map(Value::String).unwrap_or(Value::Null)
        },
    }
}

/// Canonical serialization of one row: a JSON object with sorted keys
pub fn canonical_row<'a, I>(columns: I, values: &[CellValue]) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let object: BTreeMap<&str, Value> = columns
        .into_iter()
        .zip(values.iter().map(json_value))
        .collect();

    // A BTreeMap of plain JSON values cannot fail to serialize
    serde_json::to_string(&object).unwrap_or_default()
}

/// SHA-256 of the canonical serialization, lower-case hex
pub fn row_hash<'a, I>(columns: I, values: &[CellValue]) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    sha256_hex(&canonical_row(columns, values))
}

/// Hash every row of a prepared dataset
pub fn hash_rows(dataset: &Dataset) -> Vec<HashedRow> {
    dataset
        .rows
        .iter()
        .map(|values| HashedRow {
            hash: row_hash(dataset.column_names(), values),
            values: values.clone(),
        })
        .collect()
}

/// Insert every row of `dataset` into its table, skipping rows already present
///
/// All inserts share one transaction; any failure rolls the whole file back.
pub async fn insert_dataset(
    store: &Store,
    schema: &TableSchema,
    dataset: &Dataset,
) -> Result<InsertSummary, IngestError> {
    let rows = hash_rows(dataset);
    let inserted = store.insert_rows(schema, &rows).await?;

    Ok(InsertSummary { attempted: rows.len(), inserted })
}
