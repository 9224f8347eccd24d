//! Column type inference and table DDL for both SQL dialects

use serde::{Deserialize, Serialize};

use crate::dataset::{CellValue, ColumnType, Dataset};
use crate::normalize::SURROGATE_KEY;

/// Name of the unique content-hash column
pub const ROW_HASH_COLUMN: &str = "_row_hash";

/// SQL dialect of the configured store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// File-embedded store
    Sqlite,
    /// Networked relational server
    Postgres,
}

impl Dialect {
    /// Dialect from a connection URL scheme
    pub fn from_url(url: &str) -> Option<Self> {
        let scheme = url.split(':').next()?.to_ascii_lowercase();
        match scheme.as_str() {
            "sqlite" => Some(Dialect::Sqlite),
            "postgres" | "postgresql" => Some(Dialect::Postgres),
            _ => None,
        }
    }

    pub fn sql_type(self, kind: ColumnType) -> &'static str {
        match (self, kind) {
            (Dialect::Sqlite, ColumnType::Integer) => "INTEGER",
            (Dialect::Postgres, ColumnType::Integer) => "BIGINT",
            (Dialect::Sqlite, ColumnType::Float) => "REAL",
            (Dialect::Postgres, ColumnType::Float) => "DOUBLE PRECISION",
            (_, ColumnType::Timestamp) => "TIMESTAMP",
            (_, ColumnType::Boolean) => "INTEGER",
            (_, ColumnType::Text) => "TEXT",
        }
    }

    fn surrogate_key(self) -> &'static str {
        match self {
            Dialect::Sqlite => "INTEGER PRIMARY KEY AUTOINCREMENT",
            Dialect::Postgres => "BIGSERIAL PRIMARY KEY",
        }
    }

    /// Bind placeholder for the 1-based parameter `n`, cast where the
    /// dialect will not convert a text parameter implicitly
    pub fn placeholder(self, n: usize, kind: ColumnType) -> String {
        match (self, kind) {
            (Dialect::Sqlite, _) => format!("?{}", n),
            (Dialect::Postgres, ColumnType::Timestamp) => format!("CAST(${} AS TIMESTAMP)", n),
            (Dialect::Postgres, _) => format!("${}", n),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::Sqlite => f.write_str("sqlite"),
            Dialect::Postgres => f.write_str("postgres"),
        }
    }
}

/// Double-quote an identifier
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Infer the type of a column from all of its values
///
/// The first rule every non-null value satisfies wins: integral numbers,
/// then any numbers, then datetimes, then booleans. Anything else, including
/// a column with no values at all, is text. An integral column with any
/// null cell is a float column.
pub fn infer_column_type<'a, I>(values: I) -> ColumnType
where
    I: IntoIterator<Item = &'a CellValue>,
{
    let mut seen = false;
    let mut gaps = false;
    let mut integral = true;
    let mut numeric = true;
    let mut timestamp = true;
    let mut boolean = true;

    for value in values {
        if value.is_null() {
            gaps = true;
            continue;
        }
        seen = true;
        integral &= value.as_integral().is_some();
        numeric &= value.as_float().is_some();
        timestamp &= matches!(value, CellValue::Timestamp(_));
        boolean &= matches!(value, CellValue::Bool(_));
    }

    if !seen {
        ColumnType::Text
    } else if integral && !gaps {
        ColumnType::Integer
    } else if numeric {
        ColumnType::Float
    } else if timestamp {
        ColumnType::Timestamp
    } else if boolean {
        ColumnType::Boolean
    } else {
        ColumnType::Text
    }
}

/// Layout of a target table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    pub name: String,
    /// Data columns in source order, without the surrogate key and hash
    pub columns: Vec<(String, ColumnType)>,
}

impl TableSchema {
    pub fn from_dataset(name: impl Into<String>, dataset: &Dataset) -> Self {
        Self {
            name: name.into(),
            columns: dataset.columns.iter().map(|c| (c.name.clone(), c.kind)).collect(),
        }
    }

    /// Column name to SQL type, in column order
    pub fn sql_types(&self, dialect: Dialect) -> Vec<(&str, &'static str)> {
        self.columns
            .iter()
            .map(|(name, kind)| (name.as_str(), dialect.sql_type(*kind)))
            .collect()
    }

    /// Idempotent `CREATE TABLE IF NOT EXISTS` statement
    pub fn create_table_sql(&self, dialect: Dialect) -> String {
        let mut defs = Vec::with_capacity(self.columns.len() + 2);
        defs.push(format!("{} {}", SURROGATE_KEY, dialect.surrogate_key()));
        for (name, sql_type) in self.sql_types(dialect) {
            defs.push(format!("{} {}", quote_ident(name), sql_type));
        }
        defs.push(format!("{} TEXT UNIQUE", quote_ident(ROW_HASH_COLUMN)));

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            quote_ident(&self.name),
            defs.join(",\n    ")
        )
    }

    /// Conflict-tolerant single-row insert; binds every data column then the hash
    pub fn insert_sql(&self, dialect: Dialect) -> String {
        let mut names: Vec<String> = self.columns.iter().map(|(n, _)| quote_ident(n)).collect();
        names.push(quote_ident(ROW_HASH_COLUMN));

        let mut params: Vec<String> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, (_, kind))| dialect.placeholder(i + 1, *kind))
            .collect();
        params.push(dialect.placeholder(self.columns.len() + 1, ColumnType::Text));

        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) DO NOTHING",
            quote_ident(&self.name),
            names.join(", "),
            params.join(", "),
            quote_ident(ROW_HASH_COLUMN)
        )
    }

    /// Data columns this schema has but `existing` does not
    pub fn missing_from<'a>(&'a self, existing: &[String]) -> Vec<&'a str> {
        self.columns
            .iter()
            .map(|(name, _)| name.as_str())
            .filter(|name| !existing.iter().any(|e| e == name))
            .collect()
    }
}
