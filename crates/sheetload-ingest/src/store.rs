//! Relational store handle for both dialects
//!
//! [`Store`] is created once at startup and cloned into every worker; the
//! underlying `sqlx` pools are reference counted and safe to share.

use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions};
use sqlx::query::Query;
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
};
use serde::Serialize;
use sqlx::{Postgres, Sqlite};
use thiserror::Error;
use tracing::{debug, info};

use crate::dataset::{CellValue, ColumnType};
use crate::dedup::HashedRow;
use crate::schema::{quote_ident, Dialect, TableSchema};

/// How long a SQLite writer waits for a concurrent writer to finish
const SQLITE_BUSY_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Unsupported database URL '{0}'. Use sqlite://... or postgres://...")]
    UnsupportedUrl(String),

    #[error("Row has {actual} value(s) but table '{table}' expects {expected}")]
    Arity { table: String, expected: usize, actual: usize },
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Serialize)]
pub struct StoreConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

impl StoreConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: crate::config::DEFAULT_DB_MAX_CONNECTIONS,
            connect_timeout_secs: crate::config::DEFAULT_DB_CONNECT_TIMEOUT_SECS,
        }
    }

    pub fn dialect(&self) -> StoreResult<Dialect> {
        Dialect::from_url(&self.url).ok_or_else(|| StoreError::UnsupportedUrl(self.url.clone()))
    }
}

/// Shared store handle
#[derive(Debug, Clone)]
pub enum Store {
    Sqlite(SqlitePool),
    Postgres(PgPool),
}

impl Store {
    /// Open a pool for the dialect named by the URL scheme
    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        let acquire_timeout = Duration::from_secs(config.connect_timeout_secs);

        let store = match config.dialect()? {
            Dialect::Sqlite => {
                let options = SqliteConnectOptions::from_str(&config.url)?
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Wal)
                    .busy_timeout(Duration::from_secs(SQLITE_BUSY_TIMEOUT_SECS));
                let pool = SqlitePoolOptions::new()
                    .max_connections(config.max_connections)
                    .acquire_timeout(acquire_timeout)
                    .connect_with(options)
                    .await?;
                Store::Sqlite(pool)
            },
            Dialect::Postgres => {
                let pool = PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .acquire_timeout(acquire_timeout)
                    .connect(&config.url)
                    .await?;
                Store::Postgres(pool)
            },
        };

        info!(
            dialect = %store.dialect(),
            max_connections = config.max_connections,
            "Database connection pool created"
        );

        Ok(store)
    }

    pub fn dialect(&self) -> Dialect {
        match self {
            Store::Sqlite(_) => Dialect::Sqlite,
            Store::Postgres(_) => Dialect::Postgres,
        }
    }

    /// Column names of an existing table, `None` when the table is absent
    pub async fn table_columns(&self, table: &str) -> StoreResult<Option<Vec<String>>> {
        let columns: Vec<String> = match self {
            Store::Sqlite(pool) => {
                sqlx::query_scalar("SELECT name FROM pragma_table_info(?1) ORDER BY cid")
                    .bind(table)
                    .fetch_all(pool)
                    .await?
            },
            Store::Postgres(pool) => {
                sqlx::query_scalar(
                    r#"
                    SELECT column_name::text
                    FROM information_schema.columns
                    WHERE table_schema = current_schema() AND table_name = $1
                    ORDER BY ordinal_position
                    "#,
                )
                .bind(table)
                .fetch_all(pool)
                .await?
            },
        };

        Ok(if columns.is_empty() { None } else { Some(columns) })
    }

    /// Run the idempotent `CREATE TABLE IF NOT EXISTS` for `schema`
    pub async fn ensure_table(&self, schema: &TableSchema) -> StoreResult<()> {
        let sql = schema.create_table_sql(self.dialect());
        debug!(table = %schema.name, %sql, "Ensuring table");

        let result = match self {
            Store::Sqlite(pool) => sqlx::query(&sql).execute(pool).await.map(|_| ()),
            Store::Postgres(pool) => sqlx::query(&sql).execute(pool).await.map(|_| ()),
        };

        if let Err(err) = result {
            // Two sessions racing on IF NOT EXISTS can both pass the check in
            // PostgreSQL; the loser fails on the catalog unique index.
            if self.table_columns(&schema.name).await?.is_some() {
                debug!(table = %schema.name, error = %err, "Table appeared concurrently");
                return Ok(());
            }
            return Err(err.into());
        }

        Ok(())
    }

    /// Insert rows inside one transaction, returning how many were new
    pub async fn insert_rows(&self, schema: &TableSchema, rows: &[HashedRow]) -> StoreResult<u64> {
        for row in rows {
            if row.values.len() != schema.columns.len() {
                return Err(StoreError::Arity {
                    table: schema.name.clone(),
                    expected: schema.columns.len(),
                    actual: row.values.len(),
                });
            }
        }

        let sql = schema.insert_sql(self.dialect());
        let mut inserted = 0u64;

        match self {
            Store::Sqlite(pool) => {
                let mut tx = pool.begin().await?;
                for row in rows {
                    let mut query = sqlx::query(&sql);
                    for (value, (_, kind)) in row.values.iter().zip(&schema.columns) {
                        query = bind_sqlite(query, value, *kind);
                    }
                    let done = query.bind(row.hash.clone()).execute(&mut *tx).await?;
                    inserted += done.rows_affected();
                }
                tx.commit().await?;
            },
            Store::Postgres(pool) => {
                let mut tx = pool.begin().await?;
                for row in rows {
                    let mut query = sqlx::query(&sql);
                    for (value, (_, kind)) in row.values.iter().zip(&schema.columns) {
                        query = bind_postgres(query, value, *kind);
                    }
                    let done = query.bind(row.hash.clone()).execute(&mut *tx).await?;
                    inserted += done.rows_affected();
                }
                tx.commit().await?;
            },
        }

        Ok(inserted)
    }

    /// Number of rows currently stored in `table`
    pub async fn row_count(&self, table: &str) -> StoreResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        let count = match self {
            Store::Sqlite(pool) => sqlx::query_scalar(&sql).fetch_one(pool).await?,
            Store::Postgres(pool) => sqlx::query_scalar(&sql).fetch_one(pool).await?,
        };
        Ok(count)
    }

    pub async fn health_check(&self) -> StoreResult<()> {
        match self {
            Store::Sqlite(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ())?,
            Store::Postgres(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ())?,
        }
        Ok(())
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        match self {
            Store::Sqlite(pool) => pool.close().await,
            Store::Postgres(pool) => pool.close().await,
        }
    }
}

/// Parameter shape a cell is bound with
#[derive(Debug, Clone, PartialEq)]
enum Param {
    Int(Option<i64>),
    Float(Option<f64>),
    Text(Option<String>),
}

/// Typed parameter for `value` in a column of `kind`
///
/// Nulls keep the column's parameter type so PostgreSQL does not reject an
/// untyped text null for a numeric column.
fn param(value: &CellValue, kind: ColumnType) -> Param {
    match kind {
        ColumnType::Integer => Param::Int(value.as_integral()),
        ColumnType::Float => Param::Float(value.as_float()),
        ColumnType::Boolean => Param::Int(match value {
            CellValue::Bool(b) => Some(i64::from(*b)),
            other => other.as_integral(),
        }),
        ColumnType::Timestamp | ColumnType::Text => Param::Text(value.to_text()),
    }
}

fn bind_sqlite<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &CellValue,
    kind: ColumnType,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match param(value, kind) {
        Param::Int(v) => query.bind(v),
        Param::Float(v) => query.bind(v),
        Param::Text(v) => query.bind(v),
    }
}

fn bind_postgres<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &CellValue,
    kind: ColumnType,
) -> Query<'q, Postgres, PgArguments> {
    match param(value, kind) {
        Param::Int(v) => query.bind(v),
        Param::Float(v) => query.bind(v),
        Param::Text(v) => query.bind(v),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_params_keep_column_type_for_nulls() {
        assert_eq!(param(&CellValue::Null, ColumnType::Integer), Param::Int(None));
        assert_eq!(param(&CellValue::Null, ColumnType::Float), Param::Float(None));
        assert_eq!(param(&CellValue::Null, ColumnType::Timestamp), Param::Text(None));
    }

    #[test]
    fn test_booleans_bind_as_integers() {
        assert_eq!(param(&CellValue::Bool(true), ColumnType::Boolean), Param::Int(Some(1)));
        assert_eq!(param(&CellValue::Bool(false), ColumnType::Boolean), Param::Int(Some(0)));
    }

    #[test]
    fn test_text_params() {
        assert_eq!(
            param(&CellValue::Text("2024-01-01 00:00:00".into()), ColumnType::Timestamp),
            Param::Text(Some("2024-01-01 00:00:00".into()))
        );
        assert_eq!(param(&CellValue::Float(2.0), ColumnType::Text), Param::Text(Some("2".into())));
    }

    #[test]
    fn test_unsupported_url() {
        let config = StoreConfig::new("mysql://localhost/db");
        assert!(matches!(config.dialect(), Err(StoreError::UnsupportedUrl(_))));
    }

    #[tokio::test]
    async fn test_sqlite_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("store.db").display());
        let store = Store::connect(&StoreConfig::new(url)).await.unwrap();
        store.health_check().await.unwrap();

        let schema = TableSchema {
            name: "people".into(),
            columns: vec![("name".into(), ColumnType::Text), ("age".into(), ColumnType::Integer)],
        };
        assert!(store.table_columns("people").await.unwrap().is_none());

        store.ensure_table(&schema).await.unwrap();
        store.ensure_table(&schema).await.unwrap();

        let columns = store.table_columns("people").await.unwrap().unwrap();
        assert_eq!(columns, vec!["id", "name", "age", "_row_hash"]);

        let rows = vec![
            HashedRow { values: vec![CellValue::Text("Ana".into()), CellValue::Int(30)], hash: "h1".into() },
            HashedRow { values: vec![CellValue::Text("Bo".into()), CellValue::Null], hash: "h2".into() },
            HashedRow { values: vec![CellValue::Text("Ana".into()), CellValue::Int(30)], hash: "h1".into() },
        ];
        assert_eq!(store.insert_rows(&schema, &rows).await.unwrap(), 2);
        assert_eq!(store.insert_rows(&schema, &rows).await.unwrap(), 0);
        assert_eq!(store.row_count("people").await.unwrap(), 2);

        store.close().await;
    }

    #[tokio::test]
    async fn test_failed_insert_rolls_back_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("store.db").display());
        let store = Store::connect(&StoreConfig::new(url)).await.unwrap();

        let schema = TableSchema {
            name: "t".into(),
            columns: vec![("a".into(), ColumnType::Integer)],
        };
        store.ensure_table(&schema).await.unwrap();

        let wider = TableSchema {
            name: "t".into(),
            columns: vec![("a".into(), ColumnType::Integer), ("b".into(), ColumnType::Text)],
        };
        let rows = vec![HashedRow {
            values: vec![CellValue::Int(1), CellValue::Text("x".into())],
            hash: "h".into(),
        }];
        assert!(store.insert_rows(&wider, &rows).await.is_err());
        assert_eq!(store.row_count("t").await.unwrap(), 0);

        let short = vec![HashedRow { values: vec![], hash: "h".into() }];
        assert!(matches!(
            store.insert_rows(&schema, &short).await,
            Err(StoreError::Arity { expected: 1, actual: 0, .. })
        ));
    }
}
