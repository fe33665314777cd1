//! SQLite source reader.
//!
//! Opens the source file read-only through a single-connection sqlx pool and
//! returns whole tables in rowid order. Cells are decoded by the storage class
//! SQLite reports for each value, not by the declared column type, since
//! SQLite columns may hold mixed classes.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, TypeInfo, ValueRef};
use tracing::{debug, info};

use super::quote_ident;
use crate::config::SourceConfig;
use crate::core::traits::{SourceRow, SourceRows, SourceStore};
use crate::core::value::SqlValue;
use crate::error::{MigrateError, Result};

/// Read-only SQLite source.
pub struct SqliteSource {
    pool: SqlitePool,
    path: PathBuf,
}

impl SqliteSource {
    /// Open the source file named in the configuration.
    pub async fn connect(config: &SourceConfig) -> Result<Self> {
        Self::open(&config.path).await
    }

    /// Open a SQLite file read-only. The file must already exist.
    pub async fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(MigrateError::missing_source(format!(
                "SQLite file not found: {}",
                path.display()
            )));
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true)
            .create_if_missing(false);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| {
                MigrateError::source_unavailable(
                    format!("cannot open SQLite file {}", path.display()),
                    e,
                )
            })?;

        info!("Opened SQLite source: {}", path.display());

        Ok(Self {
            pool,
            path: path.to_path_buf(),
        })
    }

    /// Path of the open source file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn query_failed(table: &str, err: sqlx::Error) -> MigrateError {
        MigrateError::source_unavailable(format!("reading source table '{}' failed", table), err)
    }
}

/// Decode one cell by its storage class.
fn decode_cell(row: &SqliteRow, idx: usize) -> std::result::Result<SqlValue, sqlx::Error> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }

    let value = match raw.type_info().name() {
        "INTEGER" => SqlValue::I64(row.try_get::<i64, _>(idx)?),
        "REAL" => SqlValue::F64(row.try_get::<f64, _>(idx)?),
        "BLOB" => SqlValue::Bytes(row.try_get::<Vec<u8>, _>(idx)?),
        _ => SqlValue::Text(row.try_get::<String, _>(idx)?),
    };
    Ok(value)
}

#[async_trait]
impl SourceStore for SqliteSource {
    async fn list_columns(&self, table: &str) -> Result<Vec<String>> {
        let sql = format!("PRAGMA table_info({})", quote_ident(table));
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Self::query_failed(table, e))?;

        if rows.is_empty() {
            return Err(MigrateError::missing_source(format!(
                "table '{}' does not exist in {}",
                table,
                self.path.display()
            )));
        }

        rows.iter()
            .map(|r| r.try_get::<String, _>("name"))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Self::query_failed(table, e))
    }

    async fn fetch_rows(&self, table: &str) -> Result<SourceRows> {
        let columns = self.list_columns(table).await?;
        let select_list: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
        let sql = format!("SELECT {} FROM {}", select_list.join(", "), quote_ident(table));
        debug!("Source query: {}", sql);

        let fetched = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Self::query_failed(table, e))?;

        let mut rows = Vec::with_capacity(fetched.len());
        for row in &fetched {
            let values = (0..columns.len())
                .map(|i| decode_cell(row, i))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| Self::query_failed(table, e))?;
            rows.push(SourceRow::new(values));
        }

        debug!("Extracted {} rows from source table {}", rows.len(), table);
        Ok(SourceRows { columns, rows })
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        // list_columns distinguishes a missing table from a failed query
        self.list_columns(table).await?;
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Self::query_failed(table, e))
    }

    async fn test_connection(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| MigrateError::source_unavailable("SQLite health check failed", e))?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "sqlite"
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn make_source_file(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("source.sqlite");
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();

        sqlx::query(
            r#"CREATE TABLE communities (
                id INTEGER PRIMARY KEY,
                name TEXT,
                "ad-specialist-name" TEXT,
                spaces INTEGER,
                rating REAL,
                logo BLOB
            )"#,
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            r#"INSERT INTO communities VALUES
                (2, 'Oak Park', 'Dana', 40, 4.5, x'0102'),
                (1, 'Elm Court', NULL, NULL, NULL, NULL)"#,
        )
        .execute(&pool)
        .await
        .unwrap();
        pool.close().await;
        path
    }

    #[tokio::test]
    async fn test_list_columns_keeps_declaration_order() {
        let dir = TempDir::new().unwrap();
        let path = make_source_file(&dir).await;
        let source = SqliteSource::open(&path).await.unwrap();

        let columns = source.list_columns("communities").await.unwrap();
        assert_eq!(
            columns,
            vec!["id", "name", "ad-specialist-name", "spaces", "rating", "logo"]
        );
        source.close().await;
    }

    #[tokio::test]
    async fn test_fetch_rows_decodes_storage_classes() {
        let dir = TempDir::new().unwrap();
        let path = make_source_file(&dir).await;
        let source = SqliteSource::open(&path).await.unwrap();

        let rows = source.fetch_rows("communities").await.unwrap();
        assert_eq!(rows.len(), 2);

        // rowid order, not insertion order
        let first = &rows.rows[0];
        assert_eq!(first.get(0), &SqlValue::I64(1));
        assert_eq!(first.get(1), &SqlValue::Text("Elm Court".into()));
        assert!(first.get(2).is_null());

        let second = &rows.rows[1];
        assert_eq!(second.get(2), &SqlValue::Text("Dana".into()));
        assert_eq!(second.get(3), &SqlValue::I64(40));
        assert_eq!(second.get(4), &SqlValue::F64(4.5));
        assert_eq!(second.get(5), &SqlValue::Bytes(vec![1, 2]));

        assert_eq!(source.row_count("communities").await.unwrap(), 2);
        source.close().await;
    }

    #[tokio::test]
    async fn test_missing_table_is_source_unavailable() {
        let dir = TempDir::new().unwrap();
        let path = make_source_file(&dir).await;
        let source = SqliteSource::open(&path).await.unwrap();

        let err = source.fetch_rows("ad_types").await.unwrap_err();
        assert!(matches!(err, MigrateError::SourceUnavailable { .. }));
        source.close().await;
    }

    #[tokio::test]
    async fn test_missing_file_is_source_unavailable() {
        let dir = TempDir::new().unwrap();
        let result = SqliteSource::open(&dir.path().join("absent.sqlite")).await;
        assert!(matches!(
            result,
            Err(MigrateError::SourceUnavailable { source: None, .. })
        ));
        // opening read-only must not create the file
        assert!(!dir.path().join("absent.sqlite").exists());
    }
}
