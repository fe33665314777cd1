//! Store interfaces used by the migration engine.
//!
//! - [`SourceStore`]: Read-only access to the SQLite source
//! - [`TargetStore`]: Schema, row and sequence operations on the PostgreSQL target
//!
//! The engine components only ever see these traits, so they can be driven
//! by the real drivers in [`crate::source`] and [`crate::target`] or by
//! in-memory fakes in tests.

use async_trait::async_trait;

use crate::error::Result;

use super::schema::TableSpec;
use super::value::SqlValue;

/// One source row: raw values in source column order.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    pub values: Vec<SqlValue>,
}

impl SourceRow {
    pub fn new(values: Vec<SqlValue>) -> Self {
        Self { values }
    }

    /// Value at a source column position. Missing positions read as NULL.
    pub fn get(&self, idx: usize) -> &SqlValue {
        static NULL: SqlValue = SqlValue::Null;
        self.values.get(idx).unwrap_or(&NULL)
    }
}

/// Every row of one source table together with its column names.
#[derive(Debug, Clone, Default)]
pub struct SourceRows {
    /// Source column names, in the order values appear in each row.
    pub columns: Vec<String>,

    /// Rows in the source's native order.
    pub rows: Vec<SourceRow>,
}

impl SourceRows {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A fully populated row ready for loading: target column name -> value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetRow {
    values: Vec<(String, SqlValue)>,
}

impl TargetRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    /// Set a column value, appending the column if it is new.
    pub fn set(&mut self, column: impl Into<String>, value: SqlValue) {
        let column = column.into();
        match self.values.iter_mut().find(|(c, _)| *c == column) {
            Some((_, v)) => *v = value,
            None => self.values.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.values
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }

    /// Column names in insertion order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(c, _)| c.as_str())
    }

    /// Column/value pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.values.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Read data from the source database.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// List the column names of a table, in declaration order.
    ///
    /// Fails with `SourceUnavailable` if the table does not exist.
    async fn list_columns(&self, table: &str) -> Result<Vec<String>>;

    /// Fetch every row of a table in native order, with its column names.
    ///
    /// Fails with `SourceUnavailable` if the table does not exist.
    async fn fetch_rows(&self, table: &str) -> Result<SourceRows>;

    /// Count the rows of a table.
    async fn row_count(&self, table: &str) -> Result<i64>;

    /// Check the connection is usable.
    async fn test_connection(&self) -> Result<()>;

    /// Get the database type identifier (e.g., "sqlite").
    fn db_type(&self) -> &str;

    /// Release the connection.
    async fn close(&self);
}

/// Write schema, rows and sequences to the target database.
///
/// All operations run on one connection held for the whole run, so
/// `begin`/`commit`/`rollback` bracket the calls made between them.
#[async_trait]
pub trait TargetStore: Send + Sync {
    // ===== Schema Operations =====

    /// Check if a table exists in the target schema.
    async fn table_exists(&self, table: &str) -> Result<bool>;

    /// Create a table from its spec and commit the DDL immediately.
    ///
    /// Fails with `SchemaCreationFailed`.
    async fn create_table(&self, table: &TableSpec) -> Result<()>;

    // ===== Transaction Control =====

    /// Open a transaction.
    async fn begin(&self) -> Result<()>;

    /// Commit the open transaction.
    async fn commit(&self) -> Result<()>;

    /// Roll back the open transaction, if any.
    async fn rollback(&self) -> Result<()>;

    // ===== Data Operations =====

    /// Insert a row, or overwrite the updatable columns of the row with the same id.
    ///
    /// Fails with `LoadRejected`. Returns the number of rows written.
    async fn upsert_row(&self, table: &TableSpec, row: &TargetRow) -> Result<u64>;

    // ===== Sequence Operations =====

    /// Highest value of the id column, or `None` for an empty table.
    async fn max_id(&self, table: &TableSpec) -> Result<Option<i64>>;

    /// Make the id sequence hand out `next_value` on its next call.
    ///
    /// Returns false when the id column owns no sequence.
    async fn reset_sequence(&self, table: &TableSpec, next_value: i64) -> Result<bool>;

    // ===== Utility Operations =====

    /// Get the row count for a table.
    async fn row_count(&self, table: &str) -> Result<i64>;

    /// Check the connection is usable.
    async fn test_connection(&self) -> Result<()>;

    /// Get the database type identifier (e.g., "postgres").
    fn db_type(&self) -> &str;

    /// Release the connection.
    async fn close(&self);
}
