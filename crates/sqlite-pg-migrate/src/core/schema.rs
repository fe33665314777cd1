//! Schema metadata for migrated tables.
//!
//! A [`TableSpec`] describes the target table (columns, types, defaults,
//! foreign keys) together with where each target column's value comes
//! from in the source row.

use serde::{Deserialize, Serialize};

/// Semantic column type, independent of either database's spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// 32-bit integer.
    Integer,
    /// Double precision float.
    Float,
    /// Character data, bounded when `max_length` is set.
    Text { max_length: Option<u32> },
    /// Boolean.
    Boolean,
    /// Calendar date.
    Date,
    /// Timestamp without time zone.
    Timestamp,
}

impl ColumnType {
    /// Unbounded text.
    pub const TEXT: ColumnType = ColumnType::Text { max_length: None };

    /// Bounded text.
    pub const fn varchar(max_length: u32) -> Self {
        ColumnType::Text {
            max_length: Some(max_length),
        }
    }
}

/// Column default emitted in target DDL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultValue {
    Bool(bool),
    Integer(i64),
    Text(String),
    CurrentTimestamp,
}

/// Where a target column's value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnSource {
    /// Copy the value of the named source column.
    Source(String),

    /// Boolean derived from a source text column: true only when the value
    /// equals `sentinel` exactly. Null and every other value map to false.
    EqualsSentinel { source: String, sentinel: String },

    /// The migration run timestamp. Insert-only columns keep their first
    /// value when a row is re-migrated; refreshed columns are overwritten.
    RunTimestamp { refresh_on_update: bool },
}

impl ColumnSource {
    /// Name of the source column this value is read from, if any.
    pub fn source_column(&self) -> Option<&str> {
        match self {
            ColumnSource::Source(name) => Some(name),
            ColumnSource::EqualsSentinel { source, .. } => Some(source),
            ColumnSource::RunTimestamp { .. } => None,
        }
    }
}

/// Target column definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name in the target table.
    pub name: String,

    /// Semantic type.
    pub column_type: ColumnType,

    /// Whether the column allows NULL.
    pub is_nullable: bool,

    /// Default value, if any.
    pub default: Option<DefaultValue>,

    /// Whether the column is the auto-increment primary key.
    pub is_identity: bool,

    /// Value origin.
    pub source: ColumnSource,
}

impl ColumnSpec {
    /// Nullable column copied from the source column of the same name.
    pub fn new(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            column_type,
            is_nullable: true,
            default: None,
            is_identity: false,
            source: ColumnSource::Source(name.to_string()),
        }
    }

    /// Serial primary key column copied from the source column of the same name.
    pub fn identity(name: &str) -> Self {
        Self {
            is_nullable: false,
            is_identity: true,
            ..Self::new(name, ColumnType::Integer)
        }
    }

    /// Audit timestamp column populated with the run timestamp.
    pub fn run_timestamp(name: &str, refresh_on_update: bool) -> Self {
        Self {
            is_nullable: false,
            default: Some(DefaultValue::CurrentTimestamp),
            source: ColumnSource::RunTimestamp { refresh_on_update },
            ..Self::new(name, ColumnType::Timestamp)
        }
    }

    pub fn not_null(mut self) -> Self {
        self.is_nullable = false;
        self
    }

    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Read the value from a differently named source column.
    pub fn from_source(mut self, source_column: &str) -> Self {
        self.source = ColumnSource::Source(source_column.to_string());
        self
    }

    pub fn derived(mut self, source: ColumnSource) -> Self {
        self.source = source;
        self
    }

    /// Whether an upsert conflict overwrites this column.
    pub fn updates_on_conflict(&self) -> bool {
        if self.is_identity {
            return false;
        }
        !matches!(
            self.source,
            ColumnSource::RunTimestamp {
                refresh_on_update: false
            }
        )
    }
}

/// Foreign key reference from one column to another table's column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    /// Referencing column name.
    pub column: String,

    /// Referenced table name.
    pub ref_table: String,

    /// Referenced column name.
    pub ref_column: String,
}

impl ForeignKeyRef {
    pub fn new(column: &str, ref_table: &str, ref_column: &str) -> Self {
        Self {
            column: column.to_string(),
            ref_table: ref_table.to_string(),
            ref_column: ref_column.to_string(),
        }
    }
}

/// Migrated table definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSpec {
    /// Table name (same in source and target).
    pub name: String,

    /// Ordered column definitions.
    pub columns: Vec<ColumnSpec>,

    /// Foreign key constraints.
    pub foreign_keys: Vec<ForeignKeyRef>,
}

impl TableSpec {
    pub fn new(name: &str, columns: Vec<ColumnSpec>, foreign_keys: Vec<ForeignKeyRef>) -> Self {
        Self {
            name: name.to_string(),
            columns,
            foreign_keys,
        }
    }

    /// The primary key column.
    pub fn primary_key(&self) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.is_identity)
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Target column names, in declaration order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Names of the tables this table references.
    pub fn referenced_tables(&self) -> impl Iterator<Item = &str> {
        self.foreign_keys.iter().map(|fk| fk.ref_table.as_str())
    }
}
