//! Source row to target row mapping.
//!
//! Source column names are resolved to positions once per table, against
//! the column list the extractor actually returned. A name that is not
//! there fails the table up front instead of shifting every later value
//! into the wrong column.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::core::schema::{ColumnSource, ColumnSpec, ColumnType, TableSpec};
use crate::core::traits::{SourceRow, TargetRow};
use crate::core::value::SqlValue;
use crate::error::{MigrateError, Result};

#[derive(Debug, Clone, Copy)]
enum Binding<'a> {
    Copy(usize),
    EqualsSentinel { idx: usize, sentinel: &'a str },
    RunTimestamp,
}

/// Maps rows of one source table onto its [`TableSpec`].
#[derive(Debug)]
pub struct ColumnRemapper<'a> {
    table: &'a TableSpec,
    bindings: Vec<(&'a ColumnSpec, Binding<'a>)>,
}

impl<'a> ColumnRemapper<'a> {
    /// Resolve every column's source against `source_columns`.
    ///
    /// Fails with a `Mapping` error naming the first source column that is
    /// not present.
    pub fn resolve(table: &'a TableSpec, source_columns: &[String]) -> Result<Self> {
        let position = |column: &ColumnSpec, name: &str| {
            source_columns.iter().position(|c| c == name).ok_or_else(|| {
                MigrateError::mapping(
                    &table.name,
                    &column.name,
                    format!(
                        "source column '{}' not found (source has: {})",
                        name,
                        source_columns.join(", ")
                    ),
                )
            })
        };

        let mut bindings = Vec::with_capacity(table.columns.len());
        for column in &table.columns {
            let binding = match &column.source {
                ColumnSource::Source(name) => Binding::Copy(position(column, name)?),
                ColumnSource::EqualsSentinel { source, sentinel } => Binding::EqualsSentinel {
                    idx: position(column, source)?,
                    sentinel,
                },
                ColumnSource::RunTimestamp { .. } => Binding::RunTimestamp,
            };
            bindings.push((column, binding));
        }

        Ok(Self { table, bindings })
    }

    pub fn table(&self) -> &TableSpec {
        self.table
    }

    /// Build the target row for one source row.
    ///
    /// `run_timestamp` fills every audit timestamp column.
    pub fn remap(&self, row: &SourceRow, run_timestamp: NaiveDateTime) -> Result<TargetRow> {
        let mut target = TargetRow::with_capacity(self.bindings.len());
        for (column, binding) in &self.bindings {
            let value = match *binding {
                Binding::Copy(idx) => coerce(row.get(idx), &column.column_type).map_err(|m| {
                    MigrateError::mapping(&self.table.name, &column.name, m)
                })?,
                Binding::EqualsSentinel { idx, sentinel } => {
                    SqlValue::Bool(row.get(idx).as_text() == Some(sentinel))
                }
                Binding::RunTimestamp => SqlValue::DateTime(run_timestamp),
            };
            target.set(column.name.as_str(), value);
        }
        Ok(target)
    }
}

/// Convert a raw source value to the representation of `column_type`.
///
/// SQLite stores whatever it was given, so integers may arrive as whole
/// reals or numeric text and dates arrive as text. NULL stays NULL.
pub fn coerce(value: &SqlValue, column_type: &ColumnType) -> std::result::Result<SqlValue, String> {
    if value.is_null() {
        return Ok(SqlValue::Null);
    }

    let coerced = match (column_type, value) {
        (ColumnType::Integer, SqlValue::I64(v)) => Some(SqlValue::I64(*v)),
        (ColumnType::Integer, SqlValue::F64(v)) => whole_number(*v).map(SqlValue::I64),
        (ColumnType::Integer, SqlValue::Text(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(whole_number))
                .map(SqlValue::I64)
        }

        (ColumnType::Float, SqlValue::F64(v)) => Some(SqlValue::F64(*v)),
        (ColumnType::Float, SqlValue::I64(v)) => Some(SqlValue::F64(*v as f64)),
        (ColumnType::Float, SqlValue::Text(s)) => s.trim().parse::<f64>().ok().map(SqlValue::F64),

        (ColumnType::Text { .. }, SqlValue::Text(s)) => Some(SqlValue::Text(s.clone())),
        (ColumnType::Text { .. }, SqlValue::Bytes(b)) => {
            String::from_utf8(b.clone()).ok().map(SqlValue::Text)
        }
        (ColumnType::Text { .. }, SqlValue::Bool(v)) => Some(SqlValue::Text(v.to_string())),
        (ColumnType::Text { .. }, SqlValue::I64(v)) => Some(SqlValue::Text(v.to_string())),
        (ColumnType::Text { .. }, SqlValue::F64(v)) => Some(SqlValue::Text(v.to_string())),
        (ColumnType::Text { .. }, SqlValue::Date(d)) => {
            Some(SqlValue::Text(d.format("%Y-%m-%d").to_string()))
        }
        (ColumnType::Text { .. }, SqlValue::DateTime(d)) => {
            Some(SqlValue::Text(d.format("%Y-%m-%d %H:%M:%S%.f").to_string()))
        }

        (ColumnType::Boolean, SqlValue::Bool(v)) => Some(SqlValue::Bool(*v)),
        (ColumnType::Boolean, SqlValue::I64(0)) => Some(SqlValue::Bool(false)),
        (ColumnType::Boolean, SqlValue::I64(1)) => Some(SqlValue::Bool(true)),
        (ColumnType::Boolean, SqlValue::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" => Some(SqlValue::Bool(true)),
            "0" | "false" => Some(SqlValue::Bool(false)),
            _ => None,
        },

        (ColumnType::Date, SqlValue::Date(d)) => Some(SqlValue::Date(*d)),
        (ColumnType::Date, SqlValue::DateTime(d)) => Some(SqlValue::Date(d.date())),
        (ColumnType::Date, SqlValue::Text(s)) => parse_date(s).map(SqlValue::Date),

        (ColumnType::Timestamp, SqlValue::DateTime(d)) => Some(SqlValue::DateTime(*d)),
        (ColumnType::Timestamp, SqlValue::Date(d)) => d.and_hms_opt(0, 0, 0).map(SqlValue::DateTime),
        (ColumnType::Timestamp, SqlValue::Text(s)) => parse_timestamp(s).map(SqlValue::DateTime),

        _ => None,
    };

    coerced.ok_or_else(|| format!("cannot convert {} value {} to {:?}", value.kind(), value, column_type))
}

fn whole_number(v: f64) -> Option<i64> {
    if v.is_finite() && v.fract() == 0.0 && v >= i64::MIN as f64 && v <= i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(s).map(|ts| ts.date()))
}

/// Accepts ISO 8601 with a space or `T` separator, with or without an
/// offset (converted to UTC), or a bare date (midnight).
fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
    const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f %:z", "%Y-%m-%d %H:%M:%S%.f%:z"];

    let s = s.trim();
    if let Some(ts) = NAIVE_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
    {
        return Some(ts);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.naive_utc());
    }
    if let Some(ts) = OFFSET_FORMATS
        .iter()
        .find_map(|f| DateTime::parse_from_str(s, f).ok())
    {
        return Some(ts.naive_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
