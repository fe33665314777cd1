//! Catalog of the tables this tool migrates.
//!
//! The SQLite source predates the PostgreSQL schema: some column names use
//! hyphens (`ad-specialist-name`) and `communities.active` does not exist
//! in the source at all. The definitions below carry those differences.

use std::collections::BTreeMap;

use tracing::debug;

use super::schema::{ColumnSource, ColumnSpec, ColumnType, DefaultValue, ForeignKeyRef, TableSpec};
use crate::error::{MigrateError, Result};

/// Sentinel state value that marks a community as active.
pub const ACTIVE_STATE: &str = "Active";

/// Every table known to the migration, in no particular order.
///
/// Order is derived from foreign keys by [`MigrationPlan`](super::plan::MigrationPlan).
pub fn builtin_tables() -> Vec<TableSpec> {
    vec![communities(), ad_types()]
}

/// `ad_types`: advertisement slots offered by a community.
///
/// `community_id` is a plain integer. The association back to
/// `communities` is not enforced so that the two tables do not form a
/// foreign key cycle (`communities.selected_ad_type_id` is enforced).
pub fn ad_types() -> TableSpec {
    TableSpec::new(
        "ad_types",
        vec![
            ColumnSpec::identity("id"),
            ColumnSpec::new("community_id", ColumnType::Integer).not_null(),
            ColumnSpec::new("name", ColumnType::varchar(255)).not_null(),
            ColumnSpec::new("width", ColumnType::Float),
            ColumnSpec::new("height", ColumnType::Float),
            ColumnSpec::new("cost", ColumnType::Float),
            ColumnSpec::new("start_date", ColumnType::Date),
            ColumnSpec::new("end_date", ColumnType::Date),
            ColumnSpec::new("deadline_date", ColumnType::Date),
            ColumnSpec::new("term_months", ColumnType::Integer),
            ColumnSpec::run_timestamp("created_at", false),
            ColumnSpec::run_timestamp("updated_at", true),
        ],
        vec![],
    )
}

/// `communities`: the properties that buy advertising.
pub fn communities() -> TableSpec {
    TableSpec::new(
        "communities",
        vec![
            ColumnSpec::identity("id"),
            ColumnSpec::new("name", ColumnType::varchar(255)).not_null(),
            ColumnSpec::new("address", ColumnType::varchar(255)).not_null(),
            ColumnSpec::new("city", ColumnType::varchar(255)),
            ColumnSpec::new("state", ColumnType::varchar(20))
                .with_default(DefaultValue::Text("Inactive".to_string())),
            ColumnSpec::new("phone", ColumnType::varchar(20)).not_null(),
            ColumnSpec::new("spaces", ColumnType::Integer),
            ColumnSpec::new("ad_specialist_name", ColumnType::varchar(255))
                .from_source("ad-specialist-name"),
            ColumnSpec::new("ad_specialist_email", ColumnType::varchar(255))
                .from_source("ad-specialist-email"),
            ColumnSpec::new("ad_specialist_phone", ColumnType::varchar(20))
                .from_source("ad-specialist-phone"),
            ColumnSpec::new("selected_ad_type_id", ColumnType::Integer),
            ColumnSpec::new("newsletter_link", ColumnType::varchar(255)),
            ColumnSpec::new("general_notes", ColumnType::TEXT),
            ColumnSpec::new("active", ColumnType::Boolean)
                .with_default(DefaultValue::Bool(false))
                .derived(ColumnSource::EqualsSentinel {
                    source: "state".to_string(),
                    sentinel: ACTIVE_STATE.to_string(),
                }),
            ColumnSpec::run_timestamp("created_at", false),
            ColumnSpec::run_timestamp("updated_at", true),
        ],
        vec![ForeignKeyRef::new("selected_ad_type_id", "ad_types", "id")],
    )
}

/// Redirect target columns to differently named source columns.
///
/// `overrides` maps table name -> target column -> source column. Derived
/// columns keep their derivation and only change the column they read.
pub fn apply_column_overrides(
    tables: &mut [TableSpec],
    overrides: &BTreeMap<String, BTreeMap<String, String>>,
) -> Result<()> {
    for (table_name, columns) in overrides {
        let table = tables
            .iter_mut()
            .find(|t| &t.name == table_name)
            .ok_or_else(|| {
                MigrateError::Config(format!(
                    "column_overrides refers to unknown table '{}'",
                    table_name
                ))
            })?;

        for (target, source_column) in columns {
            let column = table
                .columns
                .iter_mut()
                .find(|c| &c.name == target)
                .ok_or_else(|| {
                    MigrateError::Config(format!(
                        "column_overrides refers to unknown column '{}.{}'",
                        table_name, target
                    ))
                })?;

            match &mut column.source {
                ColumnSource::Source(name) => *name = source_column.clone(),
                ColumnSource::EqualsSentinel { source, .. } => *source = source_column.clone(),
                ColumnSource::RunTimestamp { .. } => {
                    return Err(MigrateError::Config(format!(
                        "column '{}.{}' is filled with the run timestamp and has no source column",
                        table_name, target
                    )));
                }
            }
            debug!("{}.{} now reads source column '{}'", table_name, target, source_column);
        }
    }
    Ok(())
}
