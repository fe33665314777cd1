//! Core abstractions for the migration engine.
//!
//! - [`schema`]: Table, column and foreign key definitions
//! - [`value`]: SQL value representation shared by source and target
//! - [`catalog`]: The tables this tool migrates
//! - [`plan`]: Foreign key dependency ordering
//! - [`traits`]: Source and target store interfaces

pub mod catalog;
pub mod plan;
pub mod schema;
pub mod traits;
pub mod value;

// Re-export commonly used types for convenience
pub use plan::MigrationPlan;
pub use schema::{ColumnSource, ColumnSpec, ColumnType, DefaultValue, ForeignKeyRef, TableSpec};
pub use traits::{SourceRow, SourceRows, SourceStore, TargetRow, TargetStore};
pub use value::SqlValue;
