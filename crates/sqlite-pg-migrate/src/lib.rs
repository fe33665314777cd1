//! # sqlite-pg-migrate
//!
//! One-time SQLite to PostgreSQL migration library.
//!
//! Moves a fixed catalog of tables from a SQLite file into a PostgreSQL
//! schema and can be re-run safely:
//!
//! - **Dependency order** from the foreign key graph
//! - **Idempotent upserts** keyed by id (`created_at` survives re-runs)
//! - **Named column mapping** with derived fields and run timestamps
//! - **Sequence reconciliation** so new ids continue after the migrated ones
//!
//! ## Example
//!
//! ```rust,no_run
//! use sqlite_pg_migrate::{Config, Orchestrator};
//!
//! # async fn example() -> sqlite_pg_migrate::Result<()> {
//! let config = Config::load("config.yaml")?;
//! let mut orchestrator = Orchestrator::connect(config).await?;
//! let result = orchestrator.run().await;
//! orchestrator.close().await;
//! println!("Migrated {} rows", result?.rows_migrated);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod merge;
pub mod orchestrator;
pub mod source;
pub mod target;
pub mod transfer;

// Re-exports for convenient access
pub use config::{Config, MigrationConfig, SourceConfig, TargetConfig};
pub use crate::core::{MigrationPlan, SourceStore, SqlValue, TableSpec, TargetStore};
pub use error::{MigrateError, Result};
pub use merge::{merge_parts, MergeReport};
pub use orchestrator::{
    build_plan, dry_run, health_check, HealthCheckResult, MigrationPhase, MigrationResult,
    Orchestrator, TableReport, TableValidation,
};
pub use source::SqliteSource;
pub use target::PgTarget;
