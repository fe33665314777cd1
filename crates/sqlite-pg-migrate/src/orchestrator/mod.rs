//! Migration orchestrator - main workflow coordinator.
//!
//! Tables are migrated one at a time in foreign key order. For each table:
//! ensure the target table, extract, remap and upsert every row in one
//! transaction, commit, then reconcile the id sequence in a second
//! transaction. The first error rolls back the open transaction and stops
//! the run; tables committed before it stay committed.

use std::future::Future;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::core::catalog::{apply_column_overrides, builtin_tables};
use crate::core::plan::MigrationPlan;
use crate::core::schema::TableSpec;
use crate::core::traits::{SourceStore, TargetStore};
use crate::error::{MigrateError, Result};
use crate::source::SqliteSource;
use crate::target::PgTarget;
use crate::transfer::{
    ColumnRemapper, RowExtractor, SchemaGuarantor, SequenceReconciler, UpsertLoader,
};

/// Where a run is. `Completed` and `Failed` are final.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", content = "table", rename_all = "snake_case")]
pub enum MigrationPhase {
    NotStarted,
    /// Migrating the named table.
    Migrating(String),
    Completed,
    /// The named table failed; nothing after it ran.
    Failed(String),
}

/// Outcome of one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableReport {
    /// Table name.
    pub name: String,

    /// Rows upserted (for a dry run: rows that would be).
    pub rows_migrated: u64,

    /// Whether the target table was created by this run.
    pub schema_created: bool,

    /// Next id handed out by the table's sequence, if it was reset.
    pub sequence_next: Option<i64>,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status: "completed" or "dry_run".
    pub status: String,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Per-table outcomes in migration order.
    pub tables: Vec<TableReport>,

    /// Total rows migrated.
    pub rows_migrated: u64,
}

impl MigrationResult {
    fn finish(run_id: String, status: &str, started_at: DateTime<Utc>, tables: Vec<TableReport>) -> Self {
        let completed_at = Utc::now();
        let duration_seconds = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;
        let rows_migrated = tables.iter().map(|t| t.rows_migrated).sum();
        Self {
            run_id,
            status: status.to_string(),
            started_at,
            completed_at,
            duration_seconds,
            tables,
            rows_migrated,
        }
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Source and target row counts of one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableValidation {
    pub table: String,
    pub source_rows: i64,
    /// Zero when the target table does not exist.
    pub target_rows: i64,
    pub matches: bool,
}

/// Connectivity of both stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub source_connected: bool,
    pub source_latency_ms: u64,
    pub source_error: Option<String>,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    pub target_error: Option<String>,
    pub healthy: bool,
}

impl HealthCheckResult {
    fn new(source: Probe, target: Probe) -> Self {
        Self {
            source_connected: source.error.is_none(),
            source_latency_ms: source.latency_ms,
            target_connected: target.error.is_none(),
            target_latency_ms: target.latency_ms,
            healthy: source.error.is_none() && target.error.is_none(),
            source_error: source.error,
            target_error: target.error,
        }
    }
}

struct Probe {
    latency_ms: u64,
    error: Option<String>,
}

async fn probe<F>(check: F) -> Probe
where
    F: Future<Output = Result<()>>,
{
    let started = Instant::now();
    let error = check.await.err().map(|e| e.to_string());
    Probe {
        latency_ms: started.elapsed().as_millis() as u64,
        error,
    }
}

/// Catalog tables, with configured overrides, in dependency order and
/// restricted to the configured subset.
pub fn build_plan(config: &Config) -> Result<MigrationPlan> {
    let mut tables = builtin_tables();
    apply_column_overrides(&mut tables, &config.migration.column_overrides)?;
    MigrationPlan::new(tables)?.select(&config.migration.tables)
}

/// Check every planned table against the source without touching the target.
///
/// Returns the source row count of each table.
pub async fn dry_run<S: SourceStore + ?Sized>(config: &Config, source: &S) -> Result<MigrationResult> {
    let started_at = Utc::now();
    let run_id = uuid::Uuid::new_v4().to_string();
    let plan = build_plan(config)?;

    info!("Dry run {}: {}", run_id, plan.table_names().join(" -> "));
    preflight(&plan, source).await?;

    let mut tables = Vec::with_capacity(plan.len());
    for table in plan.tables() {
        let rows = source.row_count(&table.name).await?;
        info!("{}: {} rows would be migrated", table.name, rows);
        tables.push(TableReport {
            name: table.name.clone(),
            rows_migrated: rows.max(0) as u64,
            schema_created: false,
            sequence_next: None,
        });
    }

    Ok(MigrationResult::finish(run_id, "dry_run", started_at, tables))
}

/// Connect to both stores from configuration and ping them.
///
/// Connection failures are reported in the result, not returned.
pub async fn health_check(config: &Config) -> HealthCheckResult {
    let source = probe(async {
        let source = SqliteSource::connect(&config.source).await?;
        let result = source.test_connection().await;
        source.close().await;
        result
    })
    .await;

    let target = probe(async {
        let target = PgTarget::connect(&config.target).await?;
        let result = target.test_connection().await;
        target.close().await;
        result
    })
    .await;

    HealthCheckResult::new(source, target)
}

/// Resolve every planned table's column mapping against the source.
async fn preflight<S: SourceStore + ?Sized>(plan: &MigrationPlan, source: &S) -> Result<()> {
    let extractor = RowExtractor::new(source);
    for table in plan.tables() {
        let columns = extractor.columns(&table.name).await?;
        ColumnRemapper::resolve(table, &columns)?;
    }
    info!("Preflight passed for {} tables", plan.len());
    Ok(())
}

/// Migration orchestrator.
pub struct Orchestrator<S: SourceStore, T: TargetStore> {
    config: Config,
    plan: MigrationPlan,
    source: S,
    target: T,
    phase: MigrationPhase,
}

impl Orchestrator<SqliteSource, PgTarget> {
    /// Build the plan, then open the SQLite source and the PostgreSQL target.
    pub async fn connect(config: Config) -> Result<Self> {
        let plan = build_plan(&config)?;
        let source = SqliteSource::connect(&config.source).await?;
        let target = match PgTarget::connect(&config.target).await {
            Ok(target) => target,
            Err(e) => {
                source.close().await;
                return Err(e);
            }
        };
        Ok(Self::with_plan(config, plan, source, target))
    }
}

impl<S: SourceStore, T: TargetStore> Orchestrator<S, T> {
    /// Create an orchestrator over already opened stores.
    pub fn new(config: Config, source: S, target: T) -> Result<Self> {
        let plan = build_plan(&config)?;
        Ok(Self::with_plan(config, plan, source, target))
    }

    fn with_plan(config: Config, plan: MigrationPlan, source: S, target: T) -> Self {
        Self {
            config,
            plan,
            source,
            target,
            phase: MigrationPhase::NotStarted,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn plan(&self) -> &MigrationPlan {
        &self.plan
    }

    pub fn phase(&self) -> &MigrationPhase {
        &self.phase
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    /// Run the migration.
    pub async fn run(&mut self) -> Result<MigrationResult> {
        if self.phase != MigrationPhase::NotStarted {
            return Err(MigrateError::Config(format!(
                "orchestrator already ran ({:?})",
                self.phase
            )));
        }

        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        info!(
            "Starting migration run {}: {} -> {} ({})",
            run_id,
            self.source.db_type(),
            self.target.db_type(),
            self.plan.table_names().join(" -> ")
        );

        if let Err(e) = preflight(&self.plan, &self.source).await {
            error!("Preflight failed, target untouched: {}", e);
            self.phase = MigrationPhase::Failed(failed_table(&e));
            return Err(e);
        }

        let mut reports = Vec::with_capacity(self.plan.len());
        for table in self.plan.tables() {
            self.phase = MigrationPhase::Migrating(table.name.clone());
            match migrate_table(&self.source, &self.target, table).await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    error!("Migration of {} failed: {}", table.name, e);
                    self.phase = MigrationPhase::Failed(table.name.clone());
                    if let Err(rollback_err) = self.target.rollback().await {
                        warn!("Rollback after failure also failed: {}", rollback_err);
                    }
                    return Err(e);
                }
            }
        }

        self.phase = MigrationPhase::Completed;
        let result = MigrationResult::finish(run_id, "completed", started_at, reports);
        info!(
            "Migration completed: {} tables, {} rows in {:.1}s",
            result.tables.len(),
            result.rows_migrated,
            result.duration_seconds
        );
        Ok(result)
    }

    /// Compare source and target row counts of every planned table.
    pub async fn validate(&self) -> Result<Vec<TableValidation>> {
        let mut results = Vec::with_capacity(self.plan.len());
        for table in self.plan.tables() {
            let source_rows = self.source.row_count(&table.name).await?;
            let target_rows = if self.target.table_exists(&table.name).await? {
                self.target.row_count(&table.name).await?
            } else {
                0
            };
            let matches = source_rows == target_rows;

            if matches {
                info!("{}: {} rows (match)", table.name, source_rows);
            } else {
                warn!(
                    "{}: source={} target={} (MISMATCH)",
                    table.name, source_rows, target_rows
                );
            }

            results.push(TableValidation {
                table: table.name.clone(),
                source_rows,
                target_rows,
                matches,
            });
        }
        Ok(results)
    }

    /// Ping both open stores.
    pub async fn health_check(&self) -> HealthCheckResult {
        let source = probe(self.source.test_connection()).await;
        let target = probe(self.target.test_connection()).await;
        HealthCheckResult::new(source, target)
    }

    /// Release both connections.
    pub async fn close(&self) {
        self.source.close().await;
        self.target.close().await;
    }
}

/// Table named by a preflight error, for the failed phase.
fn failed_table(err: &MigrateError) -> String {
    match err {
        MigrateError::Mapping { table, .. } => table.clone(),
        _ => String::from("preflight"),
    }
}

async fn migrate_table<S, T>(source: &S, target: &T, table: &TableSpec) -> Result<TableReport>
where
    S: SourceStore + ?Sized,
    T: TargetStore + ?Sized,
{
    info!("Migrating {}", table.name);

    let schema_created = SchemaGuarantor::new(target).ensure(table).await?;

    let rows = RowExtractor::new(source).extract(&table.name).await?;
    let remapper = ColumnRemapper::resolve(table, &rows.columns)?;
    let run_timestamp = Utc::now().naive_utc();

    target.begin().await?;
    let mut loader = UpsertLoader::new(target, table);
    for row in &rows.rows {
        let target_row = remapper.remap(row, run_timestamp)?;
        loader.load(&target_row).await?;
    }
    target.commit().await?;
    let rows_migrated = loader.rows_loaded();
    info!("{}: {} rows migrated", table.name, rows_migrated);

    target.begin().await?;
    let sequence_next = SequenceReconciler::new(target).reconcile(table).await?;
    target.commit().await?;

    Ok(TableReport {
        name: table.name.clone(),
        rows_migrated,
        schema_created,
        sequence_next,
    })
}
