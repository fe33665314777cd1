//! In-memory source and target stores for engine tests.
//!
//! Both fakes are cheap handles over shared state, so a test can keep a
//! clone to inspect the target after an orchestrator has taken ownership.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlite_pg_migrate::core::{SourceRow, SourceRows, TargetRow};
use sqlite_pg_migrate::{Config, MigrateError, Result, SourceStore, SqlValue, TableSpec, TargetStore};

pub fn config(migration: &str) -> Config {
    let yaml = format!(
        r#"
source:
  path: ./database.sqlite
target:
  host: localhost
  database: management_db
  user: postgres
  password: postgres
{}
"#,
        migration
    );
    Config::from_yaml(&yaml).unwrap()
}

// ===== Source =====

#[derive(Clone, Default)]
pub struct FakeSource {
    tables: Arc<Mutex<BTreeMap<String, SourceRows>>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, name: &str, columns: &[&str], rows: Vec<Vec<SqlValue>>) -> Self {
        self.set_table(name, columns, rows);
        self
    }

    pub fn set_table(&self, name: &str, columns: &[&str], rows: Vec<Vec<SqlValue>>) {
        let rows = SourceRows {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows.into_iter().map(SourceRow::new).collect(),
        };
        self.tables.lock().unwrap().insert(name.to_string(), rows);
    }

    fn table(&self, name: &str) -> Result<SourceRows> {
        self.tables
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| MigrateError::missing_source(format!("no such table: {}", name)))
    }
}

#[async_trait]
impl SourceStore for FakeSource {
    async fn list_columns(&self, table: &str) -> Result<Vec<String>> {
        Ok(self.table(table)?.columns)
    }

    async fn fetch_rows(&self, table: &str) -> Result<SourceRows> {
        self.table(table)
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        Ok(self.table(table)?.len() as i64)
    }

    async fn test_connection(&self) -> Result<()> {
        Ok(())
    }

    fn db_type(&self) -> &str {
        "fake-sqlite"
    }

    async fn close(&self) {}
}

// ===== Target =====

#[derive(Clone, Debug)]
pub struct FakeTable {
    pub spec: TableSpec,
    pub rows: BTreeMap<i64, TargetRow>,
    /// Value the id sequence hands out next.
    pub next_id: i64,
    pub has_sequence: bool,
}

#[derive(Default)]
struct TargetState {
    tables: BTreeMap<String, FakeTable>,
    snapshot: Option<BTreeMap<String, FakeTable>>,
    ddl_statements: usize,
    upserts: usize,
    commits: usize,
    rollbacks: usize,
    sequence_resets: usize,
    fail_sequence_for: Option<String>,
}

#[derive(Clone, Default)]
pub struct FakeTarget {
    state: Arc<Mutex<TargetState>>,
}

impl FakeTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend `spec` was created by an earlier run.
    pub fn with_existing_table(self, spec: TableSpec) -> Self {
        self.state.lock().unwrap().tables.insert(
            spec.name.clone(),
            FakeTable {
                spec,
                rows: BTreeMap::new(),
                next_id: 1,
                has_sequence: true,
            },
        );
        self
    }

    /// Make `max_id` fail for one table.
    pub fn fail_sequence_for(self, table: &str) -> Self {
        self.state.lock().unwrap().fail_sequence_for = Some(table.to_string());
        self
    }

    pub fn table(&self, name: &str) -> Option<FakeTable> {
        self.state.lock().unwrap().tables.get(name).cloned()
    }

    pub fn row(&self, table: &str, id: i64) -> Option<TargetRow> {
        self.table(table).and_then(|t| t.rows.get(&id).cloned())
    }

    pub fn value(&self, table: &str, id: i64, column: &str) -> Option<SqlValue> {
        self.row(table, id).and_then(|r| r.get(column).cloned())
    }

    pub fn next_id(&self, table: &str) -> Option<i64> {
        self.table(table).map(|t| t.next_id)
    }

    pub fn ddl_statements(&self) -> usize {
        self.state.lock().unwrap().ddl_statements
    }

    pub fn upserts(&self) -> usize {
        self.state.lock().unwrap().upserts
    }

    pub fn rollbacks(&self) -> usize {
        self.state.lock().unwrap().rollbacks
    }

    pub fn sequence_resets(&self) -> usize {
        self.state.lock().unwrap().sequence_resets
    }

    pub fn table_names(&self) -> Vec<String> {
        self.state.lock().unwrap().tables.keys().cloned().collect()
    }
}

fn id_of(spec: &TableSpec, row: &TargetRow) -> Option<i64> {
    let pk = spec.primary_key()?;
    row.get(&pk.name)?.as_i64()
}

#[async_trait]
impl TargetStore for FakeTarget {
    async fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(self.state.lock().unwrap().tables.contains_key(table))
    }

    async fn create_table(&self, table: &TableSpec) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.tables.contains_key(&table.name) {
            return Err(MigrateError::schema_creation(&table.name, "relation already exists"));
        }
        for fk in &table.foreign_keys {
            if fk.ref_table != table.name && !state.tables.contains_key(&fk.ref_table) {
                return Err(MigrateError::schema_creation(
                    &table.name,
                    format!("relation \"{}\" does not exist", fk.ref_table),
                ));
            }
        }
        state.ddl_statements += 1;
        state.tables.insert(
            table.name.clone(),
            FakeTable {
                spec: table.clone(),
                rows: BTreeMap::new(),
                next_id: 1,
                has_sequence: true,
            },
        );
        Ok(())
    }

    async fn begin(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.snapshot = Some(state.tables.clone());
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.snapshot = None;
        state.commits += 1;
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(snapshot) = state.snapshot.take() {
            state.tables = snapshot;
        }
        state.rollbacks += 1;
        Ok(())
    }

    async fn upsert_row(&self, table: &TableSpec, row: &TargetRow) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        let id = id_of(table, row)
            .ok_or_else(|| MigrateError::load_rejected(&table.name, "null", "id is required"))?;

        for fk in &table.foreign_keys {
            let Some(SqlValue::I64(ref_id)) = row.get(&fk.column) else {
                continue;
            };
            let present = state
                .tables
                .get(&fk.ref_table)
                .is_some_and(|t| t.rows.contains_key(ref_id));
            if !present {
                return Err(MigrateError::load_rejected(
                    &table.name,
                    id,
                    format!(
                        "insert or update violates foreign key constraint: {}={} is not present in {}",
                        fk.column, ref_id, fk.ref_table
                    ),
                ));
            }
        }

        let fake = state
            .tables
            .get_mut(&table.name)
            .ok_or_else(|| MigrateError::load_rejected(&table.name, id, "relation does not exist"))?;

        match fake.rows.get_mut(&id) {
            Some(existing) => {
                for (column, value) in row.iter() {
                    if table.column(column).is_some_and(|c| c.updates_on_conflict()) {
                        existing.set(column, value.clone());
                    }
                }
            }
            None => {
                fake.rows.insert(id, row.clone());
            }
        }

        state.upserts += 1;
        Ok(1)
    }

    async fn max_id(&self, table: &TableSpec) -> Result<Option<i64>> {
        let state = self.state.lock().unwrap();
        if state.fail_sequence_for.as_deref() == Some(table.name.as_str()) {
            return Err(MigrateError::Config("permission denied for sequence".into()));
        }
        Ok(state
            .tables
            .get(&table.name)
            .and_then(|t| t.rows.keys().next_back().copied()))
    }

    async fn reset_sequence(&self, table: &TableSpec, next_value: i64) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let Some(fake) = state.tables.get_mut(&table.name) else {
            return Ok(false);
        };
        if !fake.has_sequence {
            return Ok(false);
        }
        fake.next_id = next_value;
        state.sequence_resets += 1;
        Ok(true)
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .tables
            .get(table)
            .map_or(0, |t| t.rows.len() as i64))
    }

    async fn test_connection(&self) -> Result<()> {
        Ok(())
    }

    fn db_type(&self) -> &str {
        "fake-postgres"
    }

    async fn close(&self) {}
}

// ===== Fixtures =====

pub const AD_TYPE_COLUMNS: &[&str] = &[
    "id",
    "community_id",
    "name",
    "width",
    "height",
    "cost",
    "start_date",
    "end_date",
    "deadline_date",
    "term_months",
    "createdAt",
    "updatedAt",
];

pub const COMMUNITY_COLUMNS: &[&str] = &[
    "id",
    "name",
    "address",
    "city",
    "phone",
    "spaces",
    "ad-specialist-name",
    "ad-specialist-email",
    "ad-specialist-phone",
    "state",
    "createdAt",
    "newsletter_link",
    "general_notes",
    "selected_ad_type_id",
];

pub fn ad_type_row(id: i64, community_id: i64, name: &str, cost: f64) -> Vec<SqlValue> {
    vec![
        SqlValue::I64(id),
        SqlValue::I64(community_id),
        name.into(),
        SqlValue::F64(8.5),
        SqlValue::F64(11.0),
        SqlValue::F64(cost),
        "2024-01-01".into(),
        "2024-12-31".into(),
        SqlValue::Null,
        SqlValue::I64(12),
        "2023-11-02 10:00:00.000 +00:00".into(),
        "2023-11-02 10:00:00.000 +00:00".into(),
    ]
}

pub fn community_row(id: i64, name: &str, state: &str, ad_type: Option<i64>) -> Vec<SqlValue> {
    vec![
        SqlValue::I64(id),
        name.into(),
        "1 Main St".into(),
        "Springfield".into(),
        "555-0100".into(),
        SqlValue::I64(40),
        "Dana".into(),
        "dana@example.com".into(),
        "555-0101".into(),
        state.into(),
        "2023-11-02 10:00:00.000 +00:00".into(),
        SqlValue::Null,
        SqlValue::Null,
        ad_type.into(),
    ]
}

/// Two ad types and three communities, ids with gaps.
pub fn sample_source() -> FakeSource {
    FakeSource::new()
        .with_table(
            "ad_types",
            AD_TYPE_COLUMNS,
            vec![
                ad_type_row(1, 10, "Full Page", 100.0),
                ad_type_row(4, 10, "Half Page", 60.0),
            ],
        )
        .with_table(
            "communities",
            COMMUNITY_COLUMNS,
            vec![
                community_row(10, "Oak Park", "Active", Some(1)),
                community_row(11, "Elm Court", "Inactive", Some(4)),
                community_row(15, "Pine Ridge", "active", None),
            ],
        )
}
