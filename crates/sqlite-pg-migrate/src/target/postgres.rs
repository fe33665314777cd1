//! PostgreSQL target writer.
//!
//! One pooled connection is checked out at connect time and held until the
//! run ends, so explicit `BEGIN`/`COMMIT` issued through it bracket every
//! statement in between. Row parameters are bound with the Rust type that
//! matches the target column, never as text.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use tokio_postgres::types::ToSql;
use tokio_postgres::{Config as PgConfig, NoTls};
use tracing::{debug, info, warn};

use super::tls::TlsBuilder;
use super::{qualify_table, quote_ident};
use crate::config::TargetConfig;
use crate::core::schema::{ColumnSpec, ColumnType, DefaultValue, TableSpec};
use crate::core::traits::{TargetRow, TargetStore};
use crate::core::value::SqlValue;
use crate::error::{MigrateError, Result};

/// Connection timeout for the target.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

type Param = Box<dyn ToSql + Sync + Send>;

/// PostgreSQL target bound to one schema.
pub struct PgTarget {
    pool: Pool,
    client: Object,
    schema: String,
}

impl PgTarget {
    /// Connect to the configured target and check out the run's connection.
    pub async fn connect(config: &TargetConfig) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        if !config.password.is_empty() {
            pg_config.password(&config.password);
        }
        pg_config.keepalives(true);
        pg_config.connect_timeout(CONNECT_TIMEOUT);
        pg_config.application_name("sqlite-pg-migrate");

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let mgr = match TlsBuilder::parse(&config.ssl_mode)?.build()? {
            Some(connector) => Manager::from_config(pg_config, connector, mgr_config),
            None => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                Manager::from_config(pg_config, NoTls, mgr_config)
            }
        };

        let pool = Pool::builder(mgr)
            .max_size(1)
            .build()
            .map_err(|e| MigrateError::pool(e, "creating PostgreSQL target pool"))?;

        let client = pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, format!("connecting to {}", config.display_string())))?;
        client.simple_query("SELECT 1").await?;

        info!(
            "Connected to PostgreSQL target: {}:{}/{} (schema {})",
            config.host, config.port, config.database, config.schema
        );

        Ok(Self {
            pool,
            client,
            schema: config.schema.clone(),
        })
    }

    /// Target schema name.
    pub fn schema(&self) -> &str {
        &self.schema
    }
}

/// PostgreSQL spelling of a column type.
pub fn pg_type(column_type: &ColumnType) -> String {
    match column_type {
        ColumnType::Integer => "INTEGER".to_string(),
        ColumnType::Float => "FLOAT".to_string(),
        ColumnType::Text {
            max_length: Some(n),
        } => format!("VARCHAR({})", n),
        ColumnType::Text { max_length: None } => "TEXT".to_string(),
        ColumnType::Boolean => "BOOLEAN".to_string(),
        ColumnType::Date => "DATE".to_string(),
        ColumnType::Timestamp => "TIMESTAMP".to_string(),
    }
}

fn default_literal(default: &DefaultValue) -> String {
    match default {
        DefaultValue::Bool(true) => "TRUE".to_string(),
        DefaultValue::Bool(false) => "FALSE".to_string(),
        DefaultValue::Integer(v) => v.to_string(),
        DefaultValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
        DefaultValue::CurrentTimestamp => "CURRENT_TIMESTAMP".to_string(),
    }
}

fn column_definition(column: &ColumnSpec) -> String {
    if column.is_identity && column.column_type == ColumnType::Integer {
        return format!("{} SERIAL PRIMARY KEY", quote_ident(&column.name));
    }

    let mut def = format!("{} {}", quote_ident(&column.name), pg_type(&column.column_type));
    if column.is_identity {
        def.push_str(" PRIMARY KEY");
    } else if !column.is_nullable {
        def.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default {
        def.push_str(" DEFAULT ");
        def.push_str(&default_literal(default));
    }
    def
}

/// CREATE TABLE statement for a table spec, foreign keys inline.
pub fn create_table_sql(schema: &str, table: &TableSpec) -> String {
    let mut parts: Vec<String> = table.columns.iter().map(column_definition).collect();
    for fk in &table.foreign_keys {
        parts.push(format!(
            "FOREIGN KEY ({}) REFERENCES {} ({})",
            quote_ident(&fk.column),
            qualify_table(schema, &fk.ref_table),
            quote_ident(&fk.ref_column)
        ));
    }

    format!(
        "CREATE TABLE {} (\n    {}\n)",
        qualify_table(schema, &table.name),
        parts.join(",\n    ")
    )
}

/// INSERT ... ON CONFLICT (id) DO UPDATE statement for the given row columns.
///
/// Columns that do not update on conflict (the id, insert-only timestamps)
/// are inserted but left out of the SET list.
pub fn upsert_sql(schema: &str, table: &TableSpec, columns: &[&str]) -> Result<String> {
    let pk = primary_key_name(table)?;

    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${}", i)).collect();
    let updates: Vec<String> = columns
        .iter()
        .filter(|c| table.column(c).is_some_and(|spec| spec.updates_on_conflict()))
        .map(|c| format!("{} = EXCLUDED.{}", quote_ident(c), quote_ident(c)))
        .collect();

    let action = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };

    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) {}",
        qualify_table(schema, &table.name),
        columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", "),
        placeholders.join(", "),
        quote_ident(pk),
        action
    ))
}

fn primary_key_name(table: &TableSpec) -> Result<&str> {
    table
        .primary_key()
        .map(|c| c.name.as_str())
        .ok_or_else(|| MigrateError::Config(format!("table '{}' has no primary key", table.name)))
}

/// Box a value with the Rust type PostgreSQL expects for the column.
fn bind_param(column: &ColumnSpec, value: &SqlValue) -> std::result::Result<Param, String> {
    let param: Param = match (column.column_type, value) {
        (ColumnType::Integer, SqlValue::Null) => Box::new(None::<i32>),
        (ColumnType::Integer, SqlValue::I64(v)) => Box::new(i32::try_from(*v).map_err(|_| {
            format!("value {} is out of range for INTEGER column {}", v, column.name)
        })?),
        (ColumnType::Float, SqlValue::Null) => Box::new(None::<f64>),
        (ColumnType::Float, SqlValue::F64(v)) => Box::new(*v),
        (ColumnType::Text { .. }, SqlValue::Null) => Box::new(None::<String>),
        (ColumnType::Text { .. }, SqlValue::Text(v)) => Box::new(v.clone()),
        (ColumnType::Boolean, SqlValue::Null) => Box::new(None::<bool>),
        (ColumnType::Boolean, SqlValue::Bool(v)) => Box::new(*v),
        (ColumnType::Date, SqlValue::Null) => Box::new(None::<NaiveDate>),
        (ColumnType::Date, SqlValue::Date(v)) => Box::new(*v),
        (ColumnType::Timestamp, SqlValue::Null) => Box::new(None::<NaiveDateTime>),
        (ColumnType::Timestamp, SqlValue::DateTime(v)) => Box::new(*v),
        (ty, v) => {
            return Err(format!(
                "cannot bind {} value to {} column {}",
                v.kind(),
                pg_type(&ty),
                column.name
            ))
        }
    };
    Ok(param)
}

/// Server message (and detail) of a database error, or the driver message.
fn describe_pg_error(err: &tokio_postgres::Error) -> String {
    match err.as_db_error() {
        Some(db) => match db.detail() {
            Some(detail) => format!("{} ({})", db.message(), detail),
            None => db.message().to_string(),
        },
        None => err.to_string(),
    }
}

#[async_trait]
impl TargetStore for PgTarget {
    async fn table_exists(&self, table: &str) -> Result<bool> {
        let sql = r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = $1 AND table_name = $2
            )
        "#;
        let row = self.client.query_one(sql, &[&self.schema, &table]).await?;
        Ok(row.try_get::<_, bool>(0)?)
    }

    async fn create_table(&self, table: &TableSpec) -> Result<()> {
        let ddl = create_table_sql(&self.schema, table);
        debug!("DDL for {}:\n{}", table.name, ddl);

        // No transaction is open here, so the DDL autocommits
        self.client
            .batch_execute(&ddl)
            .await
            .map_err(|e| MigrateError::schema_creation(&table.name, describe_pg_error(&e)))?;

        info!("Created table {}.{}", self.schema, table.name);
        Ok(())
    }

    async fn begin(&self) -> Result<()> {
        self.client.batch_execute("BEGIN").await?;
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        self.client.batch_execute("COMMIT").await?;
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        self.client.batch_execute("ROLLBACK").await?;
        Ok(())
    }

    async fn upsert_row(&self, table: &TableSpec, row: &TargetRow) -> Result<u64> {
        let id = table
            .primary_key()
            .and_then(|pk| row.get(&pk.name))
            .map(|v| v.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let mut params: Vec<Param> = Vec::with_capacity(row.len());
        for (name, value) in row.iter() {
            let column = table.column(name).ok_or_else(|| {
                MigrateError::mapping(&table.name, name, "not a column of the target table")
            })?;
            let param =
                bind_param(column, value).map_err(|m| MigrateError::load_rejected(&table.name, &id, m))?;
            params.push(param);
        }

        let columns: Vec<&str> = row.columns().collect();
        let sql = upsert_sql(&self.schema, table, &columns)?;
        let refs: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();

        let stmt = self
            .client
            .prepare_cached(&sql)
            .await
            .map_err(|e| MigrateError::load_rejected(&table.name, &id, describe_pg_error(&e)))?;
        self.client
            .execute(&stmt, &refs)
            .await
            .map_err(|e| MigrateError::load_rejected(&table.name, &id, describe_pg_error(&e)))
    }

    async fn max_id(&self, table: &TableSpec) -> Result<Option<i64>> {
        let pk = primary_key_name(table)?;
        let sql = format!(
            "SELECT MAX({})::bigint FROM {}",
            quote_ident(pk),
            qualify_table(&self.schema, &table.name)
        );
        let row = self.client.query_one(sql.as_str(), &[]).await?;
        Ok(row.try_get::<_, Option<i64>>(0)?)
    }

    async fn reset_sequence(&self, table: &TableSpec, next_value: i64) -> Result<bool> {
        let pk = primary_key_name(table)?;
        let qualified = qualify_table(&self.schema, &table.name);

        let row = self
            .client
            .query_one("SELECT pg_get_serial_sequence($1, $2)", &[&qualified, &pk])
            .await?;
        let Some(sequence) = row.try_get::<_, Option<String>>(0)? else {
            warn!("{}.{} owns no sequence, skipping reset", qualified, pk);
            return Ok(false);
        };

        self.client
            .query_one(
                "SELECT setval($1::text::regclass, $2, false)",
                &[&sequence, &next_value],
            )
            .await?;

        debug!("Sequence {} now returns {} next", sequence, next_value);
        Ok(true)
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(*)::int8 FROM {}",
            qualify_table(&self.schema, table)
        );
        let row = self.client.query_one(sql.as_str(), &[]).await?;
        Ok(row.try_get::<_, i64>(0)?)
    }

    async fn test_connection(&self) -> Result<()> {
        self.client.simple_query("SELECT 1").await?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "postgres"
    }

    async fn close(&self) {
        self.pool.close();
    }
}
