//! Target database drivers.
//!
//! - [`PgTarget`]: PostgreSQL over a single pooled connection
//! - [`tls`]: rustls connector selection from `ssl_mode`

mod postgres;
pub mod tls;

pub use postgres::{create_table_sql, pg_type, upsert_sql, PgTarget};
pub use tls::{SslMode, TlsBuilder};

/// Quote a PostgreSQL identifier.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Qualify a table name with its schema.
pub(crate) fn qualify_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}
