//! Source database drivers.
//!
//! The only source is a single SQLite file, opened read-only.

mod sqlite;

pub use sqlite::SqliteSource;

/// Quote a SQLite identifier.
///
/// Source column names may contain hyphens, so every identifier is quoted.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
