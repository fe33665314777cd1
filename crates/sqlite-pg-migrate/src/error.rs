//! Error types for the migration library.

use thiserror::Error;

/// Process exit code for configuration errors.
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Process exit code when the SQLite source cannot be read.
pub const EXIT_SOURCE_UNAVAILABLE: u8 = 2;
/// Process exit code when target DDL fails.
pub const EXIT_SCHEMA_ERROR: u8 = 3;
/// Process exit code when the target rejects a row.
pub const EXIT_LOAD_REJECTED: u8 = 4;
/// Process exit code when a sequence cannot be reconciled.
pub const EXIT_SEQUENCE_ERROR: u8 = 5;
/// Process exit code for target connection and driver errors.
pub const EXIT_TARGET_ERROR: u8 = 6;
/// Process exit code for file system errors.
pub const EXIT_IO_ERROR: u8 = 7;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, bad table list, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source file cannot be opened, or a declared table is missing from it.
    #[error("Source unavailable: {message}")]
    SourceUnavailable {
        message: String,
        #[source]
        source: Option<sqlx::Error>,
    },

    /// CREATE TABLE failed on the target.
    #[error("Schema creation failed for table {table}: {message}")]
    SchemaCreationFailed { table: String, message: String },

    /// A source row could not be mapped onto the target column set.
    #[error("Mapping failed for {table}.{column}: {message}")]
    Mapping {
        table: String,
        column: String,
        message: String,
    },

    /// The target rejected an upsert (constraint violation other than the id conflict).
    #[error("Load rejected for table {table} (id {id}): {message}")]
    LoadRejected {
        table: String,
        id: String,
        message: String,
    },

    /// The post-load sequence reset failed.
    #[error("Sequence reset failed for table {table}: {message}")]
    SequenceResetFailed { table: String, message: String },

    /// Target database connection or query error
    #[error("Target database error: {0}")]
    Target(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl std::fmt::Display, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a SourceUnavailable error wrapping a driver error.
    pub fn source_unavailable(message: impl Into<String>, err: sqlx::Error) -> Self {
        MigrateError::SourceUnavailable {
            message: message.into(),
            source: Some(err),
        }
    }

    /// Create a SourceUnavailable error without an underlying driver error.
    pub fn missing_source(message: impl Into<String>) -> Self {
        MigrateError::SourceUnavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Create a Mapping error
    pub fn mapping(
        table: impl Into<String>,
        column: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        MigrateError::Mapping {
            table: table.into(),
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a LoadRejected error
    pub fn load_rejected(
        table: impl Into<String>,
        id: impl std::fmt::Display,
        message: impl std::fmt::Display,
    ) -> Self {
        MigrateError::LoadRejected {
            table: table.into(),
            id: id.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a SchemaCreationFailed error
    pub fn schema_creation(table: impl Into<String>, message: impl std::fmt::Display) -> Self {
        MigrateError::SchemaCreationFailed {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Create a SequenceResetFailed error
    pub fn sequence_reset(table: impl Into<String>, message: impl std::fmt::Display) -> Self {
        MigrateError::SequenceResetFailed {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Map the error onto a process exit code.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) | MigrateError::Mapping { .. } => {
                EXIT_CONFIG_ERROR
            }
            MigrateError::SourceUnavailable { .. } => EXIT_SOURCE_UNAVAILABLE,
            MigrateError::SchemaCreationFailed { .. } => EXIT_SCHEMA_ERROR,
            MigrateError::LoadRejected { .. } => EXIT_LOAD_REJECTED,
            MigrateError::SequenceResetFailed { .. } => EXIT_SEQUENCE_ERROR,
            MigrateError::Target(_) | MigrateError::Pool { .. } => EXIT_TARGET_ERROR,
            MigrateError::Io(_) | MigrateError::Json(_) => EXIT_IO_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
