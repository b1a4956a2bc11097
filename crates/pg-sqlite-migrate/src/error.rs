//! Error types for the migration library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for migration operations.
///
/// Every variant is fatal for the run. Recoverable conditions (failed DDL,
/// failed index creation, skipped tables, short large-object reads) are
/// logged and recorded in the table outcome instead.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The target file is already present; it is never overwritten.
    #[error("Target file {} already exists, refusing to overwrite it", .0.display())]
    TargetExists(PathBuf),

    /// Source database connection or query error
    #[error("Source database error: {0}")]
    Source(#[from] tokio_postgres::Error),

    /// Target database open, bind or execute error
    #[error("Target database error: {0}")]
    Target(#[from] sqlx::Error),

    /// Catalog query returned something the enumerator cannot interpret
    #[error("Schema extraction failed: {0}")]
    SchemaExtraction(String),

    /// Data transfer failed for a specific table
    #[error("Transfer failed for table {table}: {message}")]
    Transfer { table: String, message: String },

    /// Large object could not be sized or read
    #[error("Large object {oid}: {message}")]
    LargeObject { oid: u32, message: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Migration was cancelled (SIGINT, etc.)
    #[error("Migration cancelled")]
    Cancelled,
}

impl MigrateError {
    /// Create a Transfer error
    pub fn transfer(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Transfer {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a LargeObject error
    pub fn large_object(oid: u32, message: impl Into<String>) -> Self {
        MigrateError::LargeObject {
            oid,
            message: message.into(),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) => 2,
            MigrateError::TargetExists(_) => 3,
            MigrateError::Source(_) | MigrateError::SchemaExtraction(_) => 4,
            MigrateError::Target(_)
            | MigrateError::Transfer { .. }
            | MigrateError::LargeObject { .. } => 5,
            MigrateError::Io(_) | MigrateError::Yaml(_) | MigrateError::Json(_) => 1,
            MigrateError::Cancelled => 130,
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
