//! Error types for the migration library.

use thiserror::Error;

/// Exit code for configuration problems (bad YAML, missing fields).
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code for invalid migrations (build, generation, loading).
pub const EXIT_MIGRATION_ERROR: u8 = 2;
/// Exit code when the dialect cannot express an operation.
pub const EXIT_NOT_SUPPORTED: u8 = 3;
/// Exit code when the database rejected a statement.
pub const EXIT_EXECUTION_ERROR: u8 = 4;
/// Exit code for transport-level failures.
pub const EXIT_CONNECTION_ERROR: u8 = 5;
/// Exit code for file system errors.
pub const EXIT_IO_ERROR: u8 = 7;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid use of the fluent builder API
    #[error("Invalid operation: {0}")]
    Build(String),

    /// The dialect cannot express the requested operation
    #[error("{dialect} does not support {feature}")]
    NotSupported { dialect: String, feature: String },

    /// Expression data is malformed and cannot be rendered
    #[error("Generation error: {0}")]
    Generation(String),

    /// The database rejected a statement
    #[error("Execution failed: {message}\n  SQL: {sql}")]
    Execution { sql: String, message: String },

    /// Two migrations declare the same version
    #[error("Duplicate migration version {version}: '{first}' and '{second}'")]
    DuplicateVersion {
        version: i64,
        first: String,
        second: String,
    },

    /// A migration cannot be loaded or resolved
    #[error("Invalid migration: {0}")]
    InvalidMigration(String),

    /// Transport or connection failure, driver message unchanged
    #[error("Connection error: {0}")]
    Connection(String),

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
    /// Create a NotSupported error for a dialect feature
    pub fn not_supported(dialect: impl Into<String>, feature: impl Into<String>) -> Self {
        MigrateError::NotSupported {
            dialect: dialect.into(),
            feature: feature.into(),
        }
    }

    /// Create an Execution error carrying the offending SQL
    pub fn execution(sql: impl Into<String>, message: impl std::fmt::Display) -> Self {
        MigrateError::Execution {
            sql: sql.into(),
            message: message.to_string(),
        }
    }

    /// Create a Connection error from any driver error
    pub fn connection(message: impl std::fmt::Display) -> Self {
        MigrateError::Connection(message.to_string())
    }

    /// Process exit code for this error kind.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) | MigrateError::Json(_) => {
                EXIT_CONFIG_ERROR
            }
            MigrateError::Build(_)
            | MigrateError::Generation(_)
            | MigrateError::DuplicateVersion { .. }
            | MigrateError::InvalidMigration(_) => EXIT_MIGRATION_ERROR,
            MigrateError::NotSupported { .. } => EXIT_NOT_SUPPORTED,
            MigrateError::Execution { .. } => EXIT_EXECUTION_ERROR,
            MigrateError::Connection(_) => EXIT_CONNECTION_ERROR,
            MigrateError::Io(_) => EXIT_IO_ERROR,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_error_includes_sql() {
        let err = MigrateError::execution("DROP TABLE [Foo]", "Cannot drop the table 'Foo'");
        let text = err.to_string();
        assert!(text.contains("DROP TABLE [Foo]"));
        assert!(text.contains("Cannot drop the table"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(MigrateError::Config("x".into()).exit_code(), EXIT_CONFIG_ERROR);
        assert_eq!(MigrateError::Build("x".into()).exit_code(), EXIT_MIGRATION_ERROR);
        assert_eq!(
            MigrateError::not_supported("SQLite", "sequences").exit_code(),
            EXIT_NOT_SUPPORTED
        );
        assert_eq!(
            MigrateError::execution("SELECT 1", "boom").exit_code(),
            EXIT_EXECUTION_ERROR
        );
        assert_eq!(MigrateError::connection("reset").exit_code(), EXIT_CONNECTION_ERROR);

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(MigrateError::from(io).exit_code(), EXIT_IO_ERROR);
    }

    #[test]
    fn test_format_detailed_includes_source_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "config.yaml");
        let err = MigrateError::from(io);
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: IO error"));
    }

    #[test]
    fn test_not_supported_message() {
        let err = MigrateError::not_supported("Jet", "sequences");
        assert_eq!(err.to_string(), "Jet does not support sequences");
    }
}
