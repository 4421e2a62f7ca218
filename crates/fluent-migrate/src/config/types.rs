//! Configuration type definitions.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::traits::{CompatibilityMode, ProcessorOptions};
use crate::migration::Conventions;
use crate::runner::{RunnerOptions, TransactionMode};
use crate::version::VersionTableMetadata;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Target database.
    pub database: DatabaseConfig,

    /// Runner behavior.
    #[serde(default)]
    pub runner: RunnerSection,

    /// Version table layout.
    #[serde(default)]
    pub version_table: VersionTableMetadata,
}

/// Target database configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database type, e.g. "SqlServer", "postgres", "sqlite" or "jet".
    pub r#type: String,

    /// Connection string; may be empty when running without a connection.
    #[serde(default)]
    pub connection: String,

    /// Schema used when a migration names none.
    #[serde(default)]
    pub default_schema: Option<String>,

    /// Per-statement timeout in seconds.
    #[serde(default)]
    pub command_timeout_secs: Option<u64>,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("type", &self.r#type)
            .field("connection", &"[REDACTED]")
            .field("default_schema", &self.default_schema)
            .field("command_timeout_secs", &self.command_timeout_secs)
            .finish()
    }
}

/// Runner behavior configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSection {
    /// Log SQL without executing it.
    pub preview: bool,

    /// Only run migrations carrying these tags.
    pub tags: Vec<String>,

    /// Transaction scope (default: per_migration).
    pub transaction_mode: TransactionMode,

    /// Handling of operations the dialect cannot express (default: strict).
    pub compatibility: CompatibilityMode,

    /// Directory of `{version}_{description}.up.sql` / `.down.sql` files.
    pub migrations_dir: Option<PathBuf>,

    /// Generate SQL without connecting to a database.
    pub no_connection: bool,

    /// Write the generated script here when running without a connection.
    pub output_script: Option<PathBuf>,
}

impl RunnerConfig {
    /// Minimal configuration for a database type and connection string.
    pub fn new(db_type: impl Into<String>, connection: impl Into<String>) -> Self {
        Self {
            database: DatabaseConfig {
                r#type: db_type.into(),
                connection: connection.into(),
                default_schema: None,
                command_timeout_secs: None,
            },
            runner: RunnerSection::default(),
            version_table: VersionTableMetadata::default(),
        }
    }

    pub fn processor_options(&self) -> ProcessorOptions {
        ProcessorOptions {
            preview_only: self.runner.preview,
            timeout: self.database.command_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn runner_options(&self) -> RunnerOptions {
        RunnerOptions {
            tags: self.runner.tags.clone(),
            transaction_mode: self.runner.transaction_mode,
            version_table: self.version_table.clone(),
        }
    }

    pub fn compatibility_mode(&self) -> CompatibilityMode {
        self.runner.compatibility
    }

    pub fn conventions(&self) -> Conventions {
        match &self.database.default_schema {
            Some(schema) => Conventions::with_default_schema(schema.clone()),
            None => Conventions::default(),
        }
    }
}
