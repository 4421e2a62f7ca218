//! # fluent-migrate
//!
//! Versioned database schema migrations with a dialect-aware SQL generator.
//!
//! Migrations describe schema and data changes through fluent builders.
//! Each change becomes a structured expression; a per-dialect generator
//! renders it as SQL and a processor executes it. The runner applies
//! pending migrations in version order and records each one in a version
//! table, in the same transaction when the database supports
//! transactional DDL.
//!
//! - **Dialects**: SQL Server, PostgreSQL, SQLite, Jet (script only)
//! - **Preview mode**: log SQL without executing it
//! - **Connectionless mode**: generate a complete script without a database
//! - **Per-database branches** with `if_database`
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use fluent_migrate::{
//!     ColumnOptions, Migration, MigrationContext, MigrationLoader, MigrationRunner,
//!     ProcessorOptions, RunnerOptions, SqliteProcessor,
//! };
//!
//! struct CreateUsers;
//!
//! #[async_trait]
//! impl Migration for CreateUsers {
//!     fn version(&self) -> i64 {
//!         202401150930
//!     }
//!
//!     fn description(&self) -> String {
//!         "create users".into()
//!     }
//!
//!     async fn up(&self, ctx: &mut MigrationContext) -> fluent_migrate::Result<()> {
//!         ctx.create()
//!             .table("Users")
//!             .with_column("Id").as_int32().primary_key().identity()
//!             .with_column("Email").as_string_sized(255).indexed();
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> fluent_migrate::Result<()> {
//!     let processor = SqliteProcessor::in_memory(ProcessorOptions::default()).await?;
//!     let mut loader = MigrationLoader::new();
//!     loader.add(CreateUsers);
//!     let runner = MigrationRunner::new(Arc::new(processor), loader, RunnerOptions::default());
//!     let summary = runner.migrate_up(None).await?;
//!     println!("Applied {} migrations", summary.migrations.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod dialect;
pub mod drivers;
pub mod error;
pub mod migration;
pub mod runner;
pub mod version;

// Re-exports for convenient access
pub use config::{DatabaseConfig, RunnerConfig, RunnerSection};
pub use crate::core::{
    CompatibilityMode, DriverCatalog, Generator, MigrationExpression, Processor,
    ProcessorOptions, SqlValue,
};
pub use drivers::{
    ConnectionlessProcessor, JetGenerator, PostgresGenerator, PostgresProcessor,
    SqlServerGenerator, SqlServerProcessor, SqliteGenerator, SqliteProcessor,
};
pub use error::{MigrateError, Result};
pub use migration::{
    ColumnOptions, Conventions, Migration, MigrationContext, MigrationLoader, SqlFileMigration,
    TransactionBehavior,
};
pub use runner::{
    MigrationDirection, MigrationInfo, MigrationRunner, MigrationStatus, RunSummary,
    RunnerOptions, RunnerState, TransactionMode,
};
pub use version::{VersionLoader, VersionTableMetadata};
