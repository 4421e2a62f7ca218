//! Driver catalog for explicit dependency injection.
//!
//! The [`DriverCatalog`] maps database type identifiers to generators and
//! connectors. It is constructed explicitly and passed to whoever needs it
//! rather than living in a global registry.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::drivers::{
    ConnectionlessProcessor, JetGenerator, PostgresGenerator, PostgresProcessor,
    SqlServerGenerator, SqlServerProcessor, SqliteGenerator, SqliteProcessor, JET, JET_ALIASES,
    POSTGRES, POSTGRES_ALIASES, SQLITE, SQLITE_ALIASES, SQLSERVER, SQLSERVER_ALIASES,
};
use crate::error::{MigrateError, Result};

use super::traits::{CompatibilityMode, Generator, Processor, ProcessorOptions};

/// Builds a generator for one compatibility mode.
pub type GeneratorFactory = fn(CompatibilityMode) -> Box<dyn Generator>;

/// Registry of dialects by canonical name, with alias lookup.
pub struct DriverCatalog {
    generators: HashMap<String, GeneratorFactory>,
    aliases: HashMap<String, String>,
}

impl DriverCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self {
            generators: HashMap::new(),
            aliases: HashMap::new(),
        }
    }

    /// Create a catalog with every built-in dialect registered.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        catalog.register(SQLSERVER, SQLSERVER_ALIASES, sqlserver);
        catalog.register(POSTGRES, POSTGRES_ALIASES, postgres);
        catalog.register(SQLITE, SQLITE_ALIASES, sqlite);
        catalog.register(JET, JET_ALIASES, jet);
        catalog
    }

    /// Register a dialect under its canonical name and aliases.
    pub fn register(&mut self, name: &str, aliases: &[&str], factory: GeneratorFactory) {
        self.generators.insert(name.to_string(), factory);
        self.aliases.insert(name.to_lowercase(), name.to_string());
        for alias in aliases {
            self.aliases.insert(alias.to_lowercase(), name.to_string());
        }
    }

    /// Canonical name for a database type identifier, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `MigrateError::Config` for an unknown identifier.
    pub fn normalize_db_type(&self, db_type: &str) -> Result<String> {
        self.aliases
            .get(&db_type.trim().to_lowercase())
            .cloned()
            .ok_or_else(|| {
                MigrateError::Config(format!(
                    "Unknown database type: '{}'. Supported types: {}",
                    db_type,
                    self.names().join(", ")
                ))
            })
    }

    /// Registered canonical names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.generators.keys().cloned().collect();
        names.sort();
        names
    }

    /// Generator for a database type identifier.
    pub fn generator(&self, db_type: &str, mode: CompatibilityMode) -> Result<Box<dyn Generator>> {
        let name = self.normalize_db_type(db_type)?;
        self.generators
            .get(&name)
            .map(|factory| factory(mode))
            .ok_or_else(|| MigrateError::Config(format!("no generator registered for {}", name)))
    }

    /// Open a processor for `db_type`.
    ///
    /// With `no_connection`, or for dialects without a live driver (Jet),
    /// the statements are recorded by a [`ConnectionlessProcessor`] instead.
    pub async fn connect(
        &self,
        db_type: &str,
        connection: &str,
        options: ProcessorOptions,
        mode: CompatibilityMode,
        no_connection: bool,
    ) -> Result<Arc<dyn Processor>> {
        let name = self.normalize_db_type(db_type)?;
        if no_connection || name == JET {
            info!("Using connectionless processor for {}", name);
            return Ok(Arc::new(self.connectionless(&name, options, mode)?));
        }
        let processor: Arc<dyn Processor> = match name.as_str() {
            SQLSERVER => Arc::new(
                SqlServerProcessor::connect(connection, SqlServerGenerator::new(mode), options)
                    .await?,
            ),
            POSTGRES => Arc::new(
                PostgresProcessor::connect(connection, PostgresGenerator::new(mode), options)
                    .await?,
            ),
            SQLITE => Arc::new(
                SqliteProcessor::connect(connection, SqliteGenerator::new(mode), options).await?,
            ),
            other => {
                return Err(MigrateError::Config(format!(
                    "no connector registered for {}",
                    other
                )))
            }
        };
        Ok(processor)
    }

    /// Connectionless processor recording SQL for `db_type`.
    pub fn connectionless(
        &self,
        db_type: &str,
        options: ProcessorOptions,
        mode: CompatibilityMode,
    ) -> Result<ConnectionlessProcessor> {
        Ok(ConnectionlessProcessor::new(self.generator(db_type, mode)?, options))
    }
}

fn sqlserver(mode: CompatibilityMode) -> Box<dyn Generator> {
    Box::new(SqlServerGenerator::new(mode))
}

fn postgres(mode: CompatibilityMode) -> Box<dyn Generator> {
    Box::new(PostgresGenerator::new(mode))
}

fn sqlite(mode: CompatibilityMode) -> Box<dyn Generator> {
    Box::new(SqliteGenerator::new(mode))
}

fn jet(mode: CompatibilityMode) -> Box<dyn Generator> {
    Box::new(JetGenerator::new(mode))
}

impl Default for DriverCatalog {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Alias normalization
    // =========================================================================

    #[test]
    fn test_normalize_aliases() {
        let catalog = DriverCatalog::with_builtins();
        for alias in ["sqlserver", "MSSQL", "sql_server", "SqlServer2016"] {
            assert_eq!(catalog.normalize_db_type(alias).unwrap(), SQLSERVER);
        }
        for alias in ["postgres", "PostgreSQL", "pg"] {
            assert_eq!(catalog.normalize_db_type(alias).unwrap(), POSTGRES);
        }
        for alias in ["sqlite", "sqlite3"] {
            assert_eq!(catalog.normalize_db_type(alias).unwrap(), SQLITE);
        }
        for alias in ["jet", "Access"] {
            assert_eq!(catalog.normalize_db_type(alias).unwrap(), JET);
        }
    }

    #[test]
    fn test_unknown_type_is_config_error() {
        let err = DriverCatalog::with_builtins()
            .normalize_db_type("oracle")
            .unwrap_err();
        assert!(matches!(err, MigrateError::Config(_)));
        assert!(err.to_string().contains("oracle"));
    }

    #[test]
    fn test_empty_catalog_knows_nothing() {
        assert!(DriverCatalog::new().generator("sqlite", CompatibilityMode::Strict).is_err());
    }

    // =========================================================================
    // Factories
    // =========================================================================

    #[test]
    fn test_generator_carries_mode() {
        let g = DriverCatalog::with_builtins()
            .generator("pg", CompatibilityMode::Annotate)
            .unwrap();
        assert_eq!(g.dialect(), POSTGRES);
        assert_eq!(g.compatibility_mode(), CompatibilityMode::Annotate);
    }

    #[tokio::test]
    async fn test_jet_is_always_connectionless() {
        let p = DriverCatalog::with_builtins()
            .connect(
                "access",
                "",
                ProcessorOptions::default(),
                CompatibilityMode::Strict,
                false,
            )
            .await
            .unwrap();
        assert_eq!(p.database_type(), JET);
        assert!(!p.supports_transactional_ddl());
    }

    #[tokio::test]
    async fn test_connect_sqlite_in_memory() {
        let p = DriverCatalog::with_builtins()
            .connect(
                "sqlite",
                ":memory:",
                ProcessorOptions::default(),
                CompatibilityMode::Strict,
                false,
            )
            .await
            .unwrap();
        assert_eq!(p.database_type(), SQLITE);
        assert!(p.supports_transactional_ddl());
    }
}
