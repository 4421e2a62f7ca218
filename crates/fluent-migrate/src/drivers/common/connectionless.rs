//! Processor that records SQL instead of executing it.
//!
//! Every statement is kept in order so the run can be written out as a
//! script. Existence queries answer `false` and reads return no rows, so a
//! run behaves as if against an empty database.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;

use crate::core::traits::{Generator, Processor, ProcessorOptions};
use crate::core::value::{DataSet, SqlValue};
use crate::error::Result;

pub struct ConnectionlessProcessor {
    generator: Box<dyn Generator>,
    options: ProcessorOptions,
    statements: Mutex<Vec<String>>,
}

impl ConnectionlessProcessor {
    pub fn new(generator: Box<dyn Generator>, options: ProcessorOptions) -> Self {
        Self {
            generator,
            options,
            statements: Mutex::new(Vec::new()),
        }
    }

    /// Statements recorded so far, in execution order.
    pub fn statements(&self) -> Vec<String> {
        self.statements
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// The recorded statements as one script, each statement terminated.
    pub fn script(&self) -> String {
        let mut script = String::new();
        for sql in self.statements() {
            let sql = sql.trim_end();
            script.push_str(sql);
            if !sql.ends_with(';') && !crate::core::traits::is_comment_only(sql) {
                script.push(';');
            }
            script.push('\n');
        }
        script
    }

    /// Write the script to `path`.
    pub fn write_script(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.script())?;
        info!("Wrote migration script to {}", path.display());
        Ok(())
    }

    fn record(&self, sql: &str) {
        if let Ok(mut statements) = self.statements.lock() {
            statements.push(sql.to_string());
        }
    }
}

#[async_trait]
impl Processor for ConnectionlessProcessor {
    fn database_type(&self) -> &str {
        self.generator.dialect()
    }

    fn options(&self) -> &ProcessorOptions {
        &self.options
    }

    fn generator(&self) -> &dyn Generator {
        self.generator.as_ref()
    }

    fn supports_transactional_ddl(&self) -> bool {
        false
    }

    async fn execute_raw(&self, sql: &str) -> Result<()> {
        self.record(sql);
        Ok(())
    }

    /// Comment-only statements are kept so annotated skips reach the script.
    async fn execute(&self, sql: &str) -> Result<()> {
        info!(preview = true, "{}", sql);
        self.record(sql);
        Ok(())
    }

    async fn read(&self, _sql: &str) -> Result<DataSet> {
        Ok(DataSet::default())
    }

    async fn schema_exists(&self, _schema: &str) -> Result<bool> {
        Ok(false)
    }

    async fn table_exists(&self, _schema: Option<&str>, _table: &str) -> Result<bool> {
        Ok(false)
    }

    async fn column_exists(&self, _schema: Option<&str>, _table: &str, _column: &str) -> Result<bool> {
        Ok(false)
    }

    async fn constraint_exists(
        &self,
        _schema: Option<&str>,
        _table: &str,
        _constraint: &str,
    ) -> Result<bool> {
        Ok(false)
    }

    async fn index_exists(&self, _schema: Option<&str>, _table: &str, _index: &str) -> Result<bool> {
        Ok(false)
    }

    async fn sequence_exists(&self, _schema: Option<&str>, _sequence: &str) -> Result<bool> {
        Ok(false)
    }

    async fn default_value_exists(
        &self,
        _schema: Option<&str>,
        _table: &str,
        _column: &str,
        _default_value: &SqlValue,
    ) -> Result<bool> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::expression::{DeleteTableExpression, MigrationExpression};
    use crate::core::traits::{process, CompatibilityMode};
    use crate::drivers::jet::JetGenerator;

    fn processor(mode: CompatibilityMode) -> ConnectionlessProcessor {
        ConnectionlessProcessor::new(Box::new(JetGenerator::new(mode)), ProcessorOptions::default())
    }

    #[tokio::test]
    async fn test_records_statements_in_order() {
        let p = processor(CompatibilityMode::Strict);
        p.execute("CREATE TABLE [A] ([Id] INTEGER)").await.unwrap();
        p.execute("CREATE TABLE [B] ([Id] INTEGER);").await.unwrap();
        assert_eq!(p.statements().len(), 2);
        assert_eq!(
            p.script(),
            "CREATE TABLE [A] ([Id] INTEGER);\nCREATE TABLE [B] ([Id] INTEGER);\n"
        );
    }

    #[tokio::test]
    async fn test_existence_queries_are_false() {
        let p = processor(CompatibilityMode::Strict);
        assert!(!p.table_exists(None, "VersionInfo").await.unwrap());
        assert!(p.read("SELECT 1").await.unwrap().is_empty());
        assert_eq!(p.database_type(), "Jet");
        assert!(!p.supports_transactional_ddl());
    }

    #[tokio::test]
    async fn test_annotated_skip_reaches_script() {
        let p = processor(CompatibilityMode::Annotate);
        let expr = MigrationExpression::DeleteTable(DeleteTableExpression {
            schema_name: None,
            table_name: "Old".into(),
            if_exists: true,
        });
        process(&p, &expr).await.unwrap();
        assert_eq!(
            p.script(),
            "-- Jet does not support DROP TABLE IF EXISTS; skipped\n"
        );
    }

    #[test]
    fn test_answers_to_every_catalog_alias() {
        use crate::core::catalog::DriverCatalog;

        let catalog = DriverCatalog::with_builtins();
        for name in catalog.names() {
            let p = catalog
                .connectionless(&name, ProcessorOptions::default(), CompatibilityMode::Strict)
                .unwrap();
            assert!(p.matches_database(&name));
            for alias in p.generator().aliases() {
                assert_eq!(catalog.normalize_db_type(alias).unwrap(), name);
                assert!(p.matches_database(alias), "{} should answer to {}", name, alias);
            }
        }
        let postgres = catalog
            .connectionless("pg", ProcessorOptions::default(), CompatibilityMode::Strict)
            .unwrap();
        assert!(postgres.matches_database("PostgreSQL"));
        assert!(!postgres.matches_database("SqlServer"));
    }

    #[tokio::test]
    async fn test_write_script() {
        let p = processor(CompatibilityMode::Strict);
        p.execute("DROP TABLE [A]").await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.sql");
        p.write_script(&path).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "DROP TABLE [A];\n");
    }
}
