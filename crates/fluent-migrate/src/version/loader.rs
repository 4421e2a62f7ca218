//! Reads and writes the version table through the active processor.
//!
//! Nothing is cached: the applied set is queried on every call so two runs
//! against the same database never act on stale state.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::core::expression::*;
use crate::core::schema::{
    ColumnDefinition, DbType, Direction, IndexColumn, IndexDefinition, TableDefinition,
};
use crate::core::traits::{process, Processor};
use crate::core::value::SqlValue;
use crate::error::{MigrateError, Result};

use super::VersionTableMetadata;

const DESCRIPTION_SIZE: u32 = 1024;

/// One row of the version table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedVersion {
    pub version: i64,
    pub applied_on: Option<NaiveDateTime>,
    pub description: Option<String>,
}

pub struct VersionLoader {
    processor: Arc<dyn Processor>,
    metadata: VersionTableMetadata,
}

impl VersionLoader {
    pub fn new(processor: Arc<dyn Processor>, metadata: VersionTableMetadata) -> Self {
        Self {
            processor,
            metadata,
        }
    }

    pub fn metadata(&self) -> &VersionTableMetadata {
        &self.metadata
    }

    /// Create the schema, table and unique index if missing, and add any
    /// column an older table lacks.
    pub async fn ensure_table(&self) -> Result<()> {
        for expression in self.setup_expressions().await? {
            process(self.processor.as_ref(), &expression).await?;
        }
        Ok(())
    }

    /// Expressions `ensure_table` would run against the current database.
    pub async fn setup_expressions(&self) -> Result<Vec<MigrationExpression>> {
        let m = &self.metadata;
        let p = self.processor.as_ref();
        let schema = m.schema();
        let mut expressions = Vec::new();

        if let Some(schema) = schema {
            if m.owns_schema && !p.schema_exists(schema).await? {
                debug!("Version schema {} missing", schema);
                expressions.push(MigrationExpression::CreateSchema(CreateSchemaExpression {
                    schema_name: schema.to_string(),
                }));
            }
        }

        if !p.table_exists(schema, &m.table_name).await? {
            info!("Creating version table {}", m.table_name);
            expressions.push(self.create_table());
            if !m.use_primary_key {
                expressions.push(self.create_unique_index());
            }
            return Ok(expressions);
        }

        for column in [self.applied_on_column(), self.description_column()] {
            if !p.column_exists(schema, &m.table_name, &column.name).await? {
                info!("Adding {} to version table {}", column.name, m.table_name);
                expressions.push(MigrationExpression::CreateColumn(CreateColumnExpression {
                    schema_name: m.schema_name.clone(),
                    table_name: m.table_name.clone(),
                    column,
                }));
            }
        }
        Ok(expressions)
    }

    fn version_column(&self) -> ColumnDefinition {
        let mut column = self.column(&self.metadata.column_name, DbType::Int64);
        column.is_nullable = Some(false);
        column.is_primary_key = self.metadata.use_primary_key;
        column
    }

    fn applied_on_column(&self) -> ColumnDefinition {
        let mut column = self.column(&self.metadata.applied_on_column_name, DbType::DateTime);
        column.is_nullable = Some(true);
        column
    }

    fn description_column(&self) -> ColumnDefinition {
        let mut column = self.column(&self.metadata.description_column_name, DbType::String);
        column.size = Some(DESCRIPTION_SIZE);
        column.is_nullable = Some(true);
        column
    }

    fn column(&self, name: &str, db_type: DbType) -> ColumnDefinition {
        let mut column = ColumnDefinition::new(name);
        column.table_name = self.metadata.table_name.clone();
        column.db_type = Some(db_type);
        column
    }

    fn create_table(&self) -> MigrationExpression {
        MigrationExpression::CreateTable(CreateTableExpression {
            table: TableDefinition {
                schema_name: self.metadata.schema_name.clone(),
                name: self.metadata.table_name.clone(),
                columns: vec![
                    self.version_column(),
                    self.applied_on_column(),
                    self.description_column(),
                ],
            },
        })
    }

    fn create_unique_index(&self) -> MigrationExpression {
        MigrationExpression::CreateIndex(CreateIndexExpression {
            index: IndexDefinition {
                name: Some(self.metadata.unique_index_name.clone()),
                schema_name: self.metadata.schema_name.clone(),
                table_name: self.metadata.table_name.clone(),
                columns: vec![IndexColumn {
                    name: self.metadata.column_name.clone(),
                    direction: Direction::Ascending,
                }],
                is_unique: true,
                ..Default::default()
            },
        })
    }

    /// Every recorded row, ordered by version. Empty when the table does
    /// not exist yet.
    pub async fn applied(&self) -> Result<Vec<AppliedVersion>> {
        let m = &self.metadata;
        let p = self.processor.as_ref();
        if !p.table_exists(m.schema(), &m.table_name).await? {
            return Ok(Vec::new());
        }

        let q = p.generator().quoter();
        let sql = format!(
            "SELECT {}, {}, {} FROM {} ORDER BY {}",
            q.quote_column_name(&m.column_name),
            q.quote_column_name(&m.applied_on_column_name),
            q.quote_column_name(&m.description_column_name),
            q.quote_table_name(&m.table_name, m.schema()),
            q.quote_column_name(&m.column_name),
        );
        let data = p.read(&sql).await?;

        let mut applied = Vec::with_capacity(data.len());
        for row in 0..data.len() {
            let version = data
                .get(row, &m.column_name)
                .and_then(SqlValue::as_i64)
                .ok_or_else(|| {
                    MigrateError::InvalidMigration(format!(
                        "version table {} holds a non-integer version in row {}",
                        m.table_name,
                        row + 1
                    ))
                })?;
            applied.push(AppliedVersion {
                version,
                applied_on: data
                    .get(row, &m.applied_on_column_name)
                    .and_then(SqlValue::as_datetime),
                description: data
                    .get(row, &m.description_column_name)
                    .and_then(SqlValue::as_text),
            });
        }
        Ok(applied)
    }

    pub async fn applied_versions(&self) -> Result<BTreeSet<i64>> {
        Ok(self.applied().await?.into_iter().map(|a| a.version).collect())
    }

    pub fn record_up_expression(&self, version: i64, description: &str) -> MigrationExpression {
        let m = &self.metadata;
        MigrationExpression::InsertData(InsertDataExpression {
            schema_name: m.schema_name.clone(),
            table_name: m.table_name.clone(),
            rows: vec![vec![
                (m.column_name.clone(), SqlValue::I64(version)),
                (
                    m.applied_on_column_name.clone(),
                    SqlValue::DateTime(Utc::now().naive_utc()),
                ),
                (
                    m.description_column_name.clone(),
                    SqlValue::Text(description.to_string()),
                ),
            ]],
            identity_insert: false,
        })
    }

    pub fn record_down_expression(&self, version: i64) -> MigrationExpression {
        let m = &self.metadata;
        MigrationExpression::DeleteData(DeleteDataExpression {
            schema_name: m.schema_name.clone(),
            table_name: m.table_name.clone(),
            rows: vec![vec![(m.column_name.clone(), SqlValue::I64(version))]],
            all_rows: false,
        })
    }

    /// Record `version` as applied, in the processor's current transaction.
    pub async fn record_up(&self, version: i64, description: &str) -> Result<()> {
        let expression = self.record_up_expression(version, description);
        process(self.processor.as_ref(), &expression).await?;
        Ok(())
    }

    /// Remove the row for `version`, in the processor's current transaction.
    pub async fn record_down(&self, version: i64) -> Result<()> {
        let expression = self.record_down_expression(version);
        process(self.processor.as_ref(), &expression).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::ProcessorOptions;
    use crate::drivers::{ConnectionlessProcessor, SqlServerGenerator, SqliteProcessor};

    async fn sqlite() -> Arc<dyn Processor> {
        Arc::new(
            SqliteProcessor::in_memory(ProcessorOptions::default())
                .await
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_ensure_table_then_record() {
        let processor = sqlite().await;
        let loader = VersionLoader::new(processor.clone(), VersionTableMetadata::default());
        loader.ensure_table().await.unwrap();
        assert!(processor.table_exists(None, "VersionInfo").await.unwrap());
        assert!(processor
            .index_exists(None, "VersionInfo", "UC_Version")
            .await
            .unwrap());

        loader.record_up(2, "second").await.unwrap();
        loader.record_up(1, "first").await.unwrap();
        let applied = loader.applied().await.unwrap();
        assert_eq!(applied.len(), 2);
        assert_eq!(applied[0].version, 1);
        assert_eq!(applied[0].description.as_deref(), Some("first"));
        assert!(applied[0].applied_on.is_some());

        loader.record_down(1).await.unwrap();
        assert_eq!(
            loader.applied_versions().await.unwrap().into_iter().collect::<Vec<_>>(),
            vec![2]
        );
    }

    #[tokio::test]
    async fn test_ensure_table_is_idempotent() {
        let processor = sqlite().await;
        let loader = VersionLoader::new(processor, VersionTableMetadata::default());
        loader.ensure_table().await.unwrap();
        assert!(loader.setup_expressions().await.unwrap().is_empty());
        loader.ensure_table().await.unwrap();
    }

    #[tokio::test]
    async fn test_upgrades_table_missing_columns() {
        let processor = sqlite().await;
        processor
            .execute_raw("CREATE TABLE \"VersionInfo\" (\"Version\" INTEGER NOT NULL)")
            .await
            .unwrap();
        let loader = VersionLoader::new(processor.clone(), VersionTableMetadata::default());
        let kinds: Vec<_> = loader
            .setup_expressions()
            .await
            .unwrap()
            .iter()
            .map(|e| e.kind())
            .collect();
        assert_eq!(kinds, vec!["CreateColumn", "CreateColumn"]);

        loader.ensure_table().await.unwrap();
        assert!(processor
            .column_exists(None, "VersionInfo", "Description")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_connectionless_scripts_table_creation() {
        let processor = Arc::new(ConnectionlessProcessor::new(
            Box::new(SqlServerGenerator::default()),
            ProcessorOptions::default(),
        ));
        let metadata = VersionTableMetadata {
            schema_name: Some("meta".into()),
            ..Default::default()
        };
        let loader = VersionLoader::new(processor.clone(), metadata);
        loader.ensure_table().await.unwrap();
        assert!(loader.applied().await.unwrap().is_empty());

        let statements = processor.statements();
        assert_eq!(statements.len(), 3);
        assert!(statements[0].starts_with("CREATE SCHEMA [meta]"));
        assert!(statements[1].starts_with("CREATE TABLE [meta].[VersionInfo]"));
        assert!(statements[2].contains("UNIQUE"));
    }

    #[test]
    fn test_record_down_targets_single_version() {
        let processor: Arc<dyn Processor> = Arc::new(ConnectionlessProcessor::new(
            Box::new(SqlServerGenerator::default()),
            ProcessorOptions::default(),
        ));
        let loader = VersionLoader::new(processor.clone(), VersionTableMetadata::default());
        let sql = processor
            .generator()
            .generate(&loader.record_down_expression(42))
            .unwrap();
        assert_eq!(sql, vec!["DELETE FROM [VersionInfo] WHERE [Version] = 42"]);
    }
}
