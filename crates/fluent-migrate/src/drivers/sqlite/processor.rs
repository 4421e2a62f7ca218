//! SQLite processor on sqlx.
//!
//! A single `SqliteConnection` is held for the run; in-memory databases live
//! exactly as long as it does.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Column, ConnectOptions, Row, TypeInfo, ValueRef};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::dialect::{SqliteGenerator, SqliteQuoter, SQLITE};
use crate::core::traits::{Generator, Processor, ProcessorOptions, Quoter};
use crate::core::value::{DataSet, SqlValue};
use crate::error::{MigrateError, Result};

/// SQLite processor.
pub struct SqliteProcessor {
    conn: Mutex<SqliteConnection>,
    generator: SqliteGenerator,
    options: ProcessorOptions,
}

impl SqliteProcessor {
    /// Open a database from a `sqlite:` URL or a file path.
    ///
    /// `:memory:` opens a private in-memory database.
    pub async fn connect(
        connection: &str,
        generator: SqliteGenerator,
        options: ProcessorOptions,
    ) -> Result<Self> {
        let url = if connection.starts_with("sqlite:") {
            connection.to_string()
        } else {
            format!("sqlite:{}", connection)
        };
        let connect_options = SqliteConnectOptions::from_str(&url)
            .map_err(|e| MigrateError::Config(format!("invalid SQLite connection string: {}", e)))?
            .create_if_missing(true)
            .foreign_keys(true);
        let conn = connect_options
            .connect()
            .await
            .map_err(MigrateError::connection)?;
        info!("Opened SQLite database {}", connection);
        Ok(Self {
            conn: Mutex::new(conn),
            generator,
            options,
        })
    }

    /// In-memory database, used heavily by tests.
    pub async fn in_memory(options: ProcessorOptions) -> Result<Self> {
        Self::connect(":memory:", SqliteGenerator::default(), options).await
    }

    async fn probe(&self, sql: &str) -> Result<bool> {
        let mut conn = self.conn.lock().await;
        match sqlx::query(sql).fetch_optional(&mut *conn).await {
            Ok(row) => Ok(row.is_some()),
            Err(e) if is_not_found(&e) => {
                debug!("existence query found nothing: {}", e);
                Ok(false)
            }
            Err(e) => Err(classify(sql, e)),
        }
    }

    fn literal(&self, value: &str) -> String {
        SqliteQuoter.format_string(value)
    }

    /// `sqlite_master` of the attached database named `schema`, or of `main`.
    fn master(&self, schema: Option<&str>) -> String {
        match schema.filter(|s| !s.is_empty()) {
            Some(s) => format!("{}.sqlite_master", SqliteQuoter.quote_schema_name(s)),
            None => "sqlite_master".to_string(),
        }
    }
}

#[async_trait]
impl Processor for SqliteProcessor {
    fn database_type(&self) -> &str {
        SQLITE
    }

    fn options(&self) -> &ProcessorOptions {
        &self.options
    }

    fn generator(&self) -> &dyn Generator {
        &self.generator
    }

    fn supports_transactional_ddl(&self) -> bool {
        true
    }

    async fn execute_raw(&self, sql: &str) -> Result<()> {
        let mut conn = self.conn.lock().await;
        sqlx::Executor::execute(&mut *conn, sqlx::raw_sql(sql))
            .await
            .map_err(|e| classify(sql, e))?;
        Ok(())
    }

    async fn read(&self, sql: &str) -> Result<DataSet> {
        let mut conn = self.conn.lock().await;
        let rows = sqlx::query(sql)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| classify(sql, e))?;
        Ok(rows_to_data_set(&rows))
    }

    async fn exists(&self, sql: &str) -> Result<bool> {
        self.probe(sql).await
    }

    /// Schemas are attached databases.
    async fn schema_exists(&self, schema: &str) -> Result<bool> {
        self.probe(&format!(
            "SELECT 1 FROM pragma_database_list WHERE name = {}",
            self.literal(schema)
        ))
        .await
    }

    async fn table_exists(&self, schema: Option<&str>, table: &str) -> Result<bool> {
        self.probe(&format!(
            "SELECT 1 FROM {} WHERE type = 'table' AND name = {}",
            self.master(schema),
            self.literal(table)
        ))
        .await
    }

    async fn column_exists(&self, _schema: Option<&str>, table: &str, column: &str) -> Result<bool> {
        self.probe(&format!(
            "SELECT 1 FROM pragma_table_info({}) WHERE name = {}",
            self.literal(table),
            self.literal(column)
        ))
        .await
    }

    /// Constraints are matched against the table definition text.
    async fn constraint_exists(
        &self,
        schema: Option<&str>,
        table: &str,
        constraint: &str,
    ) -> Result<bool> {
        let pattern = format!("%CONSTRAINT {}%", SqliteQuoter.quote_identifier(constraint));
        if self
            .probe(&format!(
                "SELECT 1 FROM {} WHERE type = 'table' AND name = {} AND sql LIKE {}",
                self.master(schema),
                self.literal(table),
                self.literal(&pattern)
            ))
            .await?
        {
            return Ok(true);
        }
        self.index_exists(schema, table, constraint).await
    }

    async fn index_exists(&self, schema: Option<&str>, table: &str, index: &str) -> Result<bool> {
        self.probe(&format!(
            "SELECT 1 FROM {} WHERE type = 'index' AND tbl_name = {} AND name = {}",
            self.master(schema),
            self.literal(table),
            self.literal(index)
        ))
        .await
    }

    async fn sequence_exists(&self, _schema: Option<&str>, _sequence: &str) -> Result<bool> {
        Ok(false)
    }

    async fn default_value_exists(
        &self,
        _schema: Option<&str>,
        table: &str,
        column: &str,
        default_value: &SqlValue,
    ) -> Result<bool> {
        let rendered = SqliteQuoter.quote_value(default_value)?;
        self.probe(&format!(
            "SELECT 1 FROM pragma_table_info({}) WHERE name = {} AND dflt_value = {}",
            self.literal(table),
            self.literal(column),
            self.literal(&rendered)
        ))
        .await
    }
}

fn is_not_found(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.message().starts_with("no such table"))
}

/// Database errors are statement failures; everything else is transport.
fn classify(sql: &str, e: sqlx::Error) -> MigrateError {
    match e {
        sqlx::Error::Database(db) => MigrateError::execution(sql, db.message()),
        other => MigrateError::connection(other),
    }
}

fn rows_to_data_set(rows: &[SqliteRow]) -> DataSet {
    let columns = rows
        .first()
        .map(|r| r.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();
    let rows = rows
        .iter()
        .map(|row| (0..row.columns().len()).map(|i| cell_value(row, i)).collect())
        .collect();
    DataSet { columns, rows }
}

/// Convert by the value's runtime storage class.
fn cell_value(row: &SqliteRow, idx: usize) -> SqlValue {
    let storage = match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return SqlValue::Null,
        Ok(raw) => raw.type_info().name().to_uppercase(),
        Err(_) => return SqlValue::Null,
    };
    match storage.as_str() {
        "INTEGER" | "BOOLEAN" => row
            .try_get::<i64, _>(idx)
            .map(SqlValue::I64)
            .unwrap_or(SqlValue::Null),
        "REAL" | "NUMERIC" => row
            .try_get::<f64, _>(idx)
            .map(SqlValue::F64)
            .unwrap_or(SqlValue::Null),
        "BLOB" => row
            .try_get::<Vec<u8>, _>(idx)
            .map(SqlValue::Bytes)
            .unwrap_or(SqlValue::Null),
        _ => row
            .try_get::<String, _>(idx)
            .map(SqlValue::Text)
            .unwrap_or(SqlValue::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::process;

    async fn processor() -> SqliteProcessor {
        SqliteProcessor::in_memory(ProcessorOptions::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_execute_and_read() {
        let p = processor().await;
        p.execute("CREATE TABLE \"T\" (\"Id\" INTEGER NOT NULL, \"Name\" TEXT)")
            .await
            .unwrap();
        p.execute("INSERT INTO \"T\" (\"Id\", \"Name\") VALUES (1, 'a')")
            .await
            .unwrap();
        let data = p.read("SELECT \"Id\", \"Name\" FROM \"T\"").await.unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data.get(0, "id"), Some(&SqlValue::I64(1)));
        assert_eq!(data.get(0, "Name"), Some(&SqlValue::Text("a".into())));
    }

    #[tokio::test]
    async fn test_schema_queries() {
        let p = processor().await;
        p.execute("CREATE TABLE \"Users\" (\"Id\" INTEGER NOT NULL, \"Email\" TEXT DEFAULT 'none')")
            .await
            .unwrap();
        p.execute("CREATE UNIQUE INDEX \"IX_Users_Email\" ON \"Users\" (\"Email\")")
            .await
            .unwrap();
        assert!(p.table_exists(None, "Users").await.unwrap());
        assert!(!p.table_exists(None, "Missing").await.unwrap());
        assert!(p.column_exists(None, "Users", "Email").await.unwrap());
        assert!(!p.column_exists(None, "Users", "Nope").await.unwrap());
        assert!(p.index_exists(None, "Users", "IX_Users_Email").await.unwrap());
        assert!(p.constraint_exists(None, "Users", "IX_Users_Email").await.unwrap());
        assert!(p.schema_exists("main").await.unwrap());
        assert!(p
            .default_value_exists(None, "Users", "Email", &SqlValue::from("none"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_missing_table_probe_is_false() {
        let p = processor().await;
        assert!(!p.exists("SELECT 1 FROM \"Missing\"").await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_statement_carries_sql() {
        let p = processor().await;
        let err = p.execute("CREATE TABLE (").await.unwrap_err();
        match err {
            MigrateError::Execution { sql, .. } => assert_eq!(sql, "CREATE TABLE ("),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_preview_does_not_execute() {
        let p = SqliteProcessor::in_memory(ProcessorOptions {
            preview_only: true,
            ..Default::default()
        })
        .await
        .unwrap();
        p.execute("CREATE TABLE \"T\" (\"Id\" INTEGER)").await.unwrap();
        assert!(!p.table_exists(None, "T").await.unwrap());
    }

    #[tokio::test]
    async fn test_rollback_discards_changes() {
        let p = processor().await;
        p.begin_transaction().await.unwrap();
        p.execute("CREATE TABLE \"T\" (\"Id\" INTEGER)").await.unwrap();
        p.rollback_transaction().await.unwrap();
        assert!(!p.table_exists(None, "T").await.unwrap());
    }

    #[tokio::test]
    async fn test_process_expression() {
        use crate::core::expression::{CreateSchemaExpression, MigrationExpression};
        let p = processor().await;
        let err = process(
            &p,
            &MigrationExpression::CreateSchema(CreateSchemaExpression {
                schema_name: "audit".into(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MigrateError::NotSupported { .. }));
    }
}
