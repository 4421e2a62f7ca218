//! Core traits for dialect-aware SQL generation and execution.
//!
//! This module defines the primary abstractions used by the runner:
//!
//! - [`Quoter`]: identifier and literal escaping for one dialect
//! - [`TypeMap`]: semantic column type to SQL type text
//! - [`Generator`]: expression to SQL statements
//! - [`Processor`]: executes SQL against a live connection and answers schema queries
//!
//! # Design Patterns
//!
//! - **Strategy**: each dialect supplies its own quoter, type map and generator
//! - **Template Method**: default trait methods hold the shared rendering and
//!   are overridden only where a dialect differs

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::dialect::generator as base;
use crate::error::{MigrateError, Result};

use super::expression::*;
use super::identifier::{is_wrapped, unwrap, wrap};
use super::schema::{ColumnDefinition, DbType, SystemMethod};
use super::value::{DataSet, SqlValue};

// =============================================================================
// Quoter
// =============================================================================

/// Identifier and value quoting for one dialect.
///
/// Every method is a pure function of its input.
pub trait Quoter: Send + Sync {
    /// Opening identifier quote, e.g. `[` or `"`.
    fn open_quote(&self) -> &str;

    /// Closing identifier quote, e.g. `]` or `"`.
    fn close_quote(&self) -> &str;

    /// Quote an identifier. Already-quoted input is returned unchanged.
    fn quote_identifier(&self, name: &str) -> String {
        if self.is_quoted(name) {
            name.to_string()
        } else {
            wrap(name, self.open_quote(), self.close_quote())
        }
    }

    fn is_quoted(&self, name: &str) -> bool {
        is_wrapped(name, self.open_quote(), self.close_quote())
    }

    fn unquote(&self, name: &str) -> String {
        unwrap(name, self.open_quote(), self.close_quote())
    }

    /// Quote a table name, qualified with its schema when one is given.
    fn quote_table_name(&self, table: &str, schema: Option<&str>) -> String {
        match schema {
            Some(schema) if !schema.is_empty() => format!(
                "{}.{}",
                self.quote_schema_name(schema),
                self.quote_identifier(table)
            ),
            _ => self.quote_identifier(table),
        }
    }

    fn quote_schema_name(&self, schema: &str) -> String {
        self.quote_identifier(schema)
    }

    fn quote_column_name(&self, column: &str) -> String {
        self.quote_identifier(column)
    }

    /// Double embedded single quotes.
    fn format_sql_escape(&self, value: &str) -> String {
        value.replace('\'', "''")
    }

    fn format_string(&self, value: &str) -> String {
        format!("'{}'", self.format_sql_escape(value))
    }

    fn format_bool(&self, value: bool) -> String {
        if value { "1" } else { "0" }.to_string()
    }

    fn format_date_time(&self, value: NaiveDateTime) -> String {
        format!("'{}'", value.format("%Y-%m-%dT%H:%M:%S"))
    }

    fn format_date_time_offset(&self, value: DateTime<FixedOffset>) -> String {
        format!("'{}'", value.format("%Y-%m-%dT%H:%M:%S%:z"))
    }

    fn format_date(&self, value: NaiveDate) -> String {
        format!("'{}'", value.format("%Y-%m-%d"))
    }

    fn format_time(&self, value: NaiveTime) -> String {
        format!("'{}'", value.format("%H:%M:%S"))
    }

    fn format_guid(&self, value: Uuid) -> String {
        format!("'{}'", value)
    }

    fn format_bytes(&self, value: &[u8]) -> String {
        format!("0x{}", hex::encode_upper(value))
    }

    /// Render a server-side function.
    ///
    /// # Errors
    ///
    /// Returns `MigrateError::NotSupported` when the dialect has no equivalent.
    fn format_system_method(&self, method: SystemMethod) -> Result<String>;

    /// Render a literal value.
    fn quote_value(&self, value: &SqlValue) -> Result<String> {
        Ok(match value {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Bool(v) => self.format_bool(*v),
            SqlValue::I16(v) => v.to_string(),
            SqlValue::I32(v) => v.to_string(),
            SqlValue::I64(v) => v.to_string(),
            SqlValue::F32(v) => v.to_string(),
            SqlValue::F64(v) => v.to_string(),
            SqlValue::Decimal(v) => v.to_string(),
            SqlValue::Text(v) => self.format_string(v),
            SqlValue::Bytes(v) => self.format_bytes(v),
            SqlValue::Uuid(v) => self.format_guid(*v),
            SqlValue::DateTime(v) => self.format_date_time(*v),
            SqlValue::DateTimeOffset(v) => self.format_date_time_offset(*v),
            SqlValue::Date(v) => self.format_date(*v),
            SqlValue::Time(v) => self.format_time(*v),
            SqlValue::Method(m) => self.format_system_method(*m)?,
            SqlValue::Raw(sql) => sql.clone(),
        })
    }
}

// =============================================================================
// TypeMap
// =============================================================================

/// Semantic type to SQL type text for one dialect.
pub trait TypeMap: Send + Sync {
    /// Type text for `db_type`, with `$size` and `$precision` substituted.
    ///
    /// # Errors
    ///
    /// Returns `MigrateError::NotSupported` when the type (or the requested
    /// size) has no mapping.
    fn get_type_map(&self, db_type: DbType, size: Option<u32>, precision: Option<u32>)
        -> Result<String>;
}

// =============================================================================
// Generator
// =============================================================================

/// Policy for operations a dialect cannot express.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompatibilityMode {
    /// Fail with `NotSupported`.
    #[default]
    Strict,
    /// Skip silently.
    Loose,
    /// Emit a SQL comment describing what was skipped.
    Annotate,
}

/// Renders migration expressions as SQL for one dialect.
///
/// Generation is pure: no method touches a connection. Each method returns
/// the ordered statements for the expression; an empty list means nothing
/// to execute.
pub trait Generator: Send + Sync {
    /// Canonical dialect name, e.g. `SqlServer`.
    fn dialect(&self) -> &str;

    /// Other identifiers that name this dialect.
    fn aliases(&self) -> &[&str] {
        &[]
    }

    fn quoter(&self) -> &dyn Quoter;

    fn type_map(&self) -> &dyn TypeMap;

    fn compatibility_mode(&self) -> CompatibilityMode;

    /// Render any expression.
    fn generate(&self, expression: &MigrationExpression) -> Result<Vec<String>> {
        match expression {
            MigrationExpression::CreateTable(e) => self.create_table(e),
            MigrationExpression::AlterTable(_) => Ok(Vec::new()),
            MigrationExpression::DeleteTable(e) => self.delete_table(e),
            MigrationExpression::RenameTable(e) => self.rename_table(e),
            MigrationExpression::CreateColumn(e) => self.create_column(e),
            MigrationExpression::AlterColumn(e) => self.alter_column(e),
            MigrationExpression::DeleteColumn(e) => self.delete_column(e),
            MigrationExpression::RenameColumn(e) => self.rename_column(e),
            MigrationExpression::CreateIndex(e) => self.create_index(e),
            MigrationExpression::DeleteIndex(e) => self.delete_index(e),
            MigrationExpression::CreateForeignKey(e) => self.create_foreign_key(e),
            MigrationExpression::DeleteForeignKey(e) => self.delete_foreign_key(e),
            MigrationExpression::CreateConstraint(e) => self.create_constraint(e),
            MigrationExpression::DeleteConstraint(e) => self.delete_constraint(e),
            MigrationExpression::CreateSequence(e) => self.create_sequence(e),
            MigrationExpression::DeleteSequence(e) => self.delete_sequence(e),
            MigrationExpression::CreateSchema(e) => self.create_schema(e),
            MigrationExpression::DeleteSchema(e) => self.delete_schema(e),
            MigrationExpression::AlterSchema(e) => self.alter_schema(e),
            MigrationExpression::InsertData(e) => self.insert_data(e),
            MigrationExpression::UpdateData(e) => self.update_data(e),
            MigrationExpression::DeleteData(e) => self.delete_data(e),
            MigrationExpression::ExecuteSql(e) => Ok(vec![e.sql.clone()]),
            MigrationExpression::PerformDbOperation(_) => Ok(Vec::new()),
        }
    }

    /// Apply the compatibility policy to an unsupported feature.
    fn compatibility(&self, feature: &str) -> Result<Vec<String>> {
        base::compatibility(self.dialect(), self.compatibility_mode(), feature)
    }

    /// Apply the compatibility policy to a feature dropped from, or
    /// substituted inside, an otherwise supported statement.
    fn compatibility_note(&self, feature: &str, outcome: &str) -> Result<Option<String>> {
        base::compatibility_note(self.dialect(), self.compatibility_mode(), feature, outcome)
    }

    // -------------------------------------------------------------------------
    // Column rendering hooks
    // -------------------------------------------------------------------------

    /// SQL type text for a column.
    fn column_type(&self, column: &ColumnDefinition) -> Result<String> {
        base::column_type(self, column)
    }

    /// Identity clause, placed after the default.
    fn format_identity(&self, column: &ColumnDefinition) -> Result<String> {
        base::require_integer_identity(self.dialect(), column)?;
        Ok("IDENTITY(1,1)".to_string())
    }

    /// Full column definition: name, type, nullability, default, identity,
    /// primary key, unique.
    fn format_column(&self, column: &ColumnDefinition, inline_primary_key: bool) -> Result<String> {
        base::format_column(self, column, inline_primary_key)
    }

    /// Computed column definition.
    fn format_computed_column(&self, column: &ColumnDefinition) -> Result<String> {
        base::format_computed_column(self, column)
    }

    // -------------------------------------------------------------------------
    // Statements
    // -------------------------------------------------------------------------

    fn create_table(&self, e: &CreateTableExpression) -> Result<Vec<String>> {
        base::create_table(self, e)
    }

    fn delete_table(&self, e: &DeleteTableExpression) -> Result<Vec<String>> {
        base::delete_table(self, e)
    }

    fn rename_table(&self, e: &RenameTableExpression) -> Result<Vec<String>> {
        base::rename_table(self, e)
    }

    fn create_column(&self, e: &CreateColumnExpression) -> Result<Vec<String>> {
        base::create_column(self, e)
    }

    fn alter_column(&self, e: &AlterColumnExpression) -> Result<Vec<String>> {
        base::alter_column(self, e)
    }

    fn delete_column(&self, e: &DeleteColumnExpression) -> Result<Vec<String>> {
        base::delete_column(self, e)
    }

    fn rename_column(&self, e: &RenameColumnExpression) -> Result<Vec<String>> {
        base::rename_column(self, e)
    }

    fn create_index(&self, e: &CreateIndexExpression) -> Result<Vec<String>> {
        base::create_index(self, e)
    }

    fn delete_index(&self, e: &DeleteIndexExpression) -> Result<Vec<String>> {
        base::delete_index(self, e)
    }

    fn create_foreign_key(&self, e: &CreateForeignKeyExpression) -> Result<Vec<String>> {
        base::create_foreign_key(self, e)
    }

    fn delete_foreign_key(&self, e: &DeleteForeignKeyExpression) -> Result<Vec<String>> {
        base::delete_foreign_key(self, e)
    }

    fn create_constraint(&self, e: &CreateConstraintExpression) -> Result<Vec<String>> {
        base::create_constraint(self, e)
    }

    fn delete_constraint(&self, e: &DeleteConstraintExpression) -> Result<Vec<String>> {
        base::delete_constraint(self, e)
    }

    fn create_sequence(&self, e: &CreateSequenceExpression) -> Result<Vec<String>> {
        base::create_sequence(self, e)
    }

    fn delete_sequence(&self, e: &DeleteSequenceExpression) -> Result<Vec<String>> {
        base::delete_sequence(self, e)
    }

    fn create_schema(&self, e: &CreateSchemaExpression) -> Result<Vec<String>> {
        base::create_schema(self, e)
    }

    fn delete_schema(&self, e: &DeleteSchemaExpression) -> Result<Vec<String>> {
        base::delete_schema(self, e)
    }

    fn alter_schema(&self, _e: &AlterSchemaExpression) -> Result<Vec<String>> {
        self.compatibility("moving tables between schemas")
    }

    fn insert_data(&self, e: &InsertDataExpression) -> Result<Vec<String>> {
        base::insert_data(self, e)
    }

    fn update_data(&self, e: &UpdateDataExpression) -> Result<Vec<String>> {
        base::update_data(self, e)
    }

    fn delete_data(&self, e: &DeleteDataExpression) -> Result<Vec<String>> {
        base::delete_data(self, e)
    }
}

// =============================================================================
// Processor
// =============================================================================

/// Options shared by every processor.
#[derive(Debug, Clone, Default)]
pub struct ProcessorOptions {
    /// Log SQL instead of executing it.
    pub preview_only: bool,

    /// Per-statement timeout.
    pub timeout: Option<Duration>,
}

/// Executes SQL against one live connection and answers schema queries.
///
/// A processor owns its connection for the whole run; statements from one
/// migration, including its version bookkeeping, share its transaction.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Canonical database type identifier, e.g. `SQLite`.
    fn database_type(&self) -> &str;

    /// Additional identifiers the processor answers to; the generator's aliases.
    fn database_type_aliases(&self) -> &[&str] {
        self.generator().aliases()
    }

    fn options(&self) -> &ProcessorOptions;

    fn generator(&self) -> &dyn Generator;

    /// Whether DDL statements take part in transactions.
    fn supports_transactional_ddl(&self) -> bool;

    /// Execute one SQL batch on the connection, ignoring preview mode.
    ///
    /// Implementations classify driver failures: a statement the server
    /// rejected becomes `Execution`, transport failures become `Connection`.
    async fn execute_raw(&self, sql: &str) -> Result<()>;

    /// Run a query and collect its rows. Reads run in preview mode too.
    async fn read(&self, sql: &str) -> Result<DataSet>;

    /// Whether a query returns at least one row.
    async fn exists(&self, sql: &str) -> Result<bool> {
        Ok(!self.read(sql).await?.is_empty())
    }

    async fn schema_exists(&self, schema: &str) -> Result<bool>;

    async fn table_exists(&self, schema: Option<&str>, table: &str) -> Result<bool>;

    async fn column_exists(&self, schema: Option<&str>, table: &str, column: &str) -> Result<bool>;

    async fn constraint_exists(
        &self,
        schema: Option<&str>,
        table: &str,
        constraint: &str,
    ) -> Result<bool>;

    async fn index_exists(&self, schema: Option<&str>, table: &str, index: &str) -> Result<bool>;

    async fn sequence_exists(&self, schema: Option<&str>, sequence: &str) -> Result<bool>;

    async fn default_value_exists(
        &self,
        schema: Option<&str>,
        table: &str,
        column: &str,
        default_value: &SqlValue,
    ) -> Result<bool>;

    /// Execute SQL, honoring preview mode and the statement timeout.
    async fn execute(&self, sql: &str) -> Result<()> {
        if is_comment_only(sql) {
            debug!("skipping comment-only statement: {}", sql.trim());
            return Ok(());
        }
        if self.options().preview_only {
            info!(preview = true, "{}", sql);
            return Ok(());
        }
        info!("{}", sql);
        match self.options().timeout {
            Some(limit) => tokio::time::timeout(limit, self.execute_raw(sql))
                .await
                .map_err(|_| MigrateError::execution(sql, format!("timed out after {:?}", limit)))?,
            None => self.execute_raw(sql).await,
        }
    }

    async fn begin_transaction(&self) -> Result<()> {
        self.transaction_control("BEGIN TRANSACTION").await
    }

    async fn commit_transaction(&self) -> Result<()> {
        self.transaction_control("COMMIT TRANSACTION").await
    }

    async fn rollback_transaction(&self) -> Result<()> {
        self.transaction_control("ROLLBACK TRANSACTION").await
    }

    /// Transaction statements are skipped in preview mode.
    async fn transaction_control(&self, sql: &str) -> Result<()> {
        if self.options().preview_only {
            debug!(preview = true, "{}", sql);
            return Ok(());
        }
        debug!("{}", sql);
        self.execute_raw(sql).await
    }

    /// Whether `name` identifies this processor's database, case-insensitively.
    fn matches_database(&self, name: &str) -> bool {
        self.database_type().eq_ignore_ascii_case(name)
            || self
                .database_type_aliases()
                .iter()
                .any(|alias| alias.eq_ignore_ascii_case(name))
    }
}

/// Generate and execute one expression. Returns the number of statements run.
pub async fn process(processor: &dyn Processor, expression: &MigrationExpression) -> Result<usize> {
    if let MigrationExpression::PerformDbOperation(op) = expression {
        if processor.options().preview_only {
            info!(preview = true, "perform operation: {}", op.description);
            return Ok(0);
        }
        info!("perform operation: {}", op.description);
        (op.operation)(processor).await?;
        return Ok(1);
    }

    let statements = processor.generator().generate(expression)?;
    for sql in &statements {
        processor.execute(sql).await?;
    }
    Ok(statements.len())
}

/// Whether `sql` holds nothing but whitespace and `--` comments.
pub fn is_comment_only(sql: &str) -> bool {
    sql.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Brackets;

    impl Quoter for Brackets {
        fn open_quote(&self) -> &str {
            "["
        }
        fn close_quote(&self) -> &str {
            "]"
        }
        fn format_system_method(&self, method: SystemMethod) -> Result<String> {
            match method {
                SystemMethod::CurrentDateTime => Ok("GETDATE()".into()),
                other => Err(MigrateError::not_supported("test", format!("{:?}", other))),
            }
        }
    }

    #[test]
    fn test_quote_identifier_round_trip() {
        let q = Brackets;
        for name in ["Users", "Order Details", "a.b", "x", "Ünïcode"] {
            assert_eq!(q.unquote(&q.quote_identifier(name)), name);
        }
    }

    #[test]
    fn test_quote_identifier_passes_quoted_names_through() {
        let q = Brackets;
        assert_eq!(q.quote_identifier("[Users]"), "[Users]");
        assert!(q.is_quoted("[Users]"));
        assert!(!q.is_quoted("Users"));
    }

    #[test]
    fn test_quote_table_name_with_schema() {
        let q = Brackets;
        assert_eq!(q.quote_table_name("Users", Some("dbo")), "[dbo].[Users]");
        assert_eq!(q.quote_table_name("Users", None), "[Users]");
        assert_eq!(q.quote_table_name("Users", Some("")), "[Users]");
    }

    #[test]
    fn test_quote_value_defaults() {
        let q = Brackets;
        assert_eq!(q.quote_value(&SqlValue::Null).unwrap(), "NULL");
        assert_eq!(q.quote_value(&SqlValue::I32(5)).unwrap(), "5");
        assert_eq!(q.quote_value(&SqlValue::from("it's")).unwrap(), "'it''s'");
        assert_eq!(q.quote_value(&SqlValue::Bool(true)).unwrap(), "1");
        assert_eq!(q.quote_value(&SqlValue::Bytes(vec![0xab, 0x01])).unwrap(), "0xAB01");
        assert_eq!(q.quote_value(&SqlValue::raw("NOW()")).unwrap(), "NOW()");
        assert_eq!(
            q.quote_value(&SqlValue::Method(SystemMethod::CurrentDateTime)).unwrap(),
            "GETDATE()"
        );
        assert!(q.quote_value(&SqlValue::Method(SystemMethod::NewGuid)).is_err());
    }

    #[test]
    fn test_format_date_time() {
        let q = Brackets;
        let dt = NaiveDate::from_ymd_opt(2024, 1, 31)
            .unwrap()
            .and_hms_opt(10, 5, 0)
            .unwrap();
        assert_eq!(q.format_date_time(dt), "'2024-01-31T10:05:00'");
    }

    #[test]
    fn test_is_comment_only() {
        assert!(is_comment_only("-- skipped"));
        assert!(is_comment_only("  \n-- a\n  -- b\n"));
        assert!(!is_comment_only("-- a\nSELECT 1"));
    }

    #[test]
    fn test_compatibility_mode_deserializes_lowercase() {
        let mode: CompatibilityMode = serde_yaml::from_str("loose").unwrap();
        assert_eq!(mode, CompatibilityMode::Loose);
    }
}
