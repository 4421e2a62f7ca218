//! SQL Server processor on Tiberius with a bb8 pool.
//!
//! The pool holds a single connection, checked out for the processor's
//! lifetime so transaction statements and migration SQL share a session.

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use tiberius::{Client, ColumnData, Config, FromSql, Row};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

use super::dialect::{SqlServerGenerator, SqlServerQuoter, SQLSERVER};
use crate::core::traits::{Generator, Processor, ProcessorOptions, Quoter};
use crate::core::value::{DataSet, SqlValue};
use crate::error::{MigrateError, Result};

/// SQL Server error number for "Invalid object name".
const INVALID_OBJECT_NAME: u32 = 208;

const DEFAULT_SCHEMA: &str = "dbo";

/// Connection manager for bb8 pool with Tiberius.
#[derive(Clone)]
pub struct TiberiusConnectionManager {
    config: Config,
}

impl TiberiusConnectionManager {
    /// Build a manager from an ADO.NET-style connection string.
    pub fn from_connection_string(connection: &str) -> Result<Self> {
        let config = Config::from_ado_string(connection)
            .map_err(|e| MigrateError::Config(format!("invalid SQL Server connection string: {}", e)))?;
        Ok(Self { config })
    }
}

#[async_trait]
impl bb8::ManageConnection for TiberiusConnectionManager {
    type Connection = Client<Compat<TcpStream>>;
    type Error = tiberius::error::Error;

    async fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        let tcp = TcpStream::connect(self.config.get_addr())
            .await
            .map_err(|e| tiberius::error::Error::Io {
                kind: e.kind(),
                message: e.to_string(),
            })?;
        tcp.set_nodelay(true).ok();
        Client::connect(self.config.clone(), tcp.compat_write()).await
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> std::result::Result<(), Self::Error> {
        conn.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// SQL Server processor.
pub struct SqlServerProcessor {
    _pool: Pool<TiberiusConnectionManager>,
    conn: Mutex<PooledConnection<'static, TiberiusConnectionManager>>,
    generator: SqlServerGenerator,
    options: ProcessorOptions,
}

impl SqlServerProcessor {
    /// Connect and check out the session used for the whole run.
    pub async fn connect(
        connection: &str,
        generator: SqlServerGenerator,
        options: ProcessorOptions,
    ) -> Result<Self> {
        let manager = TiberiusConnectionManager::from_connection_string(connection)?;
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .await
            .map_err(MigrateError::connection)?;
        let conn = pool.get_owned().await.map_err(MigrateError::connection)?;
        info!("Connected to SQL Server");
        Ok(Self {
            _pool: pool,
            conn: Mutex::new(conn),
            generator,
            options,
        })
    }

    async fn probe(&self, sql: &str) -> Result<bool> {
        let mut conn = self.conn.lock().await;
        let rows = match conn.simple_query(sql).await {
            Ok(stream) => stream.into_first_result().await,
            Err(e) => Err(e),
        };
        match rows {
            Ok(rows) => Ok(!rows.is_empty()),
            Err(e) if is_not_found(&e) => {
                debug!("existence query found nothing: {}", e);
                Ok(false)
            }
            Err(e) => Err(classify(sql, e)),
        }
    }

    fn literal(&self, value: &str) -> String {
        SqlServerQuoter.format_string(value)
    }

    fn schema_literal(&self, schema: Option<&str>) -> String {
        self.literal(schema.filter(|s| !s.is_empty()).unwrap_or(DEFAULT_SCHEMA))
    }
}

#[async_trait]
impl Processor for SqlServerProcessor {
    fn database_type(&self) -> &str {
        SQLSERVER
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
        for batch in split_batches(sql) {
            conn.simple_query(batch.as_str())
                .await
                .map_err(|e| classify(&batch, e))?
                .into_results()
                .await
                .map_err(|e| classify(&batch, e))?;
        }
        Ok(())
    }

    async fn read(&self, sql: &str) -> Result<DataSet> {
        let mut conn = self.conn.lock().await;
        let rows = conn
            .simple_query(sql)
            .await
            .map_err(|e| classify(sql, e))?
            .into_first_result()
            .await
            .map_err(|e| classify(sql, e))?;
        rows_to_data_set(&rows)
    }

    async fn exists(&self, sql: &str) -> Result<bool> {
        self.probe(sql).await
    }

    async fn schema_exists(&self, schema: &str) -> Result<bool> {
        self.probe(&format!(
            "SELECT 1 FROM sys.schemas WHERE name = {}",
            self.literal(schema)
        ))
        .await
    }

    async fn table_exists(&self, schema: Option<&str>, table: &str) -> Result<bool> {
        self.probe(&format!(
            "SELECT 1 FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_SCHEMA = {} AND TABLE_NAME = {}",
            self.schema_literal(schema),
            self.literal(table)
        ))
        .await
    }

    async fn column_exists(&self, schema: Option<&str>, table: &str, column: &str) -> Result<bool> {
        self.probe(&format!(
            "SELECT 1 FROM INFORMATION_SCHEMA.COLUMNS WHERE TABLE_SCHEMA = {} AND TABLE_NAME = {} AND COLUMN_NAME = {}",
            self.schema_literal(schema),
            self.literal(table),
            self.literal(column)
        ))
        .await
    }

    async fn constraint_exists(
        &self,
        schema: Option<&str>,
        table: &str,
        constraint: &str,
    ) -> Result<bool> {
        self.probe(&format!(
            "SELECT 1 FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS WHERE CONSTRAINT_CATALOG = DB_NAME() AND TABLE_SCHEMA = {} AND TABLE_NAME = {} AND CONSTRAINT_NAME = {}",
            self.schema_literal(schema),
            self.literal(table),
            self.literal(constraint)
        ))
        .await
    }

    async fn index_exists(&self, schema: Option<&str>, table: &str, index: &str) -> Result<bool> {
        let qualified = SqlServerQuoter
            .quote_table_name(table, Some(schema.filter(|s| !s.is_empty()).unwrap_or(DEFAULT_SCHEMA)));
        self.probe(&format!(
            "SELECT 1 FROM sys.indexes WHERE name = {} AND object_id = OBJECT_ID({})",
            self.literal(index),
            self.literal(&qualified)
        ))
        .await
    }

    async fn sequence_exists(&self, schema: Option<&str>, sequence: &str) -> Result<bool> {
        self.probe(&format!(
            "SELECT 1 FROM INFORMATION_SCHEMA.SEQUENCES WHERE SEQUENCE_SCHEMA = {} AND SEQUENCE_NAME = {}",
            self.schema_literal(schema),
            self.literal(sequence)
        ))
        .await
    }

    async fn default_value_exists(
        &self,
        schema: Option<&str>,
        table: &str,
        column: &str,
        default_value: &SqlValue,
    ) -> Result<bool> {
        let rendered = SqlServerQuoter.quote_value(default_value)?;
        self.probe(&format!(
            "SELECT 1 FROM INFORMATION_SCHEMA.COLUMNS WHERE TABLE_SCHEMA = {} AND TABLE_NAME = {} AND COLUMN_NAME = {} AND COLUMN_DEFAULT LIKE {}",
            self.schema_literal(schema),
            self.literal(table),
            self.literal(column),
            self.literal(&format!("%{}%", rendered))
        ))
        .await
    }
}

/// Split a script on `GO` separator lines.
pub fn split_batches(sql: &str) -> Vec<String> {
    let mut batches = Vec::new();
    let mut current = String::new();
    for line in sql.lines() {
        if line.trim().eq_ignore_ascii_case("GO") {
            if !current.trim().is_empty() {
                batches.push(current.trim().to_string());
            }
            current.clear();
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    if !current.trim().is_empty() {
        batches.push(current.trim().to_string());
    }
    batches
}

fn is_not_found(e: &tiberius::error::Error) -> bool {
    matches!(e, tiberius::error::Error::Server(token) if token.code() == INVALID_OBJECT_NAME)
}

/// Server-reported errors are statement failures; everything else is transport.
fn classify(sql: &str, e: tiberius::error::Error) -> MigrateError {
    match e {
        tiberius::error::Error::Server(token) => MigrateError::execution(
            sql,
            format!("{} (error {})", token.message(), token.code()),
        ),
        other => MigrateError::connection(other),
    }
}

fn rows_to_data_set(rows: &[Row]) -> Result<DataSet> {
    let columns = rows
        .first()
        .map(|r| r.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();
    let rows = rows
        .iter()
        .map(|row| row.cells().map(|(_, data)| cell_value(data)).collect())
        .collect::<Result<Vec<_>>>()?;
    Ok(DataSet { columns, rows })
}

fn cell_value(data: &ColumnData<'static>) -> Result<SqlValue> {
    let convert = |e: tiberius::error::Error| MigrateError::connection(e);
    Ok(match data {
        ColumnData::U8(v) => v.map(|v| v as i16).into(),
        ColumnData::I16(v) => (*v).into(),
        ColumnData::I32(v) => (*v).into(),
        ColumnData::I64(v) => (*v).into(),
        ColumnData::F32(v) => (*v).into(),
        ColumnData::F64(v) => (*v).into(),
        ColumnData::Bit(v) => (*v).into(),
        ColumnData::String(v) => v.as_ref().map(|s| s.to_string()).into(),
        ColumnData::Guid(v) => (*v).into(),
        ColumnData::Binary(v) => v.as_ref().map(|b| b.to_vec()).into(),
        ColumnData::Numeric(_) => Decimal::from_sql(data).map_err(convert)?.into(),
        ColumnData::Xml(v) => v
            .as_ref()
            .map(|x| x.clone().into_owned().into_string())
            .into(),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            NaiveDateTime::from_sql(data).map_err(convert)?.into()
        }
        ColumnData::Date(_) => NaiveDate::from_sql(data).map_err(convert)?.into(),
        ColumnData::Time(_) => NaiveTime::from_sql(data).map_err(convert)?.into(),
        ColumnData::DateTimeOffset(_) => DateTime::<FixedOffset>::from_sql(data)
            .map_err(convert)?
            .into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_batches_on_go() {
        let script = "CREATE TABLE A (Id INT)\nGO\ngo\nCREATE TABLE B (Id INT)\n  GO  \n";
        assert_eq!(
            split_batches(script),
            vec!["CREATE TABLE A (Id INT)", "CREATE TABLE B (Id INT)"]
        );
    }

    #[test]
    fn test_split_batches_without_separator() {
        assert_eq!(split_batches("SELECT 1"), vec!["SELECT 1"]);
        assert!(split_batches("GO").is_empty());
    }

    #[test]
    fn test_go_inside_identifier_is_not_a_separator() {
        let script = "SELECT [GO] FROM T";
        assert_eq!(split_batches(script), vec!["SELECT [GO] FROM T"]);
    }

    #[test]
    fn test_cell_value_conversions() {
        assert_eq!(cell_value(&ColumnData::I64(Some(42))).unwrap(), SqlValue::I64(42));
        assert_eq!(cell_value(&ColumnData::I32(None)).unwrap(), SqlValue::Null);
        assert_eq!(
            cell_value(&ColumnData::String(Some("x".into()))).unwrap(),
            SqlValue::Text("x".into())
        );
    }
}
