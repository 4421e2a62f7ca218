//! PostgreSQL processor on tokio-postgres with a deadpool pool.

use std::str::FromStr;

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use tokio_postgres::error::SqlState;
use tokio_postgres::{Config as PgConfig, NoTls, Row};
use tracing::{debug, info};

use super::dialect::{PostgresGenerator, PostgresQuoter, POSTGRES};
use crate::core::traits::{Generator, Processor, ProcessorOptions, Quoter};
use crate::core::value::{DataSet, SqlValue};
use crate::error::{MigrateError, Result};

/// PostgreSQL processor.
///
/// One pooled client is held for the whole run.
pub struct PostgresProcessor {
    _pool: Pool,
    client: Object,
    generator: PostgresGenerator,
    options: ProcessorOptions,
}

impl PostgresProcessor {
    /// Connect using a libpq-style key/value string or a `postgres://` URL.
    pub async fn connect(
        connection: &str,
        generator: PostgresGenerator,
        options: ProcessorOptions,
    ) -> Result<Self> {
        let pg_config = PgConfig::from_str(connection)
            .map_err(|e| MigrateError::Config(format!("invalid PostgreSQL connection string: {}", e)))?;
        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let mgr = Manager::from_config(pg_config, NoTls, mgr_config);
        let pool = Pool::builder(mgr)
            .max_size(1)
            .build()
            .map_err(MigrateError::connection)?;
        let client = pool.get().await.map_err(MigrateError::connection)?;
        info!("Connected to PostgreSQL");
        Ok(Self {
            _pool: pool,
            client,
            generator,
            options,
        })
    }

    async fn probe(&self, sql: &str) -> Result<bool> {
        match self.client.query(sql, &[]).await {
            Ok(rows) => Ok(!rows.is_empty()),
            Err(e) if is_not_found(&e) => {
                debug!("existence query found nothing: {}", e);
                Ok(false)
            }
            Err(e) => Err(classify(sql, e)),
        }
    }

    fn literal(&self, value: &str) -> String {
        PostgresQuoter.format_string(value)
    }

    /// Schema literal, or the session's current schema when none is given.
    fn schema_expr(&self, schema: Option<&str>) -> String {
        match schema.filter(|s| !s.is_empty()) {
            Some(s) => self.literal(s),
            None => "current_schema()".to_string(),
        }
    }
}

#[async_trait]
impl Processor for PostgresProcessor {
    fn database_type(&self) -> &str {
        POSTGRES
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
        self.client
            .batch_execute(sql)
            .await
            .map_err(|e| classify(sql, e))
    }

    async fn read(&self, sql: &str) -> Result<DataSet> {
        let rows = self
            .client
            .query(sql, &[])
            .await
            .map_err(|e| classify(sql, e))?;
        Ok(rows_to_data_set(&rows))
    }

    async fn exists(&self, sql: &str) -> Result<bool> {
        self.probe(sql).await
    }

    async fn schema_exists(&self, schema: &str) -> Result<bool> {
        self.probe(&format!(
            "SELECT 1 FROM information_schema.schemata WHERE schema_name = {}",
            self.literal(schema)
        ))
        .await
    }

    async fn table_exists(&self, schema: Option<&str>, table: &str) -> Result<bool> {
        self.probe(&format!(
            "SELECT 1 FROM information_schema.tables WHERE table_schema = {} AND table_name = {}",
            self.schema_expr(schema),
            self.literal(table)
        ))
        .await
    }

    async fn column_exists(&self, schema: Option<&str>, table: &str, column: &str) -> Result<bool> {
        self.probe(&format!(
            "SELECT 1 FROM information_schema.columns WHERE table_schema = {} AND table_name = {} AND column_name = {}",
            self.schema_expr(schema),
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
            "SELECT 1 FROM information_schema.table_constraints WHERE table_schema = {} AND table_name = {} AND constraint_name = {}",
            self.schema_expr(schema),
            self.literal(table),
            self.literal(constraint)
        ))
        .await
    }

    async fn index_exists(&self, schema: Option<&str>, table: &str, index: &str) -> Result<bool> {
        self.probe(&format!(
            "SELECT 1 FROM pg_catalog.pg_indexes WHERE schemaname = {} AND tablename = {} AND indexname = {}",
            self.schema_expr(schema),
            self.literal(table),
            self.literal(index)
        ))
        .await
    }

    async fn sequence_exists(&self, schema: Option<&str>, sequence: &str) -> Result<bool> {
        self.probe(&format!(
            "SELECT 1 FROM information_schema.sequences WHERE sequence_schema = {} AND sequence_name = {}",
            self.schema_expr(schema),
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
        let rendered = PostgresQuoter.quote_value(default_value)?;
        self.probe(&format!(
            "SELECT 1 FROM information_schema.columns WHERE table_schema = {} AND table_name = {} AND column_name = {} AND column_default LIKE {}",
            self.schema_expr(schema),
            self.literal(table),
            self.literal(column),
            self.literal(&format!("%{}%", rendered))
        ))
        .await
    }
}

fn is_not_found(e: &tokio_postgres::Error) -> bool {
    matches!(
        e.code(),
        Some(code) if *code == SqlState::UNDEFINED_TABLE || *code == SqlState::INVALID_SCHEMA_NAME
    )
}

/// Database errors are statement failures; everything else is transport.
fn classify(sql: &str, e: tokio_postgres::Error) -> MigrateError {
    match e.as_db_error() {
        Some(db) => MigrateError::execution(
            sql,
            format!("{} (SQLSTATE {})", db.message(), db.code().code()),
        ),
        None => MigrateError::connection(e),
    }
}

fn rows_to_data_set(rows: &[Row]) -> DataSet {
    let columns = rows
        .first()
        .map(|r| r.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();
    let rows = rows
        .iter()
        .map(|row| {
            row.columns()
                .iter()
                .enumerate()
                .map(|(idx, col)| convert_pg_row_value(row, idx, col.type_().name()))
                .collect()
        })
        .collect();
    DataSet { columns, rows }
}

/// Convert a PostgreSQL row value to SqlValue.
fn convert_pg_row_value(row: &Row, idx: usize, data_type: &str) -> SqlValue {
    match data_type {
        "bool" => row.try_get::<_, Option<bool>>(idx).ok().flatten().into(),
        "int2" => row.try_get::<_, Option<i16>>(idx).ok().flatten().into(),
        "int4" => row.try_get::<_, Option<i32>>(idx).ok().flatten().into(),
        "int8" => row.try_get::<_, Option<i64>>(idx).ok().flatten().into(),
        "float4" => row.try_get::<_, Option<f32>>(idx).ok().flatten().into(),
        "float8" => row.try_get::<_, Option<f64>>(idx).ok().flatten().into(),
        "uuid" => row.try_get::<_, Option<uuid::Uuid>>(idx).ok().flatten().into(),
        "timestamp" => row
            .try_get::<_, Option<chrono::NaiveDateTime>>(idx)
            .ok()
            .flatten()
            .into(),
        "timestamptz" => row
            .try_get::<_, Option<chrono::DateTime<chrono::FixedOffset>>>(idx)
            .ok()
            .flatten()
            .into(),
        "date" => row
            .try_get::<_, Option<chrono::NaiveDate>>(idx)
            .ok()
            .flatten()
            .into(),
        "time" => row
            .try_get::<_, Option<chrono::NaiveTime>>(idx)
            .ok()
            .flatten()
            .into(),
        "bytea" => row.try_get::<_, Option<Vec<u8>>>(idx).ok().flatten().into(),
        _ => row.try_get::<_, Option<String>>(idx).ok().flatten().into(),
    }
}
