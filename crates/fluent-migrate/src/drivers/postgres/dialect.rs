//! PostgreSQL quoting, type map and generator.

use crate::core::expression::*;
use crate::core::schema::{ColumnDefinition, DbType, SystemMethod};
use crate::core::traits::{CompatibilityMode, Generator, Quoter, TypeMap};
use crate::dialect::generator as base;
use crate::dialect::TypeMapBase;
use crate::error::Result;

/// Canonical PostgreSQL database type identifier.
pub const POSTGRES: &str = "Postgres";

/// Other identifiers accepted for this dialect.
pub const POSTGRES_ALIASES: &[&str] = &["PostgreSQL", "pg"];

/// Largest VARCHAR/CHAR length PostgreSQL accepts.
const MAX_VARCHAR: u32 = 10_485_760;

/// `"` quoting with `true`/`false` booleans and `bytea` hex literals.
#[derive(Debug, Clone, Default)]
pub struct PostgresQuoter;

impl Quoter for PostgresQuoter {
    fn open_quote(&self) -> &str {
        "\""
    }

    fn close_quote(&self) -> &str {
        "\""
    }

    fn format_bool(&self, value: bool) -> String {
        if value { "true" } else { "false" }.to_string()
    }

    fn format_bytes(&self, value: &[u8]) -> String {
        format!("'\\x{}'::bytea", hex::encode(value))
    }

    fn format_system_method(&self, method: SystemMethod) -> Result<String> {
        Ok(match method {
            SystemMethod::NewGuid | SystemMethod::NewSequentialId => "gen_random_uuid()",
            SystemMethod::CurrentDateTime => "now()",
            SystemMethod::CurrentDateTimeOffset => "current_timestamp",
            SystemMethod::CurrentUtcDateTime => "(now() at time zone 'UTC')",
            SystemMethod::CurrentUser => "current_user",
        }
        .to_string())
    }
}

/// PostgreSQL type map.
pub fn postgres_type_map() -> TypeMapBase {
    let mut map = TypeMapBase::new(POSTGRES);
    map.set(DbType::AnsiStringFixedLength, "CHAR(255)")
        .set_sized(DbType::AnsiStringFixedLength, "CHAR($size)", MAX_VARCHAR)
        .set(DbType::AnsiString, "TEXT")
        .set_sized(DbType::AnsiString, "VARCHAR($size)", MAX_VARCHAR)
        .set(DbType::Binary, "BYTEA")
        .set(DbType::Boolean, "BOOLEAN")
        .set(DbType::Byte, "SMALLINT")
        .set(DbType::Currency, "MONEY")
        .set(DbType::Date, "DATE")
        .set(DbType::DateTime, "TIMESTAMP")
        .set(DbType::DateTime2, "TIMESTAMP")
        .set(DbType::DateTimeOffset, "TIMESTAMPTZ")
        .set(DbType::Decimal, "DECIMAL(19,5)")
        .set_sized(DbType::Decimal, "DECIMAL($size,$precision)", 1000)
        .set(DbType::Double, "DOUBLE PRECISION")
        .set(DbType::Guid, "UUID")
        .set(DbType::Int16, "SMALLINT")
        .set(DbType::Int32, "INTEGER")
        .set(DbType::Int64, "BIGINT")
        .set(DbType::Single, "REAL")
        .set(DbType::StringFixedLength, "CHAR(255)")
        .set_sized(DbType::StringFixedLength, "CHAR($size)", MAX_VARCHAR)
        .set(DbType::String, "TEXT")
        .set_sized(DbType::String, "VARCHAR($size)", MAX_VARCHAR)
        .set(DbType::Time, "TIME")
        .set(DbType::Xml, "XML");
    map
}

/// PostgreSQL generator.
#[derive(Debug, Clone)]
pub struct PostgresGenerator {
    quoter: PostgresQuoter,
    types: TypeMapBase,
    mode: CompatibilityMode,
}

impl PostgresGenerator {
    pub fn new(mode: CompatibilityMode) -> Self {
        Self {
            quoter: PostgresQuoter,
            types: postgres_type_map(),
            mode,
        }
    }

    fn table(&self, table: &str, schema: Option<&str>) -> String {
        self.quoter.quote_table_name(table, schema)
    }
}

impl Default for PostgresGenerator {
    fn default() -> Self {
        Self::new(CompatibilityMode::Strict)
    }
}

impl Generator for PostgresGenerator {
    fn dialect(&self) -> &str {
        POSTGRES
    }

    fn aliases(&self) -> &[&str] {
        POSTGRES_ALIASES
    }

    fn quoter(&self) -> &dyn Quoter {
        &self.quoter
    }

    fn type_map(&self) -> &dyn TypeMap {
        &self.types
    }

    fn compatibility_mode(&self) -> CompatibilityMode {
        self.mode
    }

    fn format_identity(&self, column: &ColumnDefinition) -> Result<String> {
        base::require_integer_identity(POSTGRES, column)?;
        Ok("GENERATED BY DEFAULT AS IDENTITY".to_string())
    }

    /// `<name> <type> GENERATED ALWAYS AS (<expression>) STORED [NOT NULL]`
    ///
    /// PostgreSQL only has stored generated columns.
    fn format_computed_column(&self, column: &ColumnDefinition) -> Result<String> {
        let computed = base::computed_of(column)?;
        let note = if computed.stored {
            None
        } else {
            self.compatibility_note("virtual computed columns", "stored instead")?
        };
        let mut sql = format!(
            "{} {} GENERATED ALWAYS AS ({}) STORED",
            self.quoter.quote_column_name(&column.name),
            self.column_type(column)?,
            computed.expression
        );
        if column.is_nullable == Some(false) {
            sql.push_str(" NOT NULL");
        }
        if let Some(note) = note {
            sql.push_str(&base::inline_comment(&note));
        }
        Ok(sql)
    }

    fn alter_column(&self, e: &AlterColumnExpression) -> Result<Vec<String>> {
        let q = &self.quoter;
        let column = q.quote_column_name(&e.column.name);
        let mut actions = vec![format!(
            "ALTER COLUMN {} TYPE {}",
            column,
            self.column_type(&e.column)?
        )];
        actions.push(if e.column.nullable() {
            format!("ALTER COLUMN {} DROP NOT NULL", column)
        } else {
            format!("ALTER COLUMN {} SET NOT NULL", column)
        });
        if let Some(default) = &e.column.default_value {
            actions.push(format!(
                "ALTER COLUMN {} SET DEFAULT {}",
                column,
                q.quote_value(default)?
            ));
        }
        Ok(vec![format!(
            "ALTER TABLE {} {}",
            self.table(&e.table_name, e.schema_name.as_deref()),
            actions.join(", ")
        )])
    }

    fn create_index(&self, e: &CreateIndexExpression) -> Result<Vec<String>> {
        let index = &e.index;
        let q = &self.quoter;
        let mut statements = Vec::new();
        if index.is_clustered {
            statements.extend(
                self.compatibility_note("clustered indexes", "ignored")?
                    .map(base::comment),
            );
        }
        let mut sql = format!(
            "CREATE {}INDEX {} ON {} ({})",
            if index.is_unique { "UNIQUE " } else { "" },
            q.quote_identifier(base::index_name(index)?),
            self.table(&index.table_name, index.schema_name.as_deref()),
            base::index_columns(q, index)
        );
        if !index.includes.is_empty() {
            sql.push_str(&format!(
                " INCLUDE ({})",
                base::quote_columns(q, &index.includes)
            ));
        }
        if let Some(filter) = &index.filter {
            sql.push_str(&format!(" WHERE {}", filter));
        }
        statements.push(sql);
        Ok(statements)
    }

    fn alter_schema(&self, e: &AlterSchemaExpression) -> Result<Vec<String>> {
        Ok(vec![format!(
            "ALTER TABLE {} SET SCHEMA {}",
            self.table(&e.table_name, e.source_schema_name.as_deref()),
            self.quoter.quote_schema_name(&e.destination_schema_name)
        )])
    }
}
