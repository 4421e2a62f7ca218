//! SQL Server quoting, type map and generator.

use crate::core::expression::*;
use crate::core::schema::{ColumnDefinition, DbType, SystemMethod};
use crate::core::traits::{CompatibilityMode, Generator, Quoter, TypeMap};
use crate::dialect::generator as base;
use crate::dialect::TypeMapBase;
use crate::error::Result;

/// Canonical SQL Server database type identifier.
pub const SQLSERVER: &str = "SqlServer";

/// Other identifiers accepted for this dialect.
pub const SQLSERVER_ALIASES: &[&str] = &["mssql", "sql_server", "sqlserver2016"];

const MAX_CAPACITY: u32 = i32::MAX as u32;

/// `[`/`]` quoting with `N'...'` unicode string literals.
#[derive(Debug, Clone, Default)]
pub struct SqlServerQuoter;

impl Quoter for SqlServerQuoter {
    fn open_quote(&self) -> &str {
        "["
    }

    fn close_quote(&self) -> &str {
        "]"
    }

    fn format_string(&self, value: &str) -> String {
        format!("N'{}'", self.format_sql_escape(value))
    }

    fn format_system_method(&self, method: SystemMethod) -> Result<String> {
        Ok(match method {
            SystemMethod::NewGuid => "NEWID()",
            SystemMethod::NewSequentialId => "NEWSEQUENTIALID()",
            SystemMethod::CurrentDateTime => "GETDATE()",
            SystemMethod::CurrentDateTimeOffset => "SYSDATETIMEOFFSET()",
            SystemMethod::CurrentUtcDateTime => "GETUTCDATE()",
            SystemMethod::CurrentUser => "CURRENT_USER",
        }
        .to_string())
    }
}

/// SQL Server 2016 type map.
pub fn sqlserver_type_map() -> TypeMapBase {
    let mut map = TypeMapBase::new(SQLSERVER);
    map.set(DbType::AnsiStringFixedLength, "CHAR(255)")
        .set_sized(DbType::AnsiStringFixedLength, "CHAR($size)", 8000)
        .set(DbType::AnsiString, "VARCHAR(255)")
        .set_sized(DbType::AnsiString, "VARCHAR($size)", 8000)
        .set_sized(DbType::AnsiString, "VARCHAR(MAX)", MAX_CAPACITY)
        .set(DbType::Binary, "VARBINARY(8000)")
        .set_sized(DbType::Binary, "VARBINARY($size)", 8000)
        .set_sized(DbType::Binary, "VARBINARY(MAX)", MAX_CAPACITY)
        .set(DbType::Boolean, "BIT")
        .set(DbType::Byte, "TINYINT")
        .set(DbType::Currency, "MONEY")
        .set(DbType::Date, "DATE")
        .set(DbType::DateTime, "DATETIME")
        .set(DbType::DateTime2, "DATETIME2")
        .set(DbType::DateTimeOffset, "DATETIMEOFFSET")
        .set_sized(DbType::DateTimeOffset, "DATETIMEOFFSET($size)", 7)
        .set(DbType::Decimal, "DECIMAL(19,5)")
        .set_sized(DbType::Decimal, "DECIMAL($size,$precision)", 38)
        .set(DbType::Double, "DOUBLE PRECISION")
        .set(DbType::Guid, "UNIQUEIDENTIFIER")
        .set(DbType::Int16, "SMALLINT")
        .set(DbType::Int32, "INT")
        .set(DbType::Int64, "BIGINT")
        .set(DbType::Single, "REAL")
        .set(DbType::StringFixedLength, "NCHAR(255)")
        .set_sized(DbType::StringFixedLength, "NCHAR($size)", 4000)
        .set(DbType::String, "NVARCHAR(255)")
        .set_sized(DbType::String, "NVARCHAR($size)", 4000)
        .set_sized(DbType::String, "NVARCHAR(MAX)", MAX_CAPACITY)
        .set(DbType::Time, "TIME")
        .set(DbType::Xml, "XML");
    map
}

/// SQL Server generator.
#[derive(Debug, Clone)]
pub struct SqlServerGenerator {
    quoter: SqlServerQuoter,
    types: TypeMapBase,
    mode: CompatibilityMode,
}

impl SqlServerGenerator {
    pub fn new(mode: CompatibilityMode) -> Self {
        Self {
            quoter: SqlServerQuoter,
            types: sqlserver_type_map(),
            mode,
        }
    }

    fn table(&self, table: &str, schema: Option<&str>) -> String {
        self.quoter.quote_table_name(table, schema)
    }

    /// Batch that drops the default constraint bound to `column`, if any.
    fn drop_default_constraint(&self, table: &str, column: &str) -> String {
        let q = &self.quoter;
        format!(
            "DECLARE @default sysname, @sql nvarchar(max);\n\
             SELECT @default = name FROM sys.default_constraints \
             WHERE parent_object_id = OBJECT_ID({table_literal}) \
             AND parent_column_id = COLUMNPROPERTY(OBJECT_ID({table_literal}), {column_literal}, 'ColumnId');\n\
             IF @default IS NOT NULL\n\
             BEGIN\n\
             SET @sql = {drop_prefix} + QUOTENAME(@default);\n\
             EXEC sp_executesql @sql;\n\
             END",
            table_literal = q.format_string(table),
            column_literal = q.format_string(column),
            drop_prefix = q.format_string(&format!("ALTER TABLE {} DROP CONSTRAINT ", table)),
        )
    }
}

impl Default for SqlServerGenerator {
    fn default() -> Self {
        Self::new(CompatibilityMode::Strict)
    }
}

impl Generator for SqlServerGenerator {
    fn dialect(&self) -> &str {
        SQLSERVER
    }

    fn aliases(&self) -> &[&str] {
        SQLSERVER_ALIASES
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

    fn rename_table(&self, e: &RenameTableExpression) -> Result<Vec<String>> {
        let q = &self.quoter;
        Ok(vec![format!(
            "sp_rename {}, {}",
            q.format_string(&self.table(&e.old_name, e.schema_name.as_deref())),
            q.format_string(&q.unquote(&e.new_name))
        )])
    }

    /// SQL Server's ADD takes no COLUMN keyword.
    fn create_column(&self, e: &CreateColumnExpression) -> Result<Vec<String>> {
        let mut statements = vec![format!(
            "ALTER TABLE {} ADD {}",
            self.table(&e.table_name, e.schema_name.as_deref()),
            self.format_column(&e.column, true)?
        )];
        if let Some(fk) = &e.column.foreign_key {
            statements.extend(self.create_foreign_key(&CreateForeignKeyExpression {
                foreign_key: fk.clone(),
            })?);
        }
        Ok(statements)
    }

    /// Defaults are separate constraints; a new default replaces the old one.
    fn alter_column(&self, e: &AlterColumnExpression) -> Result<Vec<String>> {
        let q = &self.quoter;
        let table = self.table(&e.table_name, e.schema_name.as_deref());
        let mut statements = vec![format!(
            "ALTER TABLE {} ALTER COLUMN {}",
            table,
            base::format_alter_column(self, &e.column)?
        )];
        if let Some(default) = &e.column.default_value {
            statements.push(self.drop_default_constraint(&table, &e.column.name));
            statements.push(format!(
                "ALTER TABLE {} ADD CONSTRAINT {} DEFAULT {} FOR {}",
                table,
                q.quote_identifier(&default_constraint_name(&e.table_name, &e.column.name)),
                q.quote_value(default)?,
                q.quote_column_name(&e.column.name)
            ));
        }
        Ok(statements)
    }

    fn delete_column(&self, e: &DeleteColumnExpression) -> Result<Vec<String>> {
        let table = self.table(&e.table_name, e.schema_name.as_deref());
        Ok(e.column_names
            .iter()
            .map(|column| {
                format!(
                    "{};\nALTER TABLE {} DROP COLUMN {}",
                    self.drop_default_constraint(&table, column),
                    table,
                    self.quoter.quote_column_name(column)
                )
            })
            .collect())
    }

    fn rename_column(&self, e: &RenameColumnExpression) -> Result<Vec<String>> {
        let q = &self.quoter;
        let qualified = format!(
            "{}.{}",
            self.table(&e.table_name, e.schema_name.as_deref()),
            q.quote_column_name(&e.old_name)
        );
        Ok(vec![format!(
            "sp_rename {}, {}, N'COLUMN'",
            q.format_string(&qualified),
            q.format_string(&q.unquote(&e.new_name))
        )])
    }

    fn create_index(&self, e: &CreateIndexExpression) -> Result<Vec<String>> {
        let index = &e.index;
        let q = &self.quoter;
        let mut sql = format!(
            "CREATE {}{}INDEX {} ON {} ({})",
            if index.is_unique { "UNIQUE " } else { "" },
            if index.is_clustered { "CLUSTERED " } else { "NONCLUSTERED " },
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
        Ok(vec![sql])
    }

    fn delete_index(&self, e: &DeleteIndexExpression) -> Result<Vec<String>> {
        let index = &e.index;
        Ok(vec![format!(
            "DROP INDEX {} ON {}",
            self.quoter.quote_identifier(base::index_name(index)?),
            self.table(&index.table_name, index.schema_name.as_deref())
        )])
    }

    fn alter_schema(&self, e: &AlterSchemaExpression) -> Result<Vec<String>> {
        Ok(vec![format!(
            "ALTER SCHEMA {} TRANSFER {}",
            self.quoter.quote_schema_name(&e.destination_schema_name),
            self.table(&e.table_name, e.source_schema_name.as_deref())
        )])
    }

    fn insert_data(&self, e: &InsertDataExpression) -> Result<Vec<String>> {
        let mut statements = base::insert_data(self, e)?;
        if e.identity_insert && !statements.is_empty() {
            let table = self.table(&e.table_name, e.schema_name.as_deref());
            statements.insert(0, format!("SET IDENTITY_INSERT {} ON", table));
            statements.push(format!("SET IDENTITY_INSERT {} OFF", table));
        }
        Ok(statements)
    }

    fn format_identity(&self, column: &ColumnDefinition) -> Result<String> {
        base::require_integer_identity(SQLSERVER, column)?;
        Ok("IDENTITY(1,1)".to_string())
    }
}

fn default_constraint_name(table: &str, column: &str) -> String {
    format!("DF_{}_{}", table, column)
}
