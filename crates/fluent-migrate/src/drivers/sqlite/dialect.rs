//! SQLite quoting, type map and generator.
//!
//! SQLite cannot alter columns, add constraints to existing tables, or hold
//! sequences and schemas. Those operations go through the compatibility
//! policy; foreign keys are declared inside CREATE TABLE instead.

use crate::core::expression::*;
use crate::core::schema::{ColumnDefinition, ConstraintKind, DbType, ForeignKeyDefinition, SystemMethod};
use crate::core::traits::{CompatibilityMode, Generator, Quoter, TypeMap};
use crate::dialect::generator as base;
use crate::dialect::TypeMapBase;
use crate::error::{MigrateError, Result};

/// Canonical SQLite database type identifier.
pub const SQLITE: &str = "SQLite";

/// Other identifiers accepted for this dialect.
pub const SQLITE_ALIASES: &[&str] = &["sqlite3"];

#[derive(Debug, Clone, Default)]
pub struct SqliteQuoter;

impl Quoter for SqliteQuoter {
    fn open_quote(&self) -> &str {
        "\""
    }

    fn close_quote(&self) -> &str {
        "\""
    }

    fn format_bytes(&self, value: &[u8]) -> String {
        format!("X'{}'", hex::encode_upper(value))
    }

    fn format_system_method(&self, method: SystemMethod) -> Result<String> {
        match method {
            SystemMethod::CurrentDateTime => Ok("(datetime('now','localtime'))".to_string()),
            SystemMethod::CurrentUtcDateTime => Ok("CURRENT_TIMESTAMP".to_string()),
            other => Err(MigrateError::not_supported(SQLITE, format!("{:?} defaults", other))),
        }
    }
}

/// SQLite type map. Every type maps to one of SQLite's storage affinities.
pub fn sqlite_type_map() -> TypeMapBase {
    let mut map = TypeMapBase::new(SQLITE);
    map.set(DbType::AnsiStringFixedLength, "TEXT")
        .set(DbType::AnsiString, "TEXT")
        .set(DbType::Binary, "BLOB")
        .set(DbType::Boolean, "INTEGER")
        .set(DbType::Byte, "INTEGER")
        .set(DbType::Currency, "NUMERIC")
        .set(DbType::Date, "DATETIME")
        .set(DbType::DateTime, "DATETIME")
        .set(DbType::DateTime2, "DATETIME")
        .set(DbType::DateTimeOffset, "DATETIME")
        .set(DbType::Decimal, "NUMERIC")
        .set(DbType::Double, "REAL")
        .set(DbType::Guid, "UNIQUEIDENTIFIER")
        .set(DbType::Int16, "INTEGER")
        .set(DbType::Int32, "INTEGER")
        .set(DbType::Int64, "INTEGER")
        .set(DbType::Single, "REAL")
        .set(DbType::StringFixedLength, "TEXT")
        .set(DbType::String, "TEXT")
        .set(DbType::Time, "DATETIME")
        .set(DbType::Xml, "TEXT");
    map
}

#[derive(Debug, Clone)]
pub struct SqliteGenerator {
    quoter: SqliteQuoter,
    types: TypeMapBase,
    mode: CompatibilityMode,
}

impl SqliteGenerator {
    pub fn new(mode: CompatibilityMode) -> Self {
        Self {
            quoter: SqliteQuoter,
            types: sqlite_type_map(),
            mode,
        }
    }

    fn table(&self, table: &str, schema: Option<&str>) -> String {
        self.quoter.quote_table_name(table, schema)
    }

    /// `REFERENCES table (cols) [ON DELETE ..] [ON UPDATE ..]`
    fn references(&self, fk: &ForeignKeyDefinition) -> String {
        let q = &self.quoter;
        let mut sql = format!(
            "REFERENCES {} ({})",
            self.table(&fk.primary_table, fk.primary_table_schema.as_deref()),
            base::quote_columns(q, &fk.primary_columns)
        );
        if let Some(rule) = fk.on_delete.as_sql() {
            sql.push_str(&format!(" ON DELETE {}", rule));
        }
        if let Some(rule) = fk.on_update.as_sql() {
            sql.push_str(&format!(" ON UPDATE {}", rule));
        }
        sql
    }
}

impl Default for SqliteGenerator {
    fn default() -> Self {
        Self::new(CompatibilityMode::Strict)
    }
}

impl Generator for SqliteGenerator {
    fn dialect(&self) -> &str {
        SQLITE
    }

    fn aliases(&self) -> &[&str] {
        SQLITE_ALIASES
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

    /// Identity columns become `INTEGER PRIMARY KEY AUTOINCREMENT`.
    fn format_column(&self, column: &ColumnDefinition, inline_primary_key: bool) -> Result<String> {
        if !column.is_identity {
            return base::format_column(self, column, inline_primary_key);
        }
        base::require_integer_identity(SQLITE, column)?;
        if !inline_primary_key || !column.is_primary_key {
            return Err(MigrateError::Generation(format!(
                "SQLite identity column '{}' must be the table's only primary key column",
                column.name
            )));
        }
        let mut plain = column.clone();
        plain.is_identity = false;
        plain.is_primary_key = false;
        plain.is_unique = false;
        plain.db_type = Some(DbType::Int64);
        plain.custom_type = None;
        let mut sql = base::format_column(self, &plain, false)?;
        sql.push_str(" PRIMARY KEY AUTOINCREMENT");
        if column.is_unique {
            sql.push_str(" UNIQUE");
        }
        Ok(sql)
    }

    fn format_identity(&self, _column: &ColumnDefinition) -> Result<String> {
        Ok(String::new())
    }

    /// `<name> AS (<expression>) [STORED|VIRTUAL] [NOT NULL]`
    fn format_computed_column(&self, column: &ColumnDefinition) -> Result<String> {
        let computed = base::computed_of(column)?;
        let mut sql = format!(
            "{} AS ({}) {}",
            self.quoter.quote_column_name(&column.name),
            computed.expression,
            if computed.stored { "STORED" } else { "VIRTUAL" }
        );
        if column.is_nullable == Some(false) {
            sql.push_str(" NOT NULL");
        }
        Ok(sql)
    }

    fn create_table(&self, e: &CreateTableExpression) -> Result<Vec<String>> {
        let mut table = e.table.clone();
        if table.columns.iter().any(|c| c.is_identity) {
            for column in &mut table.columns {
                column.primary_key_name = None;
            }
        }
        let mut definitions = base::table_definitions(self, &table)?;
        for fk in table.columns.iter().filter_map(|c| c.foreign_key.as_ref()) {
            let constraint = fk
                .name
                .as_deref()
                .map(|n| format!("CONSTRAINT {} ", self.quoter.quote_identifier(n)))
                .unwrap_or_default();
            definitions.push(format!(
                "{}{}",
                constraint,
                base::foreign_key_clause(&self.quoter, fk)
            ));
        }
        Ok(vec![format!(
            "CREATE TABLE {} ({})",
            self.table(&table.name, table.schema_name.as_deref()),
            definitions.join(", ")
        )])
    }

    fn create_column(&self, e: &CreateColumnExpression) -> Result<Vec<String>> {
        let mut definition = self.format_column(&e.column, true)?;
        if let Some(fk) = &e.column.foreign_key {
            definition.push(' ');
            definition.push_str(&self.references(fk));
        }
        Ok(vec![format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.table(&e.table_name, e.schema_name.as_deref()),
            definition
        )])
    }

    fn alter_column(&self, _e: &AlterColumnExpression) -> Result<Vec<String>> {
        self.compatibility("altering columns")
    }

    fn create_foreign_key(&self, _e: &CreateForeignKeyExpression) -> Result<Vec<String>> {
        self.compatibility("adding foreign keys to existing tables")
    }

    fn delete_foreign_key(&self, _e: &DeleteForeignKeyExpression) -> Result<Vec<String>> {
        self.compatibility("dropping foreign keys")
    }

    /// Unique constraints are emulated with unique indexes.
    fn create_constraint(&self, e: &CreateConstraintExpression) -> Result<Vec<String>> {
        let c = &e.constraint;
        match (c.kind, c.name.as_deref()) {
            (ConstraintKind::Unique, Some(name)) => Ok(vec![format!(
                "CREATE UNIQUE INDEX {} ON {} ({})",
                self.quoter.quote_identifier(name),
                self.quoter.quote_identifier(&c.table_name),
                base::quote_columns(&self.quoter, &c.columns)
            )]),
            _ => self.compatibility("adding primary keys to existing tables"),
        }
    }

    fn delete_constraint(&self, e: &DeleteConstraintExpression) -> Result<Vec<String>> {
        let c = &e.constraint;
        match (c.kind, c.name.as_deref()) {
            (ConstraintKind::Unique, Some(name)) => Ok(vec![format!(
                "DROP INDEX {}",
                self.table(name, c.schema_name.as_deref())
            )]),
            _ => self.compatibility("dropping primary keys"),
        }
    }

    fn create_sequence(&self, _e: &CreateSequenceExpression) -> Result<Vec<String>> {
        self.compatibility("sequences")
    }

    fn delete_sequence(&self, _e: &DeleteSequenceExpression) -> Result<Vec<String>> {
        self.compatibility("sequences")
    }

    fn create_schema(&self, _e: &CreateSchemaExpression) -> Result<Vec<String>> {
        self.compatibility("schemas")
    }

    fn delete_schema(&self, _e: &DeleteSchemaExpression) -> Result<Vec<String>> {
        self.compatibility("schemas")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{ConstraintDefinition, Rule, TableDefinition};
    use crate::core::value::SqlValue;

    fn column(name: &str, db_type: DbType) -> ColumnDefinition {
        let mut c = ColumnDefinition::new(name);
        c.db_type = Some(db_type);
        c
    }

    #[test]
    fn test_identity_is_autoincrement() {
        let mut id = column("Id", DbType::Int32);
        id.is_identity = true;
        id.is_primary_key = true;
        id.primary_key_name = Some("PK_Users".into());
        let sql = SqliteGenerator::default()
            .create_table(&CreateTableExpression {
                table: TableDefinition {
                    schema_name: None,
                    name: "Users".into(),
                    columns: vec![id, column("Name", DbType::String)],
                },
            })
            .unwrap();
        assert_eq!(
            sql,
            vec!["CREATE TABLE \"Users\" (\"Id\" INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT, \"Name\" TEXT NOT NULL)"]
        );
    }

    #[test]
    fn test_foreign_key_declared_inline() {
        let mut user_id = column("UserId", DbType::Int32);
        user_id.foreign_key = Some(ForeignKeyDefinition {
            name: Some("FK_Orders_UserId_Users_Id".into()),
            foreign_table: "Orders".into(),
            foreign_columns: vec!["UserId".into()],
            primary_table: "Users".into(),
            primary_columns: vec!["Id".into()],
            on_delete: Rule::Cascade,
            ..Default::default()
        });
        let sql = SqliteGenerator::default()
            .create_table(&CreateTableExpression {
                table: TableDefinition {
                    schema_name: None,
                    name: "Orders".into(),
                    columns: vec![user_id],
                },
            })
            .unwrap();
        assert_eq!(sql.len(), 1);
        assert!(sql[0].ends_with(
            "CONSTRAINT \"FK_Orders_UserId_Users_Id\" FOREIGN KEY (\"UserId\") REFERENCES \"Users\" (\"Id\") ON DELETE CASCADE)"
        ));
    }

    #[test]
    fn test_alter_column_compatibility() {
        let expr = AlterColumnExpression {
            schema_name: None,
            table_name: "Bar".into(),
            column: column("SomeDate", DbType::DateTime),
        };
        let err = SqliteGenerator::default().alter_column(&expr).unwrap_err();
        assert!(matches!(err, MigrateError::NotSupported { .. }));

        let annotated = SqliteGenerator::new(CompatibilityMode::Annotate)
            .alter_column(&expr)
            .unwrap();
        assert_eq!(annotated, vec!["-- SQLite does not support altering columns; skipped"]);
    }

    #[test]
    fn test_unique_constraint_becomes_index() {
        let mut constraint = ConstraintDefinition::new(ConstraintKind::Unique, "Users");
        constraint.name = Some("UC_Users_Email".into());
        constraint.columns = vec!["Email".into()];
        let sql = SqliteGenerator::default()
            .create_constraint(&CreateConstraintExpression { constraint })
            .unwrap();
        assert_eq!(sql, vec!["CREATE UNIQUE INDEX \"UC_Users_Email\" ON \"Users\" (\"Email\")"]);
    }

    #[test]
    fn test_system_methods() {
        let q = SqliteQuoter;
        assert_eq!(
            q.quote_value(&SqlValue::Method(SystemMethod::CurrentUtcDateTime)).unwrap(),
            "CURRENT_TIMESTAMP"
        );
        assert!(q.quote_value(&SqlValue::Method(SystemMethod::NewGuid)).is_err());
    }

    #[test]
    fn test_sequences_loose_skip() {
        let sql = SqliteGenerator::new(CompatibilityMode::Loose)
            .create_sequence(&CreateSequenceExpression {
                sequence: Default::default(),
            })
            .unwrap();
        assert!(sql.is_empty());
    }
}
