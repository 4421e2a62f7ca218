//! Column options shared by create-table, add-column and alter-column builders.

use crate::core::expression::{CreateIndexExpression, MigrationExpression};
use crate::core::schema::{
    ColumnDefinition, ComputedColumn, DbType, Direction, ForeignKeyDefinition, IndexColumn,
    IndexDefinition, Rule, SystemMethod,
};
use crate::core::value::SqlValue;
use crate::migration::context::MigrationContext;

/// Options applied to the builder's current column.
///
/// Implementors supply the hooks; every option is a provided method. An
/// option used while no column is current records a build error.
pub trait ColumnOptions: Sized {
    /// Column being configured, if any.
    fn current_column(&mut self) -> Option<&mut ColumnDefinition>;

    fn context(&mut self) -> &mut MigrationContext;

    /// Expression a backfill applies to, when adding or altering a column.
    fn backfill_target(&self) -> Option<usize>;

    /// Schema and table owning the current column.
    fn column_table(&mut self) -> Option<(Option<String>, String)>;

    /// Apply `f` to the current column.
    fn column_option(mut self, option: &str, f: impl FnOnce(&mut ColumnDefinition)) -> Self {
        match self.current_column() {
            Some(column) => f(column),
            None => self
                .context()
                .record_error(format!("{} called without a current column", option)),
        }
        self
    }

    fn typed(self, db_type: DbType, size: Option<u32>, precision: Option<u32>) -> Self {
        self.column_option("type", |c| {
            c.db_type = Some(db_type);
            c.size = size;
            c.precision = precision;
        })
    }

    fn as_ansi_string(self) -> Self {
        self.typed(DbType::AnsiString, None, None)
    }

    fn as_ansi_string_sized(self, size: u32) -> Self {
        self.typed(DbType::AnsiString, Some(size), None)
    }

    fn as_fixed_length_ansi_string(self, size: u32) -> Self {
        self.typed(DbType::AnsiStringFixedLength, Some(size), None)
    }

    fn as_binary(self) -> Self {
        self.typed(DbType::Binary, None, None)
    }

    fn as_binary_sized(self, size: u32) -> Self {
        self.typed(DbType::Binary, Some(size), None)
    }

    fn as_boolean(self) -> Self {
        self.typed(DbType::Boolean, None, None)
    }

    fn as_byte(self) -> Self {
        self.typed(DbType::Byte, None, None)
    }

    fn as_currency(self) -> Self {
        self.typed(DbType::Currency, None, None)
    }

    fn as_date(self) -> Self {
        self.typed(DbType::Date, None, None)
    }

    fn as_date_time(self) -> Self {
        self.typed(DbType::DateTime, None, None)
    }

    fn as_date_time2(self) -> Self {
        self.typed(DbType::DateTime2, None, None)
    }

    fn as_date_time_offset(self) -> Self {
        self.typed(DbType::DateTimeOffset, None, None)
    }

    fn as_decimal(self) -> Self {
        self.typed(DbType::Decimal, None, None)
    }

    /// `DECIMAL(size, precision)`
    fn as_decimal_sized(self, size: u32, precision: u32) -> Self {
        self.typed(DbType::Decimal, Some(size), Some(precision))
    }

    fn as_double(self) -> Self {
        self.typed(DbType::Double, None, None)
    }

    fn as_float(self) -> Self {
        self.typed(DbType::Single, None, None)
    }

    fn as_guid(self) -> Self {
        self.typed(DbType::Guid, None, None)
    }

    fn as_int16(self) -> Self {
        self.typed(DbType::Int16, None, None)
    }

    fn as_int32(self) -> Self {
        self.typed(DbType::Int32, None, None)
    }

    fn as_int64(self) -> Self {
        self.typed(DbType::Int64, None, None)
    }

    fn as_string(self) -> Self {
        self.typed(DbType::String, None, None)
    }

    fn as_string_sized(self, size: u32) -> Self {
        self.typed(DbType::String, Some(size), None)
    }

    fn as_fixed_length_string(self, size: u32) -> Self {
        self.typed(DbType::StringFixedLength, Some(size), None)
    }

    fn as_time(self) -> Self {
        self.typed(DbType::Time, None, None)
    }

    fn as_xml(self) -> Self {
        self.typed(DbType::Xml, None, None)
    }

    /// Dialect-specific type text, emitted verbatim.
    fn as_custom(self, sql_type: impl Into<String>) -> Self {
        let sql_type = sql_type.into();
        self.column_option("as_custom", |c| c.custom_type = Some(sql_type))
    }

    fn nullable(self) -> Self {
        self.column_option("nullable", |c| c.is_nullable = Some(true))
    }

    fn not_nullable(self) -> Self {
        self.column_option("not_nullable", |c| c.is_nullable = Some(false))
    }

    fn with_default_value(self, value: impl Into<SqlValue>) -> Self {
        let value = value.into();
        self.column_option("with_default_value", |c| c.default_value = Some(value))
    }

    fn with_default(self, method: SystemMethod) -> Self {
        self.with_default_value(SqlValue::Method(method))
    }

    fn identity(self) -> Self {
        self.column_option("identity", |c| c.is_identity = true)
    }

    fn primary_key(self) -> Self {
        self.column_option("primary_key", |c| c.is_primary_key = true)
    }

    fn primary_key_named(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.column_option("primary_key_named", |c| {
            c.is_primary_key = true;
            c.primary_key_name = Some(name);
        })
    }

    /// Inline UNIQUE constraint.
    fn unique(self) -> Self {
        self.column_option("unique", |c| c.is_unique = true)
    }

    /// Computed column; `stored` persists the value.
    fn computed(self, expression: impl Into<String>, stored: bool) -> Self {
        let expression = expression.into();
        self.column_option("computed", |c| {
            c.computed = Some(ComputedColumn { expression, stored })
        })
    }

    /// Reference `primary_table.primary_column`; the name comes from conventions.
    fn foreign_key(self, primary_table: impl Into<String>, primary_column: impl Into<String>) -> Self {
        let fk = ForeignKeyDefinition {
            primary_table: primary_table.into(),
            primary_columns: vec![primary_column.into()],
            ..Default::default()
        };
        self.column_option("foreign_key", |c| c.foreign_key = Some(fk))
    }

    fn foreign_key_named(
        self,
        name: impl Into<String>,
        primary_table: impl Into<String>,
        primary_column: impl Into<String>,
    ) -> Self {
        let fk = ForeignKeyDefinition {
            name: Some(name.into()),
            primary_table: primary_table.into(),
            primary_columns: vec![primary_column.into()],
            ..Default::default()
        };
        self.column_option("foreign_key_named", |c| c.foreign_key = Some(fk))
    }

    /// Schema of the referenced table.
    fn references_schema(mut self, schema: impl Into<String>) -> Self {
        let schema = schema.into();
        let applied = self
            .current_column()
            .and_then(|c| c.foreign_key.as_mut())
            .map(|fk| fk.primary_table_schema = Some(schema))
            .is_some();
        if !applied {
            self.context()
                .record_error("references_schema called without a foreign key");
        }
        self
    }

    fn on_delete(self, rule: Rule) -> Self {
        self.foreign_key_rule("on_delete", |fk| fk.on_delete = rule)
    }

    fn on_update(self, rule: Rule) -> Self {
        self.foreign_key_rule("on_update", |fk| fk.on_update = rule)
    }

    fn foreign_key_rule(mut self, option: &str, f: impl FnOnce(&mut ForeignKeyDefinition)) -> Self {
        match self.current_column().and_then(|c| c.foreign_key.as_mut()) {
            Some(fk) => f(fk),
            None => self
                .context()
                .record_error(format!("{} called without a foreign key", option)),
        }
        self
    }

    /// Non-unique index on the column; the name comes from conventions.
    fn indexed(self) -> Self {
        self.add_index(None)
    }

    fn indexed_named(self, name: impl Into<String>) -> Self {
        self.add_index(Some(name.into()))
    }

    fn add_index(mut self, name: Option<String>) -> Self {
        let column = self.current_column().map(|c| c.name.clone());
        match (column, self.column_table()) {
            (Some(column), Some((schema_name, table_name))) => {
                self.context()
                    .push(MigrationExpression::CreateIndex(CreateIndexExpression {
                        index: IndexDefinition {
                            name,
                            schema_name,
                            table_name,
                            columns: vec![IndexColumn {
                                name: column,
                                direction: Direction::Ascending,
                            }],
                            ..Default::default()
                        },
                    }));
            }
            _ => self
                .context()
                .record_error("indexed called without a current column"),
        }
        self
    }

    /// Fill existing rows with `value`, so the column can be made NOT NULL.
    ///
    /// Only valid when adding or altering a column.
    fn set_existing_rows_to(mut self, value: impl Into<SqlValue>) -> Self {
        match self.backfill_target() {
            Some(index) => self.context().set_backfill(index, value.into()),
            None => self.context().record_error(
                "set_existing_rows_to is only valid when adding or altering a column",
            ),
        }
        self
    }
}
