//! `ctx.alter()` builders.

use crate::core::expression::*;
use crate::core::schema::{ColumnDefinition, ColumnModification};
use crate::migration::context::MigrationContext;

use super::column::ColumnOptions;

pub struct AlterBuilder<'a> {
    ctx: &'a mut MigrationContext,
}

impl<'a> AlterBuilder<'a> {
    pub(crate) fn new(ctx: &'a mut MigrationContext) -> Self {
        Self { ctx }
    }

    /// Add or alter columns of an existing table.
    pub fn table(self, name: impl Into<String>) -> AlterTableBuilder<'a> {
        let table = name.into();
        let index = self
            .ctx
            .push(MigrationExpression::AlterTable(AlterTableExpression {
                schema_name: None,
                table_name: table.clone(),
            }));
        AlterTableBuilder {
            ctx: self.ctx,
            index,
            schema: None,
            table,
            current: None,
        }
    }

    /// Alter a single column; the table is named with `on_table`.
    pub fn column(self, name: impl Into<String>) -> AlterColumnBuilder<'a> {
        let index = self
            .ctx
            .push(MigrationExpression::AlterColumn(AlterColumnExpression {
                schema_name: None,
                table_name: String::new(),
                column: altered(name.into(), String::new()),
            }));
        AlterColumnBuilder { ctx: self.ctx, index }
    }
}

fn altered(name: String, table: String) -> ColumnDefinition {
    let mut column = ColumnDefinition::new(name);
    column.table_name = table;
    column.modification = ColumnModification::Alter;
    column
}

// =============================================================================
// Table
// =============================================================================

pub struct AlterTableBuilder<'a> {
    ctx: &'a mut MigrationContext,
    index: usize,
    schema: Option<String>,
    table: String,
    /// Expression of the column being added or altered.
    current: Option<usize>,
}

impl<'a> AlterTableBuilder<'a> {
    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        let schema = schema.into();
        if let Some(MigrationExpression::AlterTable(e)) = self.ctx.expression_mut(self.index) {
            e.schema_name = Some(schema.clone());
        }
        self.schema = Some(schema);
        self
    }

    pub fn add_column(mut self, name: impl Into<String>) -> Self {
        let mut column = ColumnDefinition::new(name);
        column.table_name = self.table.clone();
        self.current = Some(self.ctx.push(MigrationExpression::CreateColumn(
            CreateColumnExpression {
                schema_name: self.schema.clone(),
                table_name: self.table.clone(),
                column,
            },
        )));
        self
    }

    pub fn alter_column(mut self, name: impl Into<String>) -> Self {
        let column = altered(name.into(), self.table.clone());
        self.current = Some(self.ctx.push(MigrationExpression::AlterColumn(
            AlterColumnExpression {
                schema_name: self.schema.clone(),
                table_name: self.table.clone(),
                column,
            },
        )));
        self
    }

    /// Move the table into `schema`.
    pub fn to_schema(self, schema: impl Into<String>) -> Self {
        self.ctx
            .push(MigrationExpression::AlterSchema(AlterSchemaExpression {
                source_schema_name: self.schema.clone(),
                table_name: self.table.clone(),
                destination_schema_name: schema.into(),
            }));
        self
    }
}

impl ColumnOptions for AlterTableBuilder<'_> {
    fn current_column(&mut self) -> Option<&mut ColumnDefinition> {
        match self.ctx.expression_mut(self.current?)? {
            MigrationExpression::CreateColumn(e) => Some(&mut e.column),
            MigrationExpression::AlterColumn(e) => Some(&mut e.column),
            _ => None,
        }
    }

    fn context(&mut self) -> &mut MigrationContext {
        self.ctx
    }

    fn backfill_target(&self) -> Option<usize> {
        self.current
    }

    fn column_table(&mut self) -> Option<(Option<String>, String)> {
        Some((self.schema.clone(), self.table.clone()))
    }
}

// =============================================================================
// Column
// =============================================================================

pub struct AlterColumnBuilder<'a> {
    ctx: &'a mut MigrationContext,
    index: usize,
}

impl<'a> AlterColumnBuilder<'a> {
    fn expression(&mut self) -> Option<&mut AlterColumnExpression> {
        match self.ctx.expression_mut(self.index) {
            Some(MigrationExpression::AlterColumn(e)) => Some(e),
            _ => None,
        }
    }

    pub fn on_table(mut self, table: impl Into<String>) -> Self {
        if let Some(e) = self.expression() {
            e.table_name = table.into();
            e.column.table_name = e.table_name.clone();
        }
        self
    }

    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        if let Some(e) = self.expression() {
            e.schema_name = Some(schema.into());
        }
        self
    }
}

impl ColumnOptions for AlterColumnBuilder<'_> {
    fn current_column(&mut self) -> Option<&mut ColumnDefinition> {
        self.expression().map(|e| &mut e.column)
    }

    fn context(&mut self) -> &mut MigrationContext {
        self.ctx
    }

    fn backfill_target(&self) -> Option<usize> {
        Some(self.index)
    }

    fn column_table(&mut self) -> Option<(Option<String>, String)> {
        self.expression()
            .map(|e| (e.schema_name.clone(), e.table_name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::schema::DbType;
    use crate::core::traits::{Generator, ProcessorOptions};
    use crate::drivers::{ConnectionlessProcessor, PostgresGenerator};
    use crate::migration::conventions::Conventions;

    fn ctx() -> MigrationContext {
        let processor = Arc::new(ConnectionlessProcessor::new(
            Box::new(PostgresGenerator::default()),
            ProcessorOptions::default(),
        ));
        MigrationContext::new(processor, Arc::new(Conventions::default()))
    }

    #[test]
    fn test_alter_table_mixes_add_and_alter() {
        let mut ctx = ctx();
        ctx.alter()
            .table("Users")
            .in_schema("app")
            .add_column("Nickname")
            .as_string_sized(50)
            .nullable()
            .alter_column("Email")
            .as_string_sized(320);
        let expressions = ctx.finish().unwrap();
        assert_eq!(expressions.len(), 3);
        match (&expressions[1], &expressions[2]) {
            (MigrationExpression::CreateColumn(add), MigrationExpression::AlterColumn(alter)) => {
                assert_eq!(add.schema_name.as_deref(), Some("app"));
                assert_eq!(add.column.size, Some(50));
                assert_eq!(alter.column.modification, ColumnModification::Alter);
                assert_eq!(alter.column.db_type, Some(DbType::String));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_alter_column_set_existing_rows_postgres() {
        let mut ctx = ctx();
        ctx.alter()
            .column("SomeDate")
            .on_table("Bar")
            .as_int32()
            .not_nullable()
            .set_existing_rows_to(5);
        let generator = PostgresGenerator::default();
        let sql: Vec<String> = ctx
            .finish()
            .unwrap()
            .iter()
            .flat_map(|e| generator.generate(e).unwrap())
            .collect();
        assert_eq!(
            sql,
            vec![
                "UPDATE \"Bar\" SET \"SomeDate\" = 5",
                "ALTER TABLE \"Bar\" ALTER COLUMN \"SomeDate\" TYPE INTEGER, ALTER COLUMN \"SomeDate\" SET NOT NULL",
            ]
        );
    }

    #[test]
    fn test_set_existing_rows_before_any_column_is_build_error() {
        let mut ctx = ctx();
        ctx.alter().table("Users").set_existing_rows_to(1);
        assert!(ctx.finish().is_err());
    }

    #[test]
    fn test_to_schema() {
        let mut ctx = ctx();
        ctx.alter().table("Users").in_schema("public").to_schema("auth");
        match &ctx.finish().unwrap()[1] {
            MigrationExpression::AlterSchema(e) => {
                assert_eq!(e.source_schema_name.as_deref(), Some("public"));
                assert_eq!(e.destination_schema_name, "auth");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
