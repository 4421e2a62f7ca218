//! `ctx.create()` builders.

use crate::core::expression::*;
use crate::core::schema::{
    ColumnDefinition, ConstraintDefinition, ConstraintKind, Direction, ForeignKeyDefinition,
    IndexColumn, IndexDefinition, Rule, SequenceDefinition, TableDefinition,
};
use crate::migration::context::MigrationContext;

use super::column::ColumnOptions;

pub struct CreateBuilder<'a> {
    ctx: &'a mut MigrationContext,
}

impl<'a> CreateBuilder<'a> {
    pub(crate) fn new(ctx: &'a mut MigrationContext) -> Self {
        Self { ctx }
    }

    pub fn table(self, name: impl Into<String>) -> CreateTableBuilder<'a> {
        let index = self
            .ctx
            .push(MigrationExpression::CreateTable(CreateTableExpression {
                table: TableDefinition {
                    name: name.into(),
                    ..Default::default()
                },
            }));
        CreateTableBuilder {
            ctx: self.ctx,
            index,
            column: None,
        }
    }

    /// Add a column to an existing table.
    pub fn column(self, name: impl Into<String>) -> CreateColumnBuilder<'a> {
        let index = self
            .ctx
            .push(MigrationExpression::CreateColumn(CreateColumnExpression {
                schema_name: None,
                table_name: String::new(),
                column: ColumnDefinition::new(name),
            }));
        CreateColumnBuilder { ctx: self.ctx, index }
    }

    pub fn index(self) -> CreateIndexBuilder<'a> {
        let index = self
            .ctx
            .push(MigrationExpression::CreateIndex(CreateIndexExpression {
                index: IndexDefinition::default(),
            }));
        CreateIndexBuilder { ctx: self.ctx, index }
    }

    pub fn foreign_key(self) -> CreateForeignKeyBuilder<'a> {
        let index = self
            .ctx
            .push(MigrationExpression::CreateForeignKey(CreateForeignKeyExpression {
                foreign_key: ForeignKeyDefinition::default(),
            }));
        CreateForeignKeyBuilder { ctx: self.ctx, index }
    }

    pub fn unique_constraint(self) -> CreateConstraintBuilder<'a> {
        self.constraint(ConstraintKind::Unique)
    }

    pub fn primary_key(self) -> CreateConstraintBuilder<'a> {
        self.constraint(ConstraintKind::PrimaryKey)
    }

    fn constraint(self, kind: ConstraintKind) -> CreateConstraintBuilder<'a> {
        let index = self
            .ctx
            .push(MigrationExpression::CreateConstraint(CreateConstraintExpression {
                constraint: ConstraintDefinition::new(kind, ""),
            }));
        CreateConstraintBuilder { ctx: self.ctx, index }
    }

    pub fn sequence(self, name: impl Into<String>) -> CreateSequenceBuilder<'a> {
        let index = self
            .ctx
            .push(MigrationExpression::CreateSequence(CreateSequenceExpression {
                sequence: SequenceDefinition {
                    name: name.into(),
                    ..Default::default()
                },
            }));
        CreateSequenceBuilder { ctx: self.ctx, index }
    }

    pub fn schema(self, name: impl Into<String>) {
        self.ctx
            .push(MigrationExpression::CreateSchema(CreateSchemaExpression {
                schema_name: name.into(),
            }));
    }
}

// =============================================================================
// Table
// =============================================================================

pub struct CreateTableBuilder<'a> {
    ctx: &'a mut MigrationContext,
    index: usize,
    column: Option<usize>,
}

impl<'a> CreateTableBuilder<'a> {
    fn table(&mut self) -> Option<&mut TableDefinition> {
        match self.ctx.expression_mut(self.index) {
            Some(MigrationExpression::CreateTable(e)) => Some(&mut e.table),
            _ => None,
        }
    }

    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        if let Some(table) = self.table() {
            table.schema_name = Some(schema.into());
        }
        self
    }

    /// Start a new column; the options that follow apply to it.
    pub fn with_column(mut self, name: impl Into<String>) -> Self {
        let added = self.table().map(|table| {
            let mut column = ColumnDefinition::new(name);
            column.table_name = table.name.clone();
            table.columns.push(column);
            table.columns.len() - 1
        });
        if added.is_some() {
            self.column = added;
        }
        self
    }
}

impl ColumnOptions for CreateTableBuilder<'_> {
    fn current_column(&mut self) -> Option<&mut ColumnDefinition> {
        let column = self.column?;
        self.table()?.columns.get_mut(column)
    }

    fn context(&mut self) -> &mut MigrationContext {
        self.ctx
    }

    fn backfill_target(&self) -> Option<usize> {
        None
    }

    fn column_table(&mut self) -> Option<(Option<String>, String)> {
        self.table().map(|t| (t.schema_name.clone(), t.name.clone()))
    }
}

// =============================================================================
// Column
// =============================================================================

pub struct CreateColumnBuilder<'a> {
    ctx: &'a mut MigrationContext,
    index: usize,
}

impl<'a> CreateColumnBuilder<'a> {
    fn expression(&mut self) -> Option<&mut CreateColumnExpression> {
        match self.ctx.expression_mut(self.index) {
            Some(MigrationExpression::CreateColumn(e)) => Some(e),
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

impl ColumnOptions for CreateColumnBuilder<'_> {
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

// =============================================================================
// Index
// =============================================================================

pub struct CreateIndexBuilder<'a> {
    ctx: &'a mut MigrationContext,
    index: usize,
}

impl<'a> CreateIndexBuilder<'a> {
    fn definition(&mut self) -> Option<&mut IndexDefinition> {
        match self.ctx.expression_mut(self.index) {
            Some(MigrationExpression::CreateIndex(e)) => Some(&mut e.index),
            _ => None,
        }
    }

    fn with(mut self, f: impl FnOnce(&mut IndexDefinition)) -> Self {
        if let Some(index) = self.definition() {
            f(index);
        }
        self
    }

    pub fn named(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.with(|i| i.name = Some(name))
    }

    pub fn on_table(self, table: impl Into<String>) -> Self {
        let table = table.into();
        self.with(|i| i.table_name = table)
    }

    pub fn in_schema(self, schema: impl Into<String>) -> Self {
        let schema = schema.into();
        self.with(|i| i.schema_name = Some(schema))
    }

    /// Add an ascending key column.
    pub fn on_column(self, column: impl Into<String>) -> Self {
        let name = column.into();
        self.with(|i| {
            i.columns.push(IndexColumn {
                name,
                direction: Direction::Ascending,
            })
        })
    }

    pub fn on_columns<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        columns.into_iter().fold(self, |b, c| b.on_column(c))
    }

    /// Sort the last added column in descending order.
    pub fn descending(mut self) -> Self {
        let missing = match self.definition().and_then(|i| i.columns.last_mut()) {
            Some(column) => {
                column.direction = Direction::Descending;
                false
            }
            None => true,
        };
        if missing {
            self.ctx.record_error("descending called before any index column");
        }
        self
    }

    pub fn unique(self) -> Self {
        self.with(|i| i.is_unique = true)
    }

    pub fn clustered(self) -> Self {
        self.with(|i| i.is_clustered = true)
    }

    /// Non-key column carried by the index.
    pub fn include(self, column: impl Into<String>) -> Self {
        let column = column.into();
        self.with(|i| i.includes.push(column))
    }

    /// Partial index predicate, emitted verbatim.
    pub fn filter(self, predicate: impl Into<String>) -> Self {
        let predicate = predicate.into();
        self.with(|i| i.filter = Some(predicate))
    }
}

// =============================================================================
// Foreign key
// =============================================================================

pub struct CreateForeignKeyBuilder<'a> {
    ctx: &'a mut MigrationContext,
    index: usize,
}

impl<'a> CreateForeignKeyBuilder<'a> {
    fn with(self, f: impl FnOnce(&mut ForeignKeyDefinition)) -> Self {
        if let Some(MigrationExpression::CreateForeignKey(e)) = self.ctx.expression_mut(self.index)
        {
            f(&mut e.foreign_key);
        }
        self
    }

    pub fn named(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.with(|fk| fk.name = Some(name))
    }

    /// Referencing table.
    pub fn from_table(self, table: impl Into<String>) -> Self {
        let table = table.into();
        self.with(|fk| fk.foreign_table = table)
    }

    pub fn from_schema(self, schema: impl Into<String>) -> Self {
        let schema = schema.into();
        self.with(|fk| fk.foreign_table_schema = Some(schema))
    }

    pub fn foreign_column(self, column: impl Into<String>) -> Self {
        let column = column.into();
        self.with(|fk| fk.foreign_columns.push(column))
    }

    /// Referenced table.
    pub fn to_table(self, table: impl Into<String>) -> Self {
        let table = table.into();
        self.with(|fk| fk.primary_table = table)
    }

    pub fn to_schema(self, schema: impl Into<String>) -> Self {
        let schema = schema.into();
        self.with(|fk| fk.primary_table_schema = Some(schema))
    }

    pub fn primary_column(self, column: impl Into<String>) -> Self {
        let column = column.into();
        self.with(|fk| fk.primary_columns.push(column))
    }

    pub fn on_delete(self, rule: Rule) -> Self {
        self.with(|fk| fk.on_delete = rule)
    }

    pub fn on_update(self, rule: Rule) -> Self {
        self.with(|fk| fk.on_update = rule)
    }
}

// =============================================================================
// Constraint
// =============================================================================

pub struct CreateConstraintBuilder<'a> {
    ctx: &'a mut MigrationContext,
    index: usize,
}

impl<'a> CreateConstraintBuilder<'a> {
    fn with(self, f: impl FnOnce(&mut ConstraintDefinition)) -> Self {
        if let Some(MigrationExpression::CreateConstraint(e)) = self.ctx.expression_mut(self.index)
        {
            f(&mut e.constraint);
        }
        self
    }

    pub fn named(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.with(|c| c.name = Some(name))
    }

    pub fn on_table(self, table: impl Into<String>) -> Self {
        let table = table.into();
        self.with(|c| c.table_name = table)
    }

    pub fn in_schema(self, schema: impl Into<String>) -> Self {
        let schema = schema.into();
        self.with(|c| c.schema_name = Some(schema))
    }

    pub fn column(self, column: impl Into<String>) -> Self {
        let column = column.into();
        self.with(|c| c.columns.push(column))
    }

    pub fn columns<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        columns.into_iter().fold(self, |b, c| b.column(c))
    }
}

// =============================================================================
// Sequence
// =============================================================================

pub struct CreateSequenceBuilder<'a> {
    ctx: &'a mut MigrationContext,
    index: usize,
}

impl<'a> CreateSequenceBuilder<'a> {
    fn with(self, f: impl FnOnce(&mut SequenceDefinition)) -> Self {
        if let Some(MigrationExpression::CreateSequence(e)) = self.ctx.expression_mut(self.index) {
            f(&mut e.sequence);
        }
        self
    }

    pub fn in_schema(self, schema: impl Into<String>) -> Self {
        let schema = schema.into();
        self.with(|s| s.schema_name = Some(schema))
    }

    pub fn increment_by(self, value: i64) -> Self {
        self.with(|s| s.increment = Some(value))
    }

    pub fn min_value(self, value: i64) -> Self {
        self.with(|s| s.min_value = Some(value))
    }

    pub fn max_value(self, value: i64) -> Self {
        self.with(|s| s.max_value = Some(value))
    }

    pub fn start_with(self, value: i64) -> Self {
        self.with(|s| s.start_with = Some(value))
    }

    pub fn cache(self, value: i64) -> Self {
        self.with(|s| s.cache = Some(value))
    }

    pub fn cycle(self) -> Self {
        self.with(|s| s.cycle = true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::schema::DbType;
    use crate::core::traits::{Generator, ProcessorOptions};
    use crate::drivers::{ConnectionlessProcessor, JetGenerator, SqlServerGenerator};
    use crate::migration::conventions::Conventions;

    fn ctx() -> MigrationContext {
        let processor = Arc::new(ConnectionlessProcessor::new(
            Box::new(SqlServerGenerator::default()),
            ProcessorOptions::default(),
        ));
        MigrationContext::new(processor, Arc::new(Conventions::default()))
    }

    #[test]
    fn test_create_table_columns_share_expression() {
        let mut ctx = ctx();
        ctx.create()
            .table("Contexts")
            .with_column("Id")
            .as_int32()
            .identity()
            .primary_key()
            .not_nullable()
            .with_column("Name")
            .as_string()
            .not_nullable();
        let expressions = ctx.finish().unwrap();
        assert_eq!(expressions.len(), 1);
        let sql = JetGenerator::default().generate(&expressions[0]).unwrap();
        assert_eq!(
            sql,
            vec!["CREATE TABLE [Contexts] ([Id] INTEGER NOT NULL IDENTITY(1,1) PRIMARY KEY, [Name] VARCHAR(255) NOT NULL)"]
        );
    }

    #[test]
    fn test_indexed_column_adds_create_index() {
        let mut ctx = ctx();
        ctx.create()
            .table("Users")
            .in_schema("app")
            .with_column("Email")
            .as_string_sized(200)
            .indexed();
        let expressions = ctx.finish().unwrap();
        assert_eq!(expressions.len(), 2);
        match &expressions[1] {
            MigrationExpression::CreateIndex(e) => {
                assert_eq!(e.index.name.as_deref(), Some("IX_Users_Email"));
                assert_eq!(e.index.schema_name.as_deref(), Some("app"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_column_foreign_key_gets_conventional_name() {
        let mut ctx = ctx();
        ctx.create()
            .table("Orders")
            .with_column("UserId")
            .as_int32()
            .foreign_key("Users", "Id")
            .on_delete(Rule::Cascade);
        let sql = SqlServerGenerator::default()
            .generate(&ctx.finish().unwrap()[0])
            .unwrap();
        assert_eq!(
            sql,
            vec![
                "CREATE TABLE [Orders] ([UserId] INT NOT NULL)",
                "ALTER TABLE [Orders] ADD CONSTRAINT [FK_Orders_UserId_Users_Id] FOREIGN KEY ([UserId]) REFERENCES [Users] ([Id]) ON DELETE CASCADE",
            ]
        );
    }

    #[test]
    fn test_create_index_builder() {
        let mut ctx = ctx();
        ctx.create()
            .index()
            .named("IX_Orders_Date")
            .on_table("Orders")
            .on_column("CreatedAt")
            .descending()
            .on_column("Id")
            .unique();
        match &ctx.finish().unwrap()[0] {
            MigrationExpression::CreateIndex(e) => {
                assert!(e.index.is_unique);
                assert_eq!(e.index.columns[0].direction, Direction::Descending);
                assert_eq!(e.index.columns[1].direction, Direction::Ascending);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_descending_without_column_is_build_error() {
        let mut ctx = ctx();
        ctx.create().index().on_table("Orders").descending();
        assert!(ctx.finish().is_err());
    }

    #[test]
    fn test_create_foreign_key_builder() {
        let mut ctx = ctx();
        ctx.create()
            .foreign_key()
            .from_table("Orders")
            .foreign_column("UserId")
            .to_table("Users")
            .primary_column("Id");
        let sql = SqlServerGenerator::default()
            .generate(&ctx.finish().unwrap()[0])
            .unwrap();
        assert_eq!(
            sql,
            vec!["ALTER TABLE [Orders] ADD CONSTRAINT [FK_Orders_UserId_Users_Id] FOREIGN KEY ([UserId]) REFERENCES [Users] ([Id])"]
        );
    }

    #[test]
    fn test_unique_constraint_builder() {
        let mut ctx = ctx();
        ctx.create()
            .unique_constraint()
            .on_table("Users")
            .columns(["First", "Last"]);
        match &ctx.finish().unwrap()[0] {
            MigrationExpression::CreateConstraint(e) => {
                assert_eq!(e.constraint.name.as_deref(), Some("UC_Users_First_Last"))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_add_column_builder() {
        let mut ctx = ctx();
        ctx.create()
            .column("Notes")
            .on_table("Users")
            .as_string()
            .nullable();
        match &ctx.finish().unwrap()[0] {
            MigrationExpression::CreateColumn(e) => {
                assert_eq!(e.table_name, "Users");
                assert_eq!(e.column.db_type, Some(DbType::String));
                assert!(e.column.nullable());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_sequence_builder() {
        let mut ctx = ctx();
        ctx.create().sequence("OrderNumbers").start_with(1000).increment_by(1).cycle();
        let sql = SqlServerGenerator::default()
            .generate(&ctx.finish().unwrap()[0])
            .unwrap();
        assert_eq!(sql, vec!["CREATE SEQUENCE [OrderNumbers] INCREMENT BY 1 START WITH 1000 CYCLE"]);
    }
}
