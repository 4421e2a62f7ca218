//! `ctx.delete()` builders.

use crate::core::expression::*;
use crate::core::schema::{
    ConstraintDefinition, ConstraintKind, ForeignKeyDefinition, IndexDefinition,
};
use crate::core::value::SqlValue;
use crate::migration::context::MigrationContext;

use super::data_row;

pub struct DeleteBuilder<'a> {
    ctx: &'a mut MigrationContext,
}

impl<'a> DeleteBuilder<'a> {
    pub(crate) fn new(ctx: &'a mut MigrationContext) -> Self {
        Self { ctx }
    }

    pub fn table(self, name: impl Into<String>) -> DeleteTableBuilder<'a> {
        let index = self
            .ctx
            .push(MigrationExpression::DeleteTable(DeleteTableExpression {
                schema_name: None,
                table_name: name.into(),
                if_exists: false,
            }));
        DeleteTableBuilder { ctx: self.ctx, index }
    }

    pub fn column(self, name: impl Into<String>) -> DeleteColumnBuilder<'a> {
        self.columns([name.into()])
    }

    pub fn columns<I, S>(self, names: I) -> DeleteColumnBuilder<'a>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let index = self
            .ctx
            .push(MigrationExpression::DeleteColumn(DeleteColumnExpression {
                schema_name: None,
                table_name: String::new(),
                column_names: names.into_iter().map(Into::into).collect(),
            }));
        DeleteColumnBuilder { ctx: self.ctx, index }
    }

    pub fn index(self, name: impl Into<String>) -> DeleteIndexBuilder<'a> {
        let index = self
            .ctx
            .push(MigrationExpression::DeleteIndex(DeleteIndexExpression {
                index: IndexDefinition {
                    name: Some(name.into()),
                    ..Default::default()
                },
            }));
        DeleteIndexBuilder { ctx: self.ctx, index }
    }

    pub fn foreign_key(self, name: impl Into<String>) -> DeleteForeignKeyBuilder<'a> {
        let index = self
            .ctx
            .push(MigrationExpression::DeleteForeignKey(DeleteForeignKeyExpression {
                foreign_key: ForeignKeyDefinition {
                    name: Some(name.into()),
                    ..Default::default()
                },
            }));
        DeleteForeignKeyBuilder { ctx: self.ctx, index }
    }

    pub fn unique_constraint(self, name: impl Into<String>) -> DeleteConstraintBuilder<'a> {
        self.constraint(ConstraintKind::Unique, name.into())
    }

    pub fn primary_key(self, name: impl Into<String>) -> DeleteConstraintBuilder<'a> {
        self.constraint(ConstraintKind::PrimaryKey, name.into())
    }

    fn constraint(self, kind: ConstraintKind, name: String) -> DeleteConstraintBuilder<'a> {
        let mut constraint = ConstraintDefinition::new(kind, "");
        constraint.name = Some(name);
        let index = self
            .ctx
            .push(MigrationExpression::DeleteConstraint(DeleteConstraintExpression {
                constraint,
            }));
        DeleteConstraintBuilder { ctx: self.ctx, index }
    }

    pub fn sequence(self, name: impl Into<String>) -> DeleteSequenceBuilder<'a> {
        let index = self
            .ctx
            .push(MigrationExpression::DeleteSequence(DeleteSequenceExpression {
                schema_name: None,
                sequence_name: name.into(),
            }));
        DeleteSequenceBuilder { ctx: self.ctx, index }
    }

    pub fn schema(self, name: impl Into<String>) {
        self.ctx
            .push(MigrationExpression::DeleteSchema(DeleteSchemaExpression {
                schema_name: name.into(),
            }));
    }

    /// Delete rows from a table.
    pub fn from_table(self, table: impl Into<String>) -> DeleteDataBuilder<'a> {
        let index = self
            .ctx
            .push(MigrationExpression::DeleteData(DeleteDataExpression {
                schema_name: None,
                table_name: table.into(),
                rows: Vec::new(),
                all_rows: false,
            }));
        DeleteDataBuilder { ctx: self.ctx, index }
    }
}

pub struct DeleteTableBuilder<'a> {
    ctx: &'a mut MigrationContext,
    index: usize,
}

impl DeleteTableBuilder<'_> {
    fn with(self, f: impl FnOnce(&mut DeleteTableExpression)) -> Self {
        if let Some(MigrationExpression::DeleteTable(e)) = self.ctx.expression_mut(self.index) {
            f(e);
        }
        self
    }

    pub fn in_schema(self, schema: impl Into<String>) -> Self {
        let schema = schema.into();
        self.with(|e| e.schema_name = Some(schema))
    }

    pub fn if_exists(self) -> Self {
        self.with(|e| e.if_exists = true)
    }
}

pub struct DeleteColumnBuilder<'a> {
    ctx: &'a mut MigrationContext,
    index: usize,
}

impl DeleteColumnBuilder<'_> {
    fn with(self, f: impl FnOnce(&mut DeleteColumnExpression)) -> Self {
        if let Some(MigrationExpression::DeleteColumn(e)) = self.ctx.expression_mut(self.index) {
            f(e);
        }
        self
    }

    pub fn from_table(self, table: impl Into<String>) -> Self {
        let table = table.into();
        self.with(|e| e.table_name = table)
    }

    pub fn in_schema(self, schema: impl Into<String>) -> Self {
        let schema = schema.into();
        self.with(|e| e.schema_name = Some(schema))
    }
}

pub struct DeleteIndexBuilder<'a> {
    ctx: &'a mut MigrationContext,
    index: usize,
}

impl DeleteIndexBuilder<'_> {
    fn with(self, f: impl FnOnce(&mut IndexDefinition)) -> Self {
        if let Some(MigrationExpression::DeleteIndex(e)) = self.ctx.expression_mut(self.index) {
            f(&mut e.index);
        }
        self
    }

    pub fn on_table(self, table: impl Into<String>) -> Self {
        let table = table.into();
        self.with(|i| i.table_name = table)
    }

    pub fn in_schema(self, schema: impl Into<String>) -> Self {
        let schema = schema.into();
        self.with(|i| i.schema_name = Some(schema))
    }
}

pub struct DeleteForeignKeyBuilder<'a> {
    ctx: &'a mut MigrationContext,
    index: usize,
}

impl DeleteForeignKeyBuilder<'_> {
    fn with(self, f: impl FnOnce(&mut ForeignKeyDefinition)) -> Self {
        if let Some(MigrationExpression::DeleteForeignKey(e)) = self.ctx.expression_mut(self.index)
        {
            f(&mut e.foreign_key);
        }
        self
    }

    /// Table holding the foreign key.
    pub fn on_table(self, table: impl Into<String>) -> Self {
        let table = table.into();
        self.with(|fk| fk.foreign_table = table)
    }

    pub fn in_schema(self, schema: impl Into<String>) -> Self {
        let schema = schema.into();
        self.with(|fk| fk.foreign_table_schema = Some(schema))
    }
}

pub struct DeleteConstraintBuilder<'a> {
    ctx: &'a mut MigrationContext,
    index: usize,
}

impl DeleteConstraintBuilder<'_> {
    fn with(self, f: impl FnOnce(&mut ConstraintDefinition)) -> Self {
        if let Some(MigrationExpression::DeleteConstraint(e)) = self.ctx.expression_mut(self.index)
        {
            f(&mut e.constraint);
        }
        self
    }

    pub fn from_table(self, table: impl Into<String>) -> Self {
        let table = table.into();
        self.with(|c| c.table_name = table)
    }

    pub fn in_schema(self, schema: impl Into<String>) -> Self {
        let schema = schema.into();
        self.with(|c| c.schema_name = Some(schema))
    }
}

pub struct DeleteSequenceBuilder<'a> {
    ctx: &'a mut MigrationContext,
    index: usize,
}

impl DeleteSequenceBuilder<'_> {
    pub fn in_schema(self, schema: impl Into<String>) -> Self {
        if let Some(MigrationExpression::DeleteSequence(e)) = self.ctx.expression_mut(self.index) {
            e.schema_name = Some(schema.into());
        }
        self
    }
}

pub struct DeleteDataBuilder<'a> {
    ctx: &'a mut MigrationContext,
    index: usize,
}

impl DeleteDataBuilder<'_> {
    fn with(self, f: impl FnOnce(&mut DeleteDataExpression)) -> Self {
        if let Some(MigrationExpression::DeleteData(e)) = self.ctx.expression_mut(self.index) {
            f(e);
        }
        self
    }

    pub fn in_schema(self, schema: impl Into<String>) -> Self {
        let schema = schema.into();
        self.with(|e| e.schema_name = Some(schema))
    }

    /// Delete rows matching every column/value pair.
    pub fn row<I, K, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<SqlValue>,
    {
        let row = data_row(values);
        self.with(|e| e.rows.push(row))
    }

    /// Delete rows where `column` is NULL.
    pub fn is_null(self, column: impl Into<String>) -> Self {
        let row = vec![(column.into(), SqlValue::Null)];
        self.with(|e| e.rows.push(row))
    }

    pub fn all_rows(self) -> Self {
        self.with(|e| e.all_rows = true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::traits::{Generator, ProcessorOptions};
    use crate::drivers::{ConnectionlessProcessor, SqlServerGenerator};
    use crate::migration::conventions::Conventions;

    fn generate(build: impl FnOnce(&mut MigrationContext)) -> Vec<String> {
        let processor = Arc::new(ConnectionlessProcessor::new(
            Box::new(SqlServerGenerator::default()),
            ProcessorOptions::default(),
        ));
        let mut ctx = MigrationContext::new(processor, Arc::new(Conventions::default()));
        build(&mut ctx);
        let generator = SqlServerGenerator::default();
        ctx.finish()
            .unwrap()
            .iter()
            .flat_map(|e| generator.generate(e).unwrap())
            .collect()
    }

    #[test]
    fn test_delete_table_if_exists() {
        let sql = generate(|ctx| {
            ctx.delete().table("Old").in_schema("dbo").if_exists();
        });
        assert_eq!(sql, vec!["DROP TABLE IF EXISTS [dbo].[Old]"]);
    }

    #[test]
    fn test_delete_index_on_table() {
        let sql = generate(|ctx| {
            ctx.delete().index("IX_Users_Email").on_table("Users");
        });
        assert_eq!(sql, vec!["DROP INDEX [IX_Users_Email] ON [Users]"]);
    }

    #[test]
    fn test_delete_foreign_key() {
        let sql = generate(|ctx| {
            ctx.delete().foreign_key("FK_Orders_Users").on_table("Orders");
        });
        assert_eq!(sql, vec!["ALTER TABLE [Orders] DROP CONSTRAINT [FK_Orders_Users]"]);
    }

    #[test]
    fn test_delete_rows() {
        let sql = generate(|ctx| {
            ctx.delete()
                .from_table("Roles")
                .row([("Name", "admin")])
                .is_null("DeletedAt");
        });
        assert_eq!(
            sql,
            vec![
                "DELETE FROM [Roles] WHERE [Name] = N'admin'",
                "DELETE FROM [Roles] WHERE [DeletedAt] IS NULL",
            ]
        );
    }

    #[test]
    fn test_delete_without_condition_fails_validation() {
        let processor = Arc::new(ConnectionlessProcessor::new(
            Box::new(SqlServerGenerator::default()),
            ProcessorOptions::default(),
        ));
        let mut ctx = MigrationContext::new(processor, Arc::new(Conventions::default()));
        ctx.delete().from_table("Roles");
        let expressions = ctx.finish().unwrap();
        assert!(expressions[0].validate().is_err());
    }
}
