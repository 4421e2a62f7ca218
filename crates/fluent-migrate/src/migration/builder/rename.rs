//! `ctx.rename()` builders.

use crate::core::expression::*;
use crate::migration::context::MigrationContext;

pub struct RenameBuilder<'a> {
    ctx: &'a mut MigrationContext,
}

impl<'a> RenameBuilder<'a> {
    pub(crate) fn new(ctx: &'a mut MigrationContext) -> Self {
        Self { ctx }
    }

    pub fn table(self, old_name: impl Into<String>) -> RenameTableBuilder<'a> {
        let index = self
            .ctx
            .push(MigrationExpression::RenameTable(RenameTableExpression {
                schema_name: None,
                old_name: old_name.into(),
                new_name: String::new(),
            }));
        RenameTableBuilder { ctx: self.ctx, index }
    }

    pub fn column(self, old_name: impl Into<String>) -> RenameColumnBuilder<'a> {
        let index = self
            .ctx
            .push(MigrationExpression::RenameColumn(RenameColumnExpression {
                schema_name: None,
                table_name: String::new(),
                old_name: old_name.into(),
                new_name: String::new(),
            }));
        RenameColumnBuilder { ctx: self.ctx, index }
    }
}

pub struct RenameTableBuilder<'a> {
    ctx: &'a mut MigrationContext,
    index: usize,
}

impl RenameTableBuilder<'_> {
    fn with(self, f: impl FnOnce(&mut RenameTableExpression)) -> Self {
        if let Some(MigrationExpression::RenameTable(e)) = self.ctx.expression_mut(self.index) {
            f(e);
        }
        self
    }

    pub fn in_schema(self, schema: impl Into<String>) -> Self {
        let schema = schema.into();
        self.with(|e| e.schema_name = Some(schema))
    }

    pub fn to(self, new_name: impl Into<String>) -> Self {
        let new_name = new_name.into();
        self.with(|e| e.new_name = new_name)
    }
}

pub struct RenameColumnBuilder<'a> {
    ctx: &'a mut MigrationContext,
    index: usize,
}

impl RenameColumnBuilder<'_> {
    fn with(self, f: impl FnOnce(&mut RenameColumnExpression)) -> Self {
        if let Some(MigrationExpression::RenameColumn(e)) = self.ctx.expression_mut(self.index) {
            f(e);
        }
        self
    }

    pub fn on_table(self, table: impl Into<String>) -> Self {
        let table = table.into();
        self.with(|e| e.table_name = table)
    }

    pub fn in_schema(self, schema: impl Into<String>) -> Self {
        let schema = schema.into();
        self.with(|e| e.schema_name = Some(schema))
    }

    pub fn to(self, new_name: impl Into<String>) -> Self {
        let new_name = new_name.into();
        self.with(|e| e.new_name = new_name)
    }
}
