//! Migration context: the expression list a migration's `up`/`down` fills.
//!
//! Builders append to the context; nothing is generated or executed until
//! the runner takes the finished list. Builder misuse is recorded and
//! surfaced as `MigrateError::Build` by [`MigrationContext::finish`].

use std::sync::Arc;

use crate::core::expression::{
    AlterColumnExpression, CreateForeignKeyExpression, MigrationExpression, UpdateDataExpression,
};
use crate::core::schema::ColumnModification;
use crate::core::traits::Processor;
use crate::core::value::SqlValue;
use crate::error::{MigrateError, Result};

use super::builder::{
    AlterBuilder, CreateBuilder, DeleteBuilder, ExecuteBuilder, InsertBuilder, RenameBuilder,
    SchemaQuery, UpdateBuilder,
};
use super::conventions::Conventions;

/// Existing rows to fill when a column is added or altered.
#[derive(Debug, Clone)]
struct Backfill {
    index: usize,
    value: SqlValue,
}

/// Collects the expressions of one migration direction.
pub struct MigrationContext {
    processor: Arc<dyn Processor>,
    conventions: Arc<Conventions>,
    expressions: Vec<MigrationExpression>,
    backfills: Vec<Backfill>,
    errors: Vec<String>,
    /// Absorbs calls made under a non-matching `if_database`.
    null: Option<Box<MigrationContext>>,
    active: bool,
}

impl MigrationContext {
    pub fn new(processor: Arc<dyn Processor>, conventions: Arc<Conventions>) -> Self {
        Self {
            processor,
            conventions,
            expressions: Vec::new(),
            backfills: Vec::new(),
            errors: Vec::new(),
            null: None,
            active: true,
        }
    }

    /// A fresh, empty context on the same processor and conventions.
    pub fn child(&self) -> Self {
        Self::new(self.processor.clone(), self.conventions.clone())
    }

    fn null_context(&self) -> Self {
        let mut ctx = self.child();
        ctx.active = false;
        ctx
    }

    /// The processor the migration runs against.
    pub fn processor(&self) -> &dyn Processor {
        self.processor.as_ref()
    }

    /// Canonical database type of the processor, e.g. `SQLite`.
    pub fn database_type(&self) -> &str {
        self.processor.database_type()
    }

    /// Whether expressions added here are kept.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn expressions(&self) -> &[MigrationExpression] {
        &self.expressions
    }

    /// Append an expression, returning its position.
    pub fn push(&mut self, expression: MigrationExpression) -> usize {
        self.expressions.push(expression);
        self.expressions.len() - 1
    }

    pub(crate) fn expression_mut(&mut self, index: usize) -> Option<&mut MigrationExpression> {
        self.expressions.get_mut(index)
    }

    /// Record builder misuse, reported when the context is finished.
    pub(crate) fn record_error(&mut self, message: impl Into<String>) {
        if self.active {
            self.errors.push(message.into());
        }
    }

    /// Fill existing rows of the column added or altered by the expression
    /// at `index` before it is made non-nullable.
    pub(crate) fn set_backfill(&mut self, index: usize, value: SqlValue) {
        match self.backfills.iter_mut().find(|b| b.index == index) {
            Some(existing) => existing.value = value,
            None => self.backfills.push(Backfill { index, value }),
        }
    }

    // -------------------------------------------------------------------------
    // Builders
    // -------------------------------------------------------------------------

    pub fn create(&mut self) -> CreateBuilder<'_> {
        CreateBuilder::new(self)
    }

    pub fn alter(&mut self) -> AlterBuilder<'_> {
        AlterBuilder::new(self)
    }

    pub fn delete(&mut self) -> DeleteBuilder<'_> {
        DeleteBuilder::new(self)
    }

    pub fn rename(&mut self) -> RenameBuilder<'_> {
        RenameBuilder::new(self)
    }

    pub fn insert(&mut self) -> InsertBuilder<'_> {
        InsertBuilder::new(self)
    }

    pub fn update(&mut self) -> UpdateBuilder<'_> {
        UpdateBuilder::new(self)
    }

    pub fn execute(&mut self) -> ExecuteBuilder<'_> {
        ExecuteBuilder::new(self)
    }

    /// Schema queries against the live database.
    pub fn schema(&self) -> SchemaQuery<'_> {
        SchemaQuery::new(self.processor())
    }

    // -------------------------------------------------------------------------
    // Conditional expressions
    // -------------------------------------------------------------------------

    /// Expressions built through the returned context are kept only when
    /// the processor's database type (or one of its aliases) is `db_type`.
    pub fn if_database(&mut self, db_type: &str) -> &mut MigrationContext {
        self.if_database_any(&[db_type])
    }

    /// Like [`if_database`](Self::if_database), matching any of `db_types`.
    pub fn if_database_any(&mut self, db_types: &[&str]) -> &mut MigrationContext {
        if db_types.is_empty() {
            self.record_error("if_database requires at least one database type");
            return self.null_mut();
        }
        let processor = self.processor.clone();
        self.select(db_types.iter().any(|t| processor.matches_database(t)))
    }

    /// Keep expressions when `predicate` accepts the database type or an alias.
    pub fn if_database_where(&mut self, predicate: impl Fn(&str) -> bool) -> &mut MigrationContext {
        let processor = self.processor.clone();
        let matched = predicate(processor.database_type())
            || processor
                .database_type_aliases()
                .iter()
                .any(|alias| predicate(alias));
        self.select(matched)
    }

    fn select(&mut self, matched: bool) -> &mut MigrationContext {
        if matched || !self.active {
            self
        } else {
            self.null_mut()
        }
    }

    fn null_mut(&mut self) -> &mut MigrationContext {
        if !self.active {
            return self;
        }
        let null = self.null_context();
        self.null.get_or_insert_with(|| Box::new(null)).as_mut()
    }

    // -------------------------------------------------------------------------
    // Finish
    // -------------------------------------------------------------------------

    /// Expand backfills, apply conventions and return the expressions.
    ///
    /// # Errors
    ///
    /// Returns `MigrateError::Build` listing every recorded builder misuse.
    pub fn finish(mut self) -> Result<Vec<MigrationExpression>> {
        if !self.errors.is_empty() {
            return Err(MigrateError::Build(self.errors.join("; ")));
        }

        let mut backfills = std::mem::take(&mut self.backfills);
        backfills.sort_by(|a, b| b.index.cmp(&a.index));
        for backfill in backfills {
            self.expand_backfill(backfill);
        }
        self.split_altered_foreign_keys();

        let conventions = self.conventions.clone();
        for expression in &mut self.expressions {
            conventions.apply(expression);
        }
        Ok(self.expressions)
    }

    /// Altering: update ahead of the alter.
    /// Adding: add nullable, update, then tighten to NOT NULL.
    fn expand_backfill(&mut self, backfill: Backfill) {
        let Backfill { index, value } = backfill;
        let (update, tighten) = match self.expressions.get_mut(index) {
            Some(MigrationExpression::AlterColumn(e)) => {
                (all_rows_update(&e.schema_name, &e.table_name, &e.column.name, value), None)
            }
            Some(MigrationExpression::CreateColumn(e)) => {
                let update = all_rows_update(&e.schema_name, &e.table_name, &e.column.name, value);
                let tighten = (!e.column.nullable()).then(|| {
                    let mut column = e.column.clone();
                    column.modification = ColumnModification::Alter;
                    column.default_value = None;
                    column.foreign_key = None;
                    column.is_identity = false;
                    column.is_primary_key = false;
                    column.is_unique = false;
                    MigrationExpression::AlterColumn(AlterColumnExpression {
                        schema_name: e.schema_name.clone(),
                        table_name: e.table_name.clone(),
                        column,
                    })
                });
                e.column.is_nullable = Some(true);
                (update, Some(tighten))
            }
            _ => return,
        };
        match tighten {
            Some(Some(alter)) => {
                self.expressions.insert(index + 1, update);
                self.expressions.insert(index + 2, alter);
            }
            Some(None) => self.expressions.insert(index + 1, update),
            None => self.expressions.insert(index, update),
        }
    }

    /// ALTER COLUMN renders no references; a foreign key set on an altered
    /// column becomes its own expression.
    fn split_altered_foreign_keys(&mut self) {
        let mut index = 0;
        while index < self.expressions.len() {
            if let MigrationExpression::AlterColumn(e) = &mut self.expressions[index] {
                if let Some(mut fk) = e.column.foreign_key.take() {
                    if fk.foreign_table.is_empty() {
                        fk.foreign_table = e.table_name.clone();
                        fk.foreign_table_schema = e.schema_name.clone();
                    }
                    if fk.foreign_columns.is_empty() {
                        fk.foreign_columns = vec![e.column.name.clone()];
                    }
                    self.expressions.insert(
                        index + 1,
                        MigrationExpression::CreateForeignKey(CreateForeignKeyExpression {
                            foreign_key: fk,
                        }),
                    );
                    index += 1;
                }
            }
            index += 1;
        }
    }
}

fn all_rows_update(
    schema: &Option<String>,
    table: &str,
    column: &str,
    value: SqlValue,
) -> MigrationExpression {
    MigrationExpression::UpdateData(UpdateDataExpression {
        schema_name: schema.clone(),
        table_name: table.to_string(),
        set: vec![(column.to_string(), value)],
        where_clause: Vec::new(),
        all_rows: true,
    })
}
