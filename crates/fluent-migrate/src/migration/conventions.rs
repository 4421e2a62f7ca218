//! Naming conventions applied to expressions when a migration context is finished.
//!
//! Only empty names are filled; explicit names are never changed.

use crate::core::expression::MigrationExpression;
use crate::core::schema::{
    ColumnDefinition, ConstraintDefinition, ConstraintKind, ForeignKeyDefinition, IndexDefinition,
};

/// Default names and schema for expressions built without them.
#[derive(Debug, Clone, Default)]
pub struct Conventions {
    /// Schema given to expressions that name none.
    pub default_schema: Option<String>,
}

impl Conventions {
    pub fn with_default_schema(schema: impl Into<String>) -> Self {
        Self {
            default_schema: Some(schema.into()),
        }
    }

    /// `IX_<table>_<col1>_<col2>`
    pub fn index_name(&self, index: &IndexDefinition) -> String {
        format!("IX_{}_{}", index.table_name, index.column_names().join("_"))
    }

    /// `FK_<foreign table>_<foreign cols>_<primary table>_<primary cols>`
    pub fn foreign_key_name(&self, fk: &ForeignKeyDefinition) -> String {
        format!(
            "FK_{}_{}_{}_{}",
            fk.foreign_table,
            fk.foreign_columns.join("_"),
            fk.primary_table,
            fk.primary_columns.join("_")
        )
    }

    /// `PK_<table>` or `UC_<table>_<cols>`
    pub fn constraint_name(&self, constraint: &ConstraintDefinition) -> String {
        match constraint.kind {
            ConstraintKind::PrimaryKey => format!("PK_{}", constraint.table_name),
            ConstraintKind::Unique => format!(
                "UC_{}_{}",
                constraint.table_name,
                constraint.columns.join("_")
            ),
        }
    }

    /// Fill missing names and schemas in place.
    pub fn apply(&self, expression: &mut MigrationExpression) {
        match expression {
            MigrationExpression::CreateTable(e) => {
                self.schema(&mut e.table.schema_name);
                let (schema, table) = (e.table.schema_name.clone(), e.table.name.clone());
                for column in &mut e.table.columns {
                    self.column(column, &schema, &table);
                }
            }
            MigrationExpression::AlterTable(e) => self.schema(&mut e.schema_name),
            MigrationExpression::DeleteTable(e) => self.schema(&mut e.schema_name),
            MigrationExpression::RenameTable(e) => self.schema(&mut e.schema_name),
            MigrationExpression::CreateColumn(e) => {
                self.schema(&mut e.schema_name);
                self.column(&mut e.column, &e.schema_name.clone(), &e.table_name.clone());
            }
            MigrationExpression::AlterColumn(e) => {
                self.schema(&mut e.schema_name);
                self.column(&mut e.column, &e.schema_name.clone(), &e.table_name.clone());
            }
            MigrationExpression::DeleteColumn(e) => self.schema(&mut e.schema_name),
            MigrationExpression::RenameColumn(e) => self.schema(&mut e.schema_name),
            MigrationExpression::CreateIndex(e) => self.index(&mut e.index),
            MigrationExpression::DeleteIndex(e) => self.index(&mut e.index),
            MigrationExpression::CreateForeignKey(e) => self.foreign_key(&mut e.foreign_key),
            MigrationExpression::DeleteForeignKey(e) => self.foreign_key(&mut e.foreign_key),
            MigrationExpression::CreateConstraint(e) => self.constraint(&mut e.constraint),
            MigrationExpression::DeleteConstraint(e) => self.constraint(&mut e.constraint),
            MigrationExpression::CreateSequence(e) => self.schema(&mut e.sequence.schema_name),
            MigrationExpression::DeleteSequence(e) => self.schema(&mut e.schema_name),
            MigrationExpression::AlterSchema(e) => self.schema(&mut e.source_schema_name),
            MigrationExpression::InsertData(e) => self.schema(&mut e.schema_name),
            MigrationExpression::UpdateData(e) => self.schema(&mut e.schema_name),
            MigrationExpression::DeleteData(e) => self.schema(&mut e.schema_name),
            MigrationExpression::CreateSchema(_)
            | MigrationExpression::DeleteSchema(_)
            | MigrationExpression::ExecuteSql(_)
            | MigrationExpression::PerformDbOperation(_) => {}
        }
    }

    fn schema(&self, schema: &mut Option<String>) {
        if schema.is_none() {
            schema.clone_from(&self.default_schema);
        }
    }

    fn column(&self, column: &mut ColumnDefinition, schema: &Option<String>, table: &str) {
        if column.table_name.is_empty() {
            column.table_name = table.to_string();
        }
        if let Some(fk) = &mut column.foreign_key {
            if fk.foreign_table.is_empty() {
                fk.foreign_table = table.to_string();
                fk.foreign_table_schema.clone_from(schema);
            }
            if fk.foreign_columns.is_empty() {
                fk.foreign_columns = vec![column.name.clone()];
            }
            self.foreign_key(fk);
        }
    }

    fn index(&self, index: &mut IndexDefinition) {
        self.schema(&mut index.schema_name);
        if index.name.is_none() {
            index.name = Some(self.index_name(index));
        }
    }

    fn foreign_key(&self, fk: &mut ForeignKeyDefinition) {
        self.schema(&mut fk.foreign_table_schema);
        self.schema(&mut fk.primary_table_schema);
        if fk.name.is_none() {
            fk.name = Some(self.foreign_key_name(fk));
        }
    }

    fn constraint(&self, constraint: &mut ConstraintDefinition) {
        self.schema(&mut constraint.schema_name);
        if constraint.name.is_none() {
            constraint.name = Some(self.constraint_name(constraint));
        }
    }
}
