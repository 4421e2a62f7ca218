//! Migration expressions: one structured, dialect-agnostic value per schema or data operation.
//!
//! Builders append expressions to a migration context; generators render
//! them to SQL. Only [`ExecuteSqlExpression`] carries raw SQL text.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;

use super::identifier::validate_identifier;
use super::schema::{
    ColumnDefinition, ConstraintDefinition, ForeignKeyDefinition, IndexDefinition,
    SequenceDefinition, TableDefinition,
};
use super::traits::Processor;
use super::value::SqlValue;
use crate::error::{MigrateError, Result};

/// One row of column/value pairs, in column order.
pub type DataRow = Vec<(String, SqlValue)>;

/// Delegate run against the processor for actions not expressible as SQL.
pub type DbOperation =
    Arc<dyn for<'a> Fn(&'a dyn Processor) -> BoxFuture<'a, Result<()>> + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableExpression {
    pub table: TableDefinition,
}

/// Container for column additions and alterations on an existing table.
///
/// Renders no SQL by itself.
#[derive(Debug, Clone, PartialEq)]
pub struct AlterTableExpression {
    pub schema_name: Option<String>,
    pub table_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteTableExpression {
    pub schema_name: Option<String>,
    pub table_name: String,
    pub if_exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenameTableExpression {
    pub schema_name: Option<String>,
    pub old_name: String,
    pub new_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateColumnExpression {
    pub schema_name: Option<String>,
    pub table_name: String,
    pub column: ColumnDefinition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlterColumnExpression {
    pub schema_name: Option<String>,
    pub table_name: String,
    pub column: ColumnDefinition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteColumnExpression {
    pub schema_name: Option<String>,
    pub table_name: String,
    pub column_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenameColumnExpression {
    pub schema_name: Option<String>,
    pub table_name: String,
    pub old_name: String,
    pub new_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndexExpression {
    pub index: IndexDefinition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteIndexExpression {
    pub index: IndexDefinition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateForeignKeyExpression {
    pub foreign_key: ForeignKeyDefinition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteForeignKeyExpression {
    pub foreign_key: ForeignKeyDefinition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateConstraintExpression {
    pub constraint: ConstraintDefinition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteConstraintExpression {
    pub constraint: ConstraintDefinition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateSequenceExpression {
    pub sequence: SequenceDefinition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteSequenceExpression {
    pub schema_name: Option<String>,
    pub sequence_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateSchemaExpression {
    pub schema_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteSchemaExpression {
    pub schema_name: String,
}

/// Move a table from one schema to another.
#[derive(Debug, Clone, PartialEq)]
pub struct AlterSchemaExpression {
    pub source_schema_name: Option<String>,
    pub table_name: String,
    pub destination_schema_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertDataExpression {
    pub schema_name: Option<String>,
    pub table_name: String,
    pub rows: Vec<DataRow>,
    /// Allow explicit values for identity columns (SQL Server).
    pub identity_insert: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateDataExpression {
    pub schema_name: Option<String>,
    pub table_name: String,
    pub set: DataRow,
    pub where_clause: DataRow,
    pub all_rows: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteDataExpression {
    pub schema_name: Option<String>,
    pub table_name: String,
    /// Each row is one AND-ed condition set.
    pub rows: Vec<DataRow>,
    pub all_rows: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteSqlExpression {
    pub sql: String,
}

#[derive(Clone)]
pub struct PerformDbOperationExpression {
    pub description: String,
    pub operation: DbOperation,
}

impl fmt::Debug for PerformDbOperationExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerformDbOperationExpression")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl PartialEq for PerformDbOperationExpression {
    fn eq(&self, other: &Self) -> bool {
        self.description == other.description && Arc::ptr_eq(&self.operation, &other.operation)
    }
}

/// A single schema or data operation.
#[derive(Debug, Clone, PartialEq)]
pub enum MigrationExpression {
    CreateTable(CreateTableExpression),
    AlterTable(AlterTableExpression),
    DeleteTable(DeleteTableExpression),
    RenameTable(RenameTableExpression),
    CreateColumn(CreateColumnExpression),
    AlterColumn(AlterColumnExpression),
    DeleteColumn(DeleteColumnExpression),
    RenameColumn(RenameColumnExpression),
    CreateIndex(CreateIndexExpression),
    DeleteIndex(DeleteIndexExpression),
    CreateForeignKey(CreateForeignKeyExpression),
    DeleteForeignKey(DeleteForeignKeyExpression),
    CreateConstraint(CreateConstraintExpression),
    DeleteConstraint(DeleteConstraintExpression),
    CreateSequence(CreateSequenceExpression),
    DeleteSequence(DeleteSequenceExpression),
    CreateSchema(CreateSchemaExpression),
    DeleteSchema(DeleteSchemaExpression),
    AlterSchema(AlterSchemaExpression),
    InsertData(InsertDataExpression),
    UpdateData(UpdateDataExpression),
    DeleteData(DeleteDataExpression),
    ExecuteSql(ExecuteSqlExpression),
    PerformDbOperation(PerformDbOperationExpression),
}

impl MigrationExpression {
    /// Short name of the expression kind, used in logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            MigrationExpression::CreateTable(_) => "CreateTable",
            MigrationExpression::AlterTable(_) => "AlterTable",
            MigrationExpression::DeleteTable(_) => "DeleteTable",
            MigrationExpression::RenameTable(_) => "RenameTable",
            MigrationExpression::CreateColumn(_) => "CreateColumn",
            MigrationExpression::AlterColumn(_) => "AlterColumn",
            MigrationExpression::DeleteColumn(_) => "DeleteColumn",
            MigrationExpression::RenameColumn(_) => "RenameColumn",
            MigrationExpression::CreateIndex(_) => "CreateIndex",
            MigrationExpression::DeleteIndex(_) => "DeleteIndex",
            MigrationExpression::CreateForeignKey(_) => "CreateForeignKey",
            MigrationExpression::DeleteForeignKey(_) => "DeleteForeignKey",
            MigrationExpression::CreateConstraint(_) => "CreateConstraint",
            MigrationExpression::DeleteConstraint(_) => "DeleteConstraint",
            MigrationExpression::CreateSequence(_) => "CreateSequence",
            MigrationExpression::DeleteSequence(_) => "DeleteSequence",
            MigrationExpression::CreateSchema(_) => "CreateSchema",
            MigrationExpression::DeleteSchema(_) => "DeleteSchema",
            MigrationExpression::AlterSchema(_) => "AlterSchema",
            MigrationExpression::InsertData(_) => "InsertData",
            MigrationExpression::UpdateData(_) => "UpdateData",
            MigrationExpression::DeleteData(_) => "DeleteData",
            MigrationExpression::ExecuteSql(_) => "ExecuteSql",
            MigrationExpression::PerformDbOperation(_) => "PerformDbOperation",
        }
    }

    /// Collect validation errors. An empty list means the expression can be rendered.
    pub fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        match self {
            MigrationExpression::CreateTable(e) => {
                check_name(&mut errors, "table", &e.table.name);
                if e.table.columns.is_empty() {
                    errors.push(format!("table '{}' has no columns", e.table.name));
                }
                for column in &e.table.columns {
                    column.collect_errors(&mut errors);
                }
            }
            MigrationExpression::AlterTable(e) => check_name(&mut errors, "table", &e.table_name),
            MigrationExpression::DeleteTable(e) => check_name(&mut errors, "table", &e.table_name),
            MigrationExpression::RenameTable(e) => {
                check_name(&mut errors, "table", &e.old_name);
                check_name(&mut errors, "new table", &e.new_name);
            }
            MigrationExpression::CreateColumn(e) => {
                check_name(&mut errors, "table", &e.table_name);
                e.column.collect_errors(&mut errors);
            }
            MigrationExpression::AlterColumn(e) => {
                check_name(&mut errors, "table", &e.table_name);
                e.column.collect_errors(&mut errors);
            }
            MigrationExpression::DeleteColumn(e) => {
                check_name(&mut errors, "table", &e.table_name);
                if e.column_names.is_empty() {
                    errors.push(format!("no columns to delete from '{}'", e.table_name));
                }
                for name in &e.column_names {
                    check_name(&mut errors, "column", name);
                }
            }
            MigrationExpression::RenameColumn(e) => {
                check_name(&mut errors, "table", &e.table_name);
                check_name(&mut errors, "column", &e.old_name);
                check_name(&mut errors, "new column", &e.new_name);
            }
            MigrationExpression::CreateIndex(e) => {
                check_name(&mut errors, "table", &e.index.table_name);
                check_optional_name(&mut errors, "index", &e.index.name);
                if e.index.columns.is_empty() {
                    errors.push(format!("index on '{}' has no columns", e.index.table_name));
                }
            }
            MigrationExpression::DeleteIndex(e) => {
                check_optional_name(&mut errors, "index", &e.index.name);
                if e.index.name.is_none() {
                    errors.push("index to delete has no name".into());
                }
            }
            MigrationExpression::CreateForeignKey(e) => {
                check_optional_name(&mut errors, "foreign key", &e.foreign_key.name);
                e.foreign_key.collect_errors(&mut errors);
            }
            MigrationExpression::DeleteForeignKey(e) => {
                check_name(&mut errors, "table", &e.foreign_key.foreign_table);
                if e.foreign_key.name.is_none() {
                    errors.push("foreign key to delete has no name".into());
                }
            }
            MigrationExpression::CreateConstraint(e) => {
                check_name(&mut errors, "table", &e.constraint.table_name);
                check_optional_name(&mut errors, "constraint", &e.constraint.name);
                if e.constraint.columns.is_empty() {
                    errors.push(format!(
                        "constraint on '{}' has no columns",
                        e.constraint.table_name
                    ));
                }
            }
            MigrationExpression::DeleteConstraint(e) => {
                check_name(&mut errors, "table", &e.constraint.table_name);
                if e.constraint.name.is_none() {
                    errors.push("constraint to delete has no name".into());
                }
            }
            MigrationExpression::CreateSequence(e) => {
                check_name(&mut errors, "sequence", &e.sequence.name)
            }
            MigrationExpression::DeleteSequence(e) => {
                check_name(&mut errors, "sequence", &e.sequence_name)
            }
            MigrationExpression::CreateSchema(e) => {
                check_name(&mut errors, "schema", &e.schema_name)
            }
            MigrationExpression::DeleteSchema(e) => {
                check_name(&mut errors, "schema", &e.schema_name)
            }
            MigrationExpression::AlterSchema(e) => {
                check_name(&mut errors, "table", &e.table_name);
                check_name(&mut errors, "schema", &e.destination_schema_name);
            }
            MigrationExpression::InsertData(e) => {
                check_name(&mut errors, "table", &e.table_name);
                for row in &e.rows {
                    if row.is_empty() {
                        errors.push(format!("empty row inserted into '{}'", e.table_name));
                    }
                }
            }
            MigrationExpression::UpdateData(e) => {
                check_name(&mut errors, "table", &e.table_name);
                if e.set.is_empty() {
                    errors.push(format!("update of '{}' sets no columns", e.table_name));
                }
                if e.where_clause.is_empty() && !e.all_rows {
                    errors.push(format!(
                        "update of '{}' is missing a condition; add a where clause or target all rows",
                        e.table_name
                    ));
                }
            }
            MigrationExpression::DeleteData(e) => {
                check_name(&mut errors, "table", &e.table_name);
                if e.rows.is_empty() && !e.all_rows {
                    errors.push(format!(
                        "delete from '{}' is missing a condition; add rows or target all rows",
                        e.table_name
                    ));
                }
            }
            MigrationExpression::ExecuteSql(e) => {
                if e.sql.trim().is_empty() {
                    errors.push("execute expression has no SQL".into());
                }
            }
            MigrationExpression::PerformDbOperation(_) => {}
        }
        errors
    }

    /// Validate, returning a `Generation` error listing every problem.
    pub fn validate(&self) -> Result<()> {
        let errors = self.validation_errors();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(MigrateError::Generation(format!(
                "{}: {}",
                self.kind(),
                errors.join("; ")
            )))
        }
    }

    /// The expression that undoes this one.
    ///
    /// # Errors
    ///
    /// Returns `MigrateError::Build` for expressions without an inverse.
    pub fn reverse(&self) -> Result<MigrationExpression> {
        let reversed = match self {
            MigrationExpression::CreateTable(e) => {
                MigrationExpression::DeleteTable(DeleteTableExpression {
                    schema_name: e.table.schema_name.clone(),
                    table_name: e.table.name.clone(),
                    if_exists: false,
                })
            }
            MigrationExpression::AlterTable(e) => MigrationExpression::AlterTable(e.clone()),
            MigrationExpression::RenameTable(e) => {
                MigrationExpression::RenameTable(RenameTableExpression {
                    schema_name: e.schema_name.clone(),
                    old_name: e.new_name.clone(),
                    new_name: e.old_name.clone(),
                })
            }
            MigrationExpression::CreateColumn(e) => {
                MigrationExpression::DeleteColumn(DeleteColumnExpression {
                    schema_name: e.schema_name.clone(),
                    table_name: e.table_name.clone(),
                    column_names: vec![e.column.name.clone()],
                })
            }
            MigrationExpression::RenameColumn(e) => {
                MigrationExpression::RenameColumn(RenameColumnExpression {
                    schema_name: e.schema_name.clone(),
                    table_name: e.table_name.clone(),
                    old_name: e.new_name.clone(),
                    new_name: e.old_name.clone(),
                })
            }
            MigrationExpression::CreateIndex(e) => {
                MigrationExpression::DeleteIndex(DeleteIndexExpression {
                    index: e.index.clone(),
                })
            }
            MigrationExpression::CreateForeignKey(e) => {
                MigrationExpression::DeleteForeignKey(DeleteForeignKeyExpression {
                    foreign_key: e.foreign_key.clone(),
                })
            }
            MigrationExpression::CreateConstraint(e) => {
                MigrationExpression::DeleteConstraint(DeleteConstraintExpression {
                    constraint: e.constraint.clone(),
                })
            }
            MigrationExpression::CreateSequence(e) => {
                MigrationExpression::DeleteSequence(DeleteSequenceExpression {
                    schema_name: e.sequence.schema_name.clone(),
                    sequence_name: e.sequence.name.clone(),
                })
            }
            MigrationExpression::CreateSchema(e) => {
                MigrationExpression::DeleteSchema(DeleteSchemaExpression {
                    schema_name: e.schema_name.clone(),
                })
            }
            MigrationExpression::AlterSchema(e) => {
                let source = e.source_schema_name.clone().ok_or_else(|| {
                    MigrateError::Build(format!(
                        "moving '{}' to schema '{}' cannot be reversed without a source schema",
                        e.table_name, e.destination_schema_name
                    ))
                })?;
                MigrationExpression::AlterSchema(AlterSchemaExpression {
                    source_schema_name: Some(e.destination_schema_name.clone()),
                    table_name: e.table_name.clone(),
                    destination_schema_name: source,
                })
            }
            MigrationExpression::InsertData(e) => {
                MigrationExpression::DeleteData(DeleteDataExpression {
                    schema_name: e.schema_name.clone(),
                    table_name: e.table_name.clone(),
                    rows: e.rows.clone(),
                    all_rows: false,
                })
            }
            other => {
                return Err(MigrateError::Build(format!(
                    "{} expressions cannot be reversed automatically",
                    other.kind()
                )))
            }
        };
        Ok(reversed)
    }
}

fn check_name(errors: &mut Vec<String>, what: &str, name: &str) {
    if let Err(e) = validate_identifier(name) {
        errors.push(format!("{} name: {}", what, e));
    }
}

fn check_optional_name(errors: &mut Vec<String>, what: &str, name: &Option<String>) {
    if let Some(name) = name {
        check_name(errors, what, name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{DbType, Direction, IndexColumn};

    fn create_users() -> MigrationExpression {
        let mut id = ColumnDefinition::new("Id");
        id.db_type = Some(DbType::Int32);
        id.is_primary_key = true;
        MigrationExpression::CreateTable(CreateTableExpression {
            table: TableDefinition {
                schema_name: Some("app".into()),
                name: "Users".into(),
                columns: vec![id],
            },
        })
    }

    #[test]
    fn test_valid_create_table() {
        assert!(create_users().validate().is_ok());
    }

    #[test]
    fn test_create_table_without_columns_is_invalid() {
        let expr = MigrationExpression::CreateTable(CreateTableExpression {
            table: TableDefinition {
                name: "Empty".into(),
                ..Default::default()
            },
        });
        let err = expr.validate().unwrap_err();
        assert!(matches!(err, MigrateError::Generation(_)));
        assert!(err.to_string().contains("has no columns"));
    }

    #[test]
    fn test_update_without_condition_is_invalid() {
        let expr = MigrationExpression::UpdateData(UpdateDataExpression {
            schema_name: None,
            table_name: "Bar".into(),
            set: vec![("SomeDate".into(), SqlValue::I32(5))],
            where_clause: vec![],
            all_rows: false,
        });
        assert!(expr.validate().is_err());

        let expr = MigrationExpression::UpdateData(UpdateDataExpression {
            schema_name: None,
            table_name: "Bar".into(),
            set: vec![("SomeDate".into(), SqlValue::I32(5))],
            where_clause: vec![],
            all_rows: true,
        });
        assert!(expr.validate().is_ok());
    }

    #[test]
    fn test_reverse_create_table() {
        let reversed = create_users().reverse().unwrap();
        assert_eq!(
            reversed,
            MigrationExpression::DeleteTable(DeleteTableExpression {
                schema_name: Some("app".into()),
                table_name: "Users".into(),
                if_exists: false,
            })
        );
    }

    #[test]
    fn test_reverse_rename_swaps_names() {
        let expr = MigrationExpression::RenameColumn(RenameColumnExpression {
            schema_name: None,
            table_name: "Users".into(),
            old_name: "Name".into(),
            new_name: "FullName".into(),
        });
        match expr.reverse().unwrap() {
            MigrationExpression::RenameColumn(r) => {
                assert_eq!(r.old_name, "FullName");
                assert_eq!(r.new_name, "Name");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_reverse_create_index_keeps_name() {
        let expr = MigrationExpression::CreateIndex(CreateIndexExpression {
            index: IndexDefinition {
                name: Some("IX_Users_Email".into()),
                table_name: "Users".into(),
                columns: vec![IndexColumn {
                    name: "Email".into(),
                    direction: Direction::Ascending,
                }],
                ..Default::default()
            },
        });
        match expr.reverse().unwrap() {
            MigrationExpression::DeleteIndex(d) => {
                assert_eq!(d.index.name.as_deref(), Some("IX_Users_Email"))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_execute_sql_cannot_be_reversed() {
        let expr = MigrationExpression::ExecuteSql(ExecuteSqlExpression {
            sql: "SELECT 1".into(),
        });
        let err = expr.reverse().unwrap_err();
        assert!(matches!(err, MigrateError::Build(_)));
    }

    #[test]
    fn test_reverse_insert_deletes_rows() {
        let expr = MigrationExpression::InsertData(InsertDataExpression {
            schema_name: None,
            table_name: "Roles".into(),
            rows: vec![vec![("Name".into(), SqlValue::from("admin"))]],
            identity_insert: false,
        });
        match expr.reverse().unwrap() {
            MigrationExpression::DeleteData(d) => {
                assert_eq!(d.rows.len(), 1);
                assert!(!d.all_rows);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
