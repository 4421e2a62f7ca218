//! Fluent builders appending expressions to a [`MigrationContext`].
//!
//! Every builder borrows the context mutably and is consumed by value, so
//! a chain configures one expression and ends with the statement:
//!
//! ```rust,ignore
//! ctx.create()
//!     .table("Users")
//!     .with_column("Id").as_int32().primary_key().identity()
//!     .with_column("Email").as_string_sized(255).indexed();
//! ```
//!
//! [`MigrationContext`]: super::context::MigrationContext

mod alter;
mod column;
mod create;
mod data;
mod delete;
mod execute;
mod rename;
mod schema;

pub use alter::{AlterBuilder, AlterColumnBuilder, AlterTableBuilder};
pub use column::ColumnOptions;
pub use create::{
    CreateBuilder, CreateColumnBuilder, CreateConstraintBuilder, CreateForeignKeyBuilder,
    CreateIndexBuilder, CreateSequenceBuilder, CreateTableBuilder,
};
pub use data::{InsertBuilder, InsertDataBuilder, UpdateBuilder, UpdateDataBuilder};
pub use delete::{
    DeleteBuilder, DeleteColumnBuilder, DeleteConstraintBuilder, DeleteDataBuilder,
    DeleteForeignKeyBuilder, DeleteIndexBuilder, DeleteSequenceBuilder, DeleteTableBuilder,
};
pub use execute::ExecuteBuilder;
pub use rename::{RenameBuilder, RenameColumnBuilder, RenameTableBuilder};
pub use schema::{SchemaNameQuery, SchemaQuery, SequenceQuery, TableObjectQuery, TableQuery};

use crate::core::expression::DataRow;
use crate::core::value::SqlValue;

/// Collect column/value pairs into a row.
pub(crate) fn data_row<I, K, V>(values: I) -> DataRow
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<SqlValue>,
{
    values
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
