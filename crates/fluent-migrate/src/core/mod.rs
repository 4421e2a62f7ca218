//! Core abstractions for dialect-aware schema migration.
//!
//! - [`schema`]: column, table, index, key and sequence definitions
//! - [`expression`]: one value per schema or data operation
//! - [`value`]: literal values and query results
//! - [`traits`]: quoter, type map, generator and processor seams
//! - [`catalog`]: driver registry for dependency injection
//!
//! # Design Patterns
//!
//! - **Abstract Factory**: `DriverCatalog` creates matching generators and processors
//! - **Strategy**: each dialect supplies its own `Quoter`, `TypeMap` and `Generator`
//! - **Template Method**: default trait methods define the shared rendering

pub mod catalog;
pub mod expression;
pub mod identifier;
pub mod schema;
pub mod traits;
pub mod value;

pub use catalog::DriverCatalog;
pub use expression::{DataRow, DbOperation, MigrationExpression};
pub use schema::{
    ColumnDefinition, ConstraintKind, DbType, Direction, ForeignKeyDefinition, IndexDefinition,
    Rule, SequenceDefinition, SystemMethod, TableDefinition,
};
pub use traits::{process, CompatibilityMode, Generator, Processor, ProcessorOptions, Quoter, TypeMap};
pub use value::{DataSet, SqlValue};
