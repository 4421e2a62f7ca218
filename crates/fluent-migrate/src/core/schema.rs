//! Schema definition types for tables, columns, indexes, and constraints.
//!
//! These are the structural building blocks carried by migration expressions.
//! They are database-agnostic: dialect generators decide how to render them.

use serde::{Deserialize, Serialize};

use super::identifier::validate_identifier;
use super::value::SqlValue;

/// Semantic column type, translated to SQL by each dialect's type map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DbType {
    AnsiString,
    AnsiStringFixedLength,
    Binary,
    Boolean,
    Byte,
    Currency,
    Date,
    DateTime,
    DateTime2,
    DateTimeOffset,
    Decimal,
    Double,
    Guid,
    Int16,
    Int32,
    Int64,
    SByte,
    Single,
    String,
    StringFixedLength,
    Time,
    UInt16,
    UInt32,
    UInt64,
    Xml,
}

impl DbType {
    /// Whether the type is an integer type that can carry an identity.
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            DbType::Byte
                | DbType::SByte
                | DbType::Int16
                | DbType::Int32
                | DbType::Int64
                | DbType::UInt16
                | DbType::UInt32
                | DbType::UInt64
        )
    }
}

/// Server-side functions usable as default values or inserted values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemMethod {
    NewGuid,
    NewSequentialId,
    CurrentDateTime,
    CurrentDateTimeOffset,
    CurrentUtcDateTime,
    CurrentUser,
}

/// Whether a column definition creates a new column or alters an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColumnModification {
    #[default]
    Create,
    Alter,
}

/// Expression maintained by the database for a computed column.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedColumn {
    /// SQL expression, emitted verbatim.
    pub expression: String,
    /// Persist the value (PERSISTED / STORED) rather than compute on read.
    pub stored: bool,
}

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColumnDefinition {
    /// Column name.
    pub name: String,

    /// Owning table, filled in by the builder.
    pub table_name: String,

    /// Semantic data type.
    pub db_type: Option<DbType>,

    /// Dialect-specific type text, used instead of `db_type` when set.
    pub custom_type: Option<String>,

    /// Size (length, or precision for decimals).
    pub size: Option<u32>,

    /// Precision (scale for decimals).
    pub precision: Option<u32>,

    /// Nullability; `None` renders as NOT NULL.
    pub is_nullable: Option<bool>,

    /// Default value, including explicit NULL and system methods.
    pub default_value: Option<SqlValue>,

    /// Identity / auto-increment column.
    pub is_identity: bool,

    /// Part of the table's primary key.
    pub is_primary_key: bool,

    /// Explicit name for the primary key constraint.
    pub primary_key_name: Option<String>,

    /// Unique column constraint.
    pub is_unique: bool,

    /// Foreign key declared on this column.
    pub foreign_key: Option<ForeignKeyDefinition>,

    /// Computed column expression.
    pub computed: Option<ComputedColumn>,

    /// Create vs alter.
    pub modification: ColumnModification,
}

impl ColumnDefinition {
    /// Create a column definition with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Whether the column renders as nullable.
    pub fn nullable(&self) -> bool {
        self.is_nullable == Some(true)
    }

    /// Collect validation errors for this column.
    pub fn collect_errors(&self, errors: &mut Vec<String>) {
        if let Err(e) = validate_identifier(&self.name) {
            errors.push(format!("column: {}", e));
        }
        if self.db_type.is_none() && self.custom_type.is_none() && self.computed.is_none() {
            errors.push(format!("column '{}' has no type", self.name));
        }
        if self.computed.as_ref().is_some_and(|c| c.expression.trim().is_empty()) {
            errors.push(format!("column '{}' has an empty computed expression", self.name));
        }
        if self.is_identity && self.computed.is_some() {
            errors.push(format!(
                "column '{}' cannot be both identity and computed",
                self.name
            ));
        }
        if let Some(fk) = &self.foreign_key {
            fk.collect_errors(errors);
        }
    }
}

/// Table metadata for table creation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableDefinition {
    /// Schema name; `None` uses the connection's default schema.
    pub schema_name: Option<String>,

    /// Table name.
    pub name: String,

    /// Column definitions in declaration order.
    pub columns: Vec<ColumnDefinition>,
}

impl TableDefinition {
    /// Columns forming the primary key, in declaration order.
    pub fn primary_key_columns(&self) -> Vec<&ColumnDefinition> {
        self.columns.iter().filter(|c| c.is_primary_key).collect()
    }

    /// Name used for a table-level primary key constraint, if any column names it.
    pub fn primary_key_name(&self) -> Option<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_primary_key)
            .find_map(|c| c.primary_key_name.as_deref())
    }
}

/// Referential action for foreign keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rule {
    #[default]
    None,
    Cascade,
    SetNull,
    SetDefault,
}

impl Rule {
    /// SQL keywords for the action, or `None` when no clause is emitted.
    pub fn as_sql(self) -> Option<&'static str> {
        match self {
            Rule::None => None,
            Rule::Cascade => Some("CASCADE"),
            Rule::SetNull => Some("SET NULL"),
            Rule::SetDefault => Some("SET DEFAULT"),
        }
    }
}

/// Foreign key metadata.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ForeignKeyDefinition {
    /// Constraint name; filled by conventions when empty.
    pub name: Option<String>,

    /// Referencing table.
    pub foreign_table: String,

    /// Referencing table schema.
    pub foreign_table_schema: Option<String>,

    /// Referencing columns.
    pub foreign_columns: Vec<String>,

    /// Referenced table.
    pub primary_table: String,

    /// Referenced table schema.
    pub primary_table_schema: Option<String>,

    /// Referenced columns.
    pub primary_columns: Vec<String>,

    /// ON DELETE action.
    pub on_delete: Rule,

    /// ON UPDATE action.
    pub on_update: Rule,
}

impl ForeignKeyDefinition {
    /// Collect validation errors for this foreign key.
    pub fn collect_errors(&self, errors: &mut Vec<String>) {
        if self.foreign_table.is_empty() {
            errors.push("foreign key has no foreign table".into());
        }
        if self.primary_table.is_empty() {
            errors.push("foreign key has no primary table".into());
        }
        if self.foreign_columns.is_empty() {
            errors.push("foreign key has no foreign columns".into());
        }
        if self.foreign_columns.len() != self.primary_columns.len() {
            errors.push(format!(
                "foreign key {} references {} primary columns with {} foreign columns",
                self.name.as_deref().unwrap_or("<unnamed>"),
                self.primary_columns.len(),
                self.foreign_columns.len()
            ));
        }
    }
}

/// Sort direction of an index column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

/// One column of an index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexColumn {
    pub name: String,
    pub direction: Direction,
}

/// Index metadata.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndexDefinition {
    /// Index name; filled by conventions when empty.
    pub name: Option<String>,

    /// Schema of the indexed table.
    pub schema_name: Option<String>,

    /// Indexed table.
    pub table_name: String,

    /// Key columns in order.
    pub columns: Vec<IndexColumn>,

    /// Unique index.
    pub is_unique: bool,

    /// Clustered index (SQL Server).
    pub is_clustered: bool,

    /// Non-key columns carried in the leaf level (SQL Server INCLUDE).
    pub includes: Vec<String>,

    /// Partial index predicate, emitted verbatim.
    pub filter: Option<String>,
}

impl IndexDefinition {
    /// Names of the key columns.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Kind of table constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    PrimaryKey,
    Unique,
}

/// Primary key or unique constraint metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintDefinition {
    pub kind: ConstraintKind,

    /// Constraint name; filled by conventions when empty.
    pub name: Option<String>,

    pub schema_name: Option<String>,

    pub table_name: String,

    pub columns: Vec<String>,
}

impl ConstraintDefinition {
    pub fn new(kind: ConstraintKind, table_name: impl Into<String>) -> Self {
        Self {
            kind,
            name: None,
            schema_name: None,
            table_name: table_name.into(),
            columns: Vec::new(),
        }
    }
}

/// Sequence metadata.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SequenceDefinition {
    pub name: String,
    pub schema_name: Option<String>,
    pub increment: Option<i64>,
    pub min_value: Option<i64>,
    pub max_value: Option<i64>,
    pub start_with: Option<i64>,
    pub cache: Option<i64>,
    pub cycle: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_types() {
        assert!(DbType::Int32.is_integer());
        assert!(DbType::Int64.is_integer());
        assert!(!DbType::String.is_integer());
        assert!(!DbType::Decimal.is_integer());
    }

    #[test]
    fn test_column_without_type_is_invalid() {
        let mut errors = Vec::new();
        ColumnDefinition::new("Name").collect_errors(&mut errors);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("no type"));
    }

    #[test]
    fn test_computed_column_needs_no_type() {
        let mut column = ColumnDefinition::new("FullName");
        column.computed = Some(ComputedColumn {
            expression: "[First] + [Last]".into(),
            stored: true,
        });
        let mut errors = Vec::new();
        column.collect_errors(&mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_foreign_key_column_count_mismatch() {
        let fk = ForeignKeyDefinition {
            foreign_table: "Orders".into(),
            foreign_columns: vec!["CustomerId".into(), "Region".into()],
            primary_table: "Customers".into(),
            primary_columns: vec!["Id".into()],
            ..Default::default()
        };
        let mut errors = Vec::new();
        fk.collect_errors(&mut errors);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("1 primary columns with 2 foreign columns"));
    }

    #[test]
    fn test_primary_key_name_from_columns() {
        let mut id = ColumnDefinition::new("Id");
        id.is_primary_key = true;
        id.primary_key_name = Some("PK_Users".into());
        let table = TableDefinition {
            name: "Users".into(),
            columns: vec![id, ColumnDefinition::new("Name")],
            ..Default::default()
        };
        assert_eq!(table.primary_key_name(), Some("PK_Users"));
        assert_eq!(table.primary_key_columns().len(), 1);
    }

    #[test]
    fn test_rule_sql() {
        assert_eq!(Rule::Cascade.as_sql(), Some("CASCADE"));
        assert_eq!(Rule::None.as_sql(), None);
    }
}
