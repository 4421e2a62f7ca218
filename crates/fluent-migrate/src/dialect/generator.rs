//! Base SQL rendering shared by every dialect generator.
//!
//! The [`Generator`] trait's default methods delegate here. A dialect
//! overrides a trait method when its syntax differs and can still call these
//! functions for the parts that don't.

use tracing::warn;

use crate::core::expression::*;
use crate::core::schema::{
    ColumnDefinition, ColumnModification, ConstraintKind, Direction, ForeignKeyDefinition,
    IndexDefinition, TableDefinition,
};
use crate::core::traits::{CompatibilityMode, Generator, Quoter};
use crate::error::{MigrateError, Result};

/// Apply a compatibility policy to an operation the dialect cannot express.
pub fn compatibility(dialect: &str, mode: CompatibilityMode, feature: &str) -> Result<Vec<String>> {
    Ok(compatibility_note(dialect, mode, feature, "skipped")?
        .map(comment)
        .into_iter()
        .collect())
}

/// Apply a compatibility policy to a feature dropped or substituted inside
/// an otherwise supported statement.
///
/// Returns the note to annotate the output with, `None` outside annotate mode.
pub fn compatibility_note(
    dialect: &str,
    mode: CompatibilityMode,
    feature: &str,
    outcome: &str,
) -> Result<Option<String>> {
    match mode {
        CompatibilityMode::Strict => Err(MigrateError::not_supported(dialect, feature)),
        CompatibilityMode::Loose => {
            warn!("{} does not support {}; {}", dialect, feature, outcome);
            Ok(None)
        }
        CompatibilityMode::Annotate => {
            warn!("{} does not support {}; {}", dialect, feature, outcome);
            Ok(Some(format!("{} does not support {}; {}", dialect, feature, outcome)))
        }
    }
}

/// A note as a standalone comment statement.
pub fn comment(note: String) -> String {
    format!("-- {}", note)
}

/// A note appended inside a column definition.
pub fn inline_comment(note: &str) -> String {
    format!(" /* {} */", note)
}

/// Fail unless an identity column has an integer type.
///
/// Columns with a custom type are trusted as written.
pub fn require_integer_identity(dialect: &str, column: &ColumnDefinition) -> Result<()> {
    match column.db_type {
        Some(t) if !t.is_integer() && column.custom_type.is_none() => {
            Err(MigrateError::Generation(format!(
                "identity column '{}' must be an integer type on {}, got {:?}",
                column.name, dialect, t
            )))
        }
        _ => Ok(()),
    }
}

pub fn column_type<G: Generator + ?Sized>(g: &G, column: &ColumnDefinition) -> Result<String> {
    if let Some(custom) = &column.custom_type {
        return Ok(custom.clone());
    }
    match column.db_type {
        Some(db_type) => g
            .type_map()
            .get_type_map(db_type, column.size, column.precision),
        None => Err(MigrateError::Generation(format!(
            "column '{}' has no type",
            column.name
        ))),
    }
}

/// NOT NULL unless the column is explicitly nullable; altered nullable columns say NULL.
pub fn nullability(column: &ColumnDefinition) -> Option<&'static str> {
    match (column.nullable(), column.modification) {
        (false, _) => Some("NOT NULL"),
        (true, ColumnModification::Alter) => Some("NULL"),
        (true, ColumnModification::Create) => None,
    }
}

pub fn format_column<G: Generator + ?Sized>(
    g: &G,
    column: &ColumnDefinition,
    inline_primary_key: bool,
) -> Result<String> {
    if column.computed.is_some() {
        return g.format_computed_column(column);
    }

    let q = g.quoter();
    let mut parts = vec![q.quote_column_name(&column.name), g.column_type(column)?];
    if let Some(null) = nullability(column) {
        parts.push(null.to_string());
    }
    if let Some(default) = &column.default_value {
        parts.push(format!("DEFAULT {}", q.quote_value(default)?));
    }
    if column.is_identity {
        let identity = g.format_identity(column)?;
        if !identity.is_empty() {
            parts.push(identity);
        }
    }
    if inline_primary_key && column.is_primary_key {
        parts.push("PRIMARY KEY".to_string());
    }
    if column.is_unique {
        parts.push("UNIQUE".to_string());
    }
    Ok(parts.join(" "))
}

/// `<name> AS (<expression>) [PERSISTED] [NOT NULL]`
pub fn format_computed_column<G: Generator + ?Sized>(
    g: &G,
    column: &ColumnDefinition,
) -> Result<String> {
    let computed = computed_of(column)?;
    let mut sql = format!(
        "{} AS ({})",
        g.quoter().quote_column_name(&column.name),
        computed.expression
    );
    if computed.stored {
        sql.push_str(" PERSISTED");
    }
    if column.is_nullable == Some(false) {
        sql.push_str(" NOT NULL");
    }
    Ok(sql)
}

pub fn computed_of(column: &ColumnDefinition) -> Result<&crate::core::schema::ComputedColumn> {
    column.computed.as_ref().ok_or_else(|| {
        MigrateError::Generation(format!("column '{}' is not computed", column.name))
    })
}

pub fn quote_columns(q: &dyn Quoter, columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| q.quote_column_name(c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Column definitions plus a table-level primary key when one is needed.
///
/// A single unnamed primary key column is declared inline; composite or
/// named keys become a table constraint.
pub fn table_definitions<G: Generator + ?Sized>(g: &G, table: &TableDefinition) -> Result<Vec<String>> {
    let q = g.quoter();
    let pk_columns: Vec<String> = table
        .primary_key_columns()
        .iter()
        .map(|c| c.name.clone())
        .collect();
    let pk_name = table.primary_key_name();
    let inline_pk = pk_columns.len() == 1 && pk_name.is_none();

    let mut definitions = table
        .columns
        .iter()
        .map(|c| g.format_column(c, inline_pk))
        .collect::<Result<Vec<_>>>()?;

    if !inline_pk && !pk_columns.is_empty() {
        let columns = quote_columns(q, &pk_columns);
        definitions.push(match pk_name {
            Some(name) => format!(
                "CONSTRAINT {} PRIMARY KEY ({})",
                q.quote_identifier(name),
                columns
            ),
            None => format!("PRIMARY KEY ({})", columns),
        });
    }
    Ok(definitions)
}

pub fn create_table<G: Generator + ?Sized>(g: &G, e: &CreateTableExpression) -> Result<Vec<String>> {
    let table = &e.table;
    let q = g.quoter();
    let definitions = table_definitions(g, table)?;
    let mut statements = vec![format!(
        "CREATE TABLE {} ({})",
        q.quote_table_name(&table.name, table.schema_name.as_deref()),
        definitions.join(", ")
    )];
    for fk in table.columns.iter().filter_map(|c| c.foreign_key.as_ref()) {
        statements.extend(g.create_foreign_key(&CreateForeignKeyExpression {
            foreign_key: fk.clone(),
        })?);
    }
    Ok(statements)
}

pub fn delete_table<G: Generator + ?Sized>(g: &G, e: &DeleteTableExpression) -> Result<Vec<String>> {
    Ok(vec![format!(
        "DROP TABLE {}{}",
        if e.if_exists { "IF EXISTS " } else { "" },
        g.quoter().quote_table_name(&e.table_name, e.schema_name.as_deref())
    )])
}

pub fn rename_table<G: Generator + ?Sized>(g: &G, e: &RenameTableExpression) -> Result<Vec<String>> {
    let q = g.quoter();
    Ok(vec![format!(
        "ALTER TABLE {} RENAME TO {}",
        q.quote_table_name(&e.old_name, e.schema_name.as_deref()),
        q.quote_identifier(&e.new_name)
    )])
}

pub fn create_column<G: Generator + ?Sized>(g: &G, e: &CreateColumnExpression) -> Result<Vec<String>> {
    let q = g.quoter();
    let mut statements = vec![format!(
        "ALTER TABLE {} ADD COLUMN {}",
        q.quote_table_name(&e.table_name, e.schema_name.as_deref()),
        g.format_column(&e.column, true)?
    )];
    if let Some(fk) = &e.column.foreign_key {
        statements.extend(g.create_foreign_key(&CreateForeignKeyExpression {
            foreign_key: fk.clone(),
        })?);
    }
    Ok(statements)
}

/// Name, type and nullability only; ALTER COLUMN takes no other clauses.
pub fn format_alter_column<G: Generator + ?Sized>(g: &G, column: &ColumnDefinition) -> Result<String> {
    let mut parts = vec![
        g.quoter().quote_column_name(&column.name),
        g.column_type(column)?,
    ];
    if let Some(null) = nullability(column) {
        parts.push(null.to_string());
    }
    Ok(parts.join(" "))
}

pub fn alter_column<G: Generator + ?Sized>(g: &G, e: &AlterColumnExpression) -> Result<Vec<String>> {
    let q = g.quoter();
    let table = q.quote_table_name(&e.table_name, e.schema_name.as_deref());
    let mut statements = vec![format!(
        "ALTER TABLE {} ALTER COLUMN {}",
        table,
        format_alter_column(g, &e.column)?
    )];
    if let Some(default) = &e.column.default_value {
        statements.push(format!(
            "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {}",
            table,
            q.quote_column_name(&e.column.name),
            q.quote_value(default)?
        ));
    }
    Ok(statements)
}

pub fn delete_column<G: Generator + ?Sized>(g: &G, e: &DeleteColumnExpression) -> Result<Vec<String>> {
    let q = g.quoter();
    let table = q.quote_table_name(&e.table_name, e.schema_name.as_deref());
    Ok(e.column_names
        .iter()
        .map(|c| format!("ALTER TABLE {} DROP COLUMN {}", table, q.quote_column_name(c)))
        .collect())
}

pub fn rename_column<G: Generator + ?Sized>(g: &G, e: &RenameColumnExpression) -> Result<Vec<String>> {
    let q = g.quoter();
    Ok(vec![format!(
        "ALTER TABLE {} RENAME COLUMN {} TO {}",
        q.quote_table_name(&e.table_name, e.schema_name.as_deref()),
        q.quote_column_name(&e.old_name),
        q.quote_column_name(&e.new_name)
    )])
}

pub fn index_name(index: &IndexDefinition) -> Result<&str> {
    index.name.as_deref().ok_or_else(|| {
        MigrateError::Generation(format!("index on '{}' has no name", index.table_name))
    })
}

pub fn index_columns(q: &dyn Quoter, index: &IndexDefinition) -> String {
    index
        .columns
        .iter()
        .map(|c| {
            format!(
                "{} {}",
                q.quote_column_name(&c.name),
                match c.direction {
                    Direction::Ascending => "ASC",
                    Direction::Descending => "DESC",
                }
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// `CREATE [UNIQUE] INDEX name ON table (columns) [WHERE filter]`
///
/// Clustered and INCLUDE options go through the compatibility policy.
pub fn create_index<G: Generator + ?Sized>(g: &G, e: &CreateIndexExpression) -> Result<Vec<String>> {
    let index = &e.index;
    let q = g.quoter();
    let mut statements = Vec::new();
    if index.is_clustered {
        statements.extend(g.compatibility_note("clustered indexes", "ignored")?.map(comment));
    }
    if !index.includes.is_empty() {
        statements.extend(g.compatibility_note("included index columns", "ignored")?.map(comment));
    }
    let mut sql = format!(
        "CREATE {}INDEX {} ON {} ({})",
        if index.is_unique { "UNIQUE " } else { "" },
        q.quote_identifier(index_name(index)?),
        q.quote_table_name(&index.table_name, index.schema_name.as_deref()),
        index_columns(q, index)
    );
    if let Some(filter) = &index.filter {
        sql.push_str(&format!(" WHERE {}", filter));
    }
    statements.push(sql);
    Ok(statements)
}

/// `DROP INDEX schema.name`
pub fn delete_index<G: Generator + ?Sized>(g: &G, e: &DeleteIndexExpression) -> Result<Vec<String>> {
    let q = g.quoter();
    Ok(vec![format!(
        "DROP INDEX {}",
        q.quote_table_name(index_name(&e.index)?, e.index.schema_name.as_deref())
    )])
}

/// `FOREIGN KEY (cols) REFERENCES table (cols) [ON DELETE ..] [ON UPDATE ..]`
pub fn foreign_key_clause(q: &dyn Quoter, fk: &ForeignKeyDefinition) -> String {
    let mut sql = format!(
        "FOREIGN KEY ({}) REFERENCES {} ({})",
        quote_columns(q, &fk.foreign_columns),
        q.quote_table_name(&fk.primary_table, fk.primary_table_schema.as_deref()),
        quote_columns(q, &fk.primary_columns)
    );
    if let Some(rule) = fk.on_delete.as_sql() {
        sql.push_str(&format!(" ON DELETE {}", rule));
    }
    if let Some(rule) = fk.on_update.as_sql() {
        sql.push_str(&format!(" ON UPDATE {}", rule));
    }
    sql
}

pub fn create_foreign_key<G: Generator + ?Sized>(
    g: &G,
    e: &CreateForeignKeyExpression,
) -> Result<Vec<String>> {
    let fk = &e.foreign_key;
    if fk.foreign_columns.len() != fk.primary_columns.len() {
        return Err(MigrateError::Generation(format!(
            "foreign key on '{}' has {} foreign columns and {} primary columns",
            fk.foreign_table,
            fk.foreign_columns.len(),
            fk.primary_columns.len()
        )));
    }
    let q = g.quoter();
    let constraint = fk
        .name
        .as_deref()
        .map(|n| format!("CONSTRAINT {} ", q.quote_identifier(n)))
        .unwrap_or_default();
    Ok(vec![format!(
        "ALTER TABLE {} ADD {}{}",
        q.quote_table_name(&fk.foreign_table, fk.foreign_table_schema.as_deref()),
        constraint,
        foreign_key_clause(q, fk)
    )])
}

pub fn delete_foreign_key<G: Generator + ?Sized>(
    g: &G,
    e: &DeleteForeignKeyExpression,
) -> Result<Vec<String>> {
    let fk = &e.foreign_key;
    let q = g.quoter();
    let name = fk.name.as_deref().ok_or_else(|| {
        MigrateError::Generation(format!("foreign key on '{}' has no name", fk.foreign_table))
    })?;
    Ok(vec![format!(
        "ALTER TABLE {} DROP CONSTRAINT {}",
        q.quote_table_name(&fk.foreign_table, fk.foreign_table_schema.as_deref()),
        q.quote_identifier(name)
    )])
}

pub fn create_constraint<G: Generator + ?Sized>(
    g: &G,
    e: &CreateConstraintExpression,
) -> Result<Vec<String>> {
    let c = &e.constraint;
    let q = g.quoter();
    let kind = match c.kind {
        ConstraintKind::PrimaryKey => "PRIMARY KEY",
        ConstraintKind::Unique => "UNIQUE",
    };
    let constraint = c
        .name
        .as_deref()
        .map(|n| format!("CONSTRAINT {} ", q.quote_identifier(n)))
        .unwrap_or_default();
    Ok(vec![format!(
        "ALTER TABLE {} ADD {}{} ({})",
        q.quote_table_name(&c.table_name, c.schema_name.as_deref()),
        constraint,
        kind,
        quote_columns(q, &c.columns)
    )])
}

pub fn delete_constraint<G: Generator + ?Sized>(
    g: &G,
    e: &DeleteConstraintExpression,
) -> Result<Vec<String>> {
    let c = &e.constraint;
    let q = g.quoter();
    let name = c.name.as_deref().ok_or_else(|| {
        MigrateError::Generation(format!("constraint on '{}' has no name", c.table_name))
    })?;
    Ok(vec![format!(
        "ALTER TABLE {} DROP CONSTRAINT {}",
        q.quote_table_name(&c.table_name, c.schema_name.as_deref()),
        q.quote_identifier(name)
    )])
}

pub fn create_sequence<G: Generator + ?Sized>(
    g: &G,
    e: &CreateSequenceExpression,
) -> Result<Vec<String>> {
    let s = &e.sequence;
    let mut sql = format!(
        "CREATE SEQUENCE {}",
        g.quoter().quote_table_name(&s.name, s.schema_name.as_deref())
    );
    if let Some(v) = s.increment {
        sql.push_str(&format!(" INCREMENT BY {}", v));
    }
    if let Some(v) = s.min_value {
        sql.push_str(&format!(" MINVALUE {}", v));
    }
    if let Some(v) = s.max_value {
        sql.push_str(&format!(" MAXVALUE {}", v));
    }
    if let Some(v) = s.start_with {
        sql.push_str(&format!(" START WITH {}", v));
    }
    if let Some(v) = s.cache {
        sql.push_str(&format!(" CACHE {}", v));
    }
    if s.cycle {
        sql.push_str(" CYCLE");
    }
    Ok(vec![sql])
}

pub fn delete_sequence<G: Generator + ?Sized>(
    g: &G,
    e: &DeleteSequenceExpression,
) -> Result<Vec<String>> {
    Ok(vec![format!(
        "DROP SEQUENCE {}",
        g.quoter()
            .quote_table_name(&e.sequence_name, e.schema_name.as_deref())
    )])
}

pub fn create_schema<G: Generator + ?Sized>(g: &G, e: &CreateSchemaExpression) -> Result<Vec<String>> {
    Ok(vec![format!(
        "CREATE SCHEMA {}",
        g.quoter().quote_schema_name(&e.schema_name)
    )])
}

pub fn delete_schema<G: Generator + ?Sized>(g: &G, e: &DeleteSchemaExpression) -> Result<Vec<String>> {
    Ok(vec![format!(
        "DROP SCHEMA {}",
        g.quoter().quote_schema_name(&e.schema_name)
    )])
}

/// `a = 1 AND b IS NULL`
pub fn format_conditions(q: &dyn Quoter, row: &DataRow) -> Result<String> {
    let parts = row
        .iter()
        .map(|(column, value)| {
            if value.is_null() {
                Ok(format!("{} IS NULL", q.quote_column_name(column)))
            } else {
                Ok(format!(
                    "{} = {}",
                    q.quote_column_name(column),
                    q.quote_value(value)?
                ))
            }
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join(" AND "))
}

pub fn insert_data<G: Generator + ?Sized>(g: &G, e: &InsertDataExpression) -> Result<Vec<String>> {
    let q = g.quoter();
    let table = q.quote_table_name(&e.table_name, e.schema_name.as_deref());
    e.rows
        .iter()
        .map(|row| {
            let columns = row
                .iter()
                .map(|(c, _)| q.quote_column_name(c))
                .collect::<Vec<_>>()
                .join(", ");
            let values = row
                .iter()
                .map(|(_, v)| q.quote_value(v))
                .collect::<Result<Vec<_>>>()?
                .join(", ");
            Ok(format!("INSERT INTO {} ({}) VALUES ({})", table, columns, values))
        })
        .collect()
}

pub fn update_data<G: Generator + ?Sized>(g: &G, e: &UpdateDataExpression) -> Result<Vec<String>> {
    let q = g.quoter();
    let assignments = e
        .set
        .iter()
        .map(|(c, v)| Ok(format!("{} = {}", q.quote_column_name(c), q.quote_value(v)?)))
        .collect::<Result<Vec<_>>>()?
        .join(", ");
    let mut sql = format!(
        "UPDATE {} SET {}",
        q.quote_table_name(&e.table_name, e.schema_name.as_deref()),
        assignments
    );
    if !e.all_rows {
        if e.where_clause.is_empty() {
            return Err(MigrateError::Generation(format!(
                "update of '{}' has no condition and does not target all rows",
                e.table_name
            )));
        }
        sql.push_str(&format!(" WHERE {}", format_conditions(q, &e.where_clause)?));
    }
    Ok(vec![sql])
}

pub fn delete_data<G: Generator + ?Sized>(g: &G, e: &DeleteDataExpression) -> Result<Vec<String>> {
    let q = g.quoter();
    let table = q.quote_table_name(&e.table_name, e.schema_name.as_deref());
    if e.all_rows {
        return Ok(vec![format!("DELETE FROM {}", table)]);
    }
    e.rows
        .iter()
        .map(|row| Ok(format!("DELETE FROM {} WHERE {}", table, format_conditions(q, row)?)))
        .collect()
}
