//! Existence queries: `ctx.schema().table("Users").column("Email").exists()`.

use crate::core::traits::Processor;
use crate::error::Result;

/// Entry point for existence checks against the live database.
///
/// Against a connectionless processor every check answers `false`.
#[derive(Clone, Copy)]
pub struct SchemaQuery<'a> {
    processor: &'a dyn Processor,
}

impl<'a> SchemaQuery<'a> {
    pub fn new(processor: &'a dyn Processor) -> Self {
        Self { processor }
    }

    pub fn table(self, table: &'a str) -> TableQuery<'a> {
        TableQuery {
            processor: self.processor,
            schema: None,
            table,
        }
    }

    pub fn schema(self, schema: &'a str) -> SchemaNameQuery<'a> {
        SchemaNameQuery {
            processor: self.processor,
            schema,
        }
    }

    pub fn sequence(self, sequence: &'a str) -> SequenceQuery<'a> {
        SequenceQuery {
            processor: self.processor,
            schema: None,
            sequence,
        }
    }
}

#[derive(Clone, Copy)]
pub struct SchemaNameQuery<'a> {
    processor: &'a dyn Processor,
    schema: &'a str,
}

impl<'a> SchemaNameQuery<'a> {
    pub async fn exists(self) -> Result<bool> {
        self.processor.schema_exists(self.schema).await
    }

    pub fn table(self, table: &'a str) -> TableQuery<'a> {
        TableQuery {
            processor: self.processor,
            schema: Some(self.schema),
            table,
        }
    }

    pub fn sequence(self, sequence: &'a str) -> SequenceQuery<'a> {
        SequenceQuery {
            processor: self.processor,
            schema: Some(self.schema),
            sequence,
        }
    }
}

#[derive(Clone, Copy)]
pub struct TableQuery<'a> {
    processor: &'a dyn Processor,
    schema: Option<&'a str>,
    table: &'a str,
}

impl<'a> TableQuery<'a> {
    pub async fn exists(self) -> Result<bool> {
        self.processor.table_exists(self.schema, self.table).await
    }

    pub fn column(self, column: &'a str) -> TableObjectQuery<'a> {
        self.object(TableObject::Column, column)
    }

    pub fn index(self, index: &'a str) -> TableObjectQuery<'a> {
        self.object(TableObject::Index, index)
    }

    pub fn constraint(self, constraint: &'a str) -> TableObjectQuery<'a> {
        self.object(TableObject::Constraint, constraint)
    }

    fn object(self, kind: TableObject, name: &'a str) -> TableObjectQuery<'a> {
        TableObjectQuery {
            table: self,
            kind,
            name,
        }
    }
}

#[derive(Clone, Copy)]
enum TableObject {
    Column,
    Index,
    Constraint,
}

/// A column, index or constraint of one table.
#[derive(Clone, Copy)]
pub struct TableObjectQuery<'a> {
    table: TableQuery<'a>,
    kind: TableObject,
    name: &'a str,
}

impl TableObjectQuery<'_> {
    pub async fn exists(self) -> Result<bool> {
        let TableQuery {
            processor,
            schema,
            table,
        } = self.table;
        match self.kind {
            TableObject::Column => processor.column_exists(schema, table, self.name).await,
            TableObject::Index => processor.index_exists(schema, table, self.name).await,
            TableObject::Constraint => {
                processor.constraint_exists(schema, table, self.name).await
            }
        }
    }
}

#[derive(Clone, Copy)]
pub struct SequenceQuery<'a> {
    processor: &'a dyn Processor,
    schema: Option<&'a str>,
    sequence: &'a str,
}

impl SequenceQuery<'_> {
    pub async fn exists(self) -> Result<bool> {
        self.processor.sequence_exists(self.schema, self.sequence).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::ProcessorOptions;
    use crate::drivers::{ConnectionlessProcessor, SqliteGenerator, SqliteProcessor};

    #[tokio::test]
    async fn test_queries_against_sqlite() {
        let processor = SqliteProcessor::in_memory(ProcessorOptions::default())
            .await
            .unwrap();
        processor
            .execute_raw("CREATE TABLE Users (Id INTEGER, Email TEXT)")
            .await
            .unwrap();
        processor
            .execute_raw("CREATE INDEX IX_Users_Email ON Users (Email)")
            .await
            .unwrap();

        let schema = SchemaQuery::new(&processor);
        assert!(schema.table("Users").exists().await.unwrap());
        assert!(!schema.table("Orders").exists().await.unwrap());
        assert!(schema.table("Users").column("Email").exists().await.unwrap());
        assert!(!schema.table("Users").column("Name").exists().await.unwrap());
        assert!(schema.table("Users").index("IX_Users_Email").exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_connectionless_answers_false() {
        let processor = ConnectionlessProcessor::new(
            Box::new(SqliteGenerator::default()),
            ProcessorOptions::default(),
        );
        let schema = SchemaQuery::new(&processor);
        assert!(!schema.table("Users").exists().await.unwrap());
        assert!(!schema.schema("app").exists().await.unwrap());
        assert!(!schema.sequence("Seq").exists().await.unwrap());
        assert!(!schema.table("Users").constraint("PK_Users").exists().await.unwrap());
    }
}
