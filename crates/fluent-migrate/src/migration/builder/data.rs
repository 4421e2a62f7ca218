//! Insert and update builders.

use crate::core::expression::*;
use crate::core::value::SqlValue;
use crate::migration::context::MigrationContext;

use super::data_row;

pub struct InsertBuilder<'a> {
    ctx: &'a mut MigrationContext,
}

impl<'a> InsertBuilder<'a> {
    pub(crate) fn new(ctx: &'a mut MigrationContext) -> Self {
        Self { ctx }
    }

    pub fn into_table(self, table: impl Into<String>) -> InsertDataBuilder<'a> {
        let index = self
            .ctx
            .push(MigrationExpression::InsertData(InsertDataExpression {
                schema_name: None,
                table_name: table.into(),
                rows: Vec::new(),
                identity_insert: false,
            }));
        InsertDataBuilder { ctx: self.ctx, index }
    }
}

pub struct InsertDataBuilder<'a> {
    ctx: &'a mut MigrationContext,
    index: usize,
}

impl InsertDataBuilder<'_> {
    fn with(self, f: impl FnOnce(&mut InsertDataExpression)) -> Self {
        if let Some(MigrationExpression::InsertData(e)) = self.ctx.expression_mut(self.index) {
            f(e);
        }
        self
    }

    pub fn in_schema(self, schema: impl Into<String>) -> Self {
        let schema = schema.into();
        self.with(|e| e.schema_name = Some(schema))
    }

    /// Append one row; columns keep the given order.
    pub fn row<I, K, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<SqlValue>,
    {
        let row = data_row(values);
        self.with(|e| e.rows.push(row))
    }

    /// Allow explicit values for identity columns.
    pub fn with_identity_insert(self) -> Self {
        self.with(|e| e.identity_insert = true)
    }
}

pub struct UpdateBuilder<'a> {
    ctx: &'a mut MigrationContext,
}

impl<'a> UpdateBuilder<'a> {
    pub(crate) fn new(ctx: &'a mut MigrationContext) -> Self {
        Self { ctx }
    }

    pub fn table(self, table: impl Into<String>) -> UpdateDataBuilder<'a> {
        let index = self
            .ctx
            .push(MigrationExpression::UpdateData(UpdateDataExpression {
                schema_name: None,
                table_name: table.into(),
                set: Vec::new(),
                where_clause: Vec::new(),
                all_rows: false,
            }));
        UpdateDataBuilder { ctx: self.ctx, index }
    }
}

pub struct UpdateDataBuilder<'a> {
    ctx: &'a mut MigrationContext,
    index: usize,
}

impl UpdateDataBuilder<'_> {
    fn with(self, f: impl FnOnce(&mut UpdateDataExpression)) -> Self {
        if let Some(MigrationExpression::UpdateData(e)) = self.ctx.expression_mut(self.index) {
            f(e);
        }
        self
    }

    pub fn in_schema(self, schema: impl Into<String>) -> Self {
        let schema = schema.into();
        self.with(|e| e.schema_name = Some(schema))
    }

    pub fn set<I, K, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<SqlValue>,
    {
        let values = data_row(values);
        self.with(|e| e.set.extend(values))
    }

    /// AND-ed equality conditions; a NULL value matches `IS NULL`.
    pub fn where_<I, K, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<SqlValue>,
    {
        let values = data_row(values);
        self.with(|e| e.where_clause.extend(values))
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
    use crate::drivers::{ConnectionlessProcessor, SqlServerGenerator, SqliteGenerator};
    use crate::migration::conventions::Conventions;

    fn generate<G: Generator + Default + 'static>(
        build: impl FnOnce(&mut MigrationContext),
    ) -> Vec<String> {
        let processor = Arc::new(ConnectionlessProcessor::new(
            Box::new(G::default()),
            ProcessorOptions::default(),
        ));
        let mut ctx = MigrationContext::new(processor, Arc::new(Conventions::default()));
        build(&mut ctx);
        let generator = G::default();
        ctx.finish()
            .unwrap()
            .iter()
            .flat_map(|e| generator.generate(e).unwrap())
            .collect()
    }

    #[test]
    fn test_insert_rows_keep_column_order() {
        let sql = generate::<SqliteGenerator>(|ctx| {
            ctx.insert()
                .into_table("Roles")
                .row([("Id", SqlValue::from(1)), ("Name", SqlValue::from("admin"))])
                .row([("Id", SqlValue::from(2)), ("Name", SqlValue::Null)]);
        });
        assert_eq!(
            sql,
            vec![
                "INSERT INTO \"Roles\" (\"Id\", \"Name\") VALUES (1, 'admin')",
                "INSERT INTO \"Roles\" (\"Id\", \"Name\") VALUES (2, NULL)",
            ]
        );
    }

    #[test]
    fn test_insert_with_identity_insert() {
        let sql = generate::<SqlServerGenerator>(|ctx| {
            ctx.insert()
                .into_table("Roles")
                .with_identity_insert()
                .row([("Id", 1)]);
        });
        assert_eq!(sql.first().map(String::as_str), Some("SET IDENTITY_INSERT [Roles] ON"));
        assert_eq!(sql.last().map(String::as_str), Some("SET IDENTITY_INSERT [Roles] OFF"));
    }

    #[test]
    fn test_update_with_condition() {
        let sql = generate::<SqlServerGenerator>(|ctx| {
            ctx.update()
                .table("Users")
                .set([("Active", false)])
                .where_([("Email", SqlValue::Null)]);
        });
        assert_eq!(sql, vec!["UPDATE [Users] SET [Active] = 0 WHERE [Email] IS NULL"]);
    }

    #[test]
    fn test_update_without_condition_fails_validation() {
        let processor = Arc::new(ConnectionlessProcessor::new(
            Box::new(SqlServerGenerator::default()),
            ProcessorOptions::default(),
        ));
        let mut ctx = MigrationContext::new(processor, Arc::new(Conventions::default()));
        ctx.update().table("Users").set([("Active", true)]);
        assert!(ctx.finish().unwrap()[0].validate().is_err());
    }
}
