//! `ctx.execute()`: raw SQL, script files and processor delegates.

use std::path::Path;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::core::expression::*;
use crate::core::traits::Processor;
use crate::error::Result;
use crate::migration::context::MigrationContext;

pub struct ExecuteBuilder<'a> {
    ctx: &'a mut MigrationContext,
}

impl<'a> ExecuteBuilder<'a> {
    pub(crate) fn new(ctx: &'a mut MigrationContext) -> Self {
        Self { ctx }
    }

    /// Raw SQL, passed to the processor unchanged.
    pub fn sql(self, sql: impl Into<String>) {
        self.ctx
            .push(MigrationExpression::ExecuteSql(ExecuteSqlExpression { sql: sql.into() }));
    }

    /// Read a script file now and execute its contents as one statement.
    pub fn script(self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(sql) => self.sql(sql),
            Err(e) => self
                .ctx
                .record_error(format!("failed to read script {}: {}", path.display(), e)),
        }
    }

    /// Run `operation` against the processor when the expression executes.
    ///
    /// Skipped in preview mode.
    pub fn with_connection<F>(self, description: impl Into<String>, operation: F)
    where
        F: for<'p> Fn(&'p dyn Processor) -> BoxFuture<'p, Result<()>> + Send + Sync + 'static,
    {
        self.ctx
            .push(MigrationExpression::PerformDbOperation(PerformDbOperationExpression {
                description: description.into(),
                operation: Arc::new(operation),
            }));
    }
}
