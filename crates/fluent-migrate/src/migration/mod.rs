//! Migrations, the context they fill and the loaders that discover them.

pub mod builder;
pub mod context;
pub mod conventions;
pub mod loader;
pub mod sql_file;

use async_trait::async_trait;

use crate::error::Result;

pub use builder::ColumnOptions;
pub use context::MigrationContext;
pub use conventions::Conventions;
pub use loader::MigrationLoader;
pub use sql_file::SqlFileMigration;

/// Whether the runner wraps a migration in a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionBehavior {
    /// One transaction per migration, when the dialect supports it.
    #[default]
    Default,
    /// Run without a transaction, e.g. for `CREATE INDEX CONCURRENTLY`.
    None,
}

/// A versioned schema change.
///
/// `down` defaults to reversing the expressions `up` produces, which works
/// for create, rename and add-column migrations. Migrations that delete,
/// alter or run SQL must supply their own `down`.
#[async_trait]
pub trait Migration: Send + Sync {
    /// Unique, ordered version, typically a timestamp such as `202401150930`.
    fn version(&self) -> i64;

    fn description(&self) -> String;

    /// Tags selecting this migration; untagged migrations always run.
    fn tags(&self) -> Vec<String> {
        Vec::new()
    }

    fn transaction_behavior(&self) -> TransactionBehavior {
        TransactionBehavior::Default
    }

    async fn up(&self, ctx: &mut MigrationContext) -> Result<()>;

    async fn down(&self, ctx: &mut MigrationContext) -> Result<()> {
        let mut forward = ctx.child();
        self.up(&mut forward).await?;
        let reversed = forward
            .finish()?
            .iter()
            .rev()
            .map(|e| e.reverse())
            .collect::<Result<Vec<_>>>()?;
        for expression in reversed {
            ctx.push(expression);
        }
        Ok(())
    }
}

/// Whether a migration with `tags` runs when `requested` tags are selected.
///
/// Untagged migrations always run; tagged ones run when nothing is
/// requested or when they carry every requested tag.
pub fn matches_tags(tags: &[String], requested: &[String]) -> bool {
    tags.is_empty()
        || requested.is_empty()
        || requested
            .iter()
            .all(|r| tags.iter().any(|t| t.eq_ignore_ascii_case(r)))
}
