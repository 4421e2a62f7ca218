//! Migration runner - resolves pending work and applies it in version order.
//!
//! Each migration runs in its own transaction when the processor supports
//! transactional DDL; its version row is written in that same transaction so
//! schema change and bookkeeping commit or roll back together. The first
//! failure stops the run.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::core::expression::MigrationExpression;
use crate::core::traits::{process, Processor};
use crate::error::{MigrateError, Result};
use crate::migration::{
    Conventions, Migration, MigrationContext, MigrationLoader, TransactionBehavior,
};
use crate::version::{VersionLoader, VersionTableMetadata};

/// Direction a migration is applied in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationDirection {
    Up,
    Down,
}

impl std::fmt::Display for MigrationDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MigrationDirection::Up => write!(f, "up"),
            MigrationDirection::Down => write!(f, "down"),
        }
    }
}

/// Runner lifecycle, observable through [`MigrationRunner::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum RunnerState {
    Idle,
    Loading,
    Resolving,
    Executing {
        direction: MigrationDirection,
        version: i64,
    },
    Recording {
        direction: MigrationDirection,
        version: i64,
    },
}

/// Transaction scope used for migrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionMode {
    /// One transaction per migration, when the dialect supports transactional DDL.
    #[default]
    PerMigration,
    /// Never open transactions.
    None,
}

/// Runner behavior.
#[derive(Debug, Clone, Default)]
pub struct RunnerOptions {
    /// Only migrations matching these tags run.
    pub tags: Vec<String>,
    pub transaction_mode: TransactionMode,
    pub version_table: VersionTableMetadata,
}

/// One migration executed by a run.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutedMigration {
    pub version: i64,
    pub description: String,
    pub expressions: usize,
    pub duration_ms: u64,
}

/// Result of a migrate or rollback run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Unique run identifier.
    pub run_id: String,

    pub direction: MigrationDirection,

    /// SQL was logged, not executed.
    pub preview: bool,

    /// Migrations executed, in execution order.
    pub migrations: Vec<ExecutedMigration>,

    pub started_at: DateTime<Utc>,

    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,
}

/// Status of one migration as reported by [`MigrationRunner::list`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    Applied,
    Pending,
    /// Recorded in the version table, but no migration declares it.
    Unknown,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationInfo {
    pub version: i64,
    pub description: String,
    pub status: MigrationStatus,
    pub applied_on: Option<NaiveDateTime>,
    pub tags: Vec<String>,
}

/// Applies migrations against one processor.
pub struct MigrationRunner {
    processor: Arc<dyn Processor>,
    conventions: Arc<Conventions>,
    loader: MigrationLoader,
    versions: VersionLoader,
    options: RunnerOptions,
    state: watch::Sender<RunnerState>,
}

impl MigrationRunner {
    pub fn new(processor: Arc<dyn Processor>, loader: MigrationLoader, options: RunnerOptions) -> Self {
        let versions = VersionLoader::new(processor.clone(), options.version_table.clone());
        let (state, _) = watch::channel(RunnerState::Idle);
        Self {
            processor,
            conventions: Arc::new(Conventions::default()),
            loader,
            versions,
            options,
            state,
        }
    }

    /// Set the naming conventions applied to every migration.
    pub fn with_conventions(mut self, conventions: Conventions) -> Self {
        self.conventions = Arc::new(conventions);
        self
    }

    pub fn processor(&self) -> &Arc<dyn Processor> {
        &self.processor
    }

    pub fn state(&self) -> RunnerState {
        *self.state.borrow()
    }

    /// Receive every state transition.
    pub fn subscribe(&self) -> watch::Receiver<RunnerState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: RunnerState) {
        debug!("Runner state: {:?}", state);
        self.state.send_replace(state);
    }

    /// Apply pending migrations up to and including `target` (all when `None`).
    pub async fn migrate_up(&self, target: Option<i64>) -> Result<RunSummary> {
        let result = self.run_up(target).await;
        self.set_state(RunnerState::Idle);
        result
    }

    /// Revert applied migrations newer than `target`.
    pub async fn migrate_down(&self, target: i64) -> Result<RunSummary> {
        let result = self.run_down(|applied| applied.filter(|v| *v > target).collect()).await;
        self.set_state(RunnerState::Idle);
        result
    }

    /// Revert the `steps` most recently applied migrations.
    pub async fn rollback(&self, steps: usize) -> Result<RunSummary> {
        let result = self.run_down(|applied| applied.take(steps).collect()).await;
        self.set_state(RunnerState::Idle);
        result
    }

    /// Revert every applied migration.
    pub async fn rollback_all(&self) -> Result<RunSummary> {
        let result = self.run_down(|applied| applied.collect()).await;
        self.set_state(RunnerState::Idle);
        result
    }

    /// Every known or recorded migration with its status, ordered by version.
    pub async fn list(&self) -> Result<Vec<MigrationInfo>> {
        let result = self.run_list().await;
        self.set_state(RunnerState::Idle);
        result
    }

    /// Fail when a pending migration is older than the newest applied one.
    pub async fn validate_version_order(&self) -> Result<()> {
        let result = self.run_validate().await;
        self.set_state(RunnerState::Idle);
        result
    }

    // =========================================================================
    // Phases
    // =========================================================================

    fn load(&self) -> Result<Vec<Arc<dyn Migration>>> {
        self.set_state(RunnerState::Loading);
        self.loader.load(&self.options.tags)
    }

    async fn resolve(&self) -> Result<BTreeSet<i64>> {
        self.set_state(RunnerState::Resolving);
        self.versions.ensure_table().await?;
        self.versions.applied_versions().await
    }

    async fn run_up(&self, target: Option<i64>) -> Result<RunSummary> {
        let started_at = Utc::now();
        let migrations = self.load()?;
        let applied = self.resolve().await?;

        let work: Vec<_> = migrations
            .into_iter()
            .filter(|m| !applied.contains(&m.version()))
            .filter(|m| target.map_or(true, |t| m.version() <= t))
            .collect();
        info!("{} migration(s) to apply", work.len());

        let mut executed = Vec::with_capacity(work.len());
        for migration in work {
            executed.push(self.apply(migration.as_ref(), MigrationDirection::Up).await?);
        }
        Ok(self.summary(MigrationDirection::Up, started_at, executed))
    }

    async fn run_down<F>(&self, select: F) -> Result<RunSummary>
    where
        F: FnOnce(std::iter::Rev<std::collections::btree_set::IntoIter<i64>>) -> Vec<i64>,
    {
        let started_at = Utc::now();
        let migrations = self.load()?;
        let applied = self.resolve().await?;

        let by_version: BTreeMap<i64, Arc<dyn Migration>> =
            migrations.into_iter().map(|m| (m.version(), m)).collect();
        let versions = select(applied.into_iter().rev());

        let work = versions
            .into_iter()
            .map(|version| {
                by_version.get(&version).cloned().ok_or_else(|| {
                    MigrateError::InvalidMigration(format!(
                        "version {} is applied but no migration declares it",
                        version
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        info!("{} migration(s) to revert", work.len());

        let mut executed = Vec::with_capacity(work.len());
        for migration in work {
            executed.push(self.apply(migration.as_ref(), MigrationDirection::Down).await?);
        }
        Ok(self.summary(MigrationDirection::Down, started_at, executed))
    }

    async fn run_list(&self) -> Result<Vec<MigrationInfo>> {
        let migrations = self.load()?;
        self.set_state(RunnerState::Resolving);
        let mut applied: BTreeMap<i64, _> = self
            .versions
            .applied()
            .await?
            .into_iter()
            .map(|a| (a.version, a))
            .collect();

        let mut infos: Vec<MigrationInfo> = migrations
            .iter()
            .map(|m| {
                let row = applied.remove(&m.version());
                MigrationInfo {
                    version: m.version(),
                    description: m.description(),
                    status: if row.is_some() {
                        MigrationStatus::Applied
                    } else {
                        MigrationStatus::Pending
                    },
                    applied_on: row.and_then(|r| r.applied_on),
                    tags: m.tags(),
                }
            })
            .collect();
        infos.extend(applied.into_values().map(|row| MigrationInfo {
            version: row.version,
            description: row.description.unwrap_or_default(),
            status: MigrationStatus::Unknown,
            applied_on: row.applied_on,
            tags: Vec::new(),
        }));
        infos.sort_by_key(|i| i.version);
        Ok(infos)
    }

    async fn run_validate(&self) -> Result<()> {
        let migrations = self.load()?;
        self.set_state(RunnerState::Resolving);
        let applied = self.versions.applied_versions().await?;
        let Some(&newest) = applied.iter().next_back() else {
            return Ok(());
        };
        let out_of_order: Vec<String> = migrations
            .iter()
            .filter(|m| m.version() < newest && !applied.contains(&m.version()))
            .map(|m| format!("{} ({})", m.version(), m.description()))
            .collect();
        if out_of_order.is_empty() {
            Ok(())
        } else {
            Err(MigrateError::InvalidMigration(format!(
                "pending migrations older than applied version {}: {}",
                newest,
                out_of_order.join(", ")
            )))
        }
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Build, check and execute one migration, then record it.
    async fn apply(
        &self,
        migration: &dyn Migration,
        direction: MigrationDirection,
    ) -> Result<ExecutedMigration> {
        let version = migration.version();
        let description = migration.description();
        let start = Instant::now();

        let expressions = self.build(migration, direction).await?;
        self.check(&expressions)?;

        let transactional = self.processor.supports_transactional_ddl()
            && self.options.transaction_mode == TransactionMode::PerMigration
            && migration.transaction_behavior() == TransactionBehavior::Default;
        if !transactional {
            debug!("Migration {} runs without a transaction", version);
        }

        self.set_state(RunnerState::Executing { direction, version });
        if transactional {
            self.processor.begin_transaction().await?;
        }

        // A failed COMMIT can leave the transaction open, so it rolls back like any other failure
        let result = match self.execute(&expressions, direction, version, &description).await {
            Ok(()) if transactional => self.processor.commit_transaction().await,
            other => other,
        };
        if let Err(e) = result {
            error!("Migration {} ({}) failed: {}", version, description, e);
            if transactional {
                if let Err(rollback) = self.processor.rollback_transaction().await {
                    warn!("Rollback of migration {} failed: {}", version, rollback);
                }
            } else {
                warn!(
                    "Migration {} ran without a transaction; its completed statements remain applied",
                    version
                );
            }
            return Err(e);
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            version,
            direction = %direction,
            expressions = expressions.len(),
            duration_ms,
            "Migrated {}: {}",
            version,
            description
        );
        Ok(ExecutedMigration {
            version,
            description,
            expressions: expressions.len(),
            duration_ms,
        })
    }

    async fn build(
        &self,
        migration: &dyn Migration,
        direction: MigrationDirection,
    ) -> Result<Vec<MigrationExpression>> {
        let mut ctx = MigrationContext::new(self.processor.clone(), self.conventions.clone());
        match direction {
            MigrationDirection::Up => migration.up(&mut ctx).await?,
            MigrationDirection::Down => migration.down(&mut ctx).await?,
        }
        ctx.finish()
    }

    /// Reject invalid or unsupported expressions before anything executes.
    fn check(&self, expressions: &[MigrationExpression]) -> Result<()> {
        let generator = self.processor.generator();
        for expression in expressions {
            expression.validate()?;
            if !matches!(expression, MigrationExpression::PerformDbOperation(_)) {
                generator.generate(expression)?;
            }
        }
        Ok(())
    }

    async fn execute(
        &self,
        expressions: &[MigrationExpression],
        direction: MigrationDirection,
        version: i64,
        description: &str,
    ) -> Result<()> {
        for expression in expressions {
            process(self.processor.as_ref(), expression).await?;
        }
        self.set_state(RunnerState::Recording { direction, version });
        match direction {
            MigrationDirection::Up => self.versions.record_up(version, description).await,
            MigrationDirection::Down => self.versions.record_down(version).await,
        }
    }

    fn summary(
        &self,
        direction: MigrationDirection,
        started_at: DateTime<Utc>,
        migrations: Vec<ExecutedMigration>,
    ) -> RunSummary {
        let completed_at = Utc::now();
        RunSummary {
            run_id: uuid::Uuid::new_v4().to_string(),
            direction,
            preview: self.processor.options().preview_only,
            migrations,
            started_at,
            completed_at,
            duration_seconds: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::core::traits::ProcessorOptions;
    use crate::drivers::{ConnectionlessProcessor, SqliteGenerator};

    struct Noop(i64);

    #[async_trait]
    impl Migration for Noop {
        fn version(&self) -> i64 {
            self.0
        }

        fn description(&self) -> String {
            format!("noop {}", self.0)
        }

        async fn up(&self, ctx: &mut MigrationContext) -> Result<()> {
            ctx.execute().sql(format!("SELECT {}", self.0));
            Ok(())
        }

        async fn down(&self, ctx: &mut MigrationContext) -> Result<()> {
            ctx.execute().sql(format!("SELECT -{}", self.0));
            Ok(())
        }
    }

    fn runner(versions: &[i64]) -> (MigrationRunner, Arc<ConnectionlessProcessor>) {
        let processor = Arc::new(ConnectionlessProcessor::new(
            Box::new(SqliteGenerator::default()),
            ProcessorOptions::default(),
        ));
        let mut loader = MigrationLoader::new();
        for v in versions {
            loader.add(Noop(*v));
        }
        (
            MigrationRunner::new(processor.clone(), loader, RunnerOptions::default()),
            processor,
        )
    }

    #[tokio::test]
    async fn test_connectionless_up_scripts_everything_in_order() {
        let (runner, processor) = runner(&[3, 1, 2]);
        let summary = runner.migrate_up(None).await.unwrap();
        let versions: Vec<_> = summary.migrations.iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![1, 2, 3]);
        assert_eq!(summary.direction, MigrationDirection::Up);
        assert_eq!(runner.state(), RunnerState::Idle);

        let selects: Vec<_> = processor
            .statements()
            .into_iter()
            .filter(|s| s.starts_with("SELECT"))
            .collect();
        assert_eq!(selects, vec!["SELECT 1", "SELECT 2", "SELECT 3"]);
    }

    #[tokio::test]
    async fn test_target_version_limits_work() {
        let (runner, _) = runner(&[1, 2, 3]);
        let summary = runner.migrate_up(Some(2)).await.unwrap();
        assert_eq!(summary.migrations.len(), 2);
    }

    #[tokio::test]
    async fn test_state_returns_to_idle_after_failure() {
        let processor = Arc::new(ConnectionlessProcessor::new(
            Box::new(SqliteGenerator::default()),
            ProcessorOptions::default(),
        ));
        let mut loader = MigrationLoader::new();
        loader.add(Noop(1)).add(Noop(1));
        let runner = MigrationRunner::new(processor, loader, RunnerOptions::default());
        assert!(matches!(
            runner.migrate_up(None).await,
            Err(MigrateError::DuplicateVersion { .. })
        ));
        assert_eq!(runner.state(), RunnerState::Idle);
    }

    #[tokio::test]
    async fn test_subscribe_sees_transitions() {
        let (runner, _) = runner(&[1]);
        let mut rx = runner.subscribe();
        runner.migrate_up(None).await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), RunnerState::Idle);
    }

    #[test]
    fn test_summary_serializes() {
        let summary = RunSummary {
            run_id: "r".into(),
            direction: MigrationDirection::Down,
            preview: true,
            migrations: vec![ExecutedMigration {
                version: 7,
                description: "x".into(),
                expressions: 2,
                duration_ms: 5,
            }],
            started_at: Utc::now(),
            completed_at: Utc::now(),
            duration_seconds: 0.0,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["direction"], "down");
        assert_eq!(json["preview"], true);
        assert_eq!(json["migrations"][0]["version"], 7);
    }
}
