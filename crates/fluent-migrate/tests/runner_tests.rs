//! Runner integration tests against in-memory SQLite and the connectionless processor.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fluent_migrate::{
    ColumnOptions, CompatibilityMode, ConnectionlessProcessor, MigrateError, Migration,
    MigrationContext, MigrationLoader, MigrationRunner, MigrationStatus, Processor,
    PostgresGenerator, ProcessorOptions, Result, RunnerOptions, SqlServerGenerator,
    SqliteGenerator, SqliteProcessor, TransactionBehavior,
};

type Log = Arc<Mutex<Vec<String>>>;

/// Creates table `t{version}` and logs every call.
struct CreateTable {
    version: i64,
    tags: Vec<String>,
    log: Log,
}

#[async_trait]
impl Migration for CreateTable {
    fn version(&self) -> i64 {
        self.version
    }

    fn description(&self) -> String {
        format!("create t{}", self.version)
    }

    fn tags(&self) -> Vec<String> {
        self.tags.clone()
    }

    async fn up(&self, ctx: &mut MigrationContext) -> Result<()> {
        self.log.lock().unwrap().push(format!("up {}", self.version));
        ctx.create()
            .table(format!("t{}", self.version))
            .with_column("Id")
            .as_int32()
            .primary_key();
        Ok(())
    }

    async fn down(&self, ctx: &mut MigrationContext) -> Result<()> {
        self.log.lock().unwrap().push(format!("down {}", self.version));
        ctx.delete().table(format!("t{}", self.version));
        Ok(())
    }
}

/// Creates a table, inserts into it, then fails.
struct FailsOnThirdExpression {
    behavior: TransactionBehavior,
}

#[async_trait]
impl Migration for FailsOnThirdExpression {
    fn version(&self) -> i64 {
        2
    }

    fn description(&self) -> String {
        "fails".into()
    }

    fn transaction_behavior(&self) -> TransactionBehavior {
        self.behavior
    }

    async fn up(&self, ctx: &mut MigrationContext) -> Result<()> {
        ctx.create()
            .table("Widgets")
            .with_column("Id")
            .as_int32()
            .primary_key();
        ctx.insert().into_table("Widgets").row([("Id", 1)]);
        ctx.execute().sql("INSERT INTO NoSuchTable VALUES (1)");
        Ok(())
    }
}

/// Runs raw statements in order.
struct SqlSteps {
    version: i64,
    statements: Vec<&'static str>,
}

#[async_trait]
impl Migration for SqlSteps {
    fn version(&self) -> i64 {
        self.version
    }

    fn description(&self) -> String {
        format!("sql steps {}", self.version)
    }

    async fn up(&self, ctx: &mut MigrationContext) -> Result<()> {
        for sql in &self.statements {
            ctx.execute().sql(*sql);
        }
        Ok(())
    }
}

/// Body guarded by one database name.
struct OnlyOn {
    database: &'static str,
}

#[async_trait]
impl Migration for OnlyOn {
    fn version(&self) -> i64 {
        1
    }

    fn description(&self) -> String {
        format!("only on {}", self.database)
    }

    async fn up(&self, ctx: &mut MigrationContext) -> Result<()> {
        ctx.if_database(self.database)
            .execute()
            .sql("CREATE TABLE guarded (id INTEGER)");
        Ok(())
    }
}

/// Dialect-specific bodies.
struct PerDatabase;

#[async_trait]
impl Migration for PerDatabase {
    fn version(&self) -> i64 {
        1
    }

    fn description(&self) -> String {
        "per database".into()
    }

    async fn up(&self, ctx: &mut MigrationContext) -> Result<()> {
        ctx.if_database("SQLite")
            .execute()
            .sql("CREATE TABLE only_sqlite (id INTEGER)");
        ctx.if_database_any(&["SqlServer", "Postgres"])
            .execute()
            .sql("CREATE TABLE only_server (id INTEGER)");
        Ok(())
    }
}

/// `SomeDate` on `Bar` becomes a non-null int, existing rows set to 5.
struct TightenSomeDate;

#[async_trait]
impl Migration for TightenSomeDate {
    fn version(&self) -> i64 {
        10
    }

    fn description(&self) -> String {
        "tighten SomeDate".into()
    }

    async fn up(&self, ctx: &mut MigrationContext) -> Result<()> {
        ctx.alter()
            .column("SomeDate")
            .on_table("Bar")
            .as_int32()
            .not_nullable()
            .set_existing_rows_to(5);
        Ok(())
    }
}

fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn loader(versions: &[i64], log: &Log) -> MigrationLoader {
    let mut loader = MigrationLoader::new();
    for version in versions {
        loader.add(CreateTable {
            version: *version,
            tags: Vec::new(),
            log: log.clone(),
        });
    }
    loader
}

async fn sqlite(options: ProcessorOptions) -> Arc<dyn Processor> {
    Arc::new(SqliteProcessor::in_memory(options).await.unwrap())
}

async fn applied(processor: &Arc<dyn Processor>) -> Vec<i64> {
    let data = processor
        .read("SELECT \"Version\" FROM \"VersionInfo\" ORDER BY \"Version\"")
        .await
        .unwrap();
    data.rows.iter().filter_map(|r| r[0].as_i64()).collect()
}

// =============================================================================
// Ordering and idempotence
// =============================================================================

#[tokio::test]
async fn test_migrate_up_runs_in_version_order() {
    let log = log();
    let processor = sqlite(ProcessorOptions::default()).await;
    let runner = MigrationRunner::new(
        processor.clone(),
        loader(&[3, 1, 2], &log),
        RunnerOptions::default(),
    );

    let summary = runner.migrate_up(None).await.unwrap();
    assert_eq!(summary.migrations.len(), 3);
    assert_eq!(*log.lock().unwrap(), vec!["up 1", "up 2", "up 3"]);
    assert_eq!(applied(&processor).await, vec![1, 2, 3]);
    for table in ["t1", "t2", "t3"] {
        assert!(processor.table_exists(None, table).await.unwrap());
    }
}

#[tokio::test]
async fn test_second_migrate_up_does_nothing() {
    let log = log();
    let processor = sqlite(ProcessorOptions::default()).await;
    let runner = MigrationRunner::new(processor, loader(&[1, 2], &log), RunnerOptions::default());

    runner.migrate_up(None).await.unwrap();
    let second = runner.migrate_up(None).await.unwrap();
    assert!(second.migrations.is_empty());
    assert_eq!(log.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_migrate_up_to_target() {
    let log = log();
    let processor = sqlite(ProcessorOptions::default()).await;
    let runner = MigrationRunner::new(
        processor.clone(),
        loader(&[1, 2, 3], &log),
        RunnerOptions::default(),
    );
    runner.migrate_up(Some(2)).await.unwrap();
    assert_eq!(applied(&processor).await, vec![1, 2]);
}

// =============================================================================
// Rollback
// =============================================================================

#[tokio::test]
async fn test_rollback_one_step_reverts_highest_only() {
    let log = log();
    let processor = sqlite(ProcessorOptions::default()).await;
    let runner = MigrationRunner::new(
        processor.clone(),
        loader(&[3, 1, 2], &log),
        RunnerOptions::default(),
    );
    runner.migrate_up(None).await.unwrap();
    log.lock().unwrap().clear();

    let summary = runner.rollback(1).await.unwrap();
    assert_eq!(summary.migrations.len(), 1);
    assert_eq!(summary.migrations[0].version, 3);
    assert_eq!(*log.lock().unwrap(), vec!["down 3"]);
    assert_eq!(applied(&processor).await, vec![1, 2]);
    assert!(!processor.table_exists(None, "t3").await.unwrap());
}

#[tokio::test]
async fn test_migrate_down_and_rollback_all() {
    let log = log();
    let processor = sqlite(ProcessorOptions::default()).await;
    let runner = MigrationRunner::new(
        processor.clone(),
        loader(&[1, 2, 3], &log),
        RunnerOptions::default(),
    );
    runner.migrate_up(None).await.unwrap();

    runner.migrate_down(1).await.unwrap();
    assert_eq!(applied(&processor).await, vec![1]);

    runner.rollback_all().await.unwrap();
    assert!(applied(&processor).await.is_empty());
    assert_eq!(
        log.lock().unwrap()[3..].to_vec(),
        vec!["down 3", "down 2", "down 1"]
    );
}

// =============================================================================
// Atomicity
// =============================================================================

#[tokio::test]
async fn test_failed_migration_leaves_no_trace() {
    let log = log();
    let processor = sqlite(ProcessorOptions::default()).await;
    let mut loader = loader(&[1], &log);
    loader.add(FailsOnThirdExpression {
        behavior: TransactionBehavior::Default,
    });
    loader.add(CreateTable {
        version: 3,
        tags: Vec::new(),
        log: log.clone(),
    });
    let runner = MigrationRunner::new(processor.clone(), loader, RunnerOptions::default());

    match runner.migrate_up(None).await {
        Err(MigrateError::Execution { sql, .. }) => {
            assert_eq!(sql, "INSERT INTO NoSuchTable VALUES (1)")
        }
        other => panic!("expected execution error, got {:?}", other.map(|s| s.migrations.len())),
    }
    assert_eq!(applied(&processor).await, vec![1]);
    assert!(!processor.table_exists(None, "Widgets").await.unwrap());
    // fail-fast: migration 3 never ran
    assert!(!log.lock().unwrap().contains(&"up 3".to_string()));
}

#[tokio::test]
async fn test_untransacted_failure_keeps_completed_statements() {
    let processor = sqlite(ProcessorOptions::default()).await;
    let mut loader = MigrationLoader::new();
    loader.add(FailsOnThirdExpression {
        behavior: TransactionBehavior::None,
    });
    let runner = MigrationRunner::new(processor.clone(), loader, RunnerOptions::default());

    assert!(runner.migrate_up(None).await.is_err());
    assert!(processor.table_exists(None, "Widgets").await.unwrap());
    assert!(applied(&processor).await.is_empty());
}

#[tokio::test]
async fn test_failed_commit_rolls_back_and_retries() {
    let processor = sqlite(ProcessorOptions::default()).await;
    let mut loader = MigrationLoader::new();
    loader.add(SqlSteps {
        version: 1,
        statements: vec![
            "CREATE TABLE p (id INTEGER PRIMARY KEY)",
            "CREATE TABLE c (pid INTEGER REFERENCES p(id) DEFERRABLE INITIALLY DEFERRED)",
        ],
    });
    // the orphan row only fails when the deferred key is checked at COMMIT
    loader.add(SqlSteps {
        version: 2,
        statements: vec!["INSERT INTO c (pid) VALUES (42)"],
    });
    let runner = MigrationRunner::new(processor.clone(), loader, RunnerOptions::default());

    match runner.migrate_up(None).await {
        Err(MigrateError::Execution { sql, .. }) => assert_eq!(sql, "COMMIT TRANSACTION"),
        other => panic!("expected execution error, got {:?}", other.map(|s| s.migrations.len())),
    }
    assert_eq!(applied(&processor).await, vec![1]);
    let rows = processor.read("SELECT pid FROM c").await.unwrap();
    assert!(rows.rows.is_empty());

    // not recorded, so the next run tries again
    assert!(matches!(
        runner.migrate_up(None).await,
        Err(MigrateError::Execution { .. })
    ));
    assert_eq!(applied(&processor).await, vec![1]);
}

#[tokio::test]
async fn test_failed_version_record_rolls_back_schema_change() {
    let log = log();
    let processor = sqlite(ProcessorOptions::default()).await;
    MigrationRunner::new(processor.clone(), loader(&[1], &log), RunnerOptions::default())
        .migrate_up(None)
        .await
        .unwrap();
    processor
        .execute_raw(
            "CREATE TRIGGER version_read_only BEFORE INSERT ON \"VersionInfo\" \
             BEGIN SELECT RAISE(ABORT, 'version table is read-only'); END",
        )
        .await
        .unwrap();

    let runner = MigrationRunner::new(
        processor.clone(),
        loader(&[1, 2], &log),
        RunnerOptions::default(),
    );
    match runner.migrate_up(None).await {
        Err(MigrateError::Execution { message, .. }) => {
            assert!(message.contains("read-only"), "{}", message)
        }
        other => panic!("expected execution error, got {:?}", other.map(|s| s.migrations.len())),
    }
    assert!(!processor.table_exists(None, "t2").await.unwrap());
    assert_eq!(applied(&processor).await, vec![1]);
}

// =============================================================================
// Preview
// =============================================================================

#[tokio::test]
async fn test_preview_changes_nothing() {
    let log = log();
    let processor = sqlite(ProcessorOptions {
        preview_only: true,
        ..Default::default()
    })
    .await;
    let runner = MigrationRunner::new(
        processor.clone(),
        loader(&[1, 2], &log),
        RunnerOptions::default(),
    );

    let summary = runner.migrate_up(None).await.unwrap();
    assert!(summary.preview);
    assert_eq!(summary.migrations.len(), 2);
    assert!(!processor.table_exists(None, "t1").await.unwrap());
    assert!(!processor.table_exists(None, "VersionInfo").await.unwrap());
}

// =============================================================================
// IfDatabase
// =============================================================================

#[tokio::test]
async fn test_if_database_on_sqlite() {
    let processor = sqlite(ProcessorOptions::default()).await;
    let mut loader = MigrationLoader::new();
    loader.add(PerDatabase);
    let runner = MigrationRunner::new(processor.clone(), loader, RunnerOptions::default());

    let summary = runner.migrate_up(None).await.unwrap();
    assert_eq!(summary.migrations[0].expressions, 1);
    assert!(processor.table_exists(None, "only_sqlite").await.unwrap());
    assert!(!processor.table_exists(None, "only_server").await.unwrap());
}

#[tokio::test]
async fn test_if_database_on_sqlserver_script() {
    let processor = Arc::new(ConnectionlessProcessor::new(
        Box::new(SqlServerGenerator::new(CompatibilityMode::Strict)),
        ProcessorOptions::default(),
    ));
    let mut loader = MigrationLoader::new();
    loader.add(PerDatabase);
    let runner = MigrationRunner::new(processor.clone(), loader, RunnerOptions::default());

    runner.migrate_up(None).await.unwrap();
    let script = processor.script();
    assert!(script.contains("CREATE TABLE only_server (id INTEGER);"));
    assert!(!script.contains("only_sqlite"));
}

#[tokio::test]
async fn test_if_database_accepts_aliases_without_connection() {
    let processor = Arc::new(ConnectionlessProcessor::new(
        Box::new(PostgresGenerator::new(CompatibilityMode::Strict)),
        ProcessorOptions::default(),
    ));
    let mut loader = MigrationLoader::new();
    loader.add(OnlyOn {
        database: "PostgreSQL",
    });
    let runner = MigrationRunner::new(processor.clone(), loader, RunnerOptions::default());

    let summary = runner.migrate_up(None).await.unwrap();
    assert_eq!(summary.migrations[0].expressions, 1);
    assert!(processor
        .script()
        .contains("CREATE TABLE guarded (id INTEGER);"));
}

#[tokio::test]
async fn test_if_database_alias_matches_live_and_script() {
    let live = sqlite(ProcessorOptions::default()).await;
    let mut loader = MigrationLoader::new();
    loader.add(OnlyOn { database: "sqlite3" });
    MigrationRunner::new(live.clone(), loader, RunnerOptions::default())
        .migrate_up(None)
        .await
        .unwrap();
    assert!(live.table_exists(None, "guarded").await.unwrap());

    let script = Arc::new(ConnectionlessProcessor::new(
        Box::new(SqliteGenerator::new(CompatibilityMode::Strict)),
        ProcessorOptions::default(),
    ));
    let mut loader = MigrationLoader::new();
    loader.add(OnlyOn { database: "sqlite3" });
    MigrationRunner::new(script.clone(), loader, RunnerOptions::default())
        .migrate_up(None)
        .await
        .unwrap();
    assert!(script.script().contains("CREATE TABLE guarded (id INTEGER);"));
}

// =============================================================================
// Connectionless scripts
// =============================================================================

#[tokio::test]
async fn test_alter_column_backfill_script() {
    let processor = Arc::new(ConnectionlessProcessor::new(
        Box::new(SqlServerGenerator::new(CompatibilityMode::Strict)),
        ProcessorOptions::default(),
    ));
    let mut loader = MigrationLoader::new();
    loader.add(TightenSomeDate);
    let runner = MigrationRunner::new(processor.clone(), loader, RunnerOptions::default());

    runner.migrate_up(None).await.unwrap();
    let script = processor.script();
    assert!(script.contains(
        "UPDATE [Bar] SET [SomeDate] = 5;\nALTER TABLE [Bar] ALTER COLUMN [SomeDate] INT NOT NULL;\n"
    ));
    assert!(script.contains("INSERT INTO [VersionInfo]"));
}

// =============================================================================
// Listing, validation and tags
// =============================================================================

#[tokio::test]
async fn test_list_and_validate_version_order() {
    let log = log();
    let processor = sqlite(ProcessorOptions::default()).await;
    MigrationRunner::new(processor.clone(), loader(&[1, 3], &log), RunnerOptions::default())
        .migrate_up(None)
        .await
        .unwrap();

    let runner = MigrationRunner::new(processor, loader(&[1, 2, 3], &log), RunnerOptions::default());
    let statuses: Vec<_> = runner
        .list()
        .await
        .unwrap()
        .iter()
        .map(|m| (m.version, m.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            (1, MigrationStatus::Applied),
            (2, MigrationStatus::Pending),
            (3, MigrationStatus::Applied),
        ]
    );
    assert!(matches!(
        runner.validate_version_order().await,
        Err(MigrateError::InvalidMigration(_))
    ));
}

#[tokio::test]
async fn test_tags_select_migrations() {
    let log = log();
    let processor = sqlite(ProcessorOptions::default()).await;
    let mut loader = MigrationLoader::new();
    for (version, tags) in [(1, vec![]), (2, vec!["staging"]), (3, vec!["production"])] {
        loader.add(CreateTable {
            version,
            tags: tags.into_iter().map(String::from).collect(),
            log: log.clone(),
        });
    }
    let options = RunnerOptions {
        tags: vec!["staging".into()],
        ..Default::default()
    };
    let runner = MigrationRunner::new(processor.clone(), loader, options);

    runner.migrate_up(None).await.unwrap();
    assert_eq!(applied(&processor).await, vec![1, 2]);
}
