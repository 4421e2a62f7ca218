//! fluent-migrate CLI - apply versioned SQL migrations.

use clap::{Parser, Subcommand};
use fluent_migrate::{
    ConnectionlessProcessor, DriverCatalog, MigrateError, MigrationLoader, MigrationRunner,
    Processor, RunSummary, RunnerConfig,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

const DEFAULT_CONFIG: &str = "fluent-migrate.yaml";

#[derive(Parser)]
#[command(name = "fluent-migrate")]
#[command(about = "Versioned database schema migrations")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file [default: fluent-migrate.yaml]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database type: SqlServer, Postgres, SQLite or Jet
    #[arg(long)]
    db: Option<String>,

    /// Connection string
    #[arg(long)]
    connection: Option<String>,

    /// Directory of {version}_{description}.up.sql / .down.sql files
    #[arg(long)]
    migrations_dir: Option<PathBuf>,

    /// Log SQL without executing it
    #[arg(long)]
    preview: bool,

    /// Generate a SQL script without connecting to a database
    #[arg(long)]
    no_connection: bool,

    /// Write the generated script to this file (with --no-connection)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Only run migrations carrying this tag (repeatable)
    #[arg(long = "tag")]
    tags: Vec<String>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending migrations
    #[command(alias = "migrate:up")]
    Migrate {
        /// Stop after this version
        #[arg(long = "version")]
        target: Option<i64>,
    },

    /// Revert applied migrations newer than a version
    #[command(name = "migrate:down")]
    MigrateDown {
        /// Keep this version and everything older
        #[arg(long = "version")]
        target: i64,
    },

    /// Revert the most recent migrations
    Rollback {
        /// Number of migrations to revert
        #[arg(long, default_value = "1")]
        steps: usize,
    },

    /// Revert every applied migration
    #[command(name = "rollback:all")]
    RollbackAll,

    /// Show applied and pending migrations
    List,

    /// Check that no pending migration is older than the newest applied one
    Validate,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(|e| MigrateError::Config(e.to_string()))?;

    let config = load_config(&cli)?;
    let catalog = DriverCatalog::with_builtins();
    let db_type = catalog.normalize_db_type(&config.database.r#type)?;

    let mut loader = MigrationLoader::new();
    let dir = config.runner.migrations_dir.clone().ok_or_else(|| {
        MigrateError::Config(
            "no migrations directory: pass --migrations-dir or set runner.migrations_dir".into(),
        )
    })?;
    loader.add_sql_dir(&dir)?;
    info!("Loaded {} migrations from {}", loader.len(), dir.display());

    // Keep a typed handle on the recorder so the script can be written afterwards
    let mut recorder: Option<Arc<ConnectionlessProcessor>> = None;
    let processor: Arc<dyn Processor> =
        if config.runner.no_connection || db_type == fluent_migrate::drivers::JET {
            let connectionless = Arc::new(catalog.connectionless(
                &db_type,
                config.processor_options(),
                config.compatibility_mode(),
            )?);
            recorder = Some(connectionless.clone());
            connectionless
        } else {
            catalog
                .connect(
                    &db_type,
                    &config.database.connection,
                    config.processor_options(),
                    config.compatibility_mode(),
                    false,
                )
                .await?
        };

    let runner = MigrationRunner::new(processor, loader, config.runner_options())
        .with_conventions(config.conventions());

    match cli.command {
        Commands::Migrate { target } => {
            let summary = runner.migrate_up(target).await?;
            report(&summary, cli.output_json)?;
        }

        Commands::MigrateDown { target } => {
            let summary = runner.migrate_down(target).await?;
            report(&summary, cli.output_json)?;
        }

        Commands::Rollback { steps } => {
            let summary = runner.rollback(steps).await?;
            report(&summary, cli.output_json)?;
        }

        Commands::RollbackAll => {
            let summary = runner.rollback_all().await?;
            report(&summary, cli.output_json)?;
        }

        Commands::List => {
            let migrations = runner.list().await?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&migrations)?);
            } else {
                println!("Migrations:");
                for m in &migrations {
                    let applied_on = m
                        .applied_on
                        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                        .unwrap_or_default();
                    println!(
                        "  {:>14}  {:<8}  {:<19}  {}",
                        m.version,
                        format!("{:?}", m.status).to_lowercase(),
                        applied_on,
                        m.description
                    );
                }
            }
        }

        Commands::Validate => {
            runner.validate_version_order().await?;
            if !cli.output_json {
                println!("Migration order is valid");
            }
        }
    }

    if let Some(recorder) = recorder {
        match &config.runner.output_script {
            Some(path) => recorder.write_script(path)?,
            None if !cli.output_json => print!("{}", recorder.script()),
            None => {}
        }
    }

    Ok(())
}

/// Load the config file (when present) and apply command-line overrides.
fn load_config(cli: &Cli) -> Result<RunnerConfig, MigrateError> {
    let mut config = match (&cli.config, &cli.db) {
        (Some(path), _) => {
            let config = RunnerConfig::load(path)?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        (None, Some(db)) => RunnerConfig::new(db.clone(), String::new()),
        (None, None) => RunnerConfig::load(DEFAULT_CONFIG)?,
    };

    if let Some(db) = &cli.db {
        config.database.r#type = db.clone();
    }
    if let Some(connection) = &cli.connection {
        config.database.connection = connection.clone();
    }
    if let Some(dir) = &cli.migrations_dir {
        config.runner.migrations_dir = Some(dir.clone());
    }
    if cli.preview {
        config.runner.preview = true;
    }
    if cli.no_connection {
        config.runner.no_connection = true;
    }
    if let Some(output) = &cli.output {
        config.runner.output_script = Some(output.clone());
    }
    if !cli.tags.is_empty() {
        config.runner.tags = cli.tags.clone();
    }

    config.validate()?;
    Ok(config)
}

fn report(summary: &RunSummary, output_json: bool) -> Result<(), MigrateError> {
    if output_json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    let status_msg = if summary.preview { "Preview completed!" } else { "Migration completed!" };
    eprintln!("\n{}", status_msg);
    eprintln!("  Run ID: {}", summary.run_id);
    eprintln!("  Direction: {}", summary.direction);
    eprintln!("  Duration: {:.2}s", summary.duration_seconds);
    eprintln!("  Migrations: {}", summary.migrations.len());
    for m in &summary.migrations {
        eprintln!(
            "    {} {} ({} expressions, {}ms)",
            m.version, m.description, m.expressions, m.duration_ms
        );
    }
    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // stdout carries scripts and JSON results
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("Unknown log format: {} (expected text or json)", other)),
    }

    Ok(())
}
