//! quill-migrate CLI
//!
//! Command-line tool for managing model schema versions.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use quill_core::Model;
use quill_migrate::prelude::*;

/// Snapshot-diffing schema migrations for quill models.
#[derive(Parser)]
#[command(name = "quill-migrate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (SQLite path or connection string).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3")]
    database: String,

    /// Migration artifacts directory.
    #[arg(short, long, default_value = "migrations")]
    migrations_dir: PathBuf,

    /// SQL dialect used to render generated statements.
    #[arg(long, value_enum, default_value_t = DialectKind::Sqlite)]
    dialect: DialectKind,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum DialectKind {
    Sqlite,
    Mysql,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the migrations system (create history table).
    Init,

    /// Record new versions for models whose schema changed.
    MakeMigrations {
        /// Model definitions file: an object mapping table names to snapshots.
        #[arg(long)]
        models: PathBuf,
    },

    /// Show migration history.
    ShowMigrations {
        /// Model to show (all if not specified).
        #[arg(long)]
        model: Option<String>,
    },

    /// Print the current version of a model.
    CurrentVersion {
        /// Model (table) name.
        model: String,
    },

    /// Replay recorded versions until the model is at `version`.
    MigrateTo {
        /// Model (table) name.
        model: String,
        /// Target version.
        version: String,
    },

    /// Show the SQL of a version without executing it.
    ShowSql {
        /// Model (table) name.
        model: String,
        /// Version.
        version: String,
        /// Show rollback SQL instead of forward SQL.
        #[arg(short, long)]
        reverse: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Connect to database
    let options: SqliteConnectOptions = cli
        .database
        .parse()
        .with_context(|| format!("invalid database URL '{}'", cli.database))?;
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options.create_if_missing(true))
        .await?;
    let db = match cli.dialect {
        DialectKind::Sqlite => SqliteDatabase::new(pool),
        DialectKind::Mysql => SqliteDatabase::with_dialect(pool, MySqlDialect::new()),
    };

    let mut engine = MigrationEngine::with_options(
        db,
        EngineOptions::new().artifact_dir(&cli.migrations_dir),
    );
    engine.initialize().await?;

    run(&mut engine, cli.command).await
}

async fn run(
    engine: &mut MigrationEngine<SqliteDatabase>,
    command: Commands,
) -> anyhow::Result<()> {
    match command {
        Commands::Init => {
            info!("Migrations table created successfully.");
        }

        Commands::MakeMigrations { models } => {
            let text = std::fs::read_to_string(&models)
                .with_context(|| format!("failed to read {}", models.display()))?;
            let definitions = parse_models(&text)?;
            if definitions.is_empty() {
                info!("No models defined in {}.", models.display());
            }

            for model in &definitions {
                match engine.migrate_model(model).await? {
                    MigrationOutcome::Created(artifact) | MigrationOutcome::Migrated(artifact) => {
                        println!("{}: created {}", artifact.model, artifact.name);
                    }
                    MigrationOutcome::UpToDate(version) => {
                        println!("{}: up to date at {version}", model.table_name());
                    }
                }
            }
        }

        Commands::ShowMigrations { model } => {
            let records = match &model {
                Some(name) => engine.history(name).await?,
                None => engine.all_history().await?,
            };

            if records.is_empty() {
                info!("No migrations have been recorded yet.");
            } else {
                println!("\nRecorded migrations:");
                println!("{:-<60}", "");
                for record in &records {
                    let mark = if record.is_applied { "X" } else { " " };
                    println!(
                        " [{mark}] {}/{} ({})",
                        record.model_name, record.version, record.applied_at
                    );
                }
                println!();
            }
        }

        Commands::CurrentVersion { model } => match engine.current_version(&model).await? {
            Some(version) => println!("{version}"),
            None => info!("Model '{model}' has no applied version."),
        },

        Commands::MigrateTo { model, version } => {
            let executed = engine.migrate_to_version(&model, &version).await?;
            info!("{model} is at {version} ({executed} statements executed).");
        }

        Commands::ShowSql {
            model,
            version,
            reverse,
        } => {
            let artifact = engine.artifact_for(&model, &version)?;
            let statements = if reverse {
                &artifact.down
            } else {
                &artifact.up
            };
            let direction = if reverse { Direction::Down } else { Direction::Up };
            println!("-- {} ({direction})", artifact.name);
            for sql in statements {
                println!("{sql};");
            }
        }
    }

    Ok(())
}
