//! tablewright CLI
//!
//! Command-line tool for generating PostgreSQL migration scripts from entity
//! model definitions.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use tablewright_core::prelude::*;
use tablewright_postgres::PgIntrospector;

/// Descriptor-driven PostgreSQL migration generator.
#[derive(Debug, Parser)]
#[command(name = "tablewright")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// PostgreSQL connection string (required by `alter`).
    #[arg(short, long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Migrations directory.
    #[arg(short, long, default_value = "migrations", global = true)]
    migrations_dir: PathBuf,

    /// JSON file with the entity model definitions.
    #[arg(long, env = "TABLEWRIGHT_MODELS", global = true)]
    models: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Write 001_initial.sql creating every model, without a database.
    Initial {
        /// Print the script instead of writing it.
        #[arg(long)]
        dry_run: bool,
    },

    /// Compare the models with the database and write the difference.
    Alter {
        /// Migration name; defaults to a timestamped name.
        #[arg(short, long)]
        name: Option<String>,

        /// Abort on the first introspection failure instead of skipping it.
        #[arg(long)]
        strict: bool,

        /// Print the script instead of writing it.
        #[arg(long)]
        dry_run: bool,
    },
}

fn load_models(path: Option<&Path>) -> anyhow::Result<ModelRegistry> {
    let Some(path) = path else {
        bail!("No model file given; pass --models or set TABLEWRIGHT_MODELS");
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read model file '{}'", path.display()))?;
    let definitions = load_definitions(&json)?;
    Ok(ModelRegistry::from_definitions(definitions))
}

fn report_degradations(degradations: &[Degradation]) {
    for degradation in degradations {
        warn!(
            "Skipped {} of {}: {}",
            degradation.aspect, degradation.table, degradation.error
        );
    }
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

    let models = load_models(cli.models.as_deref())?;
    info!("Loaded {} model(s)", models.len());

    match cli.command {
        Commands::Initial { dry_run } => {
            let migrator = Migrator::new(MigratorConfig {
                migrations_dir: cli.migrations_dir,
                policy: IntrospectionPolicy::Degrade,
            });

            if dry_run {
                let changes = migrator.plan_initial(&models)?;
                println!(
                    "{}",
                    MigrationWriter::render(INITIAL_MIGRATION_NAME, Utc::now(), &changes)
                );
            } else {
                let report = migrator.generate_initial(&models)?;
                if let Some(path) = report.path {
                    info!("Created migration: {}", path.display());
                }
            }
        }

        Commands::Alter {
            name,
            strict,
            dry_run,
        } => {
            let Some(url) = cli.database_url.as_deref() else {
                bail!("alter needs a database; pass --database-url or set DATABASE_URL");
            };
            let name = name.unwrap_or_else(|| generate_migration_name(Utc::now(), "alter"));
            validate_migration_name(&name)?;

            let policy = if strict {
                IntrospectionPolicy::FailFast
            } else {
                IntrospectionPolicy::Degrade
            };
            let migrator = Migrator::new(MigratorConfig {
                migrations_dir: cli.migrations_dir,
                policy,
            });

            let introspector = PgIntrospector::connect(url).await?;

            if dry_run {
                let outcome = migrator.plan_alter(&models, &introspector).await?;
                report_degradations(&outcome.degradations);
                if outcome.changes.is_empty() {
                    info!("No changes detected.");
                } else {
                    println!(
                        "{}",
                        MigrationWriter::render(&name, Utc::now(), &outcome.changes)
                    );
                }
            } else {
                let report = migrator.generate_alter(&models, &name, &introspector).await?;
                report_degradations(&report.degradations);
                match report.path {
                    Some(path) => info!(
                        "Created migration: {} ({} statement(s))",
                        path.display(),
                        report.change_count
                    ),
                    None => info!("No changes detected."),
                }
            }
        }
    }

    Ok(())
}
