//! Catalog maintenance tool: seed demo songs or bulk-load a CSV file.

use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use meloman::config::Config;
use meloman::db;
use meloman::services::catalog;

#[derive(Parser)]
#[command(name = "meloman-catalog")]
#[command(version)]
#[command(about = "Populate the shared Meloman song catalog", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Database file, overrides the configured path
    #[arg(long, env = "MELOMAN_DATABASE__PATH", global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Insert a small demo catalog if the catalog is empty
    Seed,

    /// Import `title,artist[,year[,album]]` rows from a CSV file
    Load {
        /// CSV file, defaults to `catalog.csv_path` from the config
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Directory with `<artist> - <title>.txt` lyrics files
        #[arg(long)]
        lyrics_dir: Option<PathBuf>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("meloman=info,meloman_catalog=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn main() -> Result<()> {
    init_tracing();

    let summary = run(Cli::parse())?;
    println!("{}", summary);
    Ok(())
}

/// Executes one subcommand and returns the line to print.
fn run(cli: Cli) -> Result<String> {
    let config = Config::load_from(&cli.config).context("failed to load configuration")?;
    let db_path = cli.database.unwrap_or(config.database.path);

    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let mut conn = db::init_db(&db_path)
        .with_context(|| format!("failed to open database {}", db_path.display()))?;

    let summary = match cli.command {
        Commands::Seed => {
            let added = catalog::seed_demo(&mut conn).context("failed to seed catalog")?;
            tracing::info!(added, "Seed finished");
            if added == 0 {
                "Catalog is not empty, nothing seeded".to_string()
            } else {
                format!("Seeded {} songs", added)
            }
        }
        Commands::Load { csv, lyrics_dir } => {
            let csv_path = csv.unwrap_or(config.catalog.csv_path);
            let lyrics_dir = lyrics_dir.or(config.catalog.lyrics_dir);

            let file = File::open(&csv_path)
                .with_context(|| format!("failed to open {}", csv_path.display()))?;
            let report = catalog::import_csv(&mut conn, file, lyrics_dir.as_deref())
                .with_context(|| format!("failed to import {}", csv_path.display()))?;
            tracing::info!(added = report.added, existing = report.existing, "Load finished");

            format!(
                "Added {}, already present {}, skipped {} invalid rows, attached {} lyrics",
                report.added, report.existing, report.invalid, report.lyrics_attached
            )
        }
    };

    Ok(summary)
}
