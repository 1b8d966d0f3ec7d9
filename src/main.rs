//! Transparency: lobbying-transparency ingestion loader
//!
//! Scrapes meeting listings and imports the organization register export into
//! PostgreSQL.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{
    backup::backup_database, download::download_export, init::init_config,
    meetings::load_meetings, organizations::import_organizations, roster::load_roster,
    run::run_pipeline, schema::create_schema,
};
use std::path::PathBuf;
use tracing::Level;
use transparency::{
    config::{Config, LogFormat},
    pipeline::Stage,
};

#[derive(Parser)]
#[command(name = "transparency")]
#[command(about = "Load lobbying-transparency meetings and register exports into PostgreSQL")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "transparency.toml")]
    config: PathBuf,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Directory to create the configuration in
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Create any missing tables
    Schema,

    /// Dump the database with pg_dump
    Backup,

    /// Load department rosters
    Roster {
        /// Roster directory (overrides config)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Scrape meeting listings and load the meetings
    Meetings {
        /// Roster directory (overrides config)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Maximum pages per listing (overrides config)
        #[arg(long)]
        max_pages: Option<usize>,

        /// Delay between page fetches in milliseconds (overrides config)
        #[arg(long)]
        delay_ms: Option<u64>,
    },

    /// Download the organization export
    Download {
        /// Destination file (overrides config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Suppress progress output
        #[arg(short, long)]
        quiet: bool,
    },

    /// Import an organization export (.xml or .xml.bz2)
    Organizations {
        /// Export file (defaults to the configured download path)
        path: Option<PathBuf>,

        /// Records per load transaction
        #[arg(long)]
        batch_size: Option<usize>,

        /// Stop after this many records
        #[arg(long)]
        max_records: Option<usize>,

        /// Suppress progress output
        #[arg(short, long)]
        quiet: bool,
    },

    /// Run every stage in order
    Run {
        /// Stages to skip
        #[arg(long, value_enum, value_delimiter = ',')]
        skip: Vec<CliStage>,

        /// Suppress progress output
        #[arg(short, long)]
        quiet: bool,
    },
}

/// CLI stage enum (mirrors Stage but with clap support)
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum CliStage {
    Backup,
    Roster,
    Meetings,
    Download,
    Organizations,
}

impl From<CliStage> for Stage {
    fn from(stage: CliStage) -> Self {
        match stage {
            CliStage::Backup => Stage::Backup,
            CliStage::Roster => Stage::Roster,
            CliStage::Meetings => Stage::Meetings,
            CliStage::Download => Stage::Download,
            CliStage::Organizations => Stage::Organizations,
        }
    }
}

fn init_logging(config: &Config, verbose: u8) -> Result<()> {
    let level: Level = config.logging.level.with_verbosity(verbose);
    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false);

    match config.logging.format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Init { path } = &cli.command {
        return init_config(path.clone()).await;
    }

    let config = Config::load_or_default(&cli.config)?;
    init_logging(&config, cli.verbose)?;

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Schema => create_schema(config).await,
        Commands::Backup => backup_database(config).await,
        Commands::Roster { dir } => load_roster(config, dir).await,
        Commands::Meetings {
            dir,
            max_pages,
            delay_ms,
        } => load_meetings(config, dir, max_pages, delay_ms).await,
        Commands::Download { output, quiet } => download_export(config, output, quiet).await,
        Commands::Organizations {
            path,
            batch_size,
            max_records,
            quiet,
        } => import_organizations(config, path, batch_size, max_records, quiet).await,
        Commands::Run { skip, quiet } => {
            run_pipeline(config, skip.into_iter().map(Stage::from).collect(), quiet).await
        }
    }
}
