//! listing-ingest command line

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use listing_ingest::staging::Compression;

#[derive(Parser)]
#[command(name = "listing-ingest", version, about = "Chunked CSV ingestion into DuckDB")]
struct Cli {
    /// Default log filter when RUST_LOG is unset (overrides LOG_LEVEL)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the tables and indexes
    Init {
        /// Path to the database file
        #[arg(long, short)]
        database: Option<PathBuf>,
    },
    /// Ingest a CSV (plain or gzip) file
    Ingest(IngestArgs),
    /// List recent runs
    Runs {
        /// Path to the database file
        #[arg(long, short)]
        database: Option<PathBuf>,
        /// Maximum number of runs to show
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Show the quality metrics of a processing batch
    Quality {
        /// Path to the database file
        #[arg(long, short)]
        database: Option<PathBuf>,
        /// Processing batch identifier
        #[arg(long)]
        batch: String,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
}

#[derive(clap::Args)]
pub struct IngestArgs {
    /// Path to the database file
    #[arg(long, short)]
    pub database: Option<PathBuf>,
    /// Source CSV file
    #[arg(long, short)]
    pub source: Option<PathBuf>,
    /// TOML pipeline configuration
    #[arg(long, short)]
    pub config: Option<PathBuf>,
    /// Rows per chunk
    #[arg(long)]
    pub chunk_size: Option<usize>,
    /// Rows per sub-batch transaction
    #[arg(long)]
    pub batch_size: Option<usize>,
    /// Source compression (auto, gzip, none)
    #[arg(long)]
    pub compression: Option<Compression>,
    /// Processing batch identifier (random UUID by default)
    #[arg(long)]
    pub batch_id: Option<String>,
    /// Name recorded as source_file (defaults to the source file name)
    #[arg(long)]
    pub source_name: Option<String>,
    /// Fail instead of creating missing tables
    #[arg(long)]
    pub no_init: bool,
    /// Disable the progress spinner
    #[arg(long)]
    pub no_progress: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Init { database } => {
            commands::init_tracing(cli.log_level.as_deref());
            commands::handle_init(database)
        }
        Command::Ingest(args) => commands::handle_ingest(args, cli.log_level.as_deref()),
        Command::Runs {
            database,
            limit,
            format,
        } => {
            commands::init_tracing(cli.log_level.as_deref());
            commands::handle_runs(database, limit, format)
        }
        Command::Quality {
            database,
            batch,
            format,
        } => {
            commands::init_tracing(cli.log_level.as_deref());
            commands::handle_quality(database, &batch, format)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
