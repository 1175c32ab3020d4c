//! Command handlers

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tracing_subscriber::EnvFilter;

use listing_ingest::pipeline::{IngestProgress, PipelineConfig, PipelineExecutor, format_number};
use listing_ingest::staging::StagingDb;

use crate::{IngestArgs, OutputFormat};

/// Install the stderr subscriber. `RUST_LOG` wins over the given level.
pub fn init_tracing(level: Option<&str>) {
    let level = level
        .map(str::to_string)
        .or_else(|| std::env::var(listing_ingest::pipeline::ENV_LOG_LEVEL).ok())
        .unwrap_or_else(|| "info".to_string());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("listing_ingest={}", level.to_lowercase())));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_db(database: Option<PathBuf>) -> Result<StagingDb> {
    let path = match database {
        Some(path) => path,
        None => {
            PipelineConfig::new()
                .apply_env()
                .map_err(|e| anyhow!(e.user_message()))?
                .database
        }
    };
    let path = path.display().to_string();
    StagingDb::open(&path).with_context(|| format!("Cannot open database {path}"))
}

/// Handle the `init` command
pub fn handle_init(database: Option<PathBuf>) -> Result<()> {
    let db = open_db(database)?;
    let location = db.path().unwrap_or(":memory:").to_string();

    if db.is_initialized()? {
        println!("Database already initialized at: {}", location);
        println!("Schema version: {}", db.schema_version()?);
    } else {
        db.init()?;
        println!("Database initialized at: {}", location);
    }

    Ok(())
}

/// Handle the `ingest` command
pub fn handle_ingest(args: IngestArgs, log_level: Option<&str>) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_toml_file(path),
        None => Ok(PipelineConfig::new()),
    }
    .and_then(PipelineConfig::apply_env)
    .map_err(|e| anyhow!(e.user_message()))?;

    if let Some(database) = args.database {
        config.database = database;
    }
    if let Some(source) = args.source {
        config.source = Some(source);
    }
    if let Some(chunk_size) = args.chunk_size {
        config.chunk_size = chunk_size;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(compression) = args.compression {
        config.compression = compression;
    }
    if args.batch_id.is_some() {
        config.batch_id = args.batch_id;
    }
    if args.source_name.is_some() {
        config.source_file = args.source_name;
    }
    if args.no_init {
        config.init_schema = false;
    }
    if args.no_progress {
        config.progress = false;
    }
    if let Some(level) = log_level {
        config.log_level = level.to_string();
    }

    init_tracing(Some(&config.log_level));

    let mut db = StagingDb::open(&config.database.display().to_string())
        .with_context(|| format!("Cannot open database {}", config.database.display()))?;

    let show_progress = config.progress && std::io::stderr().is_terminal();
    let file_name = config.source_file_name();
    let mut executor = PipelineExecutor::new(config).map_err(|e| anyhow!(e.user_message()))?;
    if show_progress {
        executor = executor.with_observer(Box::new(IngestProgress::new(&file_name)));
    }

    eprintln!("Batch: {}", executor.batch_id());
    match executor.run(&mut db) {
        Ok(report) => {
            report.print_summary();
            Ok(())
        }
        Err(e) => {
            if let Some(run) = executor.last_run() {
                eprintln!(
                    "Run {} marked {} after {} committed rows",
                    run.id.unwrap_or_default(),
                    run.status,
                    format_number(run.processed_rows.max(0) as u64)
                );
            }
            Err(anyhow!(e.user_message()))
        }
    }
}

/// Handle the `runs` command
pub fn handle_runs(database: Option<PathBuf>, limit: usize, format: OutputFormat) -> Result<()> {
    let db = open_db(database)?;
    db.ensure_schema(false).map_err(|e| anyhow!(e.user_message()))?;
    let runs = db.list_runs(limit)?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&runs)?);
        return Ok(());
    }

    if runs.is_empty() {
        println!("No runs recorded.");
        return Ok(());
    }

    println!(
        "{:>5}  {:<10}  {:>12}  {:>12}  {:>9}  {:<25}  {}",
        "ID", "STATUS", "TOTAL", "PROCESSED", "SECONDS", "STARTED", "FILE"
    );
    for run in &runs {
        println!(
            "{:>5}  {:<10}  {:>12}  {:>12}  {:>9}  {:<25}  {}",
            run.id.unwrap_or_default(),
            run.status,
            run.total_rows
                .map(|n| format_number(n.max(0) as u64))
                .unwrap_or_else(|| "-".to_string()),
            format_number(run.processed_rows.max(0) as u64),
            run.processing_time_seconds
                .map(|s| format!("{s:.2}"))
                .unwrap_or_else(|| "-".to_string()),
            run.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            run.file_name
        );
        if let Some(error) = &run.error_message {
            println!("       error: {}", error);
        }
    }

    Ok(())
}

/// Handle the `quality` command
pub fn handle_quality(database: Option<PathBuf>, batch: &str, format: OutputFormat) -> Result<()> {
    let db = open_db(database)?;
    db.ensure_schema(false).map_err(|e| anyhow!(e.user_message()))?;
    let metrics = db.quality_for_batch(batch)?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&metrics)?);
        return Ok(());
    }

    if metrics.is_empty() {
        return Err(anyhow!("No quality metrics recorded for batch {batch}"));
    }

    for m in &metrics {
        println!("Batch {}", m.batch_id);
        println!("  Processed: {}", m.processing_date.format("%Y-%m-%d %H:%M:%S UTC"));
        println!("  Total:     {}", format_number(m.total_records.max(0) as u64));
        println!("  Valid:     {}", format_number(m.valid_records.max(0) as u64));
        println!("  Invalid:   {}", format_number(m.invalid_records.max(0) as u64));
        println!("  Nulls:     {}", format_number(m.null_records.max(0) as u64));
        println!("  Duplicate: {}", format_number(m.duplicate_records.max(0) as u64));
    }

    Ok(())
}
