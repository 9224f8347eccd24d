//! sheetload - spreadsheet folder ingestion

use std::path::Path;
use std::process;

use anyhow::Context;
use clap::Parser;
use sheetload_common::logging::{init_logging, LogConfig, LogLevel};
use sheetload_ingest::cli::{Cli, Commands};
use sheetload_ingest::dataset::Dataset;
use sheetload_ingest::normalize::table_name_from_path;
use sheetload_ingest::reader::read_spreadsheet;
use sheetload_ingest::report::{deliver_report, HtmlFileReporter};
use sheetload_ingest::schema::{Dialect, TableSchema};
use sheetload_ingest::{FileIngestor, IngestConfig, IngestionCoordinator, LogSink, RunLog, Store};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Environment variables take precedence over the defaults; --verbose over both
    let mut log_config = LogConfig::from_env().unwrap_or_default();
    if cli.verbose {
        log_config = log_config.with_level(LogLevel::Debug);
    }

    // Keep the guard alive so the file writer flushes on exit
    let _guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Warning: logging disabled: {}", e);
            None
        },
    };

    if let Err(e) = run(cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = IngestConfig::from_env();
    cli.apply(&mut config);
    config.validate()?;

    match cli.command {
        Commands::Inspect { ref path } => inspect(path, &config),
        Commands::File { ref path } => ingest_file(path, &config).await,
        Commands::Scan { .. } => scan(&config).await,
    }
}

async fn scan(config: &IngestConfig) -> anyhow::Result<()> {
    let store = Store::connect(&config.database).await.context("Failed to connect to the database")?;
    store.health_check().await.context("Database health check failed")?;
    let coordinator = IngestionCoordinator::new(FileIngestor::new(store.clone()), config.workers);

    let run_log = RunLog::new();
    let report = coordinator.run_scan(&config.input_folder, &run_log).await;

    run_log.info(&format!(
        "Processing finished. Success: {}, Errors: {}.",
        report.succeeded(),
        report.failed()
    ));

    match config.report.output_dir {
        Some(ref dir) => {
            let sink = HtmlFileReporter::new(dir).with_recipient(config.report.recipient.clone());
            deliver_report(&sink, &report, &run_log);
        },
        None => info!("No report directory configured, report not written"),
    }

    store.close().await;
    Ok(())
}

async fn ingest_file(path: &Path, config: &IngestConfig) -> anyhow::Result<()> {
    let store = Store::connect(&config.database).await.context("Failed to connect to the database")?;
    let outcome = FileIngestor::new(store.clone()).ingest(path).await;
    store.close().await;

    if !outcome.ok {
        anyhow::bail!("{}: {}", outcome.file_name, outcome.message);
    }

    println!("{}", outcome.message);
    Ok(())
}

fn inspect(path: &Path, config: &IngestConfig) -> anyhow::Result<()> {
    let dialect = Dialect::from_url(&config.database.url)
        .with_context(|| format!("Unsupported database URL '{}'", config.database.url))?;

    let dataset = Dataset::prepare(read_spreadsheet(path)?);
    let schema = TableSchema::from_dataset(table_name_from_path(path), &dataset);

    println!("File:    {}", path.display());
    println!("Table:   {}", schema.name);
    println!("Rows:    {}", dataset.len());
    println!("Dialect: {}", dialect);
    println!();

    println!("Columns:");
    for (column, (name, sql_type)) in dataset.columns.iter().zip(schema.sql_types(dialect)) {
        println!("  {:<30} {:<18} (from '{}')", name, sql_type, column.source_name);
    }
    if !dataset.dropped_columns.is_empty() {
        println!("Dropped (all empty): {}", dataset.dropped_columns.join(", "));
    }
    println!();

    println!("{};", schema.create_table_sql(dialect));
    Ok(())
}
