//! Command-line definitions for the `sheetload` binary

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::IngestConfig;

/// sheetload - load spreadsheet folders into a relational store
#[derive(Parser, Debug)]
#[command(name = "sheetload")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Store URL (sqlite://... or postgres://...)
    #[arg(long, env = "DATABASE_URL", global = true)]
    pub database_url: Option<String>,

    /// Directory the scan report is written to
    #[arg(long, env = "SHEETLOAD_REPORT_DIR", global = true)]
    pub report_dir: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest every spreadsheet in a folder
    Scan {
        /// Folder to scan (direct entries only)
        #[arg(short, long, env = "SHEETLOAD_INPUT_FOLDER")]
        folder: Option<PathBuf>,

        /// Number of files processed concurrently
        #[arg(short, long, env = "SHEETLOAD_WORKERS")]
        workers: Option<usize>,
    },

    /// Ingest a single spreadsheet
    File {
        /// Spreadsheet to ingest
        path: PathBuf,
    },

    /// Show inferred columns and DDL for a spreadsheet without touching the store
    Inspect {
        /// Spreadsheet to inspect
        path: PathBuf,
    },
}

impl Cli {
    /// Layer command-line values over an environment-derived configuration
    pub fn apply(&self, config: &mut IngestConfig) {
        if let Some(ref url) = self.database_url {
            config.database.url = url.clone();
        }
        if let Some(ref dir) = self.report_dir {
            config.report.output_dir = Some(dir.clone());
        }
        if let Commands::Scan { folder, workers } = &self.command {
            if let Some(folder) = folder {
                config.input_folder = folder.clone();
            }
            if let Some(workers) = workers {
                config.workers = *workers;
            }
        }
    }
}
