//! Citeflow command-line launcher
//!
//! - `ingest`: stream XML containers into the citation store
//! - `parse`: dump canonical records as JSON lines without storing them
//! - `show`, `ledger`: inspect the store
//! - `schema`, `config`: print the effective settings

use anyhow::Result;
use citeflow_logging::{init_logging, LogConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod cli;

#[derive(Parser, Debug)]
#[command(name = "citeflow", version, about = "Version-reconciling ingestion of bibliographic XML")]
struct Cli {
    /// Enable verbose logging (debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Only warnings and errors on stderr
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest a file or every matching file under a directory
    Ingest {
        /// Input file (.xml or .xml.gz) or directory
        path: PathBuf,

        /// SQLite database (overrides config)
        #[arg(long, env = "CITEFLOW_DB")]
        db: Option<PathBuf>,

        /// Config file (default: ~/.citeflow/config.toml when present)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Record schema TOML (default: built-in PubMed schema)
        #[arg(long)]
        schema: Option<PathBuf>,

        /// Attempts per record when the store is unavailable
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Output the batch report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print canonical records of one input as JSON lines
    Parse {
        /// Input file (.xml or .xml.gz)
        file: PathBuf,

        /// Record schema TOML (default: built-in PubMed schema)
        #[arg(long)]
        schema: Option<PathBuf>,

        /// Stop after N records
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Pretty-print each record
        #[arg(long)]
        pretty: bool,
    },

    /// Show the stored record for an identifier
    Show {
        /// Record identifier (PMID)
        identifier: String,

        /// SQLite database (overrides config)
        #[arg(long, env = "CITEFLOW_DB")]
        db: Option<PathBuf>,
    },

    /// List fully ingested files
    Ledger {
        /// SQLite database (overrides config)
        #[arg(long, env = "CITEFLOW_DB")]
        db: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective record schema as TOML
    Schema {
        /// Record schema TOML to validate and print
        #[arg(long)]
        schema: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn run_command(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Ingest {
            path,
            db,
            config,
            schema,
            max_attempts,
            json,
        } => cli::ingest::run(cli::ingest::IngestArgs {
            path,
            db,
            config,
            schema,
            max_attempts,
            json,
        }),
        Commands::Parse {
            file,
            schema,
            limit,
            pretty,
        } => cli::parse::run(cli::parse::ParseArgs {
            file,
            schema,
            limit,
            pretty,
        })
        .map(|()| ExitCode::SUCCESS),
        Commands::Show { identifier, db } => {
            cli::show::run(cli::show::ShowArgs { identifier, db }).map(|()| ExitCode::SUCCESS)
        }
        Commands::Ledger { db, json } => {
            cli::ledger::run(cli::ledger::LedgerArgs { db, json }).map(|()| ExitCode::SUCCESS)
        }
        Commands::Schema { schema } => {
            cli::schema::run(cli::schema::SchemaArgs { schema }).map(|()| ExitCode::SUCCESS)
        }
        Commands::Config { json } => {
            cli::config::run(cli::config::ConfigArgs { json }).map(|()| ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _log_guard = match init_logging(LogConfig {
        app_name: "citeflow",
        verbose: cli.verbose,
        quiet: cli.quiet,
    }) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("Warning: failed to initialize logging: {:#}", err);
            None
        }
    };

    match run_command(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:?}", err);
            ExitCode::from(1)
        }
    }
}
