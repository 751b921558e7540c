//! CLI parser and dispatch to command modules.

mod init;
mod probe;
mod runs;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use super::helpers::{parse_kind, parse_month};
use crate::config::Config;
use crate::models::{EngineKind, RecordKind};

/// Engine choice for `probe`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum EngineArg {
    /// Plain HTTP requests against server-rendered pages
    #[default]
    Http,
    /// Headless Chrome for script-rendered pages
    Browser,
}

impl From<EngineArg> for EngineKind {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::Http => EngineKind::Http,
            EngineArg::Browser => EngineKind::Browser,
        }
    }
}

#[derive(Parser)]
#[command(name = "munidata")]
#[command(about = "Personnel compensation extraction from the Portal Transparencia")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data directory (overrides config file)
    #[arg(long, global = true, env = "DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and database
    Init,

    /// Create a pending run and print its id
    CreateRun {
        /// Numeric municipality code (e.g. 280)
        #[arg(short, long)]
        municipality: String,
        /// Subject area filter (e.g. Salud)
        #[arg(short, long, default_value = "")]
        area: String,
        /// Fiscal year
        #[arg(short, long)]
        year: i32,
        /// Months to extract, comma separated
        #[arg(long, value_delimiter = ',', value_parser = parse_month, required = true)]
        months: Vec<u32>,
        /// Record kinds, comma separated (honorarium, contract, staff)
        #[arg(short, long, value_delimiter = ',', value_parser = parse_kind, default_value = "honorarium")]
        kinds: Vec<RecordKind>,
    },

    /// Execute a pending run
    Run {
        /// Run ID
        run_id: i64,
        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a run's status
    Status {
        /// Run ID
        run_id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract one section once and print canonical records (nothing is stored)
    Probe {
        /// Numeric municipality code (e.g. 280)
        #[arg(short, long)]
        municipality: String,
        /// Record kind (honorarium, contract, staff)
        #[arg(short, long, value_parser = parse_kind)]
        kind: RecordKind,
        /// Subject area filter
        #[arg(short, long, default_value = "")]
        area: String,
        /// Fiscal year
        #[arg(short, long)]
        year: i32,
        /// Month (1-12)
        #[arg(long, value_parser = parse_month)]
        month: u32,
        /// Engine to use
        #[arg(short, long, value_enum, default_value = "http")]
        engine: EngineArg,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_with_path(cli.config.as_deref())
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = Some(dir.display().to_string());
    }

    match cli.command {
        Commands::Init => init::cmd_init(&config).await,
        Commands::CreateRun {
            municipality,
            area,
            year,
            months,
            kinds,
        } => runs::cmd_create_run(&config, &municipality, &area, year, months, kinds).await,
        Commands::Run { run_id, json } => runs::cmd_run(config, run_id, json).await,
        Commands::Status { run_id, json } => runs::cmd_status(&config, run_id, json).await,
        Commands::Probe {
            municipality,
            kind,
            area,
            year,
            month,
            engine,
        } => probe::cmd_probe(config, &municipality, kind, &area, year, month, engine.into()).await,
    }
}
