//! # pyconflict
//!
//! Answers "will installing this package break my environment?" before
//! anything is installed.
//!
//! This is the main entry point for the PyConflict CLI. It handles command
//! parsing, sets up logging and error handling, and dispatches to the
//! appropriate command handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;
mod environment;
mod output;

use commands::{CommandContext, ExitStatus};
use output::errors::ErrorFormatter;
use pyconflict_config::CliOverrides;
use pyconflict_core::{PycError, PycResult};

/// Python dependency conflict checker
#[derive(Parser)]
#[command(
    name = "pyconflict",
    version,
    long_version = env!("PYCONFLICT_LONG_VERSION"),
    about = "Check if adding a package will cause conflicts before installation"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Python interpreter whose environment is checked
    #[arg(long, global = true, value_name = "PATH")]
    pub python: Option<String>,

    /// Package index JSON API base URL
    #[arg(long, global = true, value_name = "URL")]
    pub index_url: Option<String>,

    /// Always query the index instead of the local cache
    #[arg(long, global = true)]
    pub no_cache: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check if adding a package will cause conflicts
    #[command(name = "check-add")]
    CheckAdd {
        /// Package to check, e.g. 'django' or 'django==3.2'
        package: String,
        /// Specific version to check
        #[arg(long = "version", value_name = "VERSION")]
        pinned: Option<String>,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
        /// Check transitive dependencies
        #[arg(long)]
        deep: bool,
    },
    /// Get the latest stable version of a package
    Stable {
        /// Package name, e.g. 'pandas'
        package: String,
        /// Only consider releases supporting this Python version, e.g. '3.8'
        #[arg(long, value_name = "X.Y")]
        python_version: Option<String>,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Inspect or clean the metadata cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheAction {
    /// Show cache location and usage
    Info,
    /// Remove every cached response
    Clear,
    /// Remove expired responses
    Prune,
}

impl Commands {
    fn wants_json(&self) -> bool {
        match self {
            Commands::CheckAdd { json, .. } | Commands::Stable { json, .. } => *json,
            Commands::Cache { .. } => false,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose);
    setup_panic_handler();

    let json = cli.command.wants_json();
    let status = match run_cli(cli) {
        Ok(status) => status,
        Err(err) => {
            let status = ExitStatus::from_error(&err);
            let formatter = ErrorFormatter::new();
            if json {
                eprintln!("{}", formatter.format_json(&err, status));
            } else {
                eprintln!("{}", formatter.format_error(&err));
            }
            status
        },
    };

    status.into()
}

fn run_cli(cli: Cli) -> PycResult<ExitStatus> {
    // Create Tokio runtime for async operations
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| PycError::io("Failed to create async runtime".to_string(), e))?;

    let overrides = CliOverrides {
        index_url: cli.index_url,
        python: cli.python,
        no_cache: cli.no_cache,
    };

    rt.block_on(async {
        let ctx = CommandContext::new(&overrides).await?;
        commands::dispatch_command(cli.command, &ctx).await
    })
}

fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,pyconflict={}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        error!("pyconflict encountered an unexpected error: {}", panic_info);
        eprintln!("pyconflict crashed! This is a bug.");
        eprintln!("Please report this at: https://github.com/pyconflict/pyconflict/issues");
        eprintln!("Error: {}", panic_info);
    }));
}
