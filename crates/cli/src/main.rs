//! # Forkcompare CLI
//!
//! Command-line interface for comparing branches, tags and commits across
//! forked repositories.
//!
//! Repositories are read from bare git repositories on disk and their
//! accounts, fork relationships, permissions and pull requests from a TOML
//! catalog. Results are printed as JSON on stdout; logs go to stderr.
//!
//! # Commands
//!
//! - `compare` - Compare a base ref with a head spec, possibly in another fork
//! - `pull-diff` - Print the diff, patch and commits of a stored pull request
//! - `config` - Manage configuration files and settings
//!
//! # Examples
//!
//! ```bash
//! # Compare alice/proj main with bob's feature branch
//! forkcompare compare alice/proj main...bob:feature --actor alice
//!
//! # Print the patch series of pull request 1
//! forkcompare pull-diff alice/proj 1 --format patch
//!
//! # Initialize configuration
//! forkcompare config init
//! ```

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

use std::process::{ExitCode, Termination};

use clap::{Parser, Subcommand};
use tracing::{error, info, instrument};

/// Command implementations for the CLI.
mod commands;

/// Configuration management for the CLI.
mod config;

/// Error types specific to the CLI.
mod errors;

use commands::{compare::CompareArgs, config_cmd::ConfigCommands, pull_diff::PullDiffArgs};
use config::{get_config_path, AppConfig};
use errors::CliError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding the log filter directives
const LOG_ENV_VAR: &str = "FORKCOMPARE_LOG";

/// Command-line interface structure for forkcompare.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Alternate config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// The subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

/// Available commands for the forkcompare CLI.
#[derive(Subcommand)]
enum Commands {
    /// Compare a base ref with a head spec such as `main...bob:feature`
    Compare(CompareArgs),

    /// Show the diff, patch and commits of a pull request
    #[command(name = "pull-diff")]
    PullDiff(PullDiffArgs),

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Main entry point for the forkcompare CLI.
///
/// Initializes logging, parses the arguments and runs the selected command
/// until it completes or the process receives Ctrl-C. Dropping the command
/// future on Ctrl-C releases every repository handle it holds.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose { "debug" } else { "warn" })
    });
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let outcome = tokio::select! {
        result = run(cli) => result,
        _ = tokio::signal::ctrl_c() => Err(CliError::Interrupted),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            e.report()
        }
    }
}

/// Dispatches to the command handler.
#[instrument(skip(cli))]
async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Config(cmd) => commands::config_cmd::execute(cmd).await,
        Commands::Compare(args) => {
            let config = load_config(cli.config.as_deref())?;
            commands::compare::execute(args, &config).await
        }
        Commands::PullDiff(args) => {
            let config = load_config(cli.config.as_deref())?;
            commands::pull_diff::execute(args, &config).await
        }
    }
}

/// Loads the configuration file named on the command line or the default one.
fn load_config(path: Option<&str>) -> Result<AppConfig, CliError> {
    AppConfig::load(&get_config_path(path))
}
