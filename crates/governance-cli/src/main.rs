//! sintra-gov - delegation governance gate
//!
//! Operators and execution gates use this binary to:
//! - Check a command against delegated authority (`check`)
//! - Inspect delegation classes and their approval state
//! - Look up regression evidence in the confidence ledger
//! - Read and verify the operator journal

use clap::{Parser, Subcommand};
use sintra_governance::GovernanceConfig;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod error;
mod output;

use commands::{check, journal, status, Runtime};
use error::CliResult;
use output::print_error;

/// sintra-gov CLI application
#[derive(Parser)]
#[command(name = "sintra-gov")]
#[command(about = "Delegated-authority governance for autonomous agents", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "SINTRA_CONFIG")]
    config: Option<PathBuf>,

    /// Delegation registry file
    #[arg(long, env = "SINTRA_REGISTRY")]
    registry: Option<PathBuf>,

    /// Confidence-check record directory
    #[arg(long, env = "SINTRA_EVIDENCE_DIR")]
    evidence_dir: Option<PathBuf>,

    /// Approval store file
    #[arg(long, env = "SINTRA_STORE")]
    store: Option<PathBuf>,

    /// Operator journal file
    #[arg(long, env = "SINTRA_JOURNAL")]
    journal: Option<PathBuf>,

    /// Do not journal new suspensions
    #[arg(long)]
    no_journal: bool,

    /// Output format (table, json, yaml)
    #[arg(short, long, default_value = "table")]
    output: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Evaluate a command against every matching delegation
    Check {
        /// Exit with status 3 if any matching delegation is suspended
        #[arg(long)]
        enforce: bool,

        /// Command to authorize
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Show the approval state of one delegation class
    Status {
        /// Delegation class identifier
        class_id: String,
    },

    /// List registered delegation classes
    Classes,

    /// Find unacknowledged regression evidence for a pattern
    Scan {
        /// Command pattern
        pattern: String,
    },

    /// Operator journal
    Journal {
        #[command(subcommand)]
        command: journal::JournalCommands,
    },

    /// Show the effective configuration
    Config,
}

impl Cli {
    fn effective_config(&self) -> CliResult<GovernanceConfig> {
        let mut config = GovernanceConfig::load(self.config.as_deref())?;
        if let Some(path) = &self.registry {
            config.registry_path = path.clone();
        }
        if let Some(dir) = &self.evidence_dir {
            config.evidence_dir = dir.clone();
        }
        if let Some(path) = &self.store {
            config.store_path = path.clone();
        }
        if let Some(path) = &self.journal {
            config.journal_path = path.clone();
        }
        if self.no_journal {
            config.journal_enabled = false;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine readable.
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            print_error(&e.to_string());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> CliResult<u8> {
    let config = cli.effective_config()?;
    let format = cli.output;

    if let Commands::Config = cli.command {
        output::print_single(&config, format)?;
        return Ok(0);
    }

    let runtime = Runtime::build(config).await?;
    match cli.command {
        Commands::Check { enforce, command } => {
            check::execute_check(&runtime, command, enforce, format).await
        }
        Commands::Status { class_id } => {
            status::execute_status(&runtime, &class_id, format).await?;
            Ok(0)
        }
        Commands::Classes => {
            status::execute_classes(&runtime, format).await?;
            Ok(0)
        }
        Commands::Scan { pattern } => {
            check::execute_scan(&runtime, &pattern, format).await?;
            Ok(0)
        }
        Commands::Journal { command } => journal::execute(command, &runtime, format).await,
        Commands::Config => Ok(0),
    }
}
