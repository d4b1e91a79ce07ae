//! patchfleet — apply one patch across a fleet of repositories.
//!
//! # Usage
//!
//! ```text
//! patchfleet apply <patch> --context <file> [--config config.yaml] [--history <file>] [--dry-run] [--json]
//! patchfleet status [<patch>] [--history <file>] [--json]
//! ```
//!
//! Both commands read the forge token from `GITHUB_TOKEN` (or `--token`).

mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{apply::ApplyArgs, status::StatusArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "patchfleet",
    version,
    about = "Apply a declarative patch across many repositories and track the pull requests it opens",
    long_about = None,
)]
struct Cli {
    /// Log at debug level. `RUST_LOG` takes precedence when set.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a patch against every configured repository and open or update PRs.
    Apply(ApplyArgs),

    /// Show the live state of pull requests recorded by previous runs.
    Status(StatusArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

/// Logs go to stderr; stdout carries only the report.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Apply(args) => args.run().await,
        Commands::Status(args) => args.run().await,
    }
}
