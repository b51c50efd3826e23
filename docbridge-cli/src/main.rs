//! docbridge — push dbt documentation into BI platform datasets.
//!
//! # Usage
//!
//! ```text
//! docbridge push <superset-url> [--project-dir <dir>] [--superset-db-id <id>]
//!                [--dbt-db-name <name>] [--dataset-filter <substring>]
//!                [--default-descriptions <yaml>] [--refresh-columns]
//!                [--pause-after-update <secs>] [--dry-run] [--json]
//! docbridge diff <superset-url> [same selection flags as push]
//! ```
//!
//! Credentials come from `--username` / `--password` or the `USERNAME` /
//! `PASSWORD` environment variables.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{diff::DiffArgs, push::PushArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "docbridge",
    version,
    about = "Push table and column descriptions from dbt artifacts to Superset datasets",
    long_about = None,
)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reconcile dataset descriptions with the dbt manifest and write changes.
    Push(PushArgs),

    /// Show a unified diff of what push would change, without writing.
    Diff(DiffArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Push(args) => args.run(),
        Commands::Diff(args) => args.run(),
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
