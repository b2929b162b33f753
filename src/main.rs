//! CLI entry point for the mink job runner.

use anyhow::Result;
use clap::Parser;
use tracing::debug;

mod app;
mod cli;
mod commands;

use app::terminal::{default_level, init_tracing};
use cli::{Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let level = default_level(args.quiet, args.verbose);

    match &args.command {
        Command::Job(job) => {
            let jobs = commands::load_job(job)?;
            init_tracing(level, Some(commands::open_job_log(job)?));
            debug!(command = ?args.command, "CLI arguments parsed");
            let credentials = commands::load_credentials(&args)?;
            commands::run_job_command(jobs, job, &credentials).await
        }
        Command::Touch(touch) => {
            init_tracing(level, None);
            let credentials = commands::load_credentials(&args)?;
            commands::run_touch_command(touch, &credentials).await
        }
        Command::Replace(replace) => {
            init_tracing(level, None);
            let credentials = commands::load_credentials(&args)?;
            commands::run_replace_command(replace, &credentials).await
        }
        Command::Validate(validate) => {
            init_tracing(level, None);
            commands::run_validate_command(validate)
        }
    }
}
