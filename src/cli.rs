//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use mpapi::config::DEFAULT_CREDENTIALS_FILE;
use mpapi::constants::DEFAULT_CHUNK_SIZE;

/// Run jobs against a museum collection REST API.
///
/// Jobs are defined in a job file; every run writes its data to a dated
/// project directory below the base directory.
#[derive(Parser, Debug)]
#[command(name = "mink")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Credentials file (TOML with base_url, user, password)
    #[arg(long, default_value = DEFAULT_CREDENTIALS_FILE, global = true)]
    pub credentials: PathBuf,

    /// Server base URL, overrides the credentials file
    #[arg(long, env = "MPAPI_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// User name, overrides the credentials file
    #[arg(long, env = "MPAPI_USER", global = true)]
    pub user: Option<String>,

    /// Password, overrides the credentials file
    #[arg(long, env = "MPAPI_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a job from the job file
    Job(JobArgs),

    /// Update objects whose approved assets changed after them
    Touch(TouchArgs),

    /// Run a search-and-act plugin
    Replace(ReplaceArgs),

    /// Check a module or search document
    Validate(ValidateArgs),
}

/// Arguments for `mink job`.
#[derive(ClapArgs, Debug, Clone)]
pub struct JobArgs {
    /// Name of the job to run
    pub job: String,

    /// Job file
    #[arg(short, long, default_value = "jobs.dsl")]
    pub conf: PathBuf,

    /// Items per request for chunked commands
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE, value_parser = clap::value_parser!(u32).range(1..))]
    pub chunk_size: u32,

    /// Directory receiving the job directories
    #[arg(short, long, default_value = ".")]
    pub base_dir: PathBuf,
}

/// Arguments for `mink touch`.
#[derive(ClapArgs, Debug, Clone)]
pub struct TouchArgs {
    /// Pack file with Object and Multimedia items
    #[arg(short, long)]
    pub input: PathBuf,

    /// Write changes to the server (default: only report)
    #[arg(short, long)]
    pub act: bool,
}

/// Arguments for `mink replace`.
#[derive(ClapArgs, Debug, Clone)]
pub struct ReplaceArgs {
    /// Plugin name (digip)
    pub plugin: String,

    /// Maximum number of searched records (-1 for all)
    #[arg(short, long, default_value_t = -1, allow_negative_numbers = true)]
    pub limit: i64,

    /// Write changes to the server (default: only report)
    #[arg(short, long)]
    pub act: bool,
}

/// Arguments for `mink validate`.
#[derive(ClapArgs, Debug, Clone)]
pub struct ValidateArgs {
    /// Document to check (.xml or zipped chunk)
    pub file: PathBuf,

    /// Check the file as a search request instead of a module document
    #[arg(short, long)]
    pub search: bool,
}
