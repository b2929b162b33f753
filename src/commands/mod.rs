//! CLI command handlers.

mod job;
mod replace;
mod touch;
mod validate;

use std::path::Path;

use anyhow::{Context, Result};
use mpapi::config::{Credentials, Overrides};
use mpapi::module::Module;

use crate::cli::Args;

pub use job::{load_job, open_job_log, run_job_command};
pub use replace::run_replace_command;
pub use touch::run_touch_command;
pub use validate::run_validate_command;

/// Credentials from the file named on the command line, with flag and
/// environment overrides applied.
pub(crate) fn load_credentials(args: &Args) -> Result<Credentials> {
    let overrides = Overrides {
        base_url: args.base_url.clone(),
        user: args.user.clone(),
        password: args.password.clone(),
    };
    Credentials::load(&args.credentials, &overrides)
        .with_context(|| format!("loading credentials from {}", args.credentials.display()))
}

/// Reads a module document, unpacking zipped chunk files.
pub(crate) fn read_module(path: &Path) -> Result<Module> {
    let module = if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("zip")) {
        Module::from_zip(path)
    } else {
        Module::from_file(path)
    };
    module.with_context(|| format!("reading {}", path.display()))
}
