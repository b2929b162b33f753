//! Validate command handler: structural check of a local document.

use anyhow::{Context, Result};
use mpapi::{validate_search, xml};

use super::read_module;
use crate::cli::ValidateArgs;

pub fn run_validate_command(args: &ValidateArgs) -> Result<()> {
    let path = args.file.as_path();
    if args.search {
        let root = xml::parse_file(path).with_context(|| format!("reading {}", path.display()))?;
        validate_search(&root).with_context(|| format!("{} is not a valid search", path.display()))?;
    } else {
        read_module(path)?
            .validate()
            .with_context(|| format!("{} is not a valid module document", path.display()))?;
    }
    println!("{}: ok", path.display());
    Ok(())
}
