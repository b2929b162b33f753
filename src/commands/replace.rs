use anyhow::{Context, Result};
use mpapi::replace::plugin_by_name;
use mpapi::{Credentials, MpApi, Replacer};

use crate::cli::ReplaceArgs;

pub async fn run_replace_command(args: &ReplaceArgs, credentials: &Credentials) -> Result<()> {
    let plugin = plugin_by_name(&args.plugin)?;
    let replacer = Replacer::new(MpApi::new(credentials)?, args.act);
    let report = replacer
        .run(plugin.as_ref(), args.limit)
        .await
        .with_context(|| format!("plugin '{}' failed", args.plugin))?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
