use anyhow::{Context, Result};
use mpapi::{Credentials, MpApi, touch};

use super::read_module;
use crate::cli::TouchArgs;

pub async fn run_touch_command(args: &TouchArgs, credentials: &Credentials) -> Result<()> {
    let data = read_module(&args.input)?;
    let api = MpApi::new(credentials)?;
    let report = touch::run(&api, &data, args.act)
        .await
        .context("touching objects")?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
