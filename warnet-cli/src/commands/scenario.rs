//! `warnet run` and `warnet logs`

use anyhow::{bail, Result};
use std::path::Path;
use warnet_core::kubernetes::pods;
use warnet_core::scenario::{self, ScenarioRun};

use super::Context;
use crate::output;

pub async fn handle_run(ctx: &Context, path: &Path, args: Vec<String>, debug: bool) -> Result<()> {
    let run = ScenarioRun::prepare(path, args)?;
    let client = ctx.client().await?;

    let outcome = scenario::run_scenario(
        &client,
        &ctx.helm(),
        &ctx.charts_dir,
        &run,
        ctx.namespace.as_deref(),
        debug,
        |line| println!("{}", line),
    )
    .await?;

    match outcome.exit_code {
        None => output::print_success(&format!(
            "Started {}; follow it with: warnet logs -f {}",
            outcome.commander, outcome.commander
        )),
        Some(0) => output::print_success(&format!("{} finished", outcome.commander)),
        Some(code) => bail!("{} exited with status {}", outcome.commander, code),
    }
    Ok(())
}

pub async fn handle_logs(ctx: &Context, pod: &str, container: Option<&str>, follow: bool) -> Result<()> {
    let client = ctx.client().await?;
    pods::pod_log(&client, pod, container, follow, None, |line| println!("{}", line)).await?;
    Ok(())
}
