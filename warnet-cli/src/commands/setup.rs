//! `warnet setup`

use anyhow::{bail, Result};
use serde::Serialize;
use tabled::Tabled;
use warnet_core::setup::{self, SetupCheck};

use super::Context;
use crate::output;

#[derive(Tabled, Serialize)]
struct CheckRow {
    check: String,
    status: String,
    detail: String,
}

impl From<SetupCheck> for CheckRow {
    fn from(c: SetupCheck) -> Self {
        Self {
            check: c.name,
            status: if c.passed { "ok" } else { "FAILED" }.to_string(),
            detail: c.detail,
        }
    }
}

pub async fn handle_setup(ctx: &Context) -> Result<()> {
    let checks = setup::run_checks(ctx.kubeconfig.as_deref(), ctx.namespace.as_deref()).await;
    let passed = setup::all_passed(&checks);

    output::print_output(checks.into_iter().map(CheckRow::from).collect(), ctx.output)?;

    if !passed {
        bail!("Some checks failed; fix them before deploying a network");
    }
    output::print_success("Ready to deploy. Next: warnet init");
    Ok(())
}
