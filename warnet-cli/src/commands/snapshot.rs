//! `warnet snapshot`

use anyhow::{bail, Result};
use serde::Serialize;
use std::path::Path;
use tabled::Tabled;
use warnet_common::constants::TANK_MISSION;
use warnet_core::bitcoin::pod_chain;
use warnet_core::kubernetes::{exec, pods};

use super::Context;
use crate::output;

#[derive(Tabled, Serialize)]
struct SnapshotRow {
    tank: String,
    archive: String,
}

pub async fn handle_snapshot(
    ctx: &Context,
    tank: Option<String>,
    all: bool,
    filters: &[String],
    output_dir: &Path,
) -> Result<()> {
    let client = ctx.client().await?;

    let targets = match (tank, all) {
        (Some(name), _) => vec![pods::get_pod(&client, &name, None).await?],
        (None, true) => pods::get_mission(&client, TANK_MISSION).await?,
        (None, false) => bail!("Name a tank or pass --all"),
    };

    let mut rows = Vec::new();
    for pod in &targets {
        let name = pod.metadata.name.clone().unwrap_or_default();
        let chain = pod_chain(pod)?;
        let archive = exec::snapshot_bitcoin_datadir(
            &client,
            &name,
            chain.data_subdir(),
            output_dir,
            filters,
            pod.metadata.namespace.as_deref(),
        )
        .await?;
        rows.push(SnapshotRow {
            tank: name,
            archive: archive.display().to_string(),
        });
    }

    output::print_output(rows, ctx.output)?;
    Ok(())
}
