//! `warnet deploy`, `down`, `status` and `dashboard`

use anyhow::{bail, Context as _, Result};
use serde::Serialize;
use std::path::Path;
use std::time::{Duration, Instant};
use tabled::Tabled;
use warnet_common::constants::{
    COMMANDER_MISSION, DASHBOARD_PORT, FORK_OBSERVER_URL, LIGHTNING_MISSION, LOGGING_NAMESPACE,
    TANK_MISSION,
};
use warnet_core::kubernetes::objects::get_ingress_ip_or_host;
use warnet_core::kubernetes::pods::{self, PodSummary};
use warnet_core::network::{self, ClusterPeers, DeployOptions, TankRelease};

use super::Context;
use crate::output;

pub const CONNECT_POLL_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Tabled, Serialize)]
struct TankRow {
    tank: String,
    namespace: String,
    chain: String,
    init_peers: usize,
    lnd: String,
}

impl From<&TankRelease> for TankRow {
    fn from(t: &TankRelease) -> Self {
        Self {
            tank: t.name.clone(),
            namespace: t.namespace.clone(),
            chain: t.chain.to_string(),
            init_peers: t.init_peers,
            lnd: output::yes_no(t.lnd),
        }
    }
}

#[derive(Tabled, Serialize)]
struct PodRow {
    name: String,
    namespace: String,
    mission: String,
    chain: String,
    phase: String,
}

impl From<PodSummary> for PodRow {
    fn from(p: PodSummary) -> Self {
        Self {
            name: p.name,
            namespace: p.namespace,
            mission: p.mission.unwrap_or_default(),
            chain: p.chain.unwrap_or_else(|| "-".to_string()),
            phase: p.phase,
        }
    }
}

pub async fn handle_deploy(ctx: &Context, directory: &Path, wait: bool, timeout: u64) -> Result<()> {
    let network = network::load_network(directory)
        .with_context(|| format!("Cannot load network from {}", directory.display()))?;
    let client = ctx.client().await?;
    let options = DeployOptions {
        namespace: client.namespace().to_string(),
        charts_dir: ctx.charts_dir.clone(),
    };

    let releases = network::deploy_network(&ctx.helm(), &network, &options).await?;
    output::print_output(releases.iter().map(TankRow::from).collect(), ctx.output)?;
    output::print_success(&format!(
        "Deployed {} tanks to {}",
        releases.len(),
        options.namespace
    ));

    if wait {
        // one budget for readiness and connectivity together
        let deadline = Instant::now() + Duration::from_secs(timeout);
        for release in &releases {
            let ready = pods::wait_for_pod_ready(
                &client,
                &release.name,
                Some(&release.namespace),
                time_left(deadline, Instant::now()),
            )
            .await?;
            if !ready {
                bail!("{} did not become ready within {}s", release.name, timeout);
            }
        }
        output::print_info("Waiting for tanks to reach their peers...");
        network::wait_for_connected(
            &ClusterPeers::new(&client),
            time_left(deadline, Instant::now()),
            CONNECT_POLL_INTERVAL,
        )
        .await?;
        output::print_success("Network connected");
    }
    Ok(())
}

pub async fn handle_down(ctx: &Context) -> Result<()> {
    let client = ctx.client().await?;
    let namespace = client.namespace();

    let removed = network::teardown(&ctx.helm(), namespace).await?;
    if removed.is_empty() {
        output::print_warning(&format!("No releases found in {}", namespace));
    }
    for release in &removed {
        output::print_success(&format!("Uninstalled {}", release));
    }

    // Pods started outside helm survive the uninstall
    let leftovers: Vec<PodSummary> = pods::get_pods(&client)
        .await?
        .iter()
        .map(PodSummary::from)
        .filter(|p| p.namespace == namespace && is_warnet_pod(p))
        .collect();
    for pod in &leftovers {
        pods::delete_pod(&client, &pod.name, Some(namespace)).await?;
        output::print_success(&format!("Deleted pod {}", pod.name));
    }
    Ok(())
}

fn time_left(deadline: Instant, now: Instant) -> Duration {
    deadline.saturating_duration_since(now)
}

fn is_warnet_pod(summary: &PodSummary) -> bool {
    matches!(
        summary.mission.as_deref(),
        Some(TANK_MISSION) | Some(LIGHTNING_MISSION) | Some(COMMANDER_MISSION)
    )
}

pub async fn handle_status(ctx: &Context) -> Result<()> {
    let client = ctx.client().await?;
    let summaries: Vec<PodSummary> = pods::get_pods(&client)
        .await?
        .iter()
        .map(PodSummary::from)
        .filter(is_warnet_pod)
        .collect();

    let tanks = summaries
        .iter()
        .filter(|s| s.mission.as_deref() == Some(TANK_MISSION))
        .count();
    output::print_output(summaries.into_iter().map(PodRow::from).collect(), ctx.output)?;
    tracing::debug!("{} tanks running", tanks);
    Ok(())
}

/// Dashboard URLs for an ingress address
fn dashboard_urls(host: &str) -> (String, String) {
    (format!("http://{}/", host), format!("http://{}/fork-observer/", host))
}

pub async fn handle_dashboard(ctx: &Context) -> Result<()> {
    let client = ctx.client().await?;
    match get_ingress_ip_or_host(&client).await? {
        Some(host) => {
            let (dashboard, fork_observer) = dashboard_urls(&host);
            output::print_info(&format!("Dashboard: {}", dashboard));
            output::print_info(&format!("Fork observer: {}", fork_observer));
        }
        None => {
            output::print_warning(&format!(
                "The ingress in {} has no address yet; forward port {} to reach caddy locally",
                LOGGING_NAMESPACE, DASHBOARD_PORT
            ));
            output::print_info(&format!("Fork observer: {}", FORK_OBSERVER_URL));
        }
    }
    Ok(())
}
