//! Scenario execution through commander pods
//!
//! A scenario runs inside a commander release. The commander receives the
//! list of tanks as JSON in its values and the scenario file itself is
//! streamed into its init container.

use k8s_openapi::api::core::v1::Pod;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use warnet_common::constants::{COMMANDER_CHART, DEFAULT_RPC_PASSWORD, DEFAULT_RPC_USER};

use crate::bitcoin::pod_chain;
use crate::error::{WarnetError, WarnetResult};
use crate::helm::{Helm, InstallRequest};
use crate::kubernetes::{exec, pods, K8sClient};

/// Labels the bitcoincore chart puts on tanks for their RPC settings
pub const RPC_PORT_LABEL: &str = "RPCPort";
pub const RPC_PASSWORD_LABEL: &str = "rpcpassword";

const INIT_CONTAINER: &str = "init";
const SHARED_DIR: &str = "/shared";
const INIT_TIMEOUT: Duration = Duration::from_secs(300);
const START_TIMEOUT: Duration = Duration::from_secs(300);

/// What a scenario gets to know about one tank
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TankInfo {
    pub tank: String,
    pub chain: String,
    pub rpc_host: String,
    pub rpc_port: u16,
    pub rpc_user: String,
    pub rpc_password: String,
    pub init_peers: usize,
}

/// Describe a tank pod for the commander
pub fn tank_info(pod: &Pod) -> WarnetResult<TankInfo> {
    let name = pod.metadata.name.clone().unwrap_or_default();
    let chain = pod_chain(pod)?;

    let rpc_port = pods::label(pod, RPC_PORT_LABEL)
        .and_then(|p| p.parse().ok())
        .unwrap_or_else(|| chain.default_rpc_port());
    let rpc_host = pod
        .status
        .as_ref()
        .and_then(|s| s.pod_ip.clone())
        .unwrap_or_else(|| name.clone());

    Ok(TankInfo {
        chain: chain.to_string(),
        rpc_host,
        rpc_port,
        rpc_user: DEFAULT_RPC_USER.to_string(),
        rpc_password: pods::label(pod, RPC_PASSWORD_LABEL)
            .unwrap_or(DEFAULT_RPC_PASSWORD)
            .to_string(),
        init_peers: pods::init_peers(pod),
        tank: name,
    })
}

/// A scenario ready to be installed as a commander
#[derive(Debug, Clone)]
pub struct ScenarioRun {
    pub path: PathBuf,
    pub file_name: String,
    pub commander: String,
    pub args: Vec<String>,
}

/// Release names must be DNS labels
fn commander_name(stem: &str, unix_secs: i64) -> String {
    let cleaned: String = stem
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .map(|c| c.to_ascii_lowercase())
        .collect();
    format!("commander-{}-{}", cleaned, unix_secs)
}

impl ScenarioRun {
    /// Check the scenario file and name its commander
    pub fn prepare(path: &Path, args: Vec<String>) -> WarnetResult<Self> {
        Self::prepare_at(path, args, chrono::Utc::now().timestamp())
    }

    pub fn prepare_at(path: &Path, args: Vec<String>, unix_secs: i64) -> WarnetResult<Self> {
        if !path.is_file() {
            return Err(WarnetError::Validation(format!(
                "Scenario file not found: {}",
                path.display()
            )));
        }
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            path: path.to_path_buf(),
            file_name,
            commander: commander_name(&stem, unix_secs),
            args,
        })
    }

    /// Values for the commander chart
    pub fn values(&self, tanks: &[TankInfo]) -> WarnetResult<serde_json::Value> {
        Ok(serde_json::json!({
            "scenario": self.file_name,
            "args": self.args.join(" "),
            "warnet": serde_json::to_string(tanks)?,
        }))
    }

    /// Where the scenario file lands in the commander
    pub fn remote_path(&self) -> String {
        format!("{}/{}", SHARED_DIR, self.file_name)
    }
}

/// Result of a scenario run
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioOutcome {
    pub commander: String,
    /// Only known when the run was followed to completion
    pub exit_code: Option<i32>,
}

/// Install the commander and hand it the scenario.
///
/// With `debug` the commander log is streamed to `on_line` until the pod
/// exits, then the release is removed.
pub async fn run_scenario<F>(
    client: &K8sClient,
    helm: &Helm,
    charts_dir: &Path,
    run: &ScenarioRun,
    namespace: Option<&str>,
    debug: bool,
    on_line: F,
) -> WarnetResult<ScenarioOutcome>
where
    F: FnMut(&str),
{
    let namespace = client.namespace_or(namespace).to_string();

    let mut tanks = Vec::new();
    for pod in pods::get_mission(client, warnet_common::constants::TANK_MISSION).await? {
        tanks.push(tank_info(&pod)?);
    }
    tracing::info!("Running {} against {} tanks", run.file_name, tanks.len());

    let request = InstallRequest::new(&run.commander, charts_dir.join(COMMANDER_CHART), &namespace)
        .with_values(run.values(&tanks)?);
    helm.upgrade_install(&request).await?;

    if !pods::wait_for_init(client, &run.commander, Some(&namespace), INIT_TIMEOUT).await? {
        return Err(WarnetError::Timeout(format!(
            "init container of {} never started",
            run.commander
        )));
    }
    let source = tokio::fs::read(&run.path).await?;
    exec::write_file_to_container(
        client,
        &run.commander,
        INIT_CONTAINER,
        &run.remote_path(),
        &source,
        Some(&namespace),
    )
    .await?;

    if !debug {
        return Ok(ScenarioOutcome {
            commander: run.commander.clone(),
            exit_code: None,
        });
    }

    pods::wait_for_pod(client, &run.commander, Some(&namespace), START_TIMEOUT).await?;
    pods::pod_log(client, &run.commander, None, true, Some(&namespace), on_line).await?;
    let exit_code = pods::get_pod_exit_status(client, &run.commander, Some(&namespace)).await?;
    helm.uninstall(&run.commander, &namespace).await?;

    Ok(ScenarioOutcome {
        commander: run.commander.clone(),
        exit_code,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::PodStatus;
    use std::collections::BTreeMap;
    use warnet_common::constants::{CHAIN_LABEL, INIT_PEERS_ANNOTATION};

    #[test]
    fn test_commander_name() {
        assert_eq!(commander_name("miner_std", 1700000000), "commander-minerstd-1700000000");
        assert_eq!(commander_name("Tx-Flood", 1), "commander-tx-flood-1");
    }

    #[test]
    fn test_prepare_requires_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.py");
        assert!(ScenarioRun::prepare(&missing, vec![]).is_err());

        let file = dir.path().join("ln_init.py");
        std::fs::write(&file, "print('hi')").unwrap();
        let run = ScenarioRun::prepare_at(&file, vec!["--interval".into(), "5".into()], 42).unwrap();
        assert_eq!(run.commander, "commander-lninit-42");
        assert_eq!(run.file_name, "ln_init.py");
        assert_eq!(run.remote_path(), "/shared/ln_init.py");
    }

    #[test]
    fn test_values_carry_tanks() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("tx_flood.py");
        std::fs::write(&file, "").unwrap();
        let run = ScenarioRun::prepare_at(&file, vec!["-n".into(), "3".into()], 7).unwrap();

        let tanks = vec![TankInfo {
            tank: "tank-0000".to_string(),
            chain: "regtest".to_string(),
            rpc_host: "10.0.0.4".to_string(),
            rpc_port: 18443,
            rpc_user: "user".to_string(),
            rpc_password: "gn0cchi".to_string(),
            init_peers: 2,
        }];
        let values = run.values(&tanks).unwrap();
        assert_eq!(values["args"], "-n 3");
        assert_eq!(values["scenario"], "tx_flood.py");

        let warnet: serde_json::Value =
            serde_json::from_str(values["warnet"].as_str().unwrap()).unwrap();
        assert_eq!(warnet[0]["tank"], "tank-0000");
        assert_eq!(warnet[0]["rpc_port"], 18443);
        assert_eq!(warnet[0]["init_peers"], 2);
    }

    #[test]
    fn test_tank_info_from_pod() {
        let mut pod = Pod::default();
        pod.metadata.name = Some("tank-0001".to_string());
        pod.metadata.labels = Some(BTreeMap::from([
            (CHAIN_LABEL.to_string(), "signet".to_string()),
            (RPC_PASSWORD_LABEL.to_string(), "pw".to_string()),
        ]));
        pod.metadata.annotations = Some(BTreeMap::from([(
            INIT_PEERS_ANNOTATION.to_string(),
            "4".to_string(),
        )]));

        let info = tank_info(&pod).unwrap();
        assert_eq!(info.chain, "signet");
        assert_eq!(info.rpc_port, 38332);
        assert_eq!(info.rpc_host, "tank-0001");
        assert_eq!(info.rpc_password, "pw");
        assert_eq!(info.init_peers, 4);

        pod.status = Some(PodStatus {
            pod_ip: Some("10.1.2.3".to_string()),
            ..Default::default()
        });
        assert_eq!(tank_info(&pod).unwrap().rpc_host, "10.1.2.3");
    }
}
