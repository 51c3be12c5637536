//! Network lifecycle: deploy a project's network, tear it down and check
//! that tanks reached their configured peers.

use async_trait::async_trait;
use futures::future::try_join_all;
use serde::Serialize;
use serde_json::Value as JsonValue;
use serde_yaml::{Mapping, Value as YamlValue};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use warnet_common::constants::{
    BITCOIN_CHART, DEFAULTS_FILE, DEFAULT_RPC_PASSWORD, DEFAULT_RPC_USER, FORK_OBSERVER_CHART,
    MAX_MANUAL_CONNECTIONS, NETWORK_FILE, TANK_MISSION,
};
use warnet_common::{Chain, NetworkSpec, NodeSpec};

use crate::chart::{scalar_text, yaml_to_json, LndValues};
use crate::error::{WarnetError, WarnetResult};
use crate::helm::{Helm, InstallRequest};
use crate::kubernetes::{pods, K8sClient};

pub const CADDY_CHART: &str = "caddy";
const DEFAULT_CONFIG_QUERY_INTERVAL: u32 = 20;

/// A project network read from disk
#[derive(Debug, Clone)]
pub struct ProjectNetwork {
    pub directory: PathBuf,
    pub spec: NetworkSpec,
    /// `node-defaults.yaml`, an empty mapping when the file is absent
    pub defaults: YamlValue,
}

/// Read and validate `network.yaml` plus the optional node defaults
pub fn load_network(directory: &Path) -> WarnetResult<ProjectNetwork> {
    let network_file = directory.join(NETWORK_FILE);
    let raw = fs::read_to_string(&network_file).map_err(|e| {
        WarnetError::Validation(format!("Cannot read {}: {}", network_file.display(), e))
    })?;
    let spec = NetworkSpec::from_yaml(&raw)?;
    spec.validate()?;

    let defaults_file = directory.join(DEFAULTS_FILE);
    let defaults = if defaults_file.exists() {
        match serde_yaml::from_str::<YamlValue>(&fs::read_to_string(&defaults_file)?)? {
            YamlValue::Null => YamlValue::Mapping(Mapping::new()),
            value => value,
        }
    } else {
        YamlValue::Mapping(Mapping::new())
    };

    tracing::debug!(
        "Loaded network with {} nodes from {}",
        spec.nodes.len(),
        directory.display()
    );
    Ok(ProjectNetwork {
        directory: directory.to_path_buf(),
        spec,
        defaults,
    })
}

/// Chart values a node contributes on top of the defaults
pub fn node_values(node: &NodeSpec) -> WarnetResult<YamlValue> {
    let mut value = serde_yaml::to_value(node)?;
    if let YamlValue::Mapping(map) = &mut value {
        map.remove("name");
    }
    Ok(value)
}

/// One helm release of the bitcoincore chart
#[derive(Debug, Clone, Serialize)]
pub struct TankRelease {
    pub name: String,
    pub namespace: String,
    pub chain: Chain,
    pub init_peers: usize,
    pub lnd: bool,
    pub values: JsonValue,
}

impl TankRelease {
    pub fn rpc_password(&self) -> String {
        self.values
            .pointer("/global/rpcpassword")
            .and_then(json_scalar_text)
            .unwrap_or_else(|| DEFAULT_RPC_PASSWORD.to_string())
    }

    /// `global.<chain>.RPCPort`, else the chain's default port
    pub fn rpc_port(&self) -> u16 {
        self.values
            .pointer(&format!("/global/{}/RPCPort", self.chain))
            .and_then(json_scalar_text)
            .and_then(|port| port.trim().parse().ok())
            .unwrap_or_else(|| self.chain.default_rpc_port())
    }

    /// Values the lnd subchart sees: its own section plus the shared globals
    pub fn lnd_values(&self) -> WarnetResult<Option<LndValues>> {
        if !self.lnd {
            return Ok(None);
        }
        let mut global = self.values.get("global").cloned().unwrap_or(JsonValue::Null);
        if let JsonValue::Object(map) = &mut global {
            map.entry("chain")
                .or_insert_with(|| JsonValue::String(self.chain.to_string()));
        } else {
            global = serde_json::json!({ "chain": self.chain.to_string() });
        }

        let globals: YamlValue = serde_yaml::to_value(serde_json::json!({ "global": global }))?;
        let own: YamlValue = match self.values.get("lnd") {
            Some(lnd) => serde_yaml::to_value(lnd)?,
            None => YamlValue::Null,
        };
        LndValues::with_overlays([&globals, &own]).map(Some)
    }
}

fn json_scalar_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn chain_of(values: &YamlValue) -> WarnetResult<Chain> {
    match values.get("global").and_then(|g| g.get("chain")).and_then(scalar_text) {
        Some(chain) => Ok(chain.parse()?),
        None => Ok(Chain::default()),
    }
}

/// Turn a network into one release per tank
pub fn plan_deployment(
    network: &NetworkSpec,
    defaults: &YamlValue,
    namespace: &str,
) -> WarnetResult<Vec<TankRelease>> {
    network.validate()?;

    network
        .nodes
        .iter()
        .map(|node| -> WarnetResult<TankRelease> {
            let merged = crate::chart::merge_values(defaults.clone(), node_values(node)?);
            Ok(TankRelease {
                name: node.name.clone(),
                namespace: namespace.to_string(),
                chain: chain_of(&merged)?,
                init_peers: node.addnode.len(),
                lnd: node.lnd_enabled(),
                values: yaml_to_json(&merged)?,
            })
        })
        .collect()
}

/// fork-observer values listing every tank as an RPC source
pub fn fork_observer_values(spec: &NetworkSpec, releases: &[TankRelease]) -> JsonValue {
    let interval = spec
        .fork_observer
        .as_ref()
        .and_then(|f| f.config_query_interval)
        .unwrap_or(DEFAULT_CONFIG_QUERY_INTERVAL);

    let nodes: Vec<JsonValue> = releases
        .iter()
        .enumerate()
        .map(|(id, tank)| {
            serde_json::json!({
                "id": id,
                "name": tank.name,
                "rpc_host": tank.name,
                "rpc_port": tank.rpc_port(),
                "rpc_user": DEFAULT_RPC_USER,
                "rpc_password": tank.rpc_password(),
            })
        })
        .collect();

    serde_json::json!({
        "configQueryInterval": interval,
        "nodes": nodes,
    })
}

/// Where and how to deploy
#[derive(Debug, Clone)]
pub struct DeployOptions {
    pub namespace: String,
    pub charts_dir: PathBuf,
}

/// Install every tank of the network, then the optional observers
pub async fn deploy_network(
    helm: &Helm,
    network: &ProjectNetwork,
    options: &DeployOptions,
) -> WarnetResult<Vec<TankRelease>> {
    let releases = plan_deployment(&network.spec, &network.defaults, &options.namespace)?;

    // Catch broken lnd values before anything reaches the cluster
    for release in &releases {
        if let Some(lnd) = release.lnd_values()? {
            lnd.global.rpc_port()?;
        }
    }

    let chart = options.charts_dir.join(BITCOIN_CHART);
    try_join_all(releases.iter().map(|release| {
        let mut request = InstallRequest::new(&release.name, &chart, &options.namespace)
            .with_values(release.values.clone());
        request.create_namespace = true;
        async move {
            helm.upgrade_install(&request).await?;
            tracing::info!("Deployed {} ({})", release.name, release.chain);
            Ok::<_, WarnetError>(())
        }
    }))
    .await?;

    if network.spec.fork_observer_enabled() {
        let request = InstallRequest::new(
            FORK_OBSERVER_CHART,
            options.charts_dir.join(FORK_OBSERVER_CHART),
            &options.namespace,
        )
        .with_values(fork_observer_values(&network.spec, &releases));
        helm.upgrade_install(&request).await?;
    }

    if network.spec.caddy.as_ref().map(|c| c.enabled).unwrap_or(false) {
        let request = InstallRequest::new(
            CADDY_CHART,
            options.charts_dir.join(CADDY_CHART),
            &options.namespace,
        );
        helm.upgrade_install(&request).await?;
    }

    tracing::info!(
        "Network from {} deployed to {}",
        network.directory.display(),
        options.namespace
    );
    Ok(releases)
}

/// Uninstall every helm release in a namespace, returning their names
pub async fn teardown(helm: &Helm, namespace: &str) -> WarnetResult<Vec<String>> {
    let releases = helm.list_releases(namespace).await?;
    try_join_all(
        releases
            .iter()
            .map(|release| helm.uninstall(&release.name, namespace)),
    )
    .await?;
    Ok(releases.into_iter().map(|r| r.name).collect())
}

/// A peer counts as manual when it was added with `addnode`.
///
/// Newer nodes report a `connection_type`; older ones an `addnode` flag.
pub fn is_connection_manual(peer: &JsonValue) -> bool {
    peer.get("connection_type").and_then(JsonValue::as_str) == Some("manual")
        || peer.get("addnode").and_then(JsonValue::as_bool) == Some(true)
}

/// A tank as seen by the connectivity check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TankRef {
    pub name: String,
    pub namespace: String,
    pub init_peers: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TankConnectivity {
    pub tank: String,
    pub expected: usize,
    pub actual: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TankConnectivity {
    /// bitcoind caps manual outbound connections, so more edges than the
    /// cap can never all be satisfied
    pub fn is_connected(&self) -> bool {
        self.error.is_none() && self.actual >= self.expected.min(MAX_MANUAL_CONNECTIONS)
    }
}

pub fn evaluate_connectivity(tank: &str, init_peers: usize, peers: &[JsonValue]) -> TankConnectivity {
    TankConnectivity {
        tank: tank.to_string(),
        expected: init_peers,
        actual: peers.iter().filter(|p| is_connection_manual(p)).count(),
        error: None,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectivityReport {
    pub tanks: Vec<TankConnectivity>,
}

impl ConnectivityReport {
    pub fn connected(&self) -> bool {
        self.tanks.iter().all(TankConnectivity::is_connected)
    }
}

/// Where tanks and their peer lists come from
#[async_trait]
pub trait PeerSource: Send + Sync {
    async fn tanks(&self) -> WarnetResult<Vec<TankRef>>;

    /// Parsed `getpeerinfo` of one tank
    async fn peer_info(&self, tank: &TankRef) -> WarnetResult<Vec<JsonValue>>;
}

/// Peers read from the running cluster through bitcoin-cli
pub struct ClusterPeers<'a> {
    client: &'a K8sClient,
}

impl<'a> ClusterPeers<'a> {
    pub fn new(client: &'a K8sClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PeerSource for ClusterPeers<'_> {
    async fn tanks(&self) -> WarnetResult<Vec<TankRef>> {
        Ok(pods::get_mission(self.client, TANK_MISSION)
            .await?
            .iter()
            .map(|pod| TankRef {
                name: pod.metadata.name.clone().unwrap_or_default(),
                namespace: pod.metadata.namespace.clone().unwrap_or_default(),
                init_peers: pods::init_peers(pod),
            })
            .collect())
    }

    async fn peer_info(&self, tank: &TankRef) -> WarnetResult<Vec<JsonValue>> {
        let raw =
            crate::bitcoin::rpc(self.client, &tank.name, "getpeerinfo", &[], Some(&tank.namespace))
                .await?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Evaluate every tank's manual peer count.
///
/// A tank whose peers can't be read is reported as disconnected.
pub async fn check_connected<S: PeerSource + ?Sized>(source: &S) -> WarnetResult<ConnectivityReport> {
    let mut tanks = Vec::new();
    for tank in source.tanks().await? {
        let status = match source.peer_info(&tank).await {
            Ok(peers) => evaluate_connectivity(&tank.name, tank.init_peers, &peers),
            Err(e) => TankConnectivity {
                tank: tank.name.clone(),
                expected: tank.init_peers,
                actual: 0,
                error: Some(e.to_string()),
            },
        };
        tracing::debug!(
            "Tank {} peers expected: {}, actual: {}",
            status.tank,
            status.expected,
            status.actual
        );
        tanks.push(status);
    }
    Ok(ConnectivityReport { tanks })
}

/// Poll [`check_connected`] until the network is connected
pub async fn wait_for_connected<S: PeerSource + ?Sized>(
    source: &S,
    timeout: Duration,
    interval: Duration,
) -> WarnetResult<ConnectivityReport> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let report = check_connected(source).await?;
        if report.connected() {
            tracing::info!("Network connected");
            return Ok(report);
        }
        if tokio::time::Instant::now() + interval > deadline {
            return Err(WarnetError::Timeout(format!(
                "network not connected after {}s",
                timeout.as_secs()
            )));
        }
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    struct StaticPeers {
        tanks: Vec<TankRef>,
        peers: HashMap<String, Vec<JsonValue>>,
    }

    #[async_trait]
    impl PeerSource for StaticPeers {
        async fn tanks(&self) -> WarnetResult<Vec<TankRef>> {
            Ok(self.tanks.clone())
        }

        async fn peer_info(&self, tank: &TankRef) -> WarnetResult<Vec<JsonValue>> {
            self.peers
                .get(&tank.name)
                .cloned()
                .ok_or_else(|| WarnetError::Exec("pod gone".to_string()))
        }
    }

    fn tank(name: &str, init_peers: usize) -> TankRef {
        TankRef {
            name: name.to_string(),
            namespace: "warnet".to_string(),
            init_peers,
        }
    }

    fn manual() -> JsonValue {
        json!({"connection_type": "manual"})
    }

    #[test]
    fn test_is_connection_manual() {
        assert!(is_connection_manual(&json!({"connection_type": "manual"})));
        assert!(is_connection_manual(&json!({"addnode": true})));
        assert!(!is_connection_manual(&json!({"connection_type": "outbound-full-relay"})));
        assert!(!is_connection_manual(&json!({"addnode": false})));
        assert!(!is_connection_manual(&json!({"addnode": "true"})));
    }

    #[test]
    fn test_connectivity_is_capped() {
        let peers: Vec<JsonValue> = (0..8).map(|_| manual()).collect();
        assert!(evaluate_connectivity("tank-0000", 12, &peers).is_connected());
        assert!(!evaluate_connectivity("tank-0000", 12, &peers[..7]).is_connected());
        assert!(evaluate_connectivity("tank-0001", 0, &[]).is_connected());
    }

    #[test]
    fn test_non_manual_peers_do_not_count() {
        let peers = vec![manual(), json!({"connection_type": "inbound"})];
        let status = evaluate_connectivity("tank-0000", 2, &peers);
        assert_eq!(status.actual, 1);
        assert!(!status.is_connected());
    }

    #[tokio::test]
    async fn test_check_connected() {
        let source = StaticPeers {
            tanks: vec![tank("tank-0000", 1), tank("tank-0001", 0)],
            peers: HashMap::from([
                ("tank-0000".to_string(), vec![manual()]),
                ("tank-0001".to_string(), vec![]),
            ]),
        };
        let report = check_connected(&source).await.unwrap();
        assert!(report.connected());
        assert_eq!(report.tanks.len(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_tank_is_disconnected() {
        let source = StaticPeers {
            tanks: vec![tank("tank-0000", 0)],
            peers: HashMap::new(),
        };
        let report = check_connected(&source).await.unwrap();
        assert!(!report.connected());
        assert!(report.tanks[0].error.is_some());
    }

    #[tokio::test]
    async fn test_wait_for_connected_times_out() {
        let source = StaticPeers {
            tanks: vec![tank("tank-0000", 3)],
            peers: HashMap::from([("tank-0000".to_string(), vec![manual()])]),
        };
        let err = wait_for_connected(&source, Duration::from_millis(30), Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, WarnetError::Timeout(_)));
    }

    #[test]
    fn test_plan_deployment_merges_defaults() {
        let spec = NetworkSpec::from_yaml(
            "nodes:\n  - name: tank-0000\n    addnode: [tank-0001]\n    image: {tag: '26.0'}\n  - name: tank-0001\n",
        )
        .unwrap();
        let defaults: YamlValue =
            serde_yaml::from_str("global: {chain: signet}\nimage: {repository: bitcoin, tag: '27.0'}").unwrap();
        let plan = plan_deployment(&spec, &defaults, "warnet").unwrap();

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].chain, Chain::Signet);
        assert_eq!(plan[0].init_peers, 1);
        assert_eq!(plan[0].values["image"], json!({"repository": "bitcoin", "tag": "26.0"}));
        assert_eq!(plan[0].values["addnode"], json!(["tank-0001"]));
        assert!(plan[0].values.get("name").is_none());
        assert_eq!(plan[1].values["image"]["tag"], "27.0");
    }

    #[test]
    fn test_lnd_values_inherit_globals() {
        let spec = NetworkSpec::from_yaml(
            "nodes:\n  - name: tank-0000\n    ln: {lnd: true}\n    lnd: {config: 'color=#ff0000'}\n",
        )
        .unwrap();
        let defaults: YamlValue = serde_yaml::from_str("global: {chain: regtest, rpcpassword: s3cret}").unwrap();
        let plan = plan_deployment(&spec, &defaults, "warnet").unwrap();
        let lnd = plan[0].lnd_values().unwrap().unwrap();
        assert_eq!(lnd.global.rpcpassword, "s3cret");
        assert_eq!(lnd.global.rpc_port().unwrap(), 18443);
        assert_eq!(lnd.config, "color=#ff0000");
    }

    #[test]
    fn test_fork_observer_values() {
        let spec = NetworkSpec::from_yaml(
            "nodes:\n  - name: tank-0000\n  - name: tank-0001\nfork_observer: {enabled: true, configQueryInterval: 5}\n",
        )
        .unwrap();
        let plan = plan_deployment(&spec, &YamlValue::Mapping(Mapping::new()), "warnet").unwrap();
        let values = fork_observer_values(&spec, &plan);
        assert_eq!(values["configQueryInterval"], 5);
        assert_eq!(values["nodes"][1]["rpc_host"], "tank-0001");
        assert_eq!(values["nodes"][1]["rpc_port"], 18443);
        assert_eq!(values["nodes"][0]["rpc_password"], DEFAULT_RPC_PASSWORD);
    }

    #[test]
    fn test_fork_observer_follows_rpc_port_override() {
        let spec = NetworkSpec::from_yaml(
            "nodes:\n  - name: tank-0000\n    ln: {lnd: true}\nfork_observer: {enabled: true}\n",
        )
        .unwrap();
        let defaults: YamlValue =
            serde_yaml::from_str("global: {chain: regtest, rpcpassword: 4711, regtest: {RPCPort: 19000}}")
                .unwrap();
        let plan = plan_deployment(&spec, &defaults, "warnet").unwrap();
        let lnd = plan[0].lnd_values().unwrap().unwrap();
        assert_eq!(lnd.global.rpc_port().unwrap(), 19000);

        let values = fork_observer_values(&spec, &plan);
        assert_eq!(values["nodes"][0]["rpc_port"], 19000);
        assert_eq!(values["nodes"][0]["rpc_password"], "4711");
    }

    #[test]
    fn test_unknown_ln_keys_reach_the_chart() {
        let spec = NetworkSpec::from_yaml(
            "nodes:\n  - name: tank-0000\n    ln: {lnd: true, cln: true}\n",
        )
        .unwrap();
        let plan = plan_deployment(&spec, &YamlValue::Mapping(Mapping::new()), "warnet").unwrap();
        assert!(plan[0].lnd);
        assert_eq!(plan[0].values["ln"], json!({"lnd": true, "cln": true}));
    }
}
