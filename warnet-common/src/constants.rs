//! Names, labels and ports shared by every warnet component

/// Namespace used when neither the user nor the kubeconfig names one
pub const DEFAULT_NAMESPACE: &str = "warnet";
pub const LOGGING_NAMESPACE: &str = "warnet-logging";
pub const CADDY_INGRESS_NAME: &str = "caddy-ingress";

/// Namespaces created by Kubernetes itself, never touched by warnet
pub const KUBE_INTERNAL_NAMESPACES: &[&str] = &["kube-node-lease", "kube-public", "kube-system"];

// Project layout
pub const NETWORK_DIR: &str = "networks";
pub const PLUGINS_DIR: &str = "plugins";
pub const SCENARIOS_DIR: &str = "scenarios";
pub const NETWORK_FILE: &str = "network.yaml";
pub const DEFAULTS_FILE: &str = "node-defaults.yaml";

// Labels and annotations set by the charts
pub const MISSION_LABEL: &str = "mission";
pub const CHAIN_LABEL: &str = "chain";
pub const CHANNELS_LABEL: &str = "channels";
pub const INIT_PEERS_ANNOTATION: &str = "init_peers";

pub const TANK_MISSION: &str = "tank";
pub const LIGHTNING_MISSION: &str = "lightning";
pub const COMMANDER_MISSION: &str = "commander";

// Chart names under the charts directory
pub const BITCOIN_CHART: &str = "bitcoincore";
pub const COMMANDER_CHART: &str = "commander";
pub const FORK_OBSERVER_CHART: &str = "fork-observer";

// Bitcoin Core defaults baked into the charts
pub const DEFAULT_RPC_USER: &str = "user";
pub const DEFAULT_RPC_PASSWORD: &str = "gn0cchi";
pub const ZMQ_BLOCK_PORT: u16 = 28332;
pub const ZMQ_TX_PORT: u16 = 28333;

/// bitcoind only honours this many manual outbound connections
pub const MAX_MANUAL_CONNECTIONS: usize = 8;

/// Fork-observer UI as exposed through the local caddy port-forward
pub const FORK_OBSERVER_URL: &str = "http://localhost:2019/fork-observer/";
pub const DASHBOARD_PORT: u16 = 2019;
