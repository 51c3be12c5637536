//! Network definitions as written in a project's `network.yaml`
//!
//! A network is a list of tanks (Bitcoin Core nodes). Each tank may carry an
//! lnd sidecar with a list of channels to open once the network is up. Any
//! key the types below don't know about is kept verbatim and handed to the
//! chart as a value.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Top-level `network.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkSpec {
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fork_observer: Option<ForkObserverSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caddy: Option<CaddySpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkObserverSpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_query_interval: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaddySpec {
    #[serde(default)]
    pub enabled: bool,
}

/// Lightning implementation toggles for a tank
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LnToggle {
    #[serde(default)]
    pub lnd: bool,
    /// Other implementations (`cln`, ...) pass through to the chart
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// A single tank
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addnode: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ln: Option<LnToggle>,
    /// Values for the lnd subchart, `channels` included
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lnd: Option<serde_yaml::Value>,
    /// Every other chart value (image, config, resources, ...)
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// Channel identifier: the block and transaction index the funding tx lands in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ChannelId {
    pub block: u64,
    pub index: u64,
}

/// Typed view over one entry of an lnd `channels` list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelSpec {
    pub id: ChannelId,
    pub target: String,
    pub local_amt: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_amt: Option<u64>,
    /// Set when the channel was read back from the cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl NodeSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            addnode: Vec::new(),
            ln: None,
            lnd: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn lnd_enabled(&self) -> bool {
        self.ln.as_ref().map(|ln| ln.lnd).unwrap_or(false)
    }

    /// Name of the lnd sidecar release for this tank
    pub fn lnd_name(&self) -> String {
        format!("{}-ln", self.name)
    }

    /// Raw `lnd.channels` value, `[]` when absent
    pub fn channels_value(&self) -> serde_yaml::Value {
        self.lnd
            .as_ref()
            .and_then(|lnd| lnd.get("channels"))
            .cloned()
            .unwrap_or_else(|| serde_yaml::Value::Sequence(Vec::new()))
    }

    /// Parse `lnd.channels` into typed channels
    pub fn channels(&self) -> Result<Vec<ChannelSpec>> {
        let value = self.channels_value();
        serde_yaml::from_value(value).map_err(|e| {
            Error::InvalidChannel(format!("{}: {}", self.name, e))
        })
    }
}

impl NetworkSpec {
    /// Parse a `network.yaml` document
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn node(&self, name: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn fork_observer_enabled(&self) -> bool {
        self.fork_observer.as_ref().map(|f| f.enabled).unwrap_or(false)
    }

    /// Check names, peer references and channel targets
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(Error::InvalidNetwork("network has no nodes".to_string()));
        }

        let mut seen = HashSet::new();
        for node in &self.nodes {
            validate_name(&node.name)?;
            if !seen.insert(node.name.as_str()) {
                return Err(Error::InvalidNode(format!(
                    "duplicate node name '{}'",
                    node.name
                )));
            }
        }

        let lnd_targets: HashSet<String> = self
            .nodes
            .iter()
            .filter(|n| n.lnd_enabled())
            .map(|n| n.lnd_name())
            .collect();

        for node in &self.nodes {
            for peer in &node.addnode {
                if peer == &node.name {
                    return Err(Error::InvalidNode(format!(
                        "node '{}' cannot addnode itself",
                        node.name
                    )));
                }
                if !seen.contains(peer.as_str()) {
                    return Err(Error::InvalidNode(format!(
                        "node '{}' adds unknown peer '{}'",
                        node.name, peer
                    )));
                }
            }

            let channels = node.channels()?;
            if !channels.is_empty() && !node.lnd_enabled() {
                return Err(Error::InvalidChannel(format!(
                    "node '{}' declares channels but has no lnd",
                    node.name
                )));
            }
            for channel in channels {
                if !lnd_targets.contains(&channel.target) {
                    return Err(Error::InvalidChannel(format!(
                        "channel {}:{} from '{}' targets unknown lightning node '{}'",
                        channel.id.block, channel.id.index, node.name, channel.target
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Node names become helm release and pod names, so they must be DNS labels
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidNode("node name is empty".to_string()));
    }
    // helm caps release names at 53 characters
    if name.len() > 53 {
        return Err(Error::InvalidNode(format!("node name '{}' is too long", name)));
    }
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    let valid_edges = !name.starts_with('-') && !name.ends_with('-');
    if !valid_chars || !valid_edges {
        return Err(Error::InvalidNode(format!(
            "node name '{}' must be a lowercase DNS label",
            name
        )));
    }
    Ok(())
}
