use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use warnet_common::constants::{DEFAULT_RPC_PASSWORD, ZMQ_BLOCK_PORT, ZMQ_TX_PORT};

use crate::error::{WarnetError, WarnetResult};

/// Defaults of the lnd chart's `values.yaml`
pub const DEFAULT_LND_VALUES: &str = r#"global:
  chain: regtest
  rpcpassword: gn0cchi
  ZMQBlockPort: 28332
  ZMQTxPort: 28333
  regtest:
    RPCPort: 18443
  signet:
    RPCPort: 38332
  testnet:
    RPCPort: 18332
  main:
    RPCPort: 8332
baseConfig: |
  norest=false
  restlisten=0.0.0.0:8080
  debuglevel=debug
  accept-keysend=true
  bitcoin.active=true
  bitcoin.node=bitcoind
  maxpendingchannels=64
  trickledelay=1
  rpclisten=0.0.0.0:10009
  bitcoind.rpcuser=user
  protocol.wumbo-channels=1
defaultConfig: ""
config: ""
channels: []
"#;

/// Values shared with the parent bitcoincore chart
#[derive(Debug, Clone, Deserialize)]
pub struct GlobalValues {
    #[serde(deserialize_with = "scalar_string")]
    pub chain: String,
    #[serde(default = "default_rpc_password", deserialize_with = "scalar_string")]
    pub rpcpassword: String,
    #[serde(rename = "ZMQBlockPort", default = "default_zmq_block_port")]
    pub zmq_block_port: u16,
    #[serde(rename = "ZMQTxPort", default = "default_zmq_tx_port")]
    pub zmq_tx_port: u16,
    /// Per-chain maps (`regtest: {RPCPort: ...}`) and anything else
    #[serde(flatten)]
    pub chains: BTreeMap<String, Value>,
}

/// Text of a scalar value as a template would print it
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn scalar_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    scalar_text(&value)
        .ok_or_else(|| D::Error::custom(format!("expected a scalar, found {:?}", value)))
}

fn default_rpc_password() -> String {
    DEFAULT_RPC_PASSWORD.to_string()
}

fn default_zmq_block_port() -> u16 {
    ZMQ_BLOCK_PORT
}

fn default_zmq_tx_port() -> u16 {
    ZMQ_TX_PORT
}

impl GlobalValues {
    /// `global.<chain>.RPCPort` for the configured chain
    pub fn rpc_port(&self) -> WarnetResult<u64> {
        self.chains
            .get(&self.chain)
            .and_then(|c| c.get("RPCPort"))
            .and_then(|p| match p {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
            .ok_or_else(|| {
                WarnetError::InvalidValues(format!("global.{}.RPCPort is not set", self.chain))
            })
    }
}

/// The lnd chart values used by its ConfigMap template
#[derive(Debug, Clone, Deserialize)]
pub struct LndValues {
    pub global: GlobalValues,
    #[serde(rename = "baseConfig", default)]
    pub base_config: String,
    #[serde(rename = "defaultConfig", default)]
    pub default_config: String,
    #[serde(default)]
    pub config: String,
    #[serde(default = "empty_sequence")]
    pub channels: Value,
}

fn empty_sequence() -> Value {
    Value::Sequence(Vec::new())
}

impl LndValues {
    pub fn from_value(value: Value) -> WarnetResult<Self> {
        serde_yaml::from_value(value).map_err(|e| WarnetError::InvalidValues(e.to_string()))
    }

    pub fn from_yaml(raw: &str) -> WarnetResult<Self> {
        Self::from_value(serde_yaml::from_str(raw)?)
    }

    /// Chart defaults with each overlay merged on top, in order
    pub fn with_overlays<'a, I>(overlays: I) -> WarnetResult<Self>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut merged: Value = serde_yaml::from_str(DEFAULT_LND_VALUES)?;
        for overlay in overlays {
            merged = merge_values(merged, overlay.clone());
        }
        Self::from_value(merged)
    }
}

/// Deep merge `overlay` into `base` the way helm layers values files.
///
/// Mappings merge key by key; anything else in `overlay` replaces the base
/// value. A null overlay leaves the base untouched.
pub fn merge_values(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(base), Value::Mapping(overlay)) => Value::Mapping(merge_mappings(base, overlay)),
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

fn merge_mappings(mut base: Mapping, overlay: Mapping) -> Mapping {
    for (key, value) in overlay {
        match base.get_mut(&key) {
            Some(existing) => {
                let current = std::mem::replace(existing, Value::Null);
                *existing = merge_values(current, value);
            }
            None => {
                base.insert(key, value);
            }
        }
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(raw: &str) -> Value {
        serde_yaml::from_str(raw).unwrap()
    }

    #[test]
    fn test_defaults_parse() {
        let values = LndValues::from_yaml(DEFAULT_LND_VALUES).unwrap();
        assert_eq!(values.global.chain, "regtest");
        assert_eq!(values.global.rpc_port().unwrap(), 18443);
        assert_eq!(values.global.zmq_block_port, 28332);
        assert!(values.base_config.contains("bitcoin.node=bitcoind"));
        assert_eq!(values.channels, Value::Sequence(vec![]));
    }

    #[test]
    fn test_merge_nested() {
        let base = yaml("global: {chain: regtest, regtest: {RPCPort: 18443}}\nconfig: a");
        let overlay = yaml("global: {chain: signet, signet: {RPCPort: 38332}}");
        let merged = merge_values(base, overlay);
        assert_eq!(merged["global"]["chain"], yaml("signet"));
        assert_eq!(merged["global"]["regtest"]["RPCPort"], yaml("18443"));
        assert_eq!(merged["global"]["signet"]["RPCPort"], yaml("38332"));
        assert_eq!(merged["config"], yaml("a"));
    }

    #[test]
    fn test_merge_replaces_sequences_and_ignores_null() {
        let base = yaml("channels: [1, 2, 3]\nconfig: keep");
        let merged = merge_values(base, yaml("channels: [4]\nconfig: ~"));
        assert_eq!(merged["channels"], yaml("[4]"));
        assert_eq!(merged["config"], yaml("keep"));
    }

    #[test]
    fn test_with_overlays() {
        let overlay = yaml("global: {chain: signet}\nconfig: color=#000000");
        let values = LndValues::with_overlays([&overlay]).unwrap();
        assert_eq!(values.global.chain, "signet");
        assert_eq!(values.global.rpc_port().unwrap(), 38332);
        assert_eq!(values.config, "color=#000000");
    }

    #[test]
    fn test_missing_rpc_port() {
        let values = LndValues::from_yaml("global: {chain: regtest}").unwrap();
        assert!(matches!(
            values.global.rpc_port(),
            Err(WarnetError::InvalidValues(_))
        ));
    }

    #[test]
    fn test_scalar_passwords() {
        let numeric = yaml("global: {rpcpassword: 12345}");
        let values = LndValues::with_overlays([&numeric]).unwrap();
        assert_eq!(values.global.rpcpassword, "12345");

        let boolean = yaml("global: {rpcpassword: true}");
        let values = LndValues::with_overlays([&boolean]).unwrap();
        assert_eq!(values.global.rpcpassword, "true");

        let nested = yaml("global: {rpcpassword: [a]}");
        assert!(LndValues::with_overlays([&nested]).is_err());
    }

    #[test]
    fn test_chain_is_required() {
        assert!(LndValues::from_yaml("config: x").is_err());
    }
}
