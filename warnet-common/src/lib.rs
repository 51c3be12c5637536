//! Common types shared between warnet-core and warnet-cli

pub mod constants;
pub mod network;

use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub use network::{ChannelId, ChannelSpec, NetworkSpec, NodeSpec};

/// Bitcoin chain a network runs on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    #[default]
    Regtest,
    Signet,
    Testnet,
    Main,
}

impl Chain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regtest => "regtest",
            Self::Signet => "signet",
            Self::Testnet => "testnet",
            Self::Main => "main",
        }
    }

    /// RPC port Bitcoin Core listens on by default for this chain
    pub fn default_rpc_port(&self) -> u16 {
        match self {
            Self::Regtest => 18443,
            Self::Signet => 38332,
            Self::Testnet => 18332,
            Self::Main => 8332,
        }
    }

    /// Chain selection flag for bitcoin-cli (empty for mainnet)
    pub fn cli_flag(&self) -> &'static str {
        match self {
            Self::Regtest => "-regtest",
            Self::Signet => "-signet",
            Self::Testnet => "-testnet",
            Self::Main => "",
        }
    }

    /// Subdirectory of the bitcoind datadir holding this chain's data
    pub fn data_subdir(&self) -> &'static str {
        match self {
            Self::Regtest => "regtest",
            Self::Signet => "signet",
            Self::Testnet => "testnet3",
            Self::Main => "",
        }
    }

    /// Network name as understood by `lncli --network`
    pub fn lnd_network(&self) -> &'static str {
        match self {
            Self::Main => "mainnet",
            other => other.as_str(),
        }
    }
}

impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "regtest" => Ok(Self::Regtest),
            "signet" => Ok(Self::Signet),
            "testnet" | "testnet3" => Ok(Self::Testnet),
            "main" | "mainnet" => Ok(Self::Main),
            other => Err(Error::UnknownChain(other.to_string())),
        }
    }
}

/// Errors raised while validating shared warnet types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unknown chain: {0}")]
    UnknownChain(String),

    #[error("Invalid node: {0}")]
    InvalidNode(String),

    #[error("Invalid channel: {0}")]
    InvalidChannel(String),

    #[error("Invalid network: {0}")]
    InvalidNetwork(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
