//! tecrad configuration
//!
//! ```toml
//! [node]
//! network = "regtest"
//! rpc_bind = "127.0.0.1:24102"
//! data_dir = "/var/lib/tecra"
//! tnode_conf = "/var/lib/tecra/tnode.conf"
//!
//! [consensus]
//! sigma_start_height = 10
//! ```

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tecra_core::{ConsensusParams, Network};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid RPC bind address {0}")]
    Bind(String),

    #[error("Invalid consensus override: {0}")]
    Consensus(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSection {
    #[serde(default)]
    pub network: Network,
    pub rpc_bind: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub tnode_conf: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub node: NodeSection,
    /// Per-field overrides of the network's consensus parameters
    #[serde(default)]
    pub consensus: toml::Table,
}

impl NodeConfig {
    /// Load `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("Config file {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn network(&self) -> Network {
        self.node.network
    }

    pub fn rpc_addr(&self) -> Result<SocketAddr, ConfigError> {
        let bind = self
            .node
            .rpc_bind
            .clone()
            .unwrap_or_else(|| default_rpc_bind(self.node.network).to_string());
        bind.parse().map_err(|_| ConfigError::Bind(bind))
    }

    /// Explicit `tnode_conf`, else `tnode.conf` inside the data dir
    pub fn tnode_conf_path(&self) -> Option<PathBuf> {
        self.node
            .tnode_conf
            .clone()
            .or_else(|| self.node.data_dir.as_ref().map(|dir| dir.join("tnode.conf")))
    }

    pub fn consensus_params(&self) -> Result<ConsensusParams, ConfigError> {
        let base = ConsensusParams::for_network(self.node.network);
        if self.consensus.is_empty() {
            return Ok(base);
        }
        let overrides = serde_json::to_value(&self.consensus).map_err(|e| ConfigError::Consensus(e.to_string()))?;
        base.with_overrides(overrides)
            .map_err(|e| ConfigError::Consensus(e.to_string()))
    }
}

pub fn default_rpc_bind(network: Network) -> &'static str {
    match network {
        Network::Mainnet => "127.0.0.1:24101",
        Network::Testnet => "127.0.0.1:24100",
        Network::Regtest => "127.0.0.1:24102",
    }
}
