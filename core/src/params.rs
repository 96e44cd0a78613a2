//! Consensus parameters per network

use crate::constants::COIN;
use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
    Regtest,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
            Network::Regtest => write!(f, "regtest"),
        }
    }
}

impl FromStr for Network {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "main" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            "regtest" => Ok(Network::Regtest),
            other => Err(CoreError::Serialization(format!("unknown network: {}", other))),
        }
    }
}

/// Every tnode and sigma threshold lives here, counted in blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusParams {
    pub network: Network,

    /// Seconds between blocks, used for logical block time
    pub target_spacing: i64,
    pub block_subsidy: u64,
    pub coinbase_maturity: u64,

    /// Minimum collateral output amount
    pub tnode_collateral: u64,
    pub tnode_min_confirmations: u64,
    /// Blocks a new tnode must keep pinging before it is enabled
    pub tnode_enable_blocks: u64,
    pub tnode_ping_interval: u64,
    pub tnode_expiration_blocks: u64,
    pub tnode_new_start_required_blocks: u64,
    /// How far ahead of the tip a payee slot is fixed
    pub tnode_payment_lookahead: u64,
    /// Minimum distance between two scheduled slots
    pub tnode_payment_cadence: u64,
    pub tnode_payments_start_height: u64,
    pub tnode_reward_percent: u64,

    pub sigma_start_height: u64,
}

impl ConsensusParams {
    pub fn mainnet() -> Self {
        Self {
            network: Network::Mainnet,
            target_spacing: 150,
            block_subsidy: 50 * COIN,
            coinbase_maturity: 100,
            tnode_collateral: 1000 * COIN,
            tnode_min_confirmations: 15,
            tnode_enable_blocks: 4,
            tnode_ping_interval: 4,
            tnode_expiration_blocks: 26,
            tnode_new_start_required_blocks: 72,
            tnode_payment_lookahead: 5,
            tnode_payment_cadence: 1,
            tnode_payments_start_height: 1,
            tnode_reward_percent: 30,
            sigma_start_height: 100_000,
        }
    }

    pub fn testnet() -> Self {
        Self {
            network: Network::Testnet,
            tnode_min_confirmations: 1,
            sigma_start_height: 1_000,
            ..Self::mainnet()
        }
    }

    pub fn regtest() -> Self {
        Self {
            network: Network::Regtest,
            tnode_min_confirmations: 1,
            tnode_enable_blocks: 1,
            tnode_ping_interval: 1,
            tnode_expiration_blocks: 5,
            tnode_new_start_required_blocks: 10,
            tnode_payment_cadence: 6,
            sigma_start_height: 500,
            ..Self::mainnet()
        }
    }

    pub fn for_network(network: Network) -> Self {
        match network {
            Network::Mainnet => Self::mainnet(),
            Network::Testnet => Self::testnet(),
            Network::Regtest => Self::regtest(),
        }
    }

    /// Apply a partial set of overrides (for example a `[consensus]` config table)
    pub fn with_overrides(self, overrides: serde_json::Value) -> Result<Self> {
        let mut base = serde_json::to_value(&self).map_err(|e| CoreError::Serialization(e.to_string()))?;
        if let (Some(base_map), serde_json::Value::Object(extra)) = (base.as_object_mut(), overrides) {
            for (key, value) in extra {
                if !base_map.contains_key(&key) {
                    return Err(CoreError::Serialization(format!("unknown consensus parameter: {}", key)));
                }
                base_map.insert(key, value);
            }
        }
        let params: Self = serde_json::from_value(base).map_err(|e| CoreError::Serialization(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    /// Reject parameter sets the reward split and scheduler cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.tnode_reward_percent > 100 {
            return Err(CoreError::InvalidParams(format!(
                "tnode_reward_percent {} exceeds 100",
                self.tnode_reward_percent
            )));
        }
        if self.tnode_payment_cadence == 0 {
            return Err(CoreError::InvalidParams("tnode_payment_cadence must be positive".into()));
        }
        Ok(())
    }

    /// Tnode part of `reward`; never more than `reward`
    pub fn tnode_share(&self, reward: u64) -> u64 {
        let percent = u128::from(self.tnode_reward_percent.min(100));
        u64::try_from(u128::from(reward) * percent / 100).unwrap_or(reward)
    }
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self::mainnet()
    }
}
