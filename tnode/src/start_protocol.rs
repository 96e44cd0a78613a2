//! Tnode start protocol
//!
//! Turns a tnode.conf entry into a signed broadcast and keeps the running
//! tnode pinging.

use crate::collateral::Collateral;
use crate::config::TnodeConfigEntry;
use crate::error::{Result, TnodeError};
use tecra_core::{ConsensusParams, OutPoint, TnodeBroadcast, TnodePing, UtxoView};
use tecra_crypto::KeyPair;

/// Fresh tnode private key, hex encoded (`tnode genkey`)
pub fn generate_privkey() -> String {
    KeyPair::generate().private_key_hex()
}

/// A tnode started by this node
#[derive(Debug, Clone)]
pub struct ActiveTnode {
    pub alias: String,
    pub collateral: OutPoint,
    key: KeyPair,
    pub started_height: u64,
    pub last_ping_height: Option<u64>,
}

impl ActiveTnode {
    /// Check the collateral and sign a broadcast for `entry` at `height`
    pub fn start(
        entry: &TnodeConfigEntry,
        view: &impl UtxoView,
        params: &ConsensusParams,
        height: u64,
    ) -> Result<(Self, TnodeBroadcast)> {
        let key = KeyPair::from_private_key_hex(&entry.tnode_privkey).map_err(|_| TnodeError::InvalidPrivateKey)?;
        let collateral = entry.collateral();

        // Registration happens in the next block
        Collateral::verify(&collateral, view, params)?;

        let mut broadcast =
            TnodeBroadcast::new(collateral.clone(), entry.ip_port.clone(), key.public_key_hex(), height);
        broadcast.sign(&key);

        log::info!("🚀 Starting tnode {} with collateral {}", entry.alias, collateral);

        Ok((
            Self {
                alias: entry.alias.clone(),
                collateral,
                key,
                started_height: height,
                last_ping_height: None,
            },
            broadcast,
        ))
    }

    pub fn public_key_hex(&self) -> String {
        self.key.public_key_hex()
    }

    pub fn ping_due(&self, height: u64, interval: u64) -> bool {
        match self.last_ping_height {
            Some(last) => height >= last + interval,
            None => true,
        }
    }

    /// Signed ping for the block at `height`
    pub fn ping(&mut self, height: u64) -> TnodePing {
        let mut ping = TnodePing::new(self.collateral.clone(), height);
        ping.sign(&self.key);
        self.last_ping_height = Some(height);
        ping
    }
}
