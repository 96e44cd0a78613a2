//! Tnode-related block messages

use crate::transaction::OutPoint;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tecra_crypto::{CryptoError, KeyPair};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TnodeMessage {
    Broadcast(TnodeBroadcast),
    Ping(TnodePing),
}

impl TnodeMessage {
    pub fn collateral(&self) -> &OutPoint {
        match self {
            TnodeMessage::Broadcast(b) => &b.collateral,
            TnodeMessage::Ping(p) => &p.collateral,
        }
    }
}

/// Announces a tnode backed by `collateral`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TnodeBroadcast {
    /// Collateral output locked for this tnode
    pub collateral: OutPoint,

    /// Service address (ip:port)
    pub addr: String,

    /// Hex public key of the tnode signing key
    pub tnode_pubkey: String,

    /// Height the broadcast was created at
    pub sig_height: u64,

    /// Signature over `message_hash` by the tnode key
    pub signature: Vec<u8>,
}

impl TnodeBroadcast {
    pub fn new(collateral: OutPoint, addr: String, tnode_pubkey: String, sig_height: u64) -> Self {
        Self {
            collateral,
            addr,
            tnode_pubkey,
            sig_height,
            signature: Vec::new(), // Set after signing
        }
    }

    pub fn message_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"tnode-broadcast");
        hasher.update(self.collateral.txid.as_bytes());
        hasher.update(self.collateral.vout.to_le_bytes());
        hasher.update(self.addr.as_bytes());
        hasher.update(self.tnode_pubkey.as_bytes());
        hasher.update(self.sig_height.to_le_bytes());
        hasher.finalize().into()
    }

    pub fn sign(&mut self, tnode_key: &KeyPair) {
        self.signature = tnode_key.sign(&self.message_hash());
    }

    /// Check the signature against the announced tnode key
    pub fn verify(&self) -> Result<(), CryptoError> {
        KeyPair::verify(&self.tnode_pubkey, &self.message_hash(), &self.signature)
    }
}

/// Liveness proof of a running tnode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TnodePing {
    pub collateral: OutPoint,
    pub block_height: u64,
    pub signature: Vec<u8>,
}

impl TnodePing {
    pub fn new(collateral: OutPoint, block_height: u64) -> Self {
        Self {
            collateral,
            block_height,
            signature: Vec::new(),
        }
    }

    pub fn message_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"tnode-ping");
        hasher.update(self.collateral.txid.as_bytes());
        hasher.update(self.collateral.vout.to_le_bytes());
        hasher.update(self.block_height.to_le_bytes());
        hasher.finalize().into()
    }

    pub fn sign(&mut self, tnode_key: &KeyPair) {
        self.signature = tnode_key.sign(&self.message_hash());
    }

    pub fn verify(&self, tnode_pubkey: &str) -> Result<(), CryptoError> {
        KeyPair::verify(tnode_pubkey, &self.message_hash(), &self.signature)
    }
}
