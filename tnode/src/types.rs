//! Tnode type definitions

use crate::collateral::Collateral;
use crate::status::TnodeStatus;
use serde::{Deserialize, Serialize};
use tecra_core::{OutPoint, TnodeBroadcast};

/// Tnodes are identified by their collateral outpoint
pub type TnodeId = OutPoint;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TnodeEntry {
    pub collateral: Collateral,
    pub addr: String,
    pub tnode_pubkey: String,
    pub status: TnodeStatus,
    pub registered_height: u64,
    pub last_seen_block: u64,
    /// Height of the last payment, 0 if never paid
    pub last_paid_block: u64,
}

impl TnodeEntry {
    pub fn new(collateral: Collateral, broadcast: &TnodeBroadcast, height: u64) -> Self {
        Self {
            collateral,
            addr: broadcast.addr.clone(),
            tnode_pubkey: broadcast.tnode_pubkey.clone(),
            status: TnodeStatus::New,
            registered_height: height,
            last_seen_block: height,
            last_paid_block: 0,
        }
    }

    pub fn id(&self) -> &TnodeId {
        &self.collateral.outpoint
    }

    /// Address the tnode share of the block reward goes to
    pub fn payout_address(&self) -> &str {
        &self.collateral.address
    }

    pub fn is_enabled(&self) -> bool {
        self.status == TnodeStatus::Enabled
    }

    /// Blocks since the last ping, seen from `height`
    pub fn silence(&self, height: u64) -> u64 {
        height.saturating_sub(self.last_seen_block)
    }

    /// Payment queue key
    pub fn rotation_key(&self) -> (u64, OutPoint) {
        (self.last_paid_block, self.collateral.outpoint.clone())
    }
}
