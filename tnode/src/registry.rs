//! Tnode registry for tracking all tnodes

use crate::collateral::Collateral;
use crate::error::{Result, TnodeError};
use crate::status::TnodeStatus;
use crate::types::{TnodeEntry, TnodeId};
use std::collections::BTreeMap;
use tecra_core::{ConsensusParams, TnodeBroadcast, TnodePing, UtxoView};

/// A status change applied during a block check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub id: TnodeId,
    pub from: TnodeStatus,
    pub to: TnodeStatus,
}

#[derive(Debug, Clone, Default)]
pub struct TnodeRegistry {
    entries: BTreeMap<TnodeId, TnodeEntry>,
}

impl TnodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the tnode announced by `broadcast` at `height`.
    ///
    /// An existing entry may only be restarted from NEW_START_REQUIRED or
    /// EXPIRED; it keeps its payment rank.
    pub fn register(
        &mut self,
        broadcast: &TnodeBroadcast,
        view: &impl UtxoView,
        params: &ConsensusParams,
        height: u64,
    ) -> Result<&TnodeEntry> {
        broadcast
            .verify()
            .map_err(|_| TnodeError::InvalidSignature(broadcast.collateral.clone()))?;

        let collateral = Collateral::verify(&broadcast.collateral, view, params)?;
        let id = collateral.outpoint.clone();

        let mut entry = TnodeEntry::new(collateral, broadcast, height);
        if let Some(existing) = self.entries.get(&id) {
            if !existing.status.accepts_restart() {
                return Err(TnodeError::AlreadyRegistered(id));
            }
            entry.last_paid_block = existing.last_paid_block;
            log::info!(
                "🔄 Tnode {} restarted from {} at block {}",
                id,
                existing.status,
                height
            );
        } else {
            log::info!("✅ Tnode {} registered at block {} ({})", id, height, entry.addr);
        }

        self.entries.insert(id.clone(), entry);
        self.get(&id).ok_or_else(|| TnodeError::NotFound(id.to_string()))
    }

    /// Apply a ping carried by the block at `height`
    pub fn record_ping(&mut self, ping: &TnodePing, height: u64) -> Result<()> {
        let entry = self
            .entries
            .get_mut(&ping.collateral)
            .ok_or_else(|| TnodeError::NotFound(ping.collateral.to_string()))?;

        ping.verify(&entry.tnode_pubkey)
            .map_err(|_| TnodeError::InvalidSignature(ping.collateral.clone()))?;

        match entry.status {
            TnodeStatus::OutpointSpent | TnodeStatus::NewStartRequired => {
                log::debug!("Ignoring ping from {} tnode {}", entry.status, ping.collateral);
            }
            _ => entry.last_seen_block = height,
        }
        Ok(())
    }

    /// Move `id` to `to`, rejecting transitions outside the table
    pub fn transition(&mut self, id: &TnodeId, to: TnodeStatus) -> Result<()> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| TnodeError::NotFound(id.to_string()))?;

        if !entry.status.can_transition_to(to) {
            return Err(TnodeError::InvalidTransition { from: entry.status, to });
        }
        entry.status = to;
        Ok(())
    }

    /// Run liveness and collateral checks for every live entry at `height`
    pub fn check_block(&mut self, height: u64, view: &impl UtxoView, params: &ConsensusParams) -> Vec<StatusChange> {
        let planned: Vec<(TnodeId, TnodeStatus, TnodeStatus)> = self
            .entries
            .values()
            .filter_map(|entry| {
                next_status(entry, height, view, params).map(|to| (entry.id().clone(), entry.status, to))
            })
            .collect();

        let mut changes = Vec::with_capacity(planned.len());
        for (id, from, to) in planned {
            match self.transition(&id, to) {
                Ok(()) => {
                    log::info!("Tnode {} {} -> {} at block {}", id, from, to, height);
                    changes.push(StatusChange { id, from, to });
                }
                Err(e) => log::warn!("Tnode {}: {}", id, e),
            }
        }
        changes
    }

    pub fn set_last_paid(&mut self, id: &TnodeId, height: u64) -> Result<()> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| TnodeError::NotFound(id.to_string()))?;
        entry.last_paid_block = height;
        Ok(())
    }

    pub fn get(&self, id: &TnodeId) -> Option<&TnodeEntry> {
        self.entries.get(id)
    }

    pub fn status(&self, id: &TnodeId) -> Result<TnodeStatus> {
        self.get(id)
            .map(|entry| entry.status)
            .ok_or_else(|| TnodeError::NotFound(id.to_string()))
    }

    pub fn is_enabled(&self, id: &TnodeId) -> bool {
        self.get(id).map(TnodeEntry::is_enabled).unwrap_or(false)
    }

    pub fn entries(&self) -> &BTreeMap<TnodeId, TnodeEntry> {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &TnodeEntry> {
        self.entries.values()
    }

    /// Put back an entry as it was before a block, or remove it if it did not exist
    pub fn restore(&mut self, id: TnodeId, entry: Option<TnodeEntry>) {
        match entry {
            Some(entry) => {
                self.entries.insert(id, entry);
            }
            None => {
                self.entries.remove(&id);
            }
        }
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn count_with_status(&self, status: TnodeStatus) -> usize {
        self.entries.values().filter(|e| e.status == status).count()
    }

    pub fn enabled_count(&self) -> usize {
        self.count_with_status(TnodeStatus::Enabled)
    }
}

fn next_status(entry: &TnodeEntry, height: u64, view: &impl UtxoView, params: &ConsensusParams) -> Option<TnodeStatus> {
    if entry.status.is_terminal() {
        return None;
    }
    if !view.is_unspent(entry.id()) {
        return Some(TnodeStatus::OutpointSpent);
    }

    let silence = entry.silence(height);
    let next = match entry.status {
        TnodeStatus::NewStartRequired | TnodeStatus::OutpointSpent => return None,
        _ if silence > params.tnode_new_start_required_blocks => TnodeStatus::NewStartRequired,
        TnodeStatus::New if entry.last_seen_block >= entry.registered_height + params.tnode_enable_blocks => {
            TnodeStatus::Enabled
        }
        TnodeStatus::Enabled if silence > params.tnode_expiration_blocks => TnodeStatus::Expired,
        TnodeStatus::Expired if silence <= params.tnode_expiration_blocks => TnodeStatus::Enabled,
        _ => return None,
    };
    Some(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tecra_core::constants::NULL_HASH;
    use tecra_core::{Block, OutPoint, Transaction, TxOutput, UtxoSet, COIN};
    use tecra_crypto::KeyPair;

    struct Fixture {
        utxo: UtxoSet,
        params: ConsensusParams,
        collateral: OutPoint,
        key: KeyPair,
        tip: Block,
    }

    impl Fixture {
        fn new() -> Self {
            let mut utxo = UtxoSet::new(0);
            let b1 = Block::new(1, NULL_HASH.into(), "miner".into(), 150, vec![TxOutput::new("owner", 1000 * COIN)]);
            utxo.apply_block(&b1).unwrap();
            Self {
                utxo,
                params: ConsensusParams::regtest(),
                collateral: b1.transactions[0].outpoint(0),
                key: KeyPair::generate(),
                tip: b1,
            }
        }

        /// Connect an empty block, optionally spending the collateral
        fn advance(&mut self, spend: bool) -> u64 {
            let height = self.tip.height() + 1;
            let mut block = Block::new(height, self.tip.hash.clone(), "miner".into(), 150, Vec::new());
            if spend {
                block.add_transaction(Transaction::new(
                    vec![self.collateral.clone()],
                    vec![TxOutput::new("elsewhere", 1000 * COIN)],
                    None,
                    0,
                ));
            }
            self.utxo.apply_block(&block).unwrap();
            self.tip = block;
            height
        }

        fn broadcast(&self) -> TnodeBroadcast {
            let mut broadcast = TnodeBroadcast::new(
                self.collateral.clone(),
                "127.0.0.1:18168".into(),
                self.key.public_key_hex(),
                self.tip.height(),
            );
            broadcast.sign(&self.key);
            broadcast
        }

        fn ping(&self, height: u64) -> TnodePing {
            let mut ping = TnodePing::new(self.collateral.clone(), height);
            ping.sign(&self.key);
            ping
        }
    }

    #[test]
    fn test_register_tnode() {
        let fx = Fixture::new();
        let mut registry = TnodeRegistry::new();

        let entry = registry.register(&fx.broadcast(), &fx.utxo, &fx.params, 1).unwrap();
        assert_eq!(entry.status, TnodeStatus::New);
        assert_eq!(entry.payout_address(), "owner");
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_register_rejects_bad_signature() {
        let fx = Fixture::new();
        let mut registry = TnodeRegistry::new();
        let mut broadcast = fx.broadcast();
        broadcast.addr = "10.0.0.1:1".into();

        let result = registry.register(&broadcast, &fx.utxo, &fx.params, 1);
        assert!(matches!(result, Err(TnodeError::InvalidSignature(_))));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_duplicate_registration() {
        let fx = Fixture::new();
        let mut registry = TnodeRegistry::new();
        registry.register(&fx.broadcast(), &fx.utxo, &fx.params, 1).unwrap();

        let result = registry.register(&fx.broadcast(), &fx.utxo, &fx.params, 1);
        assert!(matches!(result, Err(TnodeError::AlreadyRegistered(_))));
    }

    #[test]
    fn test_enable_after_ping() {
        let mut fx = Fixture::new();
        let mut registry = TnodeRegistry::new();
        registry.register(&fx.broadcast(), &fx.utxo, &fx.params, 1).unwrap();
        assert!(registry.check_block(1, &fx.utxo, &fx.params).is_empty());

        let h = fx.advance(false);
        registry.record_ping(&fx.ping(h), h).unwrap();
        let changes = registry.check_block(h, &fx.utxo, &fx.params);

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].to, TnodeStatus::Enabled);
        assert!(registry.is_enabled(&fx.collateral));
    }

    #[test]
    fn test_spent_collateral() {
        let mut fx = Fixture::new();
        let mut registry = TnodeRegistry::new();
        registry.register(&fx.broadcast(), &fx.utxo, &fx.params, 1).unwrap();

        let h = fx.advance(true);
        registry.check_block(h, &fx.utxo, &fx.params);
        assert_eq!(registry.status(&fx.collateral).unwrap(), TnodeStatus::OutpointSpent);

        // Terminal
        let h = fx.advance(false);
        assert!(registry.check_block(h, &fx.utxo, &fx.params).is_empty());
    }

    #[test]
    fn test_expire_then_new_start_required_then_restart() {
        let mut fx = Fixture::new();
        let mut registry = TnodeRegistry::new();
        registry.register(&fx.broadcast(), &fx.utxo, &fx.params, 1).unwrap();
        let h = fx.advance(false);
        registry.record_ping(&fx.ping(h), h).unwrap();
        registry.check_block(h, &fx.utxo, &fx.params);
        registry.set_last_paid(&fx.collateral, h).unwrap();

        let mut seen = Vec::new();
        for _ in 0..fx.params.tnode_new_start_required_blocks + 1 {
            let h = fx.advance(false);
            for change in registry.check_block(h, &fx.utxo, &fx.params) {
                seen.push(change.to);
            }
        }
        assert_eq!(seen, vec![TnodeStatus::Expired, TnodeStatus::NewStartRequired]);

        let h = fx.advance(false);
        let entry = registry.register(&fx.broadcast(), &fx.utxo, &fx.params, h).unwrap();
        assert_eq!(entry.status, TnodeStatus::New);
        assert_eq!(entry.last_paid_block, 2);
    }

    #[test]
    fn test_transition_table_enforced() {
        let fx = Fixture::new();
        let mut registry = TnodeRegistry::new();
        registry.register(&fx.broadcast(), &fx.utxo, &fx.params, 1).unwrap();

        let result = registry.transition(&fx.collateral, TnodeStatus::Expired);
        assert!(matches!(result, Err(TnodeError::InvalidTransition { .. })));
        assert_eq!(registry.status(&fx.collateral).unwrap(), TnodeStatus::New);
    }

    #[test]
    fn test_restore() {
        let fx = Fixture::new();
        let mut registry = TnodeRegistry::new();
        registry.register(&fx.broadcast(), &fx.utxo, &fx.params, 1).unwrap();

        registry.restore(fx.collateral.clone(), None);
        assert_eq!(registry.count(), 0);
    }
}
