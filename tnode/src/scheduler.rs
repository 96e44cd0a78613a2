//! Deterministic tnode payment rotation
//!
//! The queue is ordered by `(last_paid_block, collateral outpoint)`, so
//! never-paid tnodes come first and a freshly paid tnode moves to the tail.
//! The scheduler fixes the payee of block `H + lookahead` after block `H`
//! is connected, leaving at least `cadence` blocks between two slots.

use crate::registry::TnodeRegistry;
use crate::types::{TnodeEntry, TnodeId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tecra_core::ConsensusParams;

#[derive(Debug, Clone, Default)]
pub struct PaymentQueue {
    order: BTreeSet<(u64, TnodeId)>,
}

impl PaymentQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from the registry; spent tnodes never return to the queue
    pub fn rebuild(&mut self, registry: &TnodeRegistry) {
        self.order = registry
            .iter()
            .filter(|entry| !entry.status.is_terminal())
            .map(TnodeEntry::rotation_key)
            .collect();
    }

    /// Queue order, front first
    pub fn iter(&self) -> impl Iterator<Item = &TnodeId> {
        self.order.iter().map(|(_, id)| id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// First `count` enabled entries, skipping those no longer enabled
    pub fn next_payees<'a>(&self, count: usize, registry: &'a TnodeRegistry) -> Vec<&'a TnodeEntry> {
        self.iter()
            .filter_map(|id| registry.get(id))
            .filter(|entry| entry.is_enabled())
            .take(count)
            .collect()
    }

    /// Front-most enabled entry that is not in `exclude`
    pub fn first_enabled_except<'a>(
        &self,
        registry: &'a TnodeRegistry,
        exclude: &BTreeSet<&TnodeId>,
    ) -> Option<&'a TnodeEntry> {
        self.iter()
            .filter(|id| !exclude.contains(id))
            .filter_map(|id| registry.get(id))
            .find(|entry| entry.is_enabled())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentScheduler {
    slots: BTreeMap<u64, TnodeId>,
    last_target: Option<u64>,
}

impl PaymentScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot(&self, height: u64) -> Option<&TnodeId> {
        self.slots.get(&height)
    }

    pub fn last_target(&self) -> Option<u64> {
        self.last_target
    }

    /// Payees fixed for the heights in `from..=to`
    pub fn scheduled_between(&self, from: u64, to: u64) -> BTreeSet<&TnodeId> {
        if from > to {
            return BTreeSet::new();
        }
        self.slots.range(from..=to).map(|(_, id)| id).collect()
    }

    /// Earliest scheduled slot above `height`
    pub fn next_slot_after(&self, height: u64) -> Option<(u64, &TnodeId)> {
        self.slots
            .range(height.saturating_add(1)..)
            .next()
            .map(|(h, id)| (*h, id))
    }

    /// Fix the payee of `tip + lookahead`, if due. Returns the new slot.
    pub fn schedule_after(
        &mut self,
        tip: u64,
        queue: &PaymentQueue,
        registry: &TnodeRegistry,
        params: &ConsensusParams,
    ) -> Option<(u64, TnodeId)> {
        let target = tip + params.tnode_payment_lookahead;
        if target < params.tnode_payments_start_height || self.slots.contains_key(&target) {
            return None;
        }
        if let Some(last) = self.last_target {
            if target < last + params.tnode_payment_cadence {
                return None;
            }
        }

        let window = self.scheduled_between(tip + 1, target);
        let payee = queue.first_enabled_except(registry, &window)?.id().clone();

        log::info!("📅 Tnode {} scheduled for block {}", payee, target);
        self.slots.insert(target, payee.clone());
        self.last_target = Some(target);
        Some((target, payee))
    }

    /// Undo a slot added by [`PaymentScheduler::schedule_after`]
    pub fn unschedule(&mut self, target: u64, previous_last_target: Option<u64>) {
        self.slots.remove(&target);
        self.last_target = previous_last_target;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::TnodeStatus;
    use tecra_core::constants::NULL_HASH;
    use tecra_core::{Block, OutPoint, TnodeBroadcast, TxOutput, UtxoSet, COIN};
    use tecra_crypto::KeyPair;

    /// Registry with `n` enabled tnodes registered at block 1
    fn enabled_registry(n: usize) -> (TnodeRegistry, Vec<OutPoint>) {
        let params = ConsensusParams::regtest();
        let outputs = (0..n).map(|i| TxOutput::new(format!("owner{}", i), 1000 * COIN)).collect();
        let block = Block::new(1, NULL_HASH.into(), "miner".into(), 150, outputs);
        let mut utxo = UtxoSet::new(0);
        utxo.apply_block(&block).unwrap();

        let mut registry = TnodeRegistry::new();
        let mut ids = Vec::new();
        for i in 0..n {
            let key = KeyPair::generate();
            let id = block.transactions[0].outpoint(i as u32);
            let mut broadcast = TnodeBroadcast::new(id.clone(), "127.0.0.1:1".into(), key.public_key_hex(), 1);
            broadcast.sign(&key);
            registry.register(&broadcast, &utxo, &params, 1).unwrap();
            registry.transition(&id, TnodeStatus::Enabled).unwrap();
            ids.push(id);
        }
        ids.sort();
        (registry, ids)
    }

    #[test]
    fn test_queue_orders_by_rank_then_outpoint() {
        let (mut registry, ids) = enabled_registry(3);
        registry.set_last_paid(&ids[0], 10).unwrap();

        let mut queue = PaymentQueue::new();
        queue.rebuild(&registry);
        let order: Vec<&TnodeId> = queue.iter().collect();

        assert_eq!(order, vec![&ids[1], &ids[2], &ids[0]]);
    }

    #[test]
    fn test_next_payees_skips_non_enabled() {
        let (mut registry, ids) = enabled_registry(3);
        let mut queue = PaymentQueue::new();
        queue.rebuild(&registry);
        registry.transition(&ids[0], TnodeStatus::Expired).unwrap();

        let payees: Vec<&TnodeId> = queue.next_payees(2, &registry).into_iter().map(|e| e.id()).collect();
        assert_eq!(payees, vec![&ids[1], &ids[2]]);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_spent_tnodes_leave_queue() {
        let (mut registry, ids) = enabled_registry(2);
        registry.transition(&ids[1], TnodeStatus::OutpointSpent).unwrap();

        let mut queue = PaymentQueue::new();
        queue.rebuild(&registry);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_cadence_spacing() {
        let params = ConsensusParams::regtest();
        let (registry, ids) = enabled_registry(3);
        let mut queue = PaymentQueue::new();
        queue.rebuild(&registry);
        let mut scheduler = PaymentScheduler::new();

        let mut slots = Vec::new();
        for tip in 10..30 {
            if let Some(slot) = scheduler.schedule_after(tip, &queue, &registry, &params) {
                slots.push(slot);
            }
        }

        // Nobody is paid here, so the rotation keys stay put and only the
        // window exclusion varies the payee.
        assert_eq!(slots[0], (15, ids[0].clone()));
        assert_eq!(slots[1], (21, ids[0].clone()));
        assert_eq!(slots.iter().map(|(h, _)| *h).collect::<Vec<_>>(), vec![15, 21, 27, 33]);
    }

    #[test]
    fn test_window_excludes_scheduled_payee() {
        let mut params = ConsensusParams::regtest();
        params.tnode_payment_cadence = 1;
        let (registry, ids) = enabled_registry(2);
        let mut queue = PaymentQueue::new();
        queue.rebuild(&registry);
        let mut scheduler = PaymentScheduler::new();

        assert_eq!(scheduler.schedule_after(1, &queue, &registry, &params), Some((6, ids[0].clone())));
        assert_eq!(scheduler.schedule_after(2, &queue, &registry, &params), Some((7, ids[1].clone())));
        // Both are already in the window
        assert_eq!(scheduler.schedule_after(3, &queue, &registry, &params), None);
    }

    #[test]
    fn test_unschedule() {
        let params = ConsensusParams::regtest();
        let (registry, _) = enabled_registry(1);
        let mut queue = PaymentQueue::new();
        queue.rebuild(&registry);
        let mut scheduler = PaymentScheduler::new();

        let (target, _) = scheduler.schedule_after(1, &queue, &registry, &params).unwrap();
        scheduler.unschedule(target, None);
        assert!(scheduler.slot(target).is_none());
        assert_eq!(scheduler.last_target(), None);
    }
}
