//! Tnode block reward distribution

use crate::error::{Result, TnodeError};
use crate::registry::TnodeRegistry;
use crate::scheduler::{PaymentQueue, PaymentScheduler};
use crate::types::{TnodeEntry, TnodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tecra_core::{Block, ConsensusParams};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payee {
    pub id: TnodeId,
    pub address: String,
}

/// How the reward of one block is split
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    pub height: u64,
    pub reward: u64,
    pub miner_share: u64,
    pub tnode_share: u64,
    pub payee: Option<Payee>,
}

impl Distribution {
    /// Whole reward to the miner
    pub fn miner_only(height: u64, reward: u64) -> Self {
        Self {
            height,
            reward,
            miner_share: reward,
            tnode_share: 0,
            payee: None,
        }
    }

    fn to_payee(height: u64, reward: u64, entry: &TnodeEntry, params: &ConsensusParams) -> Self {
        let tnode_share = params.tnode_share(reward);
        Self {
            height,
            reward,
            miner_share: reward.saturating_sub(tnode_share),
            tnode_share,
            payee: Some(Payee {
                id: entry.id().clone(),
                address: entry.payout_address().to_string(),
            }),
        }
    }

    /// Check that `block`'s coinbase carries the tnode payment
    pub fn check_coinbase(&self, block: &Block) -> Result<()> {
        let Some(payee) = &self.payee else {
            return Ok(());
        };
        let paid = block
            .coinbase()
            .map(|cb| {
                cb.outputs
                    .iter()
                    .any(|o| o.address == payee.address && o.amount == self.tnode_share)
            })
            .unwrap_or(false);
        if paid {
            Ok(())
        } else {
            Err(TnodeError::UnexpectedPayee {
                height: self.height,
                payee: payee.address.clone(),
                expected: self.tnode_share,
            })
        }
    }
}

/// Keeps one distribution per height; the highest recorded height is the watermark.
#[derive(Debug, Clone, Default)]
pub struct RewardDistributor {
    history: BTreeMap<u64, Distribution>,
}

impl RewardDistributor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Work out the split of block `height` without recording it.
    ///
    /// Registry and scheduler must reflect the chain up to `height - 1`.
    pub fn compute(
        &self,
        height: u64,
        reward: u64,
        registry: &TnodeRegistry,
        queue: &PaymentQueue,
        scheduler: &PaymentScheduler,
        params: &ConsensusParams,
    ) -> Result<Distribution> {
        if let Some(recorded) = self.history.get(&height) {
            return Ok(recorded.clone());
        }
        if height < params.tnode_payments_start_height {
            return Ok(Distribution::miner_only(height, reward));
        }

        let entry = match scheduler.slot(height) {
            Some(id) if registry.is_enabled(id) => registry.get(id),
            Some(_) => {
                let later = scheduler.scheduled_between(height + 1, height + params.tnode_payment_lookahead);
                queue.first_enabled_except(registry, &later)
            }
            None if registry.enabled_count() == 0 => None,
            None => return Ok(Distribution::miner_only(height, reward)),
        };

        entry
            .map(|entry| Distribution::to_payee(height, reward, entry, params))
            .ok_or(TnodeError::NoEligiblePayee { height })
    }

    /// Distribute the reward of block `height` and move the payee to the tail.
    ///
    /// Re-processing a recorded height returns the recorded split.
    pub fn distribute(
        &mut self,
        height: u64,
        reward: u64,
        registry: &mut TnodeRegistry,
        queue: &PaymentQueue,
        scheduler: &PaymentScheduler,
        params: &ConsensusParams,
    ) -> Result<Distribution> {
        if let Some(recorded) = self.history.get(&height) {
            log::debug!("Block {} reward already distributed", height);
            return Ok(recorded.clone());
        }

        let distribution = self.compute(height, reward, registry, queue, scheduler, params)?;
        if let Some(payee) = &distribution.payee {
            registry.set_last_paid(&payee.id, height)?;
            log::info!(
                "💰 Tnode {} paid {} at block {} ({})",
                payee.id,
                distribution.tnode_share,
                height,
                payee.address
            );
        }
        Ok(self.record(distribution))
    }

    pub fn record(&mut self, distribution: Distribution) -> Distribution {
        self.history.insert(distribution.height, distribution.clone());
        distribution
    }

    pub fn get(&self, height: u64) -> Option<&Distribution> {
        self.history.get(&height)
    }

    pub fn watermark(&self) -> Option<u64> {
        self.history.keys().next_back().copied()
    }

    pub fn forget(&mut self, height: u64) -> Option<Distribution> {
        self.history.remove(&height)
    }

    /// Total paid to each tnode over the recorded history
    pub fn totals(&self) -> BTreeMap<TnodeId, u64> {
        let mut totals = BTreeMap::new();
        for distribution in self.history.values() {
            if let Some(payee) = &distribution.payee {
                *totals.entry(payee.id.clone()).or_insert(0) += distribution.tnode_share;
            }
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::TnodeStatus;
    use tecra_core::constants::NULL_HASH;
    use tecra_core::{OutPoint, TnodeBroadcast, TxOutput, UtxoSet, COIN};
    use tecra_crypto::KeyPair;

    fn registry_with(n: usize) -> (TnodeRegistry, Vec<OutPoint>) {
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
    fn test_empty_queue_has_no_payee() {
        let params = ConsensusParams::regtest();
        let registry = TnodeRegistry::new();
        let distributor = RewardDistributor::new();

        let result = distributor.compute(
            10,
            50 * COIN,
            &registry,
            &PaymentQueue::new(),
            &PaymentScheduler::new(),
            &params,
        );
        assert_eq!(result, Err(TnodeError::NoEligiblePayee { height: 10 }));
    }

    #[test]
    fn test_no_enabled_tnode_has_no_payee() {
        let params = ConsensusParams::regtest();
        let (mut registry, ids) = registry_with(2);
        for id in &ids {
            registry.transition(id, TnodeStatus::Expired).unwrap();
        }
        let mut queue = PaymentQueue::new();
        queue.rebuild(&registry);
        assert!(!queue.is_empty());

        let result =
            RewardDistributor::new().compute(10, 50 * COIN, &registry, &queue, &PaymentScheduler::new(), &params);
        assert_eq!(result, Err(TnodeError::NoEligiblePayee { height: 10 }));
    }

    #[test]
    fn test_unscheduled_block_goes_to_miner() {
        let params = ConsensusParams::regtest();
        let (registry, _) = registry_with(2);
        let mut queue = PaymentQueue::new();
        queue.rebuild(&registry);

        let distribution = RewardDistributor::new()
            .compute(10, 50 * COIN, &registry, &queue, &PaymentScheduler::new(), &params)
            .unwrap();
        assert_eq!(distribution, Distribution::miner_only(10, 50 * COIN));
    }

    #[test]
    fn test_scheduled_payee_paid_and_moved_to_tail() {
        let params = ConsensusParams::regtest();
        let (mut registry, ids) = registry_with(2);
        let mut queue = PaymentQueue::new();
        queue.rebuild(&registry);
        let mut scheduler = PaymentScheduler::new();
        let (target, payee) = scheduler.schedule_after(4, &queue, &registry, &params).unwrap();
        assert_eq!(payee, ids[0]);

        let mut distributor = RewardDistributor::new();
        let distribution = distributor
            .distribute(target, 50 * COIN, &mut registry, &queue, &scheduler, &params)
            .unwrap();

        assert_eq!(distribution.tnode_share, 15 * COIN);
        assert_eq!(distribution.miner_share, 35 * COIN);
        assert_eq!(distribution.payee.as_ref().unwrap().address, "owner0");
        assert_eq!(registry.get(&ids[0]).unwrap().last_paid_block, target);

        queue.rebuild(&registry);
        assert_eq!(queue.iter().next(), Some(&ids[1]));
    }

    #[test]
    fn test_distribution_is_idempotent() {
        let params = ConsensusParams::regtest();
        let (mut registry, ids) = registry_with(2);
        let mut queue = PaymentQueue::new();
        queue.rebuild(&registry);
        let mut scheduler = PaymentScheduler::new();
        let (target, _) = scheduler.schedule_after(4, &queue, &registry, &params).unwrap();

        let mut distributor = RewardDistributor::new();
        let first = distributor
            .distribute(target, 50 * COIN, &mut registry, &queue, &scheduler, &params)
            .unwrap();
        queue.rebuild(&registry);
        let second = distributor
            .distribute(target, 50 * COIN, &mut registry, &queue, &scheduler, &params)
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(distributor.totals().get(&ids[0]), Some(&(15 * COIN)));
        assert_eq!(distributor.watermark(), Some(target));
    }

    #[test]
    fn test_fallback_when_scheduled_payee_disabled() {
        let params = ConsensusParams::regtest();
        let (mut registry, ids) = registry_with(2);
        let mut queue = PaymentQueue::new();
        queue.rebuild(&registry);
        let mut scheduler = PaymentScheduler::new();
        let (target, _) = scheduler.schedule_after(4, &queue, &registry, &params).unwrap();
        registry.transition(&ids[0], TnodeStatus::OutpointSpent).unwrap();
        queue.rebuild(&registry);

        let distribution = RewardDistributor::new()
            .compute(target, 50 * COIN, &registry, &queue, &scheduler, &params)
            .unwrap();
        assert_eq!(distribution.payee.unwrap().id, ids[1]);
    }

    #[test]
    fn test_check_coinbase() {
        let distribution = Distribution {
            height: 3,
            reward: 50 * COIN,
            miner_share: 35 * COIN,
            tnode_share: 15 * COIN,
            payee: Some(Payee {
                id: OutPoint::new("aa", 0),
                address: "owner".into(),
            }),
        };
        let good = Block::new(
            3,
            NULL_HASH.into(),
            "miner".into(),
            150,
            vec![TxOutput::new("miner", 35 * COIN), TxOutput::new("owner", 15 * COIN)],
        );
        let bad = Block::new(3, NULL_HASH.into(), "miner".into(), 150, vec![TxOutput::new("miner", 50 * COIN)]);

        assert!(distribution.check_coinbase(&good).is_ok());
        assert!(matches!(
            distribution.check_coinbase(&bad),
            Err(TnodeError::UnexpectedPayee { .. })
        ));
        assert!(Distribution::miner_only(3, 50 * COIN).check_coinbase(&bad).is_ok());
    }
}
