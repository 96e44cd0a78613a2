//! Block-driven tnode manager
//!
//! Connecting block `H` runs, in order: reward distribution for `H` on the
//! state left by `H - 1`, broadcasts and pings carried by `H`, liveness and
//! collateral checks, queue rebuild, and scheduling of slot `H + lookahead`.
//! Every step is recorded in a [`TnodeUndo`] so the block can be disconnected.

use crate::error::{Result, TnodeError};
use crate::registry::{StatusChange, TnodeRegistry};
use crate::rewards::{Distribution, RewardDistributor};
use crate::scheduler::{PaymentQueue, PaymentScheduler};
use crate::status::TnodeStatus;
use crate::types::{TnodeEntry, TnodeId};
use serde::{Deserialize, Serialize};
use tecra_core::{Block, ConsensusParams, TnodeMessage, UtxoView};

/// Everything needed to revert the tnode side of one block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TnodeUndo {
    pub height: u64,
    /// Entries as they were before the block; `None` for entries the block created
    pub entries: Vec<(TnodeId, Option<TnodeEntry>)>,
    pub scheduled: Option<u64>,
    pub previous_last_target: Option<u64>,
    pub distributed: bool,
}

/// Result of connecting one block
#[derive(Debug, Clone)]
pub struct BlockOutcome {
    pub distribution: Distribution,
    pub changes: Vec<StatusChange>,
    pub undo: TnodeUndo,
}

#[derive(Debug, Clone)]
pub struct TnodeManager {
    params: ConsensusParams,
    registry: TnodeRegistry,
    queue: PaymentQueue,
    scheduler: PaymentScheduler,
    distributor: RewardDistributor,
}

impl TnodeManager {
    pub fn new(params: ConsensusParams) -> Self {
        Self {
            params,
            registry: TnodeRegistry::new(),
            queue: PaymentQueue::new(),
            scheduler: PaymentScheduler::new(),
            distributor: RewardDistributor::new(),
        }
    }

    /// Split of block `height` given the current state; used to build coinbases
    pub fn expected_distribution(&self, height: u64, reward: u64) -> Distribution {
        self.distributor
            .compute(height, reward, &self.registry, &self.queue, &self.scheduler, &self.params)
            .unwrap_or_else(|_| Distribution::miner_only(height, reward))
    }

    /// Apply `block`. `view` must already include the block's UTXO changes.
    ///
    /// A coinbase that skips the tnode payment is rejected before any state changes.
    pub fn connect_block(&mut self, block: &Block, view: &impl UtxoView, reward: u64) -> Result<BlockOutcome> {
        let height = block.height();

        match self
            .distributor
            .compute(height, reward, &self.registry, &self.queue, &self.scheduler, &self.params)
        {
            Ok(expected) => expected.check_coinbase(block)?,
            Err(TnodeError::NoEligiblePayee { .. }) => {}
            Err(e) => return Err(e),
        }

        let before = self.registry.entries().clone();
        let distributed = self.distributor.get(height).is_none();

        let distribution = match self.distributor.distribute(
            height,
            reward,
            &mut self.registry,
            &self.queue,
            &self.scheduler,
            &self.params,
        ) {
            Ok(distribution) => distribution,
            Err(TnodeError::NoEligiblePayee { height }) => {
                log::warn!("⚠️  No eligible tnode payee for block {}, reward stays with miner", height);
                self.distributor.record(Distribution::miner_only(height, reward))
            }
            Err(e) => {
                self.restore_entries(&before);
                return Err(e);
            }
        };

        for message in &block.tnode_messages {
            let result = match message {
                TnodeMessage::Broadcast(broadcast) => self
                    .registry
                    .register(broadcast, view, &self.params, height)
                    .map(|_| ()),
                TnodeMessage::Ping(ping) => self.registry.record_ping(ping, height),
            };
            if let Err(e) = result {
                log::warn!("Skipping tnode message for {} in block {}: {}", message.collateral(), height, e);
            }
        }

        let changes = self.registry.check_block(height, view, &self.params);
        self.queue.rebuild(&self.registry);

        let previous_last_target = self.scheduler.last_target();
        let scheduled = self
            .scheduler
            .schedule_after(height, &self.queue, &self.registry, &self.params)
            .map(|(target, _)| target);

        let after = self.registry.entries();
        let mut entries: Vec<(TnodeId, Option<TnodeEntry>)> = before
            .iter()
            .filter(|(id, old)| after.get(*id) != Some(*old))
            .map(|(id, old)| (id.clone(), Some(old.clone())))
            .collect();
        entries.extend(
            after
                .keys()
                .filter(|id| !before.contains_key(*id))
                .map(|id| (id.clone(), None)),
        );

        log::debug!(
            "Tnode state at block {}: {} registered, {} enabled",
            height,
            self.registry.count(),
            self.registry.enabled_count()
        );

        Ok(BlockOutcome {
            distribution,
            changes,
            undo: TnodeUndo {
                height,
                entries,
                scheduled,
                previous_last_target,
                distributed,
            },
        })
    }

    /// Revert a block connected with [`TnodeManager::connect_block`]
    pub fn disconnect_block(&mut self, undo: TnodeUndo) {
        if let Some(target) = undo.scheduled {
            self.scheduler.unschedule(target, undo.previous_last_target);
        }
        if undo.distributed {
            self.distributor.forget(undo.height);
        }
        for (id, entry) in undo.entries {
            self.registry.restore(id, entry);
        }
        self.queue.rebuild(&self.registry);
        log::debug!("Tnode state reverted to block {}", undo.height.saturating_sub(1));
    }

    fn restore_entries(&mut self, before: &std::collections::BTreeMap<TnodeId, TnodeEntry>) {
        let ids: Vec<TnodeId> = self.registry.entries().keys().cloned().collect();
        for id in ids {
            self.registry.restore(id.clone(), before.get(&id).cloned());
        }
    }

    pub fn status(&self, id: &TnodeId) -> Result<TnodeStatus> {
        self.registry.status(id)
    }

    /// `txid-vout` to status, as shown by `tnodelist`
    pub fn list(&self) -> Vec<(String, TnodeStatus)> {
        self.registry
            .iter()
            .map(|entry| (entry.id().to_string(), entry.status))
            .collect()
    }

    pub fn next_payees(&self, count: usize) -> Vec<&TnodeEntry> {
        self.queue.next_payees(count, &self.registry)
    }

    /// Next scheduled payee above `tip`
    pub fn winner(&self, tip: u64) -> Option<(u64, &TnodeEntry)> {
        let (height, id) = self.scheduler.next_slot_after(tip)?;
        self.registry.get(id).map(|entry| (height, entry))
    }

    pub fn registry(&self) -> &TnodeRegistry {
        &self.registry
    }

    pub fn distributor(&self) -> &RewardDistributor {
        &self.distributor
    }

    pub fn params(&self) -> &ConsensusParams {
        &self.params
    }
}
