//! Unspent transaction output set with per-block undo

use crate::block::Block;
use crate::error::{CoreError, Result};
use crate::transaction::{OutPoint, TxOutput};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub output: TxOutput,
    /// Height of the block that created this output
    pub height: u64,
    pub is_coinbase: bool,
}

impl Coin {
    /// Confirmations at `tip_height`, counting the creating block
    pub fn confirmations(&self, tip_height: u64) -> u64 {
        (tip_height + 1).saturating_sub(self.height)
    }
}

/// Read access to confirmed outputs, consumed by the tnode registry
pub trait UtxoView {
    fn coin(&self, outpoint: &OutPoint) -> Option<&Coin>;

    fn tip_height(&self) -> u64;

    fn is_unspent(&self, outpoint: &OutPoint) -> bool {
        self.coin(outpoint).is_some()
    }
}

/// Everything needed to revert one connected block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoUndo {
    pub height: u64,
    pub spent: Vec<(OutPoint, Coin)>,
    pub created: Vec<OutPoint>,
}

#[derive(Debug, Clone, Default)]
pub struct UtxoSet {
    coins: HashMap<OutPoint, Coin>,
    tip_height: u64,
    coinbase_maturity: u64,
}

impl UtxoSet {
    pub fn new(coinbase_maturity: u64) -> Self {
        Self {
            coins: HashMap::new(),
            tip_height: 0,
            coinbase_maturity,
        }
    }

    /// Validate and apply all transactions of `block`.
    ///
    /// Nothing is modified unless every transaction is valid.
    pub fn apply_block(&mut self, block: &Block) -> Result<UtxoUndo> {
        let height = block.height();
        let mut created: HashMap<OutPoint, Coin> = HashMap::new();
        let mut spent_in_block: HashSet<OutPoint> = HashSet::new();
        let mut spent_from_set: Vec<(OutPoint, Coin)> = Vec::new();
        let mut created_order: Vec<OutPoint> = Vec::new();

        for tx in &block.transactions {
            let is_coinbase = tx.is_coinbase();

            if !is_coinbase {
                let mut input_total = 0u64;
                for input in &tx.inputs {
                    if !spent_in_block.insert(input.clone()) {
                        return Err(CoreError::DoubleSpend(input.clone()));
                    }
                    let coin = match created.get(input) {
                        Some(coin) => coin.clone(),
                        None => {
                            let coin = self
                                .coins
                                .get(input)
                                .ok_or_else(|| CoreError::MissingInput(input.clone()))?;
                            spent_from_set.push((input.clone(), coin.clone()));
                            coin.clone()
                        }
                    };
                    if coin.is_coinbase {
                        let confirmations = height.saturating_sub(coin.height);
                        if confirmations < self.coinbase_maturity {
                            return Err(CoreError::ImmatureCoinbase {
                                outpoint: input.clone(),
                                confirmations,
                                required: self.coinbase_maturity,
                            });
                        }
                    }
                    input_total = input_total.saturating_add(coin.output.amount);
                }

                let output_total = tx.output_total();
                if output_total > input_total {
                    return Err(CoreError::ValueOutOfRange {
                        txid: tx.txid.clone(),
                        inputs: input_total,
                        outputs: output_total,
                    });
                }
            }

            for (vout, output) in tx.outputs.iter().enumerate() {
                let outpoint = tx.outpoint(vout as u32);
                created.insert(
                    outpoint.clone(),
                    Coin {
                        output: output.clone(),
                        height,
                        is_coinbase,
                    },
                );
                created_order.push(outpoint);
            }
        }

        // Commit
        for (outpoint, _) in &spent_from_set {
            self.coins.remove(outpoint);
        }
        let mut undo_created = Vec::new();
        for outpoint in created_order {
            if spent_in_block.contains(&outpoint) {
                continue;
            }
            if let Some(coin) = created.remove(&outpoint) {
                self.coins.insert(outpoint.clone(), coin);
                undo_created.push(outpoint);
            }
        }
        self.tip_height = height;

        log::debug!(
            "utxo: applied block {} (+{} / -{})",
            height,
            undo_created.len(),
            spent_from_set.len()
        );

        Ok(UtxoUndo {
            height,
            spent: spent_from_set,
            created: undo_created,
        })
    }

    /// Revert a block previously applied with [`UtxoSet::apply_block`]
    pub fn undo_block(&mut self, undo: UtxoUndo) {
        for outpoint in &undo.created {
            self.coins.remove(outpoint);
        }
        for (outpoint, coin) in undo.spent {
            self.coins.insert(outpoint, coin);
        }
        self.tip_height = undo.height.saturating_sub(1);
    }

    /// Unspent outputs paying `address`, ordered by outpoint
    pub fn coins_for_address(&self, address: &str) -> Vec<(OutPoint, Coin)> {
        let mut coins: Vec<(OutPoint, Coin)> = self
            .coins
            .iter()
            .filter(|(_, coin)| coin.output.address == address)
            .map(|(op, coin)| (op.clone(), coin.clone()))
            .collect();
        coins.sort_by(|a, b| a.0.cmp(&b.0));
        coins
    }

    pub fn balance(&self, address: &str) -> u64 {
        self.coins
            .values()
            .filter(|coin| coin.output.address == address)
            .map(|coin| coin.output.amount)
            .sum()
    }

    /// Whether a coin can be spent in the next block
    pub fn is_mature(&self, coin: &Coin) -> bool {
        !coin.is_coinbase || (self.tip_height + 1).saturating_sub(coin.height) >= self.coinbase_maturity
    }

    pub fn len(&self) -> usize {
        self.coins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coins.is_empty()
    }
}

impl UtxoView for UtxoSet {
    fn coin(&self, outpoint: &OutPoint) -> Option<&Coin> {
        self.coins.get(outpoint)
    }

    fn tip_height(&self) -> u64 {
        self.tip_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{COIN, NULL_HASH};
    use crate::transaction::Transaction;

    fn block_with(height: u64, miner: &str, txs: Vec<Transaction>) -> Block {
        let mut block = Block::new(height, NULL_HASH.into(), miner.into(), 150, vec![TxOutput::new(miner, 50 * COIN)]);
        for tx in txs {
            block.add_transaction(tx);
        }
        block
    }

    #[test]
    fn test_apply_and_undo() {
        let mut set = UtxoSet::new(0);
        let b1 = block_with(1, "alice", vec![]);
        let cb = b1.transactions[0].outpoint(0);
        set.apply_block(&b1).unwrap();
        assert_eq!(set.balance("alice"), 50 * COIN);

        let spend = Transaction::new(
            vec![cb.clone()],
            vec![TxOutput::new("bob", 20 * COIN), TxOutput::new("alice", 30 * COIN)],
            None,
            0,
        );
        let b2 = block_with(2, "carol", vec![spend]);
        let undo = set.apply_block(&b2).unwrap();
        assert!(!set.is_unspent(&cb));
        assert_eq!(set.balance("bob"), 20 * COIN);
        assert_eq!(set.tip_height(), 2);

        set.undo_block(undo);
        assert!(set.is_unspent(&cb));
        assert_eq!(set.balance("bob"), 0);
        assert_eq!(set.balance("carol"), 0);
        assert_eq!(set.tip_height(), 1);
    }

    #[test]
    fn test_invalid_block_leaves_set_untouched() {
        let mut set = UtxoSet::new(0);
        let b1 = block_with(1, "alice", vec![]);
        set.apply_block(&b1).unwrap();
        let before = set.len();

        let bogus = Transaction::new(vec![OutPoint::new("missing", 0)], vec![], None, 0);
        let b2 = block_with(2, "carol", vec![bogus]);
        assert!(matches!(set.apply_block(&b2), Err(CoreError::MissingInput(_))));
        assert_eq!(set.len(), before);
        assert_eq!(set.tip_height(), 1);
    }

    #[test]
    fn test_overspend_rejected() {
        let mut set = UtxoSet::new(0);
        let b1 = block_with(1, "alice", vec![]);
        let cb = b1.transactions[0].outpoint(0);
        set.apply_block(&b1).unwrap();

        let spend = Transaction::new(vec![cb], vec![TxOutput::new("bob", 51 * COIN)], None, 0);
        let b2 = block_with(2, "carol", vec![spend]);
        assert!(matches!(set.apply_block(&b2), Err(CoreError::ValueOutOfRange { .. })));
    }

    #[test]
    fn test_coinbase_maturity() {
        let mut set = UtxoSet::new(10);
        let b1 = block_with(1, "alice", vec![]);
        let cb = b1.transactions[0].outpoint(0);
        set.apply_block(&b1).unwrap();

        let spend = Transaction::new(vec![cb], vec![TxOutput::new("bob", COIN)], None, 0);
        let b2 = block_with(2, "carol", vec![spend]);
        assert!(matches!(set.apply_block(&b2), Err(CoreError::ImmatureCoinbase { .. })));
    }

    #[test]
    fn test_intra_block_chain() {
        let mut set = UtxoSet::new(0);
        let b1 = block_with(1, "alice", vec![]);
        let cb = b1.transactions[0].outpoint(0);
        set.apply_block(&b1).unwrap();

        let first = Transaction::new(vec![cb], vec![TxOutput::new("bob", 50 * COIN)], None, 0);
        let second = Transaction::new(vec![first.outpoint(0)], vec![TxOutput::new("dave", 50 * COIN)], None, 0);
        let b2 = block_with(2, "carol", vec![first, second]);
        let undo = set.apply_block(&b2).unwrap();

        assert_eq!(set.balance("bob"), 0);
        assert_eq!(set.balance("dave"), 50 * COIN);
        set.undo_block(undo);
        assert_eq!(set.balance("dave"), 0);
        assert_eq!(set.balance("alice"), 50 * COIN);
    }
}
