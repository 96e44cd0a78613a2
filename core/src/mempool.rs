//! Transaction Pool (Mempool)
//!
//! Pending transactions waiting for the next block, in arrival order.

use crate::block::Block;
use crate::error::{CoreError, Result};
use crate::transaction::{OutPoint, Transaction};
use std::collections::{HashMap, HashSet, VecDeque};

/// Maximum transactions in mempool
const MAX_MEMPOOL_SIZE: usize = 10_000;

#[derive(Debug, Clone, Default)]
pub struct TransactionPool {
    /// Pending transactions by txid
    transactions: HashMap<String, Transaction>,

    /// Ordered queue for block assembly
    queue: VecDeque<String>,

    /// Outpoints consumed by pooled transactions
    spent: HashSet<OutPoint>,
}

impl TransactionPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, tx: Transaction) -> Result<()> {
        if self.transactions.len() >= MAX_MEMPOOL_SIZE {
            return Err(CoreError::MempoolFull);
        }

        if self.transactions.contains_key(&tx.txid) {
            return Err(CoreError::DuplicateTransaction(tx.txid));
        }

        if let Some(input) = tx.inputs.iter().find(|input| self.spent.contains(input)) {
            return Err(CoreError::DoubleSpend(input.clone()));
        }

        self.spent.extend(tx.inputs.iter().cloned());
        let txid = tx.txid.clone();
        self.transactions.insert(txid.clone(), tx);
        self.queue.push_back(txid);

        Ok(())
    }

    pub fn remove(&mut self, txid: &str) -> Option<Transaction> {
        let tx = self.transactions.remove(txid)?;
        self.queue.retain(|id| id != txid);
        for input in &tx.inputs {
            self.spent.remove(input);
        }
        Some(tx)
    }

    pub fn get(&self, txid: &str) -> Option<&Transaction> {
        self.transactions.get(txid)
    }

    pub fn contains(&self, txid: &str) -> bool {
        self.transactions.contains_key(txid)
    }

    /// Whether a pooled transaction already spends `outpoint`
    pub fn is_spent(&self, outpoint: &OutPoint) -> bool {
        self.spent.contains(outpoint)
    }

    /// Pop the oldest transaction
    pub fn next(&mut self) -> Option<Transaction> {
        let txid = self.queue.front()?.clone();
        self.remove(&txid)
    }

    /// All transactions in arrival order
    pub fn transactions(&self) -> Vec<Transaction> {
        self.queue
            .iter()
            .filter_map(|txid| self.transactions.get(txid))
            .cloned()
            .collect()
    }

    /// Drop transactions confirmed by `block` and anything conflicting with them
    pub fn remove_confirmed(&mut self, block: &Block) {
        let mut consumed: HashSet<&OutPoint> = HashSet::new();
        for tx in block.regular_transactions() {
            self.remove(&tx.txid);
            consumed.extend(tx.inputs.iter());
        }

        let conflicting: Vec<String> = self
            .transactions
            .values()
            .filter(|tx| tx.inputs.iter().any(|input| consumed.contains(input)))
            .map(|tx| tx.txid.clone())
            .collect();
        for txid in conflicting {
            log::debug!("mempool: dropping {} (conflicts with block {})", txid, block.height());
            self.remove(&txid);
        }
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn clear(&mut self) {
        self.transactions.clear();
        self.queue.clear();
        self.spent.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{COIN, NULL_HASH};
    use crate::transaction::TxOutput;

    fn create_test_tx(input: &str, to: &str, amount: u64) -> Transaction {
        Transaction::new(vec![OutPoint::new(input, 0)], vec![TxOutput::new(to, amount)], None, 0)
    }

    #[test]
    fn test_add_transaction() {
        let mut pool = TransactionPool::new();
        let tx = create_test_tx("aa", "addr2", 100);

        assert!(pool.add(tx).is_ok());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_duplicate_transaction() {
        let mut pool = TransactionPool::new();
        let tx = create_test_tx("aa", "addr2", 100);

        pool.add(tx.clone()).unwrap();
        assert!(matches!(pool.add(tx), Err(CoreError::DuplicateTransaction(_))));
    }

    #[test]
    fn test_conflicting_input_rejected() {
        let mut pool = TransactionPool::new();
        pool.add(create_test_tx("aa", "addr2", 100)).unwrap();

        assert!(matches!(pool.add(create_test_tx("aa", "addr3", 50)), Err(CoreError::DoubleSpend(_))));
        assert!(pool.is_spent(&OutPoint::new("aa", 0)));
    }

    #[test]
    fn test_remove_transaction() {
        let mut pool = TransactionPool::new();
        let tx = create_test_tx("aa", "addr2", 100);
        let txid = tx.txid.clone();

        pool.add(tx).unwrap();
        assert!(pool.remove(&txid).is_some());
        assert_eq!(pool.len(), 0);
        assert!(!pool.is_spent(&OutPoint::new("aa", 0)));
    }

    #[test]
    fn test_next_transaction_is_fifo() {
        let mut pool = TransactionPool::new();
        let first = create_test_tx("aa", "addr2", 100);
        pool.add(first.clone()).unwrap();
        pool.add(create_test_tx("bb", "addr3", 50)).unwrap();

        assert_eq!(pool.next().unwrap().txid, first.txid);
        assert_eq!(pool.len(), 1);
        assert!(pool.next().is_some());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_remove_confirmed() {
        let mut pool = TransactionPool::new();
        let confirmed = create_test_tx("aa", "addr2", 100);
        let unrelated = create_test_tx("bb", "addr3", 50);
        pool.add(confirmed.clone()).unwrap();
        pool.add(unrelated.clone()).unwrap();

        let mut block = Block::new(1, NULL_HASH.into(), "miner".into(), 150, vec![TxOutput::new("miner", COIN)]);
        block.add_transaction(confirmed);
        pool.remove_confirmed(&block);

        assert_eq!(pool.len(), 1);
        assert!(pool.contains(&unrelated.txid));
    }
}
