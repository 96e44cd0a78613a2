//! Block structures and functionality for Tecra

use crate::constants::{GENESIS_TIME, NULL_HASH};
use crate::error::{CoreError, Result};
use crate::tnode_tx::TnodeMessage;
use crate::transaction::{Transaction, TxOutput};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Block height
    pub height: u64,
    /// Hash of the previous block
    pub previous_hash: String,
    /// Merkle root of all transactions
    pub merkle_root: String,
    /// Logical block time, derived from height
    pub time: i64,
    /// Address that produced the block
    pub miner: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    /// All transactions in the block (first one must be coinbase)
    pub transactions: Vec<Transaction>,
    /// Tnode broadcasts and pings carried by this block
    pub tnode_messages: Vec<TnodeMessage>,
    pub hash: String,
}

impl Block {
    pub fn new(
        height: u64,
        previous_hash: String,
        miner: String,
        target_spacing: i64,
        coinbase_outputs: Vec<TxOutput>,
    ) -> Self {
        let mut block = Block {
            header: BlockHeader {
                height,
                previous_hash,
                merkle_root: String::new(),
                time: GENESIS_TIME + height as i64 * target_spacing,
                miner,
            },
            transactions: vec![Transaction::coinbase(height, coinbase_outputs)],
            tnode_messages: Vec::new(),
            hash: String::new(),
        };
        block.seal();
        block
    }

    pub fn genesis(miner: String) -> Self {
        Self::new(0, NULL_HASH.to_string(), miner, 0, Vec::new())
    }

    pub fn height(&self) -> u64 {
        self.header.height
    }

    pub fn add_transaction(&mut self, tx: Transaction) {
        self.transactions.push(tx);
        self.seal();
    }

    pub fn add_tnode_message(&mut self, message: TnodeMessage) {
        self.tnode_messages.push(message);
        self.seal();
    }

    /// Recompute merkle root and hash after the body changed
    pub fn seal(&mut self) {
        self.header.merkle_root = self.calculate_merkle_root();
        self.hash = self.calculate_hash();
    }

    /// Calculate the block hash (double SHA3-256)
    pub fn calculate_hash(&self) -> String {
        let mut hasher = Sha3_256::new();

        hasher.update(self.header.height.to_le_bytes());
        hasher.update(self.header.previous_hash.as_bytes());
        hasher.update(self.header.merkle_root.as_bytes());
        hasher.update(self.header.time.to_le_bytes());
        hasher.update(self.header.miner.as_bytes());
        for message in &self.tnode_messages {
            hasher.update(bincode::serialize(message).unwrap_or_default());
        }

        let hash1 = hasher.finalize();
        let hash2 = Sha3_256::digest(hash1);

        hex::encode(hash2)
    }

    /// Calculate merkle root of all transactions
    pub fn calculate_merkle_root(&self) -> String {
        if self.transactions.is_empty() {
            return "0".repeat(64);
        }

        let mut hashes: Vec<String> = self.transactions.iter().map(|tx| tx.txid.clone()).collect();

        while hashes.len() > 1 {
            let mut next_level = Vec::new();

            for pair in hashes.chunks(2) {
                let left = &pair[0];
                let right = pair.get(1).unwrap_or(left); // Duplicate if odd number

                let combined = format!("{}{}", left, right);
                next_level.push(hex::encode(Sha3_256::digest(combined.as_bytes())));
            }

            hashes = next_level;
        }

        hashes.swap_remove(0)
    }

    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first()
    }

    /// All transactions except coinbase
    pub fn regular_transactions(&self) -> &[Transaction] {
        if self.transactions.len() > 1 {
            &self.transactions[1..]
        } else {
            &[]
        }
    }

    /// Validate block structure (not including transaction validation against UTXO)
    pub fn validate_structure(&self) -> Result<()> {
        let coinbase = self
            .coinbase()
            .ok_or_else(|| CoreError::InvalidCoinbase("block has no transactions".into()))?;
        if !coinbase.is_coinbase() {
            return Err(CoreError::InvalidCoinbase("first transaction is not a coinbase".into()));
        }
        if self.regular_transactions().iter().any(|tx| tx.is_coinbase()) {
            return Err(CoreError::InvalidCoinbase("more than one coinbase".into()));
        }
        if self.calculate_merkle_root() != self.header.merkle_root {
            return Err(CoreError::InvalidBlock("merkle root mismatch".into()));
        }
        if self.calculate_hash() != self.hash {
            return Err(CoreError::InvalidBlock("hash mismatch".into()));
        }
        for tx in &self.transactions {
            if tx.txid != tx.calculate_txid() {
                return Err(CoreError::InvalidBlock(format!("bad txid {}", tx.txid)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::COIN;
    use crate::tnode_tx::TnodePing;
    use crate::transaction::OutPoint;

    #[test]
    fn test_new_block_is_sealed() {
        let block = Block::new(1, NULL_HASH.into(), "miner".into(), 150, vec![TxOutput::new("miner", 50 * COIN)]);

        assert!(block.validate_structure().is_ok());
        assert_eq!(block.header.time, GENESIS_TIME + 150);
    }

    #[test]
    fn test_tampered_block_rejected() {
        let mut block = Block::new(1, NULL_HASH.into(), "miner".into(), 150, vec![TxOutput::new("miner", 50 * COIN)]);
        block.transactions[0].outputs[0].amount = 500 * COIN;

        assert!(block.validate_structure().is_err());
    }

    #[test]
    fn test_tnode_messages_change_hash() {
        let mut block = Block::new(1, NULL_HASH.into(), "miner".into(), 150, Vec::new());
        let before = block.hash.clone();
        block.add_tnode_message(TnodeMessage::Ping(TnodePing::new(OutPoint::new("aa", 0), 1)));

        assert_ne!(before, block.hash);
        assert!(block.validate_structure().is_ok());
    }

    #[test]
    fn test_merkle_root_odd_count() {
        let mut block = Block::new(1, NULL_HASH.into(), "miner".into(), 150, Vec::new());
        block.add_transaction(Transaction::data(vec![1], 1));
        block.add_transaction(Transaction::data(vec![2], 2));

        assert_eq!(block.header.merkle_root.len(), 64);
        assert_eq!(block.regular_transactions().len(), 2);
    }
}
