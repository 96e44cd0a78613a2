//! Node wallet: owned addresses, locked outpoints, coin selection and Sigma serials
//!
//! Transactions carry no signatures; ownership is by address only.

use crate::error::{ApiError, ApiResult};
use std::collections::{BTreeMap, BTreeSet};
use tecra_core::{Coin, OutPoint, Transaction, TransactionPool, TxOutput, UtxoSet};
use tecra_crypto::KeyPair;
use tecra_elysium::{commitment_of, SerialSeed};

#[derive(Debug, Clone)]
pub struct Wallet {
    keys: BTreeMap<String, KeyPair>,
    default_address: String,
    locked: BTreeSet<OutPoint>,
    seed: SerialSeed,
    next_serial: u32,
    /// Sigma serials by commitment
    serials: BTreeMap<String, String>,
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

impl Wallet {
    pub fn new() -> Self {
        let key = KeyPair::generate();
        let default_address = key.address();
        let mut keys = BTreeMap::new();
        keys.insert(default_address.clone(), key);

        Self {
            keys,
            default_address,
            locked: BTreeSet::new(),
            seed: SerialSeed::random(),
            next_serial: 0,
            serials: BTreeMap::new(),
        }
    }

    pub fn new_address(&mut self) -> String {
        let key = KeyPair::generate();
        let address = key.address();
        self.keys.insert(address.clone(), key);
        address
    }

    /// Mining and change address
    pub fn default_address(&self) -> &str {
        &self.default_address
    }

    pub fn is_mine(&self, address: &str) -> bool {
        self.keys.contains_key(address)
    }

    pub fn addresses(&self) -> impl Iterator<Item = &String> {
        self.keys.keys()
    }

    pub fn lock(&mut self, outpoint: OutPoint) -> bool {
        self.locked.insert(outpoint)
    }

    pub fn unlock(&mut self, outpoint: &OutPoint) -> bool {
        self.locked.remove(outpoint)
    }

    pub fn is_locked(&self, outpoint: &OutPoint) -> bool {
        self.locked.contains(outpoint)
    }

    pub fn locked_outpoints(&self) -> Vec<OutPoint> {
        self.locked.iter().cloned().collect()
    }

    /// Wallet coins in the UTXO set, ordered by outpoint
    pub fn unspent(&self, utxo: &UtxoSet) -> Vec<(OutPoint, Coin)> {
        let mut coins: Vec<(OutPoint, Coin)> = self
            .keys
            .keys()
            .flat_map(|address| utxo.coins_for_address(address))
            .collect();
        coins.sort_by(|a, b| a.0.cmp(&b.0));
        coins
    }

    /// Sum of mature wallet coins
    pub fn balance(&self, utxo: &UtxoSet) -> u64 {
        self.unspent(utxo)
            .iter()
            .filter(|(_, coin)| utxo.is_mature(coin))
            .map(|(_, coin)| coin.output.amount)
            .sum()
    }

    /// Largest-first selection over mature, unlocked coins not spent in the mempool
    pub fn select_coins(
        &self,
        utxo: &UtxoSet,
        mempool: &TransactionPool,
        amount: u64,
    ) -> ApiResult<(Vec<OutPoint>, u64)> {
        let mut candidates: Vec<(OutPoint, Coin)> = self
            .unspent(utxo)
            .into_iter()
            .filter(|(outpoint, coin)| {
                utxo.is_mature(coin) && !self.is_locked(outpoint) && !mempool.is_spent(outpoint)
            })
            .collect();
        candidates.sort_by(|a, b| b.1.output.amount.cmp(&a.1.output.amount).then(a.0.cmp(&b.0)));

        let mut selected = Vec::new();
        let mut total = 0u64;
        for (outpoint, coin) in candidates {
            if total >= amount {
                break;
            }
            total += coin.output.amount;
            selected.push(outpoint);
        }

        if total < amount {
            return Err(ApiError::InsufficientFunds { have: total, need: amount });
        }
        Ok((selected, total))
    }

    /// Payment of `amount` to `to`; change returns to the default address
    pub fn create_transaction(
        &self,
        utxo: &UtxoSet,
        mempool: &TransactionPool,
        to: &str,
        amount: u64,
    ) -> ApiResult<Transaction> {
        if amount == 0 {
            return Err(ApiError::InvalidParams("amount must be positive".into()));
        }
        if to.is_empty() {
            return Err(ApiError::InvalidAddress(to.to_string()));
        }

        let (inputs, total) = self.select_coins(utxo, mempool, amount)?;
        let mut outputs = vec![TxOutput::new(to, amount)];
        let change = total - amount;
        if change > 0 {
            outputs.push(TxOutput::new(self.default_address.clone(), change));
        }
        Ok(Transaction::new(inputs, outputs, None, 0))
    }

    /// Derive the next Sigma serial; returns its commitment
    pub fn next_mint(&mut self) -> ApiResult<String> {
        let serial = self.seed.serial(self.next_serial);
        let commitment = commitment_of(&serial)?;
        self.next_serial += 1;
        self.serials.insert(commitment.clone(), serial);
        Ok(commitment)
    }

    pub fn serial_for(&self, commitment: &str) -> Option<&str> {
        self.serials.get(commitment).map(String::as_str)
    }

    /// Drop serials of a mint that never reached the mempool
    pub fn forget_mints<'a>(&mut self, commitments: impl IntoIterator<Item = &'a str>) {
        for commitment in commitments {
            self.serials.remove(commitment);
        }
    }

    pub fn serial_count(&self) -> usize {
        self.serials.len()
    }
}
