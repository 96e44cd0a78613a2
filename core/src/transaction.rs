//! Transaction structures and types

use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::fmt;

/// Reference to a single transaction output.
///
/// Ordering is lexicographic on `txid`, then `vout`; the tnode payment queue
/// relies on it as a tie-break.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: String,
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: impl Into<String>, vout: u32) -> Self {
        Self {
            txid: txid.into(),
            vout,
        }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.txid, self.vout)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub address: String,
    pub amount: u64,
}

impl TxOutput {
    pub fn new(address: impl Into<String>, amount: u64) -> Self {
        Self {
            address: address.into(),
            amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub txid: String,
    pub inputs: Vec<OutPoint>,
    pub outputs: Vec<TxOutput>,
    /// Opaque data carried by the transaction (Elysium packets)
    pub payload: Option<Vec<u8>>,
    pub nonce: u64,
}

#[derive(Serialize)]
struct TxidPreimage<'a> {
    inputs: &'a [OutPoint],
    outputs: &'a [TxOutput],
    payload: &'a Option<Vec<u8>>,
    nonce: u64,
}

impl Transaction {
    pub fn new(
        inputs: Vec<OutPoint>,
        outputs: Vec<TxOutput>,
        payload: Option<Vec<u8>>,
        nonce: u64,
    ) -> Self {
        let mut tx = Transaction {
            txid: String::new(),
            inputs,
            outputs,
            payload,
            nonce,
        };
        tx.txid = tx.calculate_txid();
        tx
    }

    /// Coinbase for `height`; the height doubles as nonce so every coinbase is unique.
    pub fn coinbase(height: u64, outputs: Vec<TxOutput>) -> Self {
        Self::new(Vec::new(), outputs, None, height)
    }

    /// Data-only transaction carrying `payload`
    pub fn data(payload: Vec<u8>, nonce: u64) -> Self {
        Self::new(Vec::new(), Vec::new(), Some(payload), nonce)
    }

    pub fn calculate_txid(&self) -> String {
        let preimage = TxidPreimage {
            inputs: &self.inputs,
            outputs: &self.outputs,
            payload: &self.payload,
            nonce: self.nonce,
        };
        // Serializing plain structs into a Vec cannot fail.
        let bytes = bincode::serialize(&preimage).unwrap_or_default();
        hex::encode(Sha3_256::digest(&bytes))
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.is_empty() && self.payload.is_none()
    }

    pub fn is_data_only(&self) -> bool {
        self.inputs.is_empty() && self.outputs.is_empty() && self.payload.is_some()
    }

    pub fn output_total(&self) -> u64 {
        self.outputs.iter().map(|o| o.amount).sum()
    }

    pub fn outpoint(&self, vout: u32) -> OutPoint {
        OutPoint::new(self.txid.clone(), vout)
    }
}
