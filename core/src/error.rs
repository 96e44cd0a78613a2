//! Core error types

use crate::transaction::OutPoint;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Missing or spent input: {0}")]
    MissingInput(OutPoint),

    #[error("Input {0} spent twice in block")]
    DoubleSpend(OutPoint),

    #[error("Premature spend of coinbase {outpoint}: {confirmations} of {required} confirmations")]
    ImmatureCoinbase {
        outpoint: OutPoint,
        confirmations: u64,
        required: u64,
    },

    #[error("Outputs ({outputs}) exceed inputs ({inputs}) in {txid}")]
    ValueOutOfRange { txid: String, inputs: u64, outputs: u64 },

    #[error("Invalid coinbase: {0}")]
    InvalidCoinbase(String),

    #[error("Block {height} does not extend tip {tip}")]
    PrevHashMismatch { height: u64, tip: String },

    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    #[error("Transaction already in mempool: {0}")]
    DuplicateTransaction(String),

    #[error("Mempool full")]
    MempoolFull,

    #[error("Invalid consensus parameter: {0}")]
    InvalidParams(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
