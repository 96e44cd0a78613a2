//! Tnode error types

use crate::status::TnodeStatus;
use tecra_core::OutPoint;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TnodeError {
    #[error("Invalid collateral {outpoint}: {reason}")]
    InvalidCollateral { outpoint: OutPoint, reason: String },

    #[error("No eligible tnode payee for block {height}")]
    NoEligiblePayee { height: u64 },

    #[error("Tnode already registered: {0}")]
    AlreadyRegistered(OutPoint),

    #[error("Tnode not found: {0}")]
    NotFound(String),

    #[error("Invalid tnode status transition {from} -> {to}")]
    InvalidTransition { from: TnodeStatus, to: TnodeStatus },

    #[error("Invalid tnode signature for {0}")]
    InvalidSignature(OutPoint),

    #[error("Block {height} does not pay {expected} to tnode {payee}")]
    UnexpectedPayee {
        height: u64,
        payee: String,
        expected: u64,
    },

    #[error("Invalid tnode private key")]
    InvalidPrivateKey,
}

pub type Result<T> = std::result::Result<T, TnodeError>;
