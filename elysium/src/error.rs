//! Elysium error types

use thiserror::Error;

/// Display strings are the messages returned over RPC
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ElysiumError {
    #[error("Property identifier does not exist: {0}")]
    PropertyNotFound(u32),

    #[error("Property was already created by transaction {0}")]
    DuplicateIssuance(String),

    #[error("Property has not enabled Sigma")]
    SigmaNotEnabled,

    #[error("Sigma feature is not activated yet (height {height}, starts at {start})")]
    SigmaInactive { height: u64, start: u64 },

    #[error("Denomination {amount} conflicts with existing denomination {existing_id}")]
    SigmaAlreadyEnabledConflict { existing_id: u8, amount: u64 },

    #[error("Sender has insufficient balance")]
    InsufficientBalance,

    #[error("Invalid denomination: {0}")]
    InvalidDenomination(u8),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Sender is not the issuer of property {0}")]
    NotIssuer(u32),

    #[error("Property {0} already has the maximum number of denominations")]
    TooManyDenominations(u32),

    #[error("Serial already used")]
    SerialAlreadyUsed,

    #[error("No unspent mint matches the serial")]
    MintNotFound,

    #[error("Invalid packet: {0}")]
    Packet(String),
}

pub type Result<T> = std::result::Result<T, ElysiumError>;
