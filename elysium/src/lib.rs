//! Elysium token layer
//!
//! Property issuance and balances, Sigma denominations, the mint pipeline
//! and the packet codec that carries Elysium transactions on chain.

pub mod error;
pub mod ledger;
pub mod packet;
pub mod property;
pub mod sigma;
pub mod state;

pub use error::{ElysiumError, Result};
pub use ledger::{Issuance, PropertyLedger};
pub use packet::{ElysiumPacket, ElysiumTx, SigmaMintEntry, PACKET_MARKER};
pub use property::{Denomination, Ecosystem, Property, PropertyId, PropertyType, SigmaStatus};
pub use sigma::{
    commitment_of, ConfirmedMint, MintStatus, PendingMint, SerialSeed, SigmaPool, SIGMA_MAX_GROUP_SIZE,
};
pub use state::{ElysiumState, ElysiumUndo, MAX_MINTS_PER_TX};
