//! Tecra Core Library
//!
//! Chain primitives shared by the tnode and Elysium layers: outpoints,
//! transactions, blocks, the UTXO set and consensus parameters.

pub mod block;
pub mod constants;
pub mod error;
pub mod mempool;
pub mod params;
pub mod tnode_tx;
pub mod transaction;
pub mod utxo;

// Re-export main types
pub use block::{Block, BlockHeader};
pub use constants::COIN;
pub use error::{CoreError, Result};
pub use mempool::TransactionPool;
pub use params::{ConsensusParams, Network};
pub use tnode_tx::{TnodeBroadcast, TnodeMessage, TnodePing};
pub use transaction::{OutPoint, Transaction, TxOutput};
pub use utxo::{Coin, UtxoSet, UtxoUndo, UtxoView};
