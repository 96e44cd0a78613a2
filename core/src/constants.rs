//! Chain-wide constants

/// Smallest units per coin
pub const COIN: u64 = 100_000_000;

/// Logical timestamp of the genesis block
pub const GENESIS_TIME: i64 = 1_546_300_800;

/// Hash used as `previous_hash` of the genesis block
pub const NULL_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";
