//! Tecra Tnode Module
//!
//! Collateral-backed service nodes: registration, block-driven lifecycle,
//! deterministic payment rotation and block reward distribution.

pub mod collateral;
pub mod config;
pub mod error;
pub mod manager;
pub mod registry;
pub mod rewards;
pub mod scheduler;
pub mod start_protocol;
pub mod status;
pub mod types;

pub use collateral::Collateral;
pub use config::{TnodeConfig, TnodeConfigEntry, TnodeConfigError};
pub use error::{Result, TnodeError};
pub use manager::{BlockOutcome, TnodeManager, TnodeUndo};
pub use registry::{StatusChange, TnodeRegistry};
pub use rewards::{Distribution, Payee, RewardDistributor};
pub use scheduler::{PaymentQueue, PaymentScheduler};
pub use start_protocol::{generate_privkey, ActiveTnode};
pub use status::TnodeStatus;
pub use types::{TnodeEntry, TnodeId};

/// Tnode module version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
