//! API State Management
use crate::node::Node;
use std::sync::Arc;
use tecra_core::{ConsensusParams, Network};
use tokio::sync::RwLock;

/// Shared handle to the node; every RPC call takes the write lock so block
/// connection and wallet mutations never interleave
#[derive(Clone)]
pub struct ApiState {
    pub node: Arc<RwLock<Node>>,
    pub network: Network,
    pub start_time: std::time::Instant,
}

impl ApiState {
    pub fn new(node: Node) -> Self {
        let network = node.params().network;
        Self {
            node: Arc::new(RwLock::new(node)),
            network,
            start_time: std::time::Instant::now(),
        }
    }

    pub fn for_params(params: ConsensusParams) -> Self {
        Self::new(Node::new(params))
    }
}
