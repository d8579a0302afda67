//! `array_mod` distribution: `hash % n` with sequential failover.

use crate::hash::HashAlgorithm;
use crate::node::NodeId;
use crate::ring::locator::{FailureMode, NodeLocator};

/// Picks `hash(key) % node_count`; on failure walks forward through the
/// server list.
///
/// Adding or removing a server remaps almost every key, which is why
/// `ketama` is the default distribution.
#[derive(Debug, Clone)]
pub struct ModuloLocator {
    node_count: usize,
    hash_alg: HashAlgorithm,
    failure_mode: FailureMode,
}

impl ModuloLocator {
    pub fn new(node_count: usize, hash_alg: HashAlgorithm, failure_mode: FailureMode) -> Self {
        Self {
            node_count,
            hash_alg,
            failure_mode,
        }
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash_alg
    }
}

impl NodeLocator for ModuloLocator {
    fn primary(&self, key: &str) -> Option<NodeId> {
        if self.node_count == 0 {
            return None;
        }
        let hash = u64::from(self.hash_alg.hash(key));
        Some(NodeId((hash % self.node_count as u64) as usize))
    }

    fn route(&self, key: &str, is_live: &dyn Fn(NodeId) -> bool) -> Option<NodeId> {
        let primary = self.primary(key)?;
        if self.failure_mode == FailureMode::Strict || is_live(primary) {
            return Some(primary);
        }

        (1..self.node_count)
            .map(|step| NodeId((primary.0 + step) % self.node_count))
            .find(|id| is_live(*id))
    }

    fn node_count(&self) -> usize {
        self.node_count
    }

    fn name(&self) -> &'static str {
        "array_mod"
    }
}
