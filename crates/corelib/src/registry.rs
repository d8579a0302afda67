//! Node registry.
//!
//! Holds the configured nodes, their liveness, and the current locator
//! snapshot. Readers load the snapshot through `ArcSwap` and never block;
//! writers rebuild a complete locator and publish it with a single swap, so
//! a reader always sees a fully built ring.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::hash::HashAlgorithm;
use crate::node::{Node, NodeId};
use crate::ring::{Distribution, FailureMode, Locator, NodeLocator};

/// Registry of nodes shared by every pool slot of a client.
#[derive(Debug)]
pub struct NodeRegistry {
    /// Writers serialize on this lock; readers use `locator`.
    nodes: Mutex<Vec<Node>>,
    alive: Vec<AtomicBool>,
    locator: ArcSwap<Locator>,
    distribution: Distribution,
    hash_alg: HashAlgorithm,
    failure_mode: FailureMode,
}

impl NodeRegistry {
    /// Build a registry; node ids are reassigned to their list positions.
    pub fn new(
        nodes: Vec<Node>,
        distribution: Distribution,
        hash_alg: HashAlgorithm,
        failure_mode: FailureMode,
    ) -> Result<Self> {
        let nodes: Vec<Node> = nodes
            .into_iter()
            .enumerate()
            .map(|(i, node)| {
                if !Node::is_valid_weight(node.weight) {
                    return Err(Error::InvalidWeight {
                        node: node.address(),
                        weight: node.weight,
                    });
                }
                Ok(Node { id: NodeId(i), ..node })
            })
            .collect::<Result<_>>()?;

        let locator = Locator::build(distribution, &nodes, hash_alg, failure_mode);
        tracing::info!(
            nodes = nodes.len(),
            distribution = %distribution,
            hash = %hash_alg,
            "built node registry"
        );

        Ok(Self {
            alive: nodes.iter().map(|_| AtomicBool::new(true)).collect(),
            nodes: Mutex::new(nodes),
            locator: ArcSwap::from_pointee(locator),
            distribution,
            hash_alg,
            failure_mode,
        })
    }

    /// Current locator snapshot.
    pub fn locator(&self) -> Arc<Locator> {
        self.locator.load_full()
    }

    /// Route a key, skipping nodes that are marked down or rejected by
    /// `usable` (e.g. nodes whose connection is closed).
    pub fn route(&self, key: &str, usable: impl Fn(NodeId) -> bool) -> Option<NodeId> {
        let locator = self.locator.load();
        locator.route(key, &|id: NodeId| self.is_alive(id) && usable(id))
    }

    pub fn len(&self) -> usize {
        self.alive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alive.is_empty()
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.nodes.lock().clone()
    }

    pub fn node(&self, id: NodeId) -> Option<Node> {
        self.nodes.lock().get(id.0).cloned()
    }

    /// Nodes currently marked alive, in configuration order.
    pub fn available(&self) -> Vec<Node> {
        self.nodes
            .lock()
            .iter()
            .filter(|node| self.is_alive(node.id))
            .cloned()
            .collect()
    }

    pub fn is_alive(&self, id: NodeId) -> bool {
        self.alive
            .get(id.0)
            .map(|flag| flag.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    pub fn mark_down(&self, id: NodeId) -> Result<()> {
        self.set_alive(id, false)
    }

    pub fn mark_up(&self, id: NodeId) -> Result<()> {
        self.set_alive(id, true)
    }

    fn set_alive(&self, id: NodeId, alive: bool) -> Result<()> {
        let flag = self.alive.get(id.0).ok_or(Error::UnknownNode(id.0))?;
        if flag.swap(alive, Ordering::AcqRel) != alive {
            tracing::info!(node = %id, alive, "node liveness changed");
        }
        Ok(())
    }

    /// Change a node's weight and publish a rebuilt locator.
    pub fn set_weight(&self, id: NodeId, weight: u32) -> Result<()> {
        let mut nodes = self.nodes.lock();
        let node = nodes.get_mut(id.0).ok_or(Error::UnknownNode(id.0))?;
        *node = node.clone().with_weight(weight)?;
        self.publish(&nodes);
        Ok(())
    }

    /// Rebuild the locator from the current nodes and publish it.
    pub fn rebuild(&self) {
        let nodes = self.nodes.lock();
        self.publish(&nodes);
    }

    fn publish(&self, nodes: &[Node]) {
        let locator = Locator::build(self.distribution, nodes, self.hash_alg, self.failure_mode);
        self.locator.store(Arc::new(locator));
        tracing::debug!(nodes = nodes.len(), "published new locator snapshot");
    }

    pub fn distribution(&self) -> Distribution {
        self.distribution
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash_alg
    }

    pub fn failure_mode(&self) -> FailureMode {
        self.failure_mode
    }
}
