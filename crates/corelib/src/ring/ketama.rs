//! Ketama continuum.
//!
//! # Algorithm
//!
//! 1. Every node contributes `160 * weight` points (see [`RingPoint::for_node`]).
//! 2. Points are kept in a `BTreeMap<u32, Vec<NodeId>>`; colliding hashes keep
//!    every owner.
//! 3. A key is hashed with the configured [`HashAlgorithm`]; the first point
//!    at or after the hash owns it, wrapping to the smallest point.
//! 4. When several nodes share that point one is picked at random so no
//!    single node is favoured by insertion order.
//! 5. If the chosen node is unavailable the hash is perturbed with
//!    [`KetamaRing::next_hash`] and the lookup repeated, at most once per
//!    node, unless the ring runs in [`FailureMode::Strict`].
//!
//! # Performance
//!
//! - **Build**: O(p log p) where p = total points
//! - **Lookup**: O(log p)
//! - **Space**: O(p)

use std::collections::{BTreeMap, HashMap};

use rand::Rng;

use crate::hash::HashAlgorithm;
use crate::node::{Node, NodeId};
use crate::ring::locator::{FailureMode, NodeLocator};
use crate::vnode::RingPoint;

/// Immutable weighted consistent-hash ring.
///
/// Never mutated after construction; membership changes build a new ring
/// which the registry publishes in one pointer swap.
#[derive(Debug, Clone)]
pub struct KetamaRing {
    continuum: BTreeMap<u32, Vec<NodeId>>,
    hash_alg: HashAlgorithm,
    failure_mode: FailureMode,
    node_count: usize,
    point_count: usize,
}

impl KetamaRing {
    /// Build the continuum for `nodes`.
    pub fn build(nodes: &[Node], hash_alg: HashAlgorithm, failure_mode: FailureMode) -> Self {
        let points = nodes.iter().flat_map(RingPoint::for_node);
        Self::from_points(points, nodes.len(), hash_alg, failure_mode)
    }

    /// Build a ring from precomputed points.
    ///
    /// `node_count` bounds the number of failover attempts.
    pub fn from_points(
        points: impl IntoIterator<Item = RingPoint>,
        node_count: usize,
        hash_alg: HashAlgorithm,
        failure_mode: FailureMode,
    ) -> Self {
        let mut continuum: BTreeMap<u32, Vec<NodeId>> = BTreeMap::new();
        let mut point_count = 0;
        for point in points {
            continuum.entry(point.hash).or_default().push(point.node_id);
            point_count += 1;
        }

        Self {
            continuum,
            hash_alg,
            failure_mode,
            node_count,
            point_count,
        }
    }

    /// Nodes registered at the first point at or after `hash`, wrapping.
    pub fn candidates_for_hash(&self, hash: u32) -> Option<(u32, &[NodeId])> {
        self.continuum
            .range(hash..)
            .next()
            .or_else(|| self.continuum.iter().next())
            .map(|(point, owners)| (*point, owners.as_slice()))
    }

    /// Owner of `hash`, picking uniformly among colliding owners.
    pub fn node_for_hash(&self, hash: u32) -> Option<NodeId> {
        let (_, owners) = self.candidates_for_hash(hash)?;
        match owners.len() {
            0 => None,
            1 => Some(owners[0]),
            n => Some(owners[rand::thread_rng().gen_range(0..n)]),
        }
    }

    /// Perturbed hash used for failover attempt `tries` (1-based).
    pub fn next_hash(&self, hash: u32, key: &str, tries: usize) -> u32 {
        let tmp = u64::from(self.hash_alg.hash(&format!("{}{}", tries, key)));
        hash.wrapping_add((tmp ^ (tmp >> 32)) as u32)
    }

    /// All points in ascending hash order.
    pub fn points(&self) -> Vec<RingPoint> {
        self.continuum
            .iter()
            .flat_map(|(hash, owners)| owners.iter().map(move |id| RingPoint::new(*hash, *id)))
            .collect()
    }

    /// Length of the key-space arc owned by each node.
    ///
    /// A point owns the keys hashing into `(previous point, point]`; shared
    /// points split their arc evenly. Sums to 2^32 for a non-empty ring.
    pub fn ownership(&self) -> HashMap<NodeId, u64> {
        let mut owned: HashMap<NodeId, u64> = HashMap::new();
        let Some((&last, _)) = self.continuum.iter().next_back() else {
            return owned;
        };

        let mut previous = last;
        for (&hash, owners) in &self.continuum {
            let arc = u64::from(hash.wrapping_sub(previous));
            // a single point owns the whole ring
            let arc = if self.continuum.len() == 1 { 1u64 << 32 } else { arc };
            let share = arc / owners.len() as u64;
            let mut remainder = arc % owners.len() as u64;
            for id in owners {
                let extra = if remainder > 0 {
                    remainder -= 1;
                    1
                } else {
                    0
                };
                *owned.entry(*id).or_default() += share + extra;
            }
            previous = hash;
        }

        owned
    }

    pub fn point_count(&self) -> usize {
        self.point_count
    }

    pub fn is_empty(&self) -> bool {
        self.continuum.is_empty()
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash_alg
    }

    pub fn failure_mode(&self) -> FailureMode {
        self.failure_mode
    }
}

impl NodeLocator for KetamaRing {
    fn primary(&self, key: &str) -> Option<NodeId> {
        self.node_for_hash(self.hash_alg.hash(key))
    }

    fn route(&self, key: &str, is_live: &dyn Fn(NodeId) -> bool) -> Option<NodeId> {
        let mut hash = self.hash_alg.hash(key);
        let mut candidate = self.node_for_hash(hash)?;
        if self.failure_mode == FailureMode::Strict {
            return Some(candidate);
        }

        let mut tries = 0;
        while !is_live(candidate) {
            tries += 1;
            if tries > self.node_count {
                tracing::debug!(key, tries, "no live node left on the continuum");
                return None;
            }
            hash = self.next_hash(hash, key, tries);
            candidate = self.node_for_hash(hash)?;
            tracing::debug!(key, tries, node = %candidate, "rerouted key away from unavailable node");
        }

        Some(candidate)
    }

    fn node_count(&self) -> usize {
        self.node_count
    }

    fn name(&self) -> &'static str {
        "ketama"
    }
}

/// Builder for a [`KetamaRing`].
///
/// # Example
///
/// ```rust
/// use corelib::node::{Node, NodeId};
/// use corelib::ring::RingBuilder;
///
/// let ring = RingBuilder::new()
///     .add_node(Node::new(NodeId(0), "10.0.0.1", 11211))
///     .add_node(Node::new(NodeId(1), "10.0.0.2", 11211))
///     .build();
/// assert_eq!(ring.point_count(), 320);
/// ```
#[derive(Debug, Default)]
pub struct RingBuilder {
    nodes: Vec<Node>,
    hash_alg: HashAlgorithm,
    failure_mode: FailureMode,
}

impl RingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hash_algorithm(mut self, hash_alg: HashAlgorithm) -> Self {
        self.hash_alg = hash_alg;
        self
    }

    pub fn failure_mode(mut self, failure_mode: FailureMode) -> Self {
        self.failure_mode = failure_mode;
        self
    }

    pub fn add_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn build(self) -> KetamaRing {
        KetamaRing::build(&self.nodes, self.hash_alg, self.failure_mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring_of(points: &[(u32, usize)], node_count: usize) -> KetamaRing {
        KetamaRing::from_points(
            points.iter().map(|&(h, id)| RingPoint::new(h, NodeId(id))),
            node_count,
            HashAlgorithm::Fnv1_32,
            FailureMode::Redistribute,
        )
    }

    #[test]
    fn test_lookup_wraps_around() {
        let ring = ring_of(&[(100, 0), (200, 1)], 2);
        assert_eq!(ring.node_for_hash(50), Some(NodeId(0)));
        assert_eq!(ring.node_for_hash(150), Some(NodeId(1)));
        assert_eq!(ring.node_for_hash(201), Some(NodeId(0)));
        assert_eq!(ring.node_for_hash(u32::MAX), Some(NodeId(0)));
    }

    #[test]
    fn test_exact_hash_selects_that_point() {
        let ring = ring_of(&[(100, 0), (200, 1)], 2);
        assert_eq!(ring.node_for_hash(200), Some(NodeId(1)));
        assert_eq!(ring.candidates_for_hash(100).unwrap().0, 100);
    }

    #[test]
    fn test_collisions_pick_randomly() {
        // node 0 was inserted first; both owners must still be chosen
        let ring = ring_of(&[(100, 0), (100, 1), (500, 2)], 3);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..500 {
            seen.insert(ring.node_for_hash(100).unwrap());
        }
        assert!(seen.contains(&NodeId(0)));
        assert!(seen.contains(&NodeId(1)));
        assert!(!seen.contains(&NodeId(2)));
    }

    #[test]
    fn test_next_hash_adds_truncated_hash() {
        let ring = ring_of(&[(1, 0)], 1);
        let tmp = HashAlgorithm::Fnv1_32.hash("1key");
        assert_eq!(ring.next_hash(u32::MAX, "key", 1), u32::MAX.wrapping_add(tmp));
    }

    #[test]
    fn test_ownership_sums_to_key_space() {
        let ring = ring_of(&[(100, 0), (200, 1), (300, 1), (300, 0)], 2);
        let owned = ring.ownership();
        assert_eq!(owned.values().sum::<u64>(), 1u64 << 32);
        assert_eq!(owned[&NodeId(1)], 100 + 50);

        let single = ring_of(&[(42, 0)], 1);
        assert_eq!(single.ownership()[&NodeId(0)], 1u64 << 32);
    }

    #[test]
    fn test_strict_mode_returns_dead_primary() {
        let ring = KetamaRing::from_points(
            [RingPoint::new(100, NodeId(0)), RingPoint::new(200, NodeId(1))],
            2,
            HashAlgorithm::Fnv1_32,
            FailureMode::Strict,
        );
        let primary = ring.primary("key").unwrap();
        assert_eq!(ring.route("key", &|_: NodeId| false), Some(primary));
    }
}
