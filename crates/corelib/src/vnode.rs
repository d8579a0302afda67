//! Ring points (virtual nodes).
//!
//! # Ring Points Concept
//!
//! Each server owns many positions on the 32-bit continuum instead of one.
//! Ketama derives them from MD5 digests of `"<identity>-<i>"`: every digest
//! yields four little-endian words, so a node with weight `w` contributes
//! `160 * w` points.
//!
//! More points per node smooth out the key distribution, and because the
//! positions depend only on the node identity, independently built clients
//! agree on routing for the same server list.

use crate::hash::digest::{digest_word, md5_digest};
use crate::node::{Node, NodeId, MAX_WEIGHT};

/// Points generated per unit of weight.
pub const POINTS_PER_WEIGHT: u32 = 160;

/// Points produced by a single MD5 digest.
pub const POINTS_PER_DIGEST: u32 = 4;

/// One position on the continuum, owned by a node.
///
/// Ordered by hash first, so a sorted `Vec<RingPoint>` is the continuum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RingPoint {
    /// Position on the ring.
    pub hash: u32,
    /// The node that owns this position.
    pub node_id: NodeId,
}

impl RingPoint {
    #[inline]
    pub fn new(hash: u32, node_id: NodeId) -> Self {
        Self { hash, node_id }
    }

    /// All points for one node.
    ///
    /// `160 * weight / 4` digests are computed; the count is exact because
    /// 160 is a multiple of 4. Weights are capped at [`MAX_WEIGHT`].
    pub fn for_node(node: &Node) -> Vec<RingPoint> {
        let identity = node.ketama_identity();
        let weight = u64::from(node.weight.min(MAX_WEIGHT));
        let repetitions = u64::from(POINTS_PER_WEIGHT) * weight;
        let mut points = Vec::with_capacity(repetitions as usize);

        for i in 0..repetitions / u64::from(POINTS_PER_DIGEST) {
            let digest = md5_digest(&format!("{}-{}", identity, i));
            for h in 0..POINTS_PER_DIGEST as usize {
                points.push(RingPoint::new(digest_word(&digest, h * 4), node.id));
            }
        }

        points
    }
}

impl std::fmt::Display for RingPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RingPoint(hash={:08x}, node={})", self.hash, self.node_id)
    }
}
