//! Locator abstraction: key → node.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::hash::HashAlgorithm;
use crate::node::{Node, NodeId};
use crate::ring::ketama::KetamaRing;
use crate::ring::modulo::ModuloLocator;

/// Maps keys onto node ids.
///
/// Implementations are immutable snapshots and must be safe to share across
/// threads without locking.
pub trait NodeLocator: Send + Sync + 'static {
    /// Node the key maps to, ignoring availability.
    fn primary(&self, key: &str) -> Option<NodeId>;

    /// Node the key maps to, skipping nodes for which `is_live` is false.
    ///
    /// Returns `None` when no node is available, or when the locator is empty.
    fn route(&self, key: &str, is_live: &dyn Fn(NodeId) -> bool) -> Option<NodeId>;

    /// Number of nodes this locator was built over.
    fn node_count(&self) -> usize;

    /// Distribution name, for logging.
    fn name(&self) -> &'static str;
}

/// Key distribution strategy.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distribution {
    ArrayMod,
    #[default]
    #[serde(alias = "consistent_ketama")]
    Ketama,
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distribution::ArrayMod => f.write_str("array_mod"),
            Distribution::Ketama => f.write_str("ketama"),
        }
    }
}

impl FromStr for Distribution {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "array_mod" => Ok(Distribution::ArrayMod),
            "ketama" | "consistent_ketama" => Ok(Distribution::Ketama),
            other => Err(Error::UnsupportedDistribution(other.to_string())),
        }
    }
}

/// What routing does when the selected node is unavailable.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Move the key to another live node.
    #[default]
    Redistribute,
    /// Never fail over; the key stays on its primary node.
    Strict,
}

impl fmt::Display for FailureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureMode::Redistribute => f.write_str("redistribute"),
            FailureMode::Strict => f.write_str("strict"),
        }
    }
}

impl FromStr for FailureMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "redistribute" => Ok(FailureMode::Redistribute),
            "strict" => Ok(FailureMode::Strict),
            other => Err(Error::UnsupportedFailureMode(other.to_string())),
        }
    }
}

/// A built locator of either distribution.
#[derive(Debug, Clone)]
pub enum Locator {
    Ketama(KetamaRing),
    ArrayMod(ModuloLocator),
}

impl Locator {
    pub fn build(
        distribution: Distribution,
        nodes: &[Node],
        hash_alg: HashAlgorithm,
        failure_mode: FailureMode,
    ) -> Self {
        match distribution {
            Distribution::Ketama => {
                Locator::Ketama(KetamaRing::build(nodes, hash_alg, failure_mode))
            }
            Distribution::ArrayMod => {
                Locator::ArrayMod(ModuloLocator::new(nodes.len(), hash_alg, failure_mode))
            }
        }
    }

    pub fn distribution(&self) -> Distribution {
        match self {
            Locator::Ketama(_) => Distribution::Ketama,
            Locator::ArrayMod(_) => Distribution::ArrayMod,
        }
    }

    /// The ketama continuum, when this locator has one.
    pub fn as_ketama(&self) -> Option<&KetamaRing> {
        match self {
            Locator::Ketama(ring) => Some(ring),
            Locator::ArrayMod(_) => None,
        }
    }

    fn inner(&self) -> &dyn NodeLocator {
        match self {
            Locator::Ketama(ring) => ring,
            Locator::ArrayMod(modulo) => modulo,
        }
    }
}

impl NodeLocator for Locator {
    fn primary(&self, key: &str) -> Option<NodeId> {
        self.inner().primary(key)
    }

    fn route(&self, key: &str, is_live: &dyn Fn(NodeId) -> bool) -> Option<NodeId> {
        self.inner().route(key, is_live)
    }

    fn node_count(&self) -> usize {
        self.inner().node_count()
    }

    fn name(&self) -> &'static str {
        self.inner().name()
    }
}
