//! Node abstractions for the cluster.
//!
//! Nodes represent the cache servers a client talks to. They are identified by
//! a compact `NodeId` (their position in the configured server list) that is
//! cheap to compare and hash.

use std::fmt;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Port assumed when a server entry omits one.
pub const DEFAULT_PORT: u16 = 11211;

/// Host used when the server list is empty.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Largest accepted ring weight; a node contributes `160 * weight` points.
pub const MAX_WEIGHT: u32 = 1024;

/// Compact identifier for a node: its index in the configured server list.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A cache server participating in the cluster.
///
/// Keep this struct small and cheap to clone; liveness and connections live in
/// the registry and the client crate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    /// Hostname or IP literal, without brackets for IPv6.
    pub host: String,
    pub port: u16,
    /// Share multiplier on the ring. Always at least 1.
    pub weight: u32,
    /// Resolved address, when the host could be resolved.
    pub socket_address: Option<SocketAddr>,
}

impl Node {
    /// Construct a node with weight 1.
    pub fn new(id: NodeId, host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        let socket_address = host.parse::<IpAddr>().ok().map(|ip| SocketAddr::new(ip, port));
        Self {
            id,
            host,
            port,
            weight: 1,
            socket_address,
        }
    }

    /// Set the ring weight. Must be within `1..=MAX_WEIGHT`.
    pub fn with_weight(mut self, weight: u32) -> Result<Self> {
        if !Self::is_valid_weight(weight) {
            return Err(Error::InvalidWeight {
                node: self.address(),
                weight,
            });
        }
        self.weight = weight;
        Ok(self)
    }

    pub fn is_valid_weight(weight: u32) -> bool {
        (1..=MAX_WEIGHT).contains(&weight)
    }

    /// Parse a server entry: `host`, `host:port`, `host:port:weight`, or the
    /// bracketed IPv6 forms `[addr]`, `[addr]:port`, `[addr]:port:weight`.
    pub fn parse(id: NodeId, entry: &str) -> Result<Self> {
        let entry = entry.trim();
        if entry.is_empty() {
            return Err(Error::InvalidAddress(entry.to_string()));
        }

        let (host, rest) = if let Some(stripped) = entry.strip_prefix('[') {
            let close = stripped
                .find(']')
                .ok_or_else(|| Error::InvalidAddress(entry.to_string()))?;
            let rest = &stripped[close + 1..];
            let rest = match rest.strip_prefix(':') {
                Some(r) => Some(r),
                None if rest.is_empty() => None,
                None => return Err(Error::InvalidAddress(entry.to_string())),
            };
            (&stripped[..close], rest)
        } else if entry.parse::<std::net::Ipv6Addr>().is_ok() {
            // bare IPv6 literal, no room for a port
            (entry, None)
        } else {
            match entry.split_once(':') {
                Some((host, rest)) => (host, Some(rest)),
                None => (entry, None),
            }
        };

        if host.is_empty() {
            return Err(Error::InvalidAddress(entry.to_string()));
        }

        let (port, weight) = match rest {
            None => (DEFAULT_PORT, 1),
            Some(rest) => {
                let (port, weight) = match rest.split_once(':') {
                    Some((port, weight)) => (port, Some(weight)),
                    None => (rest, None),
                };
                let port = port
                    .parse::<u16>()
                    .map_err(|_| Error::InvalidAddress(entry.to_string()))?;
                let weight = match weight {
                    Some(w) => w
                        .parse::<u32>()
                        .map_err(|_| Error::InvalidAddress(entry.to_string()))?,
                    None => 1,
                };
                (port, weight)
            }
        };

        Node::new(id, host, port).with_weight(weight)
    }

    /// Resolve the host through the system resolver if it is not an IP
    /// literal. Resolution failure leaves `socket_address` unset.
    pub fn resolved(mut self) -> Self {
        if self.socket_address.is_none() {
            match (self.host.as_str(), self.port).to_socket_addrs() {
                Ok(mut addrs) => self.socket_address = addrs.next(),
                Err(err) => {
                    tracing::debug!(host = %self.host, error = %err, "could not resolve node address");
                }
            }
        }
        self
    }

    /// `host:port`, bracketing IPv6 hosts.
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Identity string hashed onto the ketama continuum.
    ///
    /// Uses the resolved IP when available and omits the port when it is the
    /// default one, matching libmemcached-compatible clients.
    pub fn ketama_identity(&self) -> String {
        let host = match self.socket_address {
            Some(addr) => addr.ip().to_string(),
            None => self.host.clone(),
        };
        if self.port == DEFAULT_PORT {
            host
        } else {
            format!("{}:{}", host, self.port)
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address())
    }
}

impl FromStr for Node {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Node::parse(NodeId(0), s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        let node = Node::parse(NodeId(0), "10.0.0.1").unwrap();
        assert_eq!(node.port, DEFAULT_PORT);
        assert_eq!(node.weight, 1);

        let node = Node::parse(NodeId(1), "10.0.0.1:11212:3").unwrap();
        assert_eq!(node.id, NodeId(1));
        assert_eq!(node.port, 11212);
        assert_eq!(node.weight, 3);

        let node = Node::parse(NodeId(2), "[::1]:11213").unwrap();
        assert_eq!(node.host, "::1");
        assert_eq!(node.address(), "[::1]:11213");
    }

    #[test]
    fn test_parse_rejects_zero_weight() {
        let err = Node::parse(NodeId(0), "10.0.0.1:11211:0").unwrap_err();
        assert!(matches!(err, Error::InvalidWeight { weight: 0, .. }));
    }

    #[test]
    fn test_parse_rejects_oversized_weight() {
        let err = Node::parse(NodeId(0), "10.0.0.1:11211:26843546").unwrap_err();
        assert!(matches!(err, Error::InvalidWeight { weight: 26_843_546, .. }));

        let err = Node::new(NodeId(0), "10.0.0.1", 11211)
            .with_weight(MAX_WEIGHT + 1)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidWeight { .. }));
        assert!(Node::new(NodeId(0), "10.0.0.1", 11211).with_weight(MAX_WEIGHT).is_ok());
    }

    #[test]
    fn test_parse_rejects_bad_port() {
        assert!(Node::parse(NodeId(0), "10.0.0.1:http").is_err());
        assert!(Node::parse(NodeId(0), "").is_err());
        assert!(Node::parse(NodeId(0), ":11211").is_err());
    }

    #[test]
    fn test_ketama_identity_omits_default_port() {
        let node = Node::new(NodeId(0), "10.0.0.1", DEFAULT_PORT);
        assert_eq!(node.ketama_identity(), "10.0.0.1");

        let node = Node::new(NodeId(0), "10.0.0.1", 11212);
        assert_eq!(node.ketama_identity(), "10.0.0.1:11212");
    }
}
