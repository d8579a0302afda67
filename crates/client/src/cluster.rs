//! Cluster client: one connection per node, routed through the registry.
//!
//! Each pool slot owns a [`ClusterClient`]. All slots share the same
//! [`NodeRegistry`], so a ring rebuild or a liveness change is seen by every
//! slot on its next lookup.

use std::collections::HashMap;
use std::sync::Arc;

use corelib::node::{Node, NodeId};
use corelib::registry::NodeRegistry;

use crate::config::TransportOptions;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::transport::{Item, NodeTransport, TransportError};

/// Routes keys to per-node connections.
#[derive(Debug)]
pub struct ClusterClient<T> {
    index: usize,
    registry: Arc<NodeRegistry>,
    /// Indexed by node id.
    connections: Vec<Connection<T>>,
}

impl<T: NodeTransport> ClusterClient<T> {
    /// Open one connection per registered node.
    pub fn connect<F>(
        index: usize,
        registry: Arc<NodeRegistry>,
        options: &TransportOptions,
        connector: &F,
    ) -> Result<Self>
    where
        F: Fn(&Node, &TransportOptions) -> std::result::Result<T, TransportError>,
    {
        let connections = registry
            .nodes()
            .into_iter()
            .map(|node| -> Result<Connection<T>> {
                let transport = connector(&node, options)?;
                Ok(Connection::new(node, transport))
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(slot = index, nodes = connections.len(), "cluster client connected");
        Ok(Self {
            index,
            registry,
            connections,
        })
    }

    /// Position of this client in its pool.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn connections(&self) -> &[Connection<T>] {
        &self.connections
    }

    fn usable(&self, id: NodeId) -> bool {
        self.connections
            .get(id.0)
            .map(Connection::is_usable)
            .unwrap_or(false)
    }

    /// Connection currently responsible for `key`.
    pub fn route(&self, key: &str) -> Result<&Connection<T>> {
        self.registry
            .route(key, |id| self.usable(id))
            .and_then(|id| self.connections.get(id.0))
            .ok_or_else(|| Error::NoServerAvailable(key.to_string()))
    }

    /// Fetch keys from their owning nodes, one request per node.
    pub fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, Item>> {
        let mut batches: HashMap<NodeId, Vec<&str>> = HashMap::new();
        for key in keys {
            let conn = self.route(key)?;
            batches.entry(conn.node().id).or_default().push(key.as_str());
        }

        let mut found = HashMap::with_capacity(keys.len());
        for (id, batch) in batches {
            let conn = &self.connections[id.0];
            found.extend(conn.transport()?.get_multi(&batch)?);
        }
        Ok(found)
    }

    fn reachable(&self) -> impl Iterator<Item = &Connection<T>> {
        self.connections
            .iter()
            .filter(|conn| self.registry.is_alive(conn.node().id) && conn.is_usable())
    }

    /// Flush every reachable node.
    pub fn flush_all(&self) -> Result<()> {
        for conn in self.reachable() {
            conn.transport()?.flush()?;
        }
        Ok(())
    }

    /// Statistics per reachable node, keyed by `host:port`.
    pub fn stats_all(&self) -> Result<HashMap<String, HashMap<String, String>>> {
        self.reachable()
            .map(|conn| -> Result<(String, HashMap<String, String>)> {
                Ok((conn.node().address(), conn.transport()?.stats()?))
            })
            .collect()
    }

    /// Close every connection, logging failures.
    pub fn close(&self) {
        for conn in &self.connections {
            if let Err(err) = conn.close() {
                tracing::warn!(slot = self.index, node = %conn.node(), error = %err, "failed to close connection");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::memory::{MemoryCluster, MemoryTransport};
    use crate::transport::StoreMode;
    use corelib::hash::HashAlgorithm;
    use corelib::ring::{Distribution, FailureMode};

    fn cluster_client(cluster: &MemoryCluster, hosts: &[&str]) -> ClusterClient<MemoryTransport> {
        let nodes = hosts
            .iter()
            .enumerate()
            .map(|(i, h)| Node::new(NodeId(i), *h, 11211))
            .collect();
        let registry = NodeRegistry::new(
            nodes,
            Distribution::Ketama,
            HashAlgorithm::Fnv1_32,
            FailureMode::Redistribute,
        )
        .unwrap();
        let connector = |node: &Node, opts: &TransportOptions| cluster.connect(node, opts);
        ClusterClient::connect(0, Arc::new(registry), &TransportOptions::default(), &connector)
            .unwrap()
    }

    #[test]
    fn test_route_skips_down_server() {
        let cluster = MemoryCluster::new();
        let client = cluster_client(&cluster, &["10.0.0.1", "10.0.0.2"]);
        let primary = client.route("key-1").unwrap().node().clone();

        cluster.server(&primary.address()).set_up(false);
        let rerouted = client.route("key-1").unwrap();
        assert_ne!(rerouted.node().id, primary.id);
    }

    #[test]
    fn test_no_server_available() {
        let cluster = MemoryCluster::new();
        let client = cluster_client(&cluster, &["10.0.0.1"]);
        client.registry().mark_down(NodeId(0)).unwrap();
        assert_eq!(client.route("k").unwrap_err().kind(), ErrorKind::NoServerAvailable);
    }

    #[test]
    fn test_get_multi_batches_per_node() {
        let cluster = MemoryCluster::new();
        let client = cluster_client(&cluster, &["10.0.0.1", "10.0.0.2", "10.0.0.3"]);
        let keys: Vec<String> = (0..20).map(|i| format!("key-{}", i)).collect();
        for key in &keys[..10] {
            let conn = client.route(key).unwrap();
            conn.transport()
                .unwrap()
                .store(StoreMode::Set, key, Item::new("v", 0), 0)
                .unwrap();
        }

        let found = client.get_multi(&keys).unwrap();
        assert_eq!(found.len(), 10);
        let requests: u64 = cluster.servers().iter().map(|s| s.requests()).sum();
        // ten sets plus at most one multi-get per node
        assert!(requests <= 13, "{} requests", requests);
    }

    #[test]
    fn test_stats_skip_down_nodes() {
        let cluster = MemoryCluster::new();
        let client = cluster_client(&cluster, &["10.0.0.1", "10.0.0.2"]);
        client.registry().mark_down(NodeId(1)).unwrap();
        let stats = client.stats_all().unwrap();
        assert_eq!(stats.len(), 1);
        assert!(stats.contains_key("10.0.0.1:11211"));
    }
}
