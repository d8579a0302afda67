//! Client facade.
//!
//! [`Client`] ties the pieces together: keys are prefixed, routed through
//! the shared ring, sent over a pool slot's connection, and retried by the
//! executor when the transport times out. Values pass through the codec on
//! the way in and out.
//!
//! # Example
//!
//! ```rust
//! use client::{Client, ClientConfig, JsonCodec, MemoryCluster};
//!
//! let cluster = MemoryCluster::new();
//! let client = Client::new(
//!     ClientConfig::new("10.0.0.1:11211 10.0.0.2:11211"),
//!     JsonCodec::<Vec<u32>>::new(),
//!     |node, opts| cluster.connect(node, opts),
//! )
//! .unwrap();
//!
//! client.set("scores", &vec![3, 1, 4], None).unwrap();
//! assert_eq!(client.get("scores").unwrap(), vec![3, 1, 4]);
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use corelib::node::Node;
use corelib::registry::NodeRegistry;

use crate::codec::ValueCodec;
use crate::config::{ClientConfig, ServerList, TransportOptions};
use crate::error::{Error, Result};
use crate::executor::OperationExecutor;
use crate::pool::ConnectionPool;
use crate::transport::{CounterOp, Item, NodeTransport, StoreMode, TransportError};

/// Cache cluster client.
#[derive(Debug)]
pub struct Client<T, C> {
    config: ClientConfig,
    registry: Arc<NodeRegistry>,
    pool: ConnectionPool<T>,
    executor: OperationExecutor,
    codec: C,
}

impl<T, C> Client<T, C>
where
    T: NodeTransport,
    C: ValueCodec,
{
    /// Validate `config`, build the ring and open the pool. `connector` is
    /// called once per node per pool slot, and only after the configuration
    /// has been accepted.
    pub fn new<F>(config: ClientConfig, codec: C, connector: F) -> Result<Self>
    where
        F: Fn(&Node, &TransportOptions) -> std::result::Result<T, TransportError>,
    {
        config.validate()?;
        let registry = Arc::new(NodeRegistry::new(
            config.nodes()?,
            config.distribution,
            config.hash,
            config.failure_mode,
        )?);
        let pool = ConnectionPool::build(
            config.pool_size,
            Arc::clone(&registry),
            &config.transport_options(),
            connector,
        )?;

        tracing::info!(
            servers = registry.len(),
            pool_size = config.pool_size,
            retries = config.exception_retry_limit,
            "cache client ready"
        );
        Ok(Self {
            executor: OperationExecutor::new(config.retry_policy()),
            config,
            registry,
            pool,
            codec,
        })
    }

    /// Shorthand for [`ClientConfig::from_options`] followed by [`Client::new`].
    pub fn from_options<F>(
        servers: impl Into<ServerList>,
        options: &HashMap<String, String>,
        codec: C,
        connector: F,
    ) -> Result<Self>
    where
        F: Fn(&Node, &TransportOptions) -> std::result::Result<T, TransportError>,
    {
        Self::new(ClientConfig::from_options(servers, options)?, codec, connector)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn pool(&self) -> &ConnectionPool<T> {
        &self.pool
    }

    /// Run `request` against the node owning `key`. Each attempt takes a
    /// fresh pool slot and routes again.
    fn on_node<R>(
        &self,
        operation: &'static str,
        key: &str,
        request: impl Fn(&T) -> Result<R>,
    ) -> Result<R> {
        self.executor.execute(operation, |attempt| {
            let slot = self.pool.acquire()?;
            let conn = slot.route(key)?;
            tracing::trace!(operation, key, node = %conn.node(), slot = slot.index(), attempt, "dispatching");
            request(conn.transport()?)
        })
    }

    fn store(&self, mode: StoreMode, key: &str, value: &C::Value, ttl: Option<u32>) -> Result<()> {
        let item = self.codec.encode(value)?;
        let key = self.config.prefixed(key);
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        self.on_node(mode.name(), &key, |transport| {
            if transport.store(mode, &key, item.clone(), ttl)? {
                Ok(())
            } else {
                Err(Error::NotStored(key.clone()))
            }
        })
    }

    /// Store only if the key is absent.
    pub fn add(&self, key: &str, value: &C::Value, ttl: Option<u32>) -> Result<()> {
        self.store(StoreMode::Add, key, value, ttl)
    }

    /// Store only if the key is present.
    pub fn replace(&self, key: &str, value: &C::Value, ttl: Option<u32>) -> Result<()> {
        self.store(StoreMode::Replace, key, value, ttl)
    }

    pub fn set(&self, key: &str, value: &C::Value, ttl: Option<u32>) -> Result<()> {
        self.store(StoreMode::Set, key, value, ttl)
    }

    fn get_item(&self, key: &str) -> Result<Option<Item>> {
        let key = self.config.prefixed(key);
        self.on_node("get", &key, |transport| Ok(transport.get(&key)?))
    }

    /// Fails with `NotFound` when the key is absent.
    pub fn get(&self, key: &str) -> Result<C::Value> {
        match self.get_item(key)? {
            Some(item) => Ok(self.codec.decode(&item.data, item.flags)?),
            None => Err(Error::NotFound(self.config.prefixed(key))),
        }
    }

    /// Like [`Client::get`], with a miss reported as `None`.
    pub fn fetch_optional(&self, key: &str) -> Result<Option<C::Value>> {
        match self.get(key) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get_item(key)?.is_some())
    }

    /// Read-through: return the cached value, or store and return what
    /// `producer` builds.
    pub fn fetch(
        &self,
        key: &str,
        ttl: Option<u32>,
        producer: impl FnOnce() -> C::Value,
    ) -> Result<C::Value> {
        if let Some(value) = self.fetch_optional(key)? {
            return Ok(value);
        }
        let value = producer();
        self.set(key, &value, ttl)?;
        Ok(value)
    }

    /// Values for the keys that are present, keyed as given by the caller.
    pub fn get_multi(&self, keys: &[&str]) -> Result<HashMap<String, C::Value>> {
        let prefixed: Vec<String> = keys.iter().map(|k| self.config.prefixed(k)).collect();
        let mut found = self.executor.execute("get_multi", |_| {
            self.pool.acquire()?.get_multi(&prefixed)
        })?;

        let mut values = HashMap::with_capacity(found.len());
        for (key, full) in keys.iter().zip(&prefixed) {
            if let Some(item) = found.remove(full) {
                values.insert(key.to_string(), self.codec.decode(&item.data, item.flags)?);
            }
        }
        Ok(values)
    }

    fn mutate(&self, op: CounterOp, key: &str, by: u64, initial: u64, ttl: Option<u32>) -> Result<u64> {
        let key = self.config.prefixed(key);
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        self.on_node(op.name(), &key, |transport| {
            Ok(transport.mutate(op, &key, by, initial, ttl)?)
        })
    }

    /// Increment a counter. A missing counter starts at 1.
    pub fn incr(&self, key: &str, by: u64, ttl: Option<u32>) -> Result<u64> {
        self.mutate(CounterOp::Incr, key, by, 1, ttl)
    }

    /// Decrement a counter, flooring at 0. A missing counter starts at 0.
    pub fn decr(&self, key: &str, by: u64, ttl: Option<u32>) -> Result<u64> {
        self.mutate(CounterOp::Decr, key, by, 0, ttl)
    }

    /// Fails with `NotFound` when the key was absent.
    pub fn delete(&self, key: &str) -> Result<()> {
        let key = self.config.prefixed(key);
        self.on_node("delete", &key, |transport| {
            if transport.delete(&key)? {
                Ok(())
            } else {
                Err(Error::NotFound(key.clone()))
            }
        })
    }

    /// Flush every reachable server. Not retried.
    pub fn flush(&self) -> Result<()> {
        metrics::counter!("cache_client_attempts_total", "operation" => "flush").increment(1);
        self.pool.acquire()?.flush_all()
    }

    /// Per-server statistics keyed by `host:port`.
    pub fn stats(&self) -> Result<HashMap<String, HashMap<String, String>>> {
        self.executor
            .execute("stats", |_| self.pool.acquire()?.stats_all())
    }

    /// `host:port` of every server currently available.
    pub fn servers(&self) -> Vec<String> {
        self.registry
            .available()
            .iter()
            .map(Node::address)
            .collect()
    }

    /// True while the client is open and at least one server is available.
    pub fn is_active(&self) -> bool {
        !self.pool.is_shut_down() && !self.registry.available().is_empty()
    }

    /// Close all connections. Later operations fail with `ShutDown`.
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }
}
