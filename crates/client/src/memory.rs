//! In-process cache nodes.
//!
//! [`MemoryCluster`] hosts one [`MemoryServer`] per node address and hands
//! out [`MemoryTransport`] links to them, so the whole client stack can run
//! without sockets. Servers can be taken down and can have faults queued
//! for their next requests.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use corelib::node::Node;
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::config::TransportOptions;
use crate::transport::{CounterOp, Item, NodeTransport, StoreMode, TransportError};

/// TTLs above this many seconds are absolute unix timestamps.
const MAX_RELATIVE_TTL: u32 = 60 * 60 * 24 * 30;

#[derive(Debug, Clone)]
struct Entry {
    item: Item,
    expires_at: Option<SystemTime>,
}

impl Entry {
    fn new(item: Item, ttl: u32) -> Self {
        let expires_at = match ttl {
            0 => None,
            ttl if ttl <= MAX_RELATIVE_TTL => {
                Some(SystemTime::now() + Duration::from_secs(u64::from(ttl)))
            }
            ttl => Some(UNIX_EPOCH + Duration::from_secs(u64::from(ttl))),
        };
        Self { item, expires_at }
    }

    fn is_live(&self, now: SystemTime) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

#[derive(Debug, Default)]
struct Counters {
    requests: AtomicU64,
    cmd_get: AtomicU64,
    cmd_set: AtomicU64,
    get_hits: AtomicU64,
    get_misses: AtomicU64,
}

/// A single in-memory cache node.
#[derive(Debug)]
pub struct MemoryServer {
    address: String,
    entries: DashMap<String, Entry>,
    up: AtomicBool,
    faults: Mutex<VecDeque<TransportError>>,
    counters: Counters,
}

impl MemoryServer {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            entries: DashMap::new(),
            up: AtomicBool::new(true),
            faults: Mutex::new(VecDeque::new()),
            counters: Counters::default(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_up(&self) -> bool {
        self.up.load(Ordering::Acquire)
    }

    /// While down, every request fails with a refused connection and links
    /// report themselves disconnected.
    pub fn set_up(&self, up: bool) {
        self.up.store(up, Ordering::Release);
    }

    /// Fail the next request with `err`. Queued faults fire in order.
    pub fn fail_next(&self, err: TransportError) {
        self.faults.lock().push_back(err);
    }

    /// Requests received, including failed ones.
    pub fn requests(&self) -> u64 {
        self.counters.requests.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        let now = SystemTime::now();
        self.entries.iter().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw lookup, bypassing faults and counters.
    pub fn peek(&self, key: &str) -> Option<Item> {
        self.lookup(key)
    }

    fn begin(&self) -> Result<(), TransportError> {
        self.counters.requests.fetch_add(1, Ordering::Relaxed);
        if let Some(err) = self.faults.lock().pop_front() {
            return Err(err);
        }
        if !self.is_up() {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("{} is down", self.address),
            )
            .into());
        }
        Ok(())
    }

    fn lookup(&self, key: &str) -> Option<Item> {
        let now = SystemTime::now();
        let live = self.entries.get(key).filter(|e| e.is_live(now)).map(|e| e.item.clone());
        if live.is_none() {
            self.entries.remove_if(key, |_, e| !e.is_live(now));
        }
        live
    }

    fn store(&self, mode: StoreMode, key: &str, item: Item, ttl: u32) -> Result<bool, TransportError> {
        self.begin()?;
        self.counters.cmd_set.fetch_add(1, Ordering::Relaxed);
        // The shard lock is held from the presence check through the write.
        match self.entries.entry(key.to_string()) {
            MapEntry::Vacant(vacant) => {
                if mode == StoreMode::Replace {
                    return Ok(false);
                }
                vacant.insert(Entry::new(item, ttl));
            }
            MapEntry::Occupied(mut occupied) => {
                let present = occupied.get().is_live(SystemTime::now());
                let accepted = match mode {
                    StoreMode::Set => true,
                    StoreMode::Add => !present,
                    StoreMode::Replace => present,
                };
                if !accepted {
                    if !present {
                        occupied.remove();
                    }
                    return Ok(false);
                }
                occupied.insert(Entry::new(item, ttl));
            }
        }
        Ok(true)
    }

    fn get(&self, key: &str) -> Result<Option<Item>, TransportError> {
        self.begin()?;
        self.counters.cmd_get.fetch_add(1, Ordering::Relaxed);
        let item = self.lookup(key);
        let counter = if item.is_some() {
            &self.counters.get_hits
        } else {
            &self.counters.get_misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(item)
    }

    fn get_multi(&self, keys: &[&str]) -> Result<HashMap<String, Item>, TransportError> {
        self.begin()?;
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            self.counters.cmd_get.fetch_add(1, Ordering::Relaxed);
            match self.lookup(key) {
                Some(item) => {
                    self.counters.get_hits.fetch_add(1, Ordering::Relaxed);
                    found.insert(key.to_string(), item);
                }
                None => {
                    self.counters.get_misses.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        Ok(found)
    }

    fn delete(&self, key: &str) -> Result<bool, TransportError> {
        self.begin()?;
        let now = SystemTime::now();
        Ok(self
            .entries
            .remove(key)
            .map_or(false, |(_, entry)| entry.is_live(now)))
    }

    fn mutate(
        &self,
        op: CounterOp,
        key: &str,
        by: u64,
        initial: u64,
        ttl: u32,
    ) -> Result<u64, TransportError> {
        self.begin()?;
        let fresh = || Entry::new(Item::new(initial.to_string(), 0), ttl);
        let mut slot = match self.entries.entry(key.to_string()) {
            MapEntry::Vacant(vacant) => {
                vacant.insert(fresh());
                return Ok(initial);
            }
            MapEntry::Occupied(occupied) => occupied,
        };
        if !slot.get().is_live(SystemTime::now()) {
            slot.insert(fresh());
            return Ok(initial);
        }

        let current = std::str::from_utf8(&slot.get().item.data)
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .ok_or_else(|| {
                TransportError::Protocol(format!(
                    "cannot {} non-numeric value of {}",
                    op.name(),
                    key
                ))
            })?;
        let next = match op {
            CounterOp::Incr => current.wrapping_add(by),
            CounterOp::Decr => current.saturating_sub(by),
        };
        let entry = slot.get_mut();
        entry.item = Item::new(next.to_string(), entry.item.flags);
        Ok(next)
    }

    fn flush(&self) -> Result<(), TransportError> {
        self.begin()?;
        self.entries.clear();
        Ok(())
    }

    fn stats(&self) -> Result<HashMap<String, String>, TransportError> {
        self.begin()?;
        let c = &self.counters;
        Ok(HashMap::from([
            ("curr_items".to_string(), self.len().to_string()),
            ("cmd_get".to_string(), c.cmd_get.load(Ordering::Relaxed).to_string()),
            ("cmd_set".to_string(), c.cmd_set.load(Ordering::Relaxed).to_string()),
            ("get_hits".to_string(), c.get_hits.load(Ordering::Relaxed).to_string()),
            ("get_misses".to_string(), c.get_misses.load(Ordering::Relaxed).to_string()),
        ]))
    }
}

/// A set of in-memory nodes keyed by `host:port`.
#[derive(Debug, Clone, Default)]
pub struct MemoryCluster {
    servers: Arc<DashMap<String, Arc<MemoryServer>>>,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// The server for an address, created on first use.
    pub fn server(&self, address: &str) -> Arc<MemoryServer> {
        self.servers
            .entry(address.to_string())
            .or_insert_with(|| Arc::new(MemoryServer::new(address)))
            .clone()
    }

    pub fn servers(&self) -> Vec<Arc<MemoryServer>> {
        self.servers.iter().map(|s| s.value().clone()).collect()
    }

    /// Connector for [`crate::Client::new`].
    pub fn connect(
        &self,
        node: &Node,
        options: &TransportOptions,
    ) -> Result<MemoryTransport, TransportError> {
        tracing::debug!(node = %node, protocol = %options.protocol, "connecting to memory node");
        Ok(MemoryTransport {
            server: self.server(&node.address()),
            closed: AtomicBool::new(false),
        })
    }
}

/// A link to a [`MemoryServer`].
#[derive(Debug)]
pub struct MemoryTransport {
    server: Arc<MemoryServer>,
    closed: AtomicBool,
}

impl MemoryTransport {
    pub fn server(&self) -> &Arc<MemoryServer> {
        &self.server
    }

    fn open(&self) -> Result<&MemoryServer, TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        Ok(&self.server)
    }
}

impl NodeTransport for MemoryTransport {
    fn store(&self, mode: StoreMode, key: &str, item: Item, ttl: u32) -> Result<bool, TransportError> {
        self.open()?.store(mode, key, item, ttl)
    }

    fn get(&self, key: &str) -> Result<Option<Item>, TransportError> {
        self.open()?.get(key)
    }

    fn get_multi(&self, keys: &[&str]) -> Result<HashMap<String, Item>, TransportError> {
        self.open()?.get_multi(keys)
    }

    fn delete(&self, key: &str) -> Result<bool, TransportError> {
        self.open()?.delete(key)
    }

    fn mutate(
        &self,
        op: CounterOp,
        key: &str,
        by: u64,
        initial: u64,
        ttl: u32,
    ) -> Result<u64, TransportError> {
        self.open()?.mutate(op, key, by, initial, ttl)
    }

    fn flush(&self) -> Result<(), TransportError> {
        self.open()?.flush()
    }

    fn stats(&self) -> Result<HashMap<String, String>, TransportError> {
        self.open()?.stats()
    }

    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::Acquire) && self.server.is_up()
    }

    fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
