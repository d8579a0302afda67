//! Round-robin pool of cluster clients.
//!
//! Slots are handed out in strict rotation and are never checked out
//! exclusively: concurrent callers may share a slot, which is why transports
//! must be `Send + Sync`. The cursor is a single atomic counter, so `acquire`
//! never blocks.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use corelib::node::Node;
use corelib::registry::NodeRegistry;

use crate::cluster::ClusterClient;
use crate::config::TransportOptions;
use crate::error::{Error, Result};
use crate::transport::{NodeTransport, TransportError};

#[derive(Debug)]
pub struct ConnectionPool<T> {
    slots: Vec<ClusterClient<T>>,
    cursor: AtomicUsize,
    shut_down: AtomicBool,
}

impl<T: NodeTransport> ConnectionPool<T> {
    /// Wrap prebuilt slots. At least one slot is required.
    pub fn new(slots: Vec<ClusterClient<T>>) -> Result<Self> {
        if slots.is_empty() {
            return Err(Error::InvalidConfiguration(
                "connection pool needs at least one slot".to_string(),
            ));
        }
        Ok(Self {
            slots,
            cursor: AtomicUsize::new(0),
            shut_down: AtomicBool::new(false),
        })
    }

    /// Build `size` slots, each with its own connection to every node.
    pub fn build<F>(
        size: usize,
        registry: Arc<NodeRegistry>,
        options: &TransportOptions,
        connector: F,
    ) -> Result<Self>
    where
        F: Fn(&Node, &TransportOptions) -> std::result::Result<T, TransportError>,
    {
        let slots = (0..size)
            .map(|i| ClusterClient::connect(i, Arc::clone(&registry), options, &connector))
            .collect::<Result<Vec<_>>>()?;
        tracing::info!(size, nodes = registry.len(), "connection pool ready");
        Self::new(slots)
    }

    /// Next slot in rotation.
    pub fn acquire(&self) -> Result<&ClusterClient<T>> {
        if self.is_shut_down() {
            return Err(Error::ShutDown);
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.slots.len();
        Ok(&self.slots[index])
    }

    /// Close every connection of every slot. Later calls do nothing.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        for slot in &self.slots {
            slot.close();
        }
        tracing::info!(size = self.slots.len(), "connection pool shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[ClusterClient<T>] {
        &self.slots
    }
}
