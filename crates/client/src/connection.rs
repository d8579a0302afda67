//! A transport bound to its node.

use std::sync::atomic::{AtomicBool, Ordering};

use corelib::node::Node;

use crate::transport::{NodeTransport, TransportError};

/// One node link owned by a pool slot.
#[derive(Debug)]
pub struct Connection<T> {
    node: Node,
    transport: T,
    closed: AtomicBool,
}

impl<T: NodeTransport> Connection<T> {
    pub fn new(node: Node, transport: T) -> Self {
        Self {
            node,
            transport,
            closed: AtomicBool::new(false),
        }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Open and reported connected by the transport.
    pub fn is_usable(&self) -> bool {
        !self.is_closed() && self.transport.is_connected()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// The transport, unless the connection was closed.
    pub fn transport(&self) -> Result<&T, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        Ok(&self.transport)
    }

    /// Close the link. Only the first call reaches the transport.
    pub fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        tracing::debug!(node = %self.node, "closing connection");
        self.transport.close()
    }
}
