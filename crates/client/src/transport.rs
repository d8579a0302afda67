//! Per-node transport contract.
//!
//! The wire protocol lives outside this crate. A transport is one link to one
//! node: it performs a single request/response, applies the configured
//! operation timeout itself, and reports faults as [`TransportError`].
//! Transports must tolerate concurrent use since pool slots are shared.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::io;

use bytes::Bytes;
use thiserror::Error;

/// Stored payload and its codec flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub data: Bytes,
    pub flags: u32,
}

impl Item {
    pub fn new(data: impl Into<Bytes>, flags: u32) -> Self {
        Self {
            data: data.into(),
            flags,
        }
    }
}

/// Storage command semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreMode {
    /// Store unconditionally.
    Set,
    /// Store only if the key is absent.
    Add,
    /// Store only if the key is present.
    Replace,
}

impl fmt::Display for StoreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl StoreMode {
    pub fn name(&self) -> &'static str {
        match self {
            StoreMode::Set => "set",
            StoreMode::Add => "add",
            StoreMode::Replace => "replace",
        }
    }
}

/// Counter mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterOp {
    Incr,
    Decr,
}

impl CounterOp {
    pub fn name(&self) -> &'static str {
        match self {
            CounterOp::Incr => "incr",
            CounterOp::Decr => "decr",
        }
    }
}

/// Fault reported by a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The operation exceeded its deadline.
    #[error("operation timed out: {0}")]
    TimedOut(String),
    /// The blocking wait was aborted before completion.
    #[error("wait interrupted: {0}")]
    Interrupted(String),
    #[error("connection closed")]
    Closed,
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    /// A fault from a lower layer, kept as the error source.
    #[error("{message}")]
    Wrapped {
        message: String,
        #[source]
        source: Box<dyn StdError + Send + Sync + 'static>,
    },
}

impl TransportError {
    pub fn wrap(
        message: impl Into<String>,
        source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
    ) -> Self {
        TransportError::Wrapped {
            message: message.into(),
            source: source.into(),
        }
    }

    /// True when this fault, or any fault in its source chain, is a timeout.
    pub fn is_timeout(&self) -> bool {
        self.chain_any(
            |err| matches!(err, TransportError::TimedOut(_)),
            |io| matches!(io.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock),
        )
    }

    /// True when this fault, or any fault in its source chain, is an
    /// interrupted wait.
    pub fn is_interrupted(&self) -> bool {
        self.chain_any(
            |err| matches!(err, TransportError::Interrupted(_)),
            |io| io.kind() == io::ErrorKind::Interrupted,
        )
    }

    fn chain_any(
        &self,
        transport: impl Fn(&TransportError) -> bool,
        io_err: impl Fn(&io::Error) -> bool,
    ) -> bool {
        let mut current: Option<&(dyn StdError + 'static)> = Some(self);
        while let Some(err) = current {
            if let Some(t) = err.downcast_ref::<TransportError>() {
                if transport(t) {
                    return true;
                }
                // transparent io variant: the io error is checked next
                if let TransportError::Io(io) = t {
                    if io_err(io) {
                        return true;
                    }
                }
            } else if let Some(io) = err.downcast_ref::<io::Error>() {
                if io_err(io) {
                    return true;
                }
            }
            current = err.source();
        }
        false
    }
}

/// One link to one cache node.
pub trait NodeTransport: Send + Sync + 'static {
    /// Store an item. `Ok(false)` means the server rejected the command.
    fn store(&self, mode: StoreMode, key: &str, item: Item, ttl: u32) -> Result<bool, TransportError>;

    /// `Ok(None)` when the key is absent.
    fn get(&self, key: &str) -> Result<Option<Item>, TransportError>;

    /// Fetch several keys; absent keys are omitted.
    fn get_multi(&self, keys: &[&str]) -> Result<HashMap<String, Item>, TransportError> {
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(item) = self.get(key)? {
                found.insert(key.to_string(), item);
            }
        }
        Ok(found)
    }

    /// `Ok(false)` when the key was absent.
    fn delete(&self, key: &str) -> Result<bool, TransportError>;

    /// Apply a counter mutation, storing `initial` when the key is absent.
    /// Returns the new counter value.
    fn mutate(
        &self,
        op: CounterOp,
        key: &str,
        by: u64,
        initial: u64,
        ttl: u32,
    ) -> Result<u64, TransportError>;

    fn flush(&self) -> Result<(), TransportError>;

    fn stats(&self) -> Result<HashMap<String, String>, TransportError>;

    /// Whether the link can currently carry requests. Routing skips nodes
    /// whose transport reports false.
    fn is_connected(&self) -> bool {
        true
    }

    /// Release the link. Called once, on pool shutdown.
    fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_timeouts_classify_as_timeouts() {
        let err = TransportError::from(io::Error::new(io::ErrorKind::TimedOut, "read"));
        assert!(err.is_timeout());
        assert!(!err.is_interrupted());
    }

    #[test]
    fn test_wrapped_io_timeout() {
        let err = TransportError::wrap(
            "multi-get failed",
            io::Error::new(io::ErrorKind::WouldBlock, "socket read"),
        );
        assert!(err.is_timeout());
    }

    #[test]
    fn test_protocol_error_is_not_a_timeout() {
        let err = TransportError::Protocol("SERVER_ERROR out of memory".into());
        assert!(!err.is_timeout());
        assert!(!err.is_interrupted());
    }

    #[test]
    fn test_wrapped_interrupt() {
        let err = TransportError::wrap("get", TransportError::Interrupted("shutdown".into()));
        assert!(err.is_interrupted());
    }
}
