//! Cache cluster client.
//!
//! Sits on top of `corelib`'s ring and node registry and adds everything a
//! caller talks to:
//!
//! - [`config`]: server list and option parsing
//! - [`transport`]: the per-node request contract, with an in-memory
//!   implementation in [`memory`]
//! - [`pool`]: round-robin slots, each a [`cluster::ClusterClient`]
//! - [`executor`]: timeout-only retry loop
//! - [`Client`]: the operation facade

pub mod client;
pub mod cluster;
pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod executor;
pub mod memory;
pub mod pool;
pub mod transport;

pub use client::Client;
pub use cluster::ClusterClient;
pub use codec::{CodecError, JsonCodec, RawCodec, ValueCodec};
pub use config::{ClientConfig, Protocol, ServerList, TransportOptions};
pub use connection::Connection;
pub use error::{Error, ErrorKind, Result};
pub use executor::{OperationExecutor, RetryPolicy};
pub use memory::{MemoryCluster, MemoryServer, MemoryTransport};
pub use pool::ConnectionPool;
pub use transport::{CounterOp, Item, NodeTransport, StoreMode, TransportError};
