//! Core library for distributing cache keys across a cluster.
//!
//! This crate provides the routing building blocks:
//! - Server nodes and address parsing
//! - Key hash algorithms (FNV, CRC, native, ketama)
//! - Ring points and the ketama continuum
//! - Modulo distribution
//! - A node registry publishing immutable locator snapshots

pub mod error;
pub mod hash;
pub mod node;
pub mod registry;
pub mod ring;
pub mod vnode;

pub use error::{Error, Result};
pub use hash::HashAlgorithm;
pub use node::{Node, NodeId};
pub use registry::NodeRegistry;
pub use ring::{Distribution, FailureMode, Locator, NodeLocator, Ring, RingBuilder};
pub use vnode::RingPoint;
