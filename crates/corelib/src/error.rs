//! Error types for the core library.

use thiserror::Error;

/// Result type alias for the core library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while describing nodes or building a locator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A server address could not be parsed.
    #[error("Invalid node address: {0}")]
    InvalidAddress(String),
    /// Weights must be at least 1; a zero weight would silently drop the node.
    #[error("Invalid weight {weight} for node {node}")]
    InvalidWeight { node: String, weight: u32 },
    /// Unknown key hash algorithm name.
    #[error("hash not supported: {0}")]
    UnsupportedHash(String),
    /// Unknown distribution name.
    #[error("distribution not supported: {0}")]
    UnsupportedDistribution(String),
    /// Unknown failure mode name.
    #[error("failure mode not supported: {0}")]
    UnsupportedFailureMode(String),
    /// A node id does not refer to a registered node.
    #[error("Unknown node: {0}")]
    UnknownNode(usize),
}

impl Error {
    /// True for errors caused by an option value this library does not recognise.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedHash(_)
                | Error::UnsupportedDistribution(_)
                | Error::UnsupportedFailureMode(_)
        )
    }
}
