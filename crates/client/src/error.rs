//! Client error taxonomy.
//!
//! Callers branch on [`ErrorKind`]: `NotFound`/`NotStored` mean the key is
//! genuinely absent or occupied, `TimedOut` is a transient cluster fault, and
//! the configuration kinds mean the client was never usable.

use thiserror::Error;

use crate::codec::CodecError;
use crate::transport::TransportError;

/// Result type alias for the client.
pub type Result<T> = std::result::Result<T, Error>;

/// Discriminant of [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    NotStored,
    TimedOut,
    Interrupted,
    ConfigurationUnsupported,
    InvalidConfiguration,
    Transport,
    Codec,
    NoServerAvailable,
    ShutDown,
}

/// Terminal failure of a client operation.
#[derive(Debug, Error)]
pub enum Error {
    /// Read or delete target is absent.
    #[error("not found: {0}")]
    NotFound(String),
    /// add/replace/set was rejected by the server.
    #[error("not stored: {0}")]
    NotStored(String),
    /// Retries against timeout-classified faults were exhausted.
    #[error("a timeout occurred: {0}")]
    TimedOut(String),
    /// A blocking wait was aborted.
    #[error("interrupted: {0}")]
    Interrupted(String),
    /// Unrecognised `distribution`, `hash` or `failure_mode` value.
    #[error("not supported: {0}")]
    ConfigurationUnsupported(String),
    /// Malformed option value or server entry.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// Any other I/O or protocol failure.
    #[error("transport error: {0}")]
    Transport(String),
    #[error("codec error: {0}")]
    Codec(String),
    /// Every candidate node for the key is down.
    #[error("no server available for key {0}")]
    NoServerAvailable(String),
    #[error("client has been shut down")]
    ShutDown,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::NotStored(_) => ErrorKind::NotStored,
            Error::TimedOut(_) => ErrorKind::TimedOut,
            Error::Interrupted(_) => ErrorKind::Interrupted,
            Error::ConfigurationUnsupported(_) => ErrorKind::ConfigurationUnsupported,
            Error::InvalidConfiguration(_) => ErrorKind::InvalidConfiguration,
            Error::Transport(_) => ErrorKind::Transport,
            Error::Codec(_) => ErrorKind::Codec,
            Error::NoServerAvailable(_) => ErrorKind::NoServerAvailable,
            Error::ShutDown => ErrorKind::ShutDown,
        }
    }

    /// Only timeout-classified faults are retried.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::TimedOut
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        if err.is_timeout() {
            Error::TimedOut(err.to_string())
        } else if err.is_interrupted() {
            Error::Interrupted(err.to_string())
        } else {
            Error::Transport(err.to_string())
        }
    }
}

impl From<CodecError> for Error {
    fn from(err: CodecError) -> Self {
        Error::Codec(err.to_string())
    }
}

impl From<corelib::Error> for Error {
    fn from(err: corelib::Error) -> Self {
        if err.is_unsupported() {
            Error::ConfigurationUnsupported(err.to_string())
        } else {
            Error::InvalidConfiguration(err.to_string())
        }
    }
}
