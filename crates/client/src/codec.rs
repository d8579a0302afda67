//! Value codecs.
//!
//! A codec turns caller values into the bytes and flags a node stores, and
//! back. The flags let a reader reject items written by another codec.

use std::marker::PhantomData;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::transport::Item;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unexpected item flags {found:#x}, expected {expected:#x}")]
    UnexpectedFlags { expected: u32, found: u32 },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Serializes values for storage.
pub trait ValueCodec: Send + Sync + 'static {
    type Value;

    fn encode(&self, value: &Self::Value) -> Result<Item, CodecError>;

    fn decode(&self, data: &[u8], flags: u32) -> Result<Self::Value, CodecError>;
}

/// Stores bytes as-is with flags 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl ValueCodec for RawCodec {
    type Value = Bytes;

    fn encode(&self, value: &Bytes) -> Result<Item, CodecError> {
        Ok(Item::new(value.clone(), 0))
    }

    fn decode(&self, data: &[u8], _flags: u32) -> Result<Bytes, CodecError> {
        Ok(Bytes::copy_from_slice(data))
    }
}

/// JSON values, tagged with [`JsonCodec::FLAGS`].
#[derive(Debug)]
pub struct JsonCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    pub const FLAGS: u32 = 0x2;

    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> ValueCodec for JsonCodec<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    type Value = T;

    fn encode(&self, value: &T) -> Result<Item, CodecError> {
        Ok(Item::new(serde_json::to_vec(value)?, Self::FLAGS))
    }

    fn decode(&self, data: &[u8], flags: u32) -> Result<T, CodecError> {
        if flags != Self::FLAGS {
            return Err(CodecError::UnexpectedFlags {
                expected: Self::FLAGS,
                found: flags,
            });
        }
        Ok(serde_json::from_slice(data)?)
    }
}
