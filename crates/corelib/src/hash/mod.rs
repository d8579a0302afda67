//! Key hash algorithms.
//!
//! Each algorithm turns a key into a 32-bit position. The functions are
//! bit-compatible with the Java memcached clients: string algorithms walk
//! UTF-16 code units, byte algorithms hash the UTF-8 encoding, and every
//! result is truncated to 32 bits.

pub mod digest;
pub mod fnv;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Hash function fed into key routing.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// `String.hashCode()` reinterpreted as unsigned.
    #[serde(rename = "native")]
    Native,
    /// `(crc32(key) >> 16) & 0x7fff`.
    #[serde(rename = "crc")]
    Crc,
    #[serde(rename = "fnv1_64")]
    Fnv1_64,
    #[serde(rename = "fnv1a_64")]
    Fnv1a64,
    #[default]
    #[serde(rename = "fnv1_32")]
    Fnv1_32,
    #[serde(rename = "fnv1a_32")]
    Fnv1a32,
    /// First four bytes of the MD5 digest, little-endian.
    #[serde(rename = "ketama")]
    Ketama,
}

impl HashAlgorithm {
    pub const ALL: [HashAlgorithm; 7] = [
        HashAlgorithm::Native,
        HashAlgorithm::Crc,
        HashAlgorithm::Fnv1_64,
        HashAlgorithm::Fnv1a64,
        HashAlgorithm::Fnv1_32,
        HashAlgorithm::Fnv1a32,
        HashAlgorithm::Ketama,
    ];

    /// Hash a key to its 32-bit ring position.
    pub fn hash(&self, key: &str) -> u32 {
        match self {
            HashAlgorithm::Native => digest::java_string_hash(key) as u32,
            HashAlgorithm::Crc => digest::crc_hash(key),
            HashAlgorithm::Fnv1_64 => fnv::fnv1_64(key) as u32,
            HashAlgorithm::Fnv1a64 => fnv::fnv1a_64(key) as u32,
            HashAlgorithm::Fnv1_32 => fnv::fnv1_32(key),
            HashAlgorithm::Fnv1a32 => fnv::fnv1a_32(key),
            HashAlgorithm::Ketama => digest::ketama_hash(key),
        }
    }

    /// Option value naming this algorithm.
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Native => "native",
            HashAlgorithm::Crc => "crc",
            HashAlgorithm::Fnv1_64 => "fnv1_64",
            HashAlgorithm::Fnv1a64 => "fnv1a_64",
            HashAlgorithm::Fnv1_32 => "fnv1_32",
            HashAlgorithm::Fnv1a32 => "fnv1a_32",
            HashAlgorithm::Ketama => "ketama",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HashAlgorithm::ALL
            .iter()
            .copied()
            .find(|alg| alg.name() == s)
            .ok_or_else(|| Error::UnsupportedHash(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for alg in HashAlgorithm::ALL {
            assert_eq!(alg.name().parse::<HashAlgorithm>().unwrap(), alg);
        }
    }

    #[test]
    fn test_unknown_name() {
        let err = "murmur3".parse::<HashAlgorithm>().unwrap_err();
        assert_eq!(err, Error::UnsupportedHash("murmur3".into()));
        assert!(err.is_unsupported());
    }

    #[test]
    fn test_default_is_fnv1_32() {
        assert_eq!(HashAlgorithm::default(), HashAlgorithm::Fnv1_32);
    }

    #[test]
    fn test_native_matches_java_hash_code() {
        // "hello".hashCode() == 99162322
        assert_eq!(HashAlgorithm::Native.hash("hello"), 99_162_322);
        // "polygenelubricants".hashCode() == Integer.MIN_VALUE
        assert_eq!(HashAlgorithm::Native.hash("polygenelubricants"), 0x8000_0000);
    }
}
