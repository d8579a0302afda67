//! Digest-based and legacy key hashes.

/// MD5 digest of a string's UTF-8 bytes.
pub fn md5_digest(input: &str) -> [u8; 16] {
    md5::compute(input.as_bytes()).0
}

/// Little-endian u32 from four digest bytes starting at `offset`.
#[inline]
pub fn digest_word(digest: &[u8; 16], offset: usize) -> u32 {
    u32::from_le_bytes([
        digest[offset],
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ])
}

pub fn ketama_hash(key: &str) -> u32 {
    digest_word(&md5_digest(key), 0)
}

pub fn crc_hash(key: &str) -> u32 {
    (crc32fast::hash(key.as_bytes()) >> 16) & 0x7fff
}

/// Java's `String.hashCode()`.
pub fn java_string_hash(key: &str) -> i32 {
    key.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)))
}
