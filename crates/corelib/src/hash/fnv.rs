//! Fowler–Noll–Vo hashes over UTF-16 code units.

const FNV_64_INIT: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_64_PRIME: u64 = 0x0000_0100_0000_01b3;
const FNV_32_INIT: u32 = 2_166_136_261;
const FNV_32_PRIME: u32 = 16_777_619;

/// FNV-1, 64-bit.
pub fn fnv1_64(key: &str) -> u64 {
    key.encode_utf16().fold(FNV_64_INIT, |rv, unit| {
        rv.wrapping_mul(FNV_64_PRIME) ^ u64::from(unit)
    })
}

/// FNV-1a, 64-bit.
pub fn fnv1a_64(key: &str) -> u64 {
    key.encode_utf16().fold(FNV_64_INIT, |rv, unit| {
        (rv ^ u64::from(unit)).wrapping_mul(FNV_64_PRIME)
    })
}

/// FNV-1, 32-bit.
pub fn fnv1_32(key: &str) -> u32 {
    key.encode_utf16().fold(FNV_32_INIT, |rv, unit| {
        rv.wrapping_mul(FNV_32_PRIME) ^ u32::from(unit)
    })
}

/// FNV-1a, 32-bit.
pub fn fnv1a_32(key: &str) -> u32 {
    key.encode_utf16().fold(FNV_32_INIT, |rv, unit| {
        (rv ^ u32::from(unit)).wrapping_mul(FNV_32_PRIME)
    })
}
