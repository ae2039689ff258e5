//! CRC32 (IEEE 802.3, polynomial `0xEDB88320`) and its lowercase-ASCII-folded variant.
//!
//! Used throughout the archive parsers as the name-hash key for table lookups.

use std::sync::OnceLock;

const POLY: u32 = 0xEDB8_8320;

fn table() -> &'static [u32; 256] {
    static TABLE: OnceLock<[u32; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut c = i as u32;
            let mut k = 0;
            while k < 8 {
                c = if c & 1 != 0 { POLY ^ (c >> 1) } else { c >> 1 };
                k += 1;
            }
            table[i] = c;
            i += 1;
        }
        table
    })
}

/// Continues a CRC32 computation from `state` over `bytes`.
///
/// `state` should be `0xFFFFFFFF` for a fresh computation; the caller is responsible for applying
/// the final XOR once the stream of partial updates is complete (see [`crc32`]).
pub fn crc32_update(state: u32, bytes: &[u8]) -> u32 {
    let table = table();
    let mut crc = state;
    for &b in bytes {
        let idx = ((crc ^ b as u32) & 0xFF) as usize;
        crc = table[idx] ^ (crc >> 8);
    }
    crc
}

/// Continues a lowercase-ASCII-folded CRC32 computation.
pub fn crc32_lowercase_update(state: u32, bytes: &[u8]) -> u32 {
    let table = table();
    let mut crc = state;
    for &b in bytes {
        let b = b.to_ascii_lowercase();
        let idx = ((crc ^ b as u32) & 0xFF) as usize;
        crc = table[idx] ^ (crc >> 8);
    }
    crc
}

/// CRC32 of `bytes`. `crc32(b"") == 0`.
pub fn crc32(bytes: &[u8]) -> u32 {
    crc32_update(0xFFFF_FFFF, bytes) ^ 0xFFFF_FFFF
}

/// CRC32 of `bytes` with ASCII letters folded to lowercase before mixing.
pub fn crc32_lowercase(bytes: &[u8]) -> u32 {
    crc32_lowercase_update(0xFFFF_FFFF, bytes) ^ 0xFFFF_FFFF
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_zero() {
        assert_eq!(crc32(b""), 0);
        assert_eq!(crc32_lowercase(b""), 0);
    }

    #[test]
    fn known_vector() {
        // Canonical "123456789" CRC32 check value for this polynomial/init/xorout combination.
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn pinned_vectors() {
        assert_eq!(crc32(b"abcdxyz"), 0x8B88_38C2);
        assert_eq!(crc32(b"ABCDXYZ"), 0xB4CD_C6D8);
        assert_eq!(crc32(b"AaBbCcDdXxYyZz"), 0xFC1B_D0B1);
        assert_eq!(crc32_lowercase(b"ABCDXYZ"), 0x8B88_38C2);
        assert_eq!(crc32_lowercase(b"AaBbCcDdXxYyZz"), 0xAD7F_9CBD);
    }

    #[test]
    fn lowercase_folds_case() {
        assert_eq!(crc32_lowercase(b"HELLO"), crc32(b"hello"));
        assert_eq!(crc32_lowercase(b"Hello"), crc32_lowercase(b"hello"));
    }

    #[test]
    fn streaming_matches_oneshot() {
        let whole = crc32(b"uniquetexturemain");
        let mut state = 0xFFFF_FFFFu32;
        state = crc32_update(state, b"unique");
        state = crc32_update(state, b"texturemain");
        assert_eq!(state ^ 0xFFFF_FFFF, whole);
    }
}
