//! Keyed 64-bit data hasher used by ARC name and hash tables
//!
//! The accumulator is kept as two 32-bit words. Every input byte is folded
//! into the low word, after which the accumulator is multiplied by the key
//! with the two cross products added into the high word. Once all bytes are
//! consumed the high word is folded back into the low word.

use std::fmt;

/// Seed and key words for the base ARC hasher
pub const BASE_SEED: (u32, u32) = (0x8422_2325, 0xCBF2_9CE4);
/// Multiplication key for the base ARC hasher
pub const BASE_KEY: (u32, u32) = (0x100, 0x1B3);

/// Text encoding applied before hashing a string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// UTF-8 bytes
    Utf8,
    /// UTF-16 little-endian code units
    Utf16,
}

/// Keyed 64-bit hasher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataHasher {
    seed_low: u32,
    seed_high: u32,
    key_low: u32,
    key_high: u32,
}

impl DataHasher {
    /// Create a hasher from explicit seed and key words
    pub const fn new(seed_low: u32, seed_high: u32, key_low: u32, key_high: u32) -> Self {
        Self {
            seed_low,
            seed_high,
            key_low,
            key_high,
        }
    }

    /// The hasher used by every ARC table
    pub const fn base() -> Self {
        Self::new(BASE_SEED.0, BASE_SEED.1, BASE_KEY.0, BASE_KEY.1)
    }

    /// Hash a byte sequence
    ///
    /// # Examples
    ///
    /// ```
    /// use warc_hash::DataHasher;
    ///
    /// let hasher = DataHasher::base();
    /// assert_eq!(hasher.hash(b""), 0xCBF2_9CE4_4FD0_BFC1);
    /// ```
    pub fn hash(&self, data: &[u8]) -> u64 {
        let mut low = self.seed_low;
        let mut high = self.seed_high;

        for &byte in data {
            low ^= u32::from(byte);

            let cross_low = low.wrapping_mul(self.key_low);
            let cross_high = high.wrapping_mul(self.key_high);

            // high word is zeroed before the widening multiply
            let product = u64::from(low) * u64::from(self.key_high);
            low = product as u32;
            high = (product >> 32) as u32;

            high = high.wrapping_add(cross_low).wrapping_add(cross_high);
        }

        low ^= high;
        (u64::from(high) << 32) | u64::from(low)
    }

    /// Hash a string after encoding it
    pub fn hash_str(&self, data: &str, encoding: Encoding) -> u64 {
        match encoding {
            Encoding::Utf8 => self.hash(data.as_bytes()),
            Encoding::Utf16 => self.hash(&encode_utf16le(data)),
        }
    }
}

impl Default for DataHasher {
    fn default() -> Self {
        Self::base()
    }
}

impl fmt::Display for DataHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "seed={:08x}:{:08x} key={:08x}:{:08x}",
            self.seed_high, self.seed_low, self.key_high, self.key_low
        )
    }
}

/// Encode a string as UTF-16 little-endian bytes
pub fn encode_utf16le(data: &str) -> Vec<u8> {
    data.encode_utf16().flat_map(u16::to_le_bytes).collect()
}
