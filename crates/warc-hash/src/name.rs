//! Name and path hashing helpers
//!
//! Entry names are compared case-insensitively: both the UTF-8 and UTF-16
//! variants are computed from the lowercased name. Full paths are hashed
//! verbatim so differently-cased paths stay distinct.

use crate::hasher::{DataHasher, Encoding};

static BASE: DataHasher = DataHasher::base();

/// Case-folded hash pair of an entry name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct NameHash {
    /// Hash of the lowercased name encoded as UTF-8
    pub utf8: u64,
    /// Hash of the lowercased name encoded as UTF-16LE
    pub utf16: u64,
}

impl NameHash {
    /// Compute the hash pair for `name`
    pub fn of(name: &str) -> Self {
        let folded = fold_case(name);
        Self {
            utf8: BASE.hash_str(&folded, Encoding::Utf8),
            utf16: BASE.hash_str(&folded, Encoding::Utf16),
        }
    }

    /// Select one half of the pair
    pub const fn get(&self, encoding: Encoding) -> u64 {
        match encoding {
            Encoding::Utf8 => self.utf8,
            Encoding::Utf16 => self.utf16,
        }
    }
}

/// Case-folded hash pair of `name`
pub fn name_hash(name: &str) -> NameHash {
    NameHash::of(name)
}

/// Lowercase a name for comparison
pub fn fold_case(name: &str) -> String {
    name.to_lowercase()
}

/// Hash raw bytes with the base hasher
pub fn hash_bytes(data: &[u8]) -> u64 {
    BASE.hash(data)
}

/// Hash a string's UTF-8 bytes with the base hasher
pub fn hash_utf8(data: &str) -> u64 {
    BASE.hash_str(data, Encoding::Utf8)
}

/// Hash a string's UTF-16LE bytes with the base hasher
pub fn hash_utf16(data: &str) -> u64 {
    BASE.hash_str(data, Encoding::Utf16)
}

/// Case-sensitive identity of a full entry path
pub fn unique_id(full_name: &str) -> u64 {
    hash_utf16(full_name)
}
