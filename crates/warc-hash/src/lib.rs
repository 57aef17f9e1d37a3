//! Hashing for ARC archive name tables and hash tables
//!
//! ARC archives never compare names as strings. Every directory and file is
//! identified by a keyed 64-bit hash of its lowercased name, stored twice:
//! once over the UTF-8 encoding and once over the UTF-16LE encoding. The two
//! parallel tables double as a checksum of each other on load.
//!
//! # Examples
//!
//! ```
//! use warc_hash::{NameHash, hash_utf16};
//!
//! let hash = NameHash::of("Scenario.KS");
//! assert_eq!(hash.utf16, hash_utf16("scenario.ks"));
//! ```

#![warn(missing_docs)]

pub mod hasher;
pub mod name;

pub use hasher::{BASE_KEY, BASE_SEED, DataHasher, Encoding, encode_utf16le};
pub use name::{NameHash, fold_case, hash_bytes, hash_utf8, hash_utf16, name_hash, unique_id};
