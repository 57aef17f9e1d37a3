//! Binary codec for ARC archives
//!
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format encoding
#![allow(clippy::cast_possible_wrap)] // Offsets are stored signed
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
//! An ARC file is laid out as:
//!
//! ```text
//! [magic: 20 bytes][footer offset: i64]
//! [content block]*            16-byte header + stored body per file
//! [footer block]*             (i32 type, i64 size, body)
//! ```
//!
//! The footer holds two recursive hash tables describing the directory tree,
//! one keyed by UTF-16 name hashes and one by UTF-8 name hashes, plus a name
//! table that maps UTF-16 hashes back to literal names.
//!
//! # Examples
//!
//! ```
//! use warc_format::{HashTableBuilder, LayoutDirectory};
//! use warc_hash::name_hash;
//!
//! let root = LayoutDirectory::new(name_hash("root").utf16)
//!     .with_file(name_hash("a.ks").utf16, 0)
//!     .with_dir(LayoutDirectory::new(name_hash("sub").utf16));
//! let table = HashTableBuilder::new(root).build();
//!
//! assert_eq!(table.files.len(), 1);
//! assert_eq!(table.dirs[0].offset, 64);
//! ```

#![warn(missing_docs)]

mod builder;
mod content;
pub mod deflate;
mod error;
mod footer;
mod hash_table;
mod header;
mod name_table;

pub use builder::{HashTableBuilder, LayoutDirectory};
pub use content::{CONTENT_HEADER_SIZE, ContentHeader, decode_block, encode_block};
pub use error::{ArcFormatError, ArcFormatResult};
pub use footer::{ArcFooter, FooterBlockKind};
pub use hash_table::{
    HashEntry, HashTable, MAX_TABLE_DEPTH, TABLE_ENTRY_SIZE, TABLE_HEADER_SIZE,
};
pub use header::{ARC_MAGIC, ArcHeader, HEADER_SIZE, detect_magic};
pub use name_table::{NameEntry, NameTable};

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
pub(crate) mod test_utils;

/// Common trait for the symmetric footer structures
pub trait ArcFormat: Sized {
    /// Parse from bytes
    fn parse(data: &[u8]) -> Result<Self, Box<dyn std::error::Error>>;

    /// Build to bytes
    fn build(&self) -> Result<Vec<u8>, Box<dyn std::error::Error>>;

    /// Verify round-trip correctness
    fn verify_round_trip(data: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
        let parsed = Self::parse(data)?;
        let rebuilt = parsed.build()?;
        if data != rebuilt.as_slice() {
            return Err("Round-trip verification failed".into());
        }
        Ok(())
    }
}
