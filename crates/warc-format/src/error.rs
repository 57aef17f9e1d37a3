//! ARC format error types

use crate::footer::FooterBlockKind;
use thiserror::Error;

/// ARC codec error type
#[derive(Debug, Error)]
pub enum ArcFormatError {
    /// The leading 20 bytes are not the ARC magic sequence
    #[error("invalid ARC magic")]
    InvalidMagic,

    /// Footer block with an unrecognised type tag
    #[error("unknown footer block type: {0}")]
    UnknownBlock(i32),

    /// A footer block type appeared twice
    #[error("duplicate footer block: {0}")]
    DuplicateBlock(FooterBlockKind),

    /// The footer ended before a required block was seen
    #[error("missing footer block: {0}")]
    MissingBlock(FooterBlockKind),

    /// Footer block with a negative length
    #[error("invalid footer block size: {0}")]
    InvalidBlockSize(i64),

    /// Footer or content offset that points before the content area
    #[error("invalid offset: {0}")]
    InvalidOffset(i64),

    /// UTF-8 and UTF-16 hash tables disagree about a file
    #[error("file checksum mismatch: hash {hash:016x} at offset {offset}")]
    ChecksumMismatch {
        /// UTF-16 hash of the file
        hash: u64,
        /// Content offset of the file
        offset: i64,
    },

    /// A hash has no entry in the name table
    #[error("name not found for hash {0:016x}")]
    MissingName(u64),

    /// Hash subtables nested past the accepted depth
    #[error("hash table nested too deep: level {0}")]
    TableTooDeep(usize),

    /// A directory entry has no matching subtable
    #[error("subtable not found for directory hash {0:016x}")]
    MissingSubdirectory(u64),

    /// Name table entry that is not valid UTF-16
    #[error("invalid name table entry: {0}")]
    InvalidName(String),

    /// DEFLATE stream failure
    #[error("compression error: {0}")]
    Compression(String),

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for ARC codec operations
pub type ArcFormatResult<T> = Result<T, ArcFormatError>;
