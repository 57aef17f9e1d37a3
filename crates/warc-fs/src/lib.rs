//! Virtual filesystem engine for ARC archives
//!
//! An [`ArcFileSystem`] owns a tree of directories and files. Trees are
//! populated from existing archives, from real directories or from single
//! files, rearranged with copy/move/merge/rename operations, and written
//! back out as a new archive.
//!
//! Entries are addressed by copyable handles ([`DirId`], [`FileId`]) that
//! are only valid for the filesystem that issued them. Handing a handle to
//! another filesystem fails with [`ArcError::CrossFileSystem`].
//!
//! File content is never copied between trees: every file holds a shared
//! [`FilePointer`] that reads its bytes lazily from memory, disk or a
//! source archive.
//!
//! # Example
//!
//! ```no_run
//! use warc_fs::ArcFileSystem;
//!
//! # fn example() -> warc_fs::Result<()> {
//! let mut fs = ArcFileSystem::with_name("script");
//! fs.load_directory("./script")?;
//!
//! let data = fs.create_directory("sub/data")?;
//! fs.load_file_into("./extra.ks", data)?;
//!
//! fs.save_to_path("script.arc")?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![allow(clippy::cast_possible_truncation)] // Archive sizes are u32 on disk
#![allow(clippy::cast_possible_wrap)] // Offsets are stored signed

use thiserror::Error;

// Engine configuration
pub mod config;

// Lazy file content
pub mod pointer;

// Entry handles and arena nodes
mod entry;

// Tree engine
mod filesystem;

// Archive, directory and file loading
mod load;

// Tree mutation
mod ops;

// Archive writing and extraction
mod save;

pub use config::{ArcConfig, CompressList};
pub use entry::{DirId, EntryId, FileId};
pub use filesystem::ArcFileSystem;
pub use pointer::FilePointer;
pub use warc_format::ArcFormatError;

/// Result type for filesystem operations.
pub type Result<T> = std::result::Result<T, ArcError>;

/// Errors that can occur during filesystem operations.
#[derive(Debug, Error)]
pub enum ArcError {
    /// Malformed archive.
    #[error("Invalid archive: {0}")]
    Format(#[from] ArcFormatError),

    /// Missing disk path or tree entry.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Entry or target belongs to another filesystem.
    #[error("Cross filesystem operation not supported: {0}")]
    CrossFileSystem(String),

    /// Operation refused for this entry.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Path that names no entry.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Content pointer used after disposal.
    #[error("File pointer disposed")]
    Disposed,

    /// Source file larger than an archive entry can hold.
    #[error("File too large: {path} is {size} bytes")]
    SizeLimit {
        /// Offending path
        path: String,
        /// Actual size
        size: u64,
    },

    /// Invalid compress pattern.
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Version information for the engine.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Separator between path segments inside an archive.
pub const SEPARATOR: char = '\\';

/// Prefix of the root directory name.
pub const ROOT_PREFIX: &str = "CM3D2ToolKit:";

/// Display name used until one is set or loaded.
pub const DEFAULT_NAME: &str = "root";

/// Build the root directory name for a display name.
pub fn root_name(name: &str) -> String {
    format!("{ROOT_PREFIX}{SEPARATOR}{SEPARATOR}{name}")
}
