//! Entry handles and arena nodes

use crate::pointer::FilePointer;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use warc_hash::NameHash;

static NEXT_FILESYSTEM_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_filesystem_id() -> u64 {
    NEXT_FILESYSTEM_ID.fetch_add(1, Ordering::Relaxed)
}

/// Handle to a directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirId {
    pub(crate) fs: u64,
    pub(crate) index: u32,
}

/// Handle to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId {
    pub(crate) fs: u64,
    pub(crate) index: u32,
}

/// Handle to either kind of entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryId {
    /// A directory
    Directory(DirId),
    /// A file
    File(FileId),
}

impl EntryId {
    pub(crate) const fn fs(self) -> u64 {
        match self {
            Self::Directory(id) => id.fs,
            Self::File(id) => id.fs,
        }
    }

    pub(crate) const fn index(self) -> u32 {
        match self {
            Self::Directory(id) => id.index,
            Self::File(id) => id.index,
        }
    }
}

impl From<DirId> for EntryId {
    fn from(id: DirId) -> Self {
        Self::Directory(id)
    }
}

impl From<FileId> for EntryId {
    fn from(id: FileId) -> Self {
        Self::File(id)
    }
}

#[derive(Debug)]
pub(crate) enum NodeKind {
    Directory { dirs: Vec<u32>, files: Vec<u32> },
    File { pointer: Arc<FilePointer> },
}

/// Arena slot for one live entry
#[derive(Debug)]
pub(crate) struct Node {
    name: String,
    hash: NameHash,
    pub(crate) parent: Option<u32>,
    pub(crate) kind: NodeKind,
}

impl Node {
    pub(crate) fn directory(name: &str, parent: Option<u32>) -> Self {
        Self {
            name: name.to_string(),
            hash: NameHash::of(name),
            parent,
            kind: NodeKind::Directory {
                dirs: Vec::new(),
                files: Vec::new(),
            },
        }
    }

    pub(crate) fn file(name: &str, parent: u32, pointer: Arc<FilePointer>) -> Self {
        Self {
            name: name.to_string(),
            hash: NameHash::of(name),
            parent: Some(parent),
            kind: NodeKind::File { pointer },
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) const fn hash(&self) -> NameHash {
        self.hash
    }

    /// Rename, keeping the hash pair in step
    pub(crate) fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
        self.hash = NameHash::of(name);
    }

    pub(crate) const fn is_directory(&self) -> bool {
        matches!(self.kind, NodeKind::Directory { .. })
    }
}
