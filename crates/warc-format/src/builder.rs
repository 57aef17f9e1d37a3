//! Hash table construction from a directory layout
//!
//! The builder lays out directory blocks in pre-order, visiting
//! subdirectories in ascending hash order, and derives each subdirectory's
//! stored offset from that layout.

use crate::hash_table::{HashEntry, HashTable, block_len};

/// Directory shape fed to [`HashTableBuilder`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutDirectory {
    /// Case-folded name hash
    pub hash: u64,
    /// File hashes with their content offsets
    pub files: Vec<HashEntry>,
    /// Child directories
    pub dirs: Vec<LayoutDirectory>,
}

impl LayoutDirectory {
    /// Empty directory with the given hash
    pub const fn new(hash: u64) -> Self {
        Self {
            hash,
            files: Vec::new(),
            dirs: Vec::new(),
        }
    }

    /// Add a file entry
    pub fn with_file(mut self, hash: u64, offset: i64) -> Self {
        self.files.push(HashEntry::new(hash, offset));
        self
    }

    /// Add a child directory
    pub fn with_dir(mut self, dir: Self) -> Self {
        self.dirs.push(dir);
        self
    }
}

/// Builds a [`HashTable`] tree with computed subdirectory offsets
#[derive(Debug, Clone)]
pub struct HashTableBuilder {
    root: LayoutDirectory,
}

impl HashTableBuilder {
    /// Start from a root layout
    pub fn new(root: LayoutDirectory) -> Self {
        Self { root }
    }

    /// Compute offsets and produce the table tree
    ///
    /// The root block sits at offset 0. Every other block's stored offset is
    /// its distance from the root block minus the stored offsets of all of
    /// its ancestors.
    pub fn build(&self) -> HashTable {
        let mut cursor = 0i64;
        let mut parents = Vec::new();
        let (_, table) = build_table(&self.root, &mut parents, 0, &mut cursor);
        table
    }
}

fn build_table(
    dir: &LayoutDirectory,
    parents: &mut Vec<u64>,
    ancestor_sum: i64,
    cursor: &mut i64,
) -> (i64, HashTable) {
    let stored = *cursor - ancestor_sum;
    *cursor += block_len(dir.files.len() + dir.dirs.len(), parents.len()) as i64;

    let own_parents = parents.clone();

    let mut order: Vec<&LayoutDirectory> = dir.dirs.iter().collect();
    order.sort_by_key(|sub| sub.hash);

    parents.push(dir.hash);
    let mut children = Vec::with_capacity(order.len());
    for sub in order {
        let (offset, table) = build_table(sub, parents, ancestor_sum + stored, cursor);
        children.push((sub.hash, offset, table));
    }
    parents.pop();

    // siblings share an ancestor sum, so this keeps the layout order
    children.sort_by_key(|(_, offset, _)| *offset);

    let mut files = dir.files.clone();
    files.sort_by_key(|entry| entry.hash);

    let mut dirs = Vec::with_capacity(children.len());
    let mut subtables = Vec::with_capacity(children.len());
    for (hash, offset, table) in children {
        dirs.push(HashEntry::new(hash, offset));
        subtables.push(table);
    }

    let table = HashTable {
        id: dir.hash,
        reserved: 0,
        dirs,
        files,
        parents: own_parents,
        subtables,
    };
    (stored, table)
}
