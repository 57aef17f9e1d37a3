//! Recursive per-directory hash table
//!
//! Each directory is encoded as one block:
//!
//! ```text
//! u32 header size (32)   u32 entry size (16)
//! u64 own hash
//! u32 subdirectory count u32 file count
//! u32 depth              u32 reserved
//! (u64 hash, i64 offset) x subdirectories
//! (u64 hash, i64 offset) x files
//! u64 ancestor hash      x depth, root-most first
//! subdirectory blocks, in the order of the subdirectory entries
//! ```
//!
//! Subdirectory offsets locate the child block relative to the footer
//! origin minus the sum of the offsets of all its ancestors. File offsets
//! are content offsets relative to the end of the archive header.

use crate::error::{ArcFormatError, ArcFormatResult};
use binrw::{BinRead, BinReaderExt, BinWrite, BinWriterExt};
use std::io::{Read, Seek, Write};

/// First word of every table header
pub const TABLE_HEADER_SIZE: u32 = 32;
/// Second word of every table header
pub const TABLE_ENTRY_SIZE: u32 = 16;
/// Deepest subtable nesting accepted on read
pub const MAX_TABLE_DEPTH: usize = 256;

#[derive(Debug, Clone, BinRead, BinWrite)]
#[brw(little)]
struct TableHeader {
    #[br(assert(header_size == TABLE_HEADER_SIZE, "Invalid hash table header size"))]
    header_size: u32,
    #[br(assert(entry_size == TABLE_ENTRY_SIZE, "Invalid hash table entry size"))]
    entry_size: u32,
    id: u64,
    dir_count: u32,
    file_count: u32,
    depth: u32,
    reserved: u32,
}

/// Hash and offset pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, BinRead, BinWrite)]
#[brw(little)]
pub struct HashEntry {
    /// Case-folded name hash
    pub hash: u64,
    /// Subtable delta for directories, content offset for files
    pub offset: i64,
}

impl HashEntry {
    /// Create an entry
    pub const fn new(hash: u64, offset: i64) -> Self {
        Self { hash, offset }
    }
}

/// One directory of the hash table tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashTable {
    /// Hash of this directory's name
    pub id: u64,
    /// Reserved header word, 0 when written by this crate
    pub reserved: u32,
    /// Subdirectory entries
    pub dirs: Vec<HashEntry>,
    /// File entries
    pub files: Vec<HashEntry>,
    /// Ancestor hashes, root-most first
    pub parents: Vec<u64>,
    /// Subdirectory tables, parallel to `dirs`
    pub subtables: Vec<HashTable>,
}

impl HashTable {
    /// Read one table and all of its subtables
    ///
    /// Fails when subtables nest deeper than [`MAX_TABLE_DEPTH`].
    pub fn read<R: Read + Seek>(reader: &mut R) -> ArcFormatResult<Self> {
        Self::read_nested(reader, 0)
    }

    fn read_nested<R: Read + Seek>(reader: &mut R, level: usize) -> ArcFormatResult<Self> {
        if level > MAX_TABLE_DEPTH {
            return Err(ArcFormatError::TableTooDeep(level));
        }
        let header: TableHeader = reader.read_le()?;

        let mut dirs = Vec::new();
        for _ in 0..header.dir_count {
            dirs.push(reader.read_le::<HashEntry>()?);
        }

        let mut files = Vec::new();
        for _ in 0..header.file_count {
            files.push(reader.read_le::<HashEntry>()?);
        }

        let mut parents = Vec::new();
        for _ in 0..header.depth {
            parents.push(reader.read_le::<u64>()?);
        }

        let mut subtables = Vec::with_capacity(dirs.len());
        for _ in 0..dirs.len() {
            subtables.push(Self::read_nested(reader, level + 1)?);
        }

        Ok(Self {
            id: header.id,
            reserved: header.reserved,
            dirs,
            files,
            parents,
            subtables,
        })
    }

    /// Write this table and all of its subtables
    pub fn write<W: Write + Seek>(&self, writer: &mut W) -> ArcFormatResult<()> {
        let header = TableHeader {
            header_size: TABLE_HEADER_SIZE,
            entry_size: TABLE_ENTRY_SIZE,
            id: self.id,
            dir_count: self.dirs.len() as u32,
            file_count: self.files.len() as u32,
            depth: self.depth(),
            reserved: self.reserved,
        };
        writer.write_le(&header)?;

        for entry in self.dirs.iter().chain(&self.files) {
            writer.write_le(entry)?;
        }
        for parent in &self.parents {
            writer.write_le(parent)?;
        }
        for subtable in &self.subtables {
            subtable.write(writer)?;
        }
        Ok(())
    }

    /// Number of ancestors
    pub fn depth(&self) -> u32 {
        self.parents.len() as u32
    }

    /// Encoded length of this table's own block, excluding subtables
    pub fn block_len(&self) -> u64 {
        block_len(self.dirs.len() + self.files.len(), self.parents.len())
    }

    /// Encoded length including every subtable
    pub fn encoded_len(&self) -> u64 {
        self.block_len() + self.subtables.iter().map(Self::encoded_len).sum::<u64>()
    }

    /// First subtable whose id matches `hash`
    pub fn subtable(&self, hash: u64) -> Option<&Self> {
        self.subtables.iter().find(|table| table.id == hash)
    }

    /// Every file entry: own files first, then each subtable in order
    pub fn files_flat(&self) -> Vec<HashEntry> {
        let mut out = Vec::with_capacity(self.total_files());
        self.collect_files(&mut out);
        out
    }

    fn collect_files(&self, out: &mut Vec<HashEntry>) {
        out.extend_from_slice(&self.files);
        for subtable in &self.subtables {
            subtable.collect_files(out);
        }
    }

    /// Number of files in this table and all subtables
    pub fn total_files(&self) -> usize {
        self.files.len() + self.subtables.iter().map(Self::total_files).sum::<usize>()
    }
}

impl crate::ArcFormat for HashTable {
    fn parse(data: &[u8]) -> Result<Self, Box<dyn std::error::Error>> {
        Self::read(&mut std::io::Cursor::new(data))
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
    }

    fn build(&self) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        let mut cursor = std::io::Cursor::new(Vec::with_capacity(self.encoded_len() as usize));
        self.write(&mut cursor)?;
        Ok(cursor.into_inner())
    }
}

/// Encoded length of a table block with `entries` hash entries at `depth`
pub(crate) fn block_len(entries: usize, depth: usize) -> u64 {
    u64::from(TABLE_HEADER_SIZE) + u64::from(TABLE_ENTRY_SIZE) * entries as u64 + 8 * depth as u64
}
