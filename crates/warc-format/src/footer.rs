//! Footer blocks and the load-time cross check
//!
//! The footer is a run of `(i32 type, i64 size, body)` blocks. An archive
//! carries exactly one UTF-16 hash table, one UTF-8 hash table and one name
//! table; the name table body is itself framed as a content block.

use crate::content::{decode_block, encode_block};
use crate::error::{ArcFormatError, ArcFormatResult};
use crate::hash_table::HashTable;
use crate::name_table::NameTable;
use binrw::{BinRead, BinReaderExt, BinWrite, BinWriterExt};
use std::collections::HashMap;
use std::fmt;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use warc_hash::name_hash;

/// Footer block type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FooterBlockKind {
    /// Hash table keyed by UTF-16 name hashes
    Utf16HashTable = 0,
    /// Hash table keyed by UTF-8 name hashes
    Utf8HashTable = 1,
    /// Hash to name table
    NameTable = 3,
}

impl FooterBlockKind {
    /// All required kinds in write order
    pub const ALL: [Self; 3] = [Self::Utf16HashTable, Self::Utf8HashTable, Self::NameTable];

    /// On-disk tag
    pub const fn tag(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for FooterBlockKind {
    type Error = ArcFormatError;

    fn try_from(tag: i32) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(Self::Utf16HashTable),
            1 => Ok(Self::Utf8HashTable),
            3 => Ok(Self::NameTable),
            other => Err(ArcFormatError::UnknownBlock(other)),
        }
    }
}

impl fmt::Display for FooterBlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Utf16HashTable => write!(f, "UTF-16 hash table"),
            Self::Utf8HashTable => write!(f, "UTF-8 hash table"),
            Self::NameTable => write!(f, "name table"),
        }
    }
}

#[derive(Debug, Clone, BinRead, BinWrite)]
#[brw(little)]
struct BlockHeader {
    kind: i32,
    size: i64,
}

/// Decoded archive footer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArcFooter {
    /// Table keyed by UTF-16 hashes
    pub utf16: HashTable,
    /// Table keyed by UTF-8 hashes
    pub utf8: HashTable,
    /// Names for every hash in `utf16`
    pub names: NameTable,
}

impl ArcFooter {
    /// Read footer blocks from the current position until all three are seen
    ///
    /// Unknown or repeated block types are fatal.
    pub fn read<R: Read + Seek>(reader: &mut R) -> ArcFormatResult<Self> {
        let start = reader.stream_position()?;
        let end = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(start))?;

        let mut utf16 = None;
        let mut utf8 = None;
        let mut names = None;

        while utf16.is_none() || utf8.is_none() || names.is_none() {
            if reader.stream_position()? >= end {
                let missing = if utf16.is_none() {
                    FooterBlockKind::Utf16HashTable
                } else if utf8.is_none() {
                    FooterBlockKind::Utf8HashTable
                } else {
                    FooterBlockKind::NameTable
                };
                return Err(ArcFormatError::MissingBlock(missing));
            }

            let header: BlockHeader = reader.read_le()?;
            let kind = FooterBlockKind::try_from(header.kind)?;
            let already_seen = match kind {
                FooterBlockKind::Utf16HashTable => utf16.is_some(),
                FooterBlockKind::Utf8HashTable => utf8.is_some(),
                FooterBlockKind::NameTable => names.is_some(),
            };
            if already_seen {
                return Err(ArcFormatError::DuplicateBlock(kind));
            }

            let body = read_block_body(reader, header.size)?;
            match kind {
                FooterBlockKind::Utf16HashTable => {
                    utf16 = Some(HashTable::read(&mut Cursor::new(&body))?);
                }
                FooterBlockKind::Utf8HashTable => {
                    utf8 = Some(HashTable::read(&mut Cursor::new(&body))?);
                }
                FooterBlockKind::NameTable => {
                    names = Some(NameTable::parse(&decode_block(&body)?)?);
                }
            }
        }

        match (utf16, utf8, names) {
            (Some(utf16), Some(utf8), Some(names)) => Ok(Self { utf16, utf8, names }),
            _ => Err(ArcFormatError::MissingBlock(FooterBlockKind::NameTable)),
        }
    }

    /// Write the three footer blocks
    ///
    /// The name table is DEFLATE compressed when `compress_names` is set.
    pub fn write<W: Write + Seek>(
        &self,
        writer: &mut W,
        compress_names: bool,
    ) -> ArcFormatResult<()> {
        for (kind, table) in [
            (FooterBlockKind::Utf16HashTable, &self.utf16),
            (FooterBlockKind::Utf8HashTable, &self.utf8),
        ] {
            let mut body = Cursor::new(Vec::with_capacity(table.encoded_len() as usize));
            table.write(&mut body)?;
            write_block(writer, kind, &body.into_inner())?;
        }

        let names = encode_block(&self.names.build(), compress_names)?;
        write_block(writer, FooterBlockKind::NameTable, &names)
    }

    /// Check every UTF-16 file entry against the UTF-8 table
    ///
    /// Each UTF-16 file must have a UTF-8 twin at the same content offset
    /// whose hash equals the UTF-8 hash of the name recorded for the UTF-16
    /// hash.
    pub fn verify_checksums(&self) -> ArcFormatResult<()> {
        let mut utf8_by_offset = HashMap::new();
        for entry in self.utf8.files_flat() {
            utf8_by_offset.entry(entry.offset).or_insert(entry.hash);
        }
        let lookup = self.names.lookup();

        for entry in self.utf16.files_flat() {
            let mismatch = ArcFormatError::ChecksumMismatch {
                hash: entry.hash,
                offset: entry.offset,
            };
            let Some(&utf8_hash) = utf8_by_offset.get(&entry.offset) else {
                return Err(mismatch);
            };
            let name = lookup
                .get(&entry.hash)
                .ok_or(ArcFormatError::MissingName(entry.hash))?;
            if name_hash(name).utf8 != utf8_hash {
                return Err(mismatch);
            }
        }
        Ok(())
    }

    /// Name recorded for the root directory
    pub fn root_name(&self) -> Option<&str> {
        self.names
            .entries()
            .iter()
            .find(|entry| entry.hash == self.utf16.id)
            .map(|entry| entry.name.as_str())
    }
}

impl crate::ArcFormat for ArcFooter {
    fn parse(data: &[u8]) -> Result<Self, Box<dyn std::error::Error>> {
        Self::read(&mut Cursor::new(data)).map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
    }

    fn build(&self) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        let mut cursor = Cursor::new(Vec::new());
        self.write(&mut cursor, true)?;
        Ok(cursor.into_inner())
    }
}

fn read_block_body<R: Read>(reader: &mut R, size: i64) -> ArcFormatResult<Vec<u8>> {
    let size = u64::try_from(size).map_err(|_| ArcFormatError::InvalidBlockSize(size))?;
    let mut body = Vec::new();
    reader.take(size).read_to_end(&mut body)?;
    if body.len() as u64 != size {
        return Err(ArcFormatError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("footer block declares {size} bytes, {} available", body.len()),
        )));
    }
    Ok(body)
}

fn write_block<W: Write + Seek>(
    writer: &mut W,
    kind: FooterBlockKind,
    body: &[u8],
) -> ArcFormatResult<()> {
    writer.write_le(&BlockHeader {
        kind: kind.tag(),
        size: body.len() as i64,
    })?;
    writer.write_all(body)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::builder::{HashTableBuilder, LayoutDirectory};
    use pretty_assertions::assert_eq;

    /// Footer for `root\{a.ks @ 0, sub\b.menu @ 40}`
    fn sample_footer() -> ArcFooter {
        fn build(pick: fn(&str) -> u64) -> HashTable {
            HashTableBuilder::new(
                LayoutDirectory::new(pick("root"))
                    .with_file(pick("a.ks"), 0)
                    .with_dir(LayoutDirectory::new(pick("sub")).with_file(pick("b.menu"), 40)),
            )
            .build()
        }

        let mut names = NameTable::new();
        for name in ["a.ks", "b.menu", "sub", "root"] {
            names.push(name_hash(name).utf16, name);
        }

        ArcFooter {
            utf16: build(|s| name_hash(s).utf16),
            utf8: build(|s| name_hash(s).utf8),
            names,
        }
    }

    fn encode(footer: &ArcFooter, compress: bool) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        footer.write(&mut cursor, compress).unwrap();
        cursor.into_inner()
    }

    fn block(kind: i32, body: &[u8]) -> Vec<u8> {
        let mut out = kind.to_le_bytes().to_vec();
        out.extend_from_slice(&(body.len() as i64).to_le_bytes());
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn test_round_trip_compressed_names() {
        let footer = sample_footer();
        let parsed = ArcFooter::read(&mut Cursor::new(encode(&footer, true))).unwrap();
        assert_eq!(parsed, footer);
        parsed.verify_checksums().unwrap();
    }

    #[test]
    fn test_round_trip_raw_names() {
        let footer = sample_footer();
        let bytes = encode(&footer, false);
        let parsed = ArcFooter::read(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(parsed, footer);
    }

    #[test]
    fn test_block_order_and_name_block_size() {
        let footer = sample_footer();
        let bytes = encode(&footer, false);

        let utf16_len = footer.utf16.encoded_len() as usize;
        assert_eq!(&bytes[0..4], &0i32.to_le_bytes());
        assert_eq!(&bytes[4..12], &(utf16_len as i64).to_le_bytes());

        let second = 12 + utf16_len;
        assert_eq!(&bytes[second..second + 4], &1i32.to_le_bytes());

        let third = second + 12 + footer.utf8.encoded_len() as usize;
        assert_eq!(&bytes[third..third + 4], &3i32.to_le_bytes());
        let names_len = footer.names.build().len() as i64;
        assert_eq!(&bytes[third + 4..third + 12], &(names_len + 16).to_le_bytes());
    }

    #[test]
    fn test_blocks_in_any_order() {
        let footer = sample_footer();
        let mut utf16 = Cursor::new(Vec::new());
        footer.utf16.write(&mut utf16).unwrap();
        let mut utf8 = Cursor::new(Vec::new());
        footer.utf8.write(&mut utf8).unwrap();
        let names = encode_block(&footer.names.build(), true).unwrap();

        let mut bytes = block(3, &names);
        bytes.extend(block(1, &utf8.into_inner()));
        bytes.extend(block(0, &utf16.into_inner()));

        assert_eq!(ArcFooter::read(&mut Cursor::new(bytes)).unwrap(), footer);
    }

    #[test]
    fn test_unknown_block() {
        let bytes = block(2, &[]);
        assert!(matches!(
            ArcFooter::read(&mut Cursor::new(bytes)),
            Err(ArcFormatError::UnknownBlock(2))
        ));
    }

    #[test]
    fn test_duplicate_block() {
        let footer = sample_footer();
        let mut table = Cursor::new(Vec::new());
        footer.utf16.write(&mut table).unwrap();
        let table = table.into_inner();

        let mut bytes = block(0, &table);
        bytes.extend(block(0, &table));
        assert!(matches!(
            ArcFooter::read(&mut Cursor::new(bytes)),
            Err(ArcFormatError::DuplicateBlock(FooterBlockKind::Utf16HashTable))
        ));
    }

    #[test]
    fn test_missing_block() {
        let footer = sample_footer();
        let mut table = Cursor::new(Vec::new());
        footer.utf16.write(&mut table).unwrap();
        let bytes = block(0, &table.into_inner());
        assert!(matches!(
            ArcFooter::read(&mut Cursor::new(bytes)),
            Err(ArcFormatError::MissingBlock(FooterBlockKind::Utf8HashTable))
        ));
    }

    #[test]
    fn test_negative_block_size() {
        let mut bytes = 0i32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&(-5i64).to_le_bytes());
        assert!(matches!(
            ArcFooter::read(&mut Cursor::new(bytes)),
            Err(ArcFormatError::InvalidBlockSize(-5))
        ));
    }

    #[test]
    fn test_checksum_mismatch_on_wrong_utf8_hash() {
        let mut footer = sample_footer();
        footer.utf8.files[0].hash ^= 1;
        assert!(matches!(
            footer.verify_checksums(),
            Err(ArcFormatError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_checksum_mismatch_on_missing_offset() {
        let mut footer = sample_footer();
        footer.utf8.subtables[0].files[0].offset = 999;
        assert!(matches!(
            footer.verify_checksums(),
            Err(ArcFormatError::ChecksumMismatch { offset: 40, .. })
        ));
    }

    #[test]
    fn test_checksum_missing_name() {
        let mut footer = sample_footer();
        footer.names = NameTable::new();
        assert!(matches!(
            footer.verify_checksums(),
            Err(ArcFormatError::MissingName(_))
        ));
    }

    #[test]
    fn test_root_name() {
        assert_eq!(sample_footer().root_name(), Some("root"));
    }

    #[test]
    fn test_kind_tags() {
        for kind in FooterBlockKind::ALL {
            assert_eq!(FooterBlockKind::try_from(kind.tag()).unwrap(), kind);
        }
        assert!(FooterBlockKind::try_from(-1).is_err());
    }
}
