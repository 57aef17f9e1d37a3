//! Archive header and magic detection

use crate::error::{ArcFormatError, ArcFormatResult};
use binrw::{BinRead, BinReaderExt, BinWrite};
use std::io::{Cursor, Read};

/// Leading bytes of every ARC file: `warc`, a fixed tag, then the
/// version words 1000, 4 and 2
pub const ARC_MAGIC: [u8; 20] = [
    0x77, 0x61, 0x72, 0x63, // warc
    0xFF, 0xAA, 0x45, 0xF1, //
    0xE8, 0x03, 0x00, 0x00, // 1000
    0x04, 0x00, 0x00, 0x00, // 4
    0x02, 0x00, 0x00, 0x00, // 2
];

/// Encoded header length; content offsets are relative to this position
pub const HEADER_SIZE: u64 = 28;

/// ARC file header
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct ArcHeader {
    /// Magic and version sequence
    #[br(assert(magic == ARC_MAGIC, "Invalid ARC magic"))]
    pub magic: [u8; 20],

    /// Footer position relative to the end of this header
    pub footer_offset: i64,
}

impl ArcHeader {
    /// Create a header pointing at `footer_offset`
    pub const fn new(footer_offset: i64) -> Self {
        Self {
            magic: ARC_MAGIC,
            footer_offset,
        }
    }

    /// Read a header, reporting a bad magic as [`ArcFormatError::InvalidMagic`]
    pub fn read_from<R: Read>(reader: &mut R) -> ArcFormatResult<Self> {
        let mut buf = [0u8; HEADER_SIZE as usize];
        reader.read_exact(&mut buf)?;
        if buf[..ARC_MAGIC.len()] != ARC_MAGIC {
            return Err(ArcFormatError::InvalidMagic);
        }
        Ok(Cursor::new(&buf[..]).read_le()?)
    }
}

impl Default for ArcHeader {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Check whether a stream starts with the ARC magic
///
/// Streams shorter than the magic are reported as `false`.
pub fn detect_magic<R: Read>(reader: &mut R) -> std::io::Result<bool> {
    let mut head = [0u8; ARC_MAGIC.len()];
    match reader.read_exact(&mut head) {
        Ok(()) => Ok(head == ARC_MAGIC),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}
