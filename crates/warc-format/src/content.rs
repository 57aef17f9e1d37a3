//! Per-file content block header and block framing

use crate::deflate;
use crate::error::{ArcFormatError, ArcFormatResult};
use binrw::{BinRead, BinReaderExt, BinWrite, BinWriterExt};
use std::io::Cursor;

/// Encoded length of a [`ContentHeader`]
pub const CONTENT_HEADER_SIZE: u64 = 16;

/// Header preceding every stored file body
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct ContentHeader {
    /// 1 when the body is DEFLATE compressed, else 0
    pub compressed: u32,
    /// Always 0
    pub reserved: u32,
    /// Length after decompression
    pub raw_size: u32,
    /// Length of the stored body
    pub size: u32,
}

impl ContentHeader {
    /// Create a header for a body of `size` bytes that decodes to `raw_size`
    pub const fn new(compressed: bool, raw_size: u32, size: u32) -> Self {
        Self {
            compressed: compressed as u32,
            reserved: 0,
            raw_size,
            size,
        }
    }

    /// Decode from the 16 on-disk bytes
    pub fn from_bytes(bytes: [u8; CONTENT_HEADER_SIZE as usize]) -> Self {
        let word =
            |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        Self {
            compressed: word(0),
            reserved: word(4),
            raw_size: word(8),
            size: word(12),
        }
    }

    /// Encode to the 16 on-disk bytes
    pub fn to_bytes(&self) -> [u8; CONTENT_HEADER_SIZE as usize] {
        let mut out = [0u8; CONTENT_HEADER_SIZE as usize];
        out[0..4].copy_from_slice(&self.compressed.to_le_bytes());
        out[4..8].copy_from_slice(&self.reserved.to_le_bytes());
        out[8..12].copy_from_slice(&self.raw_size.to_le_bytes());
        out[12..16].copy_from_slice(&self.size.to_le_bytes());
        out
    }

    /// Whether the body is compressed
    ///
    /// Only a flag of exactly 1 marks DEFLATE data.
    pub const fn is_compressed(&self) -> bool {
        self.compressed == 1
    }
}

/// Frame `raw` as a content block, compressing the body when asked
pub fn encode_block(raw: &[u8], compress: bool) -> ArcFormatResult<Vec<u8>> {
    let body = if compress {
        deflate::compress(raw)?
    } else {
        raw.to_vec()
    };
    let header = ContentHeader::new(compress, raw.len() as u32, body.len() as u32);

    let mut out = Cursor::new(Vec::with_capacity(
        CONTENT_HEADER_SIZE as usize + body.len(),
    ));
    out.write_le(&header)?;
    let mut out = out.into_inner();
    out.extend_from_slice(&body);
    Ok(out)
}

/// Unframe a content block, returning the decompressed body
pub fn decode_block(block: &[u8]) -> ArcFormatResult<Vec<u8>> {
    let header: ContentHeader = Cursor::new(block).read_le()?;
    let start = CONTENT_HEADER_SIZE as usize;
    let body = block
        .get(start..start + header.size as usize)
        .ok_or_else(|| {
            ArcFormatError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "content block declares {} bytes, {} available",
                    header.size,
                    block.len().saturating_sub(start)
                ),
            ))
        })?;

    if header.is_compressed() {
        deflate::decompress_sized(body, header.raw_size)
    } else {
        Ok(body.to_vec())
    }
}
