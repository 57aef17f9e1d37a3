//! DEFLATE framing used for compressed content and the name table
//!
//! Compressed bodies carry a two-byte zlib-style prefix (`78 5E`) followed
//! by a raw DEFLATE stream. No Adler-32 trailer is written and none is
//! expected on read.

use crate::error::{ArcFormatError, ArcFormatResult};
use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use std::io::{Read, Write};

/// Prefix written before every raw DEFLATE stream
pub const DEFLATE_PREFIX: [u8; 2] = [0x78, 0x5E];

/// Compress `raw` into a prefixed DEFLATE stream
pub fn compress(raw: &[u8]) -> ArcFormatResult<Vec<u8>> {
    let mut out = Vec::with_capacity(raw.len() / 2 + DEFLATE_PREFIX.len());
    out.extend_from_slice(&DEFLATE_PREFIX);

    let mut encoder = DeflateEncoder::new(out, Compression::default());
    encoder
        .write_all(raw)
        .map_err(|e| ArcFormatError::Compression(format!("DEFLATE compression failed: {e}")))?;
    encoder
        .finish()
        .map_err(|e| ArcFormatError::Compression(format!("DEFLATE compression failed: {e}")))
}

/// Decompress a prefixed DEFLATE stream
///
/// The two prefix bytes are skipped without inspection.
pub fn decompress(data: &[u8]) -> ArcFormatResult<Vec<u8>> {
    let Some(stream) = data.get(DEFLATE_PREFIX.len()..) else {
        return Err(ArcFormatError::Compression(format!(
            "compressed stream too short: {} bytes",
            data.len()
        )));
    };

    let mut decoder = DeflateDecoder::new(stream);
    let mut raw = Vec::new();
    decoder
        .read_to_end(&mut raw)
        .map_err(|e| ArcFormatError::Compression(format!("DEFLATE decompression failed: {e}")))?;
    Ok(raw)
}

/// Decompress and check the result against the declared length
pub fn decompress_sized(data: &[u8], raw_size: u32) -> ArcFormatResult<Vec<u8>> {
    let raw = decompress(data)?;
    if raw.len() != raw_size as usize {
        return Err(ArcFormatError::Compression(format!(
            "decompressed size mismatch: expected {raw_size}, got {}",
            raw.len()
        )));
    }
    Ok(raw)
}
