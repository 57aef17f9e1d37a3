//! Hash to name lookup table
//!
//! A flat run of `(u64 hash, i32 char count, UTF-16LE chars)` records with
//! no header or terminator.

use crate::error::{ArcFormatError, ArcFormatResult};
use std::collections::HashMap;
use warc_hash::encode_utf16le;

/// One name table record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameEntry {
    /// Case-folded UTF-16 hash of `name`
    pub hash: u64,
    /// Literal name
    pub name: String,
}

/// Hash to name table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameTable {
    entries: Vec<NameEntry>,
}

impl NameTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Records in table order
    pub fn entries(&self) -> &[NameEntry] {
        &self.entries
    }

    /// Append a record
    pub fn push(&mut self, hash: u64, name: impl Into<String>) {
        self.entries.push(NameEntry {
            hash,
            name: name.into(),
        });
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no records
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse a decompressed name table
    pub fn parse(data: &[u8]) -> ArcFormatResult<Self> {
        let mut entries = Vec::new();
        let mut pos = 0usize;

        while pos < data.len() {
            let record = pos;
            let hash = u64::from_le_bytes(take_array(data, &mut pos, record)?);
            let count = i32::from_le_bytes(take_array(data, &mut pos, record)?);
            let count = usize::try_from(count).map_err(|_| {
                ArcFormatError::InvalidName(format!("negative length {count} at offset {record}"))
            })?;

            let end = count
                .checked_mul(2)
                .and_then(|len| pos.checked_add(len))
                .filter(|&end| end <= data.len())
                .ok_or_else(|| {
                    ArcFormatError::InvalidName(format!("record truncated at offset {record}"))
                })?;

            let units: Vec<u16> = data[pos..end]
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            let name = String::from_utf16(&units).map_err(|e| {
                ArcFormatError::InvalidName(format!("bad UTF-16 at offset {record}: {e}"))
            })?;
            pos = end;

            entries.push(NameEntry { hash, name });
        }

        Ok(Self { entries })
    }

    /// Encode the table
    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for entry in &self.entries {
            let chars = encode_utf16le(&entry.name);
            out.extend_from_slice(&entry.hash.to_le_bytes());
            out.extend_from_slice(&((chars.len() / 2) as i32).to_le_bytes());
            out.extend_from_slice(&chars);
        }
        out
    }

    /// Hash to name map; the first record wins when hashes collide
    pub fn lookup(&self) -> HashMap<u64, &str> {
        let mut map = HashMap::with_capacity(self.entries.len());
        for entry in &self.entries {
            map.entry(entry.hash).or_insert(entry.name.as_str());
        }
        map
    }
}

impl crate::ArcFormat for NameTable {
    fn parse(data: &[u8]) -> Result<Self, Box<dyn std::error::Error>> {
        Self::parse(data).map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
    }

    fn build(&self) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        Ok(self.build())
    }
}

fn take_array<const N: usize>(
    data: &[u8],
    pos: &mut usize,
    record: usize,
) -> ArcFormatResult<[u8; N]> {
    let bytes = data
        .get(*pos..*pos + N)
        .and_then(|slice| <[u8; N]>::try_from(slice).ok())
        .ok_or_else(|| {
            ArcFormatError::InvalidName(format!("record truncated at offset {record}"))
        })?;
    *pos += N;
    Ok(bytes)
}
