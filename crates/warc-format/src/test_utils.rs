//! Shared round-trip helpers for codec tests

use crate::ArcFormat;
use std::fmt::Debug;

/// Build `original`, parse it back and compare
pub fn test_round_trip<T>(original: &T) -> Result<(), Box<dyn std::error::Error>>
where
    T: ArcFormat + PartialEq + Debug,
{
    let data = original.build()?;
    let parsed = T::parse(&data)?;

    if original != &parsed {
        return Err(format!(
            "Round-trip verification failed:\nOriginal: {:?}\nParsed: {:?}",
            original, parsed
        )
        .into());
    }
    Ok(())
}

/// Check that `invalid_data` is rejected
pub fn test_invalid_data_rejected<T>(invalid_data: &[u8]) -> Result<(), Box<dyn std::error::Error>>
where
    T: ArcFormat,
{
    match T::parse(invalid_data) {
        Ok(_) => Err("Expected parsing to fail for invalid data, but it succeeded".into()),
        Err(_) => Ok(()),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{ArcFooter, HashEntry, HashTable, NameTable};

    fn table() -> HashTable {
        HashTable {
            id: 1,
            files: vec![HashEntry::new(2, 0), HashEntry::new(3, 16)],
            ..HashTable::default()
        }
    }

    #[test]
    fn test_hash_table_round_trip() {
        test_round_trip(&table()).expect("Round-trip should succeed");
        let bytes = table().build().unwrap();
        HashTable::verify_round_trip(&bytes).unwrap();
    }

    #[test]
    fn test_name_table_round_trip() {
        let mut names = NameTable::new();
        names.push(5, "five");
        names.push(6, "six");
        test_round_trip(&names).expect("Round-trip should succeed");
        NameTable::verify_round_trip(&names.build()).unwrap();
    }

    #[test]
    fn test_footer_round_trip() {
        let mut names = NameTable::new();
        names.push(1, "root");
        let footer = ArcFooter {
            utf16: table(),
            utf8: table(),
            names,
        };
        test_round_trip(&footer).expect("Round-trip should succeed");
    }

    #[test]
    fn test_invalid_data() {
        test_invalid_data_rejected::<HashTable>(&[0x20, 0, 0, 0]).unwrap();
        test_invalid_data_rejected::<ArcFooter>(&7i32.to_le_bytes()).unwrap();
        test_invalid_data_rejected::<NameTable>(&[1, 2, 3]).unwrap();
    }
}
