//! The `properties` file: a fixed little-endian struct at the root of every
//! storage directory. Readers use it to reject indexes written by an
//! incompatible library version or parameterized with the wrong value type.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::value::{get_u32, get_u64};

/// Bumped whenever the on-disk format changes incompatibly.
pub const VERSION_NUMBER: u32 = 1;

pub const PROPERTIES_FILE_NAME: &str = "properties";

const VALUE_TYPE_FIELD_SIZE: usize = 64;
const ENCODED_SIZE: usize = 4 + 1 + VALUE_TYPE_FIELD_SIZE + 8 + 8 + 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSorting {
    Disabled,
    Ascending,
    Descending,
}

impl ValueSorting {
    fn to_byte(self) -> u8 {
        match self {
            ValueSorting::Disabled => 0,
            ValueSorting::Ascending => 1,
            ValueSorting::Descending => 2,
        }
    }

    fn from_byte(b: u8) -> Result<Self> {
        match b {
            0 => Ok(ValueSorting::Disabled),
            1 => Ok(ValueSorting::Ascending),
            2 => Ok(ValueSorting::Descending),
            other => Err(Error::corrupt(format!("invalid value sorting {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Properties {
    pub version_number: u32,
    pub value_sorting: ValueSorting,
    pub value_type: String,
    pub value_count: u64,
    pub total_size: u64,
    pub key_count: u64,
}

impl Properties {
    pub fn new(value_type: &str, value_sorting: ValueSorting) -> Self {
        Properties {
            version_number: VERSION_NUMBER,
            value_sorting,
            value_type: value_type.to_string(),
            value_count: 0,
            total_size: 0,
            key_count: 0,
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let mut file = File::open(path).map_err(|e| Error::cannot_open(path, e))?;
        let mut buf = [0u8; ENCODED_SIZE];
        file.read_exact(&mut buf)?;

        let version_number = get_u32(&buf, 0)?;
        let value_sorting = ValueSorting::from_byte(buf[4])?;
        let name_field = &buf[5..5 + VALUE_TYPE_FIELD_SIZE];
        let name_len = name_field.iter().position(|&b| b == 0).unwrap_or(VALUE_TYPE_FIELD_SIZE);
        let value_type = std::str::from_utf8(&name_field[..name_len])
            .map_err(|_| Error::corrupt("value type name is not utf-8"))?
            .to_string();
        Ok(Properties {
            version_number,
            value_sorting,
            value_type,
            value_count: get_u64(&buf, 5 + VALUE_TYPE_FIELD_SIZE)?,
            total_size: get_u64(&buf, 13 + VALUE_TYPE_FIELD_SIZE)?,
            key_count: get_u64(&buf, 21 + VALUE_TYPE_FIELD_SIZE)?,
        })
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if self.value_type.len() >= VALUE_TYPE_FIELD_SIZE {
            return Err(Error::build(format!(
                "value type name {:?} exceeds {} bytes",
                self.value_type,
                VALUE_TYPE_FIELD_SIZE - 1
            )));
        }
        let mut buf = [0u8; ENCODED_SIZE];
        buf[0..4].copy_from_slice(&self.version_number.to_le_bytes());
        buf[4] = self.value_sorting.to_byte();
        buf[5..5 + self.value_type.len()].copy_from_slice(self.value_type.as_bytes());
        buf[5 + VALUE_TYPE_FIELD_SIZE..13 + VALUE_TYPE_FIELD_SIZE]
            .copy_from_slice(&self.value_count.to_le_bytes());
        buf[13 + VALUE_TYPE_FIELD_SIZE..21 + VALUE_TYPE_FIELD_SIZE]
            .copy_from_slice(&self.total_size.to_le_bytes());
        buf[21 + VALUE_TYPE_FIELD_SIZE..29 + VALUE_TYPE_FIELD_SIZE]
            .copy_from_slice(&self.key_count.to_le_bytes());
        let mut file = File::create(path).map_err(|e| Error::cannot_open(path, e))?;
        file.write_all(&buf)?;
        Ok(())
    }

    /// Rejects a properties block that this reader cannot interpret.
    pub fn check(&self, expected_value_type: &str) -> Result<()> {
        if self.version_number != VERSION_NUMBER {
            return Err(Error::VersionMismatch {
                found: self.version_number,
                expected: VERSION_NUMBER,
            });
        }
        if self.value_type != expected_value_type {
            return Err(Error::ValueTypeMismatch {
                found: self.value_type.clone(),
                expected: expected_value_type.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("properties");
        let mut props = Properties::new("phrase-ref", ValueSorting::Descending);
        props.value_count = 12;
        props.total_size = 144;
        props.key_count = 3;
        props.write(&path).unwrap();
        let loaded = Properties::read(&path).unwrap();
        assert_eq!(loaded, props);
        loaded.check("phrase-ref").unwrap();
        assert!(loaded.check("something-else").is_err());
    }
}
