//! Little-endian value codecs for the on-disk index formats.
//!
//! Every integer written by this crate is little-endian. Values either have a
//! fixed encoded size (`SIZE = Some(n)`) or a per-value size recorded in the
//! postlist size table (`SIZE = None`).

use crate::error::{Error, Result};

/// A value that can be stored in a postlist or perfect-hash table.
pub trait DiskValue: Sized {
    /// Identifier written into the `properties` file. Readers refuse to open
    /// an index whose stored name differs.
    const TYPE_NAME: &'static str;

    /// Encoded size in bytes, or `None` for variable-size values.
    const SIZE: Option<usize>;

    /// Encoded size of this particular value.
    fn encoded_size(&self) -> usize;

    fn write_to(&self, buf: &mut Vec<u8>);

    /// Decode from a slice of exactly `encoded_size` bytes.
    fn read_from(buf: &[u8]) -> Result<Self>;
}

#[inline]
pub(crate) fn get_u16(buf: &[u8], at: usize) -> Result<u16> {
    let bytes = buf
        .get(at..at + 2)
        .ok_or_else(|| Error::corrupt("value slice too short for u16"))?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

#[inline]
pub(crate) fn get_u32(buf: &[u8], at: usize) -> Result<u32> {
    let bytes = buf
        .get(at..at + 4)
        .ok_or_else(|| Error::corrupt("value slice too short for u32"))?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[inline]
pub(crate) fn get_u64(buf: &[u8], at: usize) -> Result<u64> {
    let bytes = buf
        .get(at..at + 8)
        .ok_or_else(|| Error::corrupt("value slice too short for u64"))?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    Ok(u64::from_le_bytes(raw))
}

/// One posting: a phrase-local id and its corpus frequency.
///
/// Postlists store these in descending frequency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhraseRef {
    pub id: u32,
    pub freq: u64,
}

impl DiskValue for PhraseRef {
    const TYPE_NAME: &'static str = "phrase-ref";
    const SIZE: Option<usize> = Some(12);

    fn encoded_size(&self) -> usize {
        12
    }

    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.id.to_le_bytes());
        buf.extend_from_slice(&self.freq.to_le_bytes());
    }

    fn read_from(buf: &[u8]) -> Result<Self> {
        Ok(PhraseRef {
            id: get_u32(buf, 0)?,
            freq: get_u64(buf, 4)?,
        })
    }
}

/// One quantile sample of a postlist: an index into the postlist and the
/// frequency found there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantileSample {
    pub index: u32,
    pub freq: u64,
}

impl DiskValue for QuantileSample {
    const TYPE_NAME: &'static str = "quantile-sample";
    const SIZE: Option<usize> = Some(12);

    fn encoded_size(&self) -> usize {
        12
    }

    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.index.to_le_bytes());
        buf.extend_from_slice(&self.freq.to_le_bytes());
    }

    fn read_from(buf: &[u8]) -> Result<Self> {
        Ok(QuantileSample {
            index: get_u32(buf, 0)?,
            freq: get_u64(buf, 4)?,
        })
    }
}

/// Phrase dictionary entry: corpus frequency and phrase-local id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreqId {
    pub freq: u64,
    pub id: u32,
}

impl DiskValue for FreqId {
    const TYPE_NAME: &'static str = "freq-id";
    const SIZE: Option<usize> = Some(12);

    fn encoded_size(&self) -> usize {
        12
    }

    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.freq.to_le_bytes());
        buf.extend_from_slice(&self.id.to_le_bytes());
    }

    fn read_from(buf: &[u8]) -> Result<Self> {
        Ok(FreqId {
            freq: get_u64(buf, 0)?,
            id: get_u32(buf, 8)?,
        })
    }
}

/// Address of a postlist head inside the data files of a storage directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Address {
    pub file_index: u16,
    pub offset: u32,
}

impl DiskValue for Address {
    const TYPE_NAME: &'static str = "postlist-address";
    const SIZE: Option<usize> = Some(6);

    fn encoded_size(&self) -> usize {
        6
    }

    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.file_index.to_le_bytes());
        buf.extend_from_slice(&self.offset.to_le_bytes());
    }

    fn read_from(buf: &[u8]) -> Result<Self> {
        Ok(Address {
            file_index: get_u16(buf, 0)?,
            offset: get_u32(buf, 2)?,
        })
    }
}

/// Variable-size UTF-8 strings, used by tests and auxiliary indexes.
impl DiskValue for String {
    const TYPE_NAME: &'static str = "utf8-string";
    const SIZE: Option<usize> = None;

    fn encoded_size(&self) -> usize {
        self.len()
    }

    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.as_bytes());
    }

    fn read_from(buf: &[u8]) -> Result<Self> {
        String::from_utf8(buf.to_vec()).map_err(|_| Error::corrupt("invalid utf-8 in string value"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phrase_ref_roundtrip() {
        let v = PhraseRef { id: 42, freq: 1 << 40 };
        let mut buf = Vec::new();
        v.write_to(&mut buf);
        assert_eq!(buf.len(), 12);
        assert_eq!(PhraseRef::read_from(&buf).unwrap(), v);
    }

    #[test]
    fn address_is_six_bytes_little_endian() {
        let v = Address {
            file_index: 1,
            offset: 0x0A0B0C0D,
        };
        let mut buf = Vec::new();
        v.write_to(&mut buf);
        assert_eq!(buf, vec![0x01, 0x00, 0x0D, 0x0C, 0x0B, 0x0A]);
    }

    #[test]
    fn short_slice_is_an_error() {
        assert!(PhraseRef::read_from(&[0u8; 4]).is_err());
    }
}
