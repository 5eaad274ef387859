//! Fully in-memory shard. Lookups are lock-free by construction: the slot
//! table is immutable after load.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::hash::hash32_second;
use crate::value::{get_u32, DiskValue};

use super::mphf::Mphf;

pub struct InternalMap<V: DiskValue> {
    mphf: Mphf,
    data: Vec<u8>,
    entry_size: usize,
    _marker: std::marker::PhantomData<V>,
}

impl<V: DiskValue> InternalMap<V> {
    pub fn open(mph_path: &Path, dat_path: &Path, value_size: usize) -> Result<Self> {
        let mphf = Mphf::read_file(mph_path)?;
        let data = fs::read(dat_path).map_err(|e| Error::cannot_open(dat_path, e))?;
        let entry_size = 4 + value_size;
        if data.len() != mphf.size() as usize * entry_size {
            return Err(Error::corrupt(format!(
                "table {} has {} bytes, expected {}",
                dat_path.display(),
                data.len(),
                mphf.size() as usize * entry_size
            )));
        }
        Ok(InternalMap {
            mphf,
            data,
            entry_size,
            _marker: std::marker::PhantomData,
        })
    }

    pub fn size(&self) -> u64 {
        self.mphf.size() as u64
    }

    pub fn get(&self, key: &str) -> Result<Option<V>> {
        if self.mphf.size() == 0 {
            return Ok(None);
        }
        let slot = self.mphf.hash(key.as_bytes()) as usize;
        let at = slot * self.entry_size;
        let stored = get_u32(&self.data, at)?;
        if stored != hash32_second(key.as_bytes()) {
            // Unknown keys normally land here via an MPHF collision.
            return Ok(None);
        }
        Ok(Some(V::read_from(&self.data[at + 4..at + self.entry_size])?))
    }
}
