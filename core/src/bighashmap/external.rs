//! On-disk shard. The slot table stays in its file; each lookup is one
//! seek+read guarded by a per-file mutex so concurrent readers do not
//! interleave their positioning.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::hash::hash32_second;
use crate::value::{get_u32, DiskValue};

use super::mphf::Mphf;

pub struct ExternalMap<V: DiskValue> {
    mphf: Mphf,
    file: Mutex<File>,
    entry_size: usize,
    _marker: std::marker::PhantomData<V>,
}

impl<V: DiskValue> ExternalMap<V> {
    pub fn open(mph_path: &Path, dat_path: &Path, value_size: usize) -> Result<Self> {
        let mphf = Mphf::read_file(mph_path)?;
        let file = File::open(dat_path).map_err(|e| Error::cannot_open(dat_path, e))?;
        let entry_size = 4 + value_size;
        let expected = mphf.size() as u64 * entry_size as u64;
        let actual = file.metadata()?.len();
        if actual != expected {
            return Err(Error::corrupt(format!(
                "table {} has {} bytes, expected {}",
                dat_path.display(),
                actual,
                expected
            )));
        }
        Ok(ExternalMap {
            mphf,
            file: Mutex::new(file),
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
        let slot = self.mphf.hash(key.as_bytes()) as u64;
        let mut entry = vec![0u8; self.entry_size];
        {
            let mut file = self
                .file
                .lock()
                .map_err(|_| Error::corrupt("poisoned table file lock"))?;
            file.seek(SeekFrom::Start(slot * self.entry_size as u64))?;
            file.read_exact(&mut entry)?;
        }
        let stored = get_u32(&entry, 0)?;
        if stored != hash32_second(key.as_bytes()) {
            return Ok(None);
        }
        Ok(Some(V::read_from(&entry[4..])?))
    }
}
