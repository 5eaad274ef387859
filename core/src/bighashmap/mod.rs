//! Read-only dictionary over billions of keys, backed by sharded minimal
//! perfect hash functions.
//!
//! There is no stored key material: a lookup evaluates the shard's MPHF and
//! accepts the slot iff its 32-bit checksum matches a second hash of the key.
//! Keys outside the build set are rejected by that checksum, so the false
//! positive rate is about 2^-32 per lookup.
//!
//! `data/` layout: `map.idx` lists one `part-N.idx` per shard; each of those
//! names the shard's `.mph` (serialized MPHF) and `.dat` (packed slot table).

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{Error, Result};
use crate::hash::hash32;
use crate::value::DiskValue;

mod builder;
mod external;
mod internal;
mod mphf;

pub use builder::{build, INDEX_FILE_NAME, SHARD_TARGET_KEYS};
pub use mphf::Mphf;

use external::ExternalMap;
use internal::InternalMap;

/// How much table data may be resident in memory. Maps larger than the
/// budget fall back to per-lookup file reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryMode {
    /// Load everything; lookups are lock-free.
    InMemory,
    /// Keep tables on disk; lookups serialize on a per-file mutex.
    OnDisk,
    /// `InMemory` iff the total `.mph` + `.dat` size fits the given budget.
    Budget(u64),
}

enum Shard<V: DiskValue> {
    Internal(InternalMap<V>),
    External(ExternalMap<V>),
}

pub struct BigHashMap<V: DiskValue> {
    shards: Vec<Shard<V>>,
    size: u64,
}

impl<V: DiskValue> BigHashMap<V> {
    pub fn open(dir: &Path, memory: MemoryMode) -> Result<Self> {
        let value_size = V::SIZE.ok_or_else(|| {
            Error::corrupt("perfect-hash tables require a fixed-size value type")
        })?;

        let index_path = dir.join(INDEX_FILE_NAME);
        let index =
            File::open(&index_path).map_err(|e| Error::cannot_open(&index_path, e))?;

        let mut shard_files = Vec::new();
        for line in BufReader::new(index).lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let idx_path = dir.join(line);
            let content = fs::read_to_string(&idx_path)
                .map_err(|e| Error::cannot_open(&idx_path, e))?;
            let mut names = content.lines();
            let mph = names
                .next()
                .ok_or_else(|| Error::corrupt("shard index is missing the mph entry"))?;
            let dat = names
                .next()
                .ok_or_else(|| Error::corrupt("shard index is missing the dat entry"))?;
            shard_files.push((dir.join(mph), dir.join(dat)));
        }

        let in_memory = match memory {
            MemoryMode::InMemory => true,
            MemoryMode::OnDisk => false,
            MemoryMode::Budget(budget) => {
                let mut total = 0u64;
                for (mph, dat) in &shard_files {
                    total += fs::metadata(mph)?.len();
                    total += fs::metadata(dat)?.len();
                }
                total <= budget
            }
        };

        let mut shards = Vec::with_capacity(shard_files.len());
        let mut size = 0u64;
        for (mph, dat) in &shard_files {
            if in_memory {
                let map = InternalMap::open(mph, dat, value_size)?;
                size += map.size();
                shards.push(Shard::Internal(map));
            } else {
                let map = ExternalMap::open(mph, dat, value_size)?;
                size += map.size();
                shards.push(Shard::External(map));
            }
        }
        Ok(BigHashMap { shards, size })
    }

    /// Total number of keys in the build set.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn get(&self, key: &str) -> Result<Option<V>> {
        if self.shards.is_empty() {
            return Ok(None);
        }
        let shard = hash32(key.as_bytes()) as usize % self.shards.len();
        match &self.shards[shard] {
            Shard::Internal(map) => map.get(key),
            Shard::External(map) => map.get(key),
        }
    }
}
