//! Offline construction of the sharded perfect-hash dictionary.
//!
//! Input keys are partitioned by `hash32(key) mod M` into shards of roughly
//! ten million keys. Every shard gets its own MPHF plus a packed table of
//! `(checksum, value)` slots; `map.idx` lists the shard index files.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::hash::{hash32, hash32_second};
use crate::value::DiskValue;

use super::mphf::Mphf;

pub const SHARD_TARGET_KEYS: usize = 10_000_000;
pub const INDEX_FILE_NAME: &str = "map.idx";

/// Builds a dictionary from `(key, value)` pairs in `dir`, which must be
/// empty (or not yet exist). Fails on duplicate keys.
pub fn build<V: DiskValue>(entries: Vec<(String, V)>, dir: &Path) -> Result<()> {
    let value_size = V::SIZE.ok_or_else(|| {
        Error::build("perfect-hash tables require a fixed-size value type")
    })?;

    fs::create_dir_all(dir)?;
    if fs::read_dir(dir)?.next().is_some() {
        return Err(Error::build(format!(
            "target directory {} is not empty",
            dir.display()
        )));
    }

    let shard_count = (entries.len() / SHARD_TARGET_KEYS + 1).max(1);
    let mut shards: Vec<Vec<(String, V)>> = Vec::new();
    shards.resize_with(shard_count, Vec::new);
    for (key, value) in entries {
        let shard = hash32(key.as_bytes()) as usize % shard_count;
        shards[shard].push((key, value));
    }

    let index_path = dir.join(INDEX_FILE_NAME);
    let mut index = BufWriter::new(File::create(&index_path)?);
    for (i, mut shard) in shards.into_iter().enumerate() {
        shard.sort_by(|a, b| a.0.cmp(&b.0));
        if let Some(w) = shard.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(Error::build(format!("duplicate key {:?}", w[0].0)));
        }

        let keys: Vec<&str> = shard.iter().map(|(k, _)| k.as_str()).collect();
        let mphf = Mphf::build(&keys)?;

        // pack the slot table: (checksum: u32, value) per slot
        let entry_size = 4 + value_size;
        let mut table = vec![0u8; mphf.size() as usize * entry_size];
        for (key, value) in &shard {
            let slot = mphf.hash(key.as_bytes()) as usize;
            let at = slot * entry_size;
            table[at..at + 4].copy_from_slice(&hash32_second(key.as_bytes()).to_le_bytes());
            let mut buf = Vec::with_capacity(value_size);
            value.write_to(&mut buf);
            table[at + 4..at + entry_size].copy_from_slice(&buf);
        }

        let mph_name = format!("part-{}.mph", i);
        let dat_name = format!("part-{}.dat", i);
        let idx_name = format!("part-{}.idx", i);
        mphf.write_file(&dir.join(&mph_name))?;
        fs::write(dir.join(&dat_name), &table)?;
        fs::write(dir.join(&idx_name), format!("{}\n{}\n", mph_name, dat_name))?;
        writeln!(index, "{}", idx_name)?;
    }
    index.flush()?;
    Ok(())
}
