//! Write side of a storage directory, used by the offline index build.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use ahash::AHashMap;

use crate::bighashmap;
use crate::error::{Error, Result};
use crate::value::{Address, DiskValue};

use super::postlist::Head;
use super::properties::{Properties, ValueSorting, PROPERTIES_FILE_NAME};

pub const DATA_DIR_NAME: &str = "data";
pub const TABLE_DIR_NAME: &str = "table";

/// Each payload file is closed once it would exceed this size.
pub const MAX_DATA_FILE_SIZE: u64 = 1 << 30;

pub fn data_file_name(index: u16) -> String {
    format!("data.{}", index)
}

pub struct StorageWriter<V: DiskValue> {
    dir: PathBuf,
    data_dir: PathBuf,
    current: BufWriter<File>,
    current_index: u16,
    current_size: u64,
    entries: Vec<(String, Address)>,
    properties: Properties,
    _marker: std::marker::PhantomData<V>,
}

impl<V: DiskValue> StorageWriter<V> {
    pub fn create(dir: &Path, value_sorting: ValueSorting) -> Result<Self> {
        fs::create_dir_all(dir)?;
        if fs::read_dir(dir)?.next().is_some() {
            return Err(Error::build(format!(
                "target directory {} is not empty",
                dir.display()
            )));
        }
        let data_dir = dir.join(DATA_DIR_NAME);
        fs::create_dir(&data_dir)?;
        let first = data_dir.join(data_file_name(0));
        let current = BufWriter::new(File::create(&first)?);
        Ok(StorageWriter {
            dir: dir.to_path_buf(),
            data_dir,
            current,
            current_index: 0,
            current_size: 0,
            entries: Vec::new(),
            properties: Properties::new(V::TYPE_NAME, value_sorting),
            _marker: std::marker::PhantomData,
        })
    }

    /// Appends one postlist. Values must already be in the sorting order
    /// declared at creation.
    pub fn write_postlist(&mut self, key: &str, values: &[V]) -> Result<()> {
        let value_count = u32::try_from(values.len())
            .map_err(|_| Error::build(format!("postlist for {:?} exceeds u32 values", key)))?;

        let (value_size, sizes): (u32, Option<Vec<u32>>) = match V::SIZE {
            Some(size) => (size as u32, None),
            None => {
                let sizes: Vec<u32> = values.iter().map(|v| v.encoded_size() as u32).collect();
                (0, Some(sizes))
            }
        };
        let payload: u64 = match &sizes {
            Some(sizes) => sizes.iter().map(|&s| s as u64).sum(),
            None => value_count as u64 * value_size as u64,
        };
        let total_size = u32::try_from(payload)
            .map_err(|_| Error::build(format!("postlist for {:?} exceeds u32 bytes", key)))?;
        let table_bytes = sizes.as_ref().map_or(0, |s| s.len() as u64 * 4);
        let postlist_bytes = Head::SIZE as u64 + table_bytes + payload;

        if self.current_size > 0 && self.current_size + postlist_bytes > MAX_DATA_FILE_SIZE {
            self.roll_over()?;
        }

        let offset = u32::try_from(self.current_size)
            .map_err(|_| Error::build("data file offset exceeds u32"))?;
        self.entries.push((
            key.to_string(),
            Address {
                file_index: self.current_index,
                offset,
            },
        ));

        let head = Head {
            value_count,
            value_size,
            total_size,
        };
        self.current.write_all(&head.encode())?;
        if let Some(sizes) = &sizes {
            for &s in sizes {
                self.current.write_all(&s.to_le_bytes())?;
            }
        }
        let mut buf = Vec::with_capacity(payload as usize);
        for value in values {
            value.write_to(&mut buf);
        }
        self.current.write_all(&buf)?;
        self.current_size += postlist_bytes;

        self.properties.key_count += 1;
        self.properties.value_count += value_count as u64;
        self.properties.total_size += payload;
        Ok(())
    }

    fn roll_over(&mut self) -> Result<()> {
        self.current.flush()?;
        self.current_index = self
            .current_index
            .checked_add(1)
            .ok_or_else(|| Error::build("too many data files"))?;
        let path = self.data_dir.join(data_file_name(self.current_index));
        self.current = BufWriter::new(File::create(path)?);
        self.current_size = 0;
        Ok(())
    }

    /// Flushes the data files, builds the key table, writes `properties`.
    pub fn finish(mut self) -> Result<Properties> {
        self.current.flush()?;
        bighashmap::build(std::mem::take(&mut self.entries), &self.dir.join(TABLE_DIR_NAME))?;
        self.properties.write(&self.dir.join(PROPERTIES_FILE_NAME))?;
        Ok(self.properties)
    }
}

/// In-memory accumulation of an inverted index before writing.
///
/// Scales to fixture and moderate corpus sizes; record sets beyond memory
/// would need an external sort pass, which is outside this repo's scope.
pub struct IndexBuilder<V: DiskValue> {
    records: AHashMap<String, Vec<V>>,
}

impl<V: DiskValue> IndexBuilder<V> {
    pub fn new() -> Self {
        IndexBuilder {
            records: AHashMap::new(),
        }
    }

    pub fn insert(&mut self, key: &str, value: V) {
        self.records.entry(key.to_string()).or_default().push(value);
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates all postlists in key order without consuming the builder.
    pub fn for_each_sorted(
        &mut self,
        mut sort: impl FnMut(&mut Vec<V>),
        mut visit: impl FnMut(&str, &[V]) -> Result<()>,
    ) -> Result<()> {
        let mut keys: Vec<String> = self.records.keys().cloned().collect();
        keys.sort();
        for key in keys {
            if let Some(values) = self.records.get_mut(&key) {
                sort(values);
                visit(&key, values)?;
            }
        }
        Ok(())
    }

    /// Sorts every postlist with `sort` and writes the index to `dir`.
    pub fn write(
        mut self,
        dir: &Path,
        value_sorting: ValueSorting,
        sort: impl FnMut(&mut Vec<V>),
    ) -> Result<Properties> {
        let mut writer = StorageWriter::create(dir, value_sorting)?;
        self.for_each_sorted(sort, |key, values| writer.write_postlist(key, values))?;
        writer.finish()
    }
}

impl<V: DiskValue> Default for IndexBuilder<V> {
    fn default() -> Self {
        Self::new()
    }
}
