//! Read side of a storage directory: `properties` + `data/data.N` payload
//! files + `table/` perfect-hash map from key to postlist address.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::bighashmap::{BigHashMap, MemoryMode};
use crate::error::{Error, Result};
use crate::value::{Address, DiskValue};

use super::postlist::{Head, Postlist, DEFAULT_PAGE_SIZE};
use super::reader::PostlistReader;
use super::properties::{Properties, PROPERTIES_FILE_NAME};
use super::writer::{data_file_name, DATA_DIR_NAME, TABLE_DIR_NAME};

use std::io::{Read, Seek, SeekFrom};

pub struct StorageReader<V: DiskValue> {
    properties: Properties,
    table: BigHashMap<Address>,
    files: Vec<Mutex<File>>,
    paths: Vec<PathBuf>,
    page_size: usize,
    _marker: std::marker::PhantomData<V>,
}

impl<V: DiskValue> StorageReader<V> {
    pub fn open(dir: &Path, memory: MemoryMode) -> Result<Self> {
        Self::open_with_page_size(dir, memory, DEFAULT_PAGE_SIZE)
    }

    pub fn open_with_page_size(
        dir: &Path,
        memory: MemoryMode,
        page_size: usize,
    ) -> Result<Self> {
        let properties = Properties::read(&dir.join(PROPERTIES_FILE_NAME))?;
        properties.check(V::TYPE_NAME)?;

        let table = BigHashMap::open(&dir.join(TABLE_DIR_NAME), memory)?;

        let data_dir = dir.join(DATA_DIR_NAME);
        let mut files = Vec::new();
        let mut paths = Vec::new();
        // data files are numbered densely from zero
        loop {
            let path = data_dir.join(data_file_name(files.len() as u16));
            if !path.exists() {
                break;
            }
            let file = File::open(&path).map_err(|e| Error::cannot_open(&path, e))?;
            files.push(Mutex::new(file));
            paths.push(path);
        }
        if files.is_empty() && properties.key_count > 0 {
            return Err(Error::corrupt(format!(
                "storage {} names {} keys but has no data files",
                dir.display(),
                properties.key_count
            )));
        }
        Ok(StorageReader {
            properties,
            table,
            files,
            paths,
            page_size,
            _marker: std::marker::PhantomData,
        })
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    fn address(&self, key: &str) -> Result<Option<Address>> {
        match self.table.get(key)? {
            Some(addr) if (addr.file_index as usize) < self.files.len() => Ok(Some(addr)),
            Some(addr) => Err(Error::corrupt(format!(
                "postlist address points at missing data file {}",
                addr.file_index
            ))),
            None => Ok(None),
        }
    }

    /// Reads just the head of a key's postlist; `None` for unknown keys.
    pub fn read_head(&self, key: &str) -> Result<Option<Head>> {
        let addr = match self.address(key)? {
            Some(addr) => addr,
            None => return Ok(None),
        };
        let mut file = self.lock_file(addr.file_index)?;
        file.seek(SeekFrom::Start(addr.offset as u64))?;
        let mut buf = [0u8; Head::SIZE];
        file.read_exact(&mut buf)?;
        Ok(Some(Head::decode(&buf)?))
    }

    /// Reads a key's postlist scoped to `[begin, begin + length)`.
    ///
    /// A key whose slice is truncated to nothing yields an empty postlist;
    /// an unknown key yields `None`.
    pub fn read_postlist(
        &self,
        key: &str,
        begin: u32,
        length: u32,
    ) -> Result<Option<Postlist<V>>> {
        let addr = match self.address(key)? {
            Some(addr) => addr,
            None => return Ok(None),
        };
        let path = &self.paths[addr.file_index as usize];
        let mut file = self.lock_file(addr.file_index)?;
        file.seek(SeekFrom::Start(addr.offset as u64))?;
        let postlist = PostlistReader::read(path, &mut file, begin, length, self.page_size)?;
        Ok(Some(postlist))
    }

    fn lock_file(&self, index: u16) -> Result<std::sync::MutexGuard<'_, File>> {
        self.files[index as usize]
            .lock()
            .map_err(|_| Error::corrupt("poisoned data file lock"))
    }
}
