//! Reads a postlist slice from a data file.
//!
//! The caller positions `file` at the postlist head. For a requested
//! `[begin, begin + length)` slice the reader computes the payload offset
//! (for variable-size values by summing the first `begin` entries of the size
//! table), then either pulls the whole payload into memory or opens a private
//! handle on the same path to page through it during iteration.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{Error, Result};
use crate::value::DiskValue;

use super::postlist::{Head, Postlist, Source};

pub struct PostlistReader;

impl PostlistReader {
    pub fn read<V: DiskValue>(
        path: &Path,
        file: &mut File,
        begin: u32,
        length: u32,
        page_size: usize,
    ) -> Result<Postlist<V>> {
        let mut head_buf = [0u8; Head::SIZE];
        file.read_exact(&mut head_buf)?;
        let head = Head::decode(&head_buf)?;

        let begin = begin.min(head.value_count);
        let length = length.min(head.value_count - begin);

        if head.value_size == 0 {
            Self::read_variable(path, file, head, begin, length, page_size)
        } else {
            Self::read_fixed(path, file, head, begin, length, page_size)
        }
    }

    fn read_fixed<V: DiskValue>(
        path: &Path,
        file: &mut File,
        head: Head,
        begin: u32,
        length: u32,
        page_size: usize,
    ) -> Result<Postlist<V>> {
        let expected_total = head.value_count as u64 * head.value_size as u64;
        if head.total_size as u64 != expected_total {
            return Err(Error::corrupt(format!(
                "inconsistent postlist head: {} values of {} bytes but total size {}",
                head.value_count, head.value_size, head.total_size
            )));
        }
        let begin_of_payload = file.stream_position()?;
        let offset = begin_of_payload + begin as u64 * head.value_size as u64;
        let payload = length as u64 * head.value_size as u64;
        let new_head = Head {
            value_count: length,
            value_size: head.value_size,
            total_size: payload as u32,
        };
        let source = Self::make_source(path, file, offset, payload, page_size)?;
        Ok(Postlist::new(new_head, None, source))
    }

    fn read_variable<V: DiskValue>(
        path: &Path,
        file: &mut File,
        head: Head,
        begin: u32,
        length: u32,
        page_size: usize,
    ) -> Result<Postlist<V>> {
        let table_start = file.stream_position()?;
        let begin_of_payload = table_start + head.value_count as u64 * 4;

        // sizes of the skipped prefix [0, begin)
        let mut skipped = vec![0u8; begin as usize * 4];
        file.read_exact(&mut skipped)?;
        let mut offset = begin_of_payload;
        for chunk in skipped.chunks_exact(4) {
            offset += u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as u64;
        }

        // sizes of the scoped slice [begin, begin + length)
        let mut scoped = vec![0u8; length as usize * 4];
        file.read_exact(&mut scoped)?;
        let mut sizes = Vec::with_capacity(length as usize);
        let mut payload = 0u64;
        for chunk in scoped.chunks_exact(4) {
            let size = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            payload += size as u64;
            sizes.push(size);
        }

        let new_head = Head {
            value_count: length,
            value_size: 0,
            total_size: payload as u32,
        };
        let source = Self::make_source(path, file, offset, payload, page_size)?;
        Ok(Postlist::new(new_head, Some(sizes), source))
    }

    fn make_source(
        path: &Path,
        file: &mut File,
        offset: u64,
        payload: u64,
        page_size: usize,
    ) -> Result<Source> {
        if payload <= page_size as u64 {
            let mut buf = vec![0u8; payload as usize];
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(&mut buf)?;
            Ok(Source::Page { buf, pos: 0 })
        } else {
            // a private handle, so iteration never touches the shared one
            let mut swap = File::open(path).map_err(|e| Error::cannot_open(path, e))?;
            swap.seek(SeekFrom::Start(offset))?;
            Ok(Source::Swap {
                file: swap,
                start: offset,
                page: Vec::new(),
                page_pos: 0,
                remaining: payload,
                page_size,
            })
        }
    }
}
