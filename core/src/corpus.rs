//! Flat binary phrase corpus.
//!
//! `bin/` holds a `vocab` text file (`<word> <id>` per line, ids dense and
//! ascending) and one `phrases.<n>` file per length class. A record is the
//! phrase frequency (`u64`) followed by `n` word ids (`u32`), all
//! little-endian, so the stride of class `n` is `8 + 4n` bytes and a phrase's
//! local id is its record position.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::os::unix::fs::FileExt;
use std::path::Path;

use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::phrase::{Phrase, PhraseId, PhraseLength};
use crate::value::{get_u32, get_u64};

pub const BIN_DIR_NAME: &str = "bin";
pub const VOCAB_FILE_NAME: &str = "vocab";
pub const PHRASE_FILE_PREFIX: &str = "phrases";

/// Record size in bytes for the given length class.
pub fn entry_size(length: PhraseLength) -> usize {
    8 + 4 * length as usize
}

pub fn phrase_file_name(length: PhraseLength) -> String {
    format!("{}.{}", PHRASE_FILE_PREFIX, length)
}

pub struct PhraseCorpus {
    vocab: Vec<String>,
    /// indexed by length class; entry 0 is unused
    files: Vec<Option<File>>,
    max_length: PhraseLength,
}

impl PhraseCorpus {
    /// Opens the corpus in `dir` (the `bin/` directory itself).
    pub fn open(dir: &Path) -> Result<Self> {
        let vocab = Self::read_vocab(&dir.join(VOCAB_FILE_NAME))?;

        let mut files: Vec<Option<File>> = Vec::new();
        let mut max_length = 0;
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(length) = parse_phrase_file_name(&name.to_string_lossy()) else {
                continue;
            };
            let path = entry.path();
            let file = File::open(&path).map_err(|e| Error::cannot_open(&path, e))?;
            if files.len() <= length as usize {
                files.resize_with(length as usize + 1, || None);
            }
            files[length as usize] = Some(file);
            max_length = max_length.max(length);
        }
        tracing::debug!(words = vocab.len(), max_length, "opened phrase corpus");
        Ok(PhraseCorpus {
            vocab,
            files,
            max_length,
        })
    }

    fn read_vocab(path: &Path) -> Result<Vec<String>> {
        let file = File::open(path).map_err(|e| Error::cannot_open(path, e))?;
        let mut vocab = Vec::new();
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let mut parts = line.split_whitespace();
            let (word, id) = match (parts.next(), parts.next()) {
                (Some(word), Some(id)) => (word, id),
                _ => {
                    return Err(Error::corrupt(format!(
                        "vocab line {} is malformed: {:?}",
                        lineno + 1,
                        line
                    )))
                }
            };
            let id: usize = id.parse().map_err(|_| {
                Error::corrupt(format!("vocab line {} has a bad word id", lineno + 1))
            })?;
            if id != vocab.len() {
                return Err(Error::corrupt(format!(
                    "vocab ids are not dense: expected {}, found {}",
                    vocab.len(),
                    id
                )));
            }
            vocab.push(word.to_string());
        }
        Ok(vocab)
    }

    /// Largest `n` for which a `phrases.<n>` file exists.
    pub fn max_length(&self) -> PhraseLength {
        self.max_length
    }

    pub fn count_vocabulary(&self) -> usize {
        self.vocab.len()
    }

    /// Number of phrases in a length class, from the file size.
    pub fn count_phrases(&self, length: PhraseLength) -> Result<u64> {
        match self.file(length) {
            Some(file) => Ok(file.metadata()?.len() / entry_size(length) as u64),
            None => Ok(0),
        }
    }

    fn file(&self, length: PhraseLength) -> Option<&File> {
        self.files.get(length as usize).and_then(|f| f.as_ref())
    }

    /// Reads the given phrases, preserving the order of `ids`.
    ///
    /// One buffer is allocated for all records and filled by positioned reads
    /// issued in parallel; decoding then runs sequentially. Any failed or
    /// short read fails the whole call.
    pub fn read_phrases(&self, ids: &[PhraseId]) -> Result<Vec<Phrase>> {
        let mut total = 0usize;
        for id in ids {
            if self.file(id.length).is_none() {
                return Err(Error::corrupt(format!(
                    "no phrase file for length {}",
                    id.length
                )));
            }
            total += entry_size(id.length);
        }
        let mut buffer = vec![0u8; total];

        // carve the buffer into one non-overlapping chunk per record
        let mut jobs: Vec<(&mut [u8], PhraseId)> = Vec::with_capacity(ids.len());
        let mut rest: &mut [u8] = &mut buffer;
        for &id in ids {
            let (chunk, tail) = rest.split_at_mut(entry_size(id.length));
            jobs.push((chunk, id));
            rest = tail;
        }

        jobs.par_iter_mut().try_for_each(|(chunk, id)| {
            let file = self
                .file(id.length)
                .ok_or_else(|| Error::corrupt("phrase file disappeared"))?;
            let offset = id.local as u64 * entry_size(id.length) as u64;
            file.read_exact_at(chunk, offset)
                .map_err(|e| Error::Io(e))
        })?;

        let mut phrases = Vec::with_capacity(ids.len());
        let mut pos = 0usize;
        for &id in ids {
            let size = entry_size(id.length);
            phrases.push(self.decode(&buffer[pos..pos + size], id)?);
            pos += size;
        }
        Ok(phrases)
    }

    /// Reads one phrase. Convenience wrapper over [`read_phrases`].
    pub fn read_phrase(&self, id: PhraseId) -> Result<Phrase> {
        let mut phrases = self.read_phrases(std::slice::from_ref(&id))?;
        phrases
            .pop()
            .ok_or_else(|| Error::corrupt("read_phrases returned nothing"))
    }

    fn decode(&self, record: &[u8], id: PhraseId) -> Result<Phrase> {
        let frequency = get_u64(record, 0)?;
        let mut words = Vec::with_capacity(id.length as usize);
        for i in 0..id.length as usize {
            let word_id = get_u32(record, 8 + 4 * i)?;
            let word = self.vocab.get(word_id as usize).ok_or_else(|| {
                Error::corrupt(format!(
                    "phrase ({}, {}) references unknown word id {}",
                    id.length, id.local, word_id
                ))
            })?;
            words.push(word.clone());
        }
        Ok(Phrase {
            id,
            frequency,
            words,
        })
    }
}

fn parse_phrase_file_name(name: &str) -> Option<PhraseLength> {
    let rest = name.strip_prefix(PHRASE_FILE_PREFIX)?.strip_prefix('.')?;
    let length: PhraseLength = rest.parse().ok()?;
    (length > 0).then_some(length)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phrase_file_names() {
        assert_eq!(parse_phrase_file_name("phrases.3"), Some(3));
        assert_eq!(parse_phrase_file_name("phrases.0"), None);
        assert_eq!(parse_phrase_file_name("phrases"), None);
        assert_eq!(parse_phrase_file_name("vocab"), None);
    }

    #[test]
    fn strides() {
        assert_eq!(entry_size(1), 12);
        assert_eq!(entry_size(5), 28);
    }
}
