//! Synonym ("hash") dictionaries.
//!
//! The optional `hash-dictionary/` directory contains tab-separated files,
//! one `word<TAB>synonym` pair per line. All files in the directory are
//! merged into one multimap. A synonym may itself be a multi-word phrase.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use ahash::AHashMap;

use crate::error::{Error, Result};

#[derive(Debug, Default)]
pub struct SynonymDictionary {
    map: AHashMap<String, Vec<String>>,
    pairs: usize,
}

impl SynonymDictionary {
    pub fn new() -> SynonymDictionary {
        SynonymDictionary::default()
    }

    /// Loads and merges every file in `dir`.
    pub fn load_dir(dir: &Path) -> Result<SynonymDictionary> {
        let mut dict = SynonymDictionary::new();
        let entries = std::fs::read_dir(dir)
            .map_err(|e| Error::Internal(format!("cannot open {}: {}", dir.display(), e)))?;
        for entry in entries {
            let entry = entry.map_err(|e| Error::Internal(e.to_string()))?;
            if entry.path().is_file() {
                dict.load_file(&entry.path())?;
            }
        }
        Ok(dict)
    }

    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        let file = File::open(path)
            .map_err(|e| Error::Internal(format!("cannot open {}: {}", path.display(), e)))?;
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| Error::Internal(e.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }
            let Some((word, synonym)) = line.split_once('\t') else {
                tracing::warn!(file = %path.display(), line, "skipping malformed dictionary line");
                continue;
            };
            self.insert(word.trim(), synonym.trim());
        }
        Ok(())
    }

    pub fn insert(&mut self, word: &str, synonym: &str) {
        if word.is_empty() || synonym.is_empty() {
            return;
        }
        self.map
            .entry(word.to_string())
            .or_default()
            .push(synonym.to_string());
        self.pairs += 1;
    }

    /// The word together with all its synonyms, ordered.
    pub fn lookup(&self, word: &str) -> BTreeSet<String> {
        let mut words = BTreeSet::new();
        words.insert(word.to_string());
        if let Some(synonyms) = self.map.get(word) {
            words.extend(synonyms.iter().cloned());
        }
        words
    }

    /// Number of word/synonym pairs.
    pub fn size(&self) -> usize {
        self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs == 0
    }
}
