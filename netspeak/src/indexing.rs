//! Builds a full index directory tree from raw n-gram counts.
//!
//! Input records are `(phrase text, frequency)`. The output layout is the
//! one the engine opens:
//!
//! ```text
//! <root>/
//!   phrase-corpus/bin/   vocab, phrases.1, phrases.2, ...
//!   phrase-dictionary/   perfect-hash map  phrase -> (freq, local id)
//!   phrase-index/        postings  "<n>:<pos>_<word>" -> (id, freq) desc
//!   postlist-index/      quantile sketches of the larger postlists
//!   regex-vocabulary/    vocab.sorted, words by descending 1-gram frequency
//! ```
//!
//! Local ids are assigned per length class in descending frequency order
//! (ties broken by phrase text), which the all-wildcard retrieval path
//! relies on.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use ahash::AHashMap;

use netspeak_core::error::{Error, Result};
use netspeak_core::invertedindex::{IndexBuilder, StorageWriter, ValueSorting};
use netspeak_core::corpus::{phrase_file_name, BIN_DIR_NAME, VOCAB_FILE_NAME};
use netspeak_core::{bighashmap, FreqId, PhraseRef, QuantileSample};

use crate::config::{
    PHRASE_CORPUS_DIR, PHRASE_DICTIONARY_DIR, PHRASE_INDEX_DIR, POSTLIST_INDEX_DIR,
    REGEX_VOCABULARY_DIR,
};

pub const REGEX_VOCAB_FILE_NAME: &str = "vocab.sorted";

/// One sketch sample per this many postlist entries.
const QUANTILE_RESOLUTION: usize = 1000;

/// Builds every index component under `out_root`, which must be empty.
pub fn build_index(entries: Vec<(String, u64)>, out_root: &Path) -> Result<()> {
    fs::create_dir_all(out_root)?;
    if fs::read_dir(out_root)?.next().is_some() {
        return Err(Error::build(format!(
            "target directory {} is not empty",
            out_root.display()
        )));
    }

    let mut phrases: Vec<(Vec<String>, u64)> = Vec::new();
    for (text, freq) in entries {
        let words: Vec<String> = text.split_whitespace().map(str::to_string).collect();
        if words.is_empty() {
            continue;
        }
        phrases.push((words, freq));
    }

    // length classes, most frequent first; ids are the positions
    let mut by_length: AHashMap<u32, Vec<(Vec<String>, u64)>> = AHashMap::new();
    for (words, freq) in phrases {
        by_length.entry(words.len() as u32).or_default().push((words, freq));
    }
    for class in by_length.values_mut() {
        class.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    }

    // word ids by descending 1-gram frequency, ties by spelling
    let unigram_freq: AHashMap<&str, u64> = by_length
        .get(&1)
        .map(|class| {
            class
                .iter()
                .map(|(words, freq)| (words[0].as_str(), *freq))
                .collect()
        })
        .unwrap_or_default();
    let mut words: Vec<&str> = {
        let mut set: Vec<&str> = by_length
            .values()
            .flat_map(|class| class.iter())
            .flat_map(|(words, _)| words.iter().map(String::as_str))
            .collect();
        set.sort_unstable();
        set.dedup();
        set
    };
    words.sort_by(|a, b| {
        let fa = unigram_freq.get(a).copied().unwrap_or(0);
        let fb = unigram_freq.get(b).copied().unwrap_or(0);
        fb.cmp(&fa).then(a.cmp(b))
    });
    let word_ids: AHashMap<&str, u32> = words
        .iter()
        .enumerate()
        .map(|(id, &word)| (word, id as u32))
        .collect();

    write_corpus(out_root, &by_length, &words, &word_ids)?;
    write_dictionary(out_root, &by_length)?;
    write_postings(out_root, &by_length)?;
    write_regex_vocabulary(out_root, &words)?;

    tracing::info!(root = %out_root.display(), words = words.len(), "index build complete");
    Ok(())
}

/// Builds from text files of `word word ...<TAB>frequency` lines (a final
/// whitespace-separated count is accepted where no tab is present).
pub fn build_index_from_files(inputs: &[PathBuf], out_root: &Path) -> Result<()> {
    let mut entries = Vec::new();
    for input in inputs {
        let file = File::open(input).map_err(|e| Error::cannot_open(input, e))?;
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let (text, freq) = match line.rsplit_once('\t') {
                Some((text, freq)) => (text.to_string(), freq),
                None => match line.trim_end().rsplit_once(char::is_whitespace) {
                    Some((text, freq)) => (text.to_string(), freq),
                    None => {
                        return Err(Error::build(format!(
                            "{}:{}: expected `phrase<TAB>frequency`",
                            input.display(),
                            lineno + 1
                        )))
                    }
                },
            };
            let freq: u64 = freq.trim().parse().map_err(|_| {
                Error::build(format!(
                    "{}:{}: bad frequency {:?}",
                    input.display(),
                    lineno + 1,
                    freq
                ))
            })?;
            entries.push((text, freq));
        }
    }
    build_index(entries, out_root)
}

fn write_corpus(
    out_root: &Path,
    by_length: &AHashMap<u32, Vec<(Vec<String>, u64)>>,
    words: &[&str],
    word_ids: &AHashMap<&str, u32>,
) -> Result<()> {
    let bin_dir = out_root.join(PHRASE_CORPUS_DIR).join(BIN_DIR_NAME);
    fs::create_dir_all(&bin_dir)?;

    let mut vocab = BufWriter::new(File::create(bin_dir.join(VOCAB_FILE_NAME))?);
    for (id, word) in words.iter().enumerate() {
        writeln!(vocab, "{} {}", word, id)?;
    }
    vocab.flush()?;

    for (&length, class) in by_length {
        let mut file =
            BufWriter::new(File::create(bin_dir.join(phrase_file_name(length)))?);
        for (phrase_words, freq) in class {
            file.write_all(&freq.to_le_bytes())?;
            for word in phrase_words {
                let id = word_ids
                    .get(word.as_str())
                    .ok_or_else(|| Error::build("word missing from vocabulary"))?;
                file.write_all(&id.to_le_bytes())?;
            }
        }
        file.flush()?;
    }
    Ok(())
}

fn write_dictionary(
    out_root: &Path,
    by_length: &AHashMap<u32, Vec<(Vec<String>, u64)>>,
) -> Result<()> {
    let mut entries: Vec<(String, FreqId)> = Vec::new();
    for class in by_length.values() {
        for (local, (words, freq)) in class.iter().enumerate() {
            entries.push((
                words.join(" "),
                FreqId {
                    freq: *freq,
                    id: local as u32,
                },
            ));
        }
    }
    bighashmap::build(entries, &out_root.join(PHRASE_DICTIONARY_DIR))
}

fn write_postings(
    out_root: &Path,
    by_length: &AHashMap<u32, Vec<(Vec<String>, u64)>>,
) -> Result<()> {
    let mut builder: IndexBuilder<PhraseRef> = IndexBuilder::new();
    for (&length, class) in by_length {
        for (local, (words, freq)) in class.iter().enumerate() {
            for (position, word) in words.iter().enumerate() {
                builder.insert(
                    &format!("{}:{}_{}", length, position, word),
                    PhraseRef {
                        id: local as u32,
                        freq: *freq,
                    },
                );
            }
        }
    }

    let mut postings =
        StorageWriter::create(&out_root.join(PHRASE_INDEX_DIR), ValueSorting::Descending)?;
    let mut sketches =
        StorageWriter::create(&out_root.join(POSTLIST_INDEX_DIR), ValueSorting::Disabled)?;
    builder.for_each_sorted(
        |values| values.sort_by(|a, b| b.freq.cmp(&a.freq).then(a.id.cmp(&b.id))),
        |key, values| {
            postings.write_postlist(key, values)?;
            if let Some(samples) = sketch(values) {
                sketches.write_postlist(key, &samples)?;
            }
            Ok(())
        },
    )?;
    postings.finish()?;
    sketches.finish()?;
    Ok(())
}

/// Quantile samples of the cumulative normalized frequency, one sample per
/// [`QUANTILE_RESOLUTION`] entries. Short postlists have no sketch.
fn sketch(values: &[PhraseRef]) -> Option<Vec<QuantileSample>> {
    let q = values.len() / QUANTILE_RESOLUTION;
    if q == 0 {
        return None;
    }
    let total: u128 = values.iter().map(|v| v.freq as u128).sum();
    if total == 0 {
        return None;
    }
    let mut samples: Vec<QuantileSample> = Vec::with_capacity(q);
    let mut cumulative: u128 = 0;
    let mut next = 1u128;
    for (index, value) in values.iter().enumerate() {
        cumulative += value.freq as u128;
        while next <= q as u128 && cumulative * (q as u128 + 1) >= total * next {
            if samples.last().map(|s| s.index) != Some(index as u32) {
                samples.push(QuantileSample {
                    index: index as u32,
                    freq: value.freq,
                });
            }
            next += 1;
        }
    }
    Some(samples)
}

fn write_regex_vocabulary(out_root: &Path, words: &[&str]) -> Result<()> {
    let dir = out_root.join(REGEX_VOCABULARY_DIR);
    fs::create_dir_all(&dir)?;
    let mut file = BufWriter::new(File::create(dir.join(REGEX_VOCAB_FILE_NAME))?);
    for word in words {
        writeln!(file, "{}", word)?;
    }
    file.flush()?;
    Ok(())
}
