//! Postings-based retrieval for norm queries with qmarks.
//!
//! A wildcard norm query is answered from the phrase index: pick the most
//! selective fixed position (smallest postlist), scan it in descending
//! frequency order and verify the remaining fixed words by fetching the
//! candidate phrases from the corpus in batches. The postlist sketch supplies
//! a start offset when a `max_phrase_frequency` constraint would otherwise
//! force a scan through a high-frequency prefix.

use std::cmp::Ordering;
use std::path::Path;

use netspeak_core::{
    MemoryMode, PhraseCorpus, PhraseId, PhraseLength, PhraseRef, QuantileSample, StorageReader,
};

use crate::error::Result;

/// Per-request knobs, derived from the search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    pub max_phrase_count: u32,
    pub max_phrase_frequency: u64,
    pub phrase_length_min: u32,
    pub phrase_length_max: u32,
    /// Upper bound on postlist entries scanned per norm query.
    pub pruning_high: u32,
    /// Scan bound for incremental re-reads below the high watermark.
    pub pruning_low: u32,
}

/// References to matching phrases, in descending frequency order, plus the
/// query words that are not in the corpus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRefResult {
    pub refs: Vec<PhraseRef>,
    pub unknown_words: Vec<String>,
}

/// Postlist order: descending frequency, ids ascending among equals.
pub fn ref_cmp(a: &PhraseRef, b: &PhraseRef) -> Ordering {
    b.freq.cmp(&a.freq).then(a.id.cmp(&b.id))
}

impl RawRefResult {
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// Whether the two results cannot share any refs.
    ///
    /// Assumes both are prefix slices of one underlying postlist, so
    /// comparing the boundary elements is enough.
    pub fn disjoint_with(&self, other: &RawRefResult) -> bool {
        let (Some(this_first), Some(this_last)) = (self.refs.first(), self.refs.last()) else {
            return true;
        };
        let (Some(other_first), Some(other_last)) = (other.refs.first(), other.refs.last())
        else {
            return true;
        };
        if ref_cmp(this_first, other_first) == Ordering::Less {
            ref_cmp(this_last, other_first) == Ordering::Less
        } else {
            ref_cmp(other_last, this_first) == Ordering::Less
        }
    }

    /// Set union by id, preserving descending frequency order; unknown-word
    /// lists are concatenated, sorted and deduplicated.
    pub fn merge(&self, other: &RawRefResult) -> RawRefResult {
        let mut refs = Vec::with_capacity(self.refs.len() + other.refs.len());
        let (mut i, mut j) = (0, 0);
        while i < self.refs.len() && j < other.refs.len() {
            match ref_cmp(&self.refs[i], &other.refs[j]) {
                Ordering::Less => {
                    refs.push(self.refs[i]);
                    i += 1;
                }
                Ordering::Greater => {
                    refs.push(other.refs[j]);
                    j += 1;
                }
                Ordering::Equal => {
                    refs.push(self.refs[i]);
                    i += 1;
                    j += 1;
                }
            }
        }
        refs.extend_from_slice(&self.refs[i..]);
        refs.extend_from_slice(&other.refs[j..]);

        let mut unknown_words = self.unknown_words.clone();
        unknown_words.extend(other.unknown_words.iter().cloned());
        unknown_words.sort();
        unknown_words.dedup();
        RawRefResult {
            refs,
            unknown_words,
        }
    }
}

/// One fixed (non-qmark) position of a norm query.
struct FixedWord<'a> {
    position: usize,
    word: &'a str,
}

pub struct QueryProcessor {
    phrase_index: StorageReader<PhraseRef>,
    postlist_index: StorageReader<QuantileSample>,
}

/// Key of the postlist for `word` at `position` within `length`-grams.
pub fn postlist_key(length: PhraseLength, position: usize, word: &str) -> String {
    format!("{}:{}_{}", length, position, word)
}

impl QueryProcessor {
    pub fn open(
        phrase_index_dir: &Path,
        postlist_index_dir: &Path,
        memory: MemoryMode,
    ) -> Result<QueryProcessor> {
        let phrase_index = StorageReader::open(phrase_index_dir, memory)?;
        let postlist_index = StorageReader::open(postlist_index_dir, memory)?;
        tracing::info!(
            keys = phrase_index.properties().key_count,
            values = phrase_index.properties().value_count,
            "opened phrase index"
        );
        Ok(QueryProcessor {
            phrase_index,
            postlist_index,
        })
    }

    /// Resolves a wildcard norm query to phrase refs.
    pub fn process(
        &self,
        options: &SearchOptions,
        corpus: &PhraseCorpus,
        query: &crate::norm::NormQuery,
    ) -> Result<RawRefResult> {
        let length = query.len() as PhraseLength;
        let fixed: Vec<FixedWord> = query
            .units
            .iter()
            .enumerate()
            .filter_map(|(position, unit)| {
                unit.text().map(|word| FixedWord { position, word })
            })
            .collect();

        if fixed.is_empty() {
            return self.process_all_qmarks(options, corpus, length);
        }

        // a word without a 1-gram postlist is not in the corpus at all
        let mut unknown_words: Vec<String> = Vec::new();
        for fixed_word in &fixed {
            if self
                .phrase_index
                .read_head(&postlist_key(1, 0, fixed_word.word))?
                .is_none()
            {
                unknown_words.push(fixed_word.word.to_string());
            }
        }
        unknown_words.sort();
        unknown_words.dedup();
        if !unknown_words.is_empty() || options.max_phrase_count == 0 {
            return Ok(RawRefResult {
                refs: Vec::new(),
                unknown_words,
            });
        }

        // most selective fixed position first
        let mut primary: Option<(&FixedWord, u32)> = None;
        for fixed_word in &fixed {
            let key = postlist_key(length, fixed_word.position, fixed_word.word);
            let Some(head) = self.phrase_index.read_head(&key)? else {
                // the word never occurs at this position in this length class
                return Ok(RawRefResult::default());
            };
            match primary {
                Some((_, count)) if head.value_count >= count => {}
                _ => primary = Some((fixed_word, head.value_count)),
            }
        }
        let Some((primary, _)) = primary else {
            return Ok(RawRefResult::default());
        };

        let primary_key = postlist_key(length, primary.position, primary.word);
        let begin = self.sketch_begin(&primary_key, options.max_phrase_frequency)?;
        let scan_cap = options.pruning_high.max(options.max_phrase_count);
        let Some(mut postlist) = self.phrase_index.read_postlist(&primary_key, begin, scan_cap)?
        else {
            return Ok(RawRefResult::default());
        };

        let others: Vec<&FixedWord> = fixed
            .iter()
            .filter(|f| f.position != primary.position)
            .collect();

        let wanted = options.max_phrase_count as usize;
        let mut refs: Vec<PhraseRef> = Vec::new();
        let mut batch: Vec<PhraseRef> = Vec::new();
        let batch_size = wanted.clamp(64, 1024);
        while let Some(value) = postlist.next()? {
            if value.freq > options.max_phrase_frequency {
                continue;
            }
            if others.is_empty() {
                refs.push(value);
                if refs.len() >= wanted {
                    break;
                }
            } else {
                batch.push(value);
                if batch.len() >= batch_size {
                    self.verify_batch(corpus, length, &others, &mut batch, &mut refs, wanted)?;
                    if refs.len() >= wanted {
                        break;
                    }
                }
            }
        }
        if refs.len() < wanted && !batch.is_empty() {
            self.verify_batch(corpus, length, &others, &mut batch, &mut refs, wanted)?;
        }
        Ok(RawRefResult {
            refs,
            unknown_words,
        })
    }

    /// Cross-checks candidate phrases against the remaining fixed words by
    /// reading them from the corpus. Candidates arrive and leave in
    /// descending frequency order.
    fn verify_batch(
        &self,
        corpus: &PhraseCorpus,
        length: PhraseLength,
        others: &[&FixedWord],
        batch: &mut Vec<PhraseRef>,
        refs: &mut Vec<PhraseRef>,
        wanted: usize,
    ) -> Result<()> {
        let ids: Vec<PhraseId> = batch
            .iter()
            .map(|r| PhraseId::new(length, r.id))
            .collect();
        let phrases = corpus.read_phrases(&ids)?;
        for (candidate, phrase) in batch.iter().zip(&phrases) {
            let matches = others
                .iter()
                .all(|f| phrase.words.get(f.position).map(String::as_str) == Some(f.word));
            if matches {
                refs.push(*candidate);
                if refs.len() >= wanted {
                    break;
                }
            }
        }
        batch.clear();
        Ok(())
    }

    /// All-qmark queries read the corpus class directly: local ids are
    /// assigned in descending frequency order at build time.
    fn process_all_qmarks(
        &self,
        options: &SearchOptions,
        corpus: &PhraseCorpus,
        length: PhraseLength,
    ) -> Result<RawRefResult> {
        let total = corpus.count_phrases(length)?;
        let wanted = options.max_phrase_count as usize;
        let mut refs = Vec::new();
        let mut local = 0u64;
        let batch_size = wanted.clamp(64, 1024) as u64;
        while refs.len() < wanted && local < total {
            let upper = (local + batch_size).min(total);
            let ids: Vec<PhraseId> =
                (local..upper).map(|i| PhraseId::new(length, i as u32)).collect();
            for phrase in corpus.read_phrases(&ids)? {
                if phrase.frequency > options.max_phrase_frequency {
                    continue;
                }
                refs.push(PhraseRef {
                    id: phrase.id.local,
                    freq: phrase.frequency,
                });
                if refs.len() >= wanted {
                    break;
                }
            }
            local = upper;
        }
        Ok(RawRefResult {
            refs,
            unknown_words: Vec::new(),
        })
    }

    fn sketch_begin(&self, key: &str, max_phrase_frequency: u64) -> Result<u32> {
        if max_phrase_frequency == u64::MAX {
            return Ok(0);
        }
        let Some(mut sketch) = self.postlist_index.read_postlist(key, 0, u32::MAX)? else {
            return Ok(0);
        };
        // samples carry ascending indexes and non-ascending frequencies;
        // everything before the last sample above the cap can be skipped
        let mut begin = 0u32;
        while let Some(sample) = sketch.next()? {
            if sample.freq > max_phrase_frequency {
                begin = sample.index;
            } else {
                break;
            }
        }
        Ok(begin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(refs: &[(u32, u64)]) -> RawRefResult {
        RawRefResult {
            refs: refs
                .iter()
                .map(|&(id, freq)| PhraseRef { id, freq })
                .collect(),
            unknown_words: Vec::new(),
        }
    }

    #[test]
    fn disjoint_ranges() {
        let high = result(&[(0, 100), (1, 90)]);
        let low = result(&[(2, 50), (3, 40)]);
        assert!(high.disjoint_with(&low));
        assert!(low.disjoint_with(&high));
        assert!(result(&[]).disjoint_with(&high));

        let overlapping = result(&[(4, 95), (5, 45)]);
        assert!(!high.disjoint_with(&overlapping));
        assert!(!overlapping.disjoint_with(&low));
    }

    #[test]
    fn merge_unions_by_id() {
        let a = result(&[(0, 100), (1, 90), (2, 80)]);
        let b = result(&[(1, 90), (3, 85), (2, 80)]);
        let merged = a.merge(&b);
        assert_eq!(
            merged.refs,
            vec![
                PhraseRef { id: 0, freq: 100 },
                PhraseRef { id: 1, freq: 90 },
                PhraseRef { id: 3, freq: 85 },
                PhraseRef { id: 2, freq: 80 },
            ]
        );
    }

    #[test]
    fn merge_dedups_unknown_words() {
        let mut a = result(&[]);
        a.unknown_words = vec!["zebra".into(), "apple".into()];
        let mut b = result(&[]);
        b.unknown_words = vec!["apple".into()];
        let merged = a.merge(&b);
        assert_eq!(merged.unknown_words, vec!["apple", "zebra"]);
    }
}
