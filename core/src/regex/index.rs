//! In-memory regex index over a frequency-sorted vocabulary.
//!
//! The vocabulary is one UTF-8 string; every non-empty line is a word. Words
//! are returned in order of occurrence, which for Netspeak vocabularies means
//! descending corpus frequency — the index itself never ranks.
//!
//! Three structures make matching fast:
//!
//! - a word directory of `(offset, length)` entries, giving O(1) access by
//!   index, length-based pre-rejection, and frequency-ordered iteration;
//! - the set of all code points in the vocabulary, used to simplify queries
//!   (a literal with an unknown character can never match) — bounded by
//!   script size, about 2 MB even for CJK vocabularies;
//! - a linear-probe hash table from word to directory index, sized to the
//!   next power of two of 1.5x the word count (doubled when that would load
//!   the table above ~0.67), for queries with few enough combinations to
//!   enumerate.

use std::time::{Duration, Instant};

use ahash::AHashSet;

use crate::error::{Error, Result};
use crate::hash::hash32;

use super::query::{RegexQuery, RegexQueryBuilder, RegexUnit};

const EMPTY_SLOT: u32 = u32::MAX;

/// Queries with at most this many combinations go through the hash table
/// instead of the regex scan.
const MAX_HASH_LOOKUP_COMBINATIONS: u32 = 1000;

/// The scan path checks the clock once per this many words.
const TIMEOUT_CHECK_INTERVAL: usize = 256;

#[derive(Debug, Clone, Copy)]
struct WordEntry {
    offset: u32,
    length: u16,
}

pub struct DefaultRegexIndex {
    vocabulary: String,
    words: Vec<WordEntry>,
    all_chars: AHashSet<char>,
    table: Vec<u32>,
}

impl DefaultRegexIndex {
    /// Builds the index from a newline-separated vocabulary.
    pub fn new(vocabulary: String) -> Self {
        let words = split_words(&vocabulary);
        // independent structures, built in parallel
        let (all_chars, table) = rayon::join(
            || collect_chars(&vocabulary, &words),
            || build_hash_table(&vocabulary, &words),
        );
        DefaultRegexIndex {
            vocabulary,
            words,
            all_chars,
            table,
        }
    }

    pub fn vocabulary_size(&self) -> usize {
        self.words.len()
    }

    fn word_at(&self, index: u32) -> &str {
        let entry = self.words[index as usize];
        let start = entry.offset as usize;
        &self.vocabulary[start..start + entry.length as usize]
    }

    fn find_word(&self, word: &str) -> Option<u32> {
        let mask = (self.table.len() - 1) as u32;
        let mut slot = hash32(word.as_bytes()) & mask;
        loop {
            let index = self.table[slot as usize];
            if index == EMPTY_SLOT {
                return None;
            }
            if self.word_at(index) == word {
                return Some(index);
            }
            slot = (slot + 1) & mask;
        }
    }

    /// Simplifies a query against the vocabulary's character set: a word
    /// requiring an unknown character rejects everything, an optional word
    /// with one silently disappears, char sets lose unknown members.
    fn simplify(&self, query: &RegexQuery) -> RegexQuery {
        let mut builder = RegexQueryBuilder::new();
        for unit in query.units() {
            match unit {
                RegexUnit::Word(word) => {
                    if word.chars().any(|c| !self.all_chars.contains(&c)) {
                        builder.add(RegexUnit::CharSet(Vec::new()));
                    } else {
                        builder.add(unit.clone());
                    }
                }
                RegexUnit::OptionalWord(word) => {
                    if word.chars().all(|c| self.all_chars.contains(&c)) {
                        builder.add(unit.clone());
                    }
                }
                RegexUnit::CharSet(set) => {
                    let known: Vec<char> = set
                        .iter()
                        .copied()
                        .filter(|c| self.all_chars.contains(c))
                        .collect();
                    builder.add(RegexUnit::CharSet(known));
                }
                other => builder.add(other.clone()),
            }
        }
        builder.to_query()
    }

    /// Returns up to `max_matches` vocabulary words matching `query`, in
    /// vocabulary (frequency) order. Never takes much longer than `timeout`.
    pub fn match_query(
        &self,
        query: &RegexQuery,
        max_matches: u32,
        timeout: Duration,
    ) -> Result<Vec<String>> {
        let mut matches = Vec::new();
        if max_matches == 0 {
            return Ok(matches);
        }

        let query = self.simplify(query);
        if query.reject_all() {
            return Ok(matches);
        }
        if query.accept_all_non_empty() {
            // the vocabulary has no empty words, so take the prefix
            let take = (max_matches as usize).min(self.words.len());
            for i in 0..take {
                matches.push(self.word_at(i as u32).to_string());
            }
            return Ok(matches);
        }
        if query.combinations_upper_bound() <= MAX_HASH_LOOKUP_COMBINATIONS {
            // few enough candidate words to enumerate them all; this is
            // reliably faster than any timeout, so the clock is ignored
            self.match_by_hash_lookup(&query, max_matches, &mut matches);
            return Ok(matches);
        }
        self.match_by_regex(&query, max_matches, timeout, &mut matches)?;
        Ok(matches)
    }

    /// Enumerates every word the finite query can produce and probes the
    /// hash table. Matching indexes are sorted (= frequency order) and
    /// deduplicated before being resolved to strings.
    fn match_by_hash_lookup(
        &self,
        query: &RegexQuery,
        max_matches: u32,
        matches: &mut Vec<String>,
    ) {
        let alternatives: Vec<Vec<String>> = query
            .units()
            .iter()
            .map(|unit| match unit {
                RegexUnit::CharSet(set) => set.iter().map(|c| c.to_string()).collect(),
                RegexUnit::OptionalWord(word) => vec![word.clone(), String::new()],
                RegexUnit::Word(word) => vec![word.clone()],
                // unreachable for finite queries; matches nothing extra
                RegexUnit::QMark | RegexUnit::Star => vec![String::new()],
            })
            .collect();

        let mut indexes = Vec::new();
        let mut word = String::new();
        self.enumerate(&alternatives, 0, &mut word, &mut indexes);

        indexes.sort_unstable();
        indexes.dedup();
        for index in indexes.into_iter().take(max_matches as usize) {
            matches.push(self.word_at(index).to_string());
        }
    }

    fn enumerate(
        &self,
        alternatives: &[Vec<String>],
        depth: usize,
        word: &mut String,
        indexes: &mut Vec<u32>,
    ) {
        if depth == alternatives.len() {
            if let Some(index) = self.find_word(word) {
                indexes.push(index);
            }
            return;
        }
        for alternative in &alternatives[depth] {
            let len = word.len();
            word.push_str(alternative);
            self.enumerate(alternatives, depth + 1, word, indexes);
            word.truncate(len);
        }
    }

    /// Compiles the query into an anchored regex and scans the directory,
    /// rejecting by byte length first and checking the clock every
    /// [`TIMEOUT_CHECK_INTERVAL`] words.
    fn match_by_regex(
        &self,
        query: &RegexQuery,
        max_matches: u32,
        timeout: Duration,
        matches: &mut Vec<String>,
    ) -> Result<()> {
        let pattern = build_pattern(query);
        let expression = regex::Regex::new(&pattern)
            .map_err(|e| Error::corrupt(format!("generated bad pattern {:?}: {}", pattern, e)))?;
        let min_length = query.min_utf8_input_length();
        let max_length = query.max_utf8_input_length();

        let start = Instant::now();
        for i in 0..self.words.len() {
            let length = self.words[i].length as usize;
            if length < min_length || length > max_length {
                continue;
            }
            let word = self.word_at(i as u32);
            if expression.is_match(word) {
                matches.push(word.to_string());
                if matches.len() >= max_matches as usize {
                    break;
                }
            }
            if i % TIMEOUT_CHECK_INTERVAL == 0 && start.elapsed() > timeout {
                break;
            }
        }
        Ok(())
    }
}

fn split_words(vocabulary: &str) -> Vec<WordEntry> {
    let mut words = Vec::new();
    let mut offset = 0usize;
    for line in vocabulary.split('\n') {
        let trimmed = line.trim_end_matches('\r');
        if !trimmed.is_empty() {
            words.push(WordEntry {
                offset: offset as u32,
                length: trimmed.len() as u16,
            });
        }
        offset += line.len() + 1;
    }
    words
}

fn collect_chars(vocabulary: &str, words: &[WordEntry]) -> AHashSet<char> {
    let mut chars = AHashSet::with_capacity(1024);
    for entry in words {
        let start = entry.offset as usize;
        chars.extend(vocabulary[start..start + entry.length as usize].chars());
    }
    chars
}

fn build_hash_table(vocabulary: &str, words: &[WordEntry]) -> Vec<u32> {
    let mut n = (words.len() as u32).next_power_of_two().max(1);
    if (n as usize) < words.len() + words.len() / 2 {
        n *= 2;
    }
    let mask = n - 1;
    let mut table = vec![EMPTY_SLOT; n as usize];
    for (index, entry) in words.iter().enumerate() {
        let start = entry.offset as usize;
        let bytes = &vocabulary.as_bytes()[start..start + entry.length as usize];
        let mut slot = hash32(bytes) & mask;
        while table[slot as usize] != EMPTY_SLOT {
            slot = (slot + 1) & mask;
        }
        table[slot as usize] = index as u32;
    }
    table
}

/// Translates the unit list into an anchored pattern for the `regex` crate.
/// A qmark is one code point (`.`), a star any run (`.*`); char sets become
/// non-capturing alternations so multi-byte members work; everything literal
/// is escaped.
fn build_pattern(query: &RegexQuery) -> String {
    let mut pattern = String::from("\\A(?:");
    for unit in query.units() {
        match unit {
            RegexUnit::QMark => pattern.push('.'),
            RegexUnit::Star => pattern.push_str(".*"),
            RegexUnit::Word(word) => pattern.push_str(&regex::escape(word)),
            RegexUnit::CharSet(set) => {
                pattern.push_str("(?:");
                for (i, c) in set.iter().enumerate() {
                    if i > 0 {
                        pattern.push('|');
                    }
                    pattern.push_str(&regex::escape(&c.to_string()));
                }
                pattern.push(')');
            }
            RegexUnit::OptionalWord(word) => {
                pattern.push_str("(?:");
                pattern.push_str(&regex::escape(word));
                pattern.push_str(")?");
            }
        }
    }
    pattern.push_str(")\\z");
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regex::parser::parse_regex_query;

    fn index(words: &[&str]) -> DefaultRegexIndex {
        DefaultRegexIndex::new(words.join("\n"))
    }

    fn matches(index: &DefaultRegexIndex, query: &str, k: u32) -> Vec<String> {
        index
            .match_query(&parse_regex_query(query), k, Duration::from_millis(100))
            .unwrap()
    }

    #[test]
    fn optional_letter_finds_both_spellings() {
        let idx = index(&["color", "colour", "collar"]);
        assert_eq!(matches(&idx, "colo[u]r", 10), vec!["color", "colour"]);
    }

    #[test]
    fn results_keep_vocabulary_order() {
        let idx = index(&["the", "then", "they", "theme"]);
        assert_eq!(matches(&idx, "the*", 10), vec!["the", "then", "they", "theme"]);
        assert_eq!(matches(&idx, "the*", 2), vec!["the", "then"]);
    }

    #[test]
    fn accept_all_returns_prefix() {
        let idx = index(&["a", "b", "c"]);
        assert_eq!(matches(&idx, "*", 2), vec!["a", "b"]);
        assert_eq!(matches(&idx, "+", 2), vec!["a", "b"]);
    }

    #[test]
    fn unknown_characters_reject() {
        let idx = index(&["abc", "abd"]);
        assert!(matches(&idx, "ab[cz]", 10) == vec!["abc"]);
        assert!(matches(&idx, "abz*", 10).is_empty());
    }

    #[test]
    fn qmark_matches_one_code_point() {
        let idx = index(&["bet", "beet", "bat"]);
        assert_eq!(matches(&idx, "b?t", 10), vec!["bet", "bat"]);
    }

    #[test]
    fn zero_matches_requested() {
        let idx = index(&["a"]);
        assert!(matches(&idx, "*", 0).is_empty());
    }
}
