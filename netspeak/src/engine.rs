//! The search engine: opens all index components once, then answers
//! requests. Parse -> normalize -> retrieve per norm query (dictionary for
//! pure-word, postings for wildcard, result cache in between) -> merge and
//! top-K -> tagged response phrases.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use netspeak_core::corpus::BIN_DIR_NAME;
use netspeak_core::{
    BigHashMap, DefaultRegexIndex, FreqId, MemoryMode, Phrase, PhraseCorpus, PhraseId,
};

use crate::cache::{is_prunable_from, prune, CacheEntry, ResultCache};
use crate::config::Config;
use crate::dictionaries::SynonymDictionary;
use crate::error::{Error, Result};
use crate::indexing::REGEX_VOCAB_FILE_NAME;
use crate::norm::NormQuery;
use crate::normalizer::{NormalizerOptions, QueryNormalizer};
use crate::parser::parse_query;
use crate::query::Query;
use crate::retrieval::{QueryProcessor, RawRefResult, SearchOptions};
use crate::service::{
    word_tag, ResponsePhrase, ResponseWord, SearchRequest, SearchResponse, SearchResult,
};

/// Index tables up to this size stay in memory; larger ones are read
/// per-lookup from disk.
const INDEX_MEMORY_BUDGET: u64 = 1 << 30;

const DEFAULT_PRUNING_HIGH: u32 = 160_000;
const DEFAULT_PRUNING_LOW: u32 = 130_000;
const DEFAULT_MAX_NORM_QUERIES: usize = 10_000;

/// A phrase found through the dictionary, or the unknown words that
/// prevented it.
#[derive(Debug, Default)]
struct RawPhraseResult {
    phrases: Vec<Phrase>,
    unknown_words: Vec<String>,
}

enum RawItem {
    Refs(Arc<RawRefResult>),
    Phrases(RawPhraseResult),
}

pub struct Netspeak {
    regex_max_matches: u32,
    regex_max_time: std::time::Duration,
    lower_case: bool,
    phrase_corpus: PhraseCorpus,
    phrase_dictionary: BigHashMap<FreqId>,
    hash_dictionary: Arc<SynonymDictionary>,
    regex_index: Option<Arc<DefaultRegexIndex>>,
    normalizer: QueryNormalizer,
    processor: QueryProcessor,
    result_cache: ResultCache,
}

impl Netspeak {
    /// Opens every index component named by `config`. This is the single
    /// initialization phase; the returned engine is immutable apart from its
    /// result cache and safe to share across request workers.
    pub fn open(config: &Config) -> Result<Netspeak> {
        let paths = &config.paths;
        let memory = MemoryMode::Budget(INDEX_MEMORY_BUDGET);

        tracing::info!(dir = %paths.phrase_dictionary.display(), "opening phrase dictionary");
        let phrase_dictionary = BigHashMap::open(&paths.phrase_dictionary, memory)?;

        let corpus_bin = paths.phrase_corpus.join(BIN_DIR_NAME);
        tracing::info!(dir = %corpus_bin.display(), "opening phrase corpus");
        let phrase_corpus = PhraseCorpus::open(&corpus_bin)?;

        let processor =
            QueryProcessor::open(&paths.phrase_index, &paths.postlist_index, memory)?;

        // the hash dictionary is optional
        let hash_dictionary = match &paths.hash_dictionary {
            Some(dir) if dir.is_dir() => {
                tracing::info!(dir = %dir.display(), "opening hash dictionary");
                Arc::new(SynonymDictionary::load_dir(dir)?)
            }
            _ => Arc::new(SynonymDictionary::new()),
        };

        // the regex vocabulary is optional
        let regex_index = match &paths.regex_vocabulary {
            Some(dir) if dir.is_dir() => Some(Arc::new(load_regex_index(dir)?)),
            _ => None,
        };

        let normalizer = QueryNormalizer::new(regex_index.clone(), hash_dictionary.clone());

        Ok(Netspeak {
            regex_max_matches: config.search.regex.max_matches,
            regex_max_time: config.regex_max_time(),
            lower_case: config.query.lower_case,
            phrase_corpus,
            phrase_dictionary,
            hash_dictionary,
            regex_index,
            normalizer,
            processor,
            result_cache: ResultCache::new(config.cache.capacity),
        })
    }

    /// Answers one request. Never fails; every error is folded into the
    /// response error taxonomy.
    pub fn search(&self, request: &SearchRequest) -> SearchResponse {
        match self.try_search(request) {
            Ok(result) => SearchResponse::Result(result),
            Err(error) => {
                tracing::debug!(query = %request.query, %error, "search failed");
                SearchResponse::Error(error.into())
            }
        }
    }

    fn try_search(&self, request: &SearchRequest) -> Result<SearchResult> {
        let mut raw_query = crate::utils::normalize(&request.query);
        if self.lower_case {
            raw_query = raw_query.to_lowercase();
        }
        let query = parse_query(&raw_query)?;
        let (normalizer_options, search_options) = self.to_options(request);
        let (norm_queries, items) =
            self.search_raw(&normalizer_options, &search_options, &query)?;
        self.merge_raw_result(&search_options, &norm_queries, items)
    }

    fn to_options(&self, request: &SearchRequest) -> (NormalizerOptions, SearchOptions) {
        let constraints = &request.phrase_constraints;

        // the indexes do not contain the empty phrase
        let min_length = constraints.words_min.max(1);
        let mut max_length = self.phrase_corpus.max_length();
        if constraints.words_max != 0 && constraints.words_max < max_length {
            max_length = constraints.words_max;
        }
        let max_frequency = if constraints.frequency_max != 0 {
            constraints.frequency_max
        } else {
            u64::MAX
        };

        let search_options = SearchOptions {
            max_phrase_count: request.max_phrases,
            max_phrase_frequency: max_frequency,
            phrase_length_min: min_length,
            phrase_length_max: max_length,
            pruning_high: DEFAULT_PRUNING_HIGH,
            pruning_low: DEFAULT_PRUNING_LOW,
        };
        let normalizer_options = NormalizerOptions {
            max_norm_queries: DEFAULT_MAX_NORM_QUERIES,
            min_length,
            max_length,
            max_regex_matches: self.regex_max_matches,
            max_regex_time: self.regex_max_time,
        };
        (normalizer_options, search_options)
    }

    fn search_raw(
        &self,
        normalizer_options: &NormalizerOptions,
        search_options: &SearchOptions,
        query: &Query,
    ) -> Result<(Vec<NormQuery>, Vec<RawItem>)> {
        let norm_queries = self.normalizer.normalize(query, normalizer_options)?;
        let mut items = Vec::with_capacity(norm_queries.len());
        for norm_query in &norm_queries {
            let item = if norm_query.has_qmarks() {
                RawItem::Refs(self.process_wildcard_query(search_options, norm_query)?)
            } else {
                RawItem::Phrases(self.process_non_wildcard_query(search_options, norm_query)?)
            };
            items.push(item);
        }
        Ok((norm_queries, items))
    }

    /// Wildcard norm queries are answered through the result cache: an
    /// exact-options hit is returned as is, a prunable superset is cut down,
    /// anything else is computed fresh and folded back into the cache.
    fn process_wildcard_query(
        &self,
        options: &SearchOptions,
        query: &NormQuery,
    ) -> Result<Arc<RawRefResult>> {
        let key = query.key();
        let cached = self.result_cache.find(&key);

        if let Some(entry) = &cached {
            if entry.options == *options {
                return Ok(entry.result.clone());
            }
            if is_prunable_from(&entry.options, options) {
                return Ok(Arc::new(prune(&entry.result, options)));
            }
        }

        let fresh = Arc::new(self.processor.process(options, &self.phrase_corpus, query)?);
        match cached {
            Some(entry) if !fresh.disjoint_with(&entry.result) => {
                // both are slices of the same postlist; extend the cached one
                let merged = Arc::new(fresh.merge(&entry.result));
                self.result_cache.insert(
                    key,
                    Arc::new(CacheEntry {
                        options: options.clone(),
                        result: merged,
                    }),
                );
            }
            _ => {
                self.result_cache.insert(
                    key,
                    Arc::new(CacheEntry {
                        options: options.clone(),
                        result: fresh.clone(),
                    }),
                );
            }
        }
        Ok(fresh)
    }

    fn process_non_wildcard_query(
        &self,
        options: &SearchOptions,
        query: &NormQuery,
    ) -> Result<RawPhraseResult> {
        let mut result = RawPhraseResult::default();
        let key = query.key();

        let entry = if options.max_phrase_count > 0 {
            self.phrase_dictionary.get(&key)?
        } else {
            None
        };
        match entry {
            Some(FreqId { freq, id }) => {
                if freq <= options.max_phrase_frequency {
                    result.phrases.push(Phrase {
                        id: PhraseId::new(query.len() as u32, id),
                        frequency: freq,
                        words: query
                            .units
                            .iter()
                            .filter_map(|u| u.text().map(str::to_string))
                            .collect(),
                    });
                }
            }
            None => {
                // unknown phrase (or nothing requested): report the words
                // the dictionary does not know
                for unit in &query.units {
                    if let Some(text) = unit.text() {
                        if self.phrase_dictionary.get(text)?.is_none() {
                            result.unknown_words.push(text.to_string());
                        }
                    }
                }
            }
        }
        Ok(result)
    }

    fn merge_raw_result(
        &self,
        options: &SearchOptions,
        norm_queries: &[NormQuery],
        items: Vec<RawItem>,
    ) -> Result<SearchResult> {
        let mut unknown_words: Vec<String> = Vec::new();
        for item in &items {
            match item {
                RawItem::Refs(refs) => {
                    unknown_words.extend(refs.unknown_words.iter().cloned())
                }
                RawItem::Phrases(phrases) => {
                    unknown_words.extend(phrases.unknown_words.iter().cloned())
                }
            }
        }
        unknown_words.sort();
        unknown_words.dedup();

        let max_phrase_count = options.max_phrase_count as usize;
        if max_phrase_count == 0 {
            return Ok(SearchResult {
                phrases: Vec::new(),
                unknown_words,
            });
        }

        // top-k unique phrase refs across all wildcard norm queries,
        // first-owning query wins on duplicates
        struct MergedRef {
            id: PhraseId,
            freq: u64,
            query_index: usize,
            arrival: usize,
        }
        let mut refs: Vec<MergedRef> = Vec::new();
        for (query_index, item) in items.iter().enumerate() {
            if let RawItem::Refs(result) = item {
                let length = norm_queries[query_index].len() as u32;
                for r in &result.refs {
                    refs.push(MergedRef {
                        id: PhraseId::new(length, r.id),
                        freq: r.freq,
                        query_index,
                        arrival: refs.len(),
                    });
                }
            }
        }
        refs.sort_by(|a, b| {
            b.freq
                .cmp(&a.freq)
                .then(a.id.cmp(&b.id))
                .then(a.arrival.cmp(&b.arrival))
        });
        refs.dedup_by(|next, first| next.id == first.id);
        refs.truncate(max_phrase_count);

        // resolve the surviving refs in one corpus read
        let ids: Vec<PhraseId> = refs.iter().map(|r| r.id).collect();
        let ref_phrases = self.phrase_corpus.read_phrases(&ids)?;

        // union with the dictionary phrases and sort the final set
        let mut finals: Vec<(Phrase, usize)> = Vec::new();
        for (r, phrase) in refs.iter().zip(ref_phrases) {
            finals.push((phrase, r.query_index));
        }
        for (query_index, item) in items.into_iter().enumerate() {
            if let RawItem::Phrases(result) = item {
                for phrase in result.phrases {
                    finals.push((phrase, query_index));
                }
            }
        }
        finals.sort_by(|a, b| b.0.frequency.cmp(&a.0.frequency).then(a.0.id.cmp(&b.0.id)));
        finals.dedup_by(|next, first| next.0.id == first.0.id);
        finals.truncate(max_phrase_count);

        let mut phrases = Vec::with_capacity(finals.len());
        for (phrase, query_index) in finals {
            let query = &norm_queries[query_index];
            if query.len() != phrase.words.len() {
                return Err(Error::Internal(format!(
                    "phrase ({}, {}) does not fit its norm query {:?}",
                    phrase.id.length,
                    phrase.id.local,
                    query.key()
                )));
            }
            let words = phrase
                .words
                .into_iter()
                .zip(&query.units)
                .map(|(text, unit)| ResponseWord {
                    text,
                    tag: word_tag(unit),
                })
                .collect();
            phrases.push(ResponsePhrase {
                id: phrase.id.local,
                frequency: phrase.frequency,
                words,
            });
        }
        Ok(SearchResult {
            phrases,
            unknown_words,
        })
    }

    /// Diagnostic counters, mostly for operators and tests.
    pub fn properties(&self) -> BTreeMap<String, String> {
        let mut properties = BTreeMap::new();
        properties.insert(
            "cache.policy".to_string(),
            "least recently used".to_string(),
        );
        properties.insert("cache.size".to_string(), self.result_cache.len().to_string());
        properties.insert(
            "cache.capacity".to_string(),
            self.result_cache.capacity().to_string(),
        );
        properties.insert(
            "cache.access-count".to_string(),
            self.result_cache.access_count().to_string(),
        );
        properties.insert(
            "cache.hit-rate".to_string(),
            format!("{:.3}", self.result_cache.hit_rate()),
        );
        for length in 1..=self.phrase_corpus.max_length() {
            properties.insert(
                format!("corpus.{}gram-count", length),
                self.phrase_corpus
                    .count_phrases(length)
                    .map(|n| n.to_string())
                    .unwrap_or_else(|e| e.to_string()),
            );
        }
        properties.insert(
            "dictionary.size".to_string(),
            self.phrase_dictionary.size().to_string(),
        );
        properties.insert(
            "hash-dictionary.size".to_string(),
            self.hash_dictionary.size().to_string(),
        );
        properties.insert(
            "regex-vocabulary.size".to_string(),
            self.regex_index
                .as_ref()
                .map(|i| i.vocabulary_size())
                .unwrap_or(0)
                .to_string(),
        );
        properties
    }
}

fn load_regex_index(dir: &Path) -> Result<DefaultRegexIndex> {
    // prefer the conventional file name, fall back to the first file
    let preferred = dir.join(REGEX_VOCAB_FILE_NAME);
    let path = if preferred.is_file() {
        preferred
    } else {
        let mut files: Vec<_> = std::fs::read_dir(dir)
            .map_err(|e| Error::Internal(format!("cannot open {}: {}", dir.display(), e)))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        files.sort();
        match files.into_iter().next() {
            Some(path) => path,
            None => return Err(Error::Internal(format!(
                "regex vocabulary directory {} is empty",
                dir.display()
            ))),
        }
    };
    tracing::info!(file = %path.display(), "opening regex vocabulary");
    let vocabulary = std::fs::read_to_string(&path)
        .map_err(|e| Error::Internal(format!("cannot read {}: {}", path.display(), e)))?;
    Ok(DefaultRegexIndex::new(vocabulary))
}
