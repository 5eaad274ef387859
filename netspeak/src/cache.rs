//! Bounded result cache keyed by the canonical norm-query string.
//!
//! The cache stores `(options, refs)` pairs behind one mutex; lookups are the
//! common case and writes are bounded by the query rate. A capacity of zero
//! disables caching entirely. Cache operations never fail a request.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use lru::LruCache;

use crate::retrieval::{RawRefResult, SearchOptions};

#[derive(Debug)]
pub struct CacheEntry {
    pub options: SearchOptions,
    pub result: Arc<RawRefResult>,
}

pub struct ResultCache {
    inner: Option<Mutex<LruCache<String, Arc<CacheEntry>>>>,
    accesses: AtomicUsize,
    hits: AtomicUsize,
}

impl ResultCache {
    pub fn new(capacity: usize) -> ResultCache {
        let inner = NonZeroUsize::new(capacity).map(|c| Mutex::new(LruCache::new(c)));
        ResultCache {
            inner,
            accesses: AtomicUsize::new(0),
            hits: AtomicUsize::new(0),
        }
    }

    pub fn find(&self, key: &str) -> Option<Arc<CacheEntry>> {
        let inner = self.inner.as_ref()?;
        self.accesses.fetch_add(1, Ordering::Relaxed);
        let mut cache = inner.lock().ok()?;
        let entry = cache.get(key).cloned();
        if entry.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        entry
    }

    /// Inserts or replaces; eviction is the LRU's concern.
    pub fn insert(&self, key: String, entry: Arc<CacheEntry>) {
        if let Some(inner) = &self.inner {
            if let Ok(mut cache) = inner.lock() {
                cache.put(key, entry);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner
            .as_ref()
            .and_then(|inner| inner.lock().ok().map(|cache| cache.len()))
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner
            .as_ref()
            .and_then(|inner| inner.lock().ok().map(|cache| cache.cap().get()))
            .unwrap_or(0)
    }

    pub fn access_count(&self) -> usize {
        self.accesses.load(Ordering::Relaxed)
    }

    pub fn hit_rate(&self) -> f64 {
        let accesses = self.accesses.load(Ordering::Relaxed);
        if accesses == 0 {
            return 0.0;
        }
        self.hits.load(Ordering::Relaxed) as f64 / accesses as f64
    }
}

/// Whether a result computed under `superset` can serve a request with
/// `options` by pruning alone.
pub fn is_prunable_from(superset: &SearchOptions, options: &SearchOptions) -> bool {
    superset.max_phrase_frequency == options.max_phrase_frequency
        && superset.max_phrase_count >= options.max_phrase_count
        && superset.phrase_length_min <= options.phrase_length_min
        && superset.phrase_length_max >= options.phrase_length_max
        && superset.pruning_low >= options.pruning_low
        && superset.pruning_high >= options.pruning_high
}

/// Cuts a cached result down to what `options` asks for.
pub fn prune(result: &RawRefResult, options: &SearchOptions) -> RawRefResult {
    let mut pruned = RawRefResult::default();
    if options.max_phrase_count > 0 {
        for r in &result.refs {
            if r.freq <= options.max_phrase_frequency {
                pruned.refs.push(*r);
                if pruned.refs.len() >= options.max_phrase_count as usize {
                    break;
                }
            }
        }
    }
    pruned.unknown_words = result.unknown_words.clone();
    pruned
}

#[cfg(test)]
mod tests {
    use super::*;
    use netspeak_core::PhraseRef;

    fn options() -> SearchOptions {
        SearchOptions {
            max_phrase_count: 10,
            max_phrase_frequency: u64::MAX,
            phrase_length_min: 1,
            phrase_length_max: 5,
            pruning_high: 160_000,
            pruning_low: 130_000,
        }
    }

    #[test]
    fn prunable_needs_equal_frequency_cap_and_wider_scope() {
        let cached = options();
        let mut request = options();
        request.max_phrase_count = 5;
        assert!(is_prunable_from(&cached, &request));

        request.max_phrase_frequency = 100;
        assert!(!is_prunable_from(&cached, &request));

        let mut request = options();
        request.max_phrase_count = 20;
        assert!(!is_prunable_from(&cached, &request));
    }

    #[test]
    fn prune_caps_and_filters() {
        let result = RawRefResult {
            refs: vec![
                PhraseRef { id: 0, freq: 100 },
                PhraseRef { id: 1, freq: 50 },
                PhraseRef { id: 2, freq: 10 },
            ],
            unknown_words: vec!["x".into()],
        };
        let mut opts = options();
        opts.max_phrase_count = 1;
        opts.max_phrase_frequency = 60;
        let pruned = prune(&result, &opts);
        assert_eq!(pruned.refs, vec![PhraseRef { id: 1, freq: 50 }]);
        assert_eq!(pruned.unknown_words, vec!["x"]);
    }

    #[test]
    fn zero_capacity_disables_the_cache() {
        let cache = ResultCache::new(0);
        cache.insert(
            "key".into(),
            Arc::new(CacheEntry {
                options: options(),
                result: Arc::new(RawRefResult::default()),
            }),
        );
        assert!(cache.find("key").is_none());
        assert_eq!(cache.capacity(), 0);
    }

    #[test]
    fn lru_round_trip() {
        let cache = ResultCache::new(2);
        let entry = Arc::new(CacheEntry {
            options: options(),
            result: Arc::new(RawRefResult::default()),
        });
        cache.insert("a".into(), entry.clone());
        assert!(cache.find("a").is_some());
        assert!(cache.find("b").is_none());
        assert!(cache.hit_rate() > 0.0 && cache.hit_rate() < 1.0);
    }
}
