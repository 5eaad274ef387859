//! netspeak
//!
//! Phrase search over an n-gram corpus: queries like `to be ? not to *` are
//! expanded into concrete norm queries and answered with the most frequent
//! matching phrases.
//!
//! Public API:
//! - `Netspeak` - the engine: open an index directory, answer requests
//! - `SearchRequest` / `SearchResponse` - the service boundary
//! - `Config` - TOML-backed configuration (paths, regex limits, cache size)
//! - `parse_query` / `QueryNormalizer` - the query pipeline, usable alone
//! - `indexing` - builds a full index tree from raw n-gram counts

pub mod cache;
pub mod config;
pub mod dictionaries;
pub mod engine;
pub mod error;
pub mod indexing;
pub mod norm;
pub mod normalizer;
pub mod parser;
pub mod query;
pub mod retrieval;
pub mod service;

pub use cache::ResultCache;
pub use config::Config;
pub use dictionaries::SynonymDictionary;
pub use engine::Netspeak;
pub use error::{Error, Result, Span};
pub use norm::{NormKind, NormQuery, NormUnit, UnitSource};
pub use normalizer::{NormalizerOptions, QueryNormalizer, MAX_WORST_CASE_COMPLEXITY};
pub use parser::parse_query;
pub use query::{Query, Tag, Unit};
pub use retrieval::{QueryProcessor, RawRefResult, SearchOptions};
pub use service::{
    ErrorKind, PhraseConstraints, ResponseError, ResponsePhrase, ResponseWord, SearchRequest,
    SearchResponse, SearchResult, WordTag,
};

/// Utility helpers.
pub mod utils {
    /// Normalize input strings (NFC) and trim whitespace.
    pub fn normalize(s: &str) -> String {
        use unicode_normalization::UnicodeNormalization;
        s.nfc().collect::<String>().trim().to_string()
    }
}
