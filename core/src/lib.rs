//! netspeak-core
//!
//! Storage and index primitives for the netspeak phrase search engine:
//!
//! - `invertedindex` - on-disk postlist storage with perfect-hash key tables
//! - `bighashmap` - read-only dictionary over huge key sets (MPHF + checksum)
//! - `corpus` - flat binary n-gram corpus with batched positioned reads
//! - `regex` - in-memory regex word-set index over a ranked vocabulary
//!
//! Everything here is built once offline and opened read-only at runtime; the
//! only locks are per-file mutexes serializing shared seek+read sequences.
//! All on-disk integers are little-endian.

pub mod bighashmap;
pub mod corpus;
pub mod error;
pub mod hash;
pub mod invertedindex;
pub mod phrase;
pub mod regex;
pub mod value;

pub use bighashmap::{BigHashMap, MemoryMode};
pub use corpus::PhraseCorpus;
pub use error::{Error, Result};
pub use invertedindex::{
    Head, IndexBuilder, Postlist, Properties, StorageReader, StorageWriter, ValueSorting,
};
pub use phrase::{Phrase, PhraseId, PhraseLength};
pub use regex::{parse_regex_query, DefaultRegexIndex, RegexQuery, RegexQueryBuilder, RegexUnit};
pub use value::{Address, DiskValue, FreqId, PhraseRef, QuantileSample};
