//! Engine configuration, loaded from TOML.
//!
//! ```toml
//! [search.regex]
//! max-matches = 100
//! max-time = 20          # milliseconds
//!
//! [cache]
//! capacity = 1000000     # entries, 0 disables the cache
//!
//! [query]
//! lower-case = false
//!
//! [paths]
//! phrase-corpus = "/index/phrase-corpus"
//! phrase-dictionary = "/index/phrase-dictionary"
//! phrase-index = "/index/phrase-index"
//! postlist-index = "/index/postlist-index"
//! regex-vocabulary = "/index/regex-vocabulary"
//! hash-dictionary = "/index/hash-dictionary"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const PHRASE_CORPUS_DIR: &str = "phrase-corpus";
pub const PHRASE_DICTIONARY_DIR: &str = "phrase-dictionary";
pub const PHRASE_INDEX_DIR: &str = "phrase-index";
pub const POSTLIST_INDEX_DIR: &str = "postlist-index";
pub const REGEX_VOCABULARY_DIR: &str = "regex-vocabulary";
pub const HASH_DICTIONARY_DIR: &str = "hash-dictionary";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    pub search: SearchSection,
    pub cache: CacheSection,
    pub query: QuerySection,
    pub paths: PathsSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SearchSection {
    pub regex: RegexSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RegexSection {
    /// search.regex.max-matches
    pub max_matches: u32,
    /// search.regex.max-time, in milliseconds
    pub max_time: u64,
}

impl Default for RegexSection {
    fn default() -> Self {
        RegexSection {
            max_matches: 100,
            max_time: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CacheSection {
    /// cache.capacity in entries; 0 disables the result cache
    pub capacity: usize,
}

impl Default for CacheSection {
    fn default() -> Self {
        CacheSection {
            capacity: 1_000_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct QuerySection {
    /// query.lower-case: lowercase the query before parsing
    pub lower_case: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PathsSection {
    pub phrase_corpus: PathBuf,
    pub phrase_dictionary: PathBuf,
    pub phrase_index: PathBuf,
    pub postlist_index: PathBuf,
    /// optional; without it regex tokens match nothing
    pub regex_vocabulary: Option<PathBuf>,
    /// optional; without it dict sets expand to the word alone
    pub hash_dictionary: Option<PathBuf>,
}

impl Config {
    /// A configuration for the conventional layout under one index root.
    pub fn for_index_root(root: &Path) -> Config {
        let regex_vocabulary = root.join(REGEX_VOCABULARY_DIR);
        let hash_dictionary = root.join(HASH_DICTIONARY_DIR);
        Config {
            paths: PathsSection {
                phrase_corpus: root.join(PHRASE_CORPUS_DIR),
                phrase_dictionary: root.join(PHRASE_DICTIONARY_DIR),
                phrase_index: root.join(PHRASE_INDEX_DIR),
                postlist_index: root.join(POSTLIST_INDEX_DIR),
                regex_vocabulary: regex_vocabulary.exists().then_some(regex_vocabulary),
                hash_dictionary: hash_dictionary.exists().then_some(hash_dictionary),
            },
            ..Default::default()
        }
    }

    pub fn regex_max_time(&self) -> Duration {
        Duration::from_millis(self.search.regex.max_time)
    }

    /// Load configuration from a TOML file.
    pub fn load_toml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save configuration to a TOML file.
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.search.regex.max_matches, 100);
        assert_eq!(config.regex_max_time(), Duration::from_millis(20));
        assert_eq!(config.cache.capacity, 1_000_000);
        assert!(!config.query.lower_case);
    }

    #[test]
    fn parses_kebab_case_keys() {
        let config = Config::from_toml_str(
            "[search.regex]\nmax-matches = 7\nmax-time = 5\n\n[query]\nlower-case = true\n\n[paths]\nphrase-corpus = \"/x/pc\"\n",
        )
        .unwrap();
        assert_eq!(config.search.regex.max_matches, 7);
        assert!(config.query.lower_case);
        assert_eq!(config.paths.phrase_corpus, PathBuf::from("/x/pc"));
        assert!(config.paths.hash_dictionary.is_none());
    }
}
