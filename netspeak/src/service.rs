//! Request and response types at the search boundary.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::norm::{NormKind, NormUnit, UnitSource};

/// Limits on the phrases a search may return. Zero means unbounded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PhraseConstraints {
    pub words_min: u32,
    pub words_max: u32,
    pub frequency_max: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SearchRequest {
    pub query: String,
    pub max_phrases: u32,
    pub phrase_constraints: PhraseConstraints,
}

impl Default for SearchRequest {
    fn default() -> Self {
        SearchRequest {
            query: String::new(),
            max_phrases: 100,
            phrase_constraints: PhraseConstraints::default(),
        }
    }
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> SearchRequest {
        SearchRequest {
            query: query.into(),
            ..Default::default()
        }
    }
}

/// How a response word relates to the query that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WordTag {
    Word,
    WordForQmark,
    WordForStar,
    WordForPlus,
    WordForRegex,
    WordInDictset,
    WordInOptionset,
    WordInOrderset,
}

/// Derives the response tag from the norm-query unit the word filled.
pub fn word_tag(unit: &NormUnit) -> WordTag {
    match (&unit.kind, unit.source) {
        (NormKind::QMark, UnitSource::Star) => WordTag::WordForStar,
        (NormKind::QMark, UnitSource::Plus) => WordTag::WordForPlus,
        (NormKind::QMark, _) => WordTag::WordForQmark,
        (NormKind::Word(_), UnitSource::Regex) => WordTag::WordForRegex,
        (NormKind::Word(_), UnitSource::DictSet) => WordTag::WordInDictset,
        (NormKind::Word(_), UnitSource::OptionSet) => WordTag::WordInOptionset,
        (NormKind::Word(_), UnitSource::OrderSet) => WordTag::WordInOrderset,
        (NormKind::Word(_), _) => WordTag::Word,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseWord {
    pub text: String,
    pub tag: WordTag,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsePhrase {
    /// Dense id within the phrase's length class.
    pub id: u32,
    pub frequency: u64,
    pub words: Vec<ResponseWord>,
}

impl ResponsePhrase {
    pub fn text(&self) -> String {
        let words: Vec<&str> = self.words.iter().map(|w| w.text.as_str()).collect();
        words.join(" ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub phrases: Vec<ResponsePhrase>,
    pub unknown_words: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidQuery,
    InternalError,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<Error> for ResponseError {
    fn from(e: Error) -> ResponseError {
        let kind = match &e {
            Error::InvalidQuery { .. } => ErrorKind::InvalidQuery,
            Error::Internal(_) => ErrorKind::InternalError,
            Error::Unknown(_) => ErrorKind::Unknown,
        };
        ResponseError {
            kind,
            message: e.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchResponse {
    Result(SearchResult),
    Error(ResponseError),
}

impl SearchResponse {
    pub fn result(&self) -> Option<&SearchResult> {
        match self {
            SearchResponse::Result(result) => Some(result),
            SearchResponse::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ResponseError> {
        match self {
            SearchResponse::Result(_) => None,
            SearchResponse::Error(error) => Some(error),
        }
    }
}
