//! Phrase identity and materialized phrases.

/// Length class of a phrase (number of words, 1-based).
pub type PhraseLength = u32;

/// Identifies a phrase as `(length class, dense local id)`.
///
/// Local ids are assigned at build time in descending frequency order within
/// each length class, so id 0 of a class is its most frequent phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhraseId {
    pub length: PhraseLength,
    pub local: u32,
}

impl PhraseId {
    pub fn new(length: PhraseLength, local: u32) -> Self {
        PhraseId { length, local }
    }
}

/// A materialized phrase: identity, corpus frequency and its words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phrase {
    pub id: PhraseId,
    pub frequency: u64,
    pub words: Vec<String>,
}
