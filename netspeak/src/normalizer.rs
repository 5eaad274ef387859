//! Turns a query tree into the set of norm queries it covers.
//!
//! Normalization runs in two passes. The first pass measures worst-case
//! complexity and rejects queries over budget before anything is allocated
//! for them; it also drops alternatives that cannot fit the length window.
//! The second pass expands the survivors left to right, building norm
//! queries as concatenations of terminals. Expansion is soft-capped by
//! `max_norm_queries`: hitting the cap truncates the result, it never fails.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use ahash::AHashMap;

use netspeak_core::{parse_regex_query, DefaultRegexIndex};

use crate::dictionaries::SynonymDictionary;
use crate::error::{query_error_message, Error, Result};
use crate::norm::{NormQuery, NormUnit, UnitSource};
use crate::query::{Query, Tag, Unit};

/// Upper bound for the worst-case number of norm queries a query may expand
/// into. Anything above is rejected as too complex.
pub const MAX_WORST_CASE_COMPLEXITY: u32 = 10_000;

const WORD_FACTOR: u32 = 1;
const QMARK_FACTOR: u32 = 1;
const DICTSET_FACTOR: u32 = 5;
const PLUS_FACTOR: u32 = 4;
const STAR_FACTOR: u32 = 5;

#[derive(Debug, Clone)]
pub struct NormalizerOptions {
    pub max_norm_queries: usize,
    pub min_length: u32,
    pub max_length: u32,
    pub max_regex_matches: u32,
    pub max_regex_time: Duration,
}

impl Default for NormalizerOptions {
    fn default() -> Self {
        NormalizerOptions {
            max_norm_queries: 10_000,
            min_length: 1,
            max_length: 5,
            max_regex_matches: 100,
            max_regex_time: Duration::from_millis(20),
        }
    }
}

pub struct QueryNormalizer {
    regex_index: Option<Arc<DefaultRegexIndex>>,
    dictionary: Arc<SynonymDictionary>,
}

impl QueryNormalizer {
    pub fn new(
        regex_index: Option<Arc<DefaultRegexIndex>>,
        dictionary: Arc<SynonymDictionary>,
    ) -> QueryNormalizer {
        QueryNormalizer {
            regex_index,
            dictionary,
        }
    }

    /// Expands `query` into norm queries whose length lies in
    /// `[min_length, max_length]`. An empty result is a valid outcome.
    pub fn normalize(
        &self,
        query: &Query,
        options: &NormalizerOptions,
    ) -> Result<Vec<NormQuery>> {
        if query.is_empty() {
            return Ok(Vec::new());
        }

        // pass 1: admission control, no expansion yet
        let complexity = query
            .alternatives()
            .iter()
            .fold(0u32, |acc, alt| {
                acc.saturating_add(worst_case_complexity(alt, options.max_regex_matches))
            });
        if complexity > MAX_WORST_CASE_COMPLEXITY {
            return Err(Error::invalid_query(query_error_message::too_complex(
                complexity,
                MAX_WORST_CASE_COMPLEXITY,
            )));
        }

        // pass 2: expansion
        let mut expander = Expander {
            regex_index: self.regex_index.as_deref(),
            dictionary: &self.dictionary,
            options,
            regex_cache: AHashMap::new(),
            finished: 0,
            exhausted: false,
        };
        let mut norm_queries = Vec::new();
        for alternative in query.alternatives() {
            // alternatives that cannot fit the window are silently dropped
            if min_expanded_length(alternative) > options.max_length {
                continue;
            }
            let partials = expander.expand_alternative(alternative)?;
            for units in partials {
                let len = units.len() as u32;
                if len >= options.min_length && len <= options.max_length {
                    norm_queries.push(NormQuery::new(units));
                }
            }
            expander.finished = norm_queries.len();
            if expander.exhausted {
                tracing::debug!(
                    produced = norm_queries.len(),
                    "norm query budget exhausted, returning partial expansion"
                );
                break;
            }
        }
        Ok(norm_queries)
    }
}

/// Worst-case multiplicative expansion factor of one unit.
fn worst_case_complexity(unit: &Unit, max_regex_matches: u32) -> u32 {
    match unit.tag() {
        Tag::Word => WORD_FACTOR,
        Tag::QMark => QMARK_FACTOR,
        Tag::Star => STAR_FACTOR,
        Tag::Plus => PLUS_FACTOR,
        Tag::Regex => max_regex_matches.max(1),
        Tag::DictSet => DICTSET_FACTOR,
        Tag::OptionSet => {
            let inner = product_complexity(unit.children(), max_regex_matches);
            inner.saturating_mul(unit.children().len().max(1) as u32)
        }
        Tag::OrderSet => {
            let inner = product_complexity(unit.children(), max_regex_matches);
            inner.saturating_mul(saturating_factorial(unit.children().len() as u32))
        }
        Tag::Concat => product_complexity(unit.children(), max_regex_matches),
        Tag::Alternation => unit
            .children()
            .iter()
            .fold(0u32, |acc, c| {
                acc.saturating_add(worst_case_complexity(c, max_regex_matches))
            }),
    }
}

fn product_complexity(units: &[Unit], max_regex_matches: u32) -> u32 {
    units.iter().fold(1u32, |acc, u| {
        acc.saturating_mul(worst_case_complexity(u, max_regex_matches))
    })
}

fn saturating_factorial(n: u32) -> u32 {
    let mut result = 1u32;
    for i in 2..=n {
        result = result.saturating_mul(i);
    }
    result
}

/// Minimum phrase length an expansion of this unit can have.
fn min_expanded_length(unit: &Unit) -> u32 {
    match unit.tag() {
        Tag::Word | Tag::QMark | Tag::Regex | Tag::DictSet | Tag::Plus => 1,
        Tag::Star => 0,
        Tag::OptionSet => unit
            .children()
            .iter()
            .map(min_expanded_length)
            .min()
            .unwrap_or(0),
        Tag::OrderSet | Tag::Concat => {
            unit.children().iter().map(min_expanded_length).sum()
        }
        Tag::Alternation => unit
            .children()
            .iter()
            .map(min_expanded_length)
            .min()
            .unwrap_or(0),
    }
}

type Fragment = Vec<NormUnit>;

struct Expander<'a> {
    regex_index: Option<&'a DefaultRegexIndex>,
    dictionary: &'a SynonymDictionary,
    options: &'a NormalizerOptions,
    /// at most one regex index lookup per distinct pattern per query
    regex_cache: AHashMap<String, Arc<Vec<String>>>,
    finished: usize,
    exhausted: bool,
}

impl<'a> Expander<'a> {
    fn expand_alternative(&mut self, concat: &Unit) -> Result<Vec<Fragment>> {
        let mut partials: Vec<Fragment> = vec![Vec::new()];
        for child in concat.children() {
            partials = self.apply_unit(partials, child)?;
            let max_length = self.options.max_length as usize;
            partials.retain(|p| p.len() <= max_length);
            self.enforce_budget(&mut partials);
            if partials.is_empty() || self.exhausted {
                break;
            }
        }
        Ok(partials)
    }

    /// Truncates the working set once the total candidate count would pass
    /// `max_norm_queries`. The result is a best-effort approximation.
    fn enforce_budget(&mut self, partials: &mut Vec<Fragment>) {
        let budget = self.options.max_norm_queries.saturating_sub(self.finished);
        if partials.len() > budget {
            partials.truncate(budget);
            self.exhausted = true;
        }
    }

    fn apply_unit(&mut self, partials: Vec<Fragment>, unit: &Unit) -> Result<Vec<Fragment>> {
        let max_length = self.options.max_length as usize;
        match unit.tag() {
            Tag::Word => Ok(append_to_all(
                partials,
                &[NormUnit::word(unit.text(), UnitSource::Literal)],
            )),
            Tag::QMark => Ok(append_to_all(partials, &[NormUnit::qmark(UnitSource::QMark)])),
            Tag::Star => Ok(pad_with_qmarks(partials, 0, max_length, UnitSource::Star)),
            Tag::Plus => Ok(pad_with_qmarks(partials, 1, max_length, UnitSource::Plus)),
            Tag::Regex => {
                let matches = self.regex_matches(unit.text())?;
                let mut out = Vec::new();
                for word in matches.iter() {
                    for partial in &partials {
                        let mut next = partial.clone();
                        next.push(NormUnit::word(word, UnitSource::Regex));
                        out.push(next);
                    }
                }
                Ok(out)
            }
            Tag::DictSet => {
                let word = unit
                    .children()
                    .first()
                    .ok_or_else(|| Error::Internal("dict set without a word".to_string()))?;
                let mut out = Vec::new();
                for variant in self.dictionary.lookup(word.text()) {
                    // a multi-word synonym contributes a word sequence
                    let fragment: Fragment = variant
                        .split(' ')
                        .filter(|t| !t.is_empty())
                        .map(|t| NormUnit::word(t, UnitSource::DictSet))
                        .collect();
                    for partial in &partials {
                        let mut next = partial.clone();
                        next.extend(fragment.iter().cloned());
                        out.push(next);
                    }
                }
                Ok(out)
            }
            Tag::OptionSet => {
                let mut fragments: Vec<Fragment> = Vec::new();
                if unit.children().is_empty() {
                    // the empty option set collapses to the empty choice
                    fragments.push(Vec::new());
                }
                for member in unit.children() {
                    fragments.extend(self.member_fragments(member, UnitSource::OptionSet)?);
                }
                Ok(cross(partials, &fragments))
            }
            Tag::OrderSet => self.apply_orderset(partials, unit),
            Tag::Concat => {
                // a quoted phrase behaves like an inline concatenation
                let mut current = partials;
                for child in unit.children() {
                    current = self.apply_unit(current, child)?;
                }
                Ok(current)
            }
            Tag::Alternation => {
                Err(Error::Internal("unexpected nested alternation".to_string()))
            }
        }
    }

    fn apply_orderset(&mut self, partials: Vec<Fragment>, unit: &Unit) -> Result<Vec<Fragment>> {
        // members ordered by their canonical text; permutations are then
        // emitted in next_permutation order, each distinct ordering once
        let mut members: Vec<(String, Vec<Fragment>)> = Vec::new();
        for member in unit.children() {
            members.push((
                member.to_string(),
                self.member_fragments(member, UnitSource::OrderSet)?,
            ));
        }
        members.sort_by(|a, b| a.0.cmp(&b.0));

        let mut out = Vec::new();
        loop {
            let mut combos: Vec<Fragment> = vec![Vec::new()];
            for (_, fragments) in &members {
                let mut next = Vec::with_capacity(combos.len() * fragments.len());
                for combo in &combos {
                    for fragment in fragments {
                        let mut joined = combo.clone();
                        joined.extend(fragment.iter().cloned());
                        next.push(joined);
                    }
                }
                combos = next;
            }
            for partial in &partials {
                for combo in &combos {
                    let mut joined = partial.clone();
                    joined.extend(combo.iter().cloned());
                    out.push(joined);
                }
            }
            if !next_permutation(&mut members, |a, b| a.0.cmp(&b.0)) {
                break;
            }
        }
        Ok(out)
    }

    /// Expansions of a single set member: a word, a regex, or a phrase.
    fn member_fragments(&mut self, member: &Unit, source: UnitSource) -> Result<Vec<Fragment>> {
        match member.tag() {
            Tag::Word => Ok(vec![vec![NormUnit::word(member.text(), source)]]),
            Tag::Regex => {
                let matches = self.regex_matches(member.text())?;
                Ok(matches
                    .iter()
                    .map(|word| vec![NormUnit::word(word, UnitSource::Regex)])
                    .collect())
            }
            Tag::Concat => {
                let mut fragments: Vec<Fragment> = vec![Vec::new()];
                for child in member.children() {
                    let child_fragments = self.member_fragments(child, source)?;
                    let mut next = Vec::with_capacity(fragments.len() * child_fragments.len());
                    for fragment in &fragments {
                        for child_fragment in &child_fragments {
                            let mut joined = fragment.clone();
                            joined.extend(child_fragment.iter().cloned());
                            next.push(joined);
                        }
                    }
                    fragments = next;
                }
                Ok(fragments)
            }
            other => Err(Error::Internal(format!(
                "unexpected {:?} inside a set",
                other
            ))),
        }
    }

    fn regex_matches(&mut self, pattern: &str) -> Result<Arc<Vec<String>>> {
        if let Some(hit) = self.regex_cache.get(pattern) {
            return Ok(hit.clone());
        }
        let matches = match self.regex_index {
            Some(index) => {
                let query = parse_regex_query(pattern);
                index.match_query(
                    &query,
                    self.options.max_regex_matches,
                    self.options.max_regex_time,
                )?
            }
            // no regex index, no matches
            None => Vec::new(),
        };
        let matches = Arc::new(matches);
        self.regex_cache
            .insert(pattern.to_string(), matches.clone());
        Ok(matches)
    }
}

fn append_to_all(mut partials: Vec<Fragment>, suffix: &[NormUnit]) -> Vec<Fragment> {
    for partial in &mut partials {
        partial.extend(suffix.iter().cloned());
    }
    partials
}

fn cross(partials: Vec<Fragment>, fragments: &[Fragment]) -> Vec<Fragment> {
    let mut out = Vec::with_capacity(partials.len() * fragments.len());
    for partial in &partials {
        for fragment in fragments {
            let mut joined = partial.clone();
            joined.extend(fragment.iter().cloned());
            out.push(joined);
        }
    }
    out
}

/// Pads every partial with `min_k..=room` qmarks tagged with `source`.
fn pad_with_qmarks(
    partials: Vec<Fragment>,
    min_k: usize,
    max_length: usize,
    source: UnitSource,
) -> Vec<Fragment> {
    let mut out = Vec::new();
    for partial in partials {
        let room = max_length.saturating_sub(partial.len());
        for k in min_k..=room.max(min_k) {
            if k > room {
                break;
            }
            let mut next = partial.clone();
            for _ in 0..k {
                next.push(NormUnit::qmark(source));
            }
            out.push(next);
        }
    }
    out
}

/// Rearranges `seq` into its next lexicographic permutation; `false` once the
/// sequence is in descending order (the last permutation).
fn next_permutation<T>(seq: &mut [T], cmp: impl Fn(&T, &T) -> Ordering) -> bool {
    if seq.len() < 2 {
        return false;
    }
    let mut i = seq.len() - 1;
    while i > 0 && cmp(&seq[i - 1], &seq[i]) != Ordering::Less {
        i -= 1;
    }
    if i == 0 {
        return false;
    }
    let mut j = seq.len() - 1;
    while cmp(&seq[j], &seq[i - 1]) != Ordering::Greater {
        j -= 1;
    }
    seq.swap(i - 1, j);
    seq[i..].reverse();
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_query;

    fn normalizer() -> QueryNormalizer {
        QueryNormalizer::new(None, Arc::new(SynonymDictionary::new()))
    }

    fn keys(norm_queries: &[NormQuery]) -> Vec<String> {
        norm_queries.iter().map(|q| q.key()).collect()
    }

    fn expand(query: &str, options: &NormalizerOptions) -> Vec<NormQuery> {
        let parsed = parse_query(query).unwrap();
        normalizer().normalize(&parsed, options).unwrap()
    }

    #[test]
    fn plain_words() {
        let options = NormalizerOptions::default();
        assert_eq!(keys(&expand("the life of", &options)), vec!["the life of"]);
    }

    #[test]
    fn star_pads_up_to_max_length() {
        let options = NormalizerOptions {
            max_length: 3,
            ..Default::default()
        };
        assert_eq!(
            keys(&expand("the *", &options)),
            vec!["the", "the ?", "the ? ?"]
        );
    }

    #[test]
    fn plus_needs_at_least_one() {
        let options = NormalizerOptions {
            max_length: 3,
            ..Default::default()
        };
        assert_eq!(keys(&expand("the +", &options)), vec!["the ?", "the ? ?"]);
    }

    #[test]
    fn orderset_emits_all_permutations_sorted() {
        let options = NormalizerOptions::default();
        assert_eq!(
            keys(&expand("{ the of life }", &options)),
            vec![
                "life of the",
                "life the of",
                "of life the",
                "of the life",
                "the life of",
                "the of life",
            ]
        );
    }

    #[test]
    fn orderset_of_k_distinct_terminals_has_factorial_many() {
        let options = NormalizerOptions::default();
        let result = expand("{ a b c d }", &options);
        assert_eq!(result.len(), 24);
        let unique: std::collections::HashSet<String> =
            result.iter().map(|q| q.key()).collect();
        assert_eq!(unique.len(), 24);
    }

    #[test]
    fn optionset_is_a_union() {
        let options = NormalizerOptions::default();
        assert_eq!(
            keys(&expand("so [ good beautiful ]", &options)),
            vec!["so good", "so beautiful"]
        );
    }

    #[test]
    fn optionset_with_phrase() {
        let options = NormalizerOptions::default();
        assert_eq!(
            keys(&expand("[ \" very good \" bad ]", &options)),
            vec!["very good", "bad"]
        );
    }

    #[test]
    fn dictset_expands_synonyms() {
        let mut dict = SynonymDictionary::new();
        dict.insert("fast", "quick");
        dict.insert("fast", "in a hurry");
        let normalizer = QueryNormalizer::new(None, Arc::new(dict));
        let parsed = parse_query("is # fast").unwrap();
        let result = normalizer
            .normalize(&parsed, &NormalizerOptions::default())
            .unwrap();
        assert_eq!(
            keys(&result),
            vec!["is fast", "is in a hurry", "is quick"]
        );
    }

    #[test]
    fn length_window_is_enforced() {
        let options = NormalizerOptions {
            min_length: 2,
            max_length: 2,
            ..Default::default()
        };
        // "a b c" cannot fit, "a b" can
        let result = expand("a b c | a b", &options);
        assert_eq!(keys(&result), vec!["a b"]);
        // "a" is shorter than min_length and is filtered at finalization
        assert!(expand("a", &options).is_empty());
    }

    #[test]
    fn too_complex_queries_are_rejected() {
        // five nested star factors: 5 * 5 * 5 * 5 * 5 * 5 = 15625 > 10000
        let parsed = parse_query("* * * * * *").unwrap();
        let err = normalizer()
            .normalize(&parsed, &NormalizerOptions::default())
            .unwrap_err();
        match err {
            Error::InvalidQuery { message, .. } => {
                assert!(message.contains("too complex"), "{}", message)
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn budget_truncates_instead_of_failing() {
        let options = NormalizerOptions {
            max_norm_queries: 3,
            ..Default::default()
        };
        let result = expand("{ a b c } | x", &options);
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn empty_query_expands_to_nothing() {
        assert!(expand("", &NormalizerOptions::default()).is_empty());
    }

    #[test]
    fn qmark_provenance_is_kept() {
        let options = NormalizerOptions {
            max_length: 2,
            ..Default::default()
        };
        let result = expand("the *", &options);
        let padded = result.iter().find(|q| q.len() == 2).unwrap();
        assert_eq!(padded.units[1].source, UnitSource::Star);
    }

    #[test]
    fn next_permutation_covers_distinct_orderings() {
        let mut seq = vec![1, 2, 2];
        let mut seen = vec![seq.clone()];
        while next_permutation(&mut seq, |a, b| a.cmp(b)) {
            seen.push(seq.clone());
        }
        assert_eq!(seen, vec![vec![1, 2, 2], vec![2, 1, 2], vec![2, 2, 1]]);
    }
}
