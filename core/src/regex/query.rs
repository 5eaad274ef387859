//! Regex queries and their algebraic simplification.
//!
//! The builder applies these rewrites so that downstream matching cost is
//! predictable:
//!
//! 1.  `qE` == `Eq` == `q`          (E is the empty word)
//! 2.  `*` == `**`
//! 3.  `?*` == `*?`                 (normalized to qmark before star)
//! 4.  `[aa]` == `[a]` == `a`
//! 5.  `()` == E                    (`()` denotes an optional word)
//! 6.  `(w)*` == `*(w)` == `*`

/// One unit of a regex query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegexUnit {
    /// Exactly one code point.
    QMark,
    /// Any number of code points.
    Star,
    /// A literal run of code points.
    Word(String),
    /// Exactly one code point out of the set.
    CharSet(Vec<char>),
    /// The word or nothing.
    OptionalWord(String),
}

/// An immutable query for the regex index. Create through a parser or
/// [`RegexQueryBuilder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexQuery {
    units: Vec<RegexUnit>,
}

impl RegexQuery {
    pub fn new(units: Vec<RegexUnit>) -> Self {
        RegexQuery { units }
    }

    /// A query that cannot match any word.
    pub fn reject_all_query() -> Self {
        RegexQuery {
            units: vec![RegexUnit::CharSet(Vec::new())],
        }
    }

    pub fn units(&self) -> &[RegexUnit] {
        &self.units
    }

    /// True if no word can match.
    pub fn reject_all(&self) -> bool {
        self.combinations_upper_bound() == 0
    }

    /// True if every word matches.
    pub fn accept_all(&self) -> bool {
        self.units.len() == 1 && self.units[0] == RegexUnit::Star
    }

    /// True if every non-empty word matches.
    pub fn accept_all_non_empty(&self) -> bool {
        if self.accept_all() {
            return true;
        }
        if self.units.len() == 2 {
            return matches!(
                (&self.units[0], &self.units[1]),
                (RegexUnit::QMark, RegexUnit::Star) | (RegexUnit::Star, RegexUnit::QMark)
            );
        }
        false
    }

    /// Upper bound on the number of distinct words the query can match.
    /// `u32::MAX` means essentially infinite (any qmark or star); 0 means
    /// the query matches nothing.
    pub fn combinations_upper_bound(&self) -> u32 {
        let mut count: u64 = 1;
        for unit in &self.units {
            match unit {
                RegexUnit::QMark | RegexUnit::Star => return u32::MAX,
                RegexUnit::OptionalWord(_) => count *= 2,
                RegexUnit::CharSet(set) => count *= set.len() as u64,
                RegexUnit::Word(_) => {}
            }
            if count == 0 {
                return 0;
            }
            if count >= u32::MAX as u64 {
                return u32::MAX;
            }
        }
        count as u32
    }

    /// Minimum number of UTF-8 bytes a matching word must have.
    /// `usize::MAX` if the query cannot match anything.
    pub fn min_utf8_input_length(&self) -> usize {
        let mut min = 0usize;
        for unit in &self.units {
            match unit {
                RegexUnit::Word(word) => min += word.len(),
                RegexUnit::QMark => min += 1,
                RegexUnit::CharSet(set) => match set.iter().map(|c| c.len_utf8()).min() {
                    Some(smallest) => min += smallest,
                    None => return usize::MAX,
                },
                RegexUnit::Star | RegexUnit::OptionalWord(_) => {}
            }
        }
        min
    }

    /// Maximum number of UTF-8 bytes a matching word can have.
    /// `usize::MAX` if a star makes the language infinite.
    pub fn max_utf8_input_length(&self) -> usize {
        let mut max = 0usize;
        for unit in &self.units {
            match unit {
                RegexUnit::Word(word) | RegexUnit::OptionalWord(word) => max += word.len(),
                RegexUnit::QMark => max += 4,
                RegexUnit::CharSet(set) => {
                    max += set.iter().map(|c| c.len_utf8()).max().unwrap_or(0)
                }
                RegexUnit::Star => return usize::MAX,
            }
        }
        max
    }
}

impl std::fmt::Display for RegexQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.reject_all() {
            return write!(f, "[]REJECT_ALL[]");
        }
        for unit in &self.units {
            match unit {
                RegexUnit::QMark => write!(f, "?")?,
                RegexUnit::Star => write!(f, "*")?,
                RegexUnit::Word(word) => write!(f, "{}", word)?,
                RegexUnit::CharSet(set) => {
                    write!(f, "[")?;
                    for c in set {
                        write!(f, "{}", c)?;
                    }
                    write!(f, "]")?;
                }
                RegexUnit::OptionalWord(word) => write!(f, "({})", word)?,
            }
        }
        Ok(())
    }
}

/// Builds a simplified [`RegexQuery`] unit by unit.
///
/// The builder may add, change or remove units as a result of each `add`; it
/// only guarantees that the resulting query behaves as if the unit had been
/// appended verbatim.
#[derive(Debug, Default)]
pub struct RegexQueryBuilder {
    units: Vec<RegexUnit>,
    reject_all: bool,
}

impl RegexQueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, unit: RegexUnit) {
        if self.reject_all {
            // nothing can recover from the reject-all state
            return;
        }

        let unit = normalize_unit(unit);

        match &unit {
            RegexUnit::Word(w) | RegexUnit::OptionalWord(w) if w.is_empty() => {
                return; // rules 1, 5
            }
            RegexUnit::CharSet(set) if set.is_empty() => {
                self.reject_all = true;
                return;
            }
            _ => {}
        }

        #[derive(Clone, Copy, PartialEq)]
        enum Kind {
            QMark,
            Star,
            Word,
            CharSet,
            OptionalWord,
        }
        fn kind(unit: &RegexUnit) -> Kind {
            match unit {
                RegexUnit::QMark => Kind::QMark,
                RegexUnit::Star => Kind::Star,
                RegexUnit::Word(_) => Kind::Word,
                RegexUnit::CharSet(_) => Kind::CharSet,
                RegexUnit::OptionalWord(_) => Kind::OptionalWord,
            }
        }

        let prev = match self.units.last() {
            Some(prev) => kind(prev),
            None => {
                self.units.push(unit);
                return;
            }
        };

        // The order of `?` and `*` does not matter, but enforcing `?` before
        // `*` keeps the remaining rules local to the last unit.
        match (kind(&unit), prev) {
            (Kind::Word, Kind::Word) => {
                if let (RegexUnit::Word(next), Some(RegexUnit::Word(last))) =
                    (unit, self.units.last_mut())
                {
                    last.push_str(&next);
                }
            }
            (Kind::QMark, Kind::Star) => {
                // rule 3: swap so the qmark comes first
                if let Some(star) = self.units.pop() {
                    self.units.push(RegexUnit::QMark);
                    self.units.push(star);
                }
            }
            (Kind::Star, Kind::Star) => {} // rule 2
            (Kind::Star, Kind::OptionalWord | Kind::QMark) => {
                // rules 6 and 3: the star absorbs trailing optional words;
                // qmarks between them stay equivalent, so re-add them after
                self.strip_trailing_optionals();
                self.units.push(RegexUnit::Star);
            }
            (Kind::OptionalWord, Kind::Star) => {} // rule 6
            _ => self.units.push(unit),
        }
    }

    /// Removes trailing optional words, keeping the count of interleaved
    /// qmarks (all qmarks are equivalent, so new ones are pushed back).
    fn strip_trailing_optionals(&mut self) {
        let mut qmarks = 0usize;
        while let Some(last) = self.units.last() {
            match last {
                RegexUnit::QMark => {
                    qmarks += 1;
                    self.units.pop();
                }
                RegexUnit::OptionalWord(_) => {
                    self.units.pop();
                }
                _ => break,
            }
        }
        for _ in 0..qmarks {
            self.units.push(RegexUnit::QMark);
        }
    }

    pub fn to_query(&self) -> RegexQuery {
        if self.reject_all {
            RegexQuery::reject_all_query()
        } else {
            RegexQuery::new(self.units.clone())
        }
    }
}

/// Rule 4: deduplicate char sets; a singleton set is a plain word.
fn normalize_unit(unit: RegexUnit) -> RegexUnit {
    match unit {
        RegexUnit::CharSet(mut set) => {
            set.sort_unstable();
            set.dedup();
            if set.len() == 1 {
                RegexUnit::Word(set[0].to_string())
            } else {
                RegexUnit::CharSet(set)
            }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(units: impl IntoIterator<Item = RegexUnit>) -> RegexQuery {
        let mut builder = RegexQueryBuilder::new();
        for unit in units {
            builder.add(unit);
        }
        builder.to_query()
    }

    #[test]
    fn words_concatenate() {
        let q = build([
            RegexUnit::Word("foo".into()),
            RegexUnit::Word("bar".into()),
        ]);
        assert_eq!(q.units(), &[RegexUnit::Word("foobar".into())]);
    }

    #[test]
    fn stars_collapse_and_absorb() {
        let q = build([RegexUnit::Star, RegexUnit::Star]);
        assert_eq!(q.units(), &[RegexUnit::Star]);

        let q = build([RegexUnit::OptionalWord("ab".into()), RegexUnit::Star]);
        assert_eq!(q.units(), &[RegexUnit::Star]);

        let q = build([RegexUnit::Star, RegexUnit::OptionalWord("ab".into())]);
        assert_eq!(q.units(), &[RegexUnit::Star]);
    }

    #[test]
    fn qmark_is_ordered_before_star() {
        let q = build([RegexUnit::Star, RegexUnit::QMark]);
        assert_eq!(q.units(), &[RegexUnit::QMark, RegexUnit::Star]);
        assert!(q.accept_all_non_empty());
        assert!(!q.accept_all());
    }

    #[test]
    fn singleton_char_set_becomes_word() {
        let q = build([RegexUnit::CharSet(vec!['a', 'a'])]);
        assert_eq!(q.units(), &[RegexUnit::Word("a".into())]);
    }

    #[test]
    fn empty_char_set_rejects_all() {
        let q = build([
            RegexUnit::Word("x".into()),
            RegexUnit::CharSet(vec![]),
            RegexUnit::Word("y".into()),
        ]);
        assert!(q.reject_all());
        assert_eq!(q.combinations_upper_bound(), 0);
        assert_eq!(q.min_utf8_input_length(), usize::MAX);
    }

    #[test]
    fn combinations() {
        let q = build([
            RegexUnit::CharSet(vec!['a', 'b', 'c']),
            RegexUnit::OptionalWord("x".into()),
        ]);
        assert_eq!(q.combinations_upper_bound(), 6);

        let q = build([RegexUnit::QMark]);
        assert_eq!(q.combinations_upper_bound(), u32::MAX);
    }

    #[test]
    fn utf8_length_window() {
        let q = build([
            RegexUnit::Word("ab".into()),
            RegexUnit::QMark,
            RegexUnit::OptionalWord("c".into()),
        ]);
        assert_eq!(q.min_utf8_input_length(), 3);
        assert_eq!(q.max_utf8_input_length(), 7);

        let q = build([RegexUnit::Word("a".into()), RegexUnit::Star]);
        assert_eq!(q.max_utf8_input_length(), usize::MAX);
    }
}
