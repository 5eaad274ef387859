//! Fully expanded queries: every unit is a concrete word or a `?`.

use std::fmt;

/// What a norm-query unit expands to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NormKind {
    Word(String),
    QMark,
}

/// Where a norm-query unit came from, resolved innermost-first: a word
/// produced by a regex inside an option set is `Regex`, a literal word
/// inside an option set is `OptionSet`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitSource {
    /// A word written literally in the query.
    Literal,
    QMark,
    Star,
    Plus,
    Regex,
    DictSet,
    OptionSet,
    OrderSet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormUnit {
    pub kind: NormKind,
    pub source: UnitSource,
}

impl NormUnit {
    pub fn word(text: impl Into<String>, source: UnitSource) -> NormUnit {
        NormUnit {
            kind: NormKind::Word(text.into()),
            source,
        }
    }

    pub fn qmark(source: UnitSource) -> NormUnit {
        NormUnit {
            kind: NormKind::QMark,
            source,
        }
    }

    pub fn is_qmark(&self) -> bool {
        self.kind == NormKind::QMark
    }

    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            NormKind::Word(text) => Some(text),
            NormKind::QMark => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NormQuery {
    pub units: Vec<NormUnit>,
}

impl NormQuery {
    pub fn new(units: Vec<NormUnit>) -> NormQuery {
        NormQuery { units }
    }

    /// The phrase length this query matches.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn has_qmarks(&self) -> bool {
        self.units.iter().any(NormUnit::is_qmark)
    }

    /// The longest runs of concrete words, space-joined.
    ///
    /// A substring is a maximal sequence of adjacent non-qmark units. Only
    /// the longest ones are returned (all of them on a tie), e.g.
    /// `to be ? not to` yields `["to be", "not to"]`.
    pub fn longest_known_substrings(&self) -> Vec<String> {
        let mut longest = 1usize;
        let mut substrings: Vec<String> = Vec::new();
        let mut run: Vec<&str> = Vec::new();
        let mut flush = |run: &mut Vec<&str>, longest: &mut usize, out: &mut Vec<String>| {
            if run.len() >= *longest {
                if run.len() > *longest {
                    *longest = run.len();
                    out.clear();
                }
                out.push(run.join(" "));
            }
            run.clear();
        };
        for unit in &self.units {
            match unit.text() {
                Some(text) if !text.is_empty() => run.push(text),
                _ => flush(&mut run, &mut longest, &mut substrings),
            }
        }
        flush(&mut run, &mut longest, &mut substrings);
        substrings
    }

    /// Canonical string form: words verbatim, `?` for qmarks, space-joined.
    /// Used both as the phrase dictionary key and as the result cache key;
    /// words cannot contain spaces, so the form is unique.
    pub fn key(&self) -> String {
        let mut out = String::new();
        for (i, unit) in self.units.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            match unit.text() {
                Some(text) => out.push_str(text),
                None => out.push('?'),
            }
        }
        out
    }
}

impl fmt::Display for NormQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}
