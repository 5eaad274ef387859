//! The parsed query tree.
//!
//! The root is always an [`Tag::Alternation`] whose children are
//! [`Tag::Concat`] nodes, one per top-level `|` clause. Terminals carry their
//! (already unescaped) text; a [`Tag::DictSet`] wraps exactly one WORD child.

use std::fmt;

use crate::error::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Word,
    QMark,
    Star,
    Plus,
    Regex,
    DictSet,
    OptionSet,
    OrderSet,
    Alternation,
    Concat,
}

impl Tag {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Tag::Word | Tag::QMark | Tag::Star | Tag::Plus | Tag::Regex
        )
    }
}

#[derive(Debug, Clone)]
pub struct Unit {
    tag: Tag,
    text: String,
    children: Vec<Unit>,
    span: Option<Span>,
}

/// Structural equality; source spans are ignored.
impl PartialEq for Unit {
    fn eq(&self, other: &Unit) -> bool {
        self.tag == other.tag && self.text == other.text && self.children == other.children
    }
}

impl Eq for Unit {}

impl Unit {
    pub fn terminal(tag: Tag, text: impl Into<String>) -> Unit {
        debug_assert!(tag.is_terminal());
        Unit {
            tag,
            text: text.into(),
            children: Vec::new(),
            span: None,
        }
    }

    pub fn non_terminal(tag: Tag) -> Unit {
        debug_assert!(!tag.is_terminal());
        Unit {
            tag,
            text: String::new(),
            children: Vec::new(),
            span: None,
        }
    }

    pub fn with_span(mut self, span: Span) -> Unit {
        self.span = Some(span);
        self
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn span(&self) -> Option<Span> {
        self.span
    }

    pub fn children(&self) -> &[Unit] {
        &self.children
    }

    pub fn add_child(&mut self, child: Unit) {
        debug_assert!(!self.tag.is_terminal());
        self.children.push(child);
    }

    /// Maximum nesting depth of the tree rooted here.
    pub fn depth(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(Unit::depth)
            .max()
            .unwrap_or(0)
    }

    /// Number of units with the given tag in this subtree (self included).
    pub fn count_units(&self, tag: Tag) -> usize {
        let own = usize::from(self.tag == tag);
        own + self
            .children
            .iter()
            .map(|c| c.count_units(tag))
            .sum::<usize>()
    }

    /// True if any unit of the subtree needs expansion beyond plain words.
    pub fn has_wildcards(&self) -> bool {
        !matches!(self.tag, Tag::Word | Tag::Concat | Tag::Alternation)
            || self.children.iter().any(Unit::has_wildcards)
    }
}

/// A parsed query: an alternation of concatenations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    root: Unit,
}

impl Query {
    pub fn empty() -> Query {
        Query {
            root: Unit::non_terminal(Tag::Alternation),
        }
    }

    pub fn new(root: Unit) -> Query {
        debug_assert_eq!(root.tag(), Tag::Alternation);
        Query { root }
    }

    pub fn root(&self) -> &Unit {
        &self.root
    }

    /// The top-level `|` clauses.
    pub fn alternatives(&self) -> &[Unit] {
        self.root.children()
    }

    pub fn is_empty(&self) -> bool {
        self.root.children().is_empty()
    }

    pub fn count_units(&self, tag: Tag) -> usize {
        self.root.count_units(tag)
    }

    pub fn has_unit(&self, tag: Tag) -> bool {
        self.count_units(tag) != 0
    }

    /// True if the query needs more than a single dictionary lookup.
    pub fn has_wildcards(&self) -> bool {
        self.root.children().iter().any(Unit::has_wildcards)
    }
}

/// Escapes a word so that it lexes back into the same word.
pub fn escape_word(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    for c in word.chars() {
        if matches!(
            c,
            '?' | '*' | '+' | '.' | '[' | ']' | '{' | '}' | '"' | '#' | '|' | '\\'
        ) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tag {
            Tag::Word => write!(f, "{}", escape_word(&self.text)),
            Tag::QMark => write!(f, "?"),
            Tag::Star => write!(f, "*"),
            Tag::Plus => write!(f, "+"),
            Tag::Regex => write!(f, "{}", self.text),
            Tag::DictSet => match self.children.first() {
                Some(word) => write!(f, "# {}", word),
                None => Ok(()),
            },
            Tag::OptionSet => {
                write!(f, "[")?;
                for child in &self.children {
                    write!(f, " {}", child)?;
                }
                write!(f, " ]")
            }
            Tag::OrderSet => {
                write!(f, "{{")?;
                for child in &self.children {
                    write!(f, " {}", child)?;
                }
                write!(f, " }}")
            }
            Tag::Concat => {
                // quoted when nested inside a set, plain otherwise; callers
                // format top-level concats through `Query`
                write!(f, "\"")?;
                for child in &self.children {
                    write!(f, " {}", child)?;
                }
                write!(f, " \"")
            }
            Tag::Alternation => {
                for (i, child) in self.children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}", child)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, alternative) in self.alternatives().iter().enumerate() {
            if i > 0 {
                write!(f, " | ")?;
            }
            for (j, unit) in alternative.children().iter().enumerate() {
                if j > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{}", unit)?;
            }
        }
        Ok(())
    }
}
