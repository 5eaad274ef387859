//! Lexes and parses the surface query syntax into a [`Query`] tree.
//!
//! Tokens are whitespace separated. `|` splits tokens wherever it occurs and
//! `#` introduces a dict set at token start; brackets, braces and quotes are
//! structural only when they stand alone, so `colo[u]r` stays one token.
//! `\` escapes the next character. A token that still contains an unescaped
//! `?*+.[]{}` (and is not itself a wildcard) is a regex token; everything
//! else is a word. All unescaping happens here, downstream code never sees
//! backslashes.

use crate::error::{query_error_message, Error, Result, Span};
use crate::query::{Query, Tag, Unit};

/// Trees deeper than this are rejected; expansion is recursive and must not
/// be driven into unbounded stack growth by a hostile query.
const MAX_TREE_DEPTH: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    Word(String),
    Regex(String),
    QMark,
    Star,
    Plus,
    Hash,
    BracketLeft,
    BracketRight,
    BraceLeft,
    BraceRight,
    Quote,
    Bar,
}

impl TokenKind {
    fn describe(&self) -> String {
        match self {
            TokenKind::Word(w) => format!("word {:?}", w),
            TokenKind::Regex(r) => format!("regex {:?}", r),
            TokenKind::QMark => "'?'".to_string(),
            TokenKind::Star => "'*'".to_string(),
            TokenKind::Plus => "'+'".to_string(),
            TokenKind::Hash => "'#'".to_string(),
            TokenKind::BracketLeft => "'['".to_string(),
            TokenKind::BracketRight => "']'".to_string(),
            TokenKind::BraceLeft => "'{'".to_string(),
            TokenKind::BraceRight => "'}'".to_string(),
            TokenKind::Quote => "'\"'".to_string(),
            TokenKind::Bar => "'|'".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    span: Span,
}

fn is_regex_char(c: char) -> bool {
    matches!(c, '?' | '*' | '+' | '.' | '[' | ']' | '{' | '}')
}

struct Lexer {
    tokens: Vec<Token>,
    /// characters of the pending token with their escaped flag
    pending: Vec<(char, bool)>,
    start_line: u32,
    start_col: u32,
    line: u32,
    col: u32,
}

impl Lexer {
    fn new() -> Lexer {
        Lexer {
            tokens: Vec::new(),
            pending: Vec::new(),
            start_line: 1,
            start_col: 1,
            line: 1,
            col: 1,
        }
    }

    fn span_here(&self) -> Span {
        Span {
            start_line: self.line,
            start_col: self.col,
            end_line: self.line,
            end_col: self.col + 1,
        }
    }

    fn pending_span(&self) -> Span {
        Span {
            start_line: self.start_line,
            start_col: self.start_col,
            end_line: self.line,
            end_col: self.col,
        }
    }

    fn push(&mut self, kind: TokenKind, span: Span) {
        self.tokens.push(Token { kind, span });
    }

    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let span = self.pending_span();
        let text: String = self.pending.iter().map(|&(c, _)| c).collect();
        let kind = if self.pending.len() == 1 && !self.pending[0].1 {
            match self.pending[0].0 {
                '?' => TokenKind::QMark,
                '*' => TokenKind::Star,
                '+' => TokenKind::Plus,
                '[' => TokenKind::BracketLeft,
                ']' => TokenKind::BracketRight,
                '{' => TokenKind::BraceLeft,
                '}' => TokenKind::BraceRight,
                '"' => TokenKind::Quote,
                _ => TokenKind::Word(text),
            }
        } else if self.pending.iter().any(|&(c, esc)| !esc && is_regex_char(c)) {
            TokenKind::Regex(text)
        } else {
            TokenKind::Word(text)
        };
        self.pending.clear();
        self.push(kind, span);
    }

    fn lex(mut self, input: &str) -> Vec<Token> {
        let mut chars = input.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\n' => {
                    self.flush();
                    self.line += 1;
                    self.col = 1;
                    continue;
                }
                c if c.is_whitespace() => self.flush(),
                '|' => {
                    self.flush();
                    let span = self.span_here();
                    self.push(TokenKind::Bar, span);
                }
                '#' if self.pending.is_empty() => {
                    let span = self.span_here();
                    self.push(TokenKind::Hash, span);
                }
                '\\' => {
                    if self.pending.is_empty() {
                        self.start_line = self.line;
                        self.start_col = self.col;
                    }
                    self.col += 1;
                    // a trailing backslash escapes nothing and is dropped
                    if let Some(next) = chars.next() {
                        self.pending.push((next, true));
                    }
                }
                other => {
                    if self.pending.is_empty() {
                        self.start_line = self.line;
                        self.start_col = self.col;
                    }
                    self.pending.push((other, false));
                }
            }
            self.col += 1;
        }
        self.flush();
        self.tokens
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn end_span(&self) -> Span {
        self.tokens.last().map(|t| t.span).unwrap_or(Span {
            start_line: 1,
            start_col: 1,
            end_line: 1,
            end_col: 1,
        })
    }

    fn parse(&mut self) -> Result<Query> {
        let mut root = Unit::non_terminal(Tag::Alternation);
        let mut concat = Unit::non_terminal(Tag::Concat);

        while let Some(token) = self.next() {
            match token.kind {
                TokenKind::Bar => {
                    if !concat.children().is_empty() {
                        root.add_child(concat);
                    }
                    concat = Unit::non_terminal(Tag::Concat);
                }
                TokenKind::QMark => {
                    concat.add_child(Unit::terminal(Tag::QMark, "?").with_span(token.span))
                }
                TokenKind::Star => {
                    concat.add_child(Unit::terminal(Tag::Star, "*").with_span(token.span))
                }
                TokenKind::Plus => {
                    concat.add_child(Unit::terminal(Tag::Plus, "+").with_span(token.span))
                }
                TokenKind::Word(word) => {
                    concat.add_child(Unit::terminal(Tag::Word, word).with_span(token.span))
                }
                TokenKind::Regex(regex) => {
                    concat.add_child(Unit::terminal(Tag::Regex, regex).with_span(token.span))
                }
                TokenKind::Hash => {
                    let word = self.expect_word_for_dictset(token.span)?;
                    let mut dictset = Unit::non_terminal(Tag::DictSet).with_span(token.span);
                    dictset.add_child(word);
                    concat.add_child(dictset);
                }
                TokenKind::BracketLeft => {
                    concat.add_child(self.parse_set(Tag::OptionSet, token.span)?)
                }
                TokenKind::BraceLeft => {
                    concat.add_child(self.parse_set(Tag::OrderSet, token.span)?)
                }
                TokenKind::Quote => concat.add_child(self.parse_phrase(token.span)?),
                TokenKind::BracketRight | TokenKind::BraceRight => {
                    return Err(Error::invalid_query_at(
                        format!("unexpected {}", token.kind.describe()),
                        token.span,
                    ));
                }
            }
        }

        if !concat.children().is_empty() {
            root.add_child(concat);
        }

        if root.depth() > MAX_TREE_DEPTH {
            return Err(Error::invalid_query(query_error_message::TOO_DEEPLY_NESTED));
        }
        Ok(Query::new(root))
    }

    fn expect_word_for_dictset(&mut self, hash_span: Span) -> Result<Unit> {
        match self.next() {
            Some(Token {
                kind: TokenKind::Word(word),
                span,
            }) => Ok(Unit::terminal(Tag::Word, word).with_span(span)),
            Some(token) => Err(Error::invalid_query_at(
                format!("expected a word after '#', found {}", token.kind.describe()),
                token.span,
            )),
            None => Err(Error::invalid_query_at(
                "expected a word after '#'",
                hash_span,
            )),
        }
    }

    fn parse_set(&mut self, tag: Tag, open_span: Span) -> Result<Unit> {
        let closing = match tag {
            Tag::OptionSet => TokenKind::BracketRight,
            _ => TokenKind::BraceRight,
        };
        let mut set = Unit::non_terminal(tag).with_span(open_span);
        loop {
            match self.next() {
                Some(token) if token.kind == closing => return Ok(set),
                Some(Token {
                    kind: TokenKind::Word(word),
                    span,
                }) => set.add_child(Unit::terminal(Tag::Word, word).with_span(span)),
                Some(Token {
                    kind: TokenKind::Regex(regex),
                    span,
                }) => set.add_child(Unit::terminal(Tag::Regex, regex).with_span(span)),
                Some(Token {
                    kind: TokenKind::Quote,
                    span,
                }) => set.add_child(self.parse_phrase(span)?),
                Some(token) => {
                    return Err(Error::invalid_query_at(
                        format!("{} is not allowed inside a set", token.kind.describe()),
                        token.span,
                    ));
                }
                None => {
                    return Err(Error::invalid_query_at(
                        match tag {
                            Tag::OptionSet => "unclosed option set: missing ']'",
                            _ => "unclosed order set: missing '}'",
                        },
                        self.end_span(),
                    ));
                }
            }
        }
    }

    fn parse_phrase(&mut self, open_span: Span) -> Result<Unit> {
        let mut phrase = Unit::non_terminal(Tag::Concat).with_span(open_span);
        loop {
            match self.next() {
                Some(Token {
                    kind: TokenKind::Quote,
                    ..
                }) => return Ok(phrase),
                Some(Token {
                    kind: TokenKind::Word(word),
                    span,
                }) => phrase.add_child(Unit::terminal(Tag::Word, word).with_span(span)),
                Some(Token {
                    kind: TokenKind::Regex(regex),
                    span,
                }) => phrase.add_child(Unit::terminal(Tag::Regex, regex).with_span(span)),
                Some(token) => {
                    return Err(Error::invalid_query_at(
                        format!("{} is not allowed inside a phrase", token.kind.describe()),
                        token.span,
                    ));
                }
                None => {
                    return Err(Error::invalid_query_at(
                        "unclosed phrase: missing '\"'",
                        self.end_span(),
                    ));
                }
            }
        }
    }
}

/// Parses a raw query string. The empty (or all-whitespace) query parses to
/// an empty alternation, which is a valid query with no results.
pub fn parse_query(input: &str) -> Result<Query> {
    let tokens = Lexer::new().lex(input);
    if tokens.is_empty() {
        return Ok(Query::empty());
    }
    Parser { tokens, pos: 0 }.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags_of(query: &Query) -> Vec<Tag> {
        query.alternatives()[0]
            .children()
            .iter()
            .map(|u| u.tag())
            .collect()
    }

    #[test]
    fn words_and_wildcards() {
        let q = parse_query("to be ? not to *").unwrap();
        assert_eq!(
            tags_of(&q),
            vec![Tag::Word, Tag::Word, Tag::QMark, Tag::Word, Tag::Word, Tag::Word, Tag::Star]
        );
    }

    #[test]
    fn alternation_splits_clauses() {
        let q = parse_query("knows|time").unwrap();
        assert_eq!(q.alternatives().len(), 2);
        assert_eq!(q.alternatives()[0].children()[0].text(), "knows");
        assert_eq!(q.alternatives()[1].children()[0].text(), "time");
    }

    #[test]
    fn sets_and_dictset() {
        let q = parse_query("so [ good beautiful ] # fast { a b }").unwrap();
        assert_eq!(
            tags_of(&q),
            vec![Tag::Word, Tag::OptionSet, Tag::DictSet, Tag::OrderSet]
        );
        let optionset = &q.alternatives()[0].children()[1];
        assert_eq!(optionset.children().len(), 2);
        let dictset = &q.alternatives()[0].children()[2];
        assert_eq!(dictset.children()[0].text(), "fast");
    }

    #[test]
    fn hash_prefix_binds_to_its_token() {
        let q = parse_query("#fast").unwrap();
        assert_eq!(tags_of(&q), vec![Tag::DictSet]);
    }

    #[test]
    fn embedded_specials_are_regex_tokens() {
        let q = parse_query("colo[u]r").unwrap();
        let unit = &q.alternatives()[0].children()[0];
        assert_eq!(unit.tag(), Tag::Regex);
        assert_eq!(unit.text(), "colo[u]r");
    }

    #[test]
    fn escapes_make_words() {
        let q = parse_query(r"a\?b").unwrap();
        let unit = &q.alternatives()[0].children()[0];
        assert_eq!(unit.tag(), Tag::Word);
        assert_eq!(unit.text(), "a?b");
    }

    #[test]
    fn phrases_group_words() {
        let q = parse_query("[ \" very good \" bad ]").unwrap();
        let set = &q.alternatives()[0].children()[0];
        assert_eq!(set.tag(), Tag::OptionSet);
        assert_eq!(set.children()[0].tag(), Tag::Concat);
        assert_eq!(set.children()[0].children().len(), 2);
        assert_eq!(set.children()[1].text(), "bad");
    }

    #[test]
    fn unclosed_bracket_is_invalid() {
        let err = parse_query("this is invalid [").unwrap_err();
        match err {
            Error::InvalidQuery { message, span } => {
                assert!(!message.is_empty());
                assert!(span.is_some());
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn wildcard_inside_set_is_invalid() {
        assert!(parse_query("[ ? ]").is_err());
        assert!(parse_query("{ a * }").is_err());
    }

    #[test]
    fn empty_query_is_valid() {
        assert!(parse_query("").unwrap().is_empty());
        assert!(parse_query("   ").unwrap().is_empty());
    }

    #[test]
    fn display_round_trip() {
        for input in [
            "to be ? not to *",
            "so [ good beautiful ]",
            "{ the of life }",
            "# fast car",
            "a | b c",
            "colo[u]r",
            "[ \" very good \" bad ]",
        ] {
            let parsed = parse_query(input).unwrap();
            let printed = parsed.to_string();
            let reparsed = parse_query(&printed).unwrap();
            assert_eq!(parsed, reparsed, "round trip failed for {:?}", input);
        }
    }
}
