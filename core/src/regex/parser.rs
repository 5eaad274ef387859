//! Parses the Netspeak regex-token syntax into a [`RegexQuery`].
//!
//! Mapping: `?` one code point, `*` any run, `+` one-or-more (qmark then
//! star), a run of two or more dots a star, `[abc]` a char set (`[a]` an
//! optional word), `{abc}` a char set repeated `|abc|` times, anything else a
//! literal character. Malformed fragments never fail; they degrade to their
//! literal characters.

use super::query::{RegexQuery, RegexQueryBuilder, RegexUnit};

pub fn parse_regex_query(input: &str) -> RegexQuery {
    let chars: Vec<char> = input.chars().collect();
    let mut builder = RegexQueryBuilder::new();
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '?' => builder.add(RegexUnit::QMark),
            '*' => builder.add(RegexUnit::Star),
            '+' => {
                builder.add(RegexUnit::QMark);
                builder.add(RegexUnit::Star);
            }
            '.' => {
                // two or more dots mean a star; a single dot is literal
                if chars.get(i + 1) == Some(&'.') {
                    builder.add(RegexUnit::Star);
                    while chars.get(i + 1) == Some(&'.') {
                        i += 1;
                    }
                } else {
                    builder.add(RegexUnit::Word(".".to_string()));
                }
            }
            '[' => match read_until(&chars, i + 1, ']') {
                Some(inner) => {
                    i += inner.len() + 1;
                    // "[u]" is an optional character, "[aeiou]" a char set
                    if inner.len() == 1 {
                        builder.add(RegexUnit::OptionalWord(inner.iter().collect()));
                    } else {
                        builder.add(RegexUnit::CharSet(inner));
                    }
                }
                None => builder.add(RegexUnit::Word(c.to_string())),
            },
            '{' => match read_until(&chars, i + 1, '}') {
                Some(inner) => {
                    i += inner.len() + 1;
                    // "{form}" matches every ordering of the characters
                    for _ in 0..inner.len() {
                        builder.add(RegexUnit::CharSet(inner.clone()));
                    }
                }
                None => builder.add(RegexUnit::Word(c.to_string())),
            },
            other => builder.add(RegexUnit::Word(other.to_string())),
        }
        i += 1;
    }

    builder.to_query()
}

/// Characters between `from` and the first `end` character, or `None` if
/// `end` never occurs.
fn read_until(chars: &[char], from: usize, end: char) -> Option<Vec<char>> {
    let mut result = Vec::new();
    for &c in chars.get(from..)? {
        if c == end {
            return Some(result);
        }
        result.push(c);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regex::query::RegexUnit;

    #[test]
    fn optional_letter() {
        let q = parse_regex_query("colo[u]r");
        assert_eq!(
            q.units(),
            &[
                RegexUnit::Word("colo".into()),
                RegexUnit::OptionalWord("u".into()),
                RegexUnit::Word("r".into()),
            ]
        );
        assert_eq!(q.combinations_upper_bound(), 2);
    }

    #[test]
    fn char_set_and_order_set() {
        let q = parse_regex_query("[bp]et");
        assert_eq!(
            q.units(),
            &[
                RegexUnit::CharSet(vec!['b', 'p']),
                RegexUnit::Word("et".into()),
            ]
        );

        let q = parse_regex_query("{ab}");
        assert_eq!(
            q.units(),
            &[
                RegexUnit::CharSet(vec!['a', 'b']),
                RegexUnit::CharSet(vec!['a', 'b']),
            ]
        );
        assert_eq!(q.combinations_upper_bound(), 4);
    }

    #[test]
    fn dots_and_plus() {
        let q = parse_regex_query("a..b");
        assert_eq!(
            q.units(),
            &[
                RegexUnit::Word("a".into()),
                RegexUnit::Star,
                RegexUnit::Word("b".into()),
            ]
        );

        let q = parse_regex_query("e.g");
        assert_eq!(q.units(), &[RegexUnit::Word("e.g".into())]);

        let q = parse_regex_query("x+");
        assert_eq!(
            q.units(),
            &[
                RegexUnit::Word("x".into()),
                RegexUnit::QMark,
                RegexUnit::Star,
            ]
        );
    }

    #[test]
    fn unclosed_brackets_are_literal() {
        let q = parse_regex_query("a[bc");
        assert_eq!(q.units(), &[RegexUnit::Word("a[bc".into())]);
    }
}
