//! Regex word-set matching against an in-memory vocabulary.

mod index;
mod parser;
mod query;

pub use index::DefaultRegexIndex;
pub use parser::parse_regex_query;
pub use query::{RegexQuery, RegexQueryBuilder, RegexUnit};
