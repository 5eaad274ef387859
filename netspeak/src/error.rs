//! Error taxonomy observed by search callers.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Source region of a parse error, 1-based lines and columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

#[derive(Debug, Error)]
pub enum Error {
    /// Rejected query: a syntax error (with its source span), a complexity or
    /// nesting violation, or a length rejection.
    #[error("invalid query: {message}")]
    InvalidQuery {
        message: String,
        span: Option<Span>,
    },

    /// An invariant violation inside the engine or its indexes.
    #[error("internal error: {0}")]
    Internal(String),

    /// Anything the engine did not classify.
    #[error("{0}")]
    Unknown(String),
}

impl Error {
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Error::InvalidQuery {
            message: message.into(),
            span: None,
        }
    }

    pub fn invalid_query_at(message: impl Into<String>, span: Span) -> Self {
        Error::InvalidQuery {
            message: message.into(),
            span: Some(span),
        }
    }
}

impl From<netspeak_core::Error> for Error {
    fn from(e: netspeak_core::Error) -> Self {
        Error::Internal(e.to_string())
    }
}

pub mod query_error_message {
    pub const TOO_DEEPLY_NESTED: &str = "too deeply nested";

    pub fn too_complex(complexity: u32, max: u32) -> String {
        format!("too complex (complexity: {}, maximum: {})", complexity, max)
    }
}
