//! Error type shared by the storage and index layers.
//!
//! Everything in this crate is either an IO failure, a format violation of an
//! on-disk artifact, or a build-time rejection. Query-level errors (invalid
//! query syntax etc.) live in the `netspeak` crate.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot open {path}: {source}")]
    CannotOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The index on disk was written by an incompatible library version.
    #[error("index version is {found}, but this library reads version {expected}")]
    VersionMismatch { found: u32, expected: u32 },

    /// The index on disk stores a different value type than the reader expects.
    #[error("index value type is {found:?}, but the reader expects {expected:?}")]
    ValueTypeMismatch { found: String, expected: String },

    /// An on-disk structure violated its own invariants (short read,
    /// inconsistent postlist head, unknown word id, malformed vocab line...).
    #[error("corrupt index data: {0}")]
    Corrupt(String),

    /// A build-time rejection (duplicate keys, non-empty target directory,
    /// perfect hash construction failure).
    #[error("index build failed: {0}")]
    Build(String),
}

impl Error {
    pub fn cannot_open(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::CannotOpen {
            path: path.into(),
            source,
        }
    }

    pub fn corrupt(msg: impl Into<String>) -> Self {
        Error::Corrupt(msg.into())
    }

    pub fn build(msg: impl Into<String>) -> Self {
        Error::Build(msg.into())
    }
}
