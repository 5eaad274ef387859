//! On-disk inverted index: keyed postlists with frequency-sorted values.
//!
//! Directory layout:
//!
//! ```text
//! <index>/
//!   properties        fixed struct: value type, sorting, version, totals
//!   data/data.0 …     payload files, each at most 1 GiB
//!   table/            perfect-hash map from key to (file, offset)
//! ```
//!
//! Built once offline, opened read-only at runtime.

mod postlist;
mod properties;
mod reader;
mod storage;
mod writer;

pub use postlist::{Head, Postlist, DEFAULT_PAGE_SIZE};
pub use properties::{Properties, ValueSorting, PROPERTIES_FILE_NAME, VERSION_NUMBER};
pub use reader::PostlistReader;
pub use storage::StorageReader;
pub use writer::{
    data_file_name, IndexBuilder, StorageWriter, DATA_DIR_NAME, MAX_DATA_FILE_SIZE,
    TABLE_DIR_NAME,
};
