//! Storage primitives for index files.
//!
//! Every on-disk structure in Tessera is either a flat array of 64-bit words
//! or an append-only byte blob. Both are published through read-only shared
//! memory maps and are never mutated after the builder forces them to disk.
//!
//! - [`LongArrayFile`] / [`LongArrayWriter`]: word arrays (trees, forward
//!   index columns, postings)
//! - [`BlobFile`] / [`BlobWriter`]: byte blobs (spans, positions)
//! - [`OffHeapBank`]: anonymous mapped memory viewed as atomics, for the
//!   fixed-capacity term dictionary
//!
//! Word files are stored in host order and only little-endian targets are
//! supported.

use std::path::Path;

use crate::error::{Result, TesseraError};

pub mod anon;
pub mod blob;
pub mod long_array;

pub use anon::OffHeapBank;
pub use blob::{BlobFile, BlobWriter};
pub use long_array::{LongArrayFile, LongArrayWriter};

#[cfg(not(target_endian = "little"))]
compile_error!("tessera index files are little-endian word arrays");

/// Size of one index word in bytes.
pub const WORD_BYTES: usize = std::mem::size_of::<i64>();

/// Remove `path` if it exists. Missing files are not an error.
pub fn delete_if_exists<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(TesseraError::storage(format!(
            "Failed to delete {}: {e}",
            path.display()
        ))),
    }
}
