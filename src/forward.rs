//! Forward index: per-document metadata keyed by clean document id.
//!
//! Three files make up one forward index:
//!
//! - `fwd-doc-id.dat`: ascending clean document ids; a document's position
//!   in this array is its row
//! - `fwd-doc-data.dat`: [`ROW_STRIDE`] words per row: the metadata word with
//!   the domain rank injected, `features << 32 | size`, and the byte offset
//!   of the document's spans record
//! - `fwd-spans.dat`: the spans blob
//!
//! [`ForwardIndexConverter`] builds them from a journal;
//! [`ForwardIndexReader`] maps them for lookups.

pub mod converter;
pub mod reader;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use converter::{ForwardIndexConverter, ForwardIndexStats};
pub use reader::ForwardIndexReader;

pub const DOC_IDS_FILE: &str = "fwd-doc-id.dat";
pub const DOC_DATA_FILE: &str = "fwd-doc-data.dat";
pub const SPANS_FILE: &str = "fwd-spans.dat";

/// Words per row of the data file.
pub const ROW_STRIDE: usize = 3;

pub(crate) const METADATA_OFFSET: usize = 0;
pub(crate) const FEATURES_SIZE_OFFSET: usize = 1;
pub(crate) const SPANS_OFFSET: usize = 2;

pub(crate) fn pack_features_size(features: i32, size: i32) -> i64 {
    (features as i64) << 32 | (size as u32 as i64)
}

pub(crate) fn unpack_features(word: i64) -> i32 {
    (word >> 32) as i32
}

pub(crate) fn unpack_size(word: i64) -> i32 {
    word as i32
}

/// Paths of the three forward index files in one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardIndexFiles {
    pub doc_ids: PathBuf,
    pub doc_data: PathBuf,
    pub spans: PathBuf,
}

impl ForwardIndexFiles {
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        ForwardIndexFiles {
            doc_ids: dir.join(DOC_IDS_FILE),
            doc_data: dir.join(DOC_DATA_FILE),
            spans: dir.join(SPANS_FILE),
        }
    }

    pub fn all(&self) -> [&Path; 3] {
        [&self.doc_ids, &self.doc_data, &self.spans]
    }

    pub fn exist(&self) -> bool {
        self.all().iter().all(|p| p.is_file())
    }
}

/// Forward index reader settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwardIndexConfig {
    /// Build an id to row hash map on a background thread after opening.
    /// Lookups use binary search until it is ready.
    pub background_id_map: bool,
}

impl Default for ForwardIndexConfig {
    fn default() -> Self {
        ForwardIndexConfig {
            background_id_map: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_features_size_packing() {
        for &(features, size) in &[(0, 0), (1, 2), (-1, 7), (i32::MAX, -1), (i32::MIN, i32::MAX)] {
            let word = pack_features_size(features, size);
            assert_eq!(unpack_features(word), features);
            assert_eq!(unpack_size(word), size);
        }
    }
}
