//! Immutable sorted block trees over flat word arrays.
//!
//! A tree stores fixed-width entries `(key, value_0, .., value_{k-1})` in
//! strictly ascending key order. The physical layout at the tree's offset is
//!
//! ```text
//! [header: 4 words][index layers, top first][entries]
//! ```
//!
//! Each index block holds `2^block_size_bits` keys, one per child block: the
//! largest key found below it, with unused slots padded by `i64::MAX`. The
//! bottom layer's children are data blocks of
//! `block_size / entry_size` entries. A lookup binary-searches one block per
//! layer, then binary-searches the selected data block.
//!
//! Trees are written in one pass by [`BTreeWriter`], read through
//! [`BTreeReader`], and combined in linear time by the functions in
//! [`merge`].

pub mod context;
pub mod merge;
pub mod reader;
pub mod writer;

pub use context::{BTreeContext, BTreeLayout};
pub use merge::{merge_keys, merge_values, merged_entry_count};
pub use reader::BTreeReader;
pub use writer::{BTreeWriter, write_to_vec};

/// Returned by [`BTreeReader::find_entry`] when the key is absent.
pub const NOT_FOUND: i64 = -1;

/// Words occupied by a tree header.
pub const HEADER_WORDS: usize = 4;

/// Bumped on any change to the header or layout.
pub const FORMAT_VERSION: i64 = 1;
