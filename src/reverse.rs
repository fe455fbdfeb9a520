//! Reverse index: term to documents postings.
//!
//! Construction is a counting sort over the journal. The first pass counts
//! occurrences per term ([`segments`]), the second writes every posting into
//! its term's segment of a scratch array. Each segment is then sorted by
//! rank-encoded document id and written as one tree in the docs file, and a
//! words tree maps term ids to the offset of their docs tree.
//!
//! Files, for the full index (`rev-`) and the priority index (`rev-prio-`):
//!
//! - `*docs.dat`: concatenated docs trees, entries
//!   `(rank-encoded doc id, term metadata word, positions offset)`
//! - `*words.dat`: one tree of `(term id, docs tree offset)`
//! - `*positions.dat`: delta-coded position lists

pub mod builder;
pub mod reader;
pub mod segments;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use builder::{ReverseIndexBuilder, ReverseIndexStats};
pub use reader::ReverseIndexReader;
pub use segments::{ReverseIndexSegments, SegmentConstructor, SegmentCounter};

use crate::btree::BTreeContext;
use crate::dictionary::DictionaryConfig;
use crate::error::{Result, TesseraError};
use crate::metadata::WordFlags;

/// Values per docs tree entry: term metadata and positions offset.
pub const DOCS_ARITY: usize = 2;
/// Values per words tree entry: docs tree offset.
pub const WORDS_ARITY: usize = 1;

/// Which postings an index holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReverseIndexKind {
    /// Every term occurrence.
    Full,
    /// Only occurrences carrying one of the priority flags.
    Priority,
}

impl ReverseIndexKind {
    fn prefix(self) -> &'static str {
        match self {
            ReverseIndexKind::Full => "rev-",
            ReverseIndexKind::Priority => "rev-prio-",
        }
    }

    /// Whether an occurrence with `flags` belongs in this index.
    pub fn accepts(self, flags: WordFlags, priority_flags: WordFlags) -> bool {
        match self {
            ReverseIndexKind::Full => true,
            ReverseIndexKind::Priority => flags.intersects(priority_flags),
        }
    }
}

impl fmt::Display for ReverseIndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReverseIndexKind::Full => write!(f, "full"),
            ReverseIndexKind::Priority => write!(f, "priority"),
        }
    }
}

/// Paths of one reverse index's files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReverseIndexFiles {
    pub docs: PathBuf,
    pub words: PathBuf,
    pub positions: PathBuf,
    /// Scratch postings array, removed once the build completes.
    pub scratch: PathBuf,
}

impl ReverseIndexFiles {
    pub fn in_dir<P: AsRef<Path>>(dir: P, kind: ReverseIndexKind) -> Self {
        let dir = dir.as_ref();
        let prefix = kind.prefix();
        ReverseIndexFiles {
            docs: dir.join(format!("{prefix}docs.dat")),
            words: dir.join(format!("{prefix}words.dat")),
            positions: dir.join(format!("{prefix}positions.dat")),
            scratch: dir.join(format!("{prefix}postings.tmp")),
        }
    }

    pub fn outputs(&self) -> [&Path; 3] {
        [&self.docs, &self.words, &self.positions]
    }

    pub fn exist(&self) -> bool {
        self.outputs().iter().all(|p| p.is_file())
    }
}

/// Reverse index build and read settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverseIndexConfig {
    /// Term dictionary used by the counting pass.
    pub dictionary: DictionaryConfig,
    /// Shape of the per-term docs trees.
    pub docs_tree: BTreeContext,
    /// Shape of the words tree.
    pub words_tree: BTreeContext,
    /// Flags qualifying an occurrence for the priority index.
    pub priority_flags: WordFlags,
}

impl Default for ReverseIndexConfig {
    fn default() -> Self {
        ReverseIndexConfig {
            dictionary: DictionaryConfig::default(),
            docs_tree: BTreeContext {
                max_layers: 7,
                value_arity: DOCS_ARITY,
                block_size_bits: 9,
            },
            words_tree: BTreeContext {
                max_layers: 5,
                value_arity: WORDS_ARITY,
                block_size_bits: 10,
            },
            priority_flags: WordFlags::PRIORITY,
        }
    }
}

impl ReverseIndexConfig {
    pub fn validate(&self) -> Result<()> {
        self.docs_tree.validate()?;
        self.words_tree.validate()?;
        if self.docs_tree.value_arity != DOCS_ARITY {
            return Err(TesseraError::config(format!(
                "docs tree needs value arity {DOCS_ARITY}, got {}",
                self.docs_tree.value_arity
            )));
        }
        if self.words_tree.value_arity != WORDS_ARITY {
            return Err(TesseraError::config(format!(
                "words tree needs value arity {WORDS_ARITY}, got {}",
                self.words_tree.value_arity
            )));
        }
        Ok(())
    }
}
