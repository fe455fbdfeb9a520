//! # Tessera
//!
//! On-disk index structures for a web search engine.
//!
//! ## Features
//!
//! - Concurrent open-addressing term dictionary with fixed-capacity and
//!   growable variants
//! - Sorted block trees over memory-mapped `i64` arrays, with merge support
//! - Forward index from document id to metadata, features, size and spans
//! - Segmented reverse index construction with full and priority variants
//! - Document spans and span/position intersection counting
//! - BM25 and coherence ranking under per-query deadline budgets

pub mod btree;
pub mod cli;
pub mod config;
pub mod dictionary;
pub mod error;
pub mod forward;
pub mod id;
pub mod index;
pub mod journal;
pub mod metadata;
pub mod ranking;
pub mod rankings;
pub mod reverse;
pub mod spans;
pub mod storage;
pub mod util;

pub mod prelude {
    pub use crate::config::IndexConfig;
    pub use crate::error::{Result, TesseraError};
    pub use crate::index::{IndexGenerations, SearchIndex, build_index};
    pub use crate::journal::{Journal, JournalRecord, JournalTerm, JournalWriter};
    pub use crate::rankings::DomainRankings;
    pub use crate::ranking::{SearchQuery, SearchResults};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
