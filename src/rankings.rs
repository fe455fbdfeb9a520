//! Per-domain authority ranks.

use std::collections::HashMap;
use std::path::Path;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TesseraError};
use crate::id;

/// Rank assigned to domains without an entry. Lower is better.
pub const UNRANKED: u8 = u8::MAX;

/// Precomputed domain ranks, `0` for the most authoritative sites up to
/// [`UNRANKED`].
#[derive(Debug, Clone, Default)]
pub struct DomainRankings {
    ranks: AHashMap<i32, u8>,
}

#[derive(Serialize, Deserialize)]
struct RankingsFile {
    ranks: HashMap<i32, u8>,
}

impl DomainRankings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ranks(ranks: impl IntoIterator<Item = (i32, u8)>) -> Self {
        DomainRankings {
            ranks: ranks.into_iter().collect(),
        }
    }

    /// Load a `{"ranks": {"<domain id>": rank, ...}}` JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| {
            TesseraError::config(format!("Failed to read rankings {}: {e}", path.display()))
        })?;
        let file: RankingsFile = serde_json::from_slice(&data)?;
        Ok(Self::from_ranks(file.ranks))
    }

    pub fn set(&mut self, domain_id: i32, rank: u8) {
        self.ranks.insert(domain_id, rank);
    }

    /// The rank of `domain_id`, [`UNRANKED`] when unknown.
    pub fn ranking(&self, domain_id: i32) -> u8 {
        self.ranks.get(&domain_id).copied().unwrap_or(UNRANKED)
    }

    /// The rank of the domain owning `doc_id`, scaled onto the id rank field.
    pub fn sort_rank(&self, doc_id: i64) -> i64 {
        let rank = self.ranking(id::domain_id(doc_id)) as i64;
        rank * id::MAX_ID_RANK / UNRANKED as i64
    }

    /// `doc_id` with its domain's sort rank injected.
    pub fn rank_encode(&self, doc_id: i64) -> i64 {
        id::add_rank(self.sort_rank(doc_id), doc_id)
    }

    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_unknown_domain_is_unranked() {
        let rankings = DomainRankings::from_ranks([(1, 0), (2, 10)]);
        assert_eq!(rankings.ranking(1), 0);
        assert_eq!(rankings.ranking(2), 10);
        assert_eq!(rankings.ranking(3), UNRANKED);
    }

    #[test]
    fn test_sort_rank_scaling() {
        let rankings = DomainRankings::from_ranks([(1, 0)]);
        assert_eq!(rankings.sort_rank(id::encode_id(1, 5)), 0);
        assert_eq!(rankings.sort_rank(id::encode_id(2, 5)), id::MAX_ID_RANK);

        let dirty = rankings.rank_encode(id::encode_id(2, 5));
        assert_eq!(id::remove_rank(dirty), id::encode_id(2, 5));
        assert!(dirty > rankings.rank_encode(id::encode_id(1, 5)));
    }

    #[test]
    fn test_load_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ranks.json");
        std::fs::write(&path, r#"{"ranks": {"7": 3, "9": 200}}"#).unwrap();

        let rankings = DomainRankings::load(&path).unwrap();
        assert_eq!(rankings.len(), 2);
        assert_eq!(rankings.ranking(7), 3);
        assert_eq!(rankings.ranking(9), 200);
    }
}
