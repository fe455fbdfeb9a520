//! Index configuration.
//!
//! Everything is optional in the JSON form; missing fields take their
//! defaults.
//!
//! ```json
//! {
//!   "forward": { "background_id_map": true },
//!   "reverse": {
//!     "dictionary": { "type": "FixedCapacity", "capacity": 50000000 },
//!     "docs_tree": { "max_layers": 7, "value_arity": 2, "block_size_bits": 9 }
//!   },
//!   "ranking": { "priority_weight": 0.75 },
//!   "query_budget_ms": 150
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TesseraError};
use crate::forward::ForwardIndexConfig;
use crate::ranking::RankingParameters;
use crate::reverse::ReverseIndexConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub forward: ForwardIndexConfig,
    pub reverse: ReverseIndexConfig,
    pub ranking: RankingParameters,
    /// Deadline for one query evaluation.
    pub query_budget_ms: u64,
    /// Documents per journal page when writing journals.
    pub journal_page_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            forward: ForwardIndexConfig::default(),
            reverse: ReverseIndexConfig::default(),
            ranking: RankingParameters::default(),
            query_budget_ms: 250,
            journal_page_size: 10_000,
        }
    }
}

impl IndexConfig {
    /// Load and validate a JSON config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| {
            TesseraError::config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        let config: IndexConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// [`IndexConfig::load`] when a path is given, defaults otherwise.
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.reverse.validate()?;
        if self.journal_page_size == 0 {
            return Err(TesseraError::config("journal_page_size must be positive"));
        }
        if self.ranking.bm25.k <= 0.0 || !(0.0..=1.0).contains(&self.ranking.bm25.b) {
            return Err(TesseraError::config(format!(
                "bm25 needs k > 0 and b in [0, 1], got k={} b={}",
                self.ranking.bm25.k, self.ranking.bm25.b
            )));
        }
        Ok(())
    }

    pub fn query_budget(&self) -> Duration {
        Duration::from_millis(self.query_budget_ms)
    }
}
