//! Ranking weights.

use serde::{Deserialize, Serialize};

use crate::ranking::bm25::Bm25Parameters;

/// How the individual signals combine into one document score.
///
/// ```text
/// score = full_text * bm25_full
///       + priority * bm25_priority
///       + coherence * term_coherence
///       + title_span * ln(1 + title hits)
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingParameters {
    pub bm25: Bm25Parameters,
    pub full_text_weight: f64,
    pub priority_weight: f64,
    pub coherence_weight: f64,
    /// Weight of query positions falling inside the title span.
    pub title_span_weight: f64,
    /// Upper bound on documents scored per query.
    pub max_candidates: usize,
}

impl Default for RankingParameters {
    fn default() -> Self {
        RankingParameters {
            bm25: Bm25Parameters::default(),
            full_text_weight: 1.0,
            priority_weight: 0.5,
            coherence_weight: 0.25,
            title_span_weight: 0.25,
            max_candidates: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let params: RankingParameters =
            serde_json::from_str(r#"{"priority_weight": 2.0, "bm25": {"b": 0.75}}"#).unwrap();
        assert_eq!(params.priority_weight, 2.0);
        assert_eq!(params.bm25.b, 0.75);
        assert_eq!(params.bm25.k, 1.2);
        assert_eq!(params.max_candidates, 10_000);
    }
}
