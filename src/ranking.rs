//! Query-time relevance scoring.
//!
//! A [`CompiledQuery`] is an AND/OR tree over query term indexes. Scorers
//! implement [`LeafScorer`] and are folded over the tree: AND sums the
//! children, OR keeps the best child.
//!
//! - [`bm25`]: full-text BM25 over occurrence counts and the priority
//!   variant over field-presence flags
//! - [`coherence`]: how much of the document the matched terms span
//! - [`ranker`]: candidate retrieval and the weighted combination of all of
//!   the above into one score per document

pub mod bm25;
pub mod coherence;
pub mod params;
pub mod query;
pub mod ranker;

pub use bm25::{Bm25FullScorer, Bm25Parameters, Bm25PriorityScorer};
pub use coherence::{coherence, coherence_over};
pub use params::RankingParameters;
pub use query::{CompiledQuery, LeafScorer, RankingContext};
pub use ranker::{ResultRanker, SearchQuery, SearchResult, SearchResults};
