//! BM25 scorers.

use serde::{Deserialize, Serialize};

use crate::metadata::{TermMetadata, WordFlags};
use crate::ranking::query::{LeafScorer, RankingContext};

/// Assumed average document length in tokens.
pub const AVG_LENGTH: f64 = 5000.0;

/// BM25 k1 and b.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Parameters {
    /// Term frequency saturation.
    pub k: f64,
    /// Length normalization strength, `0` disables it.
    pub b: f64,
}

impl Default for Bm25Parameters {
    fn default() -> Self {
        Bm25Parameters { k: 1.2, b: 0.5 }
    }
}

/// Inverse document frequency of a term found in `freq` of `n` documents.
/// Always positive.
pub fn idf(n: f64, freq: f64) -> f64 {
    (1.0 + (n - freq + 0.5) / (freq + 0.5)).ln()
}

/// Saturated term frequency of `count` occurrences in a document of
/// `length` tokens.
pub fn saturation(count: f64, length: f64, params: &Bm25Parameters) -> f64 {
    let norm = 1.0 - params.b + params.b * (length / AVG_LENGTH);
    (count * (params.k + 1.0)) / (count + params.k * norm)
}

/// Weighted count of the field signals on a term occurrence.
pub fn priority_count(flags: WordFlags) -> f64 {
    let mut count = 0.0;

    if flags.contains(WordFlags::EXTERNAL_LINK) {
        count += 2.5;
    }
    if flags.contains(WordFlags::URL_DOMAIN) {
        count += 2.5;
    } else if flags.contains(WordFlags::URL_PATH) {
        count += 1.5;
    }
    if flags.contains(WordFlags::SITE) {
        count += 1.25;
    }
    if flags.contains(WordFlags::SITE_ADJACENT) {
        count += 1.25;
    }
    if flags.contains(WordFlags::SUBJECTS) {
        count += 1.25;
    }
    if flags.contains(WordFlags::NAMES_WORDS) {
        count += 0.25;
    }
    if flags.contains(WordFlags::TF_IDF_HIGH) {
        count += 0.5;
    }
    if flags.contains(WordFlags::TITLE) {
        count += 1.5;
    }

    count
}

/// Full-text BM25 over occurrence counts of one document.
#[derive(Debug)]
pub struct Bm25FullScorer<'a> {
    ctx: &'a RankingContext,
    terms: &'a [Option<TermMetadata>],
    length: f64,
    params: Bm25Parameters,
}

impl<'a> Bm25FullScorer<'a> {
    /// `terms[i]` is the document's metadata for query term `i`.
    pub fn new(
        ctx: &'a RankingContext,
        terms: &'a [Option<TermMetadata>],
        length: i32,
        params: Bm25Parameters,
    ) -> Self {
        Bm25FullScorer {
            ctx,
            terms,
            length: length.max(1) as f64,
            params,
        }
    }
}

impl LeafScorer for Bm25FullScorer<'_> {
    fn score_leaf(&self, term: usize) -> f64 {
        if self.ctx.is_priority(term) {
            return 0.0;
        }
        let Some(Some(meta)) = self.terms.get(term) else {
            return 0.0;
        };
        let count = meta.count() as f64;
        if count == 0.0 {
            return 0.0;
        }

        let idf = idf(self.ctx.num_documents as f64, self.ctx.frequency(term) as f64);
        idf * saturation(count, self.length, &self.params)
    }
}

/// BM25 without length normalization, counting field signals instead of
/// occurrences.
#[derive(Debug)]
pub struct Bm25PriorityScorer<'a> {
    ctx: &'a RankingContext,
    terms: &'a [Option<TermMetadata>],
    params: Bm25Parameters,
}

impl<'a> Bm25PriorityScorer<'a> {
    /// Only `k` of `params` is used.
    pub fn new(
        ctx: &'a RankingContext,
        terms: &'a [Option<TermMetadata>],
        params: Bm25Parameters,
    ) -> Self {
        Bm25PriorityScorer {
            ctx,
            terms,
            params: Bm25Parameters { b: 0.0, ..params },
        }
    }
}

impl LeafScorer for Bm25PriorityScorer<'_> {
    fn score_leaf(&self, term: usize) -> f64 {
        let Some(Some(meta)) = self.terms.get(term) else {
            return 0.0;
        };
        let count = priority_count(meta.flags());
        if count == 0.0 {
            return 0.0;
        }

        let idf = idf(self.ctx.num_documents as f64, self.ctx.frequency(term) as f64);
        // length is irrelevant with b = 0
        idf * saturation(count, AVG_LENGTH, &self.params)
    }
}
