//! Candidate retrieval and result ranking.

use bit_vec::BitVec;
use log::debug;
use serde::Serialize;

use crate::error::Result;
use crate::forward::ForwardIndexReader;
use crate::id::{domain_id, ordinal, remove_rank};
use crate::metadata::TermMetadata;
use crate::ranking::bm25::{Bm25FullScorer, Bm25PriorityScorer};
use crate::ranking::coherence::coherence;
use crate::ranking::params::RankingParameters;
use crate::ranking::query::{CompiledQuery, RankingContext, union};
use crate::reverse::ReverseIndexReader;
use crate::util::budget::QueryBudget;

/// A query as handed over by the query layer: term ids, the expression over
/// them and which terms are priority-only.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub terms: Vec<i64>,
    pub expression: CompiledQuery,
    pub priority_terms: BitVec,
}

impl SearchQuery {
    pub fn new(terms: Vec<i64>, expression: CompiledQuery) -> Self {
        let priority_terms = BitVec::from_elem(terms.len(), false);
        SearchQuery {
            terms,
            expression,
            priority_terms,
        }
    }

    /// Documents containing every term.
    pub fn all_of(terms: Vec<i64>) -> Self {
        let expression = CompiledQuery::all_of(terms.len());
        Self::new(terms, expression)
    }

    /// Documents containing any term.
    pub fn any_of(terms: Vec<i64>) -> Self {
        let expression = CompiledQuery::any_of(terms.len());
        Self::new(terms, expression)
    }

    /// Mark term `index` as priority-only.
    pub fn with_priority_term(mut self, index: usize) -> Self {
        if index < self.priority_terms.len() {
            self.priority_terms.set(index, true);
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    /// Clean document id.
    pub doc_id: i64,
    pub domain_id: i32,
    pub ordinal: i32,
    pub score: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResults {
    /// Best first.
    pub results: Vec<SearchResult>,
    /// Documents considered.
    pub candidates: usize,
    /// Documents dropped because the budget ran out.
    pub timed_out: usize,
}

/// Scores candidate documents of one index generation.
#[derive(Debug)]
pub struct ResultRanker<'a> {
    forward: &'a ForwardIndexReader,
    full: &'a ReverseIndexReader,
    priority: Option<&'a ReverseIndexReader>,
    params: &'a RankingParameters,
}

impl<'a> ResultRanker<'a> {
    pub fn new(
        forward: &'a ForwardIndexReader,
        full: &'a ReverseIndexReader,
        params: &'a RankingParameters,
    ) -> Self {
        ResultRanker {
            forward,
            full,
            priority: None,
            params,
        }
    }

    /// Retrieve priority index matches ahead of full-text ones.
    pub fn with_priority_index(mut self, priority: &'a ReverseIndexReader) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Rank-encoded ids of the documents matching `query`, ascending, at
    /// most `max_candidates` of them. Priority index matches are taken
    /// first, then full-text matches in rank order.
    pub fn candidates(&self, query: &SearchQuery) -> Result<Vec<i64>> {
        let limit = self.params.max_candidates;

        let mut selected = match self.priority {
            Some(priority) => {
                let mut found = matches(priority, query)?;
                found.truncate(limit);
                found
            }
            None => Vec::new(),
        };

        if selected.len() < limit {
            let mut full = matches(self.full, query)?;
            if !selected.is_empty() {
                full.retain(|id| selected.binary_search(id).is_err());
            }
            full.truncate(limit - selected.len());
            selected = union(&selected, &full);
        }

        Ok(selected)
    }

    /// Score `candidates` (rank-encoded ids). Documents unknown to the
    /// forward index are skipped; documents whose lookups time out are
    /// dropped and counted.
    pub fn rank_candidates(
        &self,
        query: &SearchQuery,
        candidates: &[i64],
        budget: &QueryBudget,
    ) -> Result<SearchResults> {
        let mut frequencies = Vec::with_capacity(query.terms.len());
        let mut metadata = Vec::with_capacity(query.terms.len());
        for &term in &query.terms {
            frequencies.push(self.full.num_documents(term)?);
            metadata.push(self.full.term_metadata(term, candidates)?);
        }

        let ctx = RankingContext::new(self.forward.num_documents(), frequencies)
            .with_priority_terms(query.priority_terms.clone());

        let mut results = SearchResults {
            candidates: candidates.len(),
            ..Default::default()
        };
        let mut doc_terms: Vec<Option<TermMetadata>> = Vec::with_capacity(query.terms.len());

        for (i, &dirty_id) in candidates.iter().enumerate() {
            let doc_id = remove_rank(dirty_id);
            let Some(size) = self.forward.document_size(doc_id) else {
                continue;
            };

            doc_terms.clear();
            doc_terms.extend(metadata.iter().map(|per_doc| per_doc[i]));

            let title_hits = match self.title_hits(query, &doc_terms, doc_id, dirty_id, budget) {
                Ok(hits) => hits,
                Err(e) if e.is_timeout() => {
                    debug!("dropping document {doc_id:#x}: {e}");
                    results.timed_out += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let score = self.score(&ctx, query, &doc_terms, size, title_hits);
            results.results.push(SearchResult {
                doc_id,
                domain_id: domain_id(doc_id),
                ordinal: ordinal(doc_id),
                score,
            });
        }

        results
            .results
            .sort_by(|a, b| b.score.total_cmp(&a.score).then(a.doc_id.cmp(&b.doc_id)));

        Ok(results)
    }

    /// Retrieve, score and keep the best `limit` documents.
    pub fn search(
        &self,
        query: &SearchQuery,
        limit: usize,
        budget: &QueryBudget,
    ) -> Result<SearchResults> {
        let candidates = self.candidates(query)?;
        let mut results = self.rank_candidates(query, &candidates, budget)?;
        results.results.truncate(limit);

        debug!(
            "query over {} terms: {} candidates, {} results, {} timed out",
            query.terms.len(),
            results.candidates,
            results.results.len(),
            results.timed_out
        );
        Ok(results)
    }

    fn score(
        &self,
        ctx: &RankingContext,
        query: &SearchQuery,
        doc_terms: &[Option<TermMetadata>],
        size: i32,
        title_hits: usize,
    ) -> f64 {
        let params = self.params;
        let expression = &query.expression;

        let full = expression.evaluate(&Bm25FullScorer::new(ctx, doc_terms, size, params.bm25));
        let priority = expression.evaluate(&Bm25PriorityScorer::new(ctx, doc_terms, params.bm25));

        params.full_text_weight * full
            + params.priority_weight * priority
            + params.coherence_weight * term_coherence(doc_terms)
            + params.title_span_weight * (1.0 + title_hits as f64).ln()
    }

    /// Query term positions inside the document's title span.
    fn title_hits(
        &self,
        query: &SearchQuery,
        doc_terms: &[Option<TermMetadata>],
        doc_id: i64,
        dirty_id: i64,
        budget: &QueryBudget,
    ) -> Result<usize> {
        let spans = self.forward.document_spans(budget, &[doc_id])?;
        let Some(title) = spans.into_iter().next().flatten().and_then(|s| s.title().cloned())
        else {
            return Ok(0);
        };

        let mut hits = 0;
        for (&term, meta) in query.terms.iter().zip(doc_terms) {
            if meta.is_none() {
                continue;
            }
            let positions = self.full.positions(term, &[dirty_id], budget)?;
            if let Some(Some(positions)) = positions.first() {
                hits += title.count_intersections(positions);
            }
        }
        Ok(hits)
    }
}

/// Candidates of `query` in one reverse index.
fn matches(index: &ReverseIndexReader, query: &SearchQuery) -> Result<Vec<i64>> {
    let mut postings = Vec::with_capacity(query.terms.len());
    for &term in &query.terms {
        postings.push(index.documents(term)?);
    }
    Ok(query.expression.candidates(&postings))
}

/// Coherence of the position buckets of every matched query term, whatever
/// the expression joining them.
fn term_coherence(doc_terms: &[Option<TermMetadata>]) -> f64 {
    coherence(doc_terms.iter().flatten().map(|meta| meta.position_mask()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::WordFlags;
    use crate::ranking::coherence::coherence_over;

    #[test]
    fn test_term_coherence_unions_all_terms() {
        let opening = TermMetadata::from_positions(WordFlags::NONE, &[0, 3]);
        let closing = TermMetadata::from_positions(WordFlags::TITLE, &[80]);
        let doc_terms = [Some(opening), None, Some(closing)];

        let expected = (2.0f64 / 40.0).powf(0.25);
        assert!((term_coherence(&doc_terms) - expected).abs() < 1e-12);

        // requiring both terms does not zero out terms in different buckets
        let both = CompiledQuery::And(vec![CompiledQuery::Leaf(0), CompiledQuery::Leaf(2)]);
        let masks = [opening.position_mask(), 0, closing.position_mask()];
        assert_eq!(coherence_over(&both, &masks), 0.0);
        assert!(term_coherence(&doc_terms) > 0.0);

        assert_eq!(term_coherence(&[None, None]), 0.0);
    }
}
