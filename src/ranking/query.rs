//! Compiled query expressions.

use bit_vec::BitVec;
use serde::{Deserialize, Serialize};

/// Boolean expression over query terms, identified by their index in the
/// query's term list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompiledQuery {
    And(Vec<CompiledQuery>),
    Or(Vec<CompiledQuery>),
    Leaf(usize),
}

/// Per-leaf scores folded over a [`CompiledQuery`].
pub trait LeafScorer {
    fn score_leaf(&self, term: usize) -> f64;
}

impl CompiledQuery {
    /// All of `terms`.
    pub fn all_of(terms: usize) -> Self {
        CompiledQuery::And((0..terms).map(CompiledQuery::Leaf).collect())
    }

    /// Any of `terms`.
    pub fn any_of(terms: usize) -> Self {
        CompiledQuery::Or((0..terms).map(CompiledQuery::Leaf).collect())
    }

    /// Sum over AND nodes, maximum over OR nodes. Empty nodes score zero.
    pub fn evaluate<S: LeafScorer + ?Sized>(&self, scorer: &S) -> f64 {
        match self {
            CompiledQuery::Leaf(term) => scorer.score_leaf(*term),
            CompiledQuery::And(children) => children.iter().map(|c| c.evaluate(scorer)).sum(),
            CompiledQuery::Or(children) => children
                .iter()
                .map(|c| c.evaluate(scorer))
                .fold(None, |best: Option<f64>, s| Some(best.map_or(s, |b| b.max(s))))
                .unwrap_or(0.0),
        }
    }

    /// Fold the tree with one function per node kind.
    pub fn fold<T>(
        &self,
        leaf: &impl Fn(usize) -> T,
        and: &impl Fn(Vec<T>) -> T,
        or: &impl Fn(Vec<T>) -> T,
    ) -> T {
        match self {
            CompiledQuery::Leaf(term) => leaf(*term),
            CompiledQuery::And(children) => {
                and(children.iter().map(|c| c.fold(leaf, and, or)).collect())
            }
            CompiledQuery::Or(children) => {
                or(children.iter().map(|c| c.fold(leaf, and, or)).collect())
            }
        }
    }

    /// Distinct leaf term indexes, ascending.
    pub fn terms(&self) -> Vec<usize> {
        let mut terms = Vec::new();
        self.collect_terms(&mut terms);
        terms.sort_unstable();
        terms.dedup();
        terms
    }

    fn collect_terms(&self, out: &mut Vec<usize>) {
        match self {
            CompiledQuery::Leaf(term) => out.push(*term),
            CompiledQuery::And(children) | CompiledQuery::Or(children) => {
                for child in children {
                    child.collect_terms(out);
                }
            }
        }
    }

    /// Documents matching the expression, given each term's ascending
    /// postings: AND intersects, OR unites. Terms without postings match
    /// nothing.
    pub fn candidates(&self, postings: &[Vec<i64>]) -> Vec<i64> {
        self.fold(
            &|term: usize| postings.get(term).cloned().unwrap_or_default(),
            &|children: Vec<Vec<i64>>| {
                let mut iter = children.into_iter();
                let first = iter.next().unwrap_or_default();
                iter.fold(first, |acc, next| intersect(&acc, &next))
            },
            &|children: Vec<Vec<i64>>| {
                children
                    .into_iter()
                    .fold(Vec::new(), |acc, next| union(&acc, &next))
            },
        )
    }
}

/// Sorted intersection of two ascending lists.
pub fn intersect(a: &[i64], b: &[i64]) -> Vec<i64> {
    let (mut i, mut j) = (0, 0);
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

/// Sorted, deduplicated union of two ascending lists.
pub fn union(a: &[i64], b: &[i64]) -> Vec<i64> {
    let (mut i, mut j) = (0, 0);
    let mut out = Vec::with_capacity(a.len() + b.len());
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

/// Collection statistics for one query evaluation.
#[derive(Debug, Clone)]
pub struct RankingContext {
    /// Documents in the index.
    pub num_documents: usize,
    /// Documents containing each query term.
    pub doc_frequencies: Vec<usize>,
    /// Set for priority-only terms. These are left out of full-text BM25
    /// and only score through their field flags.
    pub priority_terms: BitVec,
}

impl RankingContext {
    pub fn new(num_documents: usize, doc_frequencies: Vec<usize>) -> Self {
        let priority_terms = BitVec::from_elem(doc_frequencies.len(), false);
        RankingContext {
            num_documents,
            doc_frequencies,
            priority_terms,
        }
    }

    pub fn with_priority_terms(mut self, priority_terms: BitVec) -> Self {
        self.priority_terms = priority_terms;
        self
    }

    pub fn is_priority(&self, term: usize) -> bool {
        self.priority_terms.get(term).unwrap_or(false)
    }

    pub fn frequency(&self, term: usize) -> usize {
        self.doc_frequencies.get(term).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<f64>);

    impl LeafScorer for Fixed {
        fn score_leaf(&self, term: usize) -> f64 {
            self.0[term]
        }
    }

    #[test]
    fn test_and_sums_or_maxes() {
        let scores = Fixed(vec![1.0, 2.0, 4.0]);

        assert_eq!(CompiledQuery::all_of(3).evaluate(&scores), 7.0);
        assert_eq!(CompiledQuery::any_of(3).evaluate(&scores), 4.0);

        let nested = CompiledQuery::And(vec![
            CompiledQuery::Leaf(0),
            CompiledQuery::Or(vec![CompiledQuery::Leaf(1), CompiledQuery::Leaf(2)]),
        ]);
        assert_eq!(nested.evaluate(&scores), 5.0);
        assert_eq!(CompiledQuery::Or(vec![]).evaluate(&scores), 0.0);
        assert_eq!(nested.terms(), vec![0, 1, 2]);
    }

    #[test]
    fn test_or_of_negative_scores() {
        let scores = Fixed(vec![-3.0, -1.0]);
        assert_eq!(CompiledQuery::any_of(2).evaluate(&scores), -1.0);
    }

    #[test]
    fn test_candidates() {
        let postings = vec![vec![1, 3, 5, 7], vec![3, 4, 5], vec![5, 9]];

        assert_eq!(CompiledQuery::all_of(3).candidates(&postings), vec![5]);
        assert_eq!(
            CompiledQuery::any_of(3).candidates(&postings),
            vec![1, 3, 4, 5, 7, 9]
        );

        let q = CompiledQuery::Or(vec![
            CompiledQuery::And(vec![CompiledQuery::Leaf(0), CompiledQuery::Leaf(1)]),
            CompiledQuery::Leaf(2),
        ]);
        assert_eq!(q.candidates(&postings), vec![3, 5, 9]);

        // a term beyond the postings matches nothing
        assert!(CompiledQuery::And(vec![CompiledQuery::Leaf(0), CompiledQuery::Leaf(8)])
            .candidates(&postings)
            .is_empty());
    }

    #[test]
    fn test_priority_bits() {
        let mut bits = BitVec::from_elem(3, false);
        bits.set(1, true);
        let ctx = RankingContext::new(100, vec![1, 2, 3]).with_priority_terms(bits);
        assert!(!ctx.is_priority(0));
        assert!(ctx.is_priority(1));
        assert!(!ctx.is_priority(7));
        assert_eq!(ctx.frequency(2), 3);
        assert_eq!(ctx.frequency(9), 0);
    }
}
