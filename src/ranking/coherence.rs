//! Term coherence: how much of the document the query terms cover together.
//!
//! Each term occurrence carries a mask of the position buckets it was seen
//! in. Coherence is `(set buckets / total buckets) ^ 0.25` over a combined
//! mask.

use crate::metadata::TermMetadata;
use crate::ranking::query::CompiledQuery;

const BUCKET_MASK: i64 = (1 << TermMetadata::POSITION_BUCKETS) - 1;

fn score(mask: i64) -> f64 {
    let set = (mask & BUCKET_MASK).count_ones() as f64;
    (set / TermMetadata::POSITION_BUCKETS as f64).powf(0.25)
}

/// Coherence of the union of `masks`.
pub fn coherence<I>(masks: I) -> f64
where
    I: IntoIterator<Item = i64>,
{
    score(masks.into_iter().fold(0, |acc, mask| acc | mask))
}

/// Coherence following the query structure: AND nodes keep the buckets all
/// children share, OR nodes the buckets any child has. `masks[i]` is the
/// mask of query term `i`; missing terms have an empty mask.
///
/// For callers that want an AND to score only where its terms appear in the
/// same stretch of the document. Result ranking uses [`coherence`].
pub fn coherence_over(query: &CompiledQuery, masks: &[i64]) -> f64 {
    let mask = query.fold(
        &|term: usize| masks.get(term).copied().unwrap_or(0),
        &|children: Vec<i64>| {
            children
                .into_iter()
                .reduce(|a, b| a & b)
                .unwrap_or(0)
        },
        &|children: Vec<i64>| children.into_iter().fold(0, |a, b| a | b),
    );
    score(mask)
}
