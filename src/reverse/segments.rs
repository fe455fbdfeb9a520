//! Counting-sort segmentation of postings by term.
//!
//! [`SegmentCounter`] tallies occurrences per term through a term dictionary,
//! which maps the sparse 64-bit term ids onto dense counter slots. Finishing
//! it sorts the distinct terms and turns counts into contiguous offset ranges
//! of a postings array: a [`ReverseIndexSegments`]. A [`SegmentConstructor`]
//! then places each posting at the cursor of its term's segment.

use std::ops::Range;

use crate::dictionary::{NOT_FOUND, TermDictionary};
use crate::error::{Result, TesseraError};

/// First pass: occurrence counts per term.
#[derive(Debug)]
pub struct SegmentCounter {
    dictionary: Box<dyn TermDictionary>,
    /// Term id of each dense dictionary id.
    terms: Vec<i64>,
    counts: Vec<u64>,
}

impl SegmentCounter {
    pub fn new(dictionary: Box<dyn TermDictionary>) -> Self {
        SegmentCounter {
            dictionary,
            terms: Vec::new(),
            counts: Vec::new(),
        }
    }

    /// Count one occurrence of `term_id`.
    pub fn add(&mut self, term_id: i64) -> Result<()> {
        let id = self.dictionary.put(term_id)? as usize;

        if id == self.terms.len() {
            self.terms.push(term_id);
            self.counts.push(0);
        } else if id > self.terms.len() {
            return Err(TesseraError::dictionary(format!(
                "dictionary skipped ids: got {id} with {} assigned",
                self.terms.len()
            )));
        }

        self.counts[id] += 1;
        Ok(())
    }

    pub fn distinct_terms(&self) -> usize {
        self.terms.len()
    }

    /// Sort the distinct terms and lay out their segments.
    pub fn finish(self) -> ReverseIndexSegments {
        let mut order: Vec<usize> = (0..self.terms.len()).collect();
        order.sort_unstable_by_key(|&dense| self.terms[dense]);

        let mut term_ids = Vec::with_capacity(order.len());
        let mut ends = Vec::with_capacity(order.len());
        let mut slot_of_dense = vec![0u32; order.len()];

        let mut end = 0usize;
        for (slot, &dense) in order.iter().enumerate() {
            end += self.counts[dense] as usize;
            term_ids.push(self.terms[dense]);
            ends.push(end);
            slot_of_dense[dense] = slot as u32;
        }

        ReverseIndexSegments {
            dictionary: self.dictionary,
            term_ids,
            ends,
            slot_of_dense,
        }
    }
}

/// Ascending distinct term ids and the half-open postings range of each.
///
/// Segment `i` covers `[ends[i-1], ends[i])`; segments are contiguous,
/// non-overlapping and jointly cover `0..total()`.
#[derive(Debug)]
pub struct ReverseIndexSegments {
    dictionary: Box<dyn TermDictionary>,
    term_ids: Vec<i64>,
    ends: Vec<usize>,
    slot_of_dense: Vec<u32>,
}

impl ReverseIndexSegments {
    /// Count the occurrences in `terms` and lay out the segments.
    pub fn count<I>(dictionary: Box<dyn TermDictionary>, terms: I) -> Result<Self>
    where
        I: IntoIterator<Item = i64>,
    {
        let mut counter = SegmentCounter::new(dictionary);
        for term in terms {
            counter.add(term)?;
        }
        Ok(counter.finish())
    }

    pub fn len(&self) -> usize {
        self.term_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.term_ids.is_empty()
    }

    /// Total postings over all segments.
    pub fn total(&self) -> usize {
        self.ends.last().copied().unwrap_or(0)
    }

    pub fn term_ids(&self) -> &[i64] {
        &self.term_ids
    }

    pub fn term_id(&self, slot: usize) -> i64 {
        self.term_ids[slot]
    }

    /// Postings range of segment `slot`.
    pub fn range(&self, slot: usize) -> Range<usize> {
        let start = if slot == 0 { 0 } else { self.ends[slot - 1] };
        start..self.ends[slot]
    }

    /// Segment slot of `term_id`, resolved through the dictionary.
    pub fn slot_of(&self, term_id: i64) -> Option<usize> {
        match self.dictionary.get(term_id) {
            NOT_FOUND => None,
            dense => self.slot_of_dense.get(dense as usize).map(|&s| s as usize),
        }
    }

    pub fn segment_of(&self, term_id: i64) -> Option<Range<usize>> {
        self.slot_of(term_id).map(|slot| self.range(slot))
    }

    /// `(term id, range)` for every segment in term order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, Range<usize>)> + '_ {
        (0..self.len()).map(|slot| (self.term_ids[slot], self.range(slot)))
    }

    /// Start the construction pass over postings of `entry_size` words.
    pub fn constructor(&self, entry_size: usize) -> SegmentConstructor<'_> {
        SegmentConstructor {
            segments: self,
            cursors: (0..self.len()).map(|slot| self.range(slot).start).collect(),
            entry_size,
        }
    }
}

/// Second pass: per-segment write cursors over a postings array of
/// `total() * entry_size` words.
#[derive(Debug)]
pub struct SegmentConstructor<'a> {
    segments: &'a ReverseIndexSegments,
    cursors: Vec<usize>,
    entry_size: usize,
}

impl SegmentConstructor<'_> {
    /// Whether segment `slot` has room for another posting.
    pub fn can_put_more(&self, slot: usize) -> bool {
        self.cursors[slot] < self.segments.ends[slot]
    }

    /// Write `entry` at the cursor of segment `slot` and advance it. Returns
    /// `false`, writing nothing, when the segment is already full.
    pub fn put_next(&mut self, postings: &mut [i64], slot: usize, entry: &[i64]) -> bool {
        debug_assert_eq!(entry.len(), self.entry_size);
        if !self.can_put_more(slot) {
            return false;
        }
        let start = self.cursors[slot] * self.entry_size;
        postings[start..start + self.entry_size].copy_from_slice(entry);
        self.cursors[slot] += 1;
        true
    }

    /// Look up the segment of `term_id` and put `entry` there.
    pub fn put_term(&mut self, postings: &mut [i64], term_id: i64, entry: &[i64]) -> Result<()> {
        let slot = self.segments.slot_of(term_id).ok_or_else(|| {
            TesseraError::index(format!("term {term_id} was not seen by the counting pass"))
        })?;
        if !self.put_next(postings, slot, entry) {
            return Err(TesseraError::index(format!(
                "segment of term {term_id} overflowed; the journal changed between passes"
            )));
        }
        Ok(())
    }

    /// Whether every segment has been filled exactly.
    pub fn is_complete(&self) -> bool {
        (0..self.cursors.len()).all(|slot| !self.can_put_more(slot))
    }
}
