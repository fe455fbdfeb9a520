//! Structural regions of a document.
//!
//! A [`DocumentSpan`] is a set of half-open `[start, end)` position ranges
//! tagged with a region code (title, heading, anchor text, ...). The forward
//! index stores one [`DocumentSpans`] record per document in the spans blob;
//! at query time term positions are intersected with the ranges.

use std::fmt;

use crate::error::{Result, TesseraError};
use crate::util::varint::{decode_delta_list, decode_u32, encode_delta_list, encode_u32_into};

/// Region codes.
pub mod code {
    pub const TITLE: u8 = 1;
    pub const HEADING: u8 = 2;
    pub const ANCHOR: u8 = 3;
    pub const NAV: u8 = 4;
    pub const CODE: u8 = 5;
    pub const EXTERNAL_LINK_TEXT: u8 = 6;

    pub fn name(code: u8) -> &'static str {
        match code {
            TITLE => "title",
            HEADING => "heading",
            ANCHOR => "anchor",
            NAV => "nav",
            CODE => "code",
            EXTERNAL_LINK_TEXT => "external_link_text",
            _ => "unknown",
        }
    }
}

/// Ranges of one region code, flattened as `start0, end0, start1, end1, ...`.
#[derive(Clone, PartialEq, Eq)]
pub struct DocumentSpan {
    code: u8,
    ranges: Vec<i32>,
}

impl DocumentSpan {
    /// Ranges must be non-negative, non-empty, ascending and non-overlapping.
    pub fn new(code: u8, ranges: Vec<i32>) -> Result<Self> {
        if ranges.len() % 2 != 0 {
            return Err(TesseraError::invalid_argument(format!(
                "span ranges must come in start/end pairs, got {} values",
                ranges.len()
            )));
        }

        let mut previous_end = 0;
        for pair in ranges.chunks_exact(2) {
            let (start, end) = (pair[0], pair[1]);
            if start < previous_end || end <= start {
                return Err(TesseraError::invalid_argument(format!(
                    "bad span range [{start}, {end}) for code {code}"
                )));
            }
            previous_end = end;
        }

        Ok(DocumentSpan { code, ranges })
    }

    pub fn code(&self) -> u8 {
        self.code
    }

    /// The flattened range list.
    pub fn ranges(&self) -> &[i32] {
        &self.ranges
    }

    /// Number of ranges.
    pub fn len(&self) -> usize {
        self.ranges.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// `(start, end)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.ranges.chunks_exact(2).map(|pair| (pair[0], pair[1]))
    }

    pub fn contains_position(&self, position: i32) -> bool {
        let idx = self.ranges.partition_point(|&bound| bound <= position);
        // odd index: position is past a start but before its end
        idx % 2 == 1
    }

    /// How many of the ascending `positions` fall inside some range.
    ///
    /// One forward sweep with a cursor on each side. A position equal to a
    /// range end is outside that range but may open the next one, so the
    /// range cursor advances without consuming the position.
    pub fn count_intersections(&self, positions: &[i32]) -> usize {
        let mut range = 0;
        let mut pos = 0;
        let mut count = 0;

        while range < self.len() && pos < positions.len() {
            let start = self.ranges[2 * range];
            let end = self.ranges[2 * range + 1];
            let p = positions[pos];

            if p < start {
                pos += 1;
            } else if p >= end {
                range += 1;
            } else {
                count += 1;
                pos += 1;
            }
        }

        count
    }

    /// Total positions covered by all ranges.
    pub fn covered(&self) -> i64 {
        self.iter().map(|(start, end)| (end - start) as i64).sum()
    }
}

impl fmt::Debug for DocumentSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentSpan")
            .field("code", &code::name(self.code))
            .field("ranges", &self.iter().collect::<Vec<_>>())
            .finish()
    }
}

/// All spans of one document, at most one per region code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentSpans {
    spans: Vec<DocumentSpan>,
}

impl DocumentSpans {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a span. A span with an already present code replaces the old one.
    pub fn insert(&mut self, span: DocumentSpan) {
        match self.spans.iter_mut().find(|s| s.code == span.code) {
            Some(existing) => *existing = span,
            None => self.spans.push(span),
        }
    }

    pub fn get(&self, code: u8) -> Option<&DocumentSpan> {
        self.spans.iter().find(|s| s.code == code)
    }

    pub fn title(&self) -> Option<&DocumentSpan> {
        self.get(code::TITLE)
    }

    /// Positions of `positions` inside the span of `code`; zero when the
    /// document has no such span.
    pub fn count_intersections(&self, code: u8, positions: &[i32]) -> usize {
        self.get(code)
            .map_or(0, |span| span.count_intersections(positions))
    }

    pub fn iter(&self) -> impl Iterator<Item = &DocumentSpan> {
        self.spans.iter()
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Append the encoded record to `out`: a span count, then per span the
    /// code byte and the delta-coded range list. Returns the bytes written.
    pub fn encode(&self, out: &mut Vec<u8>) -> usize {
        let mut written = encode_u32_into(out, self.spans.len() as u32);
        for span in &self.spans {
            out.push(span.code);
            written += 1 + encode_delta_list(out, &span.ranges);
        }
        written
    }

    /// Decode a record from the start of `bytes`, returning it and the bytes
    /// consumed.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize)> {
        let (count, mut pos) = decode_u32(bytes).map_err(corrupt)?;
        let mut spans = Vec::with_capacity(count.min(64) as usize);

        for _ in 0..count {
            let span_code = *bytes
                .get(pos)
                .ok_or_else(|| TesseraError::index("spans record truncated"))?;
            pos += 1;

            let (ranges, read) = decode_delta_list(&bytes[pos..]).map_err(corrupt)?;
            pos += read;

            let span = DocumentSpan::new(span_code, ranges)
                .map_err(|e| TesseraError::index(format!("corrupt spans record: {e}")))?;
            spans.push(span);
        }

        Ok((DocumentSpans { spans }, pos))
    }
}

fn corrupt(e: TesseraError) -> TesseraError {
    TesseraError::index(format!("corrupt spans record: {e}"))
}

impl FromIterator<DocumentSpan> for DocumentSpans {
    fn from_iter<I: IntoIterator<Item = DocumentSpan>>(iter: I) -> Self {
        let mut spans = DocumentSpans::new();
        for span in iter {
            spans.insert(span);
        }
        spans
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(ranges: &[i32]) -> DocumentSpan {
        DocumentSpan::new(code::TITLE, ranges.to_vec()).unwrap()
    }

    #[test]
    fn test_intersection_boundaries() {
        let s = span(&[10, 20, 30, 40]);

        assert_eq!(s.count_intersections(&[35]), 1);
        assert_eq!(s.count_intersections(&[20]), 0);
        assert_eq!(s.count_intersections(&[10]), 1);
        assert_eq!(s.count_intersections(&[40]), 0);
        assert_eq!(s.count_intersections(&[9]), 0);
    }

    #[test]
    fn test_intersection_sweeps_all_ranges() {
        let s = span(&[10, 20, 30, 40]);

        // 20 closes the first range but the second must still be checked
        assert_eq!(s.count_intersections(&[5, 15, 20, 25, 30, 39, 45]), 3);
        assert_eq!(s.count_intersections(&[15, 15, 16]), 3);
        assert_eq!(s.count_intersections(&[]), 0);
        assert_eq!(span(&[]).count_intersections(&[1, 2, 3]), 0);
    }

    #[test]
    fn test_adjacent_ranges() {
        let s = span(&[0, 5, 5, 10]);
        assert_eq!(s.count_intersections(&[0, 4, 5, 9, 10]), 4);
        assert!(s.contains_position(5));
        assert!(!s.contains_position(10));
    }

    #[test]
    fn test_contains_position_matches_sweep() {
        let s = span(&[3, 7, 12, 13, 20, 31]);
        for p in 0..40 {
            assert_eq!(
                s.contains_position(p),
                s.count_intersections(&[p]) == 1,
                "position {p}"
            );
        }
        assert_eq!(s.covered(), 4 + 1 + 11);
    }

    #[test]
    fn test_invalid_ranges_rejected() {
        assert!(DocumentSpan::new(code::TITLE, vec![1]).is_err());
        assert!(DocumentSpan::new(code::TITLE, vec![5, 5]).is_err());
        assert!(DocumentSpan::new(code::TITLE, vec![5, 9, 8, 12]).is_err());
        assert!(DocumentSpan::new(code::TITLE, vec![-1, 2]).is_err());
    }

    #[test]
    fn test_record_codec() {
        let spans: DocumentSpans = [
            DocumentSpan::new(code::TITLE, vec![2, 5]).unwrap(),
            DocumentSpan::new(code::ANCHOR, vec![100, 120, 300, 301]).unwrap(),
        ]
        .into_iter()
        .collect();

        let mut buf = vec![0xAA];
        let written = spans.encode(&mut buf);
        assert_eq!(written, buf.len() - 1);

        let (decoded, read) = DocumentSpans::decode(&buf[1..]).unwrap();
        assert_eq!(read, written);
        assert_eq!(decoded, spans);
        assert_eq!(decoded.count_intersections(code::TITLE, &[2, 4, 5]), 2);
        assert_eq!(decoded.count_intersections(code::NAV, &[2]), 0);
    }

    #[test]
    fn test_truncated_record() {
        let spans: DocumentSpans = [DocumentSpan::new(code::HEADING, vec![1, 500]).unwrap()]
            .into_iter()
            .collect();
        let mut buf = Vec::new();
        spans.encode(&mut buf);

        for cut in 0..buf.len() {
            assert!(DocumentSpans::decode(&buf[..cut]).is_err(), "cut at {cut}");
        }
    }
}
