//! Packed metadata words for documents and term occurrences.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// Per-document metadata word, as produced upstream and stored in the
/// forward index.
///
/// ```text
///  63 ... 56 | 55 ... 32 | 31 ... 24 | 23 ... 16 | 15 ... 8 | 7 ... 0
///    rank    | reserved  | topology  |  quality  |   year   |  flags
/// ```
///
/// The rank byte is owned by the index: the forward converter overwrites it
/// with the domain rank current at build time.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DocumentMetadata(pub i64);

impl DocumentMetadata {
    const FLAGS_SHIFT: u32 = 0;
    const YEAR_SHIFT: u32 = 8;
    const QUALITY_SHIFT: u32 = 16;
    const TOPOLOGY_SHIFT: u32 = 24;
    const RANK_SHIFT: u32 = 56;

    /// Earliest year representable; later years are stored as an offset.
    pub const BASE_YEAR: i32 = 1995;

    pub fn new(flags: u8, year: i32, quality: u8, topology: u8) -> Self {
        let year = (year - Self::BASE_YEAR).clamp(0, u8::MAX as i32) as i64;
        DocumentMetadata(
            (flags as i64) << Self::FLAGS_SHIFT
                | year << Self::YEAR_SHIFT
                | (quality as i64) << Self::QUALITY_SHIFT
                | (topology as i64) << Self::TOPOLOGY_SHIFT,
        )
    }

    fn byte(self, shift: u32) -> u8 {
        ((self.0 >> shift) & 0xFF) as u8
    }

    pub fn flags(self) -> u8 {
        self.byte(Self::FLAGS_SHIFT)
    }

    pub fn year(self) -> i32 {
        Self::BASE_YEAR + self.byte(Self::YEAR_SHIFT) as i32
    }

    pub fn quality(self) -> u8 {
        self.byte(Self::QUALITY_SHIFT)
    }

    pub fn topology(self) -> u8 {
        self.byte(Self::TOPOLOGY_SHIFT)
    }

    pub fn rank(self) -> u8 {
        self.byte(Self::RANK_SHIFT)
    }

    /// This word with the rank byte replaced.
    pub fn with_rank(self, rank: u8) -> Self {
        let cleared = self.0 & !(0xFFi64 << Self::RANK_SHIFT);
        DocumentMetadata(cleared | (rank as i64) << Self::RANK_SHIFT)
    }
}

impl fmt::Debug for DocumentMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentMetadata")
            .field("rank", &self.rank())
            .field("quality", &self.quality())
            .field("year", &self.year())
            .field("topology", &self.topology())
            .field("flags", &self.flags())
            .finish()
    }
}

/// Field-presence signals attached to a term occurrence by the upstream
/// keyword extractor.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct WordFlags(pub u16);

impl WordFlags {
    pub const NONE: WordFlags = WordFlags(0);
    /// Term scores high on tf-idf within the document.
    pub const TF_IDF_HIGH: WordFlags = WordFlags(1 << 0);
    /// Term is among the document's subject terms.
    pub const SUBJECTS: WordFlags = WordFlags(1 << 1);
    /// Term is part of a named entity.
    pub const NAMES_WORDS: WordFlags = WordFlags(1 << 2);
    /// Term appears in the site's keywords.
    pub const SITE: WordFlags = WordFlags(1 << 3);
    /// Term appears in keywords of documents linking to this site.
    pub const SITE_ADJACENT: WordFlags = WordFlags(1 << 4);
    /// Term appears in the title.
    pub const TITLE: WordFlags = WordFlags(1 << 5);
    /// Term matches part of the URL path.
    pub const URL_PATH: WordFlags = WordFlags(1 << 6);
    /// Term matches part of the domain name.
    pub const URL_DOMAIN: WordFlags = WordFlags(1 << 7);
    /// Term appears in anchor text of external links to the document.
    pub const EXTERNAL_LINK: WordFlags = WordFlags(1 << 8);

    /// Flags that qualify a posting for the priority index.
    pub const PRIORITY: WordFlags = WordFlags(
        Self::SUBJECTS.0
            | Self::SITE.0
            | Self::SITE_ADJACENT.0
            | Self::TITLE.0
            | Self::URL_PATH.0
            | Self::URL_DOMAIN.0
            | Self::EXTERNAL_LINK.0,
    );

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn contains(self, other: WordFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: WordFlags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for WordFlags {
    type Output = WordFlags;

    fn bitor(self, rhs: WordFlags) -> WordFlags {
        WordFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for WordFlags {
    fn bitor_assign(&mut self, rhs: WordFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for WordFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WordFlags({:#06x})", self.0)
    }
}

/// Per-posting metadata word: what the reverse index stores next to each
/// document id.
///
/// ```text
///  63 ............ 24 | 23 ... 16 | 15 ..... 0
///   position buckets  |   count   |   flags
/// ```
///
/// Bucket `i` is set when the term occurs somewhere in positions
/// `[i * BUCKET_WIDTH, (i + 1) * BUCKET_WIDTH)`. Positions past the last
/// bucket are not represented in the mask but still counted.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TermMetadata(pub i64);

impl TermMetadata {
    pub const POSITION_BUCKETS: u32 = 40;
    pub const BUCKET_WIDTH: i32 = 8;

    const COUNT_SHIFT: u32 = 16;
    const POSITIONS_SHIFT: u32 = 24;
    const POSITIONS_MASK: i64 = (1 << Self::POSITION_BUCKETS) - 1;

    pub fn new(flags: WordFlags, count: u32, position_mask: i64) -> Self {
        let count = count.min(u8::MAX as u32) as i64;
        TermMetadata(
            flags.0 as i64
                | count << Self::COUNT_SHIFT
                | (position_mask & Self::POSITIONS_MASK) << Self::POSITIONS_SHIFT,
        )
    }

    /// Build the word for a term occurring at `positions`.
    pub fn from_positions(flags: WordFlags, positions: &[i32]) -> Self {
        let mut mask = 0i64;
        for &pos in positions {
            if pos < 0 {
                continue;
            }
            let bucket = pos / Self::BUCKET_WIDTH;
            if (bucket as u32) < Self::POSITION_BUCKETS {
                mask |= 1 << bucket;
            }
        }
        Self::new(flags, positions.len() as u32, mask)
    }

    pub fn flags(self) -> WordFlags {
        WordFlags((self.0 & 0xFFFF) as u16)
    }

    /// Occurrence count, saturating at 255.
    pub fn count(self) -> u32 {
        ((self.0 >> Self::COUNT_SHIFT) & 0xFF) as u32
    }

    pub fn position_mask(self) -> i64 {
        (self.0 >> Self::POSITIONS_SHIFT) & Self::POSITIONS_MASK
    }

    /// Combine two occurrences of the same term in the same document.
    pub fn merge(self, other: TermMetadata) -> TermMetadata {
        TermMetadata::new(
            self.flags() | other.flags(),
            self.count() + other.count(),
            self.position_mask() | other.position_mask(),
        )
    }
}

impl fmt::Debug for TermMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TermMetadata")
            .field("flags", &self.flags())
            .field("count", &self.count())
            .field("positions", &format_args!("{:#x}", self.position_mask()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_metadata_fields() {
        let meta = DocumentMetadata::new(0b101, 2021, 42, 3);
        assert_eq!(meta.flags(), 0b101);
        assert_eq!(meta.year(), 2021);
        assert_eq!(meta.quality(), 42);
        assert_eq!(meta.topology(), 3);
        assert_eq!(meta.rank(), 0);
    }

    #[test]
    fn test_with_rank_preserves_other_fields() {
        let meta = DocumentMetadata::new(1, 2000, 7, 9).with_rank(200);
        assert_eq!(meta.rank(), 200);
        assert_eq!(meta.quality(), 7);
        assert_eq!(meta.year(), 2000);

        let reranked = meta.with_rank(3);
        assert_eq!(reranked.rank(), 3);
        assert_eq!(reranked.topology(), 9);
    }

    #[test]
    fn test_word_flags() {
        let flags = WordFlags::TITLE | WordFlags::SITE;
        assert!(flags.contains(WordFlags::TITLE));
        assert!(!flags.contains(WordFlags::TITLE | WordFlags::SUBJECTS));
        assert!(flags.intersects(WordFlags::PRIORITY));
        assert!(!WordFlags::TF_IDF_HIGH.intersects(WordFlags::PRIORITY));
    }

    #[test]
    fn test_term_metadata_from_positions() {
        let meta = TermMetadata::from_positions(WordFlags::TITLE, &[0, 3, 9, 1000]);
        assert_eq!(meta.flags(), WordFlags::TITLE);
        assert_eq!(meta.count(), 4);
        // positions 0 and 3 share bucket 0; 9 is bucket 1; 1000 is past the mask
        assert_eq!(meta.position_mask(), 0b11);
    }

    #[test]
    fn test_term_metadata_merge_saturates() {
        let a = TermMetadata::new(WordFlags::TITLE, 200, 0b1);
        let b = TermMetadata::new(WordFlags::SITE, 100, 0b100);
        let merged = a.merge(b);
        assert_eq!(merged.flags(), WordFlags::TITLE | WordFlags::SITE);
        assert_eq!(merged.count(), 255);
        assert_eq!(merged.position_mask(), 0b101);
    }

    #[test]
    fn test_full_position_mask_fits() {
        let meta = TermMetadata::new(WordFlags::NONE, 1, -1);
        assert_eq!(meta.position_mask().count_ones(), TermMetadata::POSITION_BUCKETS);
    }
}
