//! Combined document ids.
//!
//! A document id packs a domain id and an intra-domain ordinal into one
//! non-negative `i64`:
//!
//! ```text
//!  63 | 62 ........ 56 | 55 ............. 26 | 25 ........... 0
//!   0 |   rank (7)     |   domain id (30)    |   ordinal (26)
//! ```
//!
//! A *clean* id has the rank bits zero and is what the forward index is keyed
//! by. A *rank-encoded* id carries the domain's sort rank in the top bits, so
//! that postings sorted by id come out sorted by rank first. Passing one color
//! where the other is expected is a programming error and is caught by debug
//! assertions at the boundaries.

pub const ORDINAL_BITS: u32 = 26;
pub const DOMAIN_BITS: u32 = 30;
pub const RANK_BITS: u32 = 7;

pub const DOMAIN_SHIFT: u32 = ORDINAL_BITS;
pub const RANK_SHIFT: u32 = ORDINAL_BITS + DOMAIN_BITS;

pub const ORDINAL_MASK: i64 = (1 << ORDINAL_BITS) - 1;
pub const DOMAIN_MASK: i64 = (1 << DOMAIN_BITS) - 1;
pub const RANK_MASK: i64 = (1 << RANK_BITS) - 1;

/// Largest rank value representable in the id.
pub const MAX_ID_RANK: i64 = RANK_MASK;

/// Pack a domain id and ordinal into a clean id. Out-of-range components are
/// truncated to their field width.
pub fn encode_id(domain_id: i32, ordinal: i32) -> i64 {
    ((domain_id as i64 & DOMAIN_MASK) << DOMAIN_SHIFT) | (ordinal as i64 & ORDINAL_MASK)
}

pub fn domain_id(id: i64) -> i32 {
    ((id >> DOMAIN_SHIFT) & DOMAIN_MASK) as i32
}

pub fn ordinal(id: i64) -> i32 {
    (id & ORDINAL_MASK) as i32
}

/// The rank field of a rank-encoded id.
pub fn rank(id: i64) -> i64 {
    (id >> RANK_SHIFT) & RANK_MASK
}

/// Inject `rank` (clamped to the 7-bit field) into `id`.
pub fn add_rank(rank: i64, id: i64) -> i64 {
    let rank = rank.clamp(0, MAX_ID_RANK);
    remove_rank(id) | (rank << RANK_SHIFT)
}

/// Strip the rank bits, producing a clean id.
pub fn remove_rank(id: i64) -> i64 {
    id & !(RANK_MASK << RANK_SHIFT)
}

pub fn is_clean(id: i64) -> bool {
    id >= 0 && rank(id) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let id = encode_id(123_456, 7_890);
        assert_eq!(domain_id(id), 123_456);
        assert_eq!(ordinal(id), 7_890);
        assert!(is_clean(id));
        assert!(id >= 0);
    }

    #[test]
    fn test_rank_round_trip() {
        let clean = encode_id(5, 9);
        let dirty = add_rank(100, clean);

        assert!(!is_clean(dirty));
        assert_eq!(rank(dirty), 100);
        assert_eq!(domain_id(dirty), 5);
        assert_eq!(ordinal(dirty), 9);
        assert_eq!(remove_rank(dirty), clean);
        assert!(dirty >= 0);
    }

    #[test]
    fn test_rank_orders_ids() {
        let better = add_rank(1, encode_id(DOMAIN_MASK as i32, ORDINAL_MASK as i32));
        let worse = add_rank(2, encode_id(0, 0));
        assert!(better < worse);
    }

    #[test]
    fn test_rank_is_clamped() {
        assert_eq!(rank(add_rank(1_000, encode_id(1, 1))), MAX_ID_RANK);
        assert_eq!(rank(add_rank(-3, encode_id(1, 1))), 0);
    }
}
