//! Term dictionary: token hash to dense term id.
//!
//! Ids are assigned sequentially from zero in first-seen order and are never
//! recycled within one dictionary. Two backends implement [`TermDictionary`]:
//!
//! - [`GrowableDictionary`]: an in-memory hash map that grows as needed
//! - [`FixedCapacityDictionary`]: an open-addressing table in anonymous
//!   mapped memory, presized for very large vocabularies; overfilling it is
//!   fatal rather than triggering a resize
//!
//! [`DictionaryFactory::create`] picks one from a [`DictionaryConfig`].

use serde::{Deserialize, Serialize};

use crate::error::{Result, TesseraError};

pub mod fixed;
pub mod growable;

pub use fixed::FixedCapacityDictionary;
pub use growable::GrowableDictionary;

/// Returned by [`TermDictionary::get`] for keys that were never inserted.
pub const NOT_FOUND: i32 = -1;

/// A token hash to term id mapping.
pub trait TermDictionary: Send + Sync + std::fmt::Debug {
    /// Insert `key` if absent. Returns its id, existing or newly assigned.
    fn put(&self, key: i64) -> Result<i32>;

    /// The id of `key`, or [`NOT_FOUND`].
    fn get(&self, key: i64) -> i32;

    /// Number of ids assigned so far.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `key` has an id.
    fn contains(&self, key: i64) -> bool {
        self.get(key) != NOT_FOUND
    }
}

/// Backend selection for a term dictionary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum DictionaryConfig {
    /// Heap hash map that grows on demand.
    Growable {
        /// Pre-reserved entries.
        initial_capacity: usize,
    },
    /// Presized open-addressing table. Must be sized for the whole vocabulary.
    FixedCapacity { capacity: usize },
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        DictionaryConfig::Growable {
            initial_capacity: 1 << 16,
        }
    }
}

/// Constructs dictionary backends from configuration.
pub struct DictionaryFactory;

impl DictionaryFactory {
    pub fn create(config: &DictionaryConfig) -> Result<Box<dyn TermDictionary>> {
        match config {
            DictionaryConfig::Growable { initial_capacity } => {
                Ok(Box::new(GrowableDictionary::with_capacity(*initial_capacity)))
            }
            DictionaryConfig::FixedCapacity { capacity } => {
                if *capacity == 0 {
                    return Err(TesseraError::config(
                        "fixed-capacity dictionary needs a non-zero capacity",
                    ));
                }
                Ok(Box::new(FixedCapacityDictionary::new(*capacity)?))
            }
        }
    }
}

/// One-way 64-bit token hash of a term, as used for journal term ids.
///
/// FNV-1a over the UTF-8 bytes followed by a 64-bit finalizer to spread
/// short keys across all bits.
pub fn hash_term(term: &str) -> i64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &byte in term.as_bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    mix64(hash) as i64
}

/// The murmur3 64-bit finalizer.
pub(crate) fn mix64(mut h: u64) -> u64 {
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    h ^= h >> 33;
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_idempotence(dict: &dyn TermDictionary) {
        let a = dict.put(0x1234).unwrap();
        let b = dict.put(-99).unwrap();
        assert_eq!(a, 0);
        assert_eq!(b, 1);

        assert_eq!(dict.put(0x1234).unwrap(), a);
        assert_eq!(dict.get(0x1234), a);
        assert_eq!(dict.get(-99), b);
        assert_eq!(dict.get(777), NOT_FOUND);
        assert!(!dict.contains(777));
        assert_eq!(dict.len(), 2);
    }

    #[test]
    fn test_growable_idempotence() {
        let dict = DictionaryFactory::create(&DictionaryConfig::default()).unwrap();
        check_idempotence(dict.as_ref());
    }

    #[test]
    fn test_fixed_capacity_idempotence() {
        let dict =
            DictionaryFactory::create(&DictionaryConfig::FixedCapacity { capacity: 100 }).unwrap();
        check_idempotence(dict.as_ref());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = DictionaryFactory::create(&DictionaryConfig::FixedCapacity { capacity: 0 });
        assert!(matches!(result, Err(TesseraError::Config(_))));
    }

    #[test]
    fn test_hash_term_is_stable() {
        assert_eq!(hash_term("search"), hash_term("search"));
        assert_ne!(hash_term("search"), hash_term("Search"));
        assert_ne!(hash_term(""), hash_term(" "));
    }

    #[test]
    fn test_config_json() {
        let config: DictionaryConfig =
            serde_json::from_str(r#"{"type": "FixedCapacity", "capacity": 5000}"#).unwrap();
        assert_eq!(config, DictionaryConfig::FixedCapacity { capacity: 5000 });
    }
}
