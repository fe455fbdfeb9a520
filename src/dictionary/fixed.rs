//! Fixed-capacity open-addressing dictionary in off-heap memory.
//!
//! The slot table holds `id + 1` (zero marks an empty slot); keys live in a
//! separate dense array indexed by id and split into fixed-size banks so no
//! single mapping grows without bound. The table size is the next prime at or
//! above the requested capacity and each key probes with its own stride
//! derived from the hash, which keeps clustering runs short.
//!
//! # Concurrency
//!
//! Reads are lock-free and always safe alongside one writer: a key is stored
//! before its slot is published with release ordering. Two writers inserting
//! the *same never-seen key* at the same time can both claim a slot and the
//! key then has two ids. The index builders use a single writer per
//! dictionary; any multi-writer use must add its own synchronization.

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use log::error;

use crate::dictionary::{NOT_FOUND, TermDictionary, mix64};
use crate::error::{Result, TesseraError};
use crate::storage::OffHeapBank;
use crate::util::prime::next_prime;

/// Keys per bank.
pub const DEFAULT_BANK_SIZE: usize = 1 << 20;

/// Probe lengths never drop below this on small tables.
const MIN_PROBE_LENGTH: usize = 16;

#[derive(Debug)]
struct KeyBank {
    /// Id of the bank's first key.
    start: usize,
    keys: OffHeapBank,
}

/// A presized dictionary. Exceeding its probe bound or id space fails with
/// [`TesseraError::CapacityExhausted`].
#[derive(Debug)]
pub struct FixedCapacityDictionary {
    table_size: usize,
    max_probe: usize,
    bank_size: usize,
    slots: OffHeapBank,
    banks: Vec<KeyBank>,
    next_id: AtomicUsize,
}

impl FixedCapacityDictionary {
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_bank_size(capacity, DEFAULT_BANK_SIZE)
    }

    pub fn with_bank_size(capacity: usize, bank_size: usize) -> Result<Self> {
        if bank_size == 0 {
            return Err(TesseraError::config("dictionary bank size must be non-zero"));
        }

        let table_size = next_prime(capacity as u64) as usize;
        if table_size > i32::MAX as usize {
            return Err(TesseraError::config(format!(
                "dictionary capacity {capacity} exceeds the term id range"
            )));
        }

        let max_probe = (table_size / 10).max(table_size.min(MIN_PROBE_LENGTH));
        let slots = OffHeapBank::new(table_size)?;

        let mut banks = Vec::with_capacity(table_size.div_ceil(bank_size));
        let mut start = 0;
        while start < table_size {
            let len = bank_size.min(table_size - start);
            banks.push(KeyBank {
                start,
                keys: OffHeapBank::new(len)?,
            });
            start += len;
        }

        Ok(FixedCapacityDictionary {
            table_size,
            max_probe,
            bank_size,
            slots,
            banks,
            next_id: AtomicUsize::new(0),
        })
    }

    /// Number of slots in the table.
    pub fn table_size(&self) -> usize {
        self.table_size
    }

    /// Upper bound on probes per lookup.
    pub fn max_probe(&self) -> usize {
        self.max_probe
    }

    pub fn bank_count(&self) -> usize {
        self.banks.len()
    }

    fn key_word(&self, id: usize) -> &AtomicI64 {
        let bank = &self.banks[id / self.bank_size];
        &bank.keys.words()[id - bank.start]
    }

    /// Starting slot and probe stride for `key`.
    fn probe_sequence(&self, key: i64) -> (usize, usize) {
        let hash = mix64(key as u64);
        let size = self.table_size as u64;
        let start = (hash % size) as usize;
        let stride = if size > 1 {
            1 + ((hash >> 32) % (size - 1)) as usize
        } else {
            1
        };
        (start, stride)
    }

    fn table_full(&self, key: i64) -> TesseraError {
        error!(
            "Dictionary table full: key {key} found no slot within {} probes (table size {}, {} ids)",
            self.max_probe,
            self.table_size,
            self.next_id.load(Ordering::Relaxed)
        );
        TesseraError::capacity_exhausted(format!(
            "dictionary of {} slots is full; presize it for the vocabulary",
            self.table_size
        ))
    }
}

impl TermDictionary for FixedCapacityDictionary {
    fn put(&self, key: i64) -> Result<i32> {
        let slots = self.slots.words();
        let (mut idx, stride) = self.probe_sequence(key);

        for _ in 0..self.max_probe {
            let value = slots[idx].load(Ordering::Acquire);

            if value == 0 {
                let id = self.next_id.fetch_add(1, Ordering::AcqRel);
                if id >= self.table_size {
                    return Err(self.table_full(key));
                }
                self.key_word(id).store(key, Ordering::Release);
                slots[idx].store(id as i64 + 1, Ordering::Release);
                return Ok(id as i32);
            }

            let id = (value - 1) as usize;
            if self.key_word(id).load(Ordering::Acquire) == key {
                return Ok(id as i32);
            }

            idx = (idx + stride) % self.table_size;
        }

        Err(self.table_full(key))
    }

    fn get(&self, key: i64) -> i32 {
        let slots = self.slots.words();
        let (mut idx, stride) = self.probe_sequence(key);

        for _ in 0..self.max_probe {
            let value = slots[idx].load(Ordering::Acquire);
            if value == 0 {
                return NOT_FOUND;
            }

            let id = (value - 1) as usize;
            if self.key_word(id).load(Ordering::Acquire) == key {
                return id as i32;
            }

            idx = (idx + stride) % self.table_size;
        }

        NOT_FOUND
    }

    fn len(&self) -> usize {
        self.next_id.load(Ordering::Acquire).min(self.table_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_table_size_is_prime() {
        let dict = FixedCapacityDictionary::new(1000).unwrap();
        assert_eq!(dict.table_size(), 1009);
        assert_eq!(dict.max_probe(), 100);
    }

    #[test]
    fn test_ids_span_banks() {
        let dict = FixedCapacityDictionary::with_bank_size(10_000, 1000).unwrap();
        assert_eq!(dict.bank_count(), 11);

        let keys: Vec<i64> = (0..5000i64).map(|k| k.wrapping_mul(0x9E37_79B9_7F4A_7C15u64 as i64)).collect();
        for (expected, &key) in keys.iter().enumerate() {
            assert_eq!(dict.put(key).unwrap(), expected as i32);
        }
        for (expected, &key) in keys.iter().enumerate() {
            assert_eq!(dict.get(key), expected as i32);
        }
        assert_eq!(dict.len(), 5000);
    }

    #[test]
    fn test_overfill_is_fatal() {
        let dict = FixedCapacityDictionary::new(50).unwrap();

        let mut assigned = HashSet::new();
        let mut failure = None;
        for key in 0..1000i64 {
            match dict.put(key) {
                Ok(id) => {
                    assert!(assigned.insert(id));
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        assert!(matches!(failure, Some(TesseraError::CapacityExhausted(_))));
        assert!(assigned.len() <= dict.table_size());
    }

    #[test]
    fn test_readers_alongside_single_writer() {
        let dict = Arc::new(FixedCapacityDictionary::new(100_000).unwrap());

        let readers: Vec<_> = (0..3)
            .map(|_| {
                let dict = Arc::clone(&dict);
                thread::spawn(move || {
                    for key in 0..20_000i64 {
                        let id = dict.get(key);
                        assert!(id == NOT_FOUND || id as i64 == key);
                    }
                })
            })
            .collect();

        for key in 0..20_000i64 {
            assert_eq!(dict.put(key).unwrap() as i64, key);
        }

        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(dict.get(19_999), 19_999);
    }
}
