//! Heap-backed growable dictionary.

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::dictionary::{NOT_FOUND, TermDictionary};
use crate::error::{Result, TesseraError};

/// A dictionary over an `AHashMap`, guarded by a reader-writer lock.
#[derive(Debug, Default)]
pub struct GrowableDictionary {
    ids: RwLock<AHashMap<i64, i32>>,
}

impl GrowableDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        GrowableDictionary {
            ids: RwLock::new(AHashMap::with_capacity(capacity)),
        }
    }
}

impl TermDictionary for GrowableDictionary {
    fn put(&self, key: i64) -> Result<i32> {
        if let Some(&id) = self.ids.read().get(&key) {
            return Ok(id);
        }

        let mut ids = self.ids.write();
        let next = i32::try_from(ids.len()).map_err(|_| {
            TesseraError::capacity_exhausted("term ids exceed the i32 range")
        })?;
        Ok(*ids.entry(key).or_insert(next))
    }

    fn get(&self, key: i64) -> i32 {
        self.ids.read().get(&key).copied().unwrap_or(NOT_FOUND)
    }

    fn len(&self) -> usize {
        self.ids.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_sequential_ids() {
        let dict = GrowableDictionary::new();
        for key in (0..1000i64).map(|k| k * 7919 - 5000) {
            dict.put(key).unwrap();
        }
        for (expected, key) in (0..1000i64).map(|k| k * 7919 - 5000).enumerate() {
            assert_eq!(dict.get(key), expected as i32);
        }
        assert_eq!(dict.len(), 1000);
    }

    #[test]
    fn test_concurrent_writers_agree() {
        let dict = Arc::new(GrowableDictionary::new());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let dict = Arc::clone(&dict);
                thread::spawn(move || (0..500i64).map(|k| dict.put(k).unwrap()).collect::<Vec<_>>())
            })
            .collect();

        let results: Vec<Vec<i32>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(dict.len(), 500);
    }
}
