//! Tree lookups.

use crate::btree::context::{BTreeContext, BTreeLayout};
use crate::btree::{HEADER_WORDS, NOT_FOUND};
use crate::error::{Result, TesseraError};

/// A read-only view of one tree inside a word array.
#[derive(Debug, Clone)]
pub struct BTreeReader<'a> {
    tree: &'a [i64],
    ctx: BTreeContext,
    layout: BTreeLayout,
}

impl<'a> BTreeReader<'a> {
    /// Open the tree written at word `offset` of `array` with context `ctx`.
    /// Fails if the header disagrees with the context or the tree is
    /// truncated.
    pub fn new(array: &'a [i64], offset: usize, ctx: BTreeContext) -> Result<Self> {
        let header = array
            .get(offset..offset.saturating_add(HEADER_WORDS))
            .filter(|h| h.len() == HEADER_WORDS)
            .ok_or_else(|| {
                TesseraError::index(format!("no tree header at offset {offset}"))
            })?;

        let num_entries = usize::try_from(header[1])
            .map_err(|_| TesseraError::index(format!("corrupt entry count {}", header[1])))?;
        let layout = ctx.layout(num_entries)?;

        if header[0] != ctx.format_word(layout.layers()) {
            return Err(TesseraError::index(format!(
                "tree at offset {offset} was written with a different format or context \
                 (header {:#x}, expected {:#x})",
                header[0],
                ctx.format_word(layout.layers())
            )));
        }
        if header[3] != layout.data_offset as i64 {
            return Err(TesseraError::index(format!(
                "tree at offset {offset} has data offset {}, expected {}",
                header[3], layout.data_offset
            )));
        }

        let tree = array
            .get(offset..offset + layout.total_words())
            .ok_or_else(|| TesseraError::index(format!("tree at offset {offset} is truncated")))?;

        Ok(BTreeReader { tree, ctx, layout })
    }

    pub fn context(&self) -> &BTreeContext {
        &self.ctx
    }

    pub fn num_entries(&self) -> usize {
        self.layout.num_entries
    }

    pub fn is_empty(&self) -> bool {
        self.layout.num_entries == 0
    }

    /// Words occupied by the whole tree.
    pub fn size_words(&self) -> usize {
        self.layout.total_words()
    }

    /// The flat entry block.
    pub fn entries(&self) -> &'a [i64] {
        &self.tree[self.layout.data_offset..]
    }

    /// Entry index of `key`, or [`NOT_FOUND`].
    pub fn find_entry(&self, key: i64) -> i64 {
        let block_size = self.ctx.block_size();
        let mut block = 0usize;

        for layer in 0..self.layout.layers() {
            let start = self.layout.layer_offsets[layer] + block * block_size;
            let keys = &self.tree[start..start + block_size];

            let slot = keys.partition_point(|&k| k < key);
            let child = block * block_size + slot;
            if slot == block_size || child >= self.layout.keys_in_layer(layer) {
                return NOT_FOUND;
            }
            block = child;
        }

        if block >= self.layout.data_blocks {
            return NOT_FOUND;
        }

        let entries_per_block = self.ctx.entries_per_block();
        let first = block * entries_per_block;
        let last = (first + entries_per_block).min(self.layout.num_entries);
        let entry_size = self.ctx.entry_size();
        let entries = self.entries();

        let (mut lo, mut hi) = (first, last);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let k = entries[mid * entry_size];
            if k < key {
                lo = mid + 1;
            } else if k > key {
                hi = mid;
            } else {
                return mid as i64;
            }
        }

        NOT_FOUND
    }

    pub fn contains(&self, key: i64) -> bool {
        self.find_entry(key) != NOT_FOUND
    }

    /// Key of entry `index`.
    pub fn key_at(&self, index: usize) -> i64 {
        self.entries()[index * self.ctx.entry_size()]
    }

    /// Values of entry `index`.
    pub fn values_at(&self, index: usize) -> &'a [i64] {
        let entry_size = self.ctx.entry_size();
        let start = index * entry_size;
        &self.entries()[start + 1..start + entry_size]
    }

    /// Values stored for `key`.
    pub fn get_values(&self, key: i64) -> Option<&'a [i64]> {
        match self.find_entry(key) {
            NOT_FOUND => None,
            index => Some(self.values_at(index as usize)),
        }
    }

    /// Value `value_idx` for each key, `None` where the key is absent.
    pub fn query_values(&self, keys: &[i64], value_idx: usize) -> Vec<Option<i64>> {
        debug_assert!(value_idx < self.ctx.value_arity);
        keys.iter()
            .map(|&key| self.get_values(key).map(|values| values[value_idx]))
            .collect()
    }

    /// Keep only the keys of `buffer` that are present in the tree.
    pub fn retain_entries(&self, buffer: &mut Vec<i64>) {
        buffer.retain(|&key| self.contains(key));
    }

    /// Drop the keys of `buffer` that are present in the tree.
    pub fn reject_entries(&self, buffer: &mut Vec<i64>) {
        buffer.retain(|&key| !self.contains(key));
    }

    /// All keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = i64> + use<'a> {
        self.entries()
            .chunks_exact(self.ctx.entry_size())
            .map(|entry| entry[0])
    }

    /// All `(key, values)` entries in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, &'a [i64])> + use<'a> {
        self.entries()
            .chunks_exact(self.ctx.entry_size())
            .map(|entry| (entry[0], &entry[1..]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btree::writer::write_to_vec;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn build(ctx: BTreeContext, keys: &[i64]) -> Vec<i64> {
        let entry_size = ctx.entry_size();
        write_to_vec(ctx, keys.len(), |entries| {
            for (i, &key) in keys.iter().enumerate() {
                entries[i * entry_size] = key;
                for v in 1..entry_size {
                    entries[i * entry_size + v] = key * 10 + v as i64;
                }
            }
            Ok(())
        })
        .unwrap()
    }

    #[test]
    fn test_empty_tree() {
        let ctx = BTreeContext::new(4, 1, 4).unwrap();
        let words = build(ctx, &[]);
        let reader = BTreeReader::new(&words, 0, ctx).unwrap();

        assert!(reader.is_empty());
        assert_eq!(reader.find_entry(0), NOT_FOUND);
        assert_eq!(reader.keys().count(), 0);
    }

    #[test]
    fn test_find_every_key_across_layers() {
        for &(bits, arity) in &[(2u32, 0usize), (3, 1), (4, 2), (6, 1)] {
            let ctx = BTreeContext::new(8, arity, bits).unwrap();
            let keys: Vec<i64> = (0..3000i64).map(|k| k * 3 - 4000).collect();
            let words = build(ctx, &keys);
            let reader = BTreeReader::new(&words, 0, ctx).unwrap();

            assert_eq!(reader.num_entries(), keys.len());
            for (i, &key) in keys.iter().enumerate() {
                assert_eq!(reader.find_entry(key), i as i64, "bits={bits} key={key}");
                assert_eq!(reader.find_entry(key + 1), NOT_FOUND);
            }
            assert_eq!(reader.find_entry(i64::MIN), NOT_FOUND);
            assert_eq!(reader.find_entry(i64::MAX), NOT_FOUND);
            assert_eq!(reader.find_entry(keys[keys.len() - 1] + 3), NOT_FOUND);
        }
    }

    #[test]
    fn test_extreme_keys() {
        let ctx = BTreeContext::new(8, 0, 2).unwrap();
        let keys = vec![i64::MIN, -1, 0, 1, i64::MAX - 1, i64::MAX];
        let words = build(ctx, &keys);
        let reader = BTreeReader::new(&words, 0, ctx).unwrap();

        for (i, &key) in keys.iter().enumerate() {
            assert_eq!(reader.find_entry(key), i as i64);
        }
    }

    #[test]
    fn test_values_and_queries() {
        let ctx = BTreeContext::new(4, 2, 4).unwrap();
        let words = build(ctx, &[2, 4, 6, 8]);
        let reader = BTreeReader::new(&words, 0, ctx).unwrap();

        assert_eq!(reader.get_values(6), Some(&[61, 62][..]));
        assert_eq!(reader.get_values(7), None);
        assert_eq!(reader.query_values(&[4, 5, 8], 1), vec![Some(42), None, Some(82)]);

        let mut buffer = vec![1, 2, 3, 4];
        reader.retain_entries(&mut buffer);
        assert_eq!(buffer, vec![2, 4]);

        let mut buffer = vec![1, 2, 3, 4];
        reader.reject_entries(&mut buffer);
        assert_eq!(buffer, vec![1, 3]);

        let collected: Vec<_> = reader.iter().map(|(k, v)| (k, v.to_vec())).collect();
        assert_eq!(collected[0], (2, vec![21, 22]));
    }

    #[test]
    fn test_context_mismatch_rejected() {
        let ctx = BTreeContext::new(4, 1, 4).unwrap();
        let words = build(ctx, &[1, 2, 3]);

        let other = BTreeContext::new(4, 2, 4).unwrap();
        assert!(BTreeReader::new(&words, 0, other).is_err());
        assert!(BTreeReader::new(&words[..words.len() - 1], 0, ctx).is_err());
        assert!(BTreeReader::new(&words, words.len(), ctx).is_err());
    }

    #[test]
    fn test_random_lookups() {
        let mut rng = StdRng::seed_from_u64(7);
        let ctx = BTreeContext::new(8, 1, 5).unwrap();

        let mut keys: Vec<i64> = (0..10_000).map(|_| rng.random_range(-1_000_000..1_000_000)).collect();
        keys.sort_unstable();
        keys.dedup();

        let words = build(ctx, &keys);
        let reader = BTreeReader::new(&words, 0, ctx).unwrap();

        for _ in 0..10_000 {
            let probe = rng.random_range(-1_000_000..1_000_000);
            let expected = keys.binary_search(&probe).map(|i| i as i64).unwrap_or(NOT_FOUND);
            assert_eq!(reader.find_entry(probe), expected);
        }
    }
}
