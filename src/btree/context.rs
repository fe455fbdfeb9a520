//! Tree shape parameters and layout arithmetic.

use serde::{Deserialize, Serialize};

use crate::btree::{FORMAT_VERSION, HEADER_WORDS};
use crate::error::{Result, TesseraError};

/// Shape of a family of trees. A tree must be read with the same context it
/// was written with; the header records it and the reader checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BTreeContext {
    /// Maximum number of index layers a tree may need.
    pub max_layers: usize,
    /// Values stored after each key.
    pub value_arity: usize,
    /// log2 of the block size in words; also the index branching degree.
    pub block_size_bits: u32,
}

impl BTreeContext {
    pub fn new(max_layers: usize, value_arity: usize, block_size_bits: u32) -> Result<Self> {
        let ctx = BTreeContext {
            max_layers,
            value_arity,
            block_size_bits,
        };
        ctx.validate()?;
        Ok(ctx)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=16).contains(&self.block_size_bits) {
            return Err(TesseraError::config(format!(
                "block_size_bits must be within 1..=16, got {}",
                self.block_size_bits
            )));
        }
        if self.value_arity > u16::MAX as usize {
            return Err(TesseraError::config("value arity too large"));
        }
        if self.block_size() < self.entry_size() {
            return Err(TesseraError::config(format!(
                "block of {} words cannot hold an entry of {} words",
                self.block_size(),
                self.entry_size()
            )));
        }
        Ok(())
    }

    /// Words per entry.
    pub fn entry_size(&self) -> usize {
        1 + self.value_arity
    }

    /// Words per block, and keys per index block.
    pub fn block_size(&self) -> usize {
        1 << self.block_size_bits
    }

    pub fn entries_per_block(&self) -> usize {
        self.block_size() / self.entry_size()
    }

    /// The first header word: format version and shape.
    pub(crate) fn format_word(&self, layers: usize) -> i64 {
        FORMAT_VERSION << 48
            | (self.value_arity as i64) << 32
            | (self.block_size_bits as i64) << 16
            | layers as i64
    }

    /// Compute where everything goes in a tree of `num_entries` entries.
    pub fn layout(&self, num_entries: usize) -> Result<BTreeLayout> {
        let block_size = self.block_size();
        let data_blocks = num_entries.div_ceil(self.entries_per_block());

        let mut layer_blocks = Vec::new();
        if data_blocks > 1 {
            let mut keys = data_blocks;
            loop {
                let blocks = keys.div_ceil(block_size);
                layer_blocks.push(blocks);
                if blocks == 1 {
                    break;
                }
                keys = blocks;
            }
        }
        layer_blocks.reverse();

        if layer_blocks.len() > self.max_layers {
            return Err(TesseraError::index(format!(
                "{num_entries} entries need {} index layers, context allows {}",
                layer_blocks.len(),
                self.max_layers
            )));
        }

        let mut layer_offsets = Vec::with_capacity(layer_blocks.len());
        let mut offset = HEADER_WORDS;
        for &blocks in &layer_blocks {
            layer_offsets.push(offset);
            offset += blocks * block_size;
        }

        Ok(BTreeLayout {
            num_entries,
            data_blocks,
            layer_blocks,
            layer_offsets,
            data_offset: offset,
            entry_size: self.entry_size(),
        })
    }

    /// Total words a tree of `num_entries` entries occupies.
    pub fn calculate_size(&self, num_entries: usize) -> Result<usize> {
        Ok(self.layout(num_entries)?.total_words())
    }
}

/// Word offsets of one tree's parts, relative to the tree start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BTreeLayout {
    pub num_entries: usize,
    pub data_blocks: usize,
    /// Blocks per index layer, top layer first.
    pub layer_blocks: Vec<usize>,
    pub layer_offsets: Vec<usize>,
    pub data_offset: usize,
    entry_size: usize,
}

impl BTreeLayout {
    pub fn layers(&self) -> usize {
        self.layer_blocks.len()
    }

    /// Keys held by index layer `layer` (the rest of its blocks is padding).
    pub fn keys_in_layer(&self, layer: usize) -> usize {
        if layer + 1 == self.layers() {
            self.data_blocks
        } else {
            self.layer_blocks[layer + 1]
        }
    }

    pub fn data_words(&self) -> usize {
        self.num_entries * self.entry_size
    }

    pub fn total_words(&self) -> usize {
        self.data_offset + self.data_words()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_contexts() {
        assert!(BTreeContext::new(4, 1, 0).is_err());
        assert!(BTreeContext::new(4, 1, 17).is_err());
        // 2-word blocks cannot hold a 3-word entry
        assert!(BTreeContext::new(4, 2, 1).is_err());
        assert!(BTreeContext::new(4, 2, 2).is_ok());
    }

    #[test]
    fn test_small_tree_has_no_index() {
        let ctx = BTreeContext::new(4, 1, 4).unwrap();
        assert_eq!(ctx.entries_per_block(), 8);

        let layout = ctx.layout(8).unwrap();
        assert_eq!(layout.layers(), 0);
        assert_eq!(layout.data_offset, HEADER_WORDS);
        assert_eq!(layout.total_words(), HEADER_WORDS + 16);

        let empty = ctx.layout(0).unwrap();
        assert_eq!(empty.data_blocks, 0);
        assert_eq!(empty.total_words(), HEADER_WORDS);
    }

    #[test]
    fn test_multi_layer_layout() {
        // 16-word blocks, keys only: 16 entries per data block, 16 keys per index block
        let ctx = BTreeContext::new(4, 0, 4).unwrap();
        let layout = ctx.layout(16 * 16 * 3).unwrap();

        assert_eq!(layout.data_blocks, 48);
        assert_eq!(layout.layer_blocks, vec![1, 3]);
        assert_eq!(layout.keys_in_layer(0), 3);
        assert_eq!(layout.keys_in_layer(1), 48);
        assert_eq!(layout.layer_offsets, vec![HEADER_WORDS, HEADER_WORDS + 16]);
        assert_eq!(layout.data_offset, HEADER_WORDS + 64);
    }

    #[test]
    fn test_max_layers_enforced() {
        let ctx = BTreeContext::new(1, 0, 1).unwrap();
        assert!(ctx.layout(4).is_ok());
        assert!(ctx.layout(5).is_err());
    }
}
