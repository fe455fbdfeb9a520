//! One-pass tree construction.

use crate::btree::context::{BTreeContext, BTreeLayout};
use crate::error::{Result, TesseraError};

/// Writes trees of one context into a word array.
#[derive(Debug)]
pub struct BTreeWriter<'a> {
    array: &'a mut [i64],
    ctx: BTreeContext,
}

impl<'a> BTreeWriter<'a> {
    pub fn new(array: &'a mut [i64], ctx: BTreeContext) -> Self {
        BTreeWriter { array, ctx }
    }

    /// Write a tree of `num_entries` entries at word `offset`. Returns the
    /// number of words used.
    ///
    /// `fill` receives the entry area, exactly `num_entries * entry_size`
    /// words, and must populate it with entries in strictly ascending key
    /// order. That order is verified before the index is built.
    pub fn write<F>(&mut self, offset: usize, num_entries: usize, fill: F) -> Result<usize>
    where
        F: FnOnce(&mut [i64]) -> Result<()>,
    {
        let layout = self.ctx.layout(num_entries)?;
        let size = layout.total_words();

        let end = offset.checked_add(size).filter(|&end| end <= self.array.len());
        let Some(end) = end else {
            return Err(TesseraError::index(format!(
                "tree of {size} words at offset {offset} does not fit in {} words",
                self.array.len()
            )));
        };
        let tree = &mut self.array[offset..end];

        tree[0] = self.ctx.format_word(layout.layers());
        tree[1] = num_entries as i64;
        tree[2] = layout.layer_offsets.first().copied().unwrap_or(layout.data_offset) as i64;
        tree[3] = layout.data_offset as i64;

        let (index, entries) = tree.split_at_mut(layout.data_offset);
        fill(&mut *entries)?;

        check_ascending(entries, self.ctx.entry_size())?;
        build_index(index, entries, &self.ctx, &layout);

        Ok(size)
    }
}

/// Build a standalone tree in a freshly allocated vector.
pub fn write_to_vec<F>(ctx: BTreeContext, num_entries: usize, fill: F) -> Result<Vec<i64>>
where
    F: FnOnce(&mut [i64]) -> Result<()>,
{
    let mut words = vec![0i64; ctx.calculate_size(num_entries)?];
    BTreeWriter::new(&mut words, ctx).write(0, num_entries, fill)?;
    Ok(words)
}

fn check_ascending(entries: &[i64], entry_size: usize) -> Result<()> {
    let mut previous: Option<i64> = None;
    for (i, entry) in entries.chunks_exact(entry_size).enumerate() {
        let key = entry[0];
        if let Some(prev) = previous {
            if key <= prev {
                return Err(TesseraError::index(format!(
                    "tree keys must be strictly ascending: entry {i} has key {key} after {prev}"
                )));
            }
        }
        previous = Some(key);
    }
    Ok(())
}

/// Fill the index layers from the bottom up. `index` starts at the tree start
/// so layout offsets apply directly.
fn build_index(index: &mut [i64], entries: &[i64], ctx: &BTreeContext, layout: &BTreeLayout) {
    let layers = layout.layers();
    if layers == 0 {
        return;
    }

    let block_size = ctx.block_size();
    let entry_size = ctx.entry_size();
    let entries_per_block = ctx.entries_per_block();

    for layer in (0..layers).rev() {
        let start = layout.layer_offsets[layer];
        let words = layout.layer_blocks[layer] * block_size;
        index[start..start + words].fill(i64::MAX);

        for child in 0..layout.keys_in_layer(layer) {
            let max_key = if layer + 1 == layers {
                let last_entry = ((child + 1) * entries_per_block).min(layout.num_entries) - 1;
                entries[last_entry * entry_size]
            } else {
                let child_start = layout.layer_offsets[layer + 1];
                let last_key = ((child + 1) * block_size).min(layout.keys_in_layer(layer + 1)) - 1;
                index[child_start + last_key]
            };
            index[start + child] = max_key;
        }
    }
}
