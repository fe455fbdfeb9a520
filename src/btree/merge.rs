//! Linear-time merging of two trees.
//!
//! Entries of a built tree are already in key order, so a merge is a single
//! co-scan of both entry blocks. The output size is computed with a counting
//! scan first, then the output tree is written in one pass.

use crate::btree::reader::BTreeReader;
use crate::btree::writer::BTreeWriter;
use crate::btree::BTreeContext;
use crate::error::{Result, TesseraError};

/// Number of distinct keys in the union of `left` and `right`.
pub fn merged_entry_count(left: &BTreeReader<'_>, right: &BTreeReader<'_>) -> usize {
    let mut left_keys = left.keys().peekable();
    let mut right_keys = right.keys().peekable();
    let mut count = 0;

    loop {
        match (left_keys.peek(), right_keys.peek()) {
            (Some(&l), Some(&r)) => {
                if l <= r {
                    left_keys.next();
                }
                if r <= l {
                    right_keys.next();
                }
            }
            (Some(_), None) => {
                left_keys.next();
            }
            (None, Some(_)) => {
                right_keys.next();
            }
            (None, None) => break,
        }
        count += 1;
    }

    count
}

/// Write the key union of `left` and `right` as a keys-only tree at
/// `offset` of `out`. Values of the inputs are dropped. Returns the words
/// written.
pub fn merge_keys(
    left: &BTreeReader<'_>,
    right: &BTreeReader<'_>,
    out_ctx: BTreeContext,
    out: &mut [i64],
    offset: usize,
) -> Result<usize> {
    if out_ctx.value_arity != 0 {
        return Err(TesseraError::index(format!(
            "key merge needs a keys-only output context, got arity {}",
            out_ctx.value_arity
        )));
    }

    let count = merged_entry_count(left, right);
    BTreeWriter::new(out, out_ctx).write(offset, count, |entries| {
        let mut left_keys = left.keys().peekable();
        let mut right_keys = right.keys().peekable();

        for slot in entries.iter_mut() {
            *slot = match (left_keys.peek().copied(), right_keys.peek().copied()) {
                (Some(l), Some(r)) => {
                    if l <= r {
                        left_keys.next();
                    }
                    if r <= l {
                        right_keys.next();
                    }
                    l.min(r)
                }
                (Some(l), None) => {
                    left_keys.next();
                    l
                }
                (None, Some(r)) => {
                    right_keys.next();
                    r
                }
                (None, None) => {
                    return Err(TesseraError::index("merge ran out of keys early"));
                }
            };
        }
        Ok(())
    })
}

/// Write the union of `left` and `right` with values at `offset` of `out`.
///
/// Keys present in only one input keep their values. For a key present in
/// both, each value slot becomes `combine(left_value, right_value)`. All
/// three trees must share the same value arity. Returns the words written.
pub fn merge_values<F>(
    left: &BTreeReader<'_>,
    right: &BTreeReader<'_>,
    out_ctx: BTreeContext,
    out: &mut [i64],
    offset: usize,
    combine: F,
) -> Result<usize>
where
    F: Fn(i64, i64) -> i64,
{
    let arity = out_ctx.value_arity;
    if left.context().value_arity != arity || right.context().value_arity != arity {
        return Err(TesseraError::index(format!(
            "value merge needs equal arities, got {} + {} -> {arity}",
            left.context().value_arity,
            right.context().value_arity
        )));
    }

    let count = merged_entry_count(left, right);
    let entry_size = out_ctx.entry_size();

    BTreeWriter::new(out, out_ctx).write(offset, count, |entries| {
        let mut left_entries = left.iter().peekable();
        let mut right_entries = right.iter().peekable();

        for entry in entries.chunks_exact_mut(entry_size) {
            let next_left = left_entries.peek().map(|&(key, _)| key);
            let next_right = right_entries.peek().map(|&(key, _)| key);

            match (next_left, next_right) {
                (Some(l), Some(r)) if l == r => {
                    let (key, lv) = left_entries.next().unwrap_or((l, &[]));
                    let (_, rv) = right_entries.next().unwrap_or((r, &[]));
                    entry[0] = key;
                    for (slot, (&a, &b)) in entry[1..].iter_mut().zip(lv.iter().zip(rv)) {
                        *slot = combine(a, b);
                    }
                }
                (Some(l), r) if r.is_none_or(|r| l < r) => {
                    copy_entry(entry, left_entries.next());
                }
                (_, Some(_)) => {
                    copy_entry(entry, right_entries.next());
                }
                _ => return Err(TesseraError::index("merge ran out of entries early")),
            }
        }
        Ok(())
    })
}

fn copy_entry(out: &mut [i64], entry: Option<(i64, &[i64])>) {
    if let Some((key, values)) = entry {
        out[0] = key;
        out[1..].copy_from_slice(values);
    }
}

/// Merge two keys-only trees into a new vector.
pub fn merge_keys_to_vec(
    left: &BTreeReader<'_>,
    right: &BTreeReader<'_>,
    out_ctx: BTreeContext,
) -> Result<Vec<i64>> {
    let size = out_ctx.calculate_size(merged_entry_count(left, right))?;
    let mut out = vec![0i64; size];
    merge_keys(left, right, out_ctx, &mut out, 0)?;
    Ok(out)
}

/// Merge two trees with values into a new vector.
pub fn merge_values_to_vec<F>(
    left: &BTreeReader<'_>,
    right: &BTreeReader<'_>,
    out_ctx: BTreeContext,
    combine: F,
) -> Result<Vec<i64>>
where
    F: Fn(i64, i64) -> i64,
{
    let size = out_ctx.calculate_size(merged_entry_count(left, right))?;
    let mut out = vec![0i64; size];
    merge_values(left, right, out_ctx, &mut out, 0, combine)?;
    Ok(out)
}
