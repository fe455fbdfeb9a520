//! Anonymous mapped memory outside the allocator.

use std::sync::atomic::AtomicI64;

use memmap2::MmapMut;

use crate::error::{Result, TesseraError};
use crate::storage::WORD_BYTES;

/// A zero-initialized, fixed-size block of words allocated with an anonymous
/// mapping and accessed through atomics, so readers and a writer can share it
/// without a lock.
#[derive(Debug)]
pub struct OffHeapBank {
    mmap: MmapMut,
    len: usize,
}

impl OffHeapBank {
    pub fn new(len: usize) -> Result<Self> {
        let bytes = len.max(1).checked_mul(WORD_BYTES).ok_or_else(|| {
            TesseraError::storage(format!("Bank of {len} words overflows the address space"))
        })?;
        let mmap = MmapMut::map_anon(bytes)
            .map_err(|e| TesseraError::storage(format!("Failed to map {bytes} bytes: {e}")))?;
        Ok(OffHeapBank { mmap, len })
    }

    pub fn words(&self) -> &[AtomicI64] {
        // SAFETY: the mapping is page aligned, at least `len` words long and
        // lives as long as `self`. AtomicI64 has the layout of i64 and all
        // access after construction goes through the atomics.
        unsafe { std::slice::from_raw_parts(self.mmap.as_ptr() as *const AtomicI64, self.len) }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_bank_is_zeroed_and_writable() {
        let bank = OffHeapBank::new(1024).unwrap();
        assert_eq!(bank.len(), 1024);
        assert!(bank.words().iter().all(|w| w.load(Ordering::Relaxed) == 0));

        bank.words()[1023].store(-7, Ordering::Release);
        assert_eq!(bank.words()[1023].load(Ordering::Acquire), -7);
    }
}
