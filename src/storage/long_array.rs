//! Memory-mapped arrays of 64-bit words.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use memmap2::{Mmap, MmapMut, MmapOptions};

use crate::error::{Result, TesseraError};
use crate::storage::WORD_BYTES;

/// A read-only, shared mapping of a word array file.
#[derive(Debug)]
pub struct LongArrayFile {
    path: PathBuf,
    mmap: Option<Mmap>,
}

impl LongArrayFile {
    /// Map an existing word file read-only.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| {
            TesseraError::storage(format!("Failed to open {}: {e}", path.display()))
        })?;

        let len = file.metadata()?.len();
        if len % WORD_BYTES as u64 != 0 {
            return Err(TesseraError::storage(format!(
                "{} is {len} bytes, not a whole number of words",
                path.display()
            )));
        }

        // Zero-length files cannot be mapped on every platform.
        let mmap = if len == 0 {
            None
        } else {
            let mmap = unsafe { MmapOptions::new().map(&file) }.map_err(|e| {
                TesseraError::storage(format!("Failed to mmap {}: {e}", path.display()))
            })?;
            Some(mmap)
        };

        Ok(LongArrayFile { path, mmap })
    }

    /// The mapped words.
    pub fn as_slice(&self) -> &[i64] {
        match &self.mmap {
            None => &[],
            Some(mmap) => {
                // SAFETY: mappings are page aligned and any bit pattern is a valid i64.
                let (prefix, words, suffix) = unsafe { mmap[..].align_to::<i64>() };
                debug_assert!(prefix.is_empty() && suffix.is_empty());
                words
            }
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A writable mapping of a pre-sized word file.
///
/// The file is created (or truncated) at construction and sized to exactly
/// `len` words. [`LongArrayWriter::force`] flushes the mapping and fsyncs the
/// file; a writer dropped without being forced still flushes on a best-effort
/// basis, so an error path never leaves dirty pages unwritten.
#[derive(Debug)]
pub struct LongArrayWriter {
    path: PathBuf,
    file: File,
    mmap: Option<MmapMut>,
    forced: bool,
}

impl LongArrayWriter {
    /// Create a word file of `len` zeroed words.
    pub fn create<P: AsRef<Path>>(path: P, len: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| {
                TesseraError::storage(format!("Failed to create {}: {e}", path.display()))
            })?;

        file.set_len((len * WORD_BYTES) as u64)?;

        let mmap = if len == 0 {
            None
        } else {
            let mmap = unsafe { MmapOptions::new().map_mut(&file) }.map_err(|e| {
                TesseraError::storage(format!("Failed to mmap {}: {e}", path.display()))
            })?;
            Some(mmap)
        };

        Ok(LongArrayWriter {
            path,
            file,
            mmap,
            forced: false,
        })
    }

    pub fn as_slice(&self) -> &[i64] {
        match &self.mmap {
            None => &[],
            Some(mmap) => {
                // SAFETY: see LongArrayFile::as_slice.
                let (_, words, _) = unsafe { mmap[..].align_to::<i64>() };
                words
            }
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [i64] {
        match &mut self.mmap {
            None => &mut [],
            Some(mmap) => {
                // SAFETY: see LongArrayFile::as_slice.
                let (prefix, words, suffix) = unsafe { mmap[..].align_to_mut::<i64>() };
                debug_assert!(prefix.is_empty() && suffix.is_empty());
                words
            }
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush the mapping and fsync the file. The writer is consumed; the
    /// file is complete once this returns `Ok`.
    pub fn force(mut self) -> Result<()> {
        if let Some(mmap) = &self.mmap {
            mmap.flush().map_err(|e| {
                TesseraError::storage(format!("Failed to flush {}: {e}", self.path.display()))
            })?;
        }
        self.file.sync_all()?;
        self.forced = true;
        Ok(())
    }
}

impl Drop for LongArrayWriter {
    fn drop(&mut self) {
        if !self.forced {
            if let Some(mmap) = &self.mmap {
                let _ = mmap.flush();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_force_and_map() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("words.dat");

        let mut writer = LongArrayWriter::create(&path, 4).unwrap();
        writer.as_mut_slice().copy_from_slice(&[1, -2, i64::MAX, i64::MIN]);
        writer.force().unwrap();

        let array = LongArrayFile::open(&path).unwrap();
        assert_eq!(array.as_slice(), &[1, -2, i64::MAX, i64::MIN]);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 32);
    }

    #[test]
    fn test_empty_array() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty.dat");

        let writer = LongArrayWriter::create(&path, 0).unwrap();
        assert!(writer.is_empty());
        writer.force().unwrap();

        let array = LongArrayFile::open(&path).unwrap();
        assert!(array.is_empty());
    }

    #[test]
    fn test_rejects_partial_words() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("odd.dat");
        std::fs::write(&path, [0u8; 12]).unwrap();

        assert!(LongArrayFile::open(&path).is_err());
    }

    #[test]
    fn test_unforced_writer_flushes_on_drop() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("dropped.dat");

        {
            let mut writer = LongArrayWriter::create(&path, 2).unwrap();
            writer.as_mut_slice()[1] = 42;
        }

        let array = LongArrayFile::open(&path).unwrap();
        assert_eq!(array.as_slice(), &[0, 42]);
    }
}
