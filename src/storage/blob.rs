//! Append-only byte blobs.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use memmap2::{Mmap, MmapOptions};

use crate::error::{Result, TesseraError};

/// Buffered append-only writer. Offsets returned by [`BlobWriter::append`]
/// address the record from the start of the file.
#[derive(Debug)]
pub struct BlobWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    position: u64,
}

impl BlobWriter {
    /// Create (or truncate) the blob at `path`.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| {
                TesseraError::storage(format!("Failed to create {}: {e}", path.display()))
            })?;

        Ok(BlobWriter {
            path,
            writer: BufWriter::new(file),
            position: 0,
        })
    }

    /// Append `bytes`, returning the offset they were written at.
    pub fn append(&mut self, bytes: &[u8]) -> Result<u64> {
        let offset = self.position;
        self.writer.write_all(bytes)?;
        self.position += bytes.len() as u64;
        Ok(offset)
    }

    /// Current end of the blob.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush buffered bytes and fsync the file.
    pub fn force(mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| TesseraError::storage(format!("Failed to flush: {e}")))?;
        self.writer
            .get_ref()
            .sync_all()
            .map_err(|e| TesseraError::storage(format!("Failed to sync: {e}")))?;
        Ok(())
    }
}

/// A read-only, shared mapping of a blob.
#[derive(Debug)]
pub struct BlobFile {
    mmap: Option<Mmap>,
}

impl BlobFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            TesseraError::storage(format!("Failed to open {}: {e}", path.display()))
        })?;

        let mmap = if file.metadata()?.len() == 0 {
            None
        } else {
            let mmap = unsafe { MmapOptions::new().map(&file) }.map_err(|e| {
                TesseraError::storage(format!("Failed to mmap {}: {e}", path.display()))
            })?;
            Some(mmap)
        };

        Ok(BlobFile { mmap })
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }

    /// The bytes from `offset` to the end of the blob.
    pub fn slice_from(&self, offset: u64) -> Result<&[u8]> {
        let bytes = self.as_bytes();
        let offset = usize::try_from(offset)
            .ok()
            .filter(|&o| o <= bytes.len())
            .ok_or_else(|| {
                TesseraError::storage(format!(
                    "Blob offset {offset} out of bounds ({} bytes)",
                    bytes.len()
                ))
            })?;
        Ok(&bytes[offset..])
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
