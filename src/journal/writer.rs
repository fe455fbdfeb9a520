//! Journal page writer.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Result, TesseraError};
use crate::id::is_clean;
use crate::journal::{JournalPage, JournalRecord, page_file_name};

/// Writes records into numbered pages of `records_per_page` documents.
#[derive(Debug)]
pub struct JournalWriter {
    dir: PathBuf,
    records_per_page: usize,
    pending: Vec<JournalRecord>,
    pages_written: usize,
}

impl JournalWriter {
    /// Start a journal in `dir`, creating the directory if needed. Existing
    /// pages with the same numbers are overwritten.
    pub fn create<P: AsRef<Path>>(dir: P, records_per_page: usize) -> Result<Self> {
        if records_per_page == 0 {
            return Err(TesseraError::invalid_argument("records_per_page must be positive"));
        }
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        Ok(JournalWriter {
            dir,
            records_per_page,
            pending: Vec::with_capacity(records_per_page),
            pages_written: 0,
        })
    }

    pub fn append(&mut self, record: JournalRecord) -> Result<()> {
        if !is_clean(record.id) {
            return Err(TesseraError::journal(format!(
                "refusing to journal rank-encoded id {:#x}",
                record.id
            )));
        }
        self.pending.push(record);
        if self.pending.len() == self.records_per_page {
            self.write_page()?;
        }
        Ok(())
    }

    fn write_page(&mut self) -> Result<()> {
        let records = std::mem::take(&mut self.pending);
        let page = JournalPage::new(records);
        let path = self.dir.join(page_file_name(self.pages_written));

        let mut file = File::create(&path)?;
        file.write_all(&page.encode()?)?;
        file.sync_all()?;

        log::debug!("wrote journal page {} ({} records)", path.display(), page.len());
        self.pages_written += 1;
        Ok(())
    }

    /// Write any partial page and return the number of pages written.
    pub fn finish(mut self) -> Result<usize> {
        if !self.pending.is_empty() {
            self.write_page()?;
        }
        Ok(self.pages_written)
    }
}
