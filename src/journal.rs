//! The append-only document journal consumed by the index builders.
//!
//! A journal is a directory of pages named `page-NNNNN.dat`. Each page holds
//! a batch of documents as lock-step columns (ids, metadata words, feature
//! bitmaps, sizes, term occurrences, spans) behind a checksummed header.
//! Builders read every page in file-name order, usually twice.

pub mod import;
pub mod page;
pub mod writer;

use std::fs;
use std::path::{Path, PathBuf};

pub use page::JournalPage;
pub use writer::JournalWriter;

use crate::error::{Result, TesseraError};
use crate::metadata::{DocumentMetadata, WordFlags};
use crate::spans::DocumentSpans;

const PAGE_PREFIX: &str = "page-";
const PAGE_SUFFIX: &str = ".dat";

pub(crate) fn page_file_name(number: usize) -> String {
    format!("{PAGE_PREFIX}{number:05}{PAGE_SUFFIX}")
}

fn page_number(file_name: &str) -> Option<usize> {
    file_name
        .strip_prefix(PAGE_PREFIX)?
        .strip_suffix(PAGE_SUFFIX)?
        .parse()
        .ok()
}

/// One occurrence list of a term within a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalTerm {
    /// Token hash key of the term.
    pub term_id: i64,
    pub flags: WordFlags,
    /// Ascending token positions.
    pub positions: Vec<i32>,
}

impl JournalTerm {
    pub fn new(term_id: i64, flags: WordFlags, positions: Vec<i32>) -> Self {
        JournalTerm {
            term_id,
            flags,
            positions,
        }
    }
}

/// One document as it goes into the journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalRecord {
    /// Clean combined id.
    pub id: i64,
    pub metadata: DocumentMetadata,
    pub features: i32,
    pub size: i32,
    pub terms: Vec<JournalTerm>,
    pub spans: DocumentSpans,
}

/// A journal directory opened for reading.
#[derive(Debug, Clone)]
pub struct Journal {
    dir: PathBuf,
    pages: Vec<PathBuf>,
}

impl Journal {
    /// List the pages of the journal in `dir`, in page-number order.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let listing = fs::read_dir(&dir).map_err(|e| {
            TesseraError::journal(format!("cannot list journal {}: {e}", dir.display()))
        })?;

        let mut numbered = Vec::new();
        for entry in listing {
            let entry = entry?;
            let name = entry.file_name();
            if let Some(number) = name.to_str().and_then(page_number) {
                numbered.push((number, entry.path()));
            }
        }
        numbered.sort_unstable_by_key(|(number, _)| *number);

        let pages: Vec<PathBuf> = numbered.into_iter().map(|(_, path)| path).collect();
        log::debug!("opened journal {} with {} pages", dir.display(), pages.len());

        Ok(Journal { dir, pages })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn page_paths(&self) -> &[PathBuf] {
        &self.pages
    }

    pub fn num_pages(&self) -> usize {
        self.pages.len()
    }

    /// Read and validate every page in order. Pages are loaded lazily, one
    /// at a time.
    pub fn pages(&self) -> impl Iterator<Item = Result<JournalPage>> + '_ {
        self.pages.iter().map(JournalPage::read)
    }

    /// Call `f` for every record of every page, stopping at the first error.
    pub fn for_each_record<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&JournalRecord) -> Result<()>,
    {
        for page in self.pages() {
            for record in page?.records() {
                f(record)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::encode_id;
    use crate::spans::{DocumentSpan, code};
    use tempfile::TempDir;

    fn record(ordinal: i32) -> JournalRecord {
        JournalRecord {
            id: encode_id(7, ordinal),
            metadata: DocumentMetadata::new(0, 2020, 10, 0),
            features: ordinal,
            size: 100 + ordinal,
            terms: vec![JournalTerm::new(
                ordinal as i64 * 31,
                WordFlags::TITLE,
                vec![0, ordinal],
            )],
            spans: [DocumentSpan::new(code::TITLE, vec![0, 4]).unwrap()]
                .into_iter()
                .collect(),
        }
    }

    #[test]
    fn test_page_names() {
        assert_eq!(page_file_name(3), "page-00003.dat");
        assert_eq!(page_number("page-00003.dat"), Some(3));
        assert_eq!(page_number("page-123456.dat"), Some(123456));
        assert_eq!(page_number("page-x.dat"), None);
        assert_eq!(page_number("other-00001.dat"), None);
    }

    #[test]
    fn test_records_read_back_in_order() {
        let dir = TempDir::new().unwrap();
        let mut writer = JournalWriter::create(dir.path(), 4).unwrap();
        for ordinal in 1..=10 {
            writer.append(record(ordinal)).unwrap();
        }
        assert_eq!(writer.finish().unwrap(), 3);

        // stray files are ignored
        fs::write(dir.path().join("notes.txt"), b"hello").unwrap();

        let journal = Journal::open(dir.path()).unwrap();
        assert_eq!(journal.num_pages(), 3);

        let mut seen = Vec::new();
        journal
            .for_each_record(|r| {
                seen.push(r.clone());
                Ok(())
            })
            .unwrap();

        assert_eq!(seen, (1..=10).map(record).collect::<Vec<_>>());
    }

    #[test]
    fn test_missing_directory() {
        let dir = TempDir::new().unwrap();
        let err = Journal::open(dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, TesseraError::Journal(_)));
    }
}
