//! Journal to forward index conversion.

use std::path::Path;
use std::time::Instant;

use crate::error::{Result, TesseraError};
use crate::forward::{
    FEATURES_SIZE_OFFSET, ForwardIndexFiles, METADATA_OFFSET, ROW_STRIDE, SPANS_OFFSET,
    pack_features_size,
};
use crate::id::domain_id;
use crate::journal::Journal;
use crate::rankings::DomainRankings;
use crate::storage::{BlobWriter, LongArrayWriter, delete_if_exists};

/// What a conversion produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardIndexStats {
    pub documents: usize,
    pub records: usize,
    pub spans_bytes: u64,
}

/// Builds the forward index files of one directory from a journal.
#[derive(Debug)]
pub struct ForwardIndexConverter<'a> {
    journal: &'a Journal,
    rankings: &'a DomainRankings,
    files: ForwardIndexFiles,
}

impl<'a> ForwardIndexConverter<'a> {
    pub fn new<P: AsRef<Path>>(
        journal: &'a Journal,
        rankings: &'a DomainRankings,
        out_dir: P,
    ) -> Self {
        ForwardIndexConverter {
            journal,
            rankings,
            files: ForwardIndexFiles::in_dir(out_dir),
        }
    }

    pub fn files(&self) -> &ForwardIndexFiles {
        &self.files
    }

    /// Build the three files. Previous outputs are deleted before anything
    /// is written; every output is forced to disk before returning `Ok`.
    pub fn convert(&self) -> Result<ForwardIndexStats> {
        let started = Instant::now();
        for path in self.files.all() {
            delete_if_exists(path)?;
        }

        log::info!(
            "building forward index from {} journal pages",
            self.journal.num_pages()
        );

        let doc_ids = self.collect_doc_ids()?;

        let mut ids_writer = LongArrayWriter::create(&self.files.doc_ids, doc_ids.len())?;
        ids_writer.as_mut_slice().copy_from_slice(&doc_ids);

        let mut data_writer =
            LongArrayWriter::create(&self.files.doc_data, doc_ids.len() * ROW_STRIDE)?;
        let mut spans_writer = BlobWriter::create(&self.files.spans)?;

        let mut records = 0;
        let mut encoded = Vec::new();
        let data = data_writer.as_mut_slice();

        self.journal.for_each_record(|record| {
            let row = doc_ids.binary_search(&record.id).map_err(|_| {
                TesseraError::index(format!("document {:#x} vanished between passes", record.id))
            })?;

            let rank = self.rankings.ranking(domain_id(record.id));

            encoded.clear();
            record.spans.encode(&mut encoded);
            let spans_offset = spans_writer.append(&encoded)?;

            let base = row * ROW_STRIDE;
            data[base + METADATA_OFFSET] = record.metadata.with_rank(rank).0;
            data[base + FEATURES_SIZE_OFFSET] = pack_features_size(record.features, record.size);
            data[base + SPANS_OFFSET] = spans_offset as i64;

            records += 1;
            Ok(())
        })?;

        let stats = ForwardIndexStats {
            documents: doc_ids.len(),
            records,
            spans_bytes: spans_writer.position(),
        };

        ids_writer.force()?;
        data_writer.force()?;
        spans_writer.force()?;

        log::info!(
            "forward index: {} documents from {} records in {:?}",
            stats.documents,
            stats.records,
            started.elapsed()
        );

        Ok(stats)
    }

    /// All distinct document ids in ascending order.
    fn collect_doc_ids(&self) -> Result<Vec<i64>> {
        let mut ids = Vec::new();
        self.journal.for_each_record(|record| {
            ids.push(record.id);
            Ok(())
        })?;
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }
}
