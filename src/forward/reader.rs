//! Memory-mapped forward index lookups.

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::error::{Result, TesseraError};
use crate::forward::{
    FEATURES_SIZE_OFFSET, ForwardIndexConfig, ForwardIndexFiles, METADATA_OFFSET, ROW_STRIDE,
    SPANS_OFFSET, unpack_features, unpack_size,
};
use crate::id::is_clean;
use crate::metadata::DocumentMetadata;
use crate::spans::DocumentSpans;
use crate::storage::{BlobFile, LongArrayFile};
use crate::util::budget::QueryBudget;

type IdMap = Arc<RwLock<Option<AHashMap<i64, u32>>>>;

/// Read-only view of one forward index.
///
/// Rows are found by binary search over the id file. When enabled in the
/// config, a background thread builds an id to row hash map right after
/// opening; lookups switch to it as soon as it is published.
#[derive(Debug)]
pub struct ForwardIndexReader {
    ids: Arc<LongArrayFile>,
    data: LongArrayFile,
    spans: BlobFile,
    id_map: IdMap,
}

impl ForwardIndexReader {
    pub fn open<P: AsRef<Path>>(dir: P, config: &ForwardIndexConfig) -> Result<Self> {
        let files = ForwardIndexFiles::in_dir(dir);

        let ids = Arc::new(LongArrayFile::open(&files.doc_ids)?);
        let data = LongArrayFile::open(&files.doc_data)?;
        let spans = BlobFile::open(&files.spans)?;

        if data.len() != ids.len() * ROW_STRIDE {
            return Err(TesseraError::index(format!(
                "forward index data has {} words, expected {} for {} documents",
                data.len(),
                ids.len() * ROW_STRIDE,
                ids.len()
            )));
        }

        let reader = ForwardIndexReader {
            ids,
            data,
            spans,
            id_map: Arc::new(RwLock::new(None)),
        };

        if config.background_id_map && !reader.ids.is_empty() {
            reader.spawn_id_map_builder();
        }

        Ok(reader)
    }

    fn spawn_id_map_builder(&self) {
        let ids = Arc::clone(&self.ids);
        let id_map = Arc::clone(&self.id_map);

        let spawned = thread::Builder::new()
            .name("fwd-id-map".to_string())
            .spawn(move || {
                let started = Instant::now();
                let words = ids.as_slice();
                let mut map = AHashMap::with_capacity(words.len());
                for (row, &id) in words.iter().enumerate() {
                    map.insert(id, row as u32);
                }
                *id_map.write() = Some(map);
                log::debug!(
                    "forward id map ready: {} ids in {:?}",
                    words.len(),
                    started.elapsed()
                );
            });

        if let Err(e) = spawned {
            log::warn!("could not start id map thread, staying on binary search: {e}");
        }
    }

    pub fn num_documents(&self) -> usize {
        self.ids.len()
    }

    /// All indexed document ids, ascending.
    pub fn doc_ids(&self) -> &[i64] {
        self.ids.as_slice()
    }

    pub fn is_id_map_ready(&self) -> bool {
        self.id_map.read().is_some()
    }

    /// Block until the background id map is published or `timeout` passes.
    pub fn wait_for_id_map(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.is_id_map_ready() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
        true
    }

    /// Row of `doc_id`, if indexed.
    pub fn row(&self, doc_id: i64) -> Option<usize> {
        debug_assert!(is_clean(doc_id), "forward index lookup with rank-encoded id {doc_id:#x}");

        if let Some(map) = self.id_map.read().as_ref() {
            return map.get(&doc_id).map(|&row| row as usize);
        }
        self.ids.as_slice().binary_search(&doc_id).ok()
    }

    fn word(&self, doc_id: i64, offset: usize) -> Option<i64> {
        self.row(doc_id)
            .map(|row| self.data.as_slice()[row * ROW_STRIDE + offset])
    }

    /// Metadata word with the domain rank as of the build.
    pub fn doc_meta(&self, doc_id: i64) -> Option<DocumentMetadata> {
        self.word(doc_id, METADATA_OFFSET).map(DocumentMetadata)
    }

    pub fn html_features(&self, doc_id: i64) -> Option<i32> {
        self.word(doc_id, FEATURES_SIZE_OFFSET).map(unpack_features)
    }

    pub fn document_size(&self, doc_id: i64) -> Option<i32> {
        self.word(doc_id, FEATURES_SIZE_OFFSET).map(unpack_size)
    }

    /// Spans of one document, `None` if it is not indexed.
    pub fn spans(&self, doc_id: i64) -> Result<Option<DocumentSpans>> {
        let Some(offset) = self.word(doc_id, SPANS_OFFSET) else {
            return Ok(None);
        };
        let offset = u64::try_from(offset)
            .map_err(|_| TesseraError::index(format!("negative spans offset {offset}")))?;
        let (spans, _) = DocumentSpans::decode(self.spans.slice_from(offset)?)?;
        Ok(Some(spans))
    }

    /// Spans of each of `doc_ids`, in order. Fails with
    /// [`TesseraError::Timeout`] as soon as `budget` is exhausted.
    pub fn document_spans(
        &self,
        budget: &QueryBudget,
        doc_ids: &[i64],
    ) -> Result<Vec<Option<DocumentSpans>>> {
        let mut out = Vec::with_capacity(doc_ids.len());
        for &doc_id in doc_ids {
            budget.check("document spans")?;
            out.push(self.spans(doc_id)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forward::ForwardIndexConverter;
    use crate::id::encode_id;
    use crate::journal::{Journal, JournalRecord, JournalWriter};
    use crate::metadata::WordFlags;
    use crate::rankings::DomainRankings;
    use crate::spans::{DocumentSpan, code};
    use tempfile::TempDir;

    fn doc(domain: i32, ordinal: i32, features: i32, size: i32) -> JournalRecord {
        JournalRecord {
            id: encode_id(domain, ordinal),
            metadata: DocumentMetadata::new(0, 2015, 20, 1),
            features,
            size,
            terms: vec![crate::journal::JournalTerm::new(1, WordFlags::NONE, vec![0])],
            spans: [DocumentSpan::new(code::TITLE, vec![2, 5]).unwrap()]
                .into_iter()
                .collect(),
        }
    }

    fn build(records: Vec<JournalRecord>, rankings: &DomainRankings) -> (TempDir, ForwardIndexFiles) {
        let dir = TempDir::new().unwrap();
        let journal_dir = dir.path().join("journal");
        let mut writer = JournalWriter::create(&journal_dir, 3).unwrap();
        for r in records {
            writer.append(r).unwrap();
        }
        writer.finish().unwrap();

        let journal = Journal::open(&journal_dir).unwrap();
        let converter = ForwardIndexConverter::new(&journal, rankings, dir.path());
        converter.convert().unwrap();
        let files = converter.files().clone();
        (dir, files)
    }

    #[test]
    fn test_lookup_by_binary_search() {
        let rankings = DomainRankings::from_ranks([(5, 17)]);
        let records = vec![doc(5, 2, 0x1, 10), doc(5, 1, 0x2, 20), doc(9, 1, 0x4, 30)];
        let (dir, files) = build(records, &rankings);
        assert!(files.exist());

        let config = ForwardIndexConfig {
            background_id_map: false,
        };
        let reader = ForwardIndexReader::open(dir.path(), &config).unwrap();
        assert_eq!(reader.num_documents(), 3);
        assert!(!reader.is_id_map_ready());

        assert_eq!(reader.doc_ids(), &[encode_id(5, 1), encode_id(5, 2), encode_id(9, 1)]);
        assert_eq!(reader.html_features(encode_id(5, 1)), Some(0x2));
        assert_eq!(reader.document_size(encode_id(9, 1)), Some(30));

        let meta = reader.doc_meta(encode_id(5, 2)).unwrap();
        assert_eq!(meta.rank(), 17);
        assert_eq!(meta.quality(), 20);
        assert_eq!(reader.doc_meta(encode_id(9, 1)).unwrap().rank(), crate::rankings::UNRANKED);

        assert_eq!(reader.doc_meta(encode_id(1, 1)), None);
        assert_eq!(reader.spans(encode_id(1, 1)).unwrap(), None);
    }

    #[test]
    fn test_background_id_map() {
        let rankings = DomainRankings::new();
        let records = (0..50).map(|i| doc(3, i, i, i * 2)).collect();
        let (dir, _) = build(records, &rankings);

        let reader = ForwardIndexReader::open(dir.path(), &ForwardIndexConfig::default()).unwrap();
        assert!(reader.wait_for_id_map(Duration::from_secs(10)));

        for i in 0..50 {
            assert_eq!(reader.row(encode_id(3, i)), Some(i as usize));
            assert_eq!(reader.document_size(encode_id(3, i)), Some(i * 2));
        }
        assert_eq!(reader.row(encode_id(3, 50)), None);
    }

    #[test]
    fn test_spans_under_budget() {
        let rankings = DomainRankings::new();
        let (dir, _) = build(vec![doc(1, 1, 0, 0), doc(1, 2, 0, 0)], &rankings);
        let reader = ForwardIndexReader::open(dir.path(), &ForwardIndexConfig::default()).unwrap();

        let ids = [encode_id(1, 2), encode_id(4, 4), encode_id(1, 1)];
        let spans = reader
            .document_spans(&QueryBudget::new(Duration::from_secs(10)), &ids)
            .unwrap();
        assert_eq!(spans.len(), 3);
        assert!(spans[1].is_none());
        let title = spans[0].as_ref().unwrap().title().unwrap();
        assert_eq!(title.ranges(), &[2, 5]);

        let err = reader
            .document_spans(&QueryBudget::expired(), &ids)
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn test_rebuild_replaces_previous_files() {
        let rankings = DomainRankings::new();
        let (dir, files) = build(vec![doc(1, 1, 0, 0), doc(1, 2, 0, 0)], &rankings);

        let journal_dir = dir.path().join("journal2");
        let mut writer = JournalWriter::create(&journal_dir, 8).unwrap();
        writer.append(doc(2, 7, 0, 99)).unwrap();
        writer.finish().unwrap();

        let journal = Journal::open(&journal_dir).unwrap();
        let stats = ForwardIndexConverter::new(&journal, &rankings, dir.path())
            .convert()
            .unwrap();
        assert_eq!(stats.documents, 1);
        assert!(files.exist());

        let reader = ForwardIndexReader::open(dir.path(), &ForwardIndexConfig::default()).unwrap();
        assert_eq!(reader.doc_ids(), &[encode_id(2, 7)]);
        assert_eq!(reader.document_size(encode_id(2, 7)), Some(99));
    }
}
