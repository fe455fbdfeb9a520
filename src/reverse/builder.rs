//! Journal to reverse index construction.

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::btree::BTreeWriter;
use crate::dictionary::DictionaryFactory;
use crate::error::{Result, TesseraError};
use crate::journal::Journal;
use crate::metadata::TermMetadata;
use crate::rankings::DomainRankings;
use crate::reverse::{
    ReverseIndexConfig, ReverseIndexFiles, ReverseIndexKind, ReverseIndexSegments,
    SegmentCounter,
};
use crate::storage::{BlobWriter, LongArrayWriter, delete_if_exists};
use crate::util::varint::encode_delta_list;

/// Words per scratch posting: doc id, metadata, positions offset.
const POSTING_WORDS: usize = 3;

/// What a build produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReverseIndexStats {
    pub terms: usize,
    /// Occurrences written in the construction pass.
    pub postings: usize,
    /// Docs tree entries after collapsing repeated documents.
    pub documents: usize,
    pub docs_words: usize,
}

/// Builds one reverse index (full or priority) from a journal.
#[derive(Debug)]
pub struct ReverseIndexBuilder<'a> {
    journal: &'a Journal,
    rankings: &'a DomainRankings,
    config: &'a ReverseIndexConfig,
    kind: ReverseIndexKind,
    files: ReverseIndexFiles,
}

impl<'a> ReverseIndexBuilder<'a> {
    pub fn new<P: AsRef<Path>>(
        journal: &'a Journal,
        rankings: &'a DomainRankings,
        config: &'a ReverseIndexConfig,
        kind: ReverseIndexKind,
        out_dir: P,
    ) -> Self {
        ReverseIndexBuilder {
            journal,
            rankings,
            config,
            kind,
            files: ReverseIndexFiles::in_dir(out_dir, kind),
        }
    }

    pub fn files(&self) -> &ReverseIndexFiles {
        &self.files
    }

    pub fn build(&self) -> Result<ReverseIndexStats> {
        self.config.validate()?;
        let started = Instant::now();

        for path in self.files.outputs() {
            delete_if_exists(path)?;
        }
        delete_if_exists(&self.files.scratch)?;

        log::info!(
            "building {} reverse index from {} journal pages",
            self.kind,
            self.journal.num_pages()
        );

        let segments = self.count_terms()?;
        log::debug!(
            "{} index: {} terms, {} postings",
            self.kind,
            segments.len(),
            segments.total()
        );

        let mut scratch =
            ScratchFile::create(&self.files.scratch, segments.total() * POSTING_WORDS)?;
        let mut positions = BlobWriter::create(&self.files.positions)?;

        self.construct(&segments, scratch.as_mut_slice(), &mut positions)?;

        let unique = collapse_segments(&segments, scratch.as_mut_slice());

        let mut stats = self.write_trees(&segments, scratch.as_slice(), &unique)?;
        stats.postings = segments.total();

        positions.force()?;
        scratch.remove()?;

        log::info!(
            "{} reverse index: {} terms, {} documents, {} postings in {:?}",
            self.kind,
            stats.terms,
            stats.documents,
            stats.postings,
            started.elapsed()
        );

        Ok(stats)
    }

    fn count_terms(&self) -> Result<ReverseIndexSegments> {
        let dictionary = DictionaryFactory::create(&self.config.dictionary)?;
        let mut counter = SegmentCounter::new(dictionary);

        self.journal.for_each_record(|record| {
            for term in &record.terms {
                if self.kind.accepts(term.flags, self.config.priority_flags) {
                    counter.add(term.term_id)?;
                }
            }
            Ok(())
        })?;

        Ok(counter.finish())
    }

    fn construct(
        &self,
        segments: &ReverseIndexSegments,
        postings: &mut [i64],
        positions: &mut BlobWriter,
    ) -> Result<()> {
        let mut constructor = segments.constructor(POSTING_WORDS);
        let mut encoded = Vec::new();

        self.journal.for_each_record(|record| {
            let doc_id = self.rankings.rank_encode(record.id);

            for term in &record.terms {
                if !self.kind.accepts(term.flags, self.config.priority_flags) {
                    continue;
                }

                encoded.clear();
                encode_delta_list(&mut encoded, &term.positions);
                let offset = positions.append(&encoded)?;

                let meta = TermMetadata::from_positions(term.flags, &term.positions);
                constructor.put_term(postings, term.term_id, &[doc_id, meta.0, offset as i64])?;
            }
            Ok(())
        })?;

        if !constructor.is_complete() {
            return Err(TesseraError::index(
                "postings segments were not filled; the journal changed between passes",
            ));
        }
        Ok(())
    }

    fn write_trees(
        &self,
        segments: &ReverseIndexSegments,
        postings: &[i64],
        unique: &[usize],
    ) -> Result<ReverseIndexStats> {
        let docs_ctx = self.config.docs_tree;
        let words_ctx = self.config.words_tree;

        let mut docs_words = 0;
        for &n in unique {
            docs_words += docs_ctx.calculate_size(n)?;
        }

        let mut docs_file = LongArrayWriter::create(&self.files.docs, docs_words)?;
        let mut tree_offsets = Vec::with_capacity(segments.len());
        {
            let mut writer = BTreeWriter::new(docs_file.as_mut_slice(), docs_ctx);
            let mut offset = 0;

            for (slot, range) in segments.iter().map(|(_, range)| range).enumerate() {
                let n = unique[slot];
                let source = &postings[range.start * POSTING_WORDS..][..n * POSTING_WORDS];

                let written = writer.write(offset, n, |entries| {
                    entries.copy_from_slice(source);
                    Ok(())
                })?;
                tree_offsets.push(offset as i64);
                offset += written;
            }
        }

        let terms = segments.term_ids();
        let mut words_file =
            LongArrayWriter::create(&self.files.words, words_ctx.calculate_size(terms.len())?)?;
        BTreeWriter::new(words_file.as_mut_slice(), words_ctx).write(
            0,
            terms.len(),
            |entries| {
                for (entry, (&term, &offset)) in
                    entries.chunks_exact_mut(2).zip(terms.iter().zip(&tree_offsets))
                {
                    entry[0] = term;
                    entry[1] = offset;
                }
                Ok(())
            },
        )?;

        docs_file.force()?;
        words_file.force()?;

        Ok(ReverseIndexStats {
            terms: terms.len(),
            postings: 0,
            documents: unique.iter().sum(),
            docs_words,
        })
    }
}

/// The postings scratch array. The file is deleted when the guard drops, so
/// a build that fails partway leaves no scratch behind.
struct ScratchFile {
    writer: Option<LongArrayWriter>,
    path: PathBuf,
}

impl ScratchFile {
    fn create(path: &Path, len: usize) -> Result<Self> {
        Ok(ScratchFile {
            writer: Some(LongArrayWriter::create(path, len)?),
            path: path.to_path_buf(),
        })
    }

    fn as_slice(&self) -> &[i64] {
        match &self.writer {
            Some(writer) => writer.as_slice(),
            None => &[],
        }
    }

    fn as_mut_slice(&mut self) -> &mut [i64] {
        match &mut self.writer {
            Some(writer) => writer.as_mut_slice(),
            None => &mut [],
        }
    }

    /// Unmap and delete the scratch, reporting a failed delete.
    fn remove(mut self) -> Result<()> {
        self.writer = None;
        delete_if_exists(&self.path)
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        self.writer = None;
        if let Err(e) = delete_if_exists(&self.path) {
            log::warn!("leaving scratch {}: {e}", self.path.display());
        }
    }
}

/// Sort every segment by document id and fold repeated documents into one
/// posting, moving the survivors to the front of the segment. Returns the
/// surviving count per segment.
///
/// A folded posting keeps the positions of its first occurrence and the
/// merged metadata of all of them.
fn collapse_segments(segments: &ReverseIndexSegments, postings: &mut [i64]) -> Vec<usize> {
    let mut unique = Vec::with_capacity(segments.len());
    let mut entries: Vec<[i64; POSTING_WORDS]> = Vec::new();

    for (_, range) in segments.iter() {
        let words = &mut postings[range.start * POSTING_WORDS..range.end * POSTING_WORDS];

        entries.clear();
        entries.extend(
            words
                .chunks_exact(POSTING_WORDS)
                .map(|c| [c[0], c[1], c[2]]),
        );
        entries.sort_by_key(|e| e[0]);
        entries.dedup_by(|next, kept| {
            if next[0] == kept[0] {
                kept[1] = TermMetadata(kept[1]).merge(TermMetadata(next[1])).0;
                true
            } else {
                false
            }
        });

        for (chunk, entry) in words.chunks_exact_mut(POSTING_WORDS).zip(&entries) {
            chunk.copy_from_slice(entry);
        }
        unique.push(entries.len());
    }

    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fail_after_scratch(path: &Path) -> Result<()> {
        let mut scratch = ScratchFile::create(path, 3 * POSTING_WORDS)?;
        scratch.as_mut_slice()[0] = 42;
        assert!(path.exists());
        Err(TesseraError::index("segment overflowed"))
    }

    #[test]
    fn test_scratch_deleted_on_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rev-postings.tmp");

        assert!(fail_after_scratch(&path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_scratch_remove() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rev-prio-postings.tmp");

        let mut scratch = ScratchFile::create(&path, 2).unwrap();
        scratch.as_mut_slice().copy_from_slice(&[7, 9]);
        assert_eq!(scratch.as_slice(), &[7, 9]);
        scratch.remove().unwrap();
        assert!(!path.exists());

        let empty = ScratchFile::create(&path, 0).unwrap();
        assert!(empty.as_slice().is_empty());
        drop(empty);
        assert!(!path.exists());
    }
}
