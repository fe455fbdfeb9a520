//! Memory-mapped reverse index lookups.

use std::path::Path;

use crate::btree::{BTreeContext, BTreeReader};
use crate::error::{Result, TesseraError};
use crate::metadata::TermMetadata;
use crate::reverse::{ReverseIndexConfig, ReverseIndexFiles, ReverseIndexKind};
use crate::storage::{BlobFile, LongArrayFile};
use crate::util::budget::QueryBudget;
use crate::util::varint::decode_delta_list;

/// Read-only view of one reverse index.
///
/// Document ids going in and out are rank-encoded, as stored in the
/// postings.
#[derive(Debug)]
pub struct ReverseIndexReader {
    kind: ReverseIndexKind,
    words: LongArrayFile,
    docs: LongArrayFile,
    positions: BlobFile,
    words_ctx: BTreeContext,
    docs_ctx: BTreeContext,
    num_terms: usize,
}

impl ReverseIndexReader {
    pub fn open<P: AsRef<Path>>(
        dir: P,
        kind: ReverseIndexKind,
        config: &ReverseIndexConfig,
    ) -> Result<Self> {
        config.validate()?;
        let files = ReverseIndexFiles::in_dir(dir, kind);

        let words = LongArrayFile::open(&files.words)?;
        let docs = LongArrayFile::open(&files.docs)?;
        let positions = BlobFile::open(&files.positions)?;

        let num_terms = BTreeReader::new(words.as_slice(), 0, config.words_tree)?.num_entries();

        log::debug!(
            "opened {kind} reverse index: {num_terms} terms, {} docs words",
            docs.len()
        );

        Ok(ReverseIndexReader {
            kind,
            words,
            docs,
            positions,
            words_ctx: config.words_tree,
            docs_ctx: config.docs_tree,
            num_terms,
        })
    }

    pub fn kind(&self) -> ReverseIndexKind {
        self.kind
    }

    pub fn num_terms(&self) -> usize {
        self.num_terms
    }

    fn words_tree(&self) -> Result<BTreeReader<'_>> {
        BTreeReader::new(self.words.as_slice(), 0, self.words_ctx)
    }

    /// The docs tree of `term_id`, `None` if the term is not indexed.
    pub fn docs_tree(&self, term_id: i64) -> Result<Option<BTreeReader<'_>>> {
        let Some(values) = self.words_tree()?.get_values(term_id) else {
            return Ok(None);
        };
        let offset = usize::try_from(values[0])
            .map_err(|_| TesseraError::index(format!("corrupt docs offset {}", values[0])))?;
        Ok(Some(BTreeReader::new(self.docs.as_slice(), offset, self.docs_ctx)?))
    }

    /// Documents containing `term_id`.
    pub fn num_documents(&self, term_id: i64) -> Result<usize> {
        Ok(self.docs_tree(term_id)?.map_or(0, |tree| tree.num_entries()))
    }

    /// Ascending rank-encoded ids of the documents containing `term_id`.
    pub fn documents(&self, term_id: i64) -> Result<Vec<i64>> {
        Ok(self
            .docs_tree(term_id)?
            .map(|tree| tree.keys().collect())
            .unwrap_or_default())
    }

    /// Term metadata of `term_id` in each of `doc_ids`, `None` where the
    /// document does not contain the term.
    pub fn term_metadata(&self, term_id: i64, doc_ids: &[i64]) -> Result<Vec<Option<TermMetadata>>> {
        let Some(tree) = self.docs_tree(term_id)? else {
            return Ok(vec![None; doc_ids.len()]);
        };
        Ok(tree
            .query_values(doc_ids, 0)
            .into_iter()
            .map(|word| word.map(TermMetadata))
            .collect())
    }

    /// Positions of `term_id` in each of `doc_ids`. Fails with a timeout
    /// once `budget` is exhausted.
    pub fn positions(
        &self,
        term_id: i64,
        doc_ids: &[i64],
        budget: &QueryBudget,
    ) -> Result<Vec<Option<Vec<i32>>>> {
        let Some(tree) = self.docs_tree(term_id)? else {
            return Ok(vec![None; doc_ids.len()]);
        };

        let mut out = Vec::with_capacity(doc_ids.len());
        for offset in tree.query_values(doc_ids, 1) {
            budget.check("term positions")?;
            out.push(match offset {
                None => None,
                Some(offset) => Some(self.read_positions(offset)?),
            });
        }
        Ok(out)
    }

    fn read_positions(&self, offset: i64) -> Result<Vec<i32>> {
        let offset = u64::try_from(offset)
            .map_err(|_| TesseraError::index(format!("corrupt positions offset {offset}")))?;
        let (positions, _) = decode_delta_list(self.positions.slice_from(offset)?).map_err(|e| {
            TesseraError::index(format!("corrupt positions record at {offset}: {e}"))
        })?;
        Ok(positions)
    }

    /// All indexed term ids, ascending.
    pub fn term_ids(&self) -> Result<Vec<i64>> {
        Ok(self.words_tree()?.keys().collect())
    }
}
