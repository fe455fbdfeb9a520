//! Index generations.
//!
//! One index directory holds a forward index, a full reverse index and
//! optionally a priority reverse index, all built from the same journal.
//! [`SearchIndex`] opens such a directory; [`IndexGenerations`] serves the
//! current one and swaps in the next after it has been loaded completely on
//! a background thread.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{error, info};
use parking_lot::RwLock;
use serde::Serialize;

use crate::config::IndexConfig;
use crate::error::{Result, TesseraError};
use crate::forward::{ForwardIndexConverter, ForwardIndexFiles, ForwardIndexReader, ForwardIndexStats};
use crate::journal::Journal;
use crate::rankings::DomainRankings;
use crate::ranking::{ResultRanker, SearchQuery, SearchResults};
use crate::reverse::{
    ReverseIndexBuilder, ReverseIndexFiles, ReverseIndexKind, ReverseIndexReader,
    ReverseIndexStats,
};
use crate::util::budget::QueryBudget;

/// What [`build_index`] produced.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BuildReport {
    pub documents: usize,
    pub journal_records: usize,
    pub full_terms: usize,
    pub full_postings: usize,
    pub priority_terms: usize,
    pub priority_postings: usize,
    pub duration_ms: u64,
}

impl BuildReport {
    fn new(
        forward: ForwardIndexStats,
        full: ReverseIndexStats,
        priority: ReverseIndexStats,
        started: Instant,
    ) -> Self {
        BuildReport {
            documents: forward.documents,
            journal_records: forward.records,
            full_terms: full.terms,
            full_postings: full.postings,
            priority_terms: priority.terms,
            priority_postings: priority.postings,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }
}

/// Build all index files of `out_dir` from `journal`.
pub fn build_index<P: AsRef<Path>>(
    journal: &Journal,
    rankings: &DomainRankings,
    config: &IndexConfig,
    out_dir: P,
) -> Result<BuildReport> {
    let out_dir = out_dir.as_ref();
    config.validate()?;
    std::fs::create_dir_all(out_dir)?;
    let started = Instant::now();

    let forward = ForwardIndexConverter::new(journal, rankings, out_dir).convert()?;
    let full = ReverseIndexBuilder::new(
        journal,
        rankings,
        &config.reverse,
        ReverseIndexKind::Full,
        out_dir,
    )
    .build()?;
    let priority = ReverseIndexBuilder::new(
        journal,
        rankings,
        &config.reverse,
        ReverseIndexKind::Priority,
        out_dir,
    )
    .build()?;

    Ok(BuildReport::new(forward, full, priority, started))
}

/// The readers of one index directory.
#[derive(Debug)]
pub struct SearchIndex {
    dir: PathBuf,
    config: IndexConfig,
    forward: ForwardIndexReader,
    full: ReverseIndexReader,
    priority: Option<ReverseIndexReader>,
}

impl SearchIndex {
    pub fn open<P: AsRef<Path>>(dir: P, config: IndexConfig) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();

        if !ForwardIndexFiles::in_dir(&dir).exist() {
            return Err(TesseraError::index(format!(
                "{} has no forward index",
                dir.display()
            )));
        }

        let forward = ForwardIndexReader::open(&dir, &config.forward)?;
        let full = ReverseIndexReader::open(&dir, ReverseIndexKind::Full, &config.reverse)?;
        let priority = if ReverseIndexFiles::in_dir(&dir, ReverseIndexKind::Priority).exist() {
            Some(ReverseIndexReader::open(
                &dir,
                ReverseIndexKind::Priority,
                &config.reverse,
            )?)
        } else {
            None
        };

        Ok(SearchIndex {
            dir,
            config,
            forward,
            full,
            priority,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn forward(&self) -> &ForwardIndexReader {
        &self.forward
    }

    pub fn full(&self) -> &ReverseIndexReader {
        &self.full
    }

    pub fn priority(&self) -> Option<&ReverseIndexReader> {
        self.priority.as_ref()
    }

    pub fn ranker(&self) -> ResultRanker<'_> {
        let ranker = ResultRanker::new(&self.forward, &self.full, &self.config.ranking);
        match &self.priority {
            Some(priority) => ranker.with_priority_index(priority),
            None => ranker,
        }
    }

    /// Run `query` under the configured budget.
    pub fn search(&self, query: &SearchQuery, limit: usize) -> Result<SearchResults> {
        let budget = QueryBudget::new(self.config.query_budget());
        self.ranker().search(query, limit, &budget)
    }
}

/// Outcome of a generation switch, sent once the load thread finishes.
#[derive(Debug)]
pub enum SwitchEvent {
    Switched { dir: PathBuf, documents: usize },
    Failed { dir: PathBuf, error: String },
}

/// The index generation currently served.
///
/// Readers clone the `Arc` and keep using that generation for the whole
/// query, so a switch never affects a query in flight and no reader ever
/// sees a half-loaded generation.
#[derive(Debug)]
pub struct IndexGenerations {
    current: Arc<RwLock<Option<Arc<SearchIndex>>>>,
    config: IndexConfig,
    events_tx: Sender<SwitchEvent>,
    events_rx: Receiver<SwitchEvent>,
}

impl IndexGenerations {
    pub fn new(config: IndexConfig) -> Self {
        let (events_tx, events_rx) = unbounded();
        IndexGenerations {
            current: Arc::new(RwLock::new(None)),
            config,
            events_tx,
            events_rx,
        }
    }

    /// The generation being served, if any.
    pub fn current(&self) -> Option<Arc<SearchIndex>> {
        self.current.read().clone()
    }

    /// Load `dir` on a dedicated thread and make it current once complete.
    /// The outcome is also delivered on [`IndexGenerations::events`].
    pub fn switch_to<P: AsRef<Path>>(&self, dir: P) -> Result<JoinHandle<()>> {
        let dir = dir.as_ref().to_path_buf();
        let config = self.config.clone();
        let current = Arc::clone(&self.current);
        let events = self.events_tx.clone();

        let handle = thread::Builder::new()
            .name("index-loader".to_string())
            .spawn(move || {
                let started = Instant::now();
                let event = match SearchIndex::open(&dir, config) {
                    Ok(index) => {
                        let documents = index.forward().num_documents();
                        *current.write() = Some(Arc::new(index));
                        info!(
                            "switched to index generation {} ({documents} documents, loaded in {:?})",
                            dir.display(),
                            started.elapsed()
                        );
                        SwitchEvent::Switched { dir, documents }
                    }
                    Err(e) => {
                        error!("failed to load index generation {}: {e}", dir.display());
                        SwitchEvent::Failed {
                            dir,
                            error: e.to_string(),
                        }
                    }
                };
                let _ = events.send(event);
            })?;

        Ok(handle)
    }

    /// Switch events, in completion order.
    pub fn events(&self) -> &Receiver<SwitchEvent> {
        &self.events_rx
    }

    /// Run `query` against the current generation.
    pub fn search(&self, query: &SearchQuery, limit: usize) -> Result<SearchResults> {
        let index = self
            .current()
            .ok_or_else(|| TesseraError::index("no index generation loaded"))?;
        index.search(query, limit)
    }
}
