//! End-to-end tests: import, build, search and generation switching.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use tessera::config::IndexConfig;
use tessera::dictionary::hash_term;
use tessera::error::{Result, TesseraError};
use tessera::id::encode_id;
use tessera::index::{IndexGenerations, SearchIndex, SwitchEvent, build_index};
use tessera::journal::import::import_jsonl;
use tessera::journal::{Journal, JournalWriter};
use tessera::ranking::{CompiledQuery, SearchQuery};
use tessera::rankings::DomainRankings;
use tessera::util::budget::QueryBudget;

const DOCUMENTS: &str = r#"
{"domain_id": 1, "ordinal": 1, "title": "Rust programming", "text": "rust rust memory safety rust", "year": 2021}
{"domain_id": 2, "ordinal": 1, "title": "Cooking", "text": "a note on rust stains"}
{"domain_id": 3, "ordinal": 1, "title": "Gardening", "text": "soil water and sun", "subjects": ["garden"]}
"#;

fn build_from(dir: &Path, name: &str, documents: &str) -> Result<PathBuf> {
    let journal_dir = dir.join(format!("{name}-journal"));
    let mut writer = JournalWriter::create(&journal_dir, 2)?;
    import_jsonl(Cursor::new(documents), &mut writer)?;
    writer.finish()?;

    let index_dir = dir.join(name);
    let report = build_index(
        &Journal::open(&journal_dir)?,
        &DomainRankings::new(),
        &IndexConfig::default(),
        &index_dir,
    )?;
    assert!(report.documents > 0);
    Ok(index_dir)
}

fn terms(words: &[&str]) -> Vec<i64> {
    words.iter().map(|w| hash_term(w)).collect()
}

#[test]
fn test_ranked_search() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let index_dir = build_from(dir.path(), "gen-1", DOCUMENTS)?;
    let index = SearchIndex::open(&index_dir, IndexConfig::default())?;
    assert!(index.priority().is_some());

    let results = index.search(&SearchQuery::all_of(terms(&["rust"])), 10)?;
    assert_eq!(results.candidates, 2);
    assert_eq!(results.timed_out, 0);
    let ids: Vec<i64> = results.results.iter().map(|r| r.doc_id).collect();
    assert_eq!(ids, vec![encode_id(1, 1), encode_id(2, 1)]);
    assert!(results.results[0].score > results.results[1].score);
    assert_eq!(results.results[0].domain_id, 1);

    let limited = index.search(&SearchQuery::all_of(terms(&["rust"])), 1)?;
    assert_eq!(limited.results.len(), 1);
    assert_eq!(limited.results[0].doc_id, encode_id(1, 1));

    Ok(())
}

#[test]
fn test_boolean_expressions() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let index_dir = build_from(dir.path(), "gen-1", DOCUMENTS)?;
    let index = SearchIndex::open(&index_dir, IndexConfig::default())?;

    let both = index.search(&SearchQuery::all_of(terms(&["rust", "memory"])), 10)?;
    assert_eq!(both.results.len(), 1);
    assert_eq!(both.results[0].doc_id, encode_id(1, 1));

    let either = index.search(&SearchQuery::any_of(terms(&["memory", "stains"])), 10)?;
    assert_eq!(either.results.len(), 2);

    // (rust AND stains) OR garden
    let query = SearchQuery::new(
        terms(&["rust", "stains", "garden"]),
        CompiledQuery::Or(vec![
            CompiledQuery::And(vec![CompiledQuery::Leaf(0), CompiledQuery::Leaf(1)]),
            CompiledQuery::Leaf(2),
        ]),
    );
    let mut found: Vec<i64> = index.search(&query, 10)?.results.iter().map(|r| r.doc_id).collect();
    found.sort_unstable();
    assert_eq!(found, vec![encode_id(2, 1), encode_id(3, 1)]);

    let nothing = index.search(&SearchQuery::all_of(terms(&["nowhere"])), 10)?;
    assert!(nothing.results.is_empty());
    assert_eq!(nothing.candidates, 0);

    Ok(())
}

#[test]
fn test_expired_budget_drops_documents() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let index_dir = build_from(dir.path(), "gen-1", DOCUMENTS)?;
    let index = SearchIndex::open(&index_dir, IndexConfig::default())?;

    let query = SearchQuery::all_of(terms(&["rust"]));
    let ranker = index.ranker();
    let candidates = ranker.candidates(&query)?;
    assert_eq!(candidates.len(), 2);

    let results = ranker.rank_candidates(&query, &candidates, &QueryBudget::expired())?;
    assert!(results.results.is_empty());
    assert_eq!(results.timed_out, 2);

    Ok(())
}

#[test]
fn test_open_requires_index_files() {
    let dir = TempDir::new().unwrap();
    let err = SearchIndex::open(dir.path(), IndexConfig::default()).unwrap_err();
    assert!(matches!(err, TesseraError::Index(_)));
}

#[test]
fn test_generation_switch() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let first = build_from(dir.path(), "gen-1", DOCUMENTS)?;
    let second = build_from(
        dir.path(),
        "gen-2",
        r#"{"domain_id": 7, "ordinal": 3, "title": "Rust again", "text": "only rust here"}"#,
    )?;

    let generations = IndexGenerations::new(IndexConfig::default());
    assert!(generations.current().is_none());
    let query = SearchQuery::all_of(terms(&["rust"]));
    assert!(matches!(generations.search(&query, 10), Err(TesseraError::Index(_))));

    generations.switch_to(&first)?.join().unwrap();
    match generations.events().recv_timeout(Duration::from_secs(5)).unwrap() {
        SwitchEvent::Switched { dir, documents } => {
            assert_eq!(dir, first);
            assert_eq!(documents, 3);
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(generations.search(&query, 10)?.results.len(), 2);

    // a query holding the old generation keeps it across the switch
    let held = generations.current().unwrap();

    generations.switch_to(&second)?.join().unwrap();
    assert!(matches!(
        generations.events().recv_timeout(Duration::from_secs(5)).unwrap(),
        SwitchEvent::Switched { documents: 1, .. }
    ));
    let results = generations.search(&query, 10)?;
    assert_eq!(results.results.len(), 1);
    assert_eq!(results.results[0].doc_id, encode_id(7, 3));
    assert_eq!(held.search(&query, 10)?.results.len(), 2);

    generations.switch_to(dir.path().join("missing"))?.join().unwrap();
    assert!(matches!(
        generations.events().recv_timeout(Duration::from_secs(5)).unwrap(),
        SwitchEvent::Failed { .. }
    ));
    assert_eq!(generations.current().unwrap().dir(), second.as_path());

    Ok(())
}
