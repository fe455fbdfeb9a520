//! Command implementations for the tessera CLI.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Instant;

use ahash::AHashSet;
use log::info;

use crate::cli::args::*;
use crate::cli::output::*;
use crate::config::IndexConfig;
use crate::dictionary::hash_term;
use crate::error::{Result, TesseraError};
use crate::forward::ForwardIndexReader;
use crate::id::{domain_id, encode_id, ordinal, remove_rank};
use crate::index::{SearchIndex, build_index};
use crate::journal::import::{import_jsonl, tokenize};
use crate::journal::{Journal, JournalWriter};
use crate::rankings::DomainRankings;
use crate::ranking::SearchQuery;
use crate::spans::code;

/// Execute a CLI command.
pub fn execute_command(args: TesseraArgs) -> Result<()> {
    match &args.command {
        Command::Build(build_args) => build(build_args, &args),
        Command::Inspect(inspect_args) => inspect(inspect_args, &args),
        Command::Search(search_args) => search(search_args, &args),
        Command::JournalInfo(info_args) => journal_info(info_args, &args),
        Command::JournalImport(import_args) => journal_import(import_args, &args),
    }
}

fn build(args: &BuildArgs, cli_args: &TesseraArgs) -> Result<()> {
    let config = IndexConfig::load_or_default(args.config.as_ref())?;
    let rankings = match &args.rankings {
        Some(path) => DomainRankings::load(path)?,
        None => DomainRankings::new(),
    };
    let journal = Journal::open(&args.journal)?;
    info!(
        "building {} from {} journal pages",
        args.index_dir.display(),
        journal.num_pages()
    );

    let report = build_index(&journal, &rankings, &config, &args.index_dir)?;
    output_result(
        &format!("Built index in {}", args.index_dir.display()),
        &report,
        cli_args,
    )
}

fn inspect(args: &InspectArgs, cli_args: &TesseraArgs) -> Result<()> {
    let doc_id = match (args.domain, args.ordinal, args.id) {
        (Some(domain), Some(ord), _) => encode_id(domain, ord),
        (_, _, Some(id)) => remove_rank(id),
        _ => {
            return Err(TesseraError::invalid_argument(
                "either --id or --domain with --ordinal is required",
            ));
        }
    };

    let config = IndexConfig::load_or_default(args.config.as_ref())?;
    let forward = ForwardIndexReader::open(&args.index_dir, &config.forward)?;

    let (Some(meta), Some(features), Some(size)) = (
        forward.doc_meta(doc_id),
        forward.html_features(doc_id),
        forward.document_size(doc_id),
    ) else {
        return Err(TesseraError::index(format!(
            "document {doc_id} ({}/{}) is not in the forward index",
            domain_id(doc_id),
            ordinal(doc_id)
        )));
    };

    let spans = forward
        .spans(doc_id)?
        .map(|spans| {
            spans
                .iter()
                .map(|span| SpanInfo {
                    code: code::name(span.code()).to_string(),
                    ranges: span.iter().collect(),
                })
                .collect()
        })
        .unwrap_or_default();

    let info = DocumentInfo {
        doc_id,
        domain_id: domain_id(doc_id),
        ordinal: ordinal(doc_id),
        rank: meta.rank(),
        year: meta.year(),
        quality: meta.quality(),
        features,
        size,
        spans,
    };
    output_result(&format!("Document {doc_id}"), &info, cli_args)
}

fn search(args: &SearchArgs, cli_args: &TesseraArgs) -> Result<()> {
    let mut seen = AHashSet::new();
    let terms: Vec<i64> = args
        .query
        .iter()
        .flat_map(|text| tokenize(text))
        .filter(|token| seen.insert(token.clone()))
        .map(|token| hash_term(&token))
        .collect();
    if terms.is_empty() {
        return Err(TesseraError::invalid_argument("query has no searchable terms"));
    }

    let config = IndexConfig::load_or_default(args.config.as_ref())?;
    let index = SearchIndex::open(&args.index_dir, config)?;

    let query = if args.any {
        SearchQuery::any_of(terms)
    } else {
        SearchQuery::all_of(terms)
    };

    let started = Instant::now();
    let results = index.search(&query, args.limit)?;
    info!("search finished in {:?}", started.elapsed());

    output_result(
        &format!("Results for \"{}\"", args.query.join(" ")),
        &results,
        cli_args,
    )
}

fn journal_info(args: &JournalInfoArgs, cli_args: &TesseraArgs) -> Result<()> {
    let journal = Journal::open(&args.journal)?;

    let mut stats = JournalStats {
        path: args.journal.display().to_string(),
        pages: journal.num_pages(),
        documents: 0,
        terms: 0,
        positions: 0,
        domains: 0,
        size_bytes: 0,
    };
    for path in journal.page_paths() {
        stats.size_bytes += std::fs::metadata(path)?.len();
    }

    let mut domains = AHashSet::new();
    journal.for_each_record(|record| {
        stats.documents += 1;
        stats.terms += record.terms.len();
        stats.positions += record.terms.iter().map(|t| t.positions.len()).sum::<usize>();
        domains.insert(domain_id(record.id));
        Ok(())
    })?;
    stats.domains = domains.len();

    output_result(&format!("Journal {}", stats.path), &stats, cli_args)
}

fn journal_import(args: &JournalImportArgs, cli_args: &TesseraArgs) -> Result<()> {
    let config = IndexConfig::load_or_default(args.config.as_ref())?;
    let page_size = args.page_size.unwrap_or(config.journal_page_size);

    let started = Instant::now();
    let input = open_input(&args.input)?;
    let mut writer = JournalWriter::create(&args.journal, page_size)?;
    let documents = import_jsonl(input, &mut writer)?;
    let pages = writer.finish()?;

    let result = ImportResult {
        journal: args.journal.display().to_string(),
        documents,
        pages,
        duration_ms: started.elapsed().as_millis() as u64,
    };
    output_result(
        &format!("Imported {}", args.input.display()),
        &result,
        cli_args,
    )
}

fn open_input(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).map_err(|e| {
        TesseraError::invalid_argument(format!("cannot open {}: {e}", path.display()))
    })?;
    Ok(BufReader::new(file))
}
