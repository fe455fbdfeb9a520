//! Journal records from JSON documents.
//!
//! Stands in for the upstream document processing so that journals can be
//! produced from plain text. Each input line is one [`JsonDocument`]; title
//! tokens come first in the position space and form the title span.

use std::io::BufRead;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::dictionary::hash_term;
use crate::error::{Result, TesseraError};
use crate::id::encode_id;
use crate::journal::{JournalRecord, JournalTerm, JournalWriter};
use crate::metadata::{DocumentMetadata, WordFlags};
use crate::spans::{DocumentSpan, DocumentSpans, code};

/// Terms occurring at least this often are flagged [`WordFlags::TF_IDF_HIGH`].
const FREQUENT_TERM_COUNT: usize = 3;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonDocument {
    pub domain_id: i32,
    pub ordinal: i32,
    pub title: String,
    pub text: String,
    /// Subject keywords, flagged [`WordFlags::SUBJECTS`].
    pub subjects: Vec<String>,
    /// Words of the site's domain name, flagged [`WordFlags::URL_DOMAIN`].
    pub domain_words: Vec<String>,
    pub year: i32,
    pub quality: u8,
    pub features: i32,
}

/// Lowercased alphanumeric tokens of `text`.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

impl JsonDocument {
    pub fn to_record(&self) -> Result<JournalRecord> {
        let title = tokenize(&self.title);
        let body = tokenize(&self.text);

        let mut occurrences: AHashMap<&str, (WordFlags, Vec<i32>)> = AHashMap::new();
        for (position, token) in title.iter().chain(&body).enumerate() {
            let entry = occurrences.entry(token.as_str()).or_default();
            if position < title.len() {
                entry.0 |= WordFlags::TITLE;
            }
            entry.1.push(position as i32);
        }

        let subjects: Vec<String> = self.subjects.iter().flat_map(|s| tokenize(s)).collect();
        let domain_words: Vec<String> = self.domain_words.iter().flat_map(|s| tokenize(s)).collect();
        for (words, flag) in [(&subjects, WordFlags::SUBJECTS), (&domain_words, WordFlags::URL_DOMAIN)] {
            for word in words {
                occurrences.entry(word.as_str()).or_default().0 |= flag;
            }
        }

        let mut terms: Vec<JournalTerm> = occurrences
            .into_iter()
            .map(|(token, (mut flags, positions))| {
                if positions.len() >= FREQUENT_TERM_COUNT {
                    flags |= WordFlags::TF_IDF_HIGH;
                }
                JournalTerm::new(hash_term(token), flags, positions)
            })
            .collect();
        terms.sort_unstable_by_key(|t| t.term_id);

        let mut spans = DocumentSpans::new();
        if !title.is_empty() {
            spans.insert(DocumentSpan::new(code::TITLE, vec![0, title.len() as i32])?);
        }

        let size = i32::try_from(title.len() + body.len())
            .map_err(|_| TesseraError::invalid_argument("document too long"))?;

        Ok(JournalRecord {
            id: encode_id(self.domain_id, self.ordinal),
            metadata: DocumentMetadata::new(0, self.year, self.quality, 0),
            features: self.features,
            size,
            terms,
            spans,
        })
    }
}

/// Append every JSON line of `input` to `writer`. Blank lines are skipped.
/// Returns the number of documents imported.
pub fn import_jsonl<R: BufRead>(input: R, writer: &mut JournalWriter) -> Result<usize> {
    let mut imported = 0;
    for (line_no, line) in input.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let doc: JsonDocument = serde_json::from_str(&line).map_err(|e| {
            TesseraError::invalid_argument(format!("line {}: {e}", line_no + 1))
        })?;
        writer.append(doc.to_record()?)?;
        imported += 1;
    }
    Ok(imported)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("Hello, World! rust-lang 2024"), vec!["hello", "world", "rust", "lang", "2024"]);
        assert!(tokenize("  ,;  ").is_empty());
    }

    #[test]
    fn test_document_to_record() {
        let doc = JsonDocument {
            domain_id: 4,
            ordinal: 2,
            title: "Rust Search".to_string(),
            text: "search engines in rust search fast".to_string(),
            subjects: vec!["engines".to_string()],
            year: 2022,
            ..Default::default()
        };
        let record = doc.to_record().unwrap();

        assert_eq!(record.id, encode_id(4, 2));
        assert_eq!(record.size, 8);
        assert_eq!(record.spans.title().unwrap().ranges(), &[0, 2]);
        assert_eq!(record.metadata.year(), 2022);

        let term = |w: &str| record.terms.iter().find(|t| t.term_id == hash_term(w)).unwrap();
        assert_eq!(term("search").positions, vec![1, 2, 6]);
        assert!(term("search").flags.contains(WordFlags::TITLE | WordFlags::TF_IDF_HIGH));
        assert_eq!(term("rust").positions, vec![0, 5]);
        assert!(term("engines").flags.contains(WordFlags::SUBJECTS));
        assert!(!term("fast").flags.contains(WordFlags::TITLE));
    }
}
