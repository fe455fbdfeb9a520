//! Output formatting for CLI commands.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cli::args::{OutputFormat, TesseraArgs};
use crate::error::Result;

/// What `inspect` reports for one document.
#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub doc_id: i64,
    pub domain_id: i32,
    pub ordinal: i32,
    pub rank: u8,
    pub year: i32,
    pub quality: u8,
    pub features: i32,
    pub size: i32,
    pub spans: Vec<SpanInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SpanInfo {
    pub code: String,
    pub ranges: Vec<(i32, i32)>,
}

/// Page statistics reported by `journal-info`.
#[derive(Debug, Serialize, Deserialize)]
pub struct JournalStats {
    pub path: String,
    pub pages: usize,
    pub documents: usize,
    pub terms: usize,
    pub positions: usize,
    pub domains: usize,
    pub size_bytes: u64,
}

/// Result of `journal-import`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ImportResult {
    pub journal: String,
    pub documents: usize,
    pub pages: usize,
    pub duration_ms: u64,
}

/// Output a result in the specified format.
pub fn output_result<T: Serialize>(message: &str, result: &T, args: &TesseraArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => output_human(message, result, args),
        OutputFormat::Json => output_json(result, args),
    }
}

fn output_human<T: Serialize>(message: &str, result: &T, args: &TesseraArgs) -> Result<()> {
    if args.verbosity() > 0 {
        println!("{message}");
        println!();
    }

    let value = serde_json::to_value(result)?;
    match value.get("results").and_then(Value::as_array) {
        Some(results) => output_search_results_human(&value, results),
        None => output_generic_human(&value),
    }
    Ok(())
}

fn output_search_results_human(value: &Value, results: &[Value]) {
    if results.is_empty() {
        println!("No results found.");
    }

    for (i, hit) in results.iter().enumerate() {
        let field = |name: &str| hit.get(name).and_then(Value::as_i64).unwrap_or(0);
        println!(
            "{:>3}. {:>8.4}  domain {} / ordinal {}  (id {})",
            i + 1,
            hit.get("score").and_then(Value::as_f64).unwrap_or(0.0),
            field("domain_id"),
            field("ordinal"),
            field("doc_id")
        );
    }

    println!();
    if let Some(candidates) = value.get("candidates").and_then(Value::as_u64) {
        println!("Candidates: {candidates}");
    }
    if let Some(timed_out) = value.get("timed_out").and_then(Value::as_u64)
        && timed_out > 0
    {
        println!("Dropped on timeout: {timed_out}");
    }
}

fn output_generic_human(value: &Value) {
    match value {
        Value::Object(obj) => {
            for (key, val) in obj {
                if key.ends_with("_bytes")
                    && let Some(bytes) = val.as_u64()
                {
                    println!("{key}: {}", format_bytes(bytes));
                } else {
                    println!("{key}: {}", format_value(val));
                }
            }
        }
        _ => println!("{}", format_value(value)),
    }
}

fn output_json<T: Serialize>(result: &T, args: &TesseraArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };

    println!("{json}");
    Ok(())
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(arr) => {
            let formatted = arr.iter().map(format_value).collect::<Vec<_>>().join(", ");
            format!("[{formatted}]")
        }
        Value::Object(obj) => {
            let formatted = obj
                .iter()
                .map(|(k, v)| format!("{k}={}", format_value(v)))
                .collect::<Vec<_>>()
                .join(" ");
            format!("{{{formatted}}}")
        }
        Value::Null => "null".to_string(),
    }
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    let unit = UNITS[unit_index];
    if unit_index == 0 {
        format!("{bytes} {unit}")
    } else {
        format!("{size:.1} {unit}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1.0 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1048576), "1.0 MB");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&json!([1, 2])), "[1, 2]");
        assert_eq!(format_value(&json!({"code": "title"})), "{code=title}");
        assert_eq!(format_value(&json!([[0, 4], [9, 12]])), "[[0, 4], [9, 12]]");
        assert_eq!(format_value(&Value::Null), "null");
    }
}
