//! Table detection over extracted page text.
//!
//! Service manuals render error-code listings as either pipe-delimited
//! tables or whitespace-aligned columns. Detection is line-based: a run of
//! consecutive lines that split into the same number of columns is a table.

use crate::types::RawTable;
use once_cell::sync::Lazy;
use regex::Regex;

static COLUMN_GAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").expect("static regex"));

/// Minimum rows (including a header) for a run of lines to count as a table.
const MIN_ROWS: usize = 2;

/// Split a line into columns, preferring explicit pipes over aligned gaps.
fn split_columns(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    if trimmed.contains('|') {
        trimmed
            .trim_matches('|')
            .split('|')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect()
    } else {
        COLUMN_GAP
            .split(trimmed)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect()
    }
}

fn is_separator_row(cols: &[String]) -> bool {
    !cols.is_empty() && cols.iter().all(|c| c.chars().all(|ch| "-=:".contains(ch)))
}

/// Detect tables in one page of text.
pub fn detect_tables(page: usize, text: &str) -> Vec<RawTable> {
    let mut tables = Vec::new();
    let mut run: Vec<Vec<String>> = Vec::new();
    let mut run_width = 0usize;

    let mut flush = |run: &mut Vec<Vec<String>>| {
        if run.len() >= MIN_ROWS {
            let mut rows = std::mem::take(run);
            let headers = if rows.len() > 1 { rows.remove(0) } else { Vec::new() };
            if !rows.is_empty() {
                tables.push(RawTable {
                    page,
                    headers,
                    rows,
                    caption: None,
                });
            }
        } else {
            run.clear();
        }
    };

    for line in text.lines() {
        let cols = split_columns(line);
        if is_separator_row(&cols) {
            continue;
        }
        if cols.len() >= 2 && (run.is_empty() || cols.len() == run_width) {
            run_width = cols.len();
            run.push(cols);
        } else {
            flush(&mut run);
            if cols.len() >= 2 {
                run_width = cols.len();
                run.push(cols);
            } else {
                run_width = 0;
            }
        }
    }
    flush(&mut run);

    tables
}
