//! Delimited-text parsing with delimiter sniffing.
//!
//! The parser is lenient and never rejects malformed quoting.
//! A quote opens a quoted field when only whitespace precedes it in the
//! cell, so `Juan, "Ryu, Jr."` yields two cells. An unterminated quote
//! swallows the remainder of the input into a single field, and a quote
//! character after other text in an unquoted field is kept as literal text.
//! Callers that need strict validation must check the grid themselves.
//!
//! Empty lines are skipped wherever they occur. A file that starts with an
//! empty line therefore takes its header from the first non-empty line.

use crate::error::{Result, TipPoolError};
use crate::schema::Grid;
use csv::{ReaderBuilder, Terminator};
use log::debug;

const BYTE_ORDER_MARK: char = '\u{feff}';
const NON_BREAKING_SPACE: char = '\u{a0}';

/// Candidates in tie-break order: the first one wins on equal counts.
const DELIMITER_CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Picks the delimiter that occurs most often in the first line.
/// Falls back to a comma on ties and when no candidate occurs.
pub fn detect_delimiter(text: &str) -> u8 {
    let text = text.trim_start_matches(BYTE_ORDER_MARK);
    let first_line = text.split('\n').next().unwrap_or("");

    let mut best = b',';
    let mut best_count = 0usize;
    for &candidate in DELIMITER_CANDIDATES.iter() {
        let count = first_line.bytes().filter(|&b| b == candidate).count();
        if count > best_count {
            best = candidate;
            best_count = count;
        }
    }

    best
}

/// Splits text into rows of trimmed cells. Rows whose cells are all blank
/// are returned, empty lines are not; see [`parse_grid`] for the
/// header/body split.
pub fn parse_rows(text: &str) -> Result<Vec<Vec<String>>> {
    let stripped: String = text
        .trim_start_matches(BYTE_ORDER_MARK)
        .chars()
        .filter(|&c| c != '\r')
        .collect();
    let delimiter = detect_delimiter(&stripped);
    let cleaned = tighten_quotes(&stripped, delimiter as char);

    debug!(
        "Parsing {} bytes with delimiter {:?}",
        cleaned.len(),
        delimiter as char
    );

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .terminator(Terminator::Any(b'\n'))
        .from_reader(cleaned.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(clean_cell).collect());
    }

    Ok(rows)
}

/// Parses text into a header row plus non-blank body rows.
pub fn parse_grid(text: &str) -> Result<Grid> {
    let mut rows = parse_rows(text)?.into_iter();
    let header = rows.next().ok_or(TipPoolError::EmptyInput)?;

    let body: Vec<Vec<String>> = rows.filter(|row| !is_blank_row(row)).collect();

    debug!(
        "Parsed grid with {} columns and {} body rows",
        header.len(),
        body.len()
    );

    Ok(Grid { header, rows: body })
}

/// Drops whitespace between a cell boundary and an opening quote, so the
/// reader sees the quote at the start of the field.
fn tighten_quotes(text: &str, delimiter: char) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending = String::new();
    let mut in_quotes = false;
    let mut at_cell_start = true;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            out.push(c);
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    out.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            continue;
        }

        if at_cell_start && c != delimiter && c != '\n' && c.is_whitespace() {
            pending.push(c);
            continue;
        }

        if at_cell_start && c == '"' {
            pending.clear();
            in_quotes = true;
        } else {
            out.push_str(&pending);
            pending.clear();
        }
        out.push(c);
        at_cell_start = c == delimiter || c == '\n';
    }

    out.push_str(&pending);
    out
}

fn clean_cell(cell: &str) -> String {
    cell.replace(NON_BREAKING_SPACE, " ").trim().to_string()
}

fn is_blank_row(row: &[String]) -> bool {
    row.iter().all(|cell| cell.is_empty())
}
