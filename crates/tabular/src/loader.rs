use crate::types::RecordSet;
use semtable_common::{Result, SemtableError};
use std::path::Path;
use tracing::{info, warn};

/// Delimiters tried during auto-detection, in precedence order
const CANDIDATE_DELIMITERS: [char; 4] = [',', ';', '\t', '|'];

/// Load one or more delimited-text sources into a single record set.
///
/// The first source that parses defines the reference schema. Later sources
/// whose column set (unordered) differs are excluded with a warning; matching
/// sets in a different column order are reordered to the reference order.
/// Rows from accepted sources are concatenated in input order.
pub fn load_files<P: AsRef<Path>>(paths: &[P]) -> Result<RecordSet> {
    let mut combined: Option<RecordSet> = None;

    for path in paths {
        let path = path.as_ref();
        let source = match parse_source(path) {
            Ok(rs) => rs,
            Err(e) => {
                warn!("Skipping source {}: {}", path.display(), e);
                continue;
            }
        };

        match combined {
            None => {
                info!(
                    "Reference schema from {}: [{}]",
                    path.display(),
                    source.columns().join(", ")
                );
                combined = Some(source);
            }
            Some(ref mut acc) => {
                if !acc.same_column_set(&source) {
                    warn!(
                        "Excluding {}: column set [{}] does not match reference [{}]",
                        path.display(),
                        source.columns().join(", "),
                        acc.columns().join(", ")
                    );
                    continue;
                }
                let source = source.reordered(acc.columns())?;
                for row in source.rows() {
                    acc.push_row(row.clone())?;
                }
            }
        }
    }

    combined.ok_or_else(|| SemtableError::parse("no source could be parsed"))
}

/// Parse a single delimited-text file, auto-detecting its delimiter
pub fn parse_source(path: &Path) -> Result<RecordSet> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| SemtableError::parse(format!("{}: {}", path.display(), e)))?;

    let mut lines = content.lines().filter(|l| !l.trim().is_empty());
    let header = lines
        .next()
        .ok_or_else(|| SemtableError::parse(format!("{}: file is empty", path.display())))?;

    let delimiter = sniff_delimiter(header);
    let columns = split_line(header, delimiter);
    let mut record_set = RecordSet::new(columns)?;
    let width = record_set.columns().len();

    for (line_no, line) in lines.enumerate() {
        let mut fields = split_line(line, delimiter);
        if fields.len() > width {
            // Mirrors lenient CSV readers: overlong rows are bad data
            warn!(
                "{}: skipping malformed line {} ({} fields, expected {})",
                path.display(),
                line_no + 2,
                fields.len(),
                width
            );
            continue;
        }
        // Missing trailing values are empty strings, never a null marker
        fields.resize(width, String::new());
        record_set.push_row(fields)?;
    }

    Ok(record_set)
}

/// Pick the delimiter that splits the header into the most fields.
///
/// Counts occurrences outside quoted sections; ties resolve by candidate
/// precedence and a header with no candidate at all falls back to comma.
fn sniff_delimiter(header: &str) -> char {
    let mut best = ',';
    let mut best_count = 0usize;

    for &candidate in &CANDIDATE_DELIMITERS {
        let mut in_quotes = false;
        let mut count = 0usize;
        for ch in header.chars() {
            match ch {
                '"' => in_quotes = !in_quotes,
                c if c == candidate && !in_quotes => count += 1,
                _ => {}
            }
        }
        if count > best_count {
            best = candidate;
            best_count = count;
        }
    }

    best
}

/// Split one line on `delimiter`, honoring double-quoted fields.
///
/// A doubled quote inside a quoted field is an escaped literal quote.
fn split_line(line: &str, delimiter: char) -> Vec<String> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            c if c == delimiter && !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            c => current.push(c),
        }
    }
    fields.push(current);

    fields
}
