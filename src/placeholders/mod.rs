//! Placeholder scanning and literal SQL rendering.
//!
//! SQLite numbers a bare `?` one higher than the largest index seen so far, and `?NNN` uses
//! the explicit index. A named placeholder (`:name`, `@name`, `$name`) takes the next index the
//! first time its name appears and reuses it afterwards. Placeholders inside string literals, quoted identifiers and comments are
//! left untouched.

mod scanner;

use std::collections::HashMap;
use std::fmt::Write;

use scanner::{
    State, is_block_comment_end, is_block_comment_start, is_ident_byte, is_line_comment_start,
    scan_digits, scan_name,
};

use crate::config::JsonWriteOptions;
use crate::error::SqliteQueueError;
use crate::sqlite::params::{TIMESTAMP_FORMAT, encode_json};
use crate::types::RowValues;

/// A placeholder located in a SQL template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholder {
    /// Byte offset of the `?`, `:`, `@` or `$`.
    pub start: usize,
    /// Byte offset one past the placeholder.
    pub end: usize,
    /// One-based parameter index.
    pub index: usize,
}

/// Locate every placeholder in `sql`, positional or named.
///
/// # Errors
/// Returns `SqliteQueueError::ConfigError` for `?0` or an index that does not fit in `usize`.
pub fn scan_placeholders(sql: &str) -> Result<Vec<Placeholder>, SqliteQueueError> {
    let bytes = sql.as_bytes();
    let mut found = Vec::new();
    let mut named: HashMap<&str, usize> = HashMap::new();
    let mut state = State::Normal;
    let mut largest = 0usize;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                b'`' => state = State::Backtick,
                b'[' => state = State::Bracketed,
                _ if is_line_comment_start(bytes, idx) => {
                    state = State::LineComment;
                    idx += 1;
                }
                _ if is_block_comment_start(bytes, idx) => {
                    state = State::BlockComment;
                    idx += 1;
                }
                b'?' => {
                    let (end, index) = match scan_digits(bytes, idx + 1) {
                        Some((digits_end, digits)) => {
                            let index = digits
                                .parse::<usize>()
                                .ok()
                                .filter(|n| *n > 0)
                                .ok_or_else(|| {
                                    SqliteQueueError::ConfigError(format!(
                                        "placeholder ?{digits} is out of range"
                                    ))
                                })?;
                            (digits_end, index)
                        }
                        None => (idx + 1, largest + 1),
                    };
                    largest = largest.max(index);
                    found.push(Placeholder {
                        start: idx,
                        end,
                        index,
                    });
                    idx = end;
                    continue;
                }
                b':' | b'@' | b'$' if idx == 0 || !is_ident_byte(bytes[idx - 1]) => {
                    if let Some(end) = scan_name(bytes, idx + 1) {
                        let index = *named.entry(&sql[idx..end]).or_insert_with(|| {
                            largest += 1;
                            largest
                        });
                        found.push(Placeholder {
                            start: idx,
                            end,
                            index,
                        });
                        idx = end;
                        continue;
                    }
                }
                _ => {}
            },
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1; // skip escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::Backtick => {
                if b == b'`' {
                    if bytes.get(idx + 1) == Some(&b'`') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::Bracketed => {
                if b == b']' {
                    state = State::Normal;
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment => {
                if is_block_comment_end(bytes, idx) {
                    state = State::Normal;
                    idx += 1;
                }
            }
        }
        idx += 1;
    }

    Ok(found)
}

/// Number of parameters a template expects (the largest placeholder index).
///
/// # Errors
/// Propagates scanning errors from [`scan_placeholders`].
pub fn parameter_count(sql: &str) -> Result<usize, SqliteQueueError> {
    Ok(scan_placeholders(sql)?
        .iter()
        .map(|p| p.index)
        .max()
        .unwrap_or(0))
}

/// Render `template` with every placeholder replaced by the literal form of its parameter.
///
/// ```rust
/// use sqlite_queue::prelude::*;
///
/// let sql = format_sql(
///     "INSERT INTO t (a, b, c) VALUES (?, ?, ?)",
///     &[RowValues::Text("O'Brien".into()), RowValues::Int(3), RowValues::Blob(vec![0xca, 0xfe])],
///     JsonWriteOptions::default(),
/// ).unwrap();
/// assert_eq!(sql, "INSERT INTO t (a, b, c) VALUES ('O''Brien', 3, X'cafe')");
/// ```
///
/// # Errors
/// Returns `SqliteQueueError::BindError` when the parameter count differs from the number the
/// template expects.
pub fn format_sql(
    template: &str,
    params: &[RowValues],
    json: JsonWriteOptions,
) -> Result<String, SqliteQueueError> {
    let placeholders = scan_placeholders(template)?;
    let expected = placeholders.iter().map(|p| p.index).max().unwrap_or(0);
    if expected != params.len() {
        return Err(SqliteQueueError::BindError {
            expected,
            actual: params.len(),
        });
    }

    let mut out = String::with_capacity(template.len() + params.len() * 8);
    let mut last = 0;
    for placeholder in &placeholders {
        out.push_str(&template[last..placeholder.start]);
        out.push_str(&quote_literal(&params[placeholder.index - 1], json)?);
        last = placeholder.end;
    }
    out.push_str(&template[last..]);
    Ok(out)
}

/// SQL literal for a single value.
///
/// # Errors
/// Returns `SqliteQueueError::MappingError` if a structured value cannot be encoded.
pub fn quote_literal(
    value: &RowValues,
    json: JsonWriteOptions,
) -> Result<String, SqliteQueueError> {
    Ok(match value {
        RowValues::Null => "NULL".to_string(),
        RowValues::Int(i) => i.to_string(),
        RowValues::Float(f) => float_literal(*f),
        RowValues::Bool(b) => i64::from(*b).to_string(),
        RowValues::Text(s) => quote_text(s),
        RowValues::Timestamp(dt) => quote_text(&dt.format(TIMESTAMP_FORMAT).to_string()),
        RowValues::JSON(v) => quote_text(&encode_json(v, json)?),
        RowValues::Blob(bytes) => {
            let mut out = String::with_capacity(bytes.len() * 2 + 3);
            out.push_str("X'");
            for byte in bytes {
                let _ = write!(out, "{byte:02x}");
            }
            out.push('\'');
            out
        }
    })
}

/// Quote an identifier (table, column, index name) with double quotes.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_text(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn float_literal(f: f64) -> String {
    if f.is_nan() {
        "NULL".to_string()
    } else if f.is_infinite() {
        let literal = if f > 0.0 { "9e999" } else { "-9e999" };
        literal.to_string()
    } else {
        format!("{f:?}")
    }
}
