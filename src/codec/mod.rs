//! Field codec: one record per delimited text line.
//!
//! - [`scanner`] splits and escapes individual fields
//! - [`schema`] describes the column layouts each record kind accepts
//!
//! Encoding always writes the current layout. Decoding accepts any known
//! layout and defaults what is missing, so a file written by an older
//! version keeps loading.

pub mod scanner;
pub mod schema;

pub use scanner::{escape_field, join_fields, split_line};
pub use schema::{FieldKind, FieldSpec, Row, Schema, SchemaVersion, Value};

use crate::error::{DecodeError, StoreError, StoreResult};
use crate::record::Record;

/// Header line for a record kind's current layout.
#[must_use]
pub fn header<R: Record>() -> String {
    R::kind().schema.header()
}

/// Encodes one record as a line (without terminator).
///
/// # Errors
/// Returns [`StoreError::Encode`] if the record has no identity yet or its
/// value list does not match the current layout.
pub fn encode_line<R: Record>(record: &R) -> StoreResult<String> {
    let kind = R::kind();
    if record.id() == 0 {
        return Err(StoreError::encode(format!(
            "{} has no identity assigned",
            kind.name
        )));
    }

    let values = record.to_values();
    let columns = kind.schema.current().columns;
    if values.len() != columns.len() {
        return Err(StoreError::encode(format!(
            "{} produced {} values for {} columns",
            kind.name,
            values.len(),
            columns.len()
        )));
    }

    Ok(join_fields(values.iter().map(Value::render)))
}

/// Decodes one logical row into a record.
///
/// # Errors
/// Any [`DecodeError`]; the caller skips the row.
pub fn decode_line<R: Record>(line: &str) -> Result<R, DecodeError> {
    let columns = split_line(line)?;
    let row = R::kind().schema.decode_columns(&columns)?;
    Ok(R::from_row(row))
}

/// Returns `record` as it reads back after a save, e.g. timestamps cut to
/// whole seconds and the booking time to minutes.
///
/// # Errors
/// [`StoreError::Encode`] if the record cannot be encoded or its encoding
/// does not decode.
pub fn normalize<R: Record>(record: &R) -> StoreResult<R> {
    let line = encode_line(record)?;
    decode_line(&line).map_err(|e| {
        StoreError::encode(format!("{} {} does not read back: {e}", R::kind().name, record.id()))
    })
}

/// One physical line as read from disk, numbered from 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawLine {
    /// Physical line number.
    pub number: usize,
    /// Line without its `\n`, or why it could not be read as text.
    pub text: Result<String, DecodeError>,
}

/// A logical row: one or more physical lines joined while a quoted field
/// was open. `number` is the first physical line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LogicalRow {
    /// First physical line of the row.
    pub number: usize,
    /// Joined row text without the row's trailing `\r`.
    pub text: Result<String, DecodeError>,
}

/// Groups physical lines into logical rows.
///
/// Blank lines are dropped. A `\r` before a row's final line break is
/// removed; one before a line break inside a quoted field is kept. A line
/// that opens a quote which no later line closes is reported as
/// [`DecodeError::UnterminatedQuote`] on its own, and scanning resumes with
/// the next physical line.
#[must_use]
pub(crate) fn logical_rows(lines: &[RawLine]) -> Vec<LogicalRow> {
    let mut rows = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = &lines[i];
        let text = match &line.text {
            Ok(text) => text,
            Err(e) => {
                rows.push(LogicalRow { number: line.number, text: Err(e.clone()) });
                i += 1;
                continue;
            }
        };

        if text.trim().is_empty() {
            i += 1;
            continue;
        }

        if !scanner::ends_inside_quotes(text) {
            rows.push(LogicalRow { number: line.number, text: Ok(end_of_row(text.clone())) });
            i += 1;
            continue;
        }

        let mut joined = text.clone();
        let mut closed_at = None;
        for (j, next) in lines.iter().enumerate().skip(i + 1) {
            let Ok(next_text) = &next.text else {
                break;
            };
            joined.push('\n');
            joined.push_str(next_text);
            if !scanner::ends_inside_quotes(&joined) {
                closed_at = Some(j);
                break;
            }
        }

        match closed_at {
            Some(j) => {
                rows.push(LogicalRow { number: line.number, text: Ok(end_of_row(joined)) });
                i = j + 1;
            }
            None => {
                rows.push(LogicalRow {
                    number: line.number,
                    text: Err(DecodeError::UnterminatedQuote),
                });
                i += 1;
            }
        }
    }

    rows
}

fn end_of_row(mut text: String) -> String {
    if text.ends_with('\r') {
        text.pop();
    }
    text
}
