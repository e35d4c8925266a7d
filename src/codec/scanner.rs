//! Delimited-line scanning and field escaping.
//!
//! Splitting on the delimiter is only correct outside quotes, so lines are
//! walked character by character. A quote opens a quoted section only at the
//! start of a field; inside it, a doubled quote is a literal quote and a lone
//! quote closes the section. Quotes in the middle of an unquoted field are
//! kept as literal text, which keeps one stray quote from swallowing the rest
//! of a file.

use crate::error::DecodeError;

/// Column delimiter.
pub const DELIMITER: char = ',';

/// Quote character.
pub const QUOTE: char = '"';

/// Escapes one rendered field for output.
///
/// The field is quote-wrapped (with internal quotes doubled) if it contains
/// the delimiter, a quote, or a line break.
#[must_use]
pub fn escape_field(field: &str) -> String {
    if field.contains([DELIMITER, QUOTE, '\n', '\r']) {
        let mut out = String::with_capacity(field.len() + 2);
        out.push(QUOTE);
        for ch in field.chars() {
            if ch == QUOTE {
                out.push(QUOTE);
            }
            out.push(ch);
        }
        out.push(QUOTE);
        out
    } else {
        field.to_string()
    }
}

/// Joins already-rendered fields into one line (without terminator).
#[must_use]
pub fn join_fields<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut line = String::new();
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            line.push(DELIMITER);
        }
        line.push_str(&escape_field(field.as_ref()));
    }
    line
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    FieldStart,
    Unquoted,
    Quoted,
    AfterQuote,
}

/// Splits a logical row into unescaped fields.
///
/// # Errors
/// Returns [`DecodeError::UnterminatedQuote`] if the row ends inside a
/// quoted section.
pub fn split_line(line: &str) -> Result<Vec<String>, DecodeError> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut state = State::FieldStart;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match state {
            State::Quoted => {
                if ch == QUOTE {
                    if chars.peek() == Some(&QUOTE) {
                        chars.next();
                        current.push(QUOTE);
                    } else {
                        state = State::AfterQuote;
                    }
                } else {
                    current.push(ch);
                }
            }
            State::FieldStart | State::Unquoted | State::AfterQuote => {
                if ch == DELIMITER {
                    fields.push(std::mem::take(&mut current));
                    state = State::FieldStart;
                } else if ch == QUOTE && state == State::FieldStart {
                    state = State::Quoted;
                } else {
                    current.push(ch);
                    if state == State::FieldStart {
                        state = State::Unquoted;
                    }
                }
            }
        }
    }

    if state == State::Quoted {
        return Err(DecodeError::UnterminatedQuote);
    }
    fields.push(current);
    Ok(fields)
}

/// Returns true if `text` ends while a quoted field is still open.
///
/// Used to join physical lines into one logical row when a quoted field
/// contains a line break.
#[must_use]
pub fn ends_inside_quotes(text: &str) -> bool {
    matches!(split_line(text), Err(DecodeError::UnterminatedQuote))
}
