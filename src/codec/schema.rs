//! Versioned schema descriptors and scalar field values.
//!
//! Each record kind declares its current field list plus every older column
//! layout it still accepts. A row is matched to the newest layout whose
//! column count it reaches; fields that layout lacks take the default of
//! their [`FieldKind`].

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::record::RecordId;

/// Canonical timestamp format.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Canonical time-of-day format.
pub const TIME_FORMAT: &str = "%H:%M";

const TIMESTAMP_INPUT_FORMATS: &[&str] = &[
    TIMESTAMP_FORMAT,
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

const DATE_INPUT_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y"];

const TIME_INPUT_FORMATS: &[&str] = &["%H:%M:%S", TIME_FORMAT];

/// The scalar type of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Positive integer identity. A bad value invalidates the row.
    Identity,
    /// Plain integer, defaults to zero.
    Integer,
    /// Free text, defaults to empty.
    Text,
    /// Required timestamp, defaults to the Unix epoch.
    Timestamp,
    /// Optional timestamp, empty renders as an empty column.
    OptionalTimestamp,
    /// Time of day, defaults to midnight.
    TimeOfDay,
    /// Boolean, defaults to false.
    Bool,
}

impl FieldKind {
    /// Value used when a column is absent from an older layout.
    #[must_use]
    pub fn default_value(self) -> Value {
        match self {
            Self::Identity | Self::Integer => Value::Int(0),
            Self::Text => Value::Text(String::new()),
            Self::Timestamp => Value::Timestamp(NaiveDateTime::default()),
            Self::OptionalTimestamp => Value::OptionalTimestamp(None),
            Self::TimeOfDay => Value::Time(NaiveTime::MIN),
            Self::Bool => Value::Bool(false),
        }
    }

    /// Parses raw column text. Only identities can fail; everything else
    /// falls back to the default.
    fn parse(self, field: &'static str, raw: &str) -> Result<Value, DecodeError> {
        let trimmed = raw.trim();
        let value = match self {
            Self::Identity => {
                let id = trimmed
                    .parse::<RecordId>()
                    .ok()
                    .filter(|id| *id > 0)
                    .ok_or_else(|| DecodeError::InvalidIdentity {
                        field,
                        value: raw.to_string(),
                    })?;
                Value::Int(i64::from(id))
            }
            Self::Integer => trimmed.parse::<i64>().map_or_else(|_| self.default_value(), Value::Int),
            Self::Text => Value::Text(raw.to_string()),
            Self::Timestamp => parse_timestamp(trimmed).map_or_else(|| self.default_value(), Value::Timestamp),
            Self::OptionalTimestamp => Value::OptionalTimestamp(parse_timestamp(trimmed)),
            Self::TimeOfDay => parse_time(trimmed).map_or_else(|| self.default_value(), Value::Time),
            Self::Bool => Value::Bool(trimmed.eq_ignore_ascii_case("true")),
        };
        Ok(value)
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    if raw.is_empty() {
        return None;
    }
    TIMESTAMP_INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATE_INPUT_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    TIME_INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(raw, fmt).ok())
}

/// One scalar field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Text(String),
    Int(i64),
    Timestamp(NaiveDateTime),
    OptionalTimestamp(Option<NaiveDateTime>),
    Time(NaiveTime),
    Bool(bool),
}

impl Value {
    /// Renders the value as unescaped column text.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Int(n) => n.to_string(),
            Self::Timestamp(ts) => ts.format(TIMESTAMP_FORMAT).to_string(),
            Self::OptionalTimestamp(Some(ts)) => ts.format(TIMESTAMP_FORMAT).to_string(),
            Self::OptionalTimestamp(None) => String::new(),
            Self::Time(t) => t.format(TIME_FORMAT).to_string(),
            Self::Bool(b) => b.to_string(),
        }
    }
}

/// A named, typed column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    /// Creates a field spec.
    #[must_use]
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

/// One historical column layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaVersion {
    pub version: u8,
    pub columns: &'static [&'static str],
}

impl SchemaVersion {
    /// Minimum column count a row needs to match this layout.
    #[must_use]
    pub const fn min_columns(&self) -> usize {
        self.columns.len()
    }
}

/// Schema descriptor for one record kind.
///
/// `versions` is ordered oldest first; the last entry is the current layout
/// and its columns are exactly the names in `fields`, in order.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub identity: &'static str,
    pub fields: &'static [FieldSpec],
    /// Columns only present in older layouts, kept so they can be folded
    /// into current fields during upgrade.
    pub legacy_fields: &'static [FieldSpec],
    pub versions: &'static [SchemaVersion],
}

impl Schema {
    /// The layout written on save.
    #[must_use]
    pub fn current(&self) -> &SchemaVersion {
        &self.versions[self.versions.len() - 1]
    }

    /// Column count of the oldest accepted layout.
    #[must_use]
    pub fn min_columns(&self) -> usize {
        self.versions
            .iter()
            .map(SchemaVersion::min_columns)
            .min()
            .unwrap_or(0)
    }

    /// Header line for the current layout.
    #[must_use]
    pub fn header(&self) -> String {
        self.current().columns.join(",")
    }

    /// Newest layout a row with `columns` fields satisfies.
    #[must_use]
    pub fn version_for(&self, columns: usize) -> Option<&SchemaVersion> {
        self.versions
            .iter()
            .rev()
            .find(|v| columns >= v.min_columns())
    }

    fn kind_of(&self, name: &str) -> FieldKind {
        self.fields
            .iter()
            .chain(self.legacy_fields)
            .find(|f| f.name == name)
            .map_or(FieldKind::Text, |f| f.kind)
    }

    /// Decodes already-split columns into a [`Row`], defaulting every
    /// current field the matched layout lacks.
    ///
    /// # Errors
    /// - [`DecodeError::TooFewColumns`] below the oldest layout
    /// - [`DecodeError::InvalidIdentity`] for a bad identity column
    pub fn decode_columns(&self, columns: &[String]) -> Result<Row, DecodeError> {
        let version = self
            .version_for(columns.len())
            .ok_or(DecodeError::TooFewColumns {
                found: columns.len(),
                required: self.min_columns(),
            })?;

        // A newer layout that only appends columns names the extra columns
        // of a partially upgraded row.
        let names = self
            .versions
            .iter()
            .rev()
            .find(|v| v.columns.starts_with(version.columns))
            .map_or(version.columns, |v| v.columns);

        let mut values = HashMap::with_capacity(self.fields.len());
        for (name, raw) in names.iter().zip(columns) {
            let value = self.kind_of(name).parse(*name, raw)?;
            values.insert(*name, value);
        }
        for field in self.fields {
            values
                .entry(field.name)
                .or_insert_with(|| field.kind.default_value());
        }

        Ok(Row { values })
    }
}

/// Decoded column values of one row, keyed by field name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    values: HashMap<&'static str, Value>,
}

impl Row {
    /// Takes a text field, empty if absent.
    pub fn text(&mut self, name: &str) -> String {
        match self.values.remove(name) {
            Some(Value::Text(s)) => s,
            Some(other) => other.render(),
            None => String::new(),
        }
    }

    /// Takes an integer field, zero if absent or out of range for `u32`.
    pub fn uint(&mut self, name: &str) -> u32 {
        match self.values.remove(name) {
            Some(Value::Int(n)) => u32::try_from(n).unwrap_or(0),
            _ => 0,
        }
    }

    /// Takes a required timestamp.
    pub fn timestamp(&mut self, name: &str) -> NaiveDateTime {
        match self.values.remove(name) {
            Some(Value::Timestamp(ts) | Value::OptionalTimestamp(Some(ts))) => ts,
            _ => NaiveDateTime::default(),
        }
    }

    /// Takes an optional timestamp.
    pub fn optional_timestamp(&mut self, name: &str) -> Option<NaiveDateTime> {
        match self.values.remove(name) {
            Some(Value::Timestamp(ts) | Value::OptionalTimestamp(Some(ts))) => Some(ts),
            _ => None,
        }
    }

    /// Takes a time-of-day field.
    pub fn time(&mut self, name: &str) -> NaiveTime {
        match self.values.remove(name) {
            Some(Value::Time(t)) => t,
            _ => NaiveTime::MIN,
        }
    }

    /// Takes a boolean field.
    pub fn flag(&mut self, name: &str) -> bool {
        matches!(self.values.remove(name), Some(Value::Bool(true)))
    }
}
