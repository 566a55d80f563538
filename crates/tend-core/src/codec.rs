//! Record codec
//!
//! Parses and serializes one record's structured header plus freeform body.
//! The on-disk form is Markdown with a YAML header block:
//!
//! ```text
//! ---
//! id: 6f1c...
//! kind: task
//! title: Call the bank
//! ...
//! ---
//!
//! freeform body text
//! ```
//!
//! The codec has no knowledge of the filesystem. Header keys the schema does
//! not recognize are preserved opaquely and re-emitted on encode, so
//! `decode(encode(r)) == r` holds for any valid record. A single trailing
//! newline terminates the encoded form and is not part of the body.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde_yaml::{Mapping, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Header, Kind, Priority, Record, Status};

/// The line separating header from body, and opening the header
pub const DELIMITER: &str = "---";

/// Errors produced while decoding a record
#[derive(Error, Debug)]
pub enum ParseError {
    /// The header block is not delimited by `---` lines
    #[error("missing header delimiter '---'")]
    MissingDelimiter,

    /// The header block is not valid YAML
    #[error("invalid header: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The header block parsed, but is not a key/value mapping
    #[error("header is not a key/value mapping")]
    NotAMapping,

    /// A required header field is absent
    #[error("missing required field '{field}'")]
    MissingField { field: &'static str },

    /// A header field is present but holds an unusable value
    #[error("invalid value for field '{field}': {value}")]
    InvalidField { field: &'static str, value: String },
}

/// Decode a record from its on-disk text form
pub fn decode(input: &str) -> Result<Record, ParseError> {
    let (header_text, body) = split_parts(input)?;

    let value: Value = serde_yaml::from_str(header_text)?;
    let mut map = match value {
        Value::Mapping(map) => map,
        Value::Null => Mapping::new(),
        _ => return Err(ParseError::NotAMapping),
    };

    let id = parse_uuid(take_required(&mut map, "id")?, "id")?;
    let kind = parse_enum::<Kind>(take_required(&mut map, "kind")?, "kind")?;
    let title = parse_string(take_required(&mut map, "title")?, "title")?;
    if title.trim().is_empty() {
        return Err(ParseError::InvalidField {
            field: "title",
            value: title,
        });
    }
    let created_at = parse_datetime(take_required(&mut map, "created_at")?, "created_at")?;

    let status = match take_optional(&mut map, "status") {
        Some(v) => parse_enum::<Status>(v, "status")?,
        None => Status::Active,
    };
    let priority = match take_optional(&mut map, "priority") {
        Some(v) => Some(parse_enum::<Priority>(v, "priority")?),
        None => None,
    };
    let tags = match take_optional(&mut map, "tags") {
        Some(v) => parse_tags(v)?,
        None => Vec::new(),
    };
    let due_date = match take_optional(&mut map, "due_date") {
        Some(v) => Some(parse_date(v, "due_date")?),
        None => None,
    };
    let parent_goal_id = match take_optional(&mut map, "parent_goal_id") {
        Some(v) => Some(parse_uuid(v, "parent_goal_id")?),
        None => None,
    };

    // Whatever is left over is someone else's schema; keep it verbatim.
    let mut extra = BTreeMap::new();
    for (key, value) in map {
        if let Value::String(key) = key {
            extra.insert(key, value);
        }
    }

    Ok(Record {
        header: Header {
            id,
            kind,
            title,
            status,
            priority,
            tags,
            due_date,
            parent_goal_id,
            created_at,
            extra,
        },
        body: body.to_string(),
    })
}

/// Encode a record into its on-disk text form
pub fn encode(record: &Record) -> String {
    let header = &record.header;
    let mut map = Mapping::new();

    insert(&mut map, "id", header.id.to_string());
    insert(&mut map, "kind", header.kind.as_str());
    insert(&mut map, "title", header.title.clone());
    insert(&mut map, "status", header.status.as_str());
    if let Some(priority) = header.priority {
        insert(&mut map, "priority", priority.as_str());
    }
    map.insert(
        Value::String("tags".into()),
        Value::Sequence(
            header
                .tags
                .iter()
                .map(|t| Value::String(t.clone()))
                .collect(),
        ),
    );
    if let Some(due) = header.due_date {
        insert(&mut map, "due_date", due.format("%Y-%m-%d").to_string());
    }
    if let Some(parent) = header.parent_goal_id {
        insert(&mut map, "parent_goal_id", parent.to_string());
    }
    insert(&mut map, "created_at", header.created_at.to_rfc3339());
    for (key, value) in &header.extra {
        map.insert(Value::String(key.clone()), value.clone());
    }

    // serde_yaml always terminates its output with a newline
    let yaml = serde_yaml::to_string(&Value::Mapping(map)).expect("header serializes");

    if record.body.is_empty() {
        format!("{DELIMITER}\n{yaml}{DELIMITER}\n")
    } else {
        format!("{DELIMITER}\n{yaml}{DELIMITER}\n\n{}\n", record.body)
    }
}

/// Split input into the YAML header text and the body
///
/// The header sits between the first line (which must be `---`) and the next
/// `---` line. One blank separator line and one trailing newline around the
/// body are consumed as framing.
fn split_parts(input: &str) -> Result<(&str, &str), ParseError> {
    let rest = input
        .strip_prefix(DELIMITER)
        .and_then(|r| r.strip_prefix('\n'))
        .ok_or(ParseError::MissingDelimiter)?;

    let close = rest
        .find(&format!("\n{DELIMITER}\n"))
        .map(|pos| (pos + 1, pos + 1 + DELIMITER.len() + 1));
    // A file may also end right at the closing delimiter, without a newline.
    let (header_end, body_start) = match close {
        Some(bounds) => bounds,
        None => {
            let suffix = format!("\n{DELIMITER}");
            if rest.ends_with(&suffix) {
                (rest.len() - DELIMITER.len(), rest.len())
            } else {
                return Err(ParseError::MissingDelimiter);
            }
        }
    };

    let header = &rest[..header_end];
    let mut body = &rest[body_start..];
    body = body.strip_prefix('\n').unwrap_or(body);
    body = body.strip_suffix('\n').unwrap_or(body);
    Ok((header, body))
}

fn insert(map: &mut Mapping, key: &str, value: impl Into<String>) {
    map.insert(Value::String(key.into()), Value::String(value.into()));
}

fn take_required(map: &mut Mapping, field: &'static str) -> Result<Value, ParseError> {
    take_optional(map, field).ok_or(ParseError::MissingField { field })
}

fn take_optional(map: &mut Mapping, field: &str) -> Option<Value> {
    let value = map.remove(&Value::String(field.into()))?;
    if value.is_null() {
        return None;
    }
    Some(value)
}

fn parse_string(value: Value, field: &'static str) -> Result<String, ParseError> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(invalid(field, &other)),
    }
}

fn parse_uuid(value: Value, field: &'static str) -> Result<Uuid, ParseError> {
    let s = parse_string(value, field)?;
    Uuid::parse_str(&s).map_err(|_| ParseError::InvalidField { field, value: s })
}

fn parse_enum<T: FromStr>(value: Value, field: &'static str) -> Result<T, ParseError> {
    let s = parse_string(value, field)?;
    s.parse()
        .map_err(|_| ParseError::InvalidField { field, value: s })
}

fn parse_date(value: Value, field: &'static str) -> Result<NaiveDate, ParseError> {
    let s = parse_string(value, field)?;
    NaiveDate::parse_from_str(&s, "%Y-%m-%d")
        .map_err(|_| ParseError::InvalidField { field, value: s })
}

fn parse_datetime(value: Value, field: &'static str) -> Result<DateTime<Utc>, ParseError> {
    let s = parse_string(value, field)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ParseError::InvalidField { field, value: s })
}

fn parse_tags(value: Value) -> Result<Vec<String>, ParseError> {
    match value {
        Value::Sequence(seq) => seq
            .into_iter()
            .map(|v| parse_string(v, "tags"))
            .collect(),
        other => Err(invalid("tags", &other)),
    }
}

fn invalid(field: &'static str, value: &Value) -> ParseError {
    ParseError::InvalidField {
        field,
        value: serde_yaml::to_string(value)
            .unwrap_or_default()
            .trim_end()
            .to_string(),
    }
}
