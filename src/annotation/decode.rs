//! Annotation Value Decoding
//!
//! Maps a raw annotation value onto a caller-declared record shape. Decoding
//! is schema driven: the caller names the fields, the decoder assigns string
//! values to them. No type coercion happens here; the serde adapter at the
//! bottom of this module is the place for typed conversion.
//!
//! @module annotation/decode

use serde::de::DeserializeOwned;
use thiserror::Error;

// =============================================================================
// ERRORS
// =============================================================================

/// Failure of a single decode call
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("schema has no fields to receive `{value}`")]
    NoFields { value: String },

    #[error("no field named `{key}` in schema")]
    UnknownField { key: String },

    #[error("field `{key}` given more than once")]
    DuplicateField { key: String },

    #[error("segment `{segment}` is not a single key=value pair")]
    BadSegment { segment: String },

    #[error("cannot deserialize record: {0}")]
    Deserialize(#[from] serde_json::Error),
}

// =============================================================================
// SCHEMA
// =============================================================================

/// How a value is split before it is assigned to fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Whitespace split, zipped with the schema by position
    Positional,
    /// `key=value` segments, matched to the schema by key
    Keyed,
}

/// Ordered field names of a target record
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    fields: Vec<String>,
}

impl Schema {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == key)
    }

    /// Decode `value` into a record of this schema
    pub fn decode(&self, value: &str, strategy: Strategy) -> Result<Record, DecodeError> {
        match strategy {
            Strategy::Positional => self.decode_positional(value),
            Strategy::Keyed => self.decode_keyed(value),
        }
    }

    /// The last field absorbs surplus tokens, joined by single spaces.
    fn decode_positional(&self, value: &str) -> Result<Record, DecodeError> {
        let tokens: Vec<&str> = value.split_whitespace().collect();
        if tokens.is_empty() {
            return Ok(Record::default());
        }
        if self.fields.is_empty() {
            return Err(DecodeError::NoFields {
                value: value.to_string(),
            });
        }

        let last = self.fields.len() - 1;
        let entries = self
            .fields
            .iter()
            .enumerate()
            .take(tokens.len())
            .map(|(i, field)| {
                let value = if i == last {
                    tokens[i..].join(" ")
                } else {
                    tokens[i].to_string()
                };
                (field.clone(), value)
            })
            .collect();

        Ok(Record { entries })
    }

    fn decode_keyed(&self, value: &str) -> Result<Record, DecodeError> {
        let mut slots: Vec<Option<String>> = vec![None; self.fields.len()];

        for (key, val) in split_pairs(value)? {
            let idx = self.position(key).ok_or_else(|| DecodeError::UnknownField {
                key: key.to_string(),
            })?;
            if slots[idx].is_some() {
                return Err(DecodeError::DuplicateField {
                    key: key.to_string(),
                });
            }
            slots[idx] = Some(val.to_string());
        }

        let entries = self
            .fields
            .iter()
            .zip(slots)
            .filter_map(|(field, slot)| slot.map(|v| (field.clone(), v)))
            .collect();

        Ok(Record { entries })
    }
}

/// Split a value into `key=value` pairs.
///
/// Commas separate segments. A comma segment with more than one `=` is split
/// again on whitespace, so both `a=1,b=2` and `a=1 b=2` decode.
pub(crate) fn split_pairs(value: &str) -> Result<Vec<(&str, &str)>, DecodeError> {
    let mut pairs = Vec::new();

    for segment in value.split(',') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        if segment.matches('=').count() > 1 {
            for part in segment.split_whitespace() {
                pairs.push(split_pair(part)?);
            }
        } else {
            pairs.push(split_pair(segment)?);
        }
    }

    Ok(pairs)
}

fn split_pair(segment: &str) -> Result<(&str, &str), DecodeError> {
    let bad = || DecodeError::BadSegment {
        segment: segment.to_string(),
    };

    let (key, val) = segment.split_once('=').ok_or_else(bad)?;
    let key = key.trim();
    if key.is_empty() || val.contains('=') {
        return Err(bad());
    }
    Ok((key, val.trim()))
}

// =============================================================================
// RECORD
// =============================================================================

/// Decoded field values in schema order.
///
/// Fields the source did not provide are absent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    entries: Vec<(String, String)>,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A caller-defined record that can be built from an annotation value
///
/// ```
/// use annoscan::annotation::{Annotation, AnnotationRecord, DecodeError, Record, Schema, Strategy};
///
/// struct Route {
///     method: String,
///     path: String,
/// }
///
/// impl AnnotationRecord for Route {
///     const STRATEGY: Strategy = Strategy::Keyed;
///
///     fn schema() -> Schema {
///         Schema::new(["method", "path"])
///     }
///
///     fn from_record(record: &Record) -> Result<Self, DecodeError> {
///         Ok(Self {
///             method: record.get("method").unwrap_or("GET").to_string(),
///             path: record.get("path").unwrap_or("/").to_string(),
///         })
///     }
/// }
///
/// let route: Route = Annotation::new("Route", "method=POST,path=/users")
///     .decode_as()
///     .unwrap();
/// assert_eq!(route.method, "POST");
/// assert_eq!(route.path, "/users");
/// ```
pub trait AnnotationRecord: Sized {
    const STRATEGY: Strategy;

    fn schema() -> Schema;

    fn from_record(record: &Record) -> Result<Self, DecodeError>;
}

// =============================================================================
// SERDE ADAPTER
// =============================================================================

impl Record {
    /// Deserialize the record into any serde type.
    ///
    /// Every value is a JSON string, so target fields must accept strings.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, DecodeError> {
        let map: serde_json::Map<String, serde_json::Value> = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        Ok(serde_json::from_value(serde_json::Value::Object(map))?)
    }
}

// =============================================================================
// TESTS
// =============================================================================
