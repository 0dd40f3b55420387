//! Annotations
//!
//! An annotation is a name/value pair lifted out of a documentation comment
//! line. This module holds the value type and its derived views; the line
//! grammar lives in [`grammar`] and schema-driven decoding in [`decode`].
//!
//! @module annotation

pub mod decode;
pub mod grammar;

use serde::{Deserialize, Serialize};

pub use decode::{AnnotationRecord, DecodeError, Record, Schema, Strategy};
pub use grammar::{AnnotationParser, Grammar, MalformedAnnotation};

// =============================================================================
// ANNOTATION
// =============================================================================

/// A single annotation extracted from a comment line
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Annotation {
    /// Annotation name (case-folded according to the grammar that produced it)
    pub name: String,
    /// Raw value, possibly empty
    pub value: String,
}

impl Annotation {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Whitespace separated fields of the value
    pub fn fields(&self) -> Vec<&str> {
        self.value.split_whitespace().collect()
    }

    /// The value as key/value pairs, in source order.
    ///
    /// Segments are separated by commas; a comma segment holding more than
    /// one `=` is further split on whitespace. Every resulting segment must
    /// contain exactly one `=`.
    pub fn pairs(&self) -> Result<Vec<(&str, &str)>, DecodeError> {
        decode::split_pairs(&self.value)
    }

    /// Map the value onto `schema` using `strategy`
    pub fn decode(&self, schema: &Schema, strategy: Strategy) -> Result<Record, DecodeError> {
        schema.decode(&self.value, strategy)
    }

    /// Decode the value into a caller-defined record type
    pub fn decode_as<T: AnnotationRecord>(&self) -> Result<T, DecodeError> {
        let record = T::schema().decode(&self.value, T::STRATEGY)?;
        T::from_record(&record)
    }
}

impl std::fmt::Display for Annotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.value.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}({})", self.name, self.value)
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
