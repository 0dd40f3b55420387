//! Annotation Grammar
//!
//! Classifies a single raw comment line as an annotation or prose. Two
//! dialects are supported behind one interface:
//!
//! - `Keyed`: `// @Name(key=value,key=value)`, name case preserved
//! - `Sigil`: `// <sigil> name free form value`, name lower-cased
//!
//! The parser works on raw comment text; the source provider offers no
//! token-level help here.
//!
//! @module annotation/grammar

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace, warn};

use super::Annotation;

/// Line comment marker every annotation line starts with
pub const COMMENT_PREFIX: &str = "//";

/// Sigil used by the positional dialect when none is configured
pub const DEFAULT_SIGIL: &str = "@A";

// =============================================================================
// DIAGNOSTICS
// =============================================================================

/// A line that claims to be an annotation but does not follow the grammar.
///
/// Recovered locally: the line is dropped and scanning continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed annotation `{line}`: {reason}")]
pub struct MalformedAnnotation {
    pub line: String,
    pub reason: String,
}

impl MalformedAnnotation {
    fn new(line: &str, reason: impl Into<String>) -> Self {
        Self {
            line: line.to_string(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// GRAMMAR
// =============================================================================

/// Annotation dialect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "dialect", rename_all = "lowercase")]
pub enum Grammar {
    /// `// @Name(k=v,...)`
    Keyed,
    /// `// <sigil> name value...`
    Sigil {
        #[serde(default = "default_sigil")]
        sigil: String,
    },
}

fn default_sigil() -> String {
    DEFAULT_SIGIL.to_string()
}

impl Default for Grammar {
    fn default() -> Self {
        Self::Keyed
    }
}

impl Grammar {
    /// Positional dialect with the given sigil
    pub fn sigil(sigil: impl Into<String>) -> Self {
        Self::Sigil {
            sigil: sigil.into(),
        }
    }

    /// Fixed text an annotation line must start with
    pub fn prefix(&self) -> String {
        match self {
            Self::Keyed => format!("{} @", COMMENT_PREFIX),
            Self::Sigil { sigil } => format!("{} {}", COMMENT_PREFIX, sigil),
        }
    }

    /// Text a raw line must contain to pass the name filter `filter`
    pub fn marker(&self, filter: &str) -> String {
        match self {
            Self::Keyed => format!("@{}", filter),
            Self::Sigil { sigil } => format!("{} {}", sigil, filter),
        }
    }

    /// Parse one raw comment line.
    ///
    /// `Ok(None)` means the line is prose. `Err` means it looked like an
    /// annotation but broke the grammar.
    pub fn parse(&self, line: &str) -> Result<Option<Annotation>, MalformedAnnotation> {
        let line = line.trim();
        let prefix = self.prefix();
        if line.len() < prefix.len() {
            return Ok(None);
        }
        let Some(rest) = line.strip_prefix(prefix.as_str()) else {
            return Ok(None);
        };

        match self {
            Self::Keyed => parse_keyed(line, rest).map(Some),
            Self::Sigil { .. } => parse_sigil(line, rest),
        }
    }
}

fn parse_keyed(line: &str, rest: &str) -> Result<Annotation, MalformedAnnotation> {
    let open = rest
        .find('(')
        .ok_or_else(|| MalformedAnnotation::new(line, "missing `(`"))?;

    let name = rest[..open].trim();
    if name.is_empty() {
        return Err(MalformedAnnotation::new(line, "empty annotation name"));
    }
    if name.contains(char::is_whitespace) {
        return Err(MalformedAnnotation::new(line, "annotation name contains whitespace"));
    }

    let inner = &rest[open + 1..];
    let close = inner
        .rfind(')')
        .ok_or_else(|| MalformedAnnotation::new(line, "missing `)`"))?;
    if !inner[close + 1..].trim().is_empty() {
        return Err(MalformedAnnotation::new(line, "trailing text after `)`"));
    }

    let value = inner[..close].trim();
    for segment in value.split(',') {
        if segment.matches('=').count() != 1 {
            return Err(MalformedAnnotation::new(
                line,
                format!("segment `{}` is not a key=value pair", segment.trim()),
            ));
        }
    }

    Ok(Annotation::new(name, value))
}

fn parse_sigil(line: &str, rest: &str) -> Result<Option<Annotation>, MalformedAnnotation> {
    // `// @Abc` is not `// @A` followed by a name
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return Ok(None);
    }

    let mut tokens = rest.split_whitespace();
    let name = tokens
        .next()
        .ok_or_else(|| MalformedAnnotation::new(line, "missing annotation name"))?;
    let value = tokens.collect::<Vec<_>>().join(" ");

    Ok(Some(Annotation::new(name.to_lowercase(), value)))
}

// =============================================================================
// PARSER
// =============================================================================

/// Grammar plus the annotation-name allow-list
#[derive(Debug, Clone, Default)]
pub struct AnnotationParser {
    grammar: Grammar,
    filters: Vec<String>,
}

impl AnnotationParser {
    pub fn new(grammar: Grammar, filters: Vec<String>) -> Self {
        Self { grammar, filters }
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    /// Extract the annotation on `line`, if any.
    ///
    /// Malformed lines are logged and skipped.
    pub fn parse_line(&self, line: &str) -> Option<Annotation> {
        match self.grammar.parse(line) {
            Ok(Some(annotation)) => {
                if !self.admits(line) {
                    debug!(line, "Annotation not included in the filters, ignoring");
                    return None;
                }
                trace!(name = %annotation.name, value = %annotation.value, "Discovered annotation");
                Some(annotation)
            }
            Ok(None) => None,
            Err(err) => {
                warn!(line = %err.line, reason = %err.reason, "Ignoring malformed annotation");
                None
            }
        }
    }

    /// All annotations of a documentation block, in line order
    pub fn parse_block<S: AsRef<str>>(&self, lines: &[S]) -> Vec<Annotation> {
        lines
            .iter()
            .filter_map(|line| self.parse_line(line.as_ref()))
            .collect()
    }

    /// Whether `line` is an annotation line under this grammar, valid or not
    pub fn is_annotation_line(&self, line: &str) -> bool {
        !matches!(self.grammar.parse(line), Ok(None))
    }

    fn admits(&self, line: &str) -> bool {
        self.filters.is_empty()
            || self
                .filters
                .iter()
                .any(|filter| filter.is_empty() || line.contains(&self.grammar.marker(filter)))
    }
}

// =============================================================================
// TESTS
// =============================================================================
