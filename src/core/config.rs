//! Configuration management
//!
//! What to scan and which annotations to keep. Loaded from TOML or built in
//! code; either way [`Config::validate`] runs before a scan starts.
//!
//! @module core/config

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::annotation::{AnnotationParser, Grammar};
use crate::core::error::{Error, Result};

/// Environment variable naming a config file, checked by [`Config::discover`]
pub const CONFIG_ENV: &str = "ANNOSCAN_CONFIG";

/// File name looked up by [`Config::discover`]
pub const CONFIG_FILE: &str = "annoscan.toml";

/// Top-level roots of the Go standard library, plus cgo and unsafe
const STDLIB_ROOTS: &[&str] = &[
    "archive", "bufio", "builtin", "bytes", "cmp", "compress", "container", "context", "crypto",
    "database", "debug", "embed", "encoding", "errors", "expvar", "flag", "fmt", "go", "hash",
    "html", "image", "index", "io", "iter", "log", "maps", "math", "mime", "net", "os", "path",
    "plugin", "reflect", "regexp", "runtime", "slices", "sort", "strconv", "strings", "sync",
    "syscall", "testing", "text", "time", "unicode", "unique", "unsafe", "C",
];

/// Scan configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root package identifiers
    pub roots: Vec<String>,
    /// Package allow-list of path substrings. `None` admits every package.
    pub packages: Option<Vec<String>>,
    /// Import prefixes never descended into
    pub deny_prefixes: Vec<String>,
    /// Annotation name allow-list. `None` keeps every annotation.
    pub filters: Option<Vec<String>>,
    pub grammar: Grammar,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            roots: vec![],
            packages: None,
            deny_prefixes: STDLIB_ROOTS.iter().map(|s| s.to_string()).collect(),
            filters: None,
            grammar: Grammar::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Find the configuration for a project directory.
    ///
    /// `ANNOSCAN_CONFIG` wins when set; otherwise `<dir>/annoscan.toml` is
    /// read if it exists. Returns `None` when neither is present.
    pub fn discover(dir: impl AsRef<Path>) -> Result<Option<Self>> {
        match Self::config_path(dir.as_ref()) {
            Some(path) => Self::load(path).map(Some),
            None => Ok(None),
        }
    }

    fn config_path(dir: &Path) -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        let path = dir.join(CONFIG_FILE);
        path.exists().then_some(path)
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject configurations a scan cannot start from
    pub fn validate(&self) -> Result<()> {
        if self.roots.is_empty() {
            return Err(Error::config("at least one root package is required"));
        }
        if self.roots.iter().any(|r| r.trim().is_empty()) {
            return Err(Error::config("root package identifiers must not be empty"));
        }
        if matches!(&self.packages, Some(p) if p.is_empty()) {
            return Err(Error::config(
                "package list is empty; omit it to admit every package",
            ));
        }
        if matches!(&self.filters, Some(f) if f.is_empty()) {
            return Err(Error::config(
                "filter list is empty; omit it to keep every annotation",
            ));
        }
        if let Grammar::Sigil { sigil } = &self.grammar {
            if sigil.is_empty() || sigil.contains(char::is_whitespace) {
                return Err(Error::config(format!("invalid sigil `{}`", sigil)));
            }
        }
        Ok(())
    }

    /// Annotation parser for this configuration's grammar and filters
    pub fn parser(&self) -> AnnotationParser {
        AnnotationParser::new(self.grammar.clone(), self.filters.clone().unwrap_or_default())
    }
}

// =============================================================================
// BUILDER
// =============================================================================

/// Programmatic construction of a [`Config`]
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Add a root package
    pub fn root(mut self, id: impl Into<String>) -> Self {
        self.config.roots.push(id.into());
        self
    }

    pub fn roots<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.roots.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Restrict traversal to packages whose path contains one of `packages`
    pub fn packages<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.packages = Some(packages.into_iter().map(Into::into).collect());
        self
    }

    /// Keep only annotations whose line carries one of `filters`
    pub fn filters<I, S>(mut self, filters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.filters = Some(filters.into_iter().map(Into::into).collect());
        self
    }

    /// Replace the default deny-list
    pub fn deny_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.deny_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn grammar(mut self, grammar: Grammar) -> Self {
        self.config.grammar = grammar;
        self
    }

    /// Validate and return the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// =============================================================================
// TESTS
// =============================================================================
