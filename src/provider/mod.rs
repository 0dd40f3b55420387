//! Source Introspection Provider
//!
//! The indexer never parses or type checks source itself. Everything it
//! knows about packages, files, declarations and signatures comes through
//! [`SourceProvider`]. Two implementations ship with the crate:
//! - [`memory::MemoryProvider`]: fixtures built in code
//! - [`go::GoProvider`]: a Go module on disk, read with tree-sitter
//!
//! @module provider

pub mod go;
pub mod memory;

use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use go::GoProvider;
pub use memory::MemoryProvider;

// =============================================================================
// ERRORS
// =============================================================================

/// Failure reported by a provider
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("package not found: {id}")]
    NotFound { id: String },

    #[error("package {id} is outside module {module}")]
    OutsideModule { id: String, module: String },

    #[error("failed to parse {file}: {message}")]
    Parse { file: String, message: String },

    #[error("declaration {name} not found in {file}")]
    MissingDeclaration { name: String, file: String },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// =============================================================================
// PACKAGES
// =============================================================================

/// A loaded package
#[derive(Debug, Clone, Default)]
pub struct Package {
    /// Import path the package was loaded by
    pub id: String,
    /// Short package name (`package foo`)
    pub name: String,
    /// Module the package belongs to, if known
    pub module: Option<String>,
    /// Source files of the package
    pub units: Vec<CompilationUnit>,
    /// Import paths referenced by the package's files, deduplicated
    pub imports: Vec<String>,
}

/// One source file as seen by the provider
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    /// File name
    pub file: String,
    /// Import path of the owning package
    pub path: String,
    /// Full source text
    pub source: Arc<str>,
    /// File-scope comment groups in source order
    pub comments: Vec<CommentBlock>,
}

/// A run of adjacent comment lines
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommentBlock {
    /// Raw lines, comment markers included
    pub lines: Vec<String>,
}

impl CommentBlock {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

// =============================================================================
// DECLARATIONS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclKind {
    Type,
    Function,
}

/// A file-scope declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub kind: DeclKind,
    pub name: String,
    /// Receiver type name for methods, pointer and type arguments stripped
    pub receiver: Option<String>,
    /// Comment lines immediately preceding the declaration
    pub doc: Vec<String>,
    /// Byte range of the declaration within its unit's source
    pub span: Range<usize>,
}

impl Declaration {
    pub fn is_type(&self) -> bool {
        self.kind == DeclKind::Type
    }

    pub fn is_function(&self) -> bool {
        self.kind == DeclKind::Function
    }
}

/// A named, typed slot in a signature
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    /// May be empty for unnamed parameters and results
    pub name: String,
    /// Canonical type string
    #[serde(rename = "type")]
    pub ty: String,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
        }
    }
}

/// Resolved function signature
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Signature {
    pub parameters: Vec<Field>,
    pub results: Vec<Field>,
}

impl Signature {
    pub fn new(parameters: Vec<Field>, results: Vec<Field>) -> Self {
        Self {
            parameters,
            results,
        }
    }
}

// =============================================================================
// PROVIDER TRAIT
// =============================================================================

/// Parser and type checker the indexer relies on.
///
/// Calls are treated as stateless; the indexer does no caching, pooling or
/// retrying around them.
pub trait SourceProvider {
    /// Load a package by import path
    fn load_package(&self, id: &str) -> Result<Package, ProviderError>;

    /// File-scope declarations of `unit` in source order
    fn enumerate_declarations(
        &self,
        unit: &CompilationUnit,
    ) -> Result<Vec<Declaration>, ProviderError>;

    /// Ordered parameters and results of a function declaration
    fn resolve_signature(
        &self,
        unit: &CompilationUnit,
        decl: &Declaration,
    ) -> Result<Signature, ProviderError>;
}

impl<P: SourceProvider + ?Sized> SourceProvider for &P {
    fn load_package(&self, id: &str) -> Result<Package, ProviderError> {
        (**self).load_package(id)
    }

    fn enumerate_declarations(
        &self,
        unit: &CompilationUnit,
    ) -> Result<Vec<Declaration>, ProviderError> {
        (**self).enumerate_declarations(unit)
    }

    fn resolve_signature(
        &self,
        unit: &CompilationUnit,
        decl: &Declaration,
    ) -> Result<Signature, ProviderError> {
        (**self).resolve_signature(unit, decl)
    }
}
