//! Entry Model
//!
//! One documentation block's annotations plus the declaration it decorates.
//! What the block decorates is a [`Target`]: nothing, a type, a free
//! function, or a method. Classification predicates are derived from it, so
//! an entry can never be two kinds at once.
//!
//! @module index/entry

use serde::{Deserialize, Serialize, Serializer};

use crate::annotation::Annotation;
use crate::provider::Field;

// =============================================================================
// HEADER
// =============================================================================

/// Title line and prose of a documentation block
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Header {
    /// First-line tokens after the declared name
    pub title: String,
    /// Prose lines of the block, comment markers stripped
    pub description: String,
}

// =============================================================================
// TARGET
// =============================================================================

/// A function with its resolved signature
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Function {
    pub name: String,
    pub parameters: Vec<Field>,
    pub results: Vec<Field>,
}

/// The declaration a block is bound to
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Target {
    /// No declaration matched; only provenance is known
    #[default]
    Bare,
    Type {
        struct_name: String,
    },
    Func(Function),
    Method {
        struct_name: String,
        func: Function,
    },
}

// =============================================================================
// ENTRY
// =============================================================================

/// An indexed documentation block
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Entry {
    pub header: Header,
    /// Module path, empty when the provider does not know it
    pub module: String,
    pub file: String,
    /// Package import path
    pub path: String,
    /// Package short name
    pub package: String,
    pub target: Target,
    pub annotations: Vec<Annotation>,
}

impl Entry {
    pub fn struct_name(&self) -> Option<&str> {
        match &self.target {
            Target::Type { struct_name } | Target::Method { struct_name, .. } => {
                Some(struct_name)
            }
            Target::Bare | Target::Func(_) => None,
        }
    }

    pub fn function(&self) -> Option<&Function> {
        match &self.target {
            Target::Func(func) | Target::Method { func, .. } => Some(func),
            Target::Bare | Target::Type { .. } => None,
        }
    }

    pub fn func_name(&self) -> Option<&str> {
        self.function().map(|f| f.name.as_str())
    }

    pub fn parameters(&self) -> &[Field] {
        self.function().map(|f| f.parameters.as_slice()).unwrap_or(&[])
    }

    pub fn results(&self) -> &[Field] {
        self.function().map(|f| f.results.as_slice()).unwrap_or(&[])
    }

    pub fn is_type(&self) -> bool {
        matches!(self.target, Target::Type { .. })
    }

    pub fn is_func(&self) -> bool {
        matches!(self.target, Target::Func(_))
    }

    pub fn is_method(&self) -> bool {
        matches!(self.target, Target::Method { .. })
    }

    pub fn is_bare(&self) -> bool {
        matches!(self.target, Target::Bare)
    }

    /// First annotation named `name`
    pub fn annotation(&self, name: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.name == name)
    }

    /// Every annotation named `name`, in block order
    pub fn annotations_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Annotation> {
        self.annotations.iter().filter(move |a| a.name == name)
    }

    pub fn has_annotation(&self, name: &str) -> bool {
        self.annotations.iter().any(|a| a.name == name)
    }

    pub fn has_annotation_prefix(&self, prefix: &str) -> bool {
        self.annotations.iter().any(|a| a.name.starts_with(prefix))
    }

    pub fn has_result_type(&self, ty: &str) -> bool {
        self.results().iter().any(|r| r.ty == ty)
    }
}

// =============================================================================
// SERIALIZATION
// =============================================================================

/// Flat wire shape of an entry
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EntryRecord<'a> {
    header: &'a Header,
    module: &'a str,
    file: &'a str,
    path: &'a str,
    package: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    struct_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    func_name: Option<&'a str>,
    parameters: &'a [Field],
    results: &'a [Field],
    annotations: &'a [Annotation],
}

impl Serialize for Entry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        EntryRecord {
            header: &self.header,
            module: &self.module,
            file: &self.file,
            path: &self.path,
            package: &self.package,
            struct_name: self.struct_name(),
            func_name: self.func_name(),
            parameters: self.parameters(),
            results: self.results(),
            annotations: &self.annotations,
        }
        .serialize(serializer)
    }
}

// =============================================================================
// TESTS
// =============================================================================
