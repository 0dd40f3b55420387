//! Declaration Binder
//!
//! Turns the documentation blocks of a package into entries. A block binds
//! to the declaration the provider reports it as documenting; failing that,
//! to the first declaration named by the block's first word.
//!
//! @module scan/binder

use std::collections::HashSet;

use tracing::{debug, trace};

use crate::annotation::grammar::COMMENT_PREFIX;
use crate::annotation::AnnotationParser;
use crate::core::error::{Error, Result};
use crate::index::{Entry, Function, Header, Target};
use crate::provider::{
    CommentBlock, CompilationUnit, DeclKind, Declaration, Package, ProviderError, SourceProvider,
};

pub struct Binder<'a, P: ?Sized> {
    provider: &'a P,
    parser: &'a AnnotationParser,
}

impl<'a, P: SourceProvider + ?Sized> Binder<'a, P> {
    pub fn new(provider: &'a P, parser: &'a AnnotationParser) -> Self {
        Self { provider, parser }
    }

    /// Entries for every annotated block of `package`, in file then block order
    pub fn bind_package(&self, package: &Package) -> Result<Vec<Entry>> {
        let declarations = package
            .units
            .iter()
            .map(|unit| self.provider.enumerate_declarations(unit))
            .collect::<std::result::Result<Vec<_>, ProviderError>>()
            .map_err(|e| Error::resolution(&package.id, e))?;

        let type_names: HashSet<&str> = declarations
            .iter()
            .flatten()
            .filter(|d| d.is_type())
            .map(|d| d.name.as_str())
            .collect();

        let mut entries = Vec::new();
        for (unit, decls) in package.units.iter().zip(&declarations) {
            for block in &unit.comments {
                let scope = Scope {
                    package,
                    unit,
                    decls,
                    type_names: &type_names,
                };
                if let Some(entry) = self.bind_block(&scope, block)? {
                    entries.push(entry);
                }
            }
        }

        debug!(
            package = %package.id,
            files = package.units.len(),
            entries = entries.len(),
            "Bound package"
        );
        Ok(entries)
    }

    fn bind_block(&self, scope: &Scope<'_>, block: &CommentBlock) -> Result<Option<Entry>> {
        let annotations = self.parser.parse_block(&block.lines);
        if annotations.is_empty() {
            return Ok(None);
        }

        let (name, header) = self.header(&block.lines);

        let decl = scope
            .decls
            .iter()
            .find(|d| !d.doc.is_empty() && d.doc == block.lines)
            .or_else(|| name.and_then(|n| scope.decls.iter().find(|d| d.name == n)));

        let target = match decl {
            Some(decl) => self.target(scope, decl)?,
            None => {
                debug!(
                    file = %scope.unit.file,
                    name = name.unwrap_or_default(),
                    "No declaration for annotated block"
                );
                Target::Bare
            }
        };

        Ok(Some(Entry {
            header,
            module: scope.package.module.clone().unwrap_or_default(),
            file: scope.unit.file.clone(),
            path: scope.package.id.clone(),
            package: scope.package.name.clone(),
            target,
            annotations,
        }))
    }

    /// Expected declaration name and header of a block.
    ///
    /// A block opening with an annotation line names nothing and has no title.
    fn header<'l>(&self, lines: &'l [String]) -> (Option<&'l str>, Header) {
        let Some(first) = lines.first() else {
            return (None, Header::default());
        };

        let (name, title) = if self.parser.is_annotation_line(first) {
            (None, String::new())
        } else {
            let mut tokens = strip_comment(first).split_whitespace();
            let name = tokens.next();
            (name, tokens.collect::<Vec<_>>().join(" "))
        };

        let description = lines[1..]
            .iter()
            .filter(|line| !self.parser.is_annotation_line(line))
            .map(|line| strip_comment(line))
            .filter(|line| !line.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        (name, Header { title, description })
    }

    fn target(&self, scope: &Scope<'_>, decl: &Declaration) -> Result<Target> {
        match decl.kind {
            DeclKind::Type => Ok(Target::Type {
                struct_name: decl.name.clone(),
            }),
            DeclKind::Function => {
                let signature = self
                    .provider
                    .resolve_signature(scope.unit, decl)
                    .map_err(|e| Error::resolution(&scope.package.id, e))?;

                trace!(
                    func = %decl.name,
                    params = signature.parameters.len(),
                    results = signature.results.len(),
                    "Resolved signature"
                );

                let func = Function {
                    name: decl.name.clone(),
                    parameters: signature.parameters,
                    results: signature.results,
                };

                Ok(match &decl.receiver {
                    Some(receiver) if scope.type_names.contains(receiver.as_str()) => {
                        Target::Method {
                            struct_name: receiver.clone(),
                            func,
                        }
                    }
                    Some(receiver) => {
                        debug!(
                            func = %decl.name,
                            receiver = %receiver,
                            "Receiver type not declared in package, binding as function"
                        );
                        Target::Func(func)
                    }
                    None => Target::Func(func),
                })
            }
        }
    }
}

/// Per-unit binding context
struct Scope<'s> {
    package: &'s Package,
    unit: &'s CompilationUnit,
    decls: &'s [Declaration],
    type_names: &'s HashSet<&'s str>,
}

/// Comment text without its marker and the single space after it
fn strip_comment(line: &str) -> &str {
    let line = line.trim();
    match line.strip_prefix(COMMENT_PREFIX) {
        Some(rest) => rest.strip_prefix(' ').unwrap_or(rest).trim_end(),
        None => line,
    }
}

// =============================================================================
// TESTS
// =============================================================================
