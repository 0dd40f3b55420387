//! In-memory provider
//!
//! Packages, files and declarations assembled in code. Every
//! `load_package` call is recorded so traversal properties can be checked.
//!
//! @module provider/memory

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{
    CommentBlock, CompilationUnit, DeclKind, Declaration, Package, ProviderError, Signature,
    SourceProvider,
};

// =============================================================================
// FIXTURES
// =============================================================================

/// A package fixture
#[derive(Debug, Clone, Default)]
pub struct PackageFixture {
    id: String,
    name: String,
    module: Option<String>,
    imports: Vec<String>,
    files: Vec<FileFixture>,
}

impl PackageFixture {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn import(mut self, id: impl Into<String>) -> Self {
        self.imports.push(id.into());
        self
    }

    pub fn file(mut self, file: FileFixture) -> Self {
        self.files.push(file);
        self
    }
}

/// A source file fixture
#[derive(Debug, Clone, Default)]
pub struct FileFixture {
    name: String,
    comments: Vec<CommentBlock>,
    declarations: Vec<(Declaration, Option<Signature>)>,
}

impl FileFixture {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// A floating comment block, attached to nothing
    pub fn comment<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.comments.push(CommentBlock::new(lines));
        self
    }

    /// An undocumented type declaration
    pub fn type_decl(self, name: &str) -> Self {
        self.declare(DeclKind::Type, name, None, Vec::new(), None)
    }

    /// An undocumented function declaration
    pub fn func(self, name: &str, signature: Signature) -> Self {
        self.declare(DeclKind::Function, name, None, Vec::new(), Some(signature))
    }

    /// An undocumented method declaration
    pub fn method(self, receiver: &str, name: &str, signature: Signature) -> Self {
        self.declare(
            DeclKind::Function,
            name,
            Some(receiver),
            Vec::new(),
            Some(signature),
        )
    }

    /// A type declaration preceded by `doc`
    pub fn documented_type<S: AsRef<str>>(self, doc: &[S], name: &str) -> Self {
        self.documented(doc, DeclKind::Type, name, None, None)
    }

    /// A function declaration preceded by `doc`
    pub fn documented_func<S: AsRef<str>>(
        self,
        doc: &[S],
        name: &str,
        signature: Signature,
    ) -> Self {
        self.documented(doc, DeclKind::Function, name, None, Some(signature))
    }

    /// A method declaration preceded by `doc`
    pub fn documented_method<S: AsRef<str>>(
        self,
        doc: &[S],
        receiver: &str,
        name: &str,
        signature: Signature,
    ) -> Self {
        self.documented(doc, DeclKind::Function, name, Some(receiver), Some(signature))
    }

    fn documented<S: AsRef<str>>(
        mut self,
        doc: &[S],
        kind: DeclKind,
        name: &str,
        receiver: Option<&str>,
        signature: Option<Signature>,
    ) -> Self {
        let lines: Vec<String> = doc.iter().map(|l| l.as_ref().to_string()).collect();
        self.comments.push(CommentBlock::new(lines.clone()));
        self.declare(kind, name, receiver, lines, signature)
    }

    fn declare(
        mut self,
        kind: DeclKind,
        name: &str,
        receiver: Option<&str>,
        doc: Vec<String>,
        signature: Option<Signature>,
    ) -> Self {
        // Spans only need to identify the declaration within the fixture
        let idx = self.declarations.len();
        self.declarations.push((
            Declaration {
                kind,
                name: name.to_string(),
                receiver: receiver.map(str::to_string),
                doc,
                span: idx..idx + 1,
            },
            signature,
        ));
        self
    }
}

// =============================================================================
// PROVIDER
// =============================================================================

/// Provider over in-memory fixtures
#[derive(Debug, Default)]
pub struct MemoryProvider {
    packages: HashMap<String, PackageFixture>,
    loads: Mutex<Vec<String>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_package(mut self, package: PackageFixture) -> Self {
        self.packages.insert(package.id.clone(), package);
        self
    }

    /// Package ids in the order they were loaded
    pub fn loads(&self) -> Vec<String> {
        self.loads.lock().clone()
    }

    /// How many times `id` was loaded
    pub fn load_count(&self, id: &str) -> usize {
        self.loads.lock().iter().filter(|l| l.as_str() == id).count()
    }

    fn file_fixture(&self, unit: &CompilationUnit) -> Result<&FileFixture, ProviderError> {
        self.packages
            .get(&unit.path)
            .and_then(|pkg| pkg.files.iter().find(|f| f.name == unit.file))
            .ok_or_else(|| ProviderError::NotFound {
                id: format!("{}/{}", unit.path, unit.file),
            })
    }
}

impl SourceProvider for MemoryProvider {
    fn load_package(&self, id: &str) -> Result<Package, ProviderError> {
        self.loads.lock().push(id.to_string());

        let fixture = self
            .packages
            .get(id)
            .ok_or_else(|| ProviderError::NotFound { id: id.to_string() })?;

        let units = fixture
            .files
            .iter()
            .map(|file| CompilationUnit {
                file: file.name.clone(),
                path: fixture.id.clone(),
                source: Arc::from(""),
                comments: file.comments.clone(),
            })
            .collect();

        Ok(Package {
            id: fixture.id.clone(),
            name: fixture.name.clone(),
            module: fixture.module.clone(),
            units,
            imports: fixture.imports.clone(),
        })
    }

    fn enumerate_declarations(
        &self,
        unit: &CompilationUnit,
    ) -> Result<Vec<Declaration>, ProviderError> {
        let file = self.file_fixture(unit)?;
        Ok(file.declarations.iter().map(|(d, _)| d.clone()).collect())
    }

    fn resolve_signature(
        &self,
        unit: &CompilationUnit,
        decl: &Declaration,
    ) -> Result<Signature, ProviderError> {
        let file = self.file_fixture(unit)?;
        file.declarations
            .iter()
            .find(|(d, _)| d == decl)
            .and_then(|(_, sig)| sig.clone())
            .ok_or_else(|| ProviderError::MissingDeclaration {
                name: decl.name.clone(),
                file: unit.file.clone(),
            })
    }
}

// =============================================================================
// TESTS
// =============================================================================
