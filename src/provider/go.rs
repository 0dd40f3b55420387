//! Go Module Provider
//!
//! Reads a Go module from disk and answers provider calls with tree-sitter:
//! - `go.mod` gives the module path, import paths map to directories below it
//! - package files are the non-test `.go` files of that directory
//! - signatures are rendered the way go/types prints them
//!   (`*net/http.Request`, `[]string`, local types qualified by package path)
//!
//! Rendering is textual. There is no type checking, so aliases and dot
//! imports are printed as written.
//!
//! Only packages of the module itself can be loaded. Imports of other
//! modules need to be kept out of the walk with the package allow-list.
//!
//! @module provider/go

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::WalkBuilder;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use tracing::{debug, trace};
use tree_sitter::{Node, Parser, Tree};

use super::{
    CommentBlock, CompilationUnit, DeclKind, Declaration, Field, Package, ProviderError,
    Signature, SourceProvider,
};

static RE_MODULE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^\s*module\s+"?([^\s"]+)"?"#).unwrap());

static RE_MAJOR_VERSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^v[0-9]+$").unwrap());

static RE_GOPKG_VERSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.v[0-9]+$").unwrap());

/// Types go/types prints without a package qualifier
const PREDECLARED: &[&str] = &[
    "any", "bool", "byte", "comparable", "complex64", "complex128", "error", "float32",
    "float64", "int", "int8", "int16", "int32", "int64", "rune", "string", "uint", "uint8",
    "uint16", "uint32", "uint64", "uintptr",
];

// =============================================================================
// PROVIDER
// =============================================================================

/// Provider for a Go module rooted at a directory containing `go.mod`
#[derive(Debug)]
pub struct GoProvider {
    root: PathBuf,
    module: String,
    /// Per-file results of the last load, keyed by (package path, file name)
    units: Mutex<HashMap<(String, String), Arc<UnitCache>>>,
}

/// What one parse of a file yields beyond its comment groups
#[derive(Debug, Default)]
struct UnitCache {
    declarations: Vec<Declaration>,
    /// Function and method signatures by declaration start byte
    signatures: HashMap<usize, Signature>,
}

impl UnitCache {
    fn build(root: Node<'_>, src: &[u8], package_path: &str) -> (Vec<CommentBlock>, Self) {
        let scan = scan_file(root, src);
        let cache = Self {
            declarations: scan.declarations,
            signatures: signatures_of(root, src, package_path),
        };
        (scan.comments, cache)
    }
}

impl GoProvider {
    /// Open the module at `root`, reading its path from `go.mod`
    pub fn open(root: impl AsRef<Path>) -> Result<Self, ProviderError> {
        let root = root.as_ref().to_path_buf();
        let go_mod = root.join("go.mod");
        let content = std::fs::read_to_string(&go_mod).map_err(|source| ProviderError::Io {
            path: go_mod.clone(),
            source,
        })?;

        let module = parse_module_path(&content).ok_or_else(|| ProviderError::Parse {
            file: go_mod.display().to_string(),
            message: "no module directive".to_string(),
        })?;

        debug!(root = %root.display(), module = %module, "Opened Go module");
        Ok(Self::new(root, module))
    }

    /// Module at `root` with an explicit module path
    pub fn new(root: impl AsRef<Path>, module: impl Into<String>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            module: module.into(),
            units: Mutex::new(HashMap::new()),
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Canonical import path and directory for `id`.
    ///
    /// Accepts module import paths and `./`-relative paths.
    fn locate(&self, id: &str) -> Result<(String, PathBuf), ProviderError> {
        let rel = if id == "." || id == self.module {
            ""
        } else if let Some(rest) = id.strip_prefix("./") {
            rest
        } else if let Some(rest) = id
            .strip_prefix(self.module.as_str())
            .and_then(|r| r.strip_prefix('/'))
        {
            rest
        } else {
            return Err(ProviderError::OutsideModule {
                id: id.to_string(),
                module: self.module.clone(),
            });
        };

        let rel = rel.trim_end_matches('/');
        if rel.is_empty() {
            Ok((self.module.clone(), self.root.clone()))
        } else {
            Ok((format!("{}/{}", self.module, rel), self.root.join(rel)))
        }
    }

    /// Non-test Go files directly inside `dir`, sorted by name
    fn package_files(&self, dir: &Path) -> Vec<PathBuf> {
        let walker = WalkBuilder::new(dir)
            .max_depth(Some(1))
            .hidden(true)
            .git_ignore(true)
            .require_git(false)
            .build();

        let mut files: Vec<PathBuf> = walker
            .flatten()
            .map(|entry| entry.into_path())
            .filter(|path| is_package_file(path))
            .collect();
        files.sort();
        files
    }

    /// Cached declarations and signatures for `unit`, parsing it only when
    /// it was not loaded through this provider
    fn unit_cache(&self, unit: &CompilationUnit) -> Result<Arc<UnitCache>, ProviderError> {
        let key = (unit.path.clone(), unit.file.clone());
        if let Some(cached) = self.units.lock().get(&key) {
            return Ok(Arc::clone(cached));
        }

        let mut parser = go_parser()?;
        let tree = parse(&mut parser, &unit.source, &unit.file)?;
        let (_, cache) = UnitCache::build(tree.root_node(), unit.source.as_bytes(), &unit.path);
        let cache = Arc::new(cache);
        self.units.lock().insert(key, Arc::clone(&cache));
        Ok(cache)
    }
}

fn is_package_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    path.is_file() && name.ends_with(".go") && !name.ends_with("_test.go")
}

fn parse_module_path(go_mod: &str) -> Option<String> {
    RE_MODULE.captures(go_mod).map(|caps| caps[1].to_string())
}

impl SourceProvider for GoProvider {
    fn load_package(&self, id: &str) -> Result<Package, ProviderError> {
        let (path, dir) = self.locate(id)?;
        let files = self.package_files(&dir);
        if files.is_empty() {
            return Err(ProviderError::NotFound { id: id.to_string() });
        }

        let mut parser = go_parser()?;
        let mut name = String::new();
        let mut imports = Vec::new();
        let mut seen = HashSet::new();
        let mut units = Vec::with_capacity(files.len());

        for file in &files {
            let source = std::fs::read_to_string(file).map_err(|source| ProviderError::Io {
                path: file.clone(),
                source,
            })?;
            let file_name = file
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();

            let tree = parse(&mut parser, &source, &file_name)?;
            let root = tree.root_node();
            let src = source.as_bytes();

            if name.is_empty() {
                name = package_name(root, src).unwrap_or_default();
            }
            for spec in file_imports(root, src) {
                if seen.insert(spec.path.clone()) {
                    imports.push(spec.path);
                }
            }

            let (comments, cache) = UnitCache::build(root, src, &path);
            trace!(
                file = %file_name,
                comments = comments.len(),
                declarations = cache.declarations.len(),
                "Scanned Go file"
            );

            self.units
                .lock()
                .insert((path.clone(), file_name.clone()), Arc::new(cache));
            units.push(CompilationUnit {
                file: file_name,
                path: path.clone(),
                source: Arc::from(source),
                comments,
            });
        }

        debug!(package = %path, files = units.len(), imports = imports.len(), "Loaded Go package");

        Ok(Package {
            id: path,
            name,
            module: Some(self.module.clone()),
            units,
            imports,
        })
    }

    fn enumerate_declarations(
        &self,
        unit: &CompilationUnit,
    ) -> Result<Vec<Declaration>, ProviderError> {
        Ok(self.unit_cache(unit)?.declarations.clone())
    }

    fn resolve_signature(
        &self,
        unit: &CompilationUnit,
        decl: &Declaration,
    ) -> Result<Signature, ProviderError> {
        self.unit_cache(unit)?
            .signatures
            .get(&decl.span.start)
            .cloned()
            .ok_or_else(|| ProviderError::MissingDeclaration {
                name: decl.name.clone(),
                file: unit.file.clone(),
            })
    }
}

// =============================================================================
// PARSING
// =============================================================================

fn go_parser() -> Result<Parser, ProviderError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_go::LANGUAGE.into())
        .map_err(|e| ProviderError::Parse {
            file: String::new(),
            message: e.to_string(),
        })?;
    Ok(parser)
}

fn parse(parser: &mut Parser, source: &str, file: &str) -> Result<Tree, ProviderError> {
    parser
        .parse(source, None)
        .ok_or_else(|| ProviderError::Parse {
            file: file.to_string(),
            message: "parser returned no tree".to_string(),
        })
}

fn text<'a>(node: Node<'_>, src: &'a [u8]) -> &'a str {
    node.utf8_text(src).unwrap_or_default()
}

fn package_name(root: Node<'_>, src: &[u8]) -> Option<String> {
    let mut cursor = root.walk();
    let clause = root
        .named_children(&mut cursor)
        .find(|n| n.kind() == "package_clause")?;
    let mut inner = clause.walk();
    let ident = clause
        .named_children(&mut inner)
        .find(|n| n.kind() == "package_identifier")?;
    Some(text(ident, src).to_string())
}

struct ImportSpec {
    alias: Option<String>,
    path: String,
}

impl ImportSpec {
    /// Name the import is referred to by in source
    fn local_name(&self) -> String {
        if let Some(alias) = &self.alias {
            return alias.clone();
        }
        let mut segments = self.path.rsplit('/');
        let mut last = segments.next().unwrap_or_default();
        if RE_MAJOR_VERSION.is_match(last) {
            last = segments.next().unwrap_or(last);
        }
        let last = RE_GOPKG_VERSION.replace(last, "");
        last.strip_prefix("go-").unwrap_or(&last).to_string()
    }
}

fn file_imports(root: Node<'_>, src: &[u8]) -> Vec<ImportSpec> {
    fn collect(node: Node<'_>, src: &[u8], out: &mut Vec<ImportSpec>) {
        if node.kind() == "import_spec" {
            if let Some(path) = node.child_by_field_name("path") {
                out.push(ImportSpec {
                    alias: node
                        .child_by_field_name("name")
                        .map(|n| text(n, src).to_string()),
                    path: text(path, src).trim_matches(|c| c == '"' || c == '`').to_string(),
                });
            }
            return;
        }
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            collect(child, src, out);
        }
    }

    let mut specs = Vec::new();
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        if child.kind() == "import_declaration" {
            collect(child, src, &mut specs);
        }
    }
    specs
}

/// Local import name -> import path
fn import_map(root: Node<'_>, src: &[u8]) -> HashMap<String, String> {
    file_imports(root, src)
        .into_iter()
        .map(|spec| (spec.local_name(), spec.path))
        .collect()
}

// =============================================================================
// FILE SCAN
// =============================================================================

#[derive(Default)]
struct FileScan {
    comments: Vec<CommentBlock>,
    declarations: Vec<Declaration>,
}

struct OpenGroup {
    lines: Vec<String>,
    end_row: usize,
}

/// Groups comments among sibling nodes.
///
/// Comments on adjacent rows form one group. A group documents the code
/// node that starts on the row right after it. Comments trailing code on
/// the same row belong to no group.
#[derive(Default)]
struct CommentGrouper {
    open: Option<OpenGroup>,
    code_end_row: Option<usize>,
}

impl CommentGrouper {
    fn comment(&mut self, node: Node<'_>, src: &[u8], out: &mut Vec<CommentBlock>) {
        let start_row = node.start_position().row;
        if self.code_end_row == Some(start_row) {
            return;
        }
        let lines = text(node, src).lines().map(|l| l.trim_end().to_string());
        let end_row = node.end_position().row;

        match self.open.as_mut() {
            Some(open) if open.end_row + 1 == start_row => {
                open.lines.extend(lines);
                open.end_row = end_row;
            }
            _ => {
                self.flush(out);
                self.open = Some(OpenGroup {
                    lines: lines.collect(),
                    end_row,
                });
            }
        }
    }

    /// Close the open group ahead of `node`, returning it as doc when attached
    fn code(&mut self, node: Node<'_>, out: &mut Vec<CommentBlock>) -> Vec<String> {
        let doc = match self.open.take() {
            Some(done) => {
                let attached = done.end_row + 1 == node.start_position().row;
                out.push(CommentBlock::new(done.lines.clone()));
                if attached {
                    done.lines
                } else {
                    Vec::new()
                }
            }
            None => Vec::new(),
        };
        self.code_end_row = Some(node.end_position().row);
        doc
    }

    fn flush(&mut self, out: &mut Vec<CommentBlock>) {
        if let Some(done) = self.open.take() {
            out.push(CommentBlock::new(done.lines));
        }
    }
}

/// Collect file-scope comment groups and declarations in one pass.
///
/// Groups inside a parenthesized `type ( ... )` block document its specs.
fn scan_file(root: Node<'_>, src: &[u8]) -> FileScan {
    let mut scan = FileScan::default();
    let mut grouper = CommentGrouper::default();

    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        if child.kind() == "comment" {
            grouper.comment(child, src, &mut scan.comments);
            continue;
        }
        let doc = grouper.code(child, &mut scan.comments);
        declarations_of(child, src, doc, &mut scan);
    }

    grouper.flush(&mut scan.comments);
    scan
}

fn declarations_of(node: Node<'_>, src: &[u8], doc: Vec<String>, scan: &mut FileScan) {
    let span = node.start_byte()..node.end_byte();
    match node.kind() {
        "function_declaration" => {
            if let Some(name) = node.child_by_field_name("name") {
                scan.declarations.push(Declaration {
                    kind: DeclKind::Function,
                    name: text(name, src).to_string(),
                    receiver: None,
                    doc,
                    span,
                });
            }
        }
        "method_declaration" => {
            if let Some(name) = node.child_by_field_name("name") {
                let receiver = node
                    .child_by_field_name("receiver")
                    .and_then(|list| receiver_type_name(list, src));
                scan.declarations.push(Declaration {
                    kind: DeclKind::Function,
                    name: text(name, src).to_string(),
                    receiver,
                    doc,
                    span,
                });
            }
        }
        "type_declaration" => {
            let mut tokens = node.walk();
            let grouped = node.children(&mut tokens).any(|n| n.kind() == "(");
            let mut grouper = CommentGrouper {
                open: None,
                code_end_row: Some(node.start_position().row),
            };

            let mut cursor = node.walk();
            for spec in node.named_children(&mut cursor) {
                match spec.kind() {
                    "comment" if grouped => grouper.comment(spec, src, &mut scan.comments),
                    "type_spec" | "type_alias" => {
                        let doc = if grouped {
                            grouper.code(spec, &mut scan.comments)
                        } else {
                            doc.clone()
                        };
                        if let Some(name) = spec.child_by_field_name("name") {
                            scan.declarations.push(Declaration {
                                kind: DeclKind::Type,
                                name: text(name, src).to_string(),
                                receiver: None,
                                doc,
                                span: spec.start_byte()..spec.end_byte(),
                            });
                        }
                    }
                    _ => {}
                }
            }
            grouper.flush(&mut scan.comments);
        }
        _ => {}
    }
}

/// Rendered signature of every function and method, by start byte
fn signatures_of(root: Node<'_>, src: &[u8], package_path: &str) -> HashMap<usize, Signature> {
    let imports = import_map(root, src);
    let mut cursor = root.walk();
    root.named_children(&mut cursor)
        .filter(|n| matches!(n.kind(), "function_declaration" | "method_declaration"))
        .map(|func| {
            let renderer = TypeRenderer::new(src, package_path, &imports, func);
            (func.start_byte(), renderer.signature(func))
        })
        .collect()
}

/// `(s *Server[T])` -> `Server`
fn receiver_type_name(list: Node<'_>, src: &[u8]) -> Option<String> {
    let mut cursor = list.walk();
    let param = list
        .named_children(&mut cursor)
        .find(|n| n.kind() == "parameter_declaration")?;
    let mut ty = param.child_by_field_name("type")?;
    loop {
        match ty.kind() {
            "pointer_type" | "parenthesized_type" => ty = ty.named_child(0)?,
            "generic_type" => ty = ty.child_by_field_name("type")?,
            "type_identifier" => return Some(text(ty, src).to_string()),
            _ => return None,
        }
    }
}

// =============================================================================
// SIGNATURE RENDERING
// =============================================================================

/// Renders type nodes in go/types notation
struct TypeRenderer<'a> {
    src: &'a [u8],
    package_path: &'a str,
    imports: &'a HashMap<String, String>,
    type_params: HashSet<String>,
}

impl<'a> TypeRenderer<'a> {
    fn new(
        src: &'a [u8],
        package_path: &'a str,
        imports: &'a HashMap<String, String>,
        func: Node<'_>,
    ) -> Self {
        let mut renderer = Self {
            src,
            package_path,
            imports,
            type_params: HashSet::new(),
        };
        renderer.collect_type_params(func);
        renderer
    }

    /// Type parameters are printed bare, never package qualified
    fn collect_type_params(&mut self, func: Node<'_>) {
        if let Some(list) = func.child_by_field_name("type_parameters") {
            let mut cursor = list.walk();
            for decl in list.named_children(&mut cursor) {
                let mut names = decl.walk();
                for name in decl.children_by_field_name("name", &mut names) {
                    self.type_params.insert(text(name, self.src).to_string());
                }
            }
        }

        // func (b *Box[T]) Get() T
        if let Some(receiver) = func.child_by_field_name("receiver") {
            let mut stack = vec![receiver];
            while let Some(node) = stack.pop() {
                if node.kind() == "type_arguments" || node.kind() == "type_parameter_list" {
                    let mut cursor = node.walk();
                    for arg in node.named_children(&mut cursor) {
                        let ident = if arg.named_child_count() > 0 && arg.kind() != "type_identifier" {
                            arg.named_child(0)
                        } else {
                            Some(arg)
                        };
                        if let Some(ident) = ident {
                            if matches!(ident.kind(), "type_identifier" | "identifier") {
                                self.type_params.insert(text(ident, self.src).to_string());
                            }
                        }
                    }
                    continue;
                }
                let mut cursor = node.walk();
                stack.extend(node.named_children(&mut cursor));
            }
        }
    }

    fn signature(&self, func: Node<'_>) -> Signature {
        let parameters = func
            .child_by_field_name("parameters")
            .map(|list| self.fields(list))
            .unwrap_or_default();

        let results = match func.child_by_field_name("result") {
            Some(list) if list.kind() == "parameter_list" => self.fields(list),
            Some(ty) => vec![Field::new("", self.render(ty))],
            None => Vec::new(),
        };

        Signature::new(parameters, results)
    }

    fn fields(&self, list: Node<'_>) -> Vec<Field> {
        let mut fields = Vec::new();
        let mut cursor = list.walk();

        for param in list.named_children(&mut cursor) {
            let Some(ty) = param.child_by_field_name("type") else {
                continue;
            };
            let ty = match param.kind() {
                "parameter_declaration" => self.render(ty),
                "variadic_parameter_declaration" => format!("[]{}", self.render(ty)),
                _ => continue,
            };

            let mut name_cursor = param.walk();
            let names: Vec<String> = param
                .children_by_field_name("name", &mut name_cursor)
                .map(|n| text(n, self.src).to_string())
                .collect();

            if names.is_empty() {
                fields.push(Field::new("", ty));
            } else {
                for name in names {
                    fields.push(Field::new(name, ty.clone()));
                }
            }
        }

        fields
    }

    fn render(&self, node: Node<'_>) -> String {
        match node.kind() {
            "type_identifier" => {
                let name = text(node, self.src);
                if PREDECLARED.contains(&name) || self.type_params.contains(name) {
                    name.to_string()
                } else {
                    format!("{}.{}", self.package_path, name)
                }
            }
            "qualified_type" => {
                let pkg = node
                    .child_by_field_name("package")
                    .map(|n| text(n, self.src))
                    .unwrap_or_default();
                let name = node
                    .child_by_field_name("name")
                    .map(|n| text(n, self.src))
                    .unwrap_or_default();
                let path = self.imports.get(pkg).map(String::as_str).unwrap_or(pkg);
                format!("{}.{}", path, name)
            }
            "pointer_type" => format!("*{}", self.render_child(node)),
            "parenthesized_type" => self.render_child(node),
            "slice_type" => format!("[]{}", self.render_field(node, "element")),
            "array_type" => format!(
                "[{}]{}",
                node.child_by_field_name("length")
                    .map(|n| text(n, self.src))
                    .unwrap_or_default(),
                self.render_field(node, "element")
            ),
            "map_type" => format!(
                "map[{}]{}",
                self.render_field(node, "key"),
                self.render_field(node, "value")
            ),
            "channel_type" => {
                let raw = text(node, self.src);
                let dir = if raw.starts_with("<-") {
                    "<-chan "
                } else if raw["chan".len().min(raw.len())..].trim_start().starts_with("<-") {
                    "chan<- "
                } else {
                    "chan "
                };
                format!("{}{}", dir, self.render_field(node, "value"))
            }
            "generic_type" => {
                let base = self.render_field(node, "type");
                let args = node
                    .child_by_field_name("type_arguments")
                    .map(|list| {
                        let mut cursor = list.walk();
                        list.named_children(&mut cursor)
                            .map(|arg| {
                                if arg.kind() == "type_elem" {
                                    self.render_child(arg)
                                } else {
                                    self.render(arg)
                                }
                            })
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default();
                format!("{}[{}]", base, args.join(", "))
            }
            "interface_type" if node.named_child_count() == 0 => "interface{}".to_string(),
            "struct_type" if is_empty_struct(node) => "struct{}".to_string(),
            _ => collapse_whitespace(text(node, self.src)),
        }
    }

    fn render_child(&self, node: Node<'_>) -> String {
        node.named_child(0)
            .map(|child| self.render(child))
            .unwrap_or_default()
    }

    fn render_field(&self, node: Node<'_>, field: &str) -> String {
        node.child_by_field_name(field)
            .map(|child| self.render(child))
            .unwrap_or_default()
    }
}

fn is_empty_struct(node: Node<'_>) -> bool {
    node.named_child(0)
        .map(|list| list.named_child_count() == 0)
        .unwrap_or(true)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

// =============================================================================
// TESTS
// =============================================================================
