//! Package Graph Walker
//!
//! Depth-first traversal of the import graph starting at a root package.
//! Every reachable package is loaded at most once per traversal; the visited
//! set is owned by the caller so several roots can share it.
//!
//! A package's imports are walked before the package itself is handed to the
//! visitor, so dependencies come out ahead of their dependents.
//!
//! @module scan/walker

use std::collections::HashSet;

use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::{debug, trace};

use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::provider::{Package, SourceProvider};

// =============================================================================
// FILTER
// =============================================================================

/// Which imports the walker may descend into
#[derive(Debug, Clone, Default)]
pub struct PackageFilter {
    /// Path substrings; empty admits everything
    allow: Vec<String>,
    /// Import prefixes matched on path element boundaries
    deny: Vec<String>,
}

impl PackageFilter {
    pub fn new(allow: Vec<String>, deny: Vec<String>) -> Self {
        Self { allow, deny }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.packages.clone().unwrap_or_default(),
            config.deny_prefixes.clone(),
        )
    }

    pub fn is_allowed(&self, id: &str) -> bool {
        self.allow.is_empty() || self.allow.iter().any(|a| id.contains(a.as_str()))
    }

    /// `id` equals a deny prefix or is nested under one
    pub fn is_denied(&self, id: &str) -> bool {
        self.deny.iter().any(|prefix| {
            id.strip_prefix(prefix.as_str())
                .map_or(false, |rest| rest.is_empty() || rest.starts_with('/'))
        })
    }

    pub fn admits(&self, id: &str) -> bool {
        self.is_allowed(id) && !self.is_denied(id)
    }
}

// =============================================================================
// VISITED SETS
// =============================================================================

/// Packages already claimed by a sequential traversal
#[derive(Debug, Default)]
pub struct Visited {
    ids: HashSet<String>,
}

impl Visited {
    /// Claim `id`. Returns false if it was already claimed.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.ids.contains(id) {
            return false;
        }
        self.ids.insert(id.to_string())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Visited set shared between rayon workers
#[derive(Debug, Default)]
pub struct ConcurrentVisited {
    ids: Mutex<HashSet<String>>,
}

impl ConcurrentVisited {
    /// Claim `id`. Exactly one caller wins for each id.
    pub fn insert(&self, id: &str) -> bool {
        let mut ids = self.ids.lock();
        if ids.contains(id) {
            return false;
        }
        ids.insert(id.to_string())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.lock().contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.lock().is_empty()
    }
}

// =============================================================================
// WALKER
// =============================================================================

pub struct PackageWalker<'a, P: ?Sized> {
    provider: &'a P,
    filter: &'a PackageFilter,
}

impl<'a, P: SourceProvider + ?Sized> PackageWalker<'a, P> {
    pub fn new(provider: &'a P, filter: &'a PackageFilter) -> Self {
        Self { provider, filter }
    }

    /// Walk everything reachable from `root`, calling `visit` once per package.
    ///
    /// The root itself is not filtered, but is skipped when already visited.
    /// A provider failure stops the walk.
    pub fn walk<F>(&self, root: &str, visited: &mut Visited, visit: &mut F) -> Result<()>
    where
        F: FnMut(&Package) -> Result<()>,
    {
        if !visited.insert(root) {
            debug!(package = %root, "Root already visited, skipping");
            return Ok(());
        }
        self.descend(root, visited, visit)
    }

    fn descend<F>(&self, id: &str, visited: &mut Visited, visit: &mut F) -> Result<()>
    where
        F: FnMut(&Package) -> Result<()>,
    {
        let package = self.load(id)?;

        for import in &package.imports {
            if !self.filter.admits(import) {
                trace!(package = %import, "Import filtered out");
                continue;
            }
            if !visited.insert(import) {
                continue;
            }
            self.descend(import, visited, visit)?;
        }

        visit(&package)
    }

    fn load(&self, id: &str) -> Result<Package> {
        let package = self
            .provider
            .load_package(id)
            .map_err(|e| Error::resolution(id, e))?;

        debug!(
            package = %package.id,
            files = package.units.len(),
            imports = package.imports.len(),
            "Loaded package"
        );
        Ok(package)
    }
}

impl<'a, P: SourceProvider + Sync + ?Sized> PackageWalker<'a, P> {
    /// Parallel variant of [`walk`](Self::walk).
    ///
    /// Imports of a package fan out over rayon. Each package is loaded and
    /// visited at most once, in no particular order: an import claimed by
    /// another branch may still be loading when its importer is visited.
    /// Only the root is guaranteed to be visited last.
    pub fn walk_parallel<F>(&self, root: &str, visited: &ConcurrentVisited, visit: &F) -> Result<()>
    where
        F: Fn(&Package) -> Result<()> + Sync,
    {
        if !visited.insert(root) {
            debug!(package = %root, "Root already visited, skipping");
            return Ok(());
        }
        self.descend_parallel(root, visited, visit)
    }

    fn descend_parallel<F>(&self, id: &str, visited: &ConcurrentVisited, visit: &F) -> Result<()>
    where
        F: Fn(&Package) -> Result<()> + Sync,
    {
        let package = self.load(id)?;

        package
            .imports
            .par_iter()
            .filter(|import| self.filter.admits(import))
            .filter(|import| visited.insert(import))
            .try_for_each(|import| self.descend_parallel(import, visited, visit))?;

        visit(&package)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::memory::{MemoryProvider, PackageFixture};
    use crate::provider::ProviderError;

    fn pkg(id: &str, imports: &[&str]) -> PackageFixture {
        let name = id.rsplit('/').next().unwrap_or(id);
        imports
            .iter()
            .fold(PackageFixture::new(id, name), |p, i| p.import(*i))
    }

    fn walk_ids(provider: &MemoryProvider, filter: &PackageFilter, roots: &[&str]) -> Vec<String> {
        let walker = PackageWalker::new(provider, filter);
        let mut visited = Visited::default();
        let mut order = Vec::new();
        for root in roots {
            walker
                .walk(root, &mut visited, &mut |p: &Package| {
                    order.push(p.id.clone());
                    Ok(())
                })
                .unwrap();
        }
        order
    }

    fn diamond() -> MemoryProvider {
        MemoryProvider::new()
            .with_package(pkg("ex.com/a", &["ex.com/b", "ex.com/c"]))
            .with_package(pkg("ex.com/b", &["ex.com/d"]))
            .with_package(pkg("ex.com/c", &["ex.com/d"]))
            .with_package(pkg("ex.com/d", &[]))
    }

    #[test]
    fn test_post_order_and_shared_import_loaded_once() {
        let provider = diamond();
        let order = walk_ids(&provider, &PackageFilter::default(), &["ex.com/a"]);

        assert_eq!(order, vec!["ex.com/d", "ex.com/b", "ex.com/c", "ex.com/a"]);
        assert_eq!(provider.loads(), vec!["ex.com/a", "ex.com/b", "ex.com/d", "ex.com/c"]);
    }

    #[test]
    fn test_cycle_terminates() {
        let provider = MemoryProvider::new()
            .with_package(pkg("ex.com/a", &["ex.com/b"]))
            .with_package(pkg("ex.com/b", &["ex.com/a"]));

        let order = walk_ids(&provider, &PackageFilter::default(), &["ex.com/a"]);
        assert_eq!(order, vec!["ex.com/b", "ex.com/a"]);
        assert_eq!(provider.load_count("ex.com/a"), 1);
        assert_eq!(provider.load_count("ex.com/b"), 1);
    }

    #[test]
    fn test_roots_share_visited_set() {
        let provider = diamond();
        let order = walk_ids(
            &provider,
            &PackageFilter::default(),
            &["ex.com/b", "ex.com/a", "ex.com/b"],
        );
        assert_eq!(order, vec!["ex.com/d", "ex.com/b", "ex.com/c", "ex.com/a"]);
        for id in ["ex.com/a", "ex.com/b", "ex.com/c", "ex.com/d"] {
            assert_eq!(provider.load_count(id), 1, "{}", id);
        }
    }

    #[test]
    fn test_deny_prefix_on_path_boundary() {
        let filter = PackageFilter::new(vec![], vec!["net".to_string()]);
        assert!(filter.is_denied("net"));
        assert!(filter.is_denied("net/http"));
        assert!(!filter.is_denied("netlify.com/sdk"));
        assert!(filter.admits("example.com/net"));
    }

    #[test]
    fn test_denied_imports_not_loaded() {
        let provider = MemoryProvider::new()
            .with_package(pkg("ex.com/a", &["fmt", "net/http", "ex.com/b"]))
            .with_package(pkg("ex.com/b", &[]));
        let filter = PackageFilter::from_config(&Config::default());

        let order = walk_ids(&provider, &filter, &["ex.com/a"]);
        assert_eq!(order, vec!["ex.com/b", "ex.com/a"]);
        assert_eq!(provider.load_count("fmt"), 0);
        assert_eq!(provider.load_count("net/http"), 0);
    }

    #[test]
    fn test_allow_list_substring() {
        let provider = MemoryProvider::new()
            .with_package(pkg("ex.com/a", &["other.org/x", "ex.com/b"]))
            .with_package(pkg("ex.com/b", &[]))
            .with_package(pkg("other.org/x", &[]));
        let filter = PackageFilter::new(vec!["ex.com".to_string()], vec![]);

        let order = walk_ids(&provider, &filter, &["ex.com/a"]);
        assert_eq!(order, vec!["ex.com/b", "ex.com/a"]);
        assert_eq!(provider.load_count("other.org/x"), 0);
    }

    #[test]
    fn test_root_is_not_filtered() {
        let provider = MemoryProvider::new().with_package(pkg("internal/tool", &[]));
        let filter = PackageFilter::new(vec!["ex.com".to_string()], vec!["internal".to_string()]);

        let order = walk_ids(&provider, &filter, &["internal/tool"]);
        assert_eq!(order, vec!["internal/tool"]);
    }

    #[test]
    fn test_provider_failure_aborts() {
        let provider = MemoryProvider::new().with_package(pkg("ex.com/a", &["ex.com/missing"]));
        let filter = PackageFilter::default();
        let walker = PackageWalker::new(&provider, &filter);

        let mut visits = 0;
        let err = walker
            .walk("ex.com/a", &mut Visited::default(), &mut |_: &Package| {
                visits += 1;
                Ok(())
            })
            .unwrap_err();

        assert_eq!(visits, 0);
        match err {
            Error::Resolution { package, source } => {
                assert_eq!(package, "ex.com/missing");
                assert!(matches!(source, ProviderError::NotFound { .. }));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_parallel_walk_visits_each_package_once() {
        let provider = diamond()
            .with_package(pkg("ex.com/e", &["ex.com/a", "ex.com/d"]));
        let filter = PackageFilter::default();
        let walker = PackageWalker::new(&provider, &filter);
        let visited = ConcurrentVisited::default();
        let order = Mutex::new(Vec::new());

        walker
            .walk_parallel("ex.com/e", &visited, &|p: &Package| {
                order.lock().push(p.id.clone());
                Ok(())
            })
            .unwrap();

        let order = order.into_inner();
        assert_eq!(order.len(), 5);
        assert_eq!(order.last().map(String::as_str), Some("ex.com/e"));
        assert_eq!(visited.len(), 5);
        for id in ["ex.com/a", "ex.com/b", "ex.com/c", "ex.com/d", "ex.com/e"] {
            assert_eq!(provider.load_count(id), 1, "{}", id);
        }
    }

    #[test]
    fn test_parallel_walk_cycle() {
        let provider = MemoryProvider::new()
            .with_package(pkg("ex.com/a", &["ex.com/b"]))
            .with_package(pkg("ex.com/b", &["ex.com/c"]))
            .with_package(pkg("ex.com/c", &["ex.com/a"]));
        let filter = PackageFilter::default();
        let walker = PackageWalker::new(&provider, &filter);
        let visited = ConcurrentVisited::default();

        walker
            .walk_parallel("ex.com/a", &visited, &|_: &Package| Ok(()))
            .unwrap();
        assert_eq!(provider.loads().len(), 3);
    }
}
