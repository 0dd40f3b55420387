//! Collector
//!
//! Runs one indexing pass: walks every root through the provider, binds each
//! visited package and gathers the entries into a [`QueryIndex`].
//!
//! @module scan/collector

use std::time::Instant;

use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::info;

use super::binder::Binder;
use super::walker::{ConcurrentVisited, PackageFilter, PackageWalker, Visited};
use crate::annotation::AnnotationParser;
use crate::core::config::Config;
use crate::core::error::Result;
use crate::index::{Entry, QueryIndex};
use crate::provider::{Package, SourceProvider};

pub struct Collector<P> {
    provider: P,
    config: Config,
    parser: AnnotationParser,
    filter: PackageFilter,
}

impl<P: SourceProvider> Collector<P> {
    /// Validate `config` and prepare a collector over `provider`
    pub fn new(provider: P, config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            parser: config.parser(),
            filter: PackageFilter::from_config(&config),
            provider,
            config,
        })
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Index every package reachable from the configured roots.
    ///
    /// Entries follow traversal order: a package's dependencies come first,
    /// then its own files in order. Any provider failure discards the partial
    /// index.
    pub fn run(&self) -> Result<QueryIndex> {
        let start = Instant::now();
        info!(roots = self.config.roots.len(), "Starting annotation scan");

        let walker = PackageWalker::new(&self.provider, &self.filter);
        let binder = Binder::new(&self.provider, &self.parser);
        let mut visited = Visited::default();
        let mut entries = Vec::new();

        for root in &self.config.roots {
            walker.walk(root, &mut visited, &mut |package: &Package| {
                entries.extend(binder.bind_package(package)?);
                Ok(())
            })?;
        }

        let index = QueryIndex::from_entries(entries);
        info!(
            packages = visited.len(),
            stats = %index.stats(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Annotation scan complete"
        );
        Ok(index)
    }
}

impl<P: SourceProvider + Sync> Collector<P> {
    /// Parallel variant of [`run`](Self::run).
    ///
    /// Roots and imports fan out over rayon. Within a package entries keep
    /// file and block order; packages are ordered by import path.
    pub fn run_parallel(&self) -> Result<QueryIndex> {
        let start = Instant::now();
        info!(
            roots = self.config.roots.len(),
            "Starting parallel annotation scan"
        );

        let walker = PackageWalker::new(&self.provider, &self.filter);
        let binder = Binder::new(&self.provider, &self.parser);
        let visited = ConcurrentVisited::default();
        let bound: Mutex<Vec<(String, Vec<Entry>)>> = Mutex::new(Vec::new());

        self.config.roots.par_iter().try_for_each(|root| {
            walker.walk_parallel(root, &visited, &|package: &Package| {
                let entries = binder.bind_package(package)?;
                bound.lock().push((package.id.clone(), entries));
                Ok(())
            })
        })?;

        let mut bound = bound.into_inner();
        bound.sort_by(|a, b| a.0.cmp(&b.0));

        let index =
            QueryIndex::from_entries(bound.into_iter().flat_map(|(_, entries)| entries).collect());
        info!(
            packages = visited.len(),
            stats = %index.stats(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Parallel annotation scan complete"
        );
        Ok(index)
    }
}

/// Build an index in one call
pub fn collect<P: SourceProvider>(provider: P, config: Config) -> Result<QueryIndex> {
    Collector::new(provider, config)?.run()
}

// =============================================================================
// TESTS
// =============================================================================
