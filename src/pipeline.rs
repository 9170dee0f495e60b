//! One generation run, end to end.
//!
//! ```text
//! collect_sources ──▶ parse (rayon) ──▶ walk + delegate ──▶ GraphDao ──▶ accessor
//! ```
//!
//! Parsing is the only parallel stage. Traversal, filtering and writing run
//! on the calling thread, one file after another, in path order.

use ignore::WalkBuilder;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::ast::{default_registry, walk, NodeKindSet, SyntaxNode, VisitorDelegator, VisitorRegistry};
use crate::backend::embedded::SNAPSHOT_FILE;
use crate::backend::{open_accessor, GraphAccessor, GraphStore, StoreStats};
use crate::config::DepmapConfig;
use crate::error::{DepmapError, Result};
use crate::filter::CompositeFilter;
use crate::graph::{GraphDao, GraphWriter, RunStats};
use crate::parser::{is_java_source, read_and_parse};

/// All `.java` files under `root`, honouring `.gitignore`, sorted.
pub fn collect_sources(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .build()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
        .filter(|entry| is_java_source(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

/// Parse `files` in parallel. Files that cannot be read or parsed are
/// logged and counted, not fatal.
pub fn parse_sources(files: &[PathBuf]) -> (Vec<SyntaxNode>, usize) {
    let results: Vec<Result<SyntaxNode>> =
        files.par_iter().map(|path| read_and_parse(path)).collect();

    let mut units = Vec::with_capacity(results.len());
    let mut failed = 0;
    for (path, result) in files.iter().zip(results) {
        match result {
            Ok(unit) => units.push(unit),
            Err(e) => {
                failed += 1;
                warn!(path = %path.display(), error = %e, "skipping file");
            }
        }
    }
    (units, failed)
}

/// Per-run state: configuration, filter, registry and stop set, built once
/// and read-only while the run walks its trees.
pub struct Generator {
    config: DepmapConfig,
    filter: CompositeFilter,
    registry: VisitorRegistry,
    stop_set: NodeKindSet,
    rejected_rules: Vec<DepmapError>,
    store_base: PathBuf,
}

impl Generator {
    /// Validate `config` and build the filter and stop set from it.
    ///
    /// Rules that fail to compile do not fail construction; they are kept
    /// in [`Generator::rejected_rules`].
    pub fn new(config: DepmapConfig) -> Result<Self> {
        config.validate()?;
        let (filter, rejected_rules) = CompositeFilter::from_config(&config);
        let stop_set = config.stop_set()?;
        Ok(Self {
            config,
            filter,
            registry: default_registry(),
            stop_set,
            rejected_rules,
            store_base: PathBuf::from("."),
        })
    }

    /// Resolve a relative embedded store path against `base` instead of
    /// the working directory.
    pub fn with_store_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.store_base = base.into();
        self
    }

    /// Replace the standard visitors.
    pub fn with_registry(mut self, registry: VisitorRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &DepmapConfig {
        &self.config
    }

    /// The filter every qualified name goes through.
    pub fn filter(&self) -> &CompositeFilter {
        &self.filter
    }

    pub fn stop_set(&self) -> &NodeKindSet {
        &self.stop_set
    }

    /// Rules dropped because they did not compile.
    pub fn rejected_rules(&self) -> &[DepmapError] {
        &self.rejected_rules
    }

    /// Generate the graph for the sources under `root` using the backend
    /// the config selects. The accessor is always shut down, also when the
    /// run fails.
    pub fn generate(&self, root: &Path) -> Result<RunStats> {
        let mut accessor = open_accessor(&self.config, &self.store_base)?;
        accessor.config_auto_shutdown();
        accessor.startup()?;

        let result = self.generate_with(accessor.as_mut(), root);
        let closed = accessor.shutdown();
        let stats = result?;
        closed?;
        Ok(stats)
    }

    /// Generate against an accessor that is already `Ready`.
    pub fn generate_with(&self, accessor: &mut dyn GraphAccessor, root: &Path) -> Result<RunStats> {
        let started = Instant::now();
        let files = collect_sources(root);
        info!(root = %root.display(), files = files.len(), "sources collected");

        let (units, failed) = parse_sources(&files);
        let mut stats = self.run_units(accessor, &units)?;
        stats.files_parsed = units.len();
        stats.files_failed = failed;

        info!(
            backend = accessor.backend_name(),
            files = stats.files_parsed,
            nodes = stats.nodes_written,
            edges = stats.edges_written,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "generation complete"
        );
        Ok(stats)
    }

    /// Walk already-lowered trees and write what they yield.
    pub fn run_units(&self, accessor: &mut dyn GraphAccessor, units: &[SyntaxNode]) -> Result<RunStats> {
        self.write_units(accessor, units).map_err(|e| {
            error!(class = %e.class(), error = %e, "generation aborted");
            e
        })
    }

    fn write_units(&self, accessor: &mut dyn GraphAccessor, units: &[SyntaxNode]) -> Result<RunStats> {
        let writer = GraphWriter::new(accessor, self.config.batch_size);
        let mut dao = GraphDao::begin(writer, &self.filter, self.config.pre_execution())?;

        let mut visitor_faults = 0;
        for unit in units {
            let mut delegator = VisitorDelegator::new(&self.registry, &self.stop_set);
            walk(unit, &mut delegator);
            visitor_faults += delegator.stats().visitor_faults;
            for fact in delegator.take_facts() {
                dao.accept(fact)?;
            }
        }

        let mut stats = dao.finish()?;
        stats.visitor_faults = visitor_faults;
        Ok(stats)
    }
}

/// Node and relationship counts of the configured embedded store, read
/// from its last snapshot. `None` when no snapshot exists there.
///
/// Read-only: takes no lock and creates nothing on disk. Snapshots are
/// replaced atomically, so a concurrent run cannot hand back a torn file.
pub fn store_stats(config: &DepmapConfig, base: &Path) -> Result<Option<StoreStats>> {
    if !config.use_embedded_backend {
        return Err(DepmapError::Config(
            "store statistics need the embedded backend".to_string(),
        ));
    }
    let snapshot = config.resolve_store_path(base).join(SNAPSHOT_FILE);
    if !snapshot.is_file() {
        debug!(path = %snapshot.display(), "no store snapshot");
        return Ok(None);
    }
    Ok(Some(GraphStore::load(&snapshot)?.stats()))
}
