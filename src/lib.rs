//! # depmap
//!
//! Dependency map generator. Walks Java syntax trees, extracts types,
//! methods and calls, filters them through allow/block rules, and writes
//! what is admitted into a graph database with idempotent MERGE statements.
//!
//! ## Pipeline
//!
//! - **Producer**: [`parser`] lowers `.java` files to [`SyntaxNode`] trees.
//! - **Traversal**: [`VisitorDelegator`] prunes kinds in the stop set and
//!   hands the rest to the [`VisitorRegistry`].
//! - **Filter**: [`CompositeFilter`] admits or rejects qualified names.
//! - **Write path**: [`GraphDao`] → [`GraphWriter`] → [`GraphAccessor`],
//!   either [`EmbeddedAccessor`] (local store) or [`RestAccessor`] (HTTP).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use depmap::{DepmapConfig, Generator};
//! use std::path::Path;
//!
//! let config = DepmapConfig::load(Path::new("depmap.toml"))?;
//! let stats = Generator::new(config)?.generate(Path::new("."))?;
//! println!("{} nodes, {} edges", stats.nodes_written, stats.edges_written);
//! # Ok::<(), depmap::DepmapError>(())
//! ```

pub mod ast;
pub mod backend;
pub mod config;
pub mod error;
pub mod filter;
pub mod graph;
pub mod parser;
pub mod pipeline;

// Re-exports for convenience
pub use error::{DepmapError, ErrorClass, Result};

pub use ast::{
    default_registry, walk, AstKind, AstNode, AstWalker, NodeKindSet, NodeVisitor, SyntaxNode,
    VisitorDelegator, VisitorRegistry,
};
pub use backend::{
    open_accessor, EmbeddedAccessor, GraphAccessor, GraphStore, RestAccessor, SessionState,
    StoreStats,
};
pub use config::DepmapConfig;
pub use filter::{CompositeFilter, MatchRule};
pub use graph::{
    EdgeFact, Fact, GraphDao, GraphWriter, NodeFact, NodeLabel, RelationKind, RunStats, Statement,
};
pub use pipeline::{collect_sources, store_stats, Generator};
