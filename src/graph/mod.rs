//! Graph module: the fact model and the write path into a backend.
//!
//! Facts flow `visitor -> GraphDao -> GraphWriter -> GraphAccessor`.

pub mod dao;
pub mod statement;
pub mod types;
pub mod writer;

pub use dao::{GraphDao, RunStats};
pub use statement::{merge_edge, merge_node, Params, Statement};
pub use types::{Attributes, EdgeFact, Fact, NodeFact, NodeLabel, RelationKind, Scalar};
pub use writer::GraphWriter;
