//! Turns admitted facts into graph writes.
//!
//! The DAO owns the run's ordering guarantees:
//!
//! 1. Pre-execution statements run first, one transaction each, in the
//!    order configured. Any failure aborts before a single fact is written.
//! 2. A node fact is written if the filter admits its qualified name.
//! 3. An edge fact is written only if the filter admits **both** endpoints.
//!    Edge statements merge their endpoints, so they may reach the backend
//!    before the node statements do.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use super::statement::{self, Statement};
use super::types::{EdgeFact, Fact, NodeFact, NodeLabel, RelationKind};
use super::writer::GraphWriter;
use crate::error::{DepmapError, Result};
use crate::filter::CompositeFilter;

/// Counters for one generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub files_parsed: usize,
    pub files_failed: usize,
    pub visitor_faults: usize,
    pub pre_statements: usize,
    pub nodes_written: usize,
    pub nodes_blocked: usize,
    pub edges_written: usize,
    pub edges_dropped: usize,
    pub duplicates_skipped: usize,
    pub statements: usize,
    pub batches: usize,
}

/// Write side of a run: filters facts, drops duplicates and dangling
/// edges, and hands statements to a [`GraphWriter`].
pub struct GraphDao<'a> {
    writer: GraphWriter<'a>,
    filter: &'a CompositeFilter,
    /// Filter decision per name, evaluated once.
    admitted: HashMap<String, bool>,
    nodes: HashSet<(NodeLabel, String)>,
    edges: HashSet<(RelationKind, String, String)>,
    stats: RunStats,
}

impl<'a> GraphDao<'a> {
    /// Run the pre-execution statements and return a DAO ready for facts.
    pub fn begin(
        mut writer: GraphWriter<'a>,
        filter: &'a CompositeFilter,
        pre_statements: &[String],
    ) -> Result<Self> {
        for text in pre_statements {
            info!("statement: \"{text}\"");
            writer
                .execute_now(Statement::raw(text.as_str()))
                .map_err(|e| DepmapError::PreExecution {
                    statement: text.clone(),
                    source: Box::new(e),
                })?;
        }
        Ok(Self {
            writer,
            filter,
            admitted: HashMap::new(),
            nodes: HashSet::new(),
            edges: HashSet::new(),
            stats: RunStats {
                pre_statements: pre_statements.len(),
                ..RunStats::default()
            },
        })
    }

    fn admits(&mut self, name: &str) -> bool {
        if let Some(&decision) = self.admitted.get(name) {
            return decision;
        }
        let decision = self.filter.admits(name);
        self.admitted.insert(name.to_string(), decision);
        decision
    }

    /// Route a fact to [`GraphDao::add_node`] or [`GraphDao::add_edge`].
    pub fn accept(&mut self, fact: Fact) -> Result<()> {
        match fact {
            Fact::Node(node) => self.add_node(node),
            Fact::Edge(edge) => self.add_edge(edge),
        }
    }

    pub fn add_node(&mut self, fact: NodeFact) -> Result<()> {
        if !self.admits(&fact.qualified_name) {
            self.stats.nodes_blocked += 1;
            return Ok(());
        }
        if !self.nodes.insert((fact.kind, fact.qualified_name.clone())) {
            self.stats.duplicates_skipped += 1;
            return Ok(());
        }
        self.writer.write(statement::merge_node(&fact))?;
        self.stats.nodes_written += 1;
        Ok(())
    }

    /// Write `fact` only if both endpoints are admitted. A dropped edge is
    /// counted, never an error.
    pub fn add_edge(&mut self, fact: EdgeFact) -> Result<()> {
        let from_ok = self.admits(&fact.from);
        let to_ok = self.admits(&fact.to);
        if !(from_ok && to_ok) {
            debug!(kind = %fact.kind, from = %fact.from, to = %fact.to, "edge dropped");
            self.stats.edges_dropped += 1;
            return Ok(());
        }
        let key = (fact.kind, fact.from.clone(), fact.to.clone());
        if !self.edges.insert(key) {
            self.stats.duplicates_skipped += 1;
            return Ok(());
        }
        self.writer.write(statement::merge_edge(&fact))?;
        self.stats.edges_written += 1;
        Ok(())
    }

    /// Whether `name` has been admitted so far in this run.
    pub fn was_admitted(&self, name: &str) -> bool {
        self.admitted.get(name).copied().unwrap_or(false)
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Flush everything pending and return the run's counters.
    pub fn finish(mut self) -> Result<RunStats> {
        self.writer.flush()?;
        self.stats.statements = self.writer.statements();
        self.stats.batches = self.writer.batches();
        Ok(self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::RecordingAccessor;
    use crate::backend::{EmbeddedAccessor, GraphAccessor};
    use crate::filter::MatchRule;

    const CLEAR: &str = "MATCH (n) DETACH DELETE n";

    fn acme_only() -> CompositeFilter {
        let mut filter = CompositeFilter::new(false);
        filter.add_allow(MatchRule::parse("@com.acme.").unwrap());
        filter
    }

    #[test]
    fn test_pre_execution_runs_first() {
        let mut accessor = RecordingAccessor::ready();
        let log = accessor.log.clone();
        let filter = CompositeFilter::default();
        let writer = GraphWriter::new(&mut accessor, 0);

        let mut dao = GraphDao::begin(writer, &filter, &[CLEAR.to_string()]).unwrap();
        dao.add_node(NodeFact::new(NodeLabel::Type, "com.acme.Foo")).unwrap();
        let stats = dao.finish().unwrap();

        let batches = log.lock().unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 1);
        assert_eq!(batches[0][0].statement, CLEAR);
        assert_eq!(batches[0][0].parameters, None);
        assert_eq!(stats.pre_statements, 1);
        assert_eq!(stats.nodes_written, 1);
    }

    #[test]
    fn test_pre_execution_failure_writes_nothing() {
        let mut accessor = RecordingAccessor::ready().failing_on(CLEAR);
        let log = accessor.log.clone();
        let filter = CompositeFilter::default();
        let writer = GraphWriter::new(&mut accessor, 0);

        let err = GraphDao::begin(writer, &filter, &[CLEAR.to_string()])
            .err()
            .unwrap();
        assert!(matches!(err, DepmapError::PreExecution { ref statement, .. } if statement == CLEAR));
        assert!(err.is_fatal());
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_edge_to_blocked_name_is_dropped() {
        let mut accessor = RecordingAccessor::ready();
        let log = accessor.log.clone();
        let filter = acme_only();
        let writer = GraphWriter::new(&mut accessor, 0);
        let mut dao = GraphDao::begin(writer, &filter, &[]).unwrap();

        dao.add_node(NodeFact::new(NodeLabel::Method, "com.acme.Foo.run")).unwrap();
        dao.add_node(NodeFact::new(NodeLabel::Method, "java.util.List.add")).unwrap();
        dao.add_edge(EdgeFact::new(
            RelationKind::Invokes,
            "com.acme.Foo.run",
            "java.util.List.add",
        ))
        .unwrap();
        dao.add_edge(EdgeFact::new(
            RelationKind::Invokes,
            "com.acme.Foo.run",
            "com.acme.Bar.save",
        ))
        .unwrap();

        assert!(dao.was_admitted("com.acme.Foo.run"));
        assert!(!dao.was_admitted("java.util.List.add"));
        let stats = dao.finish().unwrap();
        assert_eq!(stats.nodes_written, 1);
        assert_eq!(stats.nodes_blocked, 1);
        assert_eq!(stats.edges_written, 1);
        assert_eq!(stats.edges_dropped, 1);

        let texts = RecordingAccessor::texts(&log);
        let invokes = texts.iter().filter(|t| t.contains("INVOKES")).count();
        assert_eq!(invokes, 1);
        let batches = log.lock().unwrap();
        let params: Vec<_> = batches[0].iter().filter_map(|s| s.params()).collect();
        assert!(params
            .iter()
            .all(|p| p.get("to").map_or(true, |to| to != "java.util.List.add")));
    }

    #[test]
    fn test_edge_from_blocked_name_is_dropped() {
        let mut accessor = RecordingAccessor::ready();
        let log = accessor.log.clone();
        let filter = acme_only();
        let writer = GraphWriter::new(&mut accessor, 0);
        let mut dao = GraphDao::begin(writer, &filter, &[]).unwrap();

        dao.add_edge(EdgeFact::new(
            RelationKind::Invokes,
            "org.other.X.run",
            "com.acme.Y.save",
        ))
        .unwrap();

        assert!(!dao.was_admitted("org.other.X.run"));
        assert!(dao.was_admitted("com.acme.Y.save"));
        let stats = dao.finish().unwrap();
        assert_eq!(stats.edges_dropped, 1);
        assert_eq!(stats.edges_written, 0);
        assert_eq!(stats.statements, 0);
        assert!(RecordingAccessor::texts(&log).is_empty());
    }

    #[test]
    fn test_duplicate_facts_write_once() {
        let mut accessor = RecordingAccessor::ready();
        let filter = CompositeFilter::default();
        let writer = GraphWriter::new(&mut accessor, 0);
        let mut dao = GraphDao::begin(writer, &filter, &[]).unwrap();

        let node = NodeFact::new(NodeLabel::Type, "a.B");
        dao.accept(node.clone().into()).unwrap();
        dao.accept(node.into()).unwrap();
        let edge = EdgeFact::new(RelationKind::Invokes, "a.B.x", "a.B.y");
        dao.accept(edge.clone().into()).unwrap();
        dao.accept(edge.attr("line", 7usize).into()).unwrap();

        let stats = dao.finish().unwrap();
        assert_eq!(stats.nodes_written, 1);
        assert_eq!(stats.edges_written, 1);
        assert_eq!(stats.duplicates_skipped, 2);
        assert_eq!(stats.statements, 2);
    }

    #[test]
    fn test_rerun_against_embedded_store_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut accessor = EmbeddedAccessor::new(dir.path().join("db"));
        accessor.startup().unwrap();
        let filter = CompositeFilter::default();

        for _ in 0..2 {
            let writer = GraphWriter::new(&mut accessor, 1);
            let mut dao = GraphDao::begin(writer, &filter, &[]).unwrap();
            dao.add_edge(EdgeFact::new(RelationKind::Declares, "a.B", "a.B.run"))
                .unwrap();
            dao.add_node(NodeFact::new(NodeLabel::Type, "a.B").attr("name", "B"))
                .unwrap();
            dao.add_node(NodeFact::new(NodeLabel::Method, "a.B.run")).unwrap();
            dao.finish().unwrap();
        }

        assert_eq!(accessor.store().node_count(), 2);
        assert_eq!(accessor.store().edge_count(), 1);
        accessor.shutdown().unwrap();
    }
}
