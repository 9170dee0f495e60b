//! Tree-walk adapter: stop set + registry dispatch.
//!
//! The delegator is what a producer drives. For each node it consults the
//! stop set, looks up a visitor by kind, collects the visitor's facts into
//! the run's fact stream, and answers whether to descend.

use tracing::{trace, warn};

use super::kind::AstKind;
use super::node::{AstNode, AstWalker};
use super::registry::VisitorRegistry;
use super::stop_set::NodeKindSet;
use crate::graph::Fact;

/// Counters for one traversal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DelegatorStats {
    /// Nodes entered, including skipped ones.
    pub nodes_seen: usize,
    /// Nodes handed to a visitor.
    pub nodes_visited: usize,
    /// Subtrees pruned by the stop set.
    pub subtrees_skipped: usize,
    /// Visitors that returned an error.
    pub visitor_faults: usize,
}

/// [`AstWalker`] that prunes stop-set kinds and dispatches every other
/// node to its registered visitor, buffering the facts produced.
pub struct VisitorDelegator<'a> {
    registry: &'a VisitorRegistry,
    stop_set: &'a NodeKindSet,
    facts: Vec<Fact>,
    stats: DelegatorStats,
}

impl<'a> VisitorDelegator<'a> {
    pub fn new(registry: &'a VisitorRegistry, stop_set: &'a NodeKindSet) -> Self {
        Self {
            registry,
            stop_set,
            facts: Vec::new(),
            stats: DelegatorStats::default(),
        }
    }

    /// Facts collected so far, leaving the stream empty.
    pub fn take_facts(&mut self) -> Vec<Fact> {
        std::mem::take(&mut self.facts)
    }

    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    pub fn stats(&self) -> DelegatorStats {
        self.stats
    }

    fn dispatch(&mut self, kind: AstKind, node: &dyn AstNode) -> bool {
        let registry = self.registry;
        let Some(visitor) = registry.get(kind) else {
            return true;
        };
        self.stats.nodes_visited += 1;

        let mut emitted = Vec::new();
        match visitor.visit(node, &mut emitted) {
            Ok(descend) => {
                self.facts.append(&mut emitted);
                descend
            }
            Err(e) => {
                self.stats.visitor_faults += 1;
                warn!(
                    visitor = visitor.name(),
                    kind = %kind,
                    line = node.line(),
                    error = %e,
                    "visitor failed, node skipped"
                );
                true
            }
        }
    }
}

impl AstWalker for VisitorDelegator<'_> {
    fn visit(&mut self, node: &dyn AstNode) -> bool {
        let kind = node.kind();
        self.stats.nodes_seen += 1;

        if self.stop_set.contains(kind) {
            trace!(kind = %kind, "stop set hit, skipping subtree");
            self.stats.subtrees_skipped += 1;
            return false;
        }

        self.dispatch(kind, node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::node::{walk, SyntaxNode};
    use crate::ast::registry::NodeVisitor;
    use crate::error::{DepmapError, Result};
    use crate::graph::{NodeFact, NodeLabel};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Emits a Type fact named after the node and counts calls.
    struct Echo {
        calls: Arc<AtomicUsize>,
        descend: bool,
    }

    impl NodeVisitor for Echo {
        fn visit(&self, node: &dyn AstNode, out: &mut Vec<Fact>) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            out.push(NodeFact::new(NodeLabel::Type, node.name().unwrap_or("?")).into());
            Ok(self.descend)
        }

        fn name(&self) -> &'static str {
            "echo"
        }
    }

    struct Faulty;

    impl NodeVisitor for Faulty {
        fn visit(&self, node: &dyn AstNode, out: &mut Vec<Fact>) -> Result<bool> {
            out.push(NodeFact::new(NodeLabel::Method, "partial").into());
            Err(DepmapError::visitor(node.kind(), "boom"))
        }

        fn name(&self) -> &'static str {
            "faulty"
        }
    }

    fn names(facts: &[Fact]) -> Vec<String> {
        facts
            .iter()
            .filter_map(|f| match f {
                Fact::Node(n) => Some(n.qualified_name.clone()),
                Fact::Edge(_) => None,
            })
            .collect()
    }

    fn tree() -> SyntaxNode {
        SyntaxNode::new(AstKind::CompilationUnit).with_child(
            SyntaxNode::new(AstKind::TypeDeclaration)
                .with_name("Outer")
                .with_child(
                    SyntaxNode::new(AstKind::Javadoc)
                        .with_child(SyntaxNode::new(AstKind::TypeDeclaration).with_name("InDoc")),
                )
                .with_child(SyntaxNode::new(AstKind::TypeDeclaration).with_name("Inner")),
        )
    }

    #[test]
    fn test_dispatch_collects_facts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = VisitorRegistry::new();
        registry.add(
            AstKind::TypeDeclaration,
            Box::new(Echo {
                calls: Arc::clone(&calls),
                descend: true,
            }),
        );
        let stop = NodeKindSet::new();
        let mut delegator = VisitorDelegator::new(&registry, &stop);
        walk(&tree(), &mut delegator);

        assert_eq!(names(delegator.facts()), vec!["Outer", "InDoc", "Inner"]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(delegator.stats().nodes_seen, 5);
    }

    #[test]
    fn test_stop_set_prunes_subtree() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = VisitorRegistry::new();
        registry.add(
            AstKind::TypeDeclaration,
            Box::new(Echo {
                calls: Arc::clone(&calls),
                descend: true,
            }),
        );
        let mut stop = NodeKindSet::new();
        stop.add(AstKind::Javadoc);

        let mut delegator = VisitorDelegator::new(&registry, &stop);
        walk(&tree(), &mut delegator);

        assert_eq!(names(&delegator.take_facts()), vec!["Outer", "Inner"]);
        assert_eq!(delegator.stats().subtrees_skipped, 1);
        assert!(delegator.facts().is_empty());
    }

    #[test]
    fn test_stopped_kind_never_reaches_visitor() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = VisitorRegistry::new();
        registry.add(
            AstKind::TypeDeclaration,
            Box::new(Echo {
                calls: Arc::clone(&calls),
                descend: true,
            }),
        );
        let stop: NodeKindSet = [AstKind::TypeDeclaration].into_iter().collect();

        let mut delegator = VisitorDelegator::new(&registry, &stop);
        walk(&tree(), &mut delegator);

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(delegator.facts().is_empty());
        assert_eq!(delegator.stats().nodes_seen, 2);
    }

    #[test]
    fn test_visitor_can_refuse_children() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = VisitorRegistry::new();
        registry.add(
            AstKind::TypeDeclaration,
            Box::new(Echo {
                calls: Arc::clone(&calls),
                descend: false,
            }),
        );
        let stop = NodeKindSet::new();
        let mut delegator = VisitorDelegator::new(&registry, &stop);
        walk(&tree(), &mut delegator);

        assert_eq!(names(delegator.facts()), vec!["Outer"]);
    }

    #[test]
    fn test_fault_drops_node_and_continues() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = VisitorRegistry::new();
        registry
            .add(
                AstKind::TypeDeclaration,
                Box::new(Echo {
                    calls: Arc::clone(&calls),
                    descend: true,
                }),
            )
            .add(AstKind::Javadoc, Box::new(Faulty));
        let stop = NodeKindSet::new();
        let mut delegator = VisitorDelegator::new(&registry, &stop);
        walk(&tree(), &mut delegator);

        let collected = names(delegator.facts());
        assert!(!collected.contains(&"partial".to_string()));
        assert_eq!(collected, vec!["Outer", "InDoc", "Inner"]);
        assert_eq!(delegator.stats().visitor_faults, 1);
    }
}
