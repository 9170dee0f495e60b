//! Node kind -> visitor mapping.
//!
//! Registration happens once before traversal; the registry is read-only
//! while a tree is walked.

use std::fmt;

use super::kind::AstKind;
use super::node::AstNode;
use crate::error::Result;
use crate::graph::Fact;

/// Extracts facts from nodes of one kind.
pub trait NodeVisitor: Send + Sync {
    /// Push zero or more facts into `out` and return whether the node's
    /// children should be visited.
    ///
    /// On error nothing pushed into `out` is kept.
    fn visit(&self, node: &dyn AstNode, out: &mut Vec<Fact>) -> Result<bool>;

    fn name(&self) -> &'static str;
}

/// At most one visitor per [`AstKind`], looked up by the kind's code.
pub struct VisitorRegistry {
    slots: [Option<Box<dyn NodeVisitor>>; AstKind::COUNT],
}

impl VisitorRegistry {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }

    /// Register `visitor` for `kind`, replacing any previous registration.
    /// Register `visitor` for `kind`, replacing any earlier one.
    pub fn add(&mut self, kind: AstKind, visitor: Box<dyn NodeVisitor>) -> &mut Self {
        self.slots[kind.code()] = Some(visitor);
        self
    }

    pub fn remove(&mut self, kind: AstKind) -> Option<Box<dyn NodeVisitor>> {
        self.slots[kind.code()].take()
    }

    #[inline]
    pub fn get(&self, kind: AstKind) -> Option<&dyn NodeVisitor> {
        self.slots[kind.code()].as_deref()
    }

    pub fn contains(&self, kind: AstKind) -> bool {
        self.slots[kind.code()].is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kinds(&self) -> impl Iterator<Item = AstKind> + '_ {
        AstKind::ALL.iter().copied().filter(|k| self.contains(*k))
    }
}

impl Default for VisitorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for VisitorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                AstKind::ALL
                    .iter()
                    .filter_map(|k| self.get(*k).map(|v| (k.as_str(), v.name()))),
            )
            .finish()
    }
}
