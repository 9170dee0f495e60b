//! Producer-side view of a syntax tree.
//!
//! [`AstNode`] is what visitors read: a kind code plus declaration and
//! invocation identity. [`SyntaxNode`] is the owned tree a producer builds,
//! and [`walk`] drives an [`AstWalker`] over it depth-first, honouring the
//! walker's "visit children?" answer for every node.

use std::path::{Path, PathBuf};

use super::kind::AstKind;

/// A super type named in a type declaration (`extends` / `implements`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperTypeRef {
    pub qualified_name: String,
    /// `true` for `implements` (or an interface's `extends`).
    pub is_interface: bool,
}

/// Read-only identity of a single AST node.
pub trait AstNode {
    fn kind(&self) -> AstKind;

    /// Simple name of the declaration or of the invoked method.
    fn name(&self) -> Option<&str>;

    /// Fully-qualified name of a declaration.
    fn qualified_name(&self) -> Option<&str>;

    /// Qualified name of the type containing this node.
    fn declaring_type(&self) -> Option<&str>;

    /// Qualified name of the method this node sits inside.
    fn enclosing_method(&self) -> Option<&str>;

    /// Resolved qualified name of the method an invocation targets.
    fn invocation_target(&self) -> Option<&str>;

    fn super_types(&self) -> &[SuperTypeRef];

    /// 1-indexed line, 0 when unknown.
    fn line(&self) -> usize;

    fn file(&self) -> Option<&Path>;
}

/// Owned tree node built by a producer.
#[derive(Debug, Clone)]
pub struct SyntaxNode {
    pub kind: AstKind,
    pub name: Option<String>,
    pub qualified_name: Option<String>,
    pub declaring_type: Option<String>,
    pub enclosing_method: Option<String>,
    pub invocation_target: Option<String>,
    pub super_types: Vec<SuperTypeRef>,
    pub line: usize,
    pub file: Option<PathBuf>,
    pub children: Vec<SyntaxNode>,
}

impl SyntaxNode {
    pub fn new(kind: AstKind) -> Self {
        Self {
            kind,
            name: None,
            qualified_name: None,
            declaring_type: None,
            enclosing_method: None,
            invocation_target: None,
            super_types: Vec::new(),
            line: 0,
            file: None,
            children: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_qualified_name(mut self, qualified_name: impl Into<String>) -> Self {
        self.qualified_name = Some(qualified_name.into());
        self
    }

    pub fn with_declaring_type(mut self, declaring_type: impl Into<String>) -> Self {
        self.declaring_type = Some(declaring_type.into());
        self
    }

    pub fn with_enclosing_method(mut self, method: impl Into<String>) -> Self {
        self.enclosing_method = Some(method.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.invocation_target = Some(target.into());
        self
    }

    pub fn with_super_type(mut self, qualified_name: impl Into<String>, is_interface: bool) -> Self {
        self.super_types.push(SuperTypeRef {
            qualified_name: qualified_name.into(),
            is_interface,
        });
        self
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }

    pub fn in_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_child(mut self, child: SyntaxNode) -> Self {
        self.children.push(child);
        self
    }

    /// Total number of nodes in this subtree, including `self`.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(SyntaxNode::size).sum::<usize>()
    }
}

impl AstNode for SyntaxNode {
    fn kind(&self) -> AstKind {
        self.kind
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn qualified_name(&self) -> Option<&str> {
        self.qualified_name.as_deref()
    }

    fn declaring_type(&self) -> Option<&str> {
        self.declaring_type.as_deref()
    }

    fn enclosing_method(&self) -> Option<&str> {
        self.enclosing_method.as_deref()
    }

    fn invocation_target(&self) -> Option<&str> {
        self.invocation_target.as_deref()
    }

    fn super_types(&self) -> &[SuperTypeRef] {
        &self.super_types
    }

    fn line(&self) -> usize {
        self.line
    }

    fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }
}

/// Callbacks a producer invokes while traversing a tree.
pub trait AstWalker {
    /// Called on entering a node. Return `false` to skip its subtree.
    fn visit(&mut self, node: &dyn AstNode) -> bool;

    /// Called on leaving a node whose `visit` returned `true`.
    fn end_visit(&mut self, _node: &dyn AstNode) {}
}

/// Depth-first traversal of `root`, driving `walker`.
pub fn walk(root: &SyntaxNode, walker: &mut dyn AstWalker) {
    if !walker.visit(root) {
        return;
    }
    for child in &root.children {
        walk(child, walker);
    }
    walker.end_visit(root);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        entered: Vec<AstKind>,
        left: Vec<AstKind>,
        skip: AstKind,
    }

    impl AstWalker for Recorder {
        fn visit(&mut self, node: &dyn AstNode) -> bool {
            self.entered.push(node.kind());
            node.kind() != self.skip
        }

        fn end_visit(&mut self, node: &dyn AstNode) {
            self.left.push(node.kind());
        }
    }

    fn sample() -> SyntaxNode {
        SyntaxNode::new(AstKind::CompilationUnit).with_child(
            SyntaxNode::new(AstKind::TypeDeclaration)
                .with_child(SyntaxNode::new(AstKind::Javadoc).with_child(SyntaxNode::new(AstKind::Other)))
                .with_child(
                    SyntaxNode::new(AstKind::MethodDeclaration)
                        .with_child(SyntaxNode::new(AstKind::MethodInvocation)),
                ),
        )
    }

    #[test]
    fn test_walk_is_depth_first() {
        let mut rec = Recorder {
            entered: Vec::new(),
            left: Vec::new(),
            skip: AstKind::Block,
        };
        walk(&sample(), &mut rec);
        assert_eq!(
            rec.entered,
            vec![
                AstKind::CompilationUnit,
                AstKind::TypeDeclaration,
                AstKind::Javadoc,
                AstKind::Other,
                AstKind::MethodDeclaration,
                AstKind::MethodInvocation,
            ]
        );
        assert_eq!(rec.left.last(), Some(&AstKind::CompilationUnit));
    }

    #[test]
    fn test_walk_skips_subtree() {
        let mut rec = Recorder {
            entered: Vec::new(),
            left: Vec::new(),
            skip: AstKind::Javadoc,
        };
        walk(&sample(), &mut rec);
        assert!(rec.entered.contains(&AstKind::Javadoc));
        assert!(!rec.entered.contains(&AstKind::Other));
        assert!(!rec.left.contains(&AstKind::Javadoc));
        assert_eq!(sample().size(), 6);
    }
}
