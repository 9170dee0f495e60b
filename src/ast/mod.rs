//! AST traversal: node kinds, the stop set, the visitor registry and the
//! delegator a producer drives.

pub mod delegator;
pub mod kind;
pub mod node;
pub mod registry;
pub mod stop_set;
pub mod visitors;

pub use delegator::{DelegatorStats, VisitorDelegator};
pub use kind::AstKind;
pub use node::{walk, AstNode, AstWalker, SuperTypeRef, SyntaxNode};
pub use registry::{NodeVisitor, VisitorRegistry};
pub use stop_set::NodeKindSet;
pub use visitors::{
    default_registry, MethodDeclarationVisitor, MethodInvocationVisitor, TypeDeclarationVisitor,
};
