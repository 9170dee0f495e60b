//! Visitors for type declarations, method declarations, and invocations.

use tracing::debug;

use super::kind::AstKind;
use super::node::AstNode;
use super::registry::{NodeVisitor, VisitorRegistry};
use crate::error::{DepmapError, Result};
use crate::graph::{EdgeFact, Fact, NodeFact, NodeLabel, RelationKind};

fn required<'n>(node: &'n dyn AstNode, value: Option<&'n str>, what: &str) -> Result<&'n str> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(DepmapError::visitor(node.kind(), format!("missing {what}"))),
    }
}

fn with_location(mut fact: NodeFact, node: &dyn AstNode) -> NodeFact {
    if node.line() > 0 {
        fact = fact.attr("line", node.line());
    }
    if let Some(file) = node.file() {
        fact = fact.attr("file", file.to_string_lossy().to_string());
    }
    fact
}

/// Emits a Type node plus `EXTENDS` / `IMPLEMENTS` edges to its super types.
#[derive(Debug, Default)]
pub struct TypeDeclarationVisitor;

impl NodeVisitor for TypeDeclarationVisitor {
    fn visit(&self, node: &dyn AstNode, out: &mut Vec<Fact>) -> Result<bool> {
        let qualified = required(node, node.qualified_name(), "qualified name")?;
        let name = node.name().unwrap_or(qualified);

        let fact = NodeFact::new(NodeLabel::Type, qualified).attr("name", name);
        out.push(with_location(fact, node).into());

        for super_type in node.super_types() {
            let kind = if super_type.is_interface {
                RelationKind::Implements
            } else {
                RelationKind::Extends
            };
            out.push(EdgeFact::new(kind, qualified, super_type.qualified_name.as_str()).into());
        }
        Ok(true)
    }

    fn name(&self) -> &'static str {
        "type_declaration"
    }
}

/// Emits a Method node and the `DECLARES` edge from its declaring type.
#[derive(Debug, Default)]
pub struct MethodDeclarationVisitor;

impl NodeVisitor for MethodDeclarationVisitor {
    fn visit(&self, node: &dyn AstNode, out: &mut Vec<Fact>) -> Result<bool> {
        let qualified = required(node, node.qualified_name(), "qualified name")?;
        let owner = required(node, node.declaring_type(), "declaring type")?;
        let name = node.name().unwrap_or(qualified);

        let fact = NodeFact::new(NodeLabel::Method, qualified)
            .attr("name", name)
            .attr("declaring_type", owner);
        out.push(with_location(fact, node).into());
        out.push(EdgeFact::new(RelationKind::Declares, owner, qualified).into());
        Ok(true)
    }

    fn name(&self) -> &'static str {
        "method_declaration"
    }
}

/// Emits an `INVOKES` edge from the enclosing method to the resolved target.
///
/// Invocations without a resolved target, or outside any method (field
/// initializers, static blocks), produce nothing.
#[derive(Debug, Default)]
pub struct MethodInvocationVisitor;

impl NodeVisitor for MethodInvocationVisitor {
    fn visit(&self, node: &dyn AstNode, out: &mut Vec<Fact>) -> Result<bool> {
        let (Some(caller), Some(target)) = (node.enclosing_method(), node.invocation_target())
        else {
            debug!(
                name = node.name().unwrap_or("?"),
                line = node.line(),
                "unresolved invocation"
            );
            return Ok(true);
        };

        let mut edge = EdgeFact::new(RelationKind::Invokes, caller, target);
        if node.line() > 0 {
            edge = edge.attr("line", node.line());
        }
        out.push(edge.into());
        Ok(true)
    }

    fn name(&self) -> &'static str {
        "method_invocation"
    }
}

/// Registry wired with the standard visitors.
pub fn default_registry() -> VisitorRegistry {
    let mut registry = VisitorRegistry::new();
    registry
        .add(AstKind::TypeDeclaration, Box::new(TypeDeclarationVisitor))
        .add(AstKind::EnumDeclaration, Box::new(TypeDeclarationVisitor))
        .add(AstKind::AnnotationTypeDeclaration, Box::new(TypeDeclarationVisitor))
        .add(AstKind::AnonymousClassDeclaration, Box::new(TypeDeclarationVisitor))
        .add(AstKind::MethodDeclaration, Box::new(MethodDeclarationVisitor))
        .add(AstKind::MethodInvocation, Box::new(MethodInvocationVisitor))
        .add(AstKind::SuperMethodInvocation, Box::new(MethodInvocationVisitor))
        // Constructor calls are invocations of `<init>`.
        .add(AstKind::ClassInstanceCreation, Box::new(MethodInvocationVisitor));
    registry
}
