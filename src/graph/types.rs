//! Core types for the dependency graph.
//!
//! Visitors extract [`NodeFact`]s and [`EdgeFact`]s from AST nodes; the DAO
//! turns the admitted ones into graph statements.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Label of a node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeLabel {
    /// A class, interface, or enum.
    Type,
    /// A method or constructor.
    Method,
}

impl NodeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::Type => "Type",
            NodeLabel::Method => "Method",
        }
    }
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of a relationship in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    /// Type declares a method (Type -> Method).
    Declares,
    /// Method invokes another method (Method -> Method).
    Invokes,
    /// Type extends another type (Type -> Type).
    Extends,
    /// Type implements an interface (Type -> Type).
    Implements,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::Declares => "DECLARES",
            RelationKind::Invokes => "INVOKES",
            RelationKind::Extends => "EXTENDS",
            RelationKind::Implements => "IMPLEMENTS",
        }
    }

    /// Labels of the `(from, to)` endpoints.
    pub fn endpoints(&self) -> (NodeLabel, NodeLabel) {
        match self {
            RelationKind::Declares => (NodeLabel::Type, NodeLabel::Method),
            RelationKind::Invokes => (NodeLabel::Method, NodeLabel::Method),
            RelationKind::Extends | RelationKind::Implements => (NodeLabel::Type, NodeLabel::Type),
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scalar property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Str(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Str(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<usize> for Scalar {
    fn from(value: usize) -> Self {
        Scalar::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Str(s) => write!(f, "{s}"),
        }
    }
}

/// Property name -> value, in insertion order.
pub type Attributes = IndexMap<String, Scalar>;

/// An extracted graph node. `qualified_name` is unique within a run.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeFact {
    pub kind: NodeLabel,
    pub qualified_name: String,
    pub attributes: Attributes,
}

impl NodeFact {
    pub fn new(kind: NodeLabel, qualified_name: impl Into<String>) -> Self {
        Self {
            kind,
            qualified_name: qualified_name.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn attr(mut self, key: &str, value: impl Into<Scalar>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }
}

/// An extracted relationship between two qualified names.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeFact {
    pub kind: RelationKind,
    pub from: String,
    pub to: String,
    pub attributes: Attributes,
}

impl EdgeFact {
    pub fn new(kind: RelationKind, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            kind,
            from: from.into(),
            to: to.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn attr(mut self, key: &str, value: impl Into<Scalar>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }
}

/// A unit of graph data derived from one AST node.
#[derive(Debug, Clone, PartialEq)]
pub enum Fact {
    Node(NodeFact),
    Edge(EdgeFact),
}

impl From<NodeFact> for Fact {
    fn from(fact: NodeFact) -> Self {
        Fact::Node(fact)
    }
}

impl From<EdgeFact> for Fact {
    fn from(fact: EdgeFact) -> Self {
        Fact::Edge(fact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_endpoints() {
        assert_eq!(
            RelationKind::Declares.endpoints(),
            (NodeLabel::Type, NodeLabel::Method)
        );
        assert_eq!(
            RelationKind::Invokes.endpoints(),
            (NodeLabel::Method, NodeLabel::Method)
        );
        assert_eq!(
            RelationKind::Implements.endpoints(),
            (NodeLabel::Type, NodeLabel::Type)
        );
    }

    #[test]
    fn test_attributes_keep_insertion_order() {
        let fact = NodeFact::new(NodeLabel::Method, "a.B.c")
            .attr("name", "c")
            .attr("line", 12usize)
            .attr("abstract", false);
        let keys: Vec<&str> = fact.attributes.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["name", "line", "abstract"]);
        assert_eq!(fact.attributes["line"], Scalar::Int(12));
    }

    #[test]
    fn test_scalar_serializes_untagged() {
        let json = serde_json::to_string(&Scalar::from("x")).unwrap();
        assert_eq!(json, "\"x\"");
        let json = serde_json::to_string(&Scalar::Int(3)).unwrap();
        assert_eq!(json, "3");
    }
}
