//! Graph statements and their builders.
//!
//! A [`Statement`] serializes to the transactional endpoint's wire shape:
//! `{"statement": "...", "parameters": {...}}`, with `parameters` omitted
//! when there are none.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

use super::types::{Attributes, EdgeFact, NodeFact, Scalar};
use crate::backend::store::KEY_PROPERTY;

/// Statement parameters, by name.
pub type Params = serde_json::Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    pub statement: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Params>,
}

impl Statement {
    /// A statement with no parameters.
    pub fn raw(text: impl Into<String>) -> Self {
        Self {
            statement: text.into(),
            parameters: None,
        }
    }

    pub fn with_params(text: impl Into<String>, params: Params) -> Self {
        Self {
            statement: text.into(),
            parameters: Some(params),
        }
    }

    pub fn params(&self) -> Option<&Params> {
        self.parameters.as_ref()
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.statement)
    }
}

fn scalar_json(value: &Scalar) -> Value {
    match value {
        Scalar::Bool(b) => Value::Bool(*b),
        Scalar::Int(i) => Value::from(*i),
        Scalar::Str(s) => Value::String(s.clone()),
    }
}

fn attributes_json(attributes: &Attributes) -> Value {
    Value::Object(
        attributes
            .iter()
            .map(|(k, v)| (k.clone(), scalar_json(v)))
            .collect(),
    )
}

/// `MERGE` a node on its qualified name and set its attributes.
pub fn merge_node(fact: &NodeFact) -> Statement {
    let text = format!(
        "MERGE (n:{label} {{{KEY_PROPERTY}: ${KEY_PROPERTY}}}) SET n += $props",
        label = fact.kind.as_str()
    );
    let mut params = Params::new();
    params.insert(
        KEY_PROPERTY.to_string(),
        Value::String(fact.qualified_name.clone()),
    );
    params.insert("props".to_string(), attributes_json(&fact.attributes));
    Statement::with_params(text, params)
}

/// `MERGE` a relationship, merging both endpoints first so the edge never
/// needs its nodes to exist already.
pub fn merge_edge(fact: &EdgeFact) -> Statement {
    let (from_label, to_label) = fact.kind.endpoints();
    let text = format!(
        "MERGE (a:{from_label} {{{KEY_PROPERTY}: $from}}) \
         MERGE (b:{to_label} {{{KEY_PROPERTY}: $to}}) \
         MERGE (a)-[r:{rel}]->(b) SET r += $props",
        rel = fact.kind.as_str()
    );
    let mut params = Params::new();
    params.insert("from".to_string(), Value::String(fact.from.clone()));
    params.insert("to".to_string(), Value::String(fact.to.clone()));
    params.insert("props".to_string(), attributes_json(&fact.attributes));
    Statement::with_params(text, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::{NodeLabel, RelationKind};
    use serde_json::json;

    #[test]
    fn test_raw_statement_omits_parameters() {
        let json = serde_json::to_value(Statement::raw("MATCH (n) DETACH DELETE n")).unwrap();
        assert_eq!(json, json!({"statement": "MATCH (n) DETACH DELETE n"}));
    }

    #[test]
    fn test_merge_node_statement() {
        let fact = NodeFact::new(NodeLabel::Type, "com.acme.Foo")
            .attr("name", "Foo")
            .attr("line", 3usize);
        let stmt = merge_node(&fact);
        assert_eq!(
            stmt.statement,
            "MERGE (n:Type {qualified_name: $qualified_name}) SET n += $props"
        );
        assert_eq!(
            serde_json::to_value(&stmt).unwrap()["parameters"],
            json!({"qualified_name": "com.acme.Foo", "props": {"name": "Foo", "line": 3}})
        );
    }

    #[test]
    fn test_merge_edge_statement_uses_endpoint_labels() {
        let fact = EdgeFact::new(RelationKind::Declares, "a.B", "a.B.run");
        let stmt = merge_edge(&fact);
        assert!(stmt.statement.starts_with("MERGE (a:Type {qualified_name: $from})"));
        assert!(stmt.statement.contains("MERGE (b:Method {qualified_name: $to})"));
        assert!(stmt.statement.contains("-[r:DECLARES]->"));
        let params = stmt.params().unwrap();
        assert_eq!(params["from"], json!("a.B"));
        assert_eq!(params["props"], json!({}));
    }
}
