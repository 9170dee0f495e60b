//! In-process property graph used by the embedded backend.
//!
//! Nodes carry one label and a property map; relationships carry a type and
//! a property map. Nodes with a `qualified_name` property are indexed by
//! `(label, qualified_name)` so MERGE on the key is a hash lookup.

use indexmap::IndexMap;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{DepmapError, Result};

/// Property used as the node key.
pub const KEY_PROPERTY: &str = "qualified_name";

/// A property value as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<PropValue>),
}

impl PropValue {
    /// Convert a JSON value. Maps are not valid property values.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        use serde_json::Value;
        Some(match value {
            Value::Null => PropValue::Null,
            Value::Bool(b) => PropValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => PropValue::Int(i),
                None => PropValue::Float(n.as_f64()?),
            },
            Value::String(s) => PropValue::Str(s.clone()),
            Value::Array(items) => PropValue::List(
                items
                    .iter()
                    .map(PropValue::from_json)
                    .collect::<Option<Vec<_>>>()?,
            ),
            Value::Object(_) => return None,
        })
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Null => f.write_str("null"),
            PropValue::Bool(b) => write!(f, "{b}"),
            PropValue::Int(i) => write!(f, "{i}"),
            PropValue::Float(x) => write!(f, "{x}"),
            PropValue::Str(s) => write!(f, "{s:?}"),
            PropValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

pub type Props = IndexMap<String, PropValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredNode {
    pub label: String,
    pub props: Props,
}

impl StoredNode {
    fn key(&self) -> Option<(String, String)> {
        self.props
            .get(KEY_PROPERTY)
            .and_then(PropValue::as_str)
            .map(|k| (self.label.clone(), k.to_string()))
    }

    fn matches(&self, label: Option<&str>, props: &Props) -> bool {
        label.map_or(true, |l| l == self.label)
            && props.iter().all(|(k, v)| self.props.get(k) == Some(v))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEdge {
    pub rel_type: String,
    pub props: Props,
}

/// Counts reported by [`GraphStore::stats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub nodes: usize,
    pub relationships: usize,
    pub nodes_by_label: IndexMap<String, usize>,
    pub relationships_by_type: IndexMap<String, usize>,
}

/// On-disk form: dense node list plus edges by node position.
#[derive(Serialize, Deserialize)]
struct Snapshot {
    nodes: Vec<StoredNode>,
    edges: Vec<(u32, u32, StoredEdge)>,
}

#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    graph: StableDiGraph<StoredNode, StoredEdge>,
    key_index: HashMap<(String, String), NodeIndex>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Node Operations ────────────────────────────────────────

    /// Find a node matching `label` and every property in `props`, or
    /// create one.
    pub fn merge_node(&mut self, label: &str, props: &Props) -> NodeIndex {
        if let Some(idx) = self.find_node(label, props) {
            return idx;
        }
        self.create_node(label, props.clone())
    }

    pub fn create_node(&mut self, label: &str, props: Props) -> NodeIndex {
        let node = StoredNode {
            label: label.to_string(),
            props,
        };
        let key = node.key();
        let idx = self.graph.add_node(node);
        if let Some(key) = key {
            self.key_index.entry(key).or_insert(idx);
        }
        idx
    }

    fn find_node(&self, label: &str, props: &Props) -> Option<NodeIndex> {
        if let Some(key) = props.get(KEY_PROPERTY).and_then(PropValue::as_str) {
            let idx = *self.key_index.get(&(label.to_string(), key.to_string()))?;
            return self.graph[idx].matches(Some(label), props).then_some(idx);
        }
        self.match_nodes(Some(label), props).into_iter().next()
    }

    /// All nodes matching an optional label and the given properties.
    pub fn match_nodes(&self, label: Option<&str>, props: &Props) -> Vec<NodeIndex> {
        self.graph
            .node_indices()
            .filter(|&idx| self.graph[idx].matches(label, props))
            .collect()
    }

    pub fn node(&self, idx: NodeIndex) -> Option<&StoredNode> {
        self.graph.node_weight(idx)
    }

    /// Look up a node by its key property.
    pub fn node_by_key(&self, label: &str, qualified_name: &str) -> Option<&StoredNode> {
        self.key_index
            .get(&(label.to_string(), qualified_name.to_string()))
            .and_then(|&idx| self.graph.node_weight(idx))
    }

    /// Merge `props` into a node, keeping the key index consistent.
    pub fn set_node_props(&mut self, idx: NodeIndex, props: &Props) {
        let Some(node) = self.graph.node_weight_mut(idx) else {
            return;
        };
        let old_key = node.key();
        for (k, v) in props {
            if *v == PropValue::Null {
                node.props.shift_remove(k);
            } else {
                node.props.insert(k.clone(), v.clone());
            }
        }
        let new_key = node.key();
        if old_key != new_key {
            if let Some(old) = old_key {
                if self.key_index.get(&old) == Some(&idx) {
                    self.key_index.remove(&old);
                }
            }
            if let Some(new) = new_key {
                self.key_index.entry(new).or_insert(idx);
            }
        }
    }

    /// Remove a node. Without `detach` a node with relationships is an error.
    pub fn delete_node(&mut self, idx: NodeIndex, detach: bool) -> Result<()> {
        let Some(node) = self.graph.node_weight(idx) else {
            return Ok(());
        };
        let degree = self.graph.edges_directed(idx, Direction::Outgoing).count()
            + self.graph.edges_directed(idx, Direction::Incoming).count();
        if degree > 0 && !detach {
            return Err(DepmapError::unsupported(
                "DELETE",
                format!(
                    "node {} still has {degree} relationships, use DETACH DELETE",
                    node.label
                ),
            ));
        }
        if let Some(key) = node.key() {
            if self.key_index.get(&key) == Some(&idx) {
                self.key_index.remove(&key);
            }
        }
        self.graph.remove_node(idx);
        Ok(())
    }

    // ─── Relationship Operations ────────────────────────────────

    pub fn merge_edge(
        &mut self,
        from: NodeIndex,
        to: NodeIndex,
        rel_type: &str,
        props: &Props,
    ) -> EdgeIndex {
        let existing = self
            .graph
            .edges_directed(from, Direction::Outgoing)
            .find(|e| {
                e.target() == to
                    && e.weight().rel_type == rel_type
                    && props.iter().all(|(k, v)| e.weight().props.get(k) == Some(v))
            })
            .map(|e| e.id());
        match existing {
            Some(idx) => idx,
            None => self.create_edge(from, to, rel_type, props.clone()),
        }
    }

    pub fn create_edge(
        &mut self,
        from: NodeIndex,
        to: NodeIndex,
        rel_type: &str,
        props: Props,
    ) -> EdgeIndex {
        self.graph.add_edge(
            from,
            to,
            StoredEdge {
                rel_type: rel_type.to_string(),
                props,
            },
        )
    }

    pub fn set_edge_props(&mut self, idx: EdgeIndex, props: &Props) {
        if let Some(edge) = self.graph.edge_weight_mut(idx) {
            for (k, v) in props {
                if *v == PropValue::Null {
                    edge.props.shift_remove(k);
                } else {
                    edge.props.insert(k.clone(), v.clone());
                }
            }
        }
    }

    pub fn delete_edge(&mut self, idx: EdgeIndex) {
        self.graph.remove_edge(idx);
    }

    /// Relationships of `rel_type` between two keyed nodes.
    pub fn relationships(&self, rel_type: &str, from: &str, to: &str) -> Vec<&StoredEdge> {
        let from_idx = self
            .key_index
            .iter()
            .filter(|((_, k), _)| k == from)
            .map(|(_, &idx)| idx);
        let mut out = Vec::new();
        for idx in from_idx {
            for e in self.graph.edges_directed(idx, Direction::Outgoing) {
                let target = &self.graph[e.target()];
                if e.weight().rel_type == rel_type
                    && target.props.get(KEY_PROPERTY).and_then(PropValue::as_str) == Some(to)
                {
                    out.push(e.weight());
                }
            }
        }
        out
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn clear(&mut self) {
        self.graph.clear();
        self.key_index.clear();
    }

    pub fn stats(&self) -> StoreStats {
        let mut stats = StoreStats {
            nodes: self.node_count(),
            relationships: self.edge_count(),
            ..StoreStats::default()
        };
        for node in self.graph.node_indices().map(|i| &self.graph[i]) {
            *stats.nodes_by_label.entry(node.label.clone()).or_default() += 1;
        }
        for edge in self.graph.edge_indices().map(|e| &self.graph[e]) {
            *stats
                .relationships_by_type
                .entry(edge.rel_type.clone())
                .or_default() += 1;
        }
        stats
    }

    // ─── Persistence ────────────────────────────────────────────

    /// Write a snapshot atomically (temp file + rename).
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut position = HashMap::with_capacity(self.graph.node_count());
        let mut nodes = Vec::with_capacity(self.graph.node_count());
        for idx in self.graph.node_indices() {
            position.insert(idx, nodes.len() as u32);
            nodes.push(self.graph[idx].clone());
        }
        let edges = self
            .graph
            .edge_indices()
            .filter_map(|e| {
                let (a, b) = self.graph.edge_endpoints(e)?;
                Some((position[&a], position[&b], self.graph[e].clone()))
            })
            .collect();
        let snapshot = Snapshot { nodes, edges };

        let tmp = path.with_extension("tmp");
        let mut writer = BufWriter::new(fs::File::create(&tmp)?);
        bincode::serialize_into(&mut writer, &snapshot)?;
        writer.flush()?;
        drop(writer);
        fs::rename(&tmp, path)?;
        debug!(
            path = %path.display(),
            nodes = snapshot.nodes.len(),
            edges = snapshot.edges.len(),
            "snapshot written"
        );
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = fs::File::open(path)?;
        let snapshot: Snapshot = bincode::deserialize_from(BufReader::new(file))?;

        let mut store = GraphStore::new();
        let indexes: Vec<NodeIndex> = snapshot
            .nodes
            .into_iter()
            .map(|n| store.create_node(&n.label, n.props))
            .collect();
        for (a, b, edge) in snapshot.edges {
            let (Some(&from), Some(&to)) = (indexes.get(a as usize), indexes.get(b as usize))
            else {
                return Err(DepmapError::Config(format!(
                    "corrupt snapshot {}: edge references missing node",
                    path.display()
                )));
            };
            store.create_edge(from, to, &edge.rel_type, edge.props);
        }
        info!(
            path = %path.display(),
            nodes = store.node_count(),
            edges = store.edge_count(),
            "snapshot loaded"
        );
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> Props {
        let mut props = Props::new();
        props.insert(KEY_PROPERTY.to_string(), PropValue::Str(name.to_string()));
        props
    }

    #[test]
    fn test_merge_node_is_idempotent() {
        let mut store = GraphStore::new();
        let a = store.merge_node("Type", &key("com.acme.Foo"));
        let b = store.merge_node("Type", &key("com.acme.Foo"));
        assert_eq!(a, b);
        assert_eq!(store.node_count(), 1);

        // Same key, different label: distinct node.
        store.merge_node("Method", &key("com.acme.Foo"));
        assert_eq!(store.node_count(), 2);
    }

    #[test]
    fn test_merge_edge_is_idempotent() {
        let mut store = GraphStore::new();
        let a = store.merge_node("Method", &key("a"));
        let b = store.merge_node("Method", &key("b"));
        let e1 = store.merge_edge(a, b, "INVOKES", &Props::new());
        let e2 = store.merge_edge(a, b, "INVOKES", &Props::new());
        assert_eq!(e1, e2);
        store.merge_edge(b, a, "INVOKES", &Props::new());
        assert_eq!(store.edge_count(), 2);
        assert_eq!(store.relationships("INVOKES", "a", "b").len(), 1);
    }

    #[test]
    fn test_set_props_and_null_removes() {
        let mut store = GraphStore::new();
        let idx = store.merge_node("Type", &key("x.Y"));
        let mut props = Props::new();
        props.insert("line".to_string(), PropValue::Int(4));
        store.set_node_props(idx, &props);
        assert_eq!(store.node(idx).unwrap().props["line"], PropValue::Int(4));

        props.insert("line".to_string(), PropValue::Null);
        store.set_node_props(idx, &props);
        assert!(!store.node(idx).unwrap().props.contains_key("line"));
    }

    #[test]
    fn test_delete_requires_detach() {
        let mut store = GraphStore::new();
        let a = store.merge_node("Type", &key("a"));
        let b = store.merge_node("Method", &key("a.m"));
        store.merge_edge(a, b, "DECLARES", &Props::new());

        assert!(store.delete_node(a, false).is_err());
        store.delete_node(a, true).unwrap();
        assert_eq!(store.node_count(), 1);
        assert_eq!(store.edge_count(), 0);
        assert!(store.node_by_key("Type", "a").is_none());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.bin");

        let mut store = GraphStore::new();
        let a = store.merge_node("Type", &key("a"));
        let gone = store.merge_node("Type", &key("gone"));
        let b = store.merge_node("Method", &key("a.m"));
        store.merge_edge(a, b, "DECLARES", &Props::new());
        store.delete_node(gone, true).unwrap();
        store.save(&path).unwrap();

        let loaded = GraphStore::load(&path).unwrap();
        assert_eq!(loaded.node_count(), 2);
        assert_eq!(loaded.relationships("DECLARES", "a", "a.m").len(), 1);
        assert_eq!(loaded.stats().nodes_by_label["Type"], 1);
    }

    #[test]
    fn test_prop_value_from_json() {
        let v = serde_json::json!([1, "x", true, null, 1.5]);
        assert_eq!(
            PropValue::from_json(&v),
            Some(PropValue::List(vec![
                PropValue::Int(1),
                PropValue::Str("x".to_string()),
                PropValue::Bool(true),
                PropValue::Null,
                PropValue::Float(1.5),
            ]))
        );
        assert_eq!(PropValue::from_json(&serde_json::json!({"a": 1})), None);
    }
}
