use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::error::{Result, SpecgraphError};
use crate::model::{GraphIndex, NodeRef, SpecNode};
use crate::storage::Storage;

pub const GRAPH_FILE: &str = "graph.json";

/// Fully loaded graph: the index plus every node it references, in index order.
#[derive(Debug, Clone)]
pub struct NodeStore {
    index: GraphIndex,
    nodes: Vec<SpecNode>,
    positions: HashMap<String, usize>,
}

impl NodeStore {
    /// Build a store from already-parsed parts. Later duplicates of an id are dropped.
    pub fn from_parts(index: GraphIndex, nodes: Vec<SpecNode>) -> Self {
        let mut kept = Vec::with_capacity(nodes.len());
        let mut positions = HashMap::new();
        for node in nodes {
            if positions.contains_key(&node.id) {
                continue;
            }
            positions.insert(node.id.clone(), kept.len());
            kept.push(node);
        }
        Self {
            index,
            nodes: kept,
            positions,
        }
    }

    /// Store without an index file, for callers that only need the graph.
    pub fn from_nodes(nodes: Vec<SpecNode>) -> Self {
        let index = GraphIndex {
            schema: None,
            specgraph_version: "1.0.0".to_string(),
            root: None,
            node_search_paths: None,
            nodes: nodes
                .iter()
                .map(|n| NodeRef {
                    id: n.id.clone(),
                    path: n.storage_path(),
                    expected_type: Some(n.node_type.to_string()),
                    sha256: None,
                })
                .collect(),
            defaults: None,
        };
        Self::from_parts(index, nodes)
    }

    pub fn load(storage: &dyn Storage) -> Result<Self> {
        let raw = storage.read(GRAPH_FILE)?;
        let value: Value =
            serde_json::from_slice(&raw).map_err(|e| SpecgraphError::json(GRAPH_FILE, e))?;
        if !value.get("nodes").is_some_and(|n| n.is_array()) {
            return Err(SpecgraphError::invalid_index(format!(
                "{}: nodes must be an array",
                GRAPH_FILE
            )));
        }
        let index: GraphIndex = serde_json::from_value(value)
            .map_err(|e| SpecgraphError::invalid_index(format!("{}: {}", GRAPH_FILE, e)))?;

        let mut nodes = Vec::with_capacity(index.nodes.len());
        let mut seen = HashSet::new();
        for node_ref in &index.nodes {
            if node_ref.id.is_empty() {
                return Err(SpecgraphError::invalid_index("node reference with empty id"));
            }
            if !seen.insert(node_ref.id.as_str()) {
                return Err(SpecgraphError::invalid_index(format!(
                    "Duplicate node id in graph index: {}",
                    node_ref.id
                )));
            }
            if node_ref.path.is_empty() {
                return Err(SpecgraphError::invalid_index(format!(
                    "Invalid path for node {}",
                    node_ref.id
                )));
            }

            let bytes = storage.read(&node_ref.path)?;
            let node: SpecNode = serde_json::from_slice(&bytes)
                .map_err(|e| SpecgraphError::json(&node_ref.path, e))?;
            if node.id != node_ref.id {
                return Err(SpecgraphError::invalid_index(format!(
                    "Node file id mismatch: ref {} != node {} ({})",
                    node_ref.id, node.id, node_ref.path
                )));
            }
            nodes.push(node);
        }

        tracing::debug!("Loaded {} spec graph nodes", nodes.len());
        Ok(Self::from_parts(index, nodes))
    }

    pub fn index(&self) -> &GraphIndex {
        &self.index
    }

    pub fn get(&self, id: &str) -> Option<&SpecNode> {
        self.positions.get(id).map(|&i| &self.nodes[i])
    }

    pub fn require(&self, id: &str) -> Result<&SpecNode> {
        self.get(id).ok_or_else(|| SpecgraphError::node_not_found(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Nodes in stored (index) order.
    pub fn nodes(&self) -> impl Iterator<Item = &SpecNode> {
        self.nodes.iter()
    }

    pub fn node_ref(&self, id: &str) -> Option<&NodeRef> {
        self.index.find(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
