use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Result, SchemaIssueDetail, SpecgraphError};
use crate::model::{node_path_for, EdgeType, GraphIndex, NodeRef, NodeType, SpecNode};
use crate::schema::SchemaSet;
use crate::storage::{to_canonical_json, Storage};
use crate::store::{NodeStore, GRAPH_FILE};
use crate::{GRAPH_SCHEMA_URL, NODE_SCHEMA_URL};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    AddNode,
    UpdateNode,
    RemoveNode,
    AddEdge,
    RemoveEdge,
    InitSpecgraph,
}

/// Outcome of a mutation. `files_changed` lists paths relative to the
/// graph directory, in the order they were touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationResult {
    pub success: bool,
    pub operation: Operation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    pub files_changed: Vec<String>,
}

impl OperationResult {
    fn new(operation: Operation, node_id: &str, files_changed: Vec<String>) -> Self {
        Self {
            success: true,
            operation,
            node_id: Some(node_id.to_string()),
            files_changed: dedup(files_changed),
        }
    }

    /// Prefix every changed path, e.g. with the graph directory.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches('/');
        if !prefix.is_empty() {
            self.files_changed = self
                .files_changed
                .into_iter()
                .map(|f| format!("{}/{}", prefix, f))
                .collect();
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RootFeature {
    pub id: String,
    pub title: String,
    pub description: String,
}

impl Default for RootFeature {
    fn default() -> Self {
        Self {
            id: "ROOT".to_string(),
            title: "Root Feature".to_string(),
            description: "Top-level feature for this spec graph.".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    pub specgraph_version: Option<String>,
    pub root_feature: Option<RootFeature>,
}

fn dedup(files: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    files.into_iter().filter(|f| seen.insert(f.clone())).collect()
}

/// Adds `$schema` when the document does not carry one.
pub fn with_node_schema(mut doc: Value) -> Value {
    if let Some(object) = doc.as_object_mut() {
        if !object.get("$schema").is_some_and(Value::is_string) {
            object.insert("$schema".to_string(), json!(NODE_SCHEMA_URL));
        }
    }
    doc
}

fn node_identity(doc: &Value) -> Result<(String, NodeType)> {
    let Some(object) = doc.as_object() else {
        return Err(SpecgraphError::schema_invalid(
            "Invalid node",
            vec![SchemaIssueDetail::new("/", "node must be an object")],
        ));
    };
    let id = object
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            SpecgraphError::schema_invalid(
                "Invalid node",
                vec![SchemaIssueDetail::new("/id", "node.id must be a non-empty string")],
            )
        })?;
    let raw_type = object.get("type").and_then(Value::as_str).unwrap_or_default();
    let node_type = raw_type.parse::<NodeType>().map_err(|message| {
        SpecgraphError::schema_invalid("Invalid node", vec![SchemaIssueDetail::new("/type", message)])
    })?;
    Ok((id.to_string(), node_type))
}

/// Applies mutations to one graph directory. Each call takes the freshly
/// loaded store, checks everything up front, and only then writes.
pub struct Mutator<'a> {
    storage: &'a dyn Storage,
    schemas: &'a SchemaSet,
}

impl<'a> Mutator<'a> {
    pub fn new(storage: &'a dyn Storage, schemas: &'a SchemaSet) -> Self {
        Self { storage, schemas }
    }

    fn validate_node(&self, doc: &Value) -> Result<()> {
        let issues = self.schemas.validate_node(doc);
        if issues.is_empty() {
            Ok(())
        } else {
            Err(SpecgraphError::schema_invalid("Node schema validation failed", issues))
        }
    }

    fn write_json(&self, rel: &str, value: &impl Serialize) -> Result<()> {
        self.storage.write(rel, &to_canonical_json(value)?)
    }

    fn write_index(&self, index: &mut GraphIndex) -> Result<()> {
        index.sort_nodes();
        self.write_json(GRAPH_FILE, index)
    }

    pub fn add_node(&self, store: &NodeStore, doc: Value) -> Result<OperationResult> {
        let (id, node_type) = node_identity(&doc)?;
        if store.contains(&id) || store.node_ref(&id).is_some() {
            return Err(SpecgraphError::conflict(format!("Node already exists: {}", id)));
        }

        let doc = with_node_schema(doc);
        self.validate_node(&doc)?;

        let rel = node_path_for(&id, node_type);
        if store.index().nodes.iter().any(|r| r.path == rel) {
            return Err(SpecgraphError::conflict(format!(
                "Node path already referenced by graph: {}",
                rel
            )));
        }
        if self.storage.exists(&rel)? {
            return Err(SpecgraphError::conflict(format!("Path already exists: {}", rel)));
        }

        let mut index = store.index().clone();
        index.nodes.push(NodeRef {
            id: id.clone(),
            path: rel.clone(),
            expected_type: Some(node_type.to_string()),
            sha256: None,
        });

        self.write_json(&rel, &doc)?;
        self.write_index(&mut index)?;

        tracing::info!("Added node {} at {}", id, rel);
        Ok(OperationResult::new(
            Operation::AddNode,
            &id,
            vec![rel, GRAPH_FILE.to_string()],
        ))
    }

    /// Full replacement. Moves the file when the type directory changes.
    pub fn update_node(&self, store: &NodeStore, doc: Value) -> Result<OperationResult> {
        let (id, node_type) = node_identity(&doc)?;
        let Some(old_ref) = store.node_ref(&id) else {
            return Err(SpecgraphError::node_not_found(&id));
        };

        let doc = with_node_schema(doc);
        self.validate_node(&doc)?;

        let new_rel = node_path_for(&id, node_type);
        let old_rel = old_ref.path.clone();
        if new_rel != old_rel {
            if let Some(other) = store
                .index()
                .nodes
                .iter()
                .find(|r| r.path == new_rel && r.id != id)
            {
                return Err(SpecgraphError::conflict(format!(
                    "Cannot move node to {}: path is used by {}",
                    new_rel, other.id
                )));
            }
        }

        let mut index = store.index().clone();
        for node_ref in index.nodes.iter_mut().filter(|r| r.id == id) {
            node_ref.path = new_rel.clone();
            node_ref.expected_type = Some(node_type.to_string());
        }

        let mut files = vec![new_rel.clone()];
        self.write_json(&new_rel, &doc)?;
        self.write_index(&mut index)?;
        files.push(GRAPH_FILE.to_string());
        if new_rel != old_rel {
            self.storage.delete(&old_rel)?;
            files.push(old_rel);
        }

        tracing::info!("Updated node {}", id);
        Ok(OperationResult::new(Operation::UpdateNode, &id, files))
    }

    /// Removes the node, scrubs inbound edges and sweeps unreferenced files.
    ///
    /// Writes go scrubbed nodes, then the index, then the node file, then the
    /// sweep. Each file write is atomic, and stopping after any step leaves a
    /// loadable graph; at worst an unreferenced file that the next sweep removes.
    pub fn remove_node(&self, store: &NodeStore, node_id: &str) -> Result<OperationResult> {
        let Some(node_ref) = store.node_ref(node_id) else {
            return Err(SpecgraphError::node_not_found(node_id));
        };
        let removed_path = node_ref.path.clone();

        let mut index = store.index().clone();
        index.nodes.retain(|r| r.id != node_id);
        if index.root.as_deref() == Some(node_id) {
            index.root = None;
        }

        let mut scrubbed = Vec::new();
        for node in store.nodes().filter(|n| n.id != node_id) {
            if let Some(next) = node.without_target(node_id) {
                let path = store
                    .node_ref(&node.id)
                    .map(|r| r.path.clone())
                    .unwrap_or_else(|| node.storage_path());
                scrubbed.push((path, with_node_schema(next.to_value())));
            }
        }

        let mut files = Vec::new();
        for (path, doc) in &scrubbed {
            self.write_json(path, doc)?;
            files.push(path.clone());
        }
        self.write_index(&mut index)?;
        files.push(GRAPH_FILE.to_string());
        self.storage.delete(&removed_path)?;
        files.push(removed_path);
        files.extend(self.sweep_orphans(&index)?);

        tracing::info!(
            "Removed node {} ({} nodes scrubbed)",
            node_id,
            scrubbed.len()
        );
        Ok(OperationResult::new(Operation::RemoveNode, node_id, files))
    }

    /// Delete node files that the index no longer references.
    fn sweep_orphans(&self, index: &GraphIndex) -> Result<Vec<String>> {
        let referenced: HashSet<&str> = index.nodes.iter().map(|r| r.path.as_str()).collect();
        let mut removed = Vec::new();
        for rel in self.storage.list("nodes/**/*.json")? {
            if referenced.contains(rel.as_str()) {
                continue;
            }
            match self.storage.delete(&rel) {
                Ok(()) => removed.push(rel),
                Err(e) => tracing::warn!("Could not remove orphaned node file {}: {}", rel, e),
            }
        }
        Ok(removed)
    }

    pub fn add_edge(
        &self,
        store: &NodeStore,
        source: &str,
        target: &str,
        edge_type: &str,
    ) -> Result<OperationResult> {
        let edge = parse_edge(source, target, edge_type)?;
        let source_node = store.require(source)?;
        store.require(target)?;

        if source_node.links.contains_edge(edge, target) {
            return Ok(OperationResult::new(Operation::AddEdge, source, Vec::new()));
        }
        self.write_edge_change(
            store,
            source_node.with_edge_added(edge, target),
            Operation::AddEdge,
        )
    }

    pub fn remove_edge(
        &self,
        store: &NodeStore,
        source: &str,
        target: &str,
        edge_type: &str,
    ) -> Result<OperationResult> {
        let edge = parse_edge(source, target, edge_type)?;
        let source_node = store.require(source)?;

        if !source_node.links.contains_edge(edge, target) {
            return Ok(OperationResult::new(Operation::RemoveEdge, source, Vec::new()));
        }
        self.write_edge_change(
            store,
            source_node.with_edge_removed(edge, target),
            Operation::RemoveEdge,
        )
    }

    fn write_edge_change(
        &self,
        store: &NodeStore,
        next: SpecNode,
        operation: Operation,
    ) -> Result<OperationResult> {
        let doc = with_node_schema(next.to_value());
        self.validate_node(&doc)?;

        let path = store
            .node_ref(&next.id)
            .map(|r| r.path.clone())
            .unwrap_or_else(|| next.storage_path());
        self.write_json(&path, &doc)?;

        tracing::info!("{:?} on {}", operation, next.id);
        Ok(OperationResult::new(operation, &next.id, vec![path]))
    }

    /// Create the index and a root feature in an empty graph directory.
    pub fn init(&self, options: InitOptions, default_version: &str) -> Result<OperationResult> {
        if self.storage.exists(GRAPH_FILE)? {
            return Err(SpecgraphError::conflict(format!(
                "Path already exists: {}",
                GRAPH_FILE
            )));
        }

        let root = options.root_feature.unwrap_or_default();
        let feature_path = node_path_for(&root.id, NodeType::Feature);
        let feature = json!({
            "$schema": NODE_SCHEMA_URL,
            "id": root.id,
            "type": "feature",
            "title": root.title,
            "description": root.description
        });
        let index = GraphIndex {
            schema: Some(GRAPH_SCHEMA_URL.to_string()),
            specgraph_version: options
                .specgraph_version
                .unwrap_or_else(|| default_version.to_string()),
            root: Some(root.id.clone()),
            node_search_paths: None,
            nodes: vec![NodeRef {
                id: root.id.clone(),
                path: feature_path.clone(),
                expected_type: Some(NodeType::Feature.to_string()),
                sha256: None,
            }],
            defaults: None,
        };

        let feature_issues = self.schemas.validate_node(&feature);
        if !feature_issues.is_empty() {
            return Err(SpecgraphError::schema_invalid("Invalid root feature node", feature_issues));
        }
        let index_value = serde_json::to_value(&index).map_err(|e| SpecgraphError::json(GRAPH_FILE, e))?;
        let index_issues = self.schemas.validate_graph(&index_value);
        if !index_issues.is_empty() {
            return Err(SpecgraphError::schema_invalid("Invalid graph index", index_issues));
        }
        if self.storage.exists(&feature_path)? {
            return Err(SpecgraphError::conflict(format!(
                "Path already exists: {}",
                feature_path
            )));
        }

        self.write_json(&feature_path, &feature)?;
        self.write_json(GRAPH_FILE, &index_value)?;

        tracing::info!("Initialised spec graph with root {}", root.id);
        Ok(OperationResult::new(
            Operation::InitSpecgraph,
            &root.id,
            vec![feature_path, GRAPH_FILE.to_string()],
        ))
    }
}

fn parse_edge(source: &str, target: &str, edge_type: &str) -> Result<EdgeType> {
    let edge = edge_type
        .parse::<EdgeType>()
        .map_err(SpecgraphError::invalid_edge)?;
    if source == target {
        return Err(SpecgraphError::invalid_edge("Self-references are not allowed"));
    }
    Ok(edge)
}
