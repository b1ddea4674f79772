//! Schema-valid documents for unit tests.

use serde_json::{json, Value};

use crate::model::{node_path_for, NodeType, SpecNode};
use crate::storage::{to_canonical_json, Storage};
use crate::store::GRAPH_FILE;

pub fn feature(id: &str) -> Value {
    json!({
        "id": id,
        "type": "feature",
        "title": format!("{} feature", id),
        "description": format!("Everything about {}", id)
    })
}

pub fn layer(id: &str) -> Value {
    json!({
        "id": id,
        "type": "layer",
        "title": format!("{} layer", id),
        "description": "Cross-cutting platform concerns"
    })
}

pub fn behavior(id: &str) -> Value {
    json!({
        "id": id,
        "type": "behavior",
        "title": format!("{} behavior", id),
        "expectation": "The user sees the expected result",
        "verification": "cargo test"
    })
}

pub fn decision(id: &str, category: &str) -> Value {
    json!({
        "id": id,
        "type": "decision",
        "title": format!("{} decision", id),
        "category": category,
        "statement": format!("Decision {} applies", id),
        "verification": ["Reviewed in design review"],
        "metadata": { "rationale": "Chosen after comparing the alternatives" }
    })
}

pub fn policy(id: &str, severity: &str, statement: &str) -> Value {
    json!({
        "id": id,
        "type": "policy",
        "title": format!("{} policy", id),
        "severity": severity,
        "statement": statement,
        "verification": [{ "kind": "policy", "ruleId": "R-1" }]
    })
}

pub fn artifact(id: &str, sha256: &str) -> Value {
    json!({
        "id": id,
        "type": "artifact",
        "title": format!("{} artifact", id),
        "statement": "Generated client bindings",
        "verification": ["Regenerate and diff"],
        "artifact": { "sha256": sha256, "source": "openapi.yaml" }
    })
}

pub fn with_links(mut doc: Value, edge: &str, targets: &[&str]) -> Value {
    doc["links"][edge] = json!(targets);
    doc
}

pub fn node(doc: &Value) -> SpecNode {
    serde_json::from_value(doc.clone()).unwrap()
}

/// Write every document plus a sorted index with expected types.
pub fn seed(storage: &dyn Storage, root: Option<&str>, docs: &[Value]) {
    let mut refs: Vec<Value> = docs
        .iter()
        .map(|doc| {
            let id = doc["id"].as_str().unwrap();
            let node_type: NodeType = doc["type"].as_str().unwrap().parse().unwrap();
            let path = node_path_for(id, node_type);
            storage.write(&path, &to_canonical_json(doc).unwrap()).unwrap();
            json!({ "id": id, "path": path, "expectedType": node_type.as_str() })
        })
        .collect();
    refs.sort_by(|a, b| a["id"].as_str().cmp(&b["id"].as_str()));

    let mut index = json!({ "specgraphVersion": "1.0.0", "nodes": refs });
    if let Some(root) = root {
        index["root"] = json!(root);
    }
    storage
        .write(GRAPH_FILE, &to_canonical_json(&index).unwrap())
        .unwrap();
}
