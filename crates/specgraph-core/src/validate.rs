use std::collections::{HashMap, HashSet};

use serde::Serialize;
use serde_json::Value;

use crate::cycle::{find_dependency_cycle, find_layer_inversions, format_cycle, format_inversion};
use crate::error::{Result, SchemaIssueDetail, SpecgraphError};
use crate::model::{EdgeType, SpecNode};
use crate::resolve::find_ambiguities;
use crate::schema::SchemaSet;
use crate::storage::{sha256_hex, Storage};
use crate::store::{NodeStore, GRAPH_FILE};

/// Node id used for problems with the index document itself.
pub const GRAPH_ISSUE_ID: &str = "GRAPH";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaIssue {
    pub node_id: String,
    pub file: String,
    pub errors: Vec<SchemaIssueDetail>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructuralIssue {
    pub node_id: String,
    pub severity: IssueSeverity,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub total_nodes: usize,
    pub valid_nodes: usize,
    pub schema_errors: Vec<SchemaIssue>,
    pub structural_issues: Vec<StructuralIssue>,
}

impl ValidationReport {
    pub fn errors(&self) -> impl Iterator<Item = &StructuralIssue> {
        self.structural_issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &StructuralIssue> {
        self.structural_issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Warning)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationOptions {
    /// Missing pins are errors rather than warnings.
    pub strict_pins: bool,
}

/// Collects findings for one graph directory. Only an unreadable or
/// unparseable index aborts; every other problem lands in the report.
struct Validator<'a> {
    storage: &'a dyn Storage,
    schemas: &'a SchemaSet,
    options: ValidationOptions,
    schema_errors: Vec<SchemaIssue>,
    issues: Vec<StructuralIssue>,
    invalid_ids: HashSet<String>,
}

impl<'a> Validator<'a> {
    fn error(&mut self, node_id: &str, message: String) {
        self.issues.push(StructuralIssue {
            node_id: node_id.to_string(),
            severity: IssueSeverity::Error,
            message,
        });
    }

    fn warning(&mut self, node_id: &str, message: String) {
        self.issues.push(StructuralIssue {
            node_id: node_id.to_string(),
            severity: IssueSeverity::Warning,
            message,
        });
    }

    fn schema_error(&mut self, node_id: &str, file: &str, errors: Vec<SchemaIssueDetail>) {
        self.schema_errors.push(SchemaIssue {
            node_id: node_id.to_string(),
            file: file.to_string(),
            errors,
        });
    }

    fn run(mut self) -> Result<ValidationReport> {
        let raw = self.storage.read(GRAPH_FILE)?;
        let index: Value =
            serde_json::from_slice(&raw).map_err(|e| SpecgraphError::json(GRAPH_FILE, e))?;

        let index_issues = self.schemas.validate_graph(&index);
        if !index_issues.is_empty() {
            self.schema_error(GRAPH_ISSUE_ID, GRAPH_FILE, index_issues);
        }

        let refs = index
            .get("nodes")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        // Raw documents in index order, plus live file hashes for pin checks.
        let mut docs: Vec<(String, Value)> = Vec::new();
        let mut known: HashSet<String> = HashSet::new();
        let mut file_hashes: HashMap<String, String> = HashMap::new();

        for node_ref in &refs {
            let (Some(id), Some(path)) = (
                node_ref.get("id").and_then(Value::as_str),
                node_ref.get("path").and_then(Value::as_str),
            ) else {
                self.schema_error(
                    GRAPH_ISSUE_ID,
                    GRAPH_FILE,
                    vec![SchemaIssueDetail::new(
                        "/nodes",
                        format!("invalid node reference: {}", node_ref),
                    )],
                );
                continue;
            };

            if known.contains(id) {
                self.error(id, format!("duplicate node id '{}' in graph.json", id));
                self.invalid_ids.insert(id.to_string());
                continue;
            }

            let bytes = match self.storage.read(path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.schema_error(
                        id,
                        path,
                        vec![SchemaIssueDetail::new("/", format!("failed to read node file: {}", e))],
                    );
                    self.invalid_ids.insert(id.to_string());
                    continue;
                }
            };
            let doc: Value = match serde_json::from_slice(&bytes) {
                Ok(doc) => doc,
                Err(e) => {
                    self.schema_error(
                        id,
                        path,
                        vec![SchemaIssueDetail::new("/", format!("failed to parse node file: {}", e))],
                    );
                    self.invalid_ids.insert(id.to_string());
                    continue;
                }
            };

            let actual_hash = sha256_hex(&bytes);
            self.check_identity(id, node_ref, &doc, &actual_hash);

            let node_issues = self.schemas.validate_node(&doc);
            if !node_issues.is_empty() {
                self.schema_error(id, path, node_issues);
                self.invalid_ids.insert(id.to_string());
            }

            known.insert(id.to_string());
            file_hashes.insert(id.to_string(), actual_hash);
            docs.push((id.to_string(), doc));
        }

        if let Some(root) = index.get("root").and_then(Value::as_str) {
            if !root.is_empty() && !known.contains(root) && !self.invalid_ids.contains(root) {
                self.error(
                    GRAPH_ISSUE_ID,
                    format!("graph.root references missing node: {}", root),
                );
            }
        }

        for (id, doc) in &docs {
            self.check_links(id, doc, &known);
        }

        // Schema-invalid nodes still take part in the graph checks.
        let structural: Vec<SpecNode> = docs
            .iter()
            .map(|(id, doc)| SpecNode::from_doc_lenient(id, doc))
            .collect();
        let store = NodeStore::from_nodes(structural);
        self.check_graph(&store);
        self.check_pins(&store, &file_hashes);

        let has_errors = self
            .issues
            .iter()
            .any(|i| i.severity == IssueSeverity::Error);
        let total_nodes = refs.len();
        let valid_nodes = total_nodes.saturating_sub(self.invalid_ids.len());

        tracing::debug!(
            "Validated {} nodes: {} schema issues, {} structural issues",
            total_nodes,
            self.schema_errors.len(),
            self.issues.len()
        );

        Ok(ValidationReport {
            valid: self.schema_errors.is_empty() && !has_errors,
            total_nodes,
            valid_nodes,
            schema_errors: self.schema_errors,
            structural_issues: self.issues,
        })
    }

    fn check_identity(&mut self, id: &str, node_ref: &Value, doc: &Value, actual_hash: &str) {
        let doc_id = doc.get("id").and_then(Value::as_str);
        if doc_id != Some(id) {
            self.error(
                id,
                format!(
                    "graph ref id '{}' does not match node.id '{}'",
                    id,
                    display_value(doc.get("id"))
                ),
            );
            self.invalid_ids.insert(id.to_string());
        }

        if let Some(expected) = node_ref
            .get("expectedType")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
        {
            let actual = doc.get("type").and_then(Value::as_str);
            if actual != Some(expected) {
                self.error(
                    id,
                    format!(
                        "expectedType mismatch: graph.json={}, node.type={}",
                        expected,
                        display_value(doc.get("type"))
                    ),
                );
            }
        }

        if let Some(declared) = node_ref
            .get("sha256")
            .and_then(Value::as_str)
            .filter(|h| !h.is_empty())
        {
            if !declared.eq_ignore_ascii_case(actual_hash) {
                self.error(
                    id,
                    format!(
                        "sha256 mismatch: graph.json={}, file={}",
                        declared, actual_hash
                    ),
                );
            }
        }
    }

    fn check_links(&mut self, id: &str, doc: &Value, known: &HashSet<String>) {
        let Some(links) = doc.get("links") else {
            return;
        };
        let Some(links) = links.as_object() else {
            self.error(id, "links must be an object when present".to_string());
            return;
        };

        for edge in EdgeType::ALL {
            let Some(raw_targets) = links.get(edge.as_str()) else {
                continue;
            };
            let Some(targets) = raw_targets.as_array() else {
                self.error(id, format!("links.{} must be an array", edge));
                continue;
            };
            for target in targets {
                let Some(target) = target.as_str().filter(|t| !t.is_empty()) else {
                    self.error(id, format!("links.{} contains a non-string target", edge));
                    continue;
                };
                if target == id {
                    self.error(id, format!("self-reference is not allowed in links.{}", edge));
                }
                if !known.contains(target) {
                    self.error(
                        id,
                        format!("{} target '{}' does not exist in the graph", edge, target),
                    );
                }
            }
        }
    }

    fn check_graph(&mut self, store: &NodeStore) {
        for (layer, feature) in find_layer_inversions(store) {
            self.error(&layer, format_inversion(&layer, &feature));
        }

        if let Some(cycle) = find_dependency_cycle(store) {
            let first = cycle.first().cloned().unwrap_or_default();
            self.error(&first, format_cycle(&cycle));
        }

        for ambiguity in find_ambiguities(store) {
            self.error(&ambiguity.node_id, ambiguity.message);
        }
    }

    fn check_pins(&mut self, store: &NodeStore, file_hashes: &HashMap<String, String>) {
        for node in store.nodes() {
            for source_id in node.links.unique_targets(EdgeType::DerivedFrom) {
                let Some(pinned) = node.pin_for(source_id) else {
                    let message = format!(
                        "{} has derived_from {} but is missing a matching pins entry",
                        node.id, source_id
                    );
                    if self.options.strict_pins {
                        self.error(&node.id, message);
                    } else {
                        self.warning(&node.id, message);
                    }
                    continue;
                };

                let Some(source) = store.get(source_id) else {
                    continue;
                };
                let expected = source
                    .artifact_sha256()
                    .or_else(|| file_hashes.get(source_id).map(String::as_str));
                if let Some(expected) = expected {
                    if !expected.eq_ignore_ascii_case(pinned) {
                        self.error(
                            &node.id,
                            format!(
                                "{} pins {} at {} but current source hash is {}",
                                node.id, source_id, pinned, expected
                            ),
                        );
                    }
                }
            }
        }
    }
}

fn display_value(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "undefined".to_string(),
    }
}

/// Validate the graph stored in `storage`. Fails only when the index itself
/// cannot be read or parsed.
pub fn validate_specgraph(
    storage: &dyn Storage,
    schemas: &SchemaSet,
    options: ValidationOptions,
) -> Result<ValidationReport> {
    Validator {
        storage,
        schemas,
        options,
        schema_errors: Vec::new(),
        issues: Vec::new(),
        invalid_ids: HashSet::new(),
    }
    .run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, behavior, decision, feature, layer, seed, with_links};
    use crate::storage::{to_canonical_json, MemoryStorage};
    use serde_json::json;

    fn run(storage: &MemoryStorage) -> ValidationReport {
        run_with(storage, ValidationOptions::default())
    }

    fn run_with(storage: &MemoryStorage, options: ValidationOptions) -> ValidationReport {
        validate_specgraph(storage, &SchemaSet::bundled().unwrap(), options).unwrap()
    }

    fn messages(report: &ValidationReport) -> Vec<&str> {
        report
            .structural_issues
            .iter()
            .map(|i| i.message.as_str())
            .collect()
    }

    #[test]
    fn clean_graph_is_valid() {
        let storage = MemoryStorage::new();
        seed(
            &storage,
            Some("ROOT"),
            &[
                with_links(feature("ROOT"), "contains", &["AUTH-01"]),
                behavior("AUTH-01"),
            ],
        );
        let report = run(&storage);
        assert!(report.valid, "{:?}", report);
        assert_eq!(report.total_nodes, 2);
        assert_eq!(report.valid_nodes, 2);
    }

    #[test]
    fn dangling_and_self_references_are_errors() {
        let storage = MemoryStorage::new();
        seed(
            &storage,
            None,
            &[with_links(feature("ROOT"), "contains", &["ROOT", "GHOST"])],
        );
        let report = run(&storage);
        assert!(!report.valid);
        let messages = messages(&report);
        assert!(messages.contains(&"self-reference is not allowed in links.contains"));
        assert!(messages.contains(&"contains target 'GHOST' does not exist in the graph"));
    }

    #[test]
    fn malformed_links_are_reported_not_fatal() {
        let storage = MemoryStorage::new();
        let mut doc = feature("ROOT");
        doc["links"] = json!({ "depends_on": "AUTH", "contains": [7] });
        seed(&storage, None, &[doc, behavior("AUTH-01")]);

        let report = run(&storage);
        let messages = messages(&report);
        assert!(messages.contains(&"links.depends_on must be an array"));
        assert!(messages.contains(&"links.contains contains a non-string target"));
        assert!(report.schema_errors.iter().any(|s| s.node_id == "ROOT"));
        assert_eq!(report.valid_nodes, 1);
    }

    #[test]
    fn cycle_and_inversion_are_errors() {
        let storage = MemoryStorage::new();
        seed(
            &storage,
            None,
            &[
                with_links(behavior("A"), "depends_on", &["B"]),
                with_links(behavior("B"), "depends_on", &["A"]),
                with_links(layer("PLATFORM"), "depends_on", &["AUTH"]),
                feature("AUTH"),
            ],
        );
        let report = run(&storage);
        let messages = messages(&report);
        assert!(messages.contains(&"depends_on cycle detected: A -> B -> A"));
        assert!(messages.contains(
            &"Invalid dependency inversion: layer 'PLATFORM' cannot depend_on feature 'AUTH'"
        ));
        assert!(!report.valid);
    }

    #[test]
    fn malformed_nodes_still_join_graph_checks() {
        let storage = MemoryStorage::new();
        let mut a = with_links(behavior("A"), "depends_on", &["B"]);
        a["links"]["contains"] = json!([7]);
        let mut platform = with_links(layer("PLATFORM"), "depends_on", &["AUTH"]);
        platform["links"]["supersedes"] = json!("D1");
        let mut derived = with_links(decision("DER", "pattern"), "derived_from", &["A"]);
        derived["pins"] = json!([{ "id": "A" }]);
        seed(
            &storage,
            None,
            &[
                a,
                with_links(behavior("B"), "depends_on", &["A"]),
                platform,
                feature("AUTH"),
                derived,
            ],
        );

        let report = run_with(&storage, ValidationOptions { strict_pins: true });
        let messages = messages(&report);
        assert!(messages.contains(&"links.contains contains a non-string target"));
        assert!(messages.contains(&"depends_on cycle detected: A -> B -> A"));
        assert!(messages.contains(
            &"Invalid dependency inversion: layer 'PLATFORM' cannot depend_on feature 'AUTH'"
        ));
        assert!(messages.contains(&"DER has derived_from A but is missing a matching pins entry"));
    }

    #[test]
    fn graph_checks_use_index_ids() {
        let storage = MemoryStorage::new();
        seed(
            &storage,
            None,
            &[
                with_links(behavior("A"), "depends_on", &["B"]),
                with_links(behavior("B"), "depends_on", &["A"]),
            ],
        );
        // B's file claims a different id; the index still names it B.
        let mut renamed = with_links(behavior("B"), "depends_on", &["A"]);
        renamed["id"] = json!("ZED");
        storage
            .write("nodes/behaviors/B.json", &to_canonical_json(&renamed).unwrap())
            .unwrap();

        let report = run(&storage);
        let messages = messages(&report);
        assert!(messages.contains(&"graph ref id 'B' does not match node.id 'ZED'"));
        assert!(messages.contains(&"depends_on cycle detected: A -> B -> A"));
        assert!(!messages.iter().any(|m| m.contains("ZED") && m.contains("does not exist")));
    }

    #[test]
    fn ambiguity_is_an_error_per_node() {
        let storage = MemoryStorage::new();
        seed(
            &storage,
            None,
            &[
                with_links(layer("PLATFORM"), "contains", &["D1", "D2"]),
                decision("D1", "stack"),
                decision("D2", "stack"),
                with_links(behavior("AUTH-01"), "depends_on", &["PLATFORM"]),
            ],
        );
        let report = run(&storage);
        let ambiguous: Vec<&str> = report
            .errors()
            .filter(|i| i.message.starts_with("Ambiguous propagated decisions"))
            .map(|i| i.node_id.as_str())
            .collect();
        assert!(ambiguous.contains(&"AUTH-01"));
    }

    #[test]
    fn identity_checks() {
        let storage = MemoryStorage::new();
        seed(&storage, None, &[feature("ROOT"), behavior("AUTH-01")]);
        let index = json!({
            "specgraphVersion": "1.0.0",
            "nodes": [
                { "id": "ROOT", "path": "nodes/features/ROOT.json", "expectedType": "layer" },
                { "id": "OTHER", "path": "nodes/behaviors/AUTH-01.json" },
                { "id": "ROOT", "path": "nodes/features/ROOT.json" },
                { "id": "GONE", "path": "nodes/features/GONE.json" }
            ]
        });
        storage.write(GRAPH_FILE, &to_canonical_json(&index).unwrap()).unwrap();

        let report = run(&storage);
        let messages = messages(&report);
        assert!(messages.contains(&"expectedType mismatch: graph.json=layer, node.type=feature"));
        assert!(messages.contains(&"graph ref id 'OTHER' does not match node.id 'AUTH-01'"));
        assert!(messages.contains(&"duplicate node id 'ROOT' in graph.json"));
        assert!(report
            .schema_errors
            .iter()
            .any(|s| s.node_id == "GONE" && s.errors[0].message.starts_with("failed to read node file")));
        assert_eq!(report.total_nodes, 4);
        // OTHER (id mismatch), ROOT (duplicate), GONE (unreadable)
        assert_eq!(report.valid_nodes, 1);
    }

    #[test]
    fn tampered_file_hash_is_an_error() {
        let storage = MemoryStorage::new();
        seed(&storage, None, &[feature("ROOT")]);
        let index = json!({
            "specgraphVersion": "1.0.0",
            "nodes": [{ "id": "ROOT", "path": "nodes/features/ROOT.json", "sha256": "0".repeat(64) }]
        });
        storage.write(GRAPH_FILE, &to_canonical_json(&index).unwrap()).unwrap();

        let report = run(&storage);
        assert!(report.errors().any(|i| i.message.starts_with("sha256 mismatch")));
    }

    #[test]
    fn missing_root_is_an_error() {
        let storage = MemoryStorage::new();
        seed(&storage, Some("NOPE"), &[feature("ROOT")]);
        let report = run(&storage);
        assert_eq!(messages(&report), vec!["graph.root references missing node: NOPE"]);
        assert_eq!(report.structural_issues[0].node_id, GRAPH_ISSUE_ID);
    }

    #[test]
    fn pins_follow_strictness_and_detect_staleness() {
        let source = behavior("SRC");
        let storage = MemoryStorage::new();
        let derived = with_links(decision("DER", "pattern"), "derived_from", &["SRC"]);
        seed(&storage, None, &[source.clone(), derived.clone()]);

        let lenient = run(&storage);
        assert!(lenient.valid);
        assert_eq!(lenient.warnings().count(), 1);

        let strict = run_with(&storage, ValidationOptions { strict_pins: true });
        assert!(!strict.valid);

        let live_hash = sha256_hex(&to_canonical_json(&source).unwrap());
        let mut pinned = derived.clone();
        pinned["pins"] = json!([{ "id": "SRC", "sha256": live_hash }]);
        seed(&storage, None, &[source.clone(), pinned.clone()]);
        let fresh = run(&storage);
        assert!(fresh.valid, "{:?}", fresh);
        assert_eq!(fresh.warnings().count(), 0);

        pinned["pins"] = json!([{ "id": "SRC", "sha256": "a".repeat(64) }]);
        seed(&storage, None, &[source, pinned]);
        let stale = run(&storage);
        assert!(stale
            .errors()
            .any(|i| i.message.starts_with("DER pins SRC at aaaa")));
    }

    #[test]
    fn artifact_pins_use_declared_hash() {
        let hash = "b".repeat(64);
        let storage = MemoryStorage::new();
        let mut derived = with_links(decision("DER", "pattern"), "derived_from", &["API"]);
        derived["pins"] = json!([{ "id": "API", "sha256": hash.clone() }]);
        seed(&storage, None, &[fixtures::artifact("API", &hash), derived]);
        assert!(run(&storage).valid);
    }

    #[test]
    fn unreadable_index_is_fatal() {
        let storage = MemoryStorage::new();
        assert!(validate_specgraph(&storage, &SchemaSet::bundled().unwrap(), ValidationOptions::default()).is_err());
        storage.write(GRAPH_FILE, b"{ not json").unwrap();
        assert!(matches!(
            validate_specgraph(&storage, &SchemaSet::bundled().unwrap(), ValidationOptions::default()),
            Err(SpecgraphError::Json { .. })
        ));
    }
}
