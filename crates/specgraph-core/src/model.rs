use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// --- Node and edge vocabularies ---

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    schemars::JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Feature,
    Layer,
    Behavior,
    Decision,
    Domain,
    Policy,
    DesignToken,
    UiContract,
    ApiContract,
    DataModel,
    Artifact,
    EquivalenceContract,
    Pipeline,
}

impl NodeType {
    pub const ALL: [NodeType; 13] = [
        NodeType::Feature,
        NodeType::Layer,
        NodeType::Behavior,
        NodeType::Decision,
        NodeType::Domain,
        NodeType::Policy,
        NodeType::DesignToken,
        NodeType::UiContract,
        NodeType::ApiContract,
        NodeType::DataModel,
        NodeType::Artifact,
        NodeType::EquivalenceContract,
        NodeType::Pipeline,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Feature => "feature",
            NodeType::Layer => "layer",
            NodeType::Behavior => "behavior",
            NodeType::Decision => "decision",
            NodeType::Domain => "domain",
            NodeType::Policy => "policy",
            NodeType::DesignToken => "design_token",
            NodeType::UiContract => "ui_contract",
            NodeType::ApiContract => "api_contract",
            NodeType::DataModel => "data_model",
            NodeType::Artifact => "artifact",
            NodeType::EquivalenceContract => "equivalence_contract",
            NodeType::Pipeline => "pipeline",
        }
    }

    /// Feature and layer nodes organise other nodes through `contains`.
    pub fn is_grouping(&self) -> bool {
        matches!(self, NodeType::Feature | NodeType::Layer)
    }

    /// Contract-style nodes carry a statement, verification list and optional pins.
    pub fn is_contract(&self) -> bool {
        !self.is_grouping() && *self != NodeType::Behavior
    }

    /// Directory under `nodes/` that holds files of this type.
    pub fn storage_dir(&self) -> &'static str {
        match self {
            NodeType::Feature => "features",
            NodeType::Layer => "layers",
            NodeType::Behavior => "behaviors",
            NodeType::Decision => "decisions",
            NodeType::Domain => "domains",
            NodeType::Policy => "policies",
            NodeType::DesignToken => "design_tokens",
            NodeType::UiContract => "ui_contracts",
            NodeType::ApiContract => "api_contracts",
            NodeType::DataModel => "data_models",
            NodeType::Artifact => "artifacts",
            NodeType::EquivalenceContract => "equivalence_contracts",
            NodeType::Pipeline => "pipelines",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unsupported node type: {}", s))
    }
}

/// Edge types in canonical order. `Ord` follows declaration order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    schemars::JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Contains,
    DependsOn,
    Constrains,
    Implements,
    DerivedFrom,
    VerifiedBy,
    Supersedes,
}

impl EdgeType {
    pub const ALL: [EdgeType; 7] = [
        EdgeType::Contains,
        EdgeType::DependsOn,
        EdgeType::Constrains,
        EdgeType::Implements,
        EdgeType::DerivedFrom,
        EdgeType::VerifiedBy,
        EdgeType::Supersedes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Contains => "contains",
            EdgeType::DependsOn => "depends_on",
            EdgeType::Constrains => "constrains",
            EdgeType::Implements => "implements",
            EdgeType::DerivedFrom => "derived_from",
            EdgeType::VerifiedBy => "verified_by",
            EdgeType::Supersedes => "supersedes",
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EdgeType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Invalid edge type: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionCategory {
    Architecture,
    Stack,
    Pattern,
    Interface,
}

impl DecisionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionCategory::Architecture => "architecture",
            DecisionCategory::Stack => "stack",
            DecisionCategory::Pattern => "pattern",
            DecisionCategory::Interface => "interface",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicySeverity {
    Hard,
    Soft,
}

impl PolicySeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicySeverity::Hard => "hard",
            PolicySeverity::Soft => "soft",
        }
    }
}

// --- Links and pins ---

/// Outbound edges of a node, keyed by edge type. Target lists keep their
/// stored order but are treated as sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Links(BTreeMap<EdgeType, Vec<String>>);

impl Links {
    pub fn is_empty(&self) -> bool {
        self.0.values().all(|targets| targets.is_empty())
    }

    pub fn targets(&self, edge: EdgeType) -> &[String] {
        self.0.get(&edge).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Targets with empty strings and repeats dropped, first occurrence wins.
    pub fn unique_targets(&self, edge: EdgeType) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.targets(edge)
            .iter()
            .map(|t| t.as_str())
            .filter(|t| !t.is_empty() && seen.insert(*t))
            .collect()
    }

    pub fn contains_edge(&self, edge: EdgeType, target: &str) -> bool {
        self.targets(edge).iter().any(|t| t == target)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EdgeType, &[String])> {
        self.0.iter().map(|(edge, targets)| (*edge, targets.as_slice()))
    }

    fn set(&mut self, edge: EdgeType, targets: Vec<String>) {
        if targets.is_empty() {
            self.0.remove(&edge);
        } else {
            self.0.insert(edge, targets);
        }
    }
}

impl FromIterator<(EdgeType, Vec<String>)> for Links {
    fn from_iter<I: IntoIterator<Item = (EdgeType, Vec<String>)>>(iter: I) -> Self {
        let mut links = Links::default();
        for (edge, targets) in iter {
            links.set(edge, targets);
        }
        links
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Pin {
    pub id: String,
    pub sha256: String,
}

// --- Nodes ---

/// A node document. Attributes other than `id`, `type`, `links` and `pins`
/// are kept verbatim in `attrs` so documents round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Links::is_empty")]
    pub links: Links,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pins: Vec<Pin>,
    #[serde(flatten)]
    pub attrs: Map<String, Value>,
}

impl SpecNode {
    pub fn new(id: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            node_type,
            links: Links::default(),
            pins: Vec::new(),
            attrs: Map::new(),
        }
    }

    pub fn with_attr(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attrs.insert(key.to_string(), value.into());
        self
    }

    pub fn with_links(mut self, edge: EdgeType, targets: &[&str]) -> Self {
        let mut next = self.links.targets(edge).to_vec();
        next.extend(targets.iter().map(|t| t.to_string()));
        self.links.set(edge, next);
        self
    }

    pub fn str_attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(|v| v.as_str())
    }

    pub fn title(&self) -> Option<&str> {
        self.str_attr("title")
    }

    pub fn status(&self) -> Option<&str> {
        self.str_attr("status")
    }

    pub fn statement(&self) -> Option<&str> {
        self.str_attr("statement")
    }

    pub fn category(&self) -> Option<DecisionCategory> {
        self.attrs
            .get("category")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Raw severity string, as reported in query output.
    pub fn severity_str(&self) -> Option<&str> {
        self.str_attr("severity")
    }

    pub fn severity(&self) -> Option<PolicySeverity> {
        match self.severity_str()? {
            "hard" => Some(PolicySeverity::Hard),
            "soft" => Some(PolicySeverity::Soft),
            _ => None,
        }
    }

    /// Declared hash of an artifact node's external content.
    pub fn artifact_sha256(&self) -> Option<&str> {
        if self.node_type != NodeType::Artifact {
            return None;
        }
        self.attrs
            .get("artifact")
            .and_then(|a| a.get("sha256"))
            .and_then(|h| h.as_str())
    }

    pub fn pin_for(&self, source_id: &str) -> Option<&str> {
        self.pins
            .iter()
            .find(|p| p.id == source_id)
            .map(|p| p.sha256.as_str())
    }

    /// Storage path relative to the graph directory.
    pub fn storage_path(&self) -> String {
        node_path_for(&self.id, self.node_type)
    }

    pub fn with_edge_added(&self, edge: EdgeType, target: &str) -> SpecNode {
        let mut next = self.clone();
        let mut targets = next.links.targets(edge).to_vec();
        if !targets.iter().any(|t| t == target) {
            targets.push(target.to_string());
        }
        next.links.set(edge, targets);
        next
    }

    pub fn with_edge_removed(&self, edge: EdgeType, target: &str) -> SpecNode {
        let mut next = self.clone();
        let targets = next
            .links
            .targets(edge)
            .iter()
            .filter(|t| *t != target)
            .cloned()
            .collect();
        next.links.set(edge, targets);
        next
    }

    /// Copy with every edge and pin to `target` removed. `None` when nothing
    /// referenced it.
    pub fn without_target(&self, target: &str) -> Option<SpecNode> {
        let references = self
            .links
            .iter()
            .any(|(_, targets)| targets.iter().any(|t| t == target))
            || self.pins.iter().any(|p| p.id == target);
        if !references {
            return None;
        }
        let links = self
            .links
            .iter()
            .map(|(edge, targets)| {
                let kept = targets.iter().filter(|t| *t != target).cloned().collect();
                (edge, kept)
            })
            .collect();
        let pins = self.pins.iter().filter(|p| p.id != target).cloned().collect();
        Some(SpecNode {
            links,
            pins,
            ..self.clone()
        })
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Best-effort view of a document that may not pass the schema, keyed by
    /// the id the index gives it. Link lists keep only their string targets,
    /// pins keep only complete entries, and a missing or unknown `type` reads
    /// as a plain behavior leaf.
    pub fn from_doc_lenient(id: &str, doc: &Value) -> SpecNode {
        let node_type = doc
            .get("type")
            .and_then(Value::as_str)
            .and_then(|t| t.parse().ok())
            .unwrap_or(NodeType::Behavior);

        let links = doc
            .get("links")
            .and_then(Value::as_object)
            .map(|links| {
                EdgeType::ALL
                    .iter()
                    .filter_map(|edge| {
                        let targets = links.get(edge.as_str())?.as_array()?;
                        let targets: Vec<String> = targets
                            .iter()
                            .filter_map(Value::as_str)
                            .filter(|t| !t.is_empty())
                            .map(str::to_string)
                            .collect();
                        Some((*edge, targets))
                    })
                    .collect::<Links>()
            })
            .unwrap_or_default();

        let pins = doc
            .get("pins")
            .and_then(Value::as_array)
            .map(|pins| {
                pins.iter()
                    .filter_map(|pin| {
                        Some(Pin {
                            id: pin.get("id")?.as_str()?.to_string(),
                            sha256: pin.get("sha256")?.as_str()?.to_string(),
                        })
                    })
                    .collect::<Vec<Pin>>()
            })
            .unwrap_or_default();

        let attrs = doc
            .as_object()
            .map(|fields| {
                fields
                    .iter()
                    .filter(|(key, _)| !matches!(key.as_str(), "id" | "type" | "links" | "pins"))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect::<Map<String, Value>>()
            })
            .unwrap_or_default();

        SpecNode {
            id: id.to_string(),
            node_type,
            links,
            pins,
            attrs,
        }
    }
}

pub fn node_path_for(id: &str, node_type: NodeType) -> String {
    format!("nodes/{}/{}.json", node_type.storage_dir(), id)
}

/// `^[A-Z][A-Z0-9-]*$`
pub fn is_valid_node_id(id: &str) -> bool {
    let mut chars = id.chars();
    match chars.next() {
        Some(c) if c.is_ascii_uppercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
}

// --- Graph index ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRef {
    pub id: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphIndex {
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub specgraph_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_search_paths: Option<Vec<String>>,
    pub nodes: Vec<NodeRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<Map<String, Value>>,
}

impl GraphIndex {
    pub fn find(&self, id: &str) -> Option<&NodeRef> {
        self.nodes.iter().find(|r| r.id == id)
    }

    pub fn sort_nodes(&mut self) {
        self.nodes.sort_by(|a, b| a.id.cmp(&b.id));
    }
}
