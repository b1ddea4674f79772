//! Read-only composite queries over a loaded graph.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, SpecgraphError};
use crate::model::{EdgeType, NodeType, SpecNode};
use crate::resolve::{EffectiveConstraints, Resolver};
use crate::store::NodeStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSummary {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub title: Option<String>,
    pub status: Option<String>,
}

impl NodeSummary {
    fn of(node: &SpecNode) -> Self {
        Self {
            id: node.id.clone(),
            node_type: node.node_type,
            title: node.title().map(str::to_string),
            status: node.status().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeList {
    pub nodes: Vec<NodeSummary>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub edge_type: EdgeType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeList {
    pub edges: Vec<Edge>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub nodes: Vec<SpecNode>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSubgraph {
    pub group: SpecNode,
    pub children: Vec<SpecNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureSubgraph {
    pub feature: SpecNode,
    pub children: Vec<SpecNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencySummary {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dependencies {
    pub node_id: String,
    pub dependencies: Vec<DependencySummary>,
    pub missing_dependencies: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: Option<NodeType>,
    pub title: Option<String>,
    pub depth: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependsOnEdge {
    pub source: String,
    pub target: String,
}

/// Guidance that applies to the node or one of its dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveGuidance {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub title: Option<String>,
    pub severity: Option<String>,
    pub statement: Option<String>,
    pub applies_to: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyCounts {
    pub direct_dependencies: usize,
    pub transitive_dependencies: usize,
    pub effective_constraints: usize,
}

/// Dependency context of a node. `dependency_nodes`, `decisions` and
/// `policies` are informational; the `effective_*` lists are normative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyContext {
    pub node_id: String,
    pub direct_dependencies: Vec<String>,
    pub dependency_nodes: Vec<DependencyNode>,
    pub decisions: Vec<DependencyNode>,
    pub policies: Vec<DependencyNode>,
    pub effective_constraint_nodes: Vec<EffectiveGuidance>,
    pub effective_decisions: Vec<EffectiveGuidance>,
    pub effective_policies: Vec<EffectiveGuidance>,
    pub missing_dependencies: Vec<String>,
    pub warnings: Vec<String>,
    pub depends_on_edges: Vec<DependsOnEdge>,
    pub count: DependencyCounts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AffectReason {
    DependsOn,
    ConstrainsDirect,
    ConstrainsInherited,
    ContainsAncestor,
    LayerDependency,
    LayerPropagated,
    ImplementsTarget,
    VerifiedByTarget,
    DerivedFromTarget,
    SupersededBy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AffectingNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub title: Option<String>,
    pub reasons: Vec<AffectReason>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AffectingGroups {
    pub depends_on_transitive: Vec<String>,
    pub constraining_nodes: Vec<String>,
    pub contains_ancestors: Vec<String>,
    pub layer_dependencies: Vec<String>,
    pub layer_propagated: Vec<String>,
    pub implements_targets: Vec<String>,
    pub verified_by_targets: Vec<String>,
    pub derived_from_targets: Vec<String>,
    pub superseded_by: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AffectingNodes {
    pub node_id: String,
    pub affecting_nodes: Vec<AffectingNode>,
    pub groups: AffectingGroups,
    pub count: usize,
}

/// Query façade over one store snapshot.
pub struct Queries<'a> {
    store: &'a NodeStore,
    resolver: Resolver<'a>,
}

impl<'a> Queries<'a> {
    pub fn new(store: &'a NodeStore) -> Self {
        Self {
            store,
            resolver: Resolver::new(store),
        }
    }

    pub fn list_nodes(&self) -> NodeList {
        let mut nodes: Vec<NodeSummary> = self.store.nodes().map(NodeSummary::of).collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        NodeList {
            count: nodes.len(),
            nodes,
        }
    }

    pub fn get_node(&self, id: &str) -> Result<&'a SpecNode> {
        self.store.require(id)
    }

    /// Every edge, in stored node order then canonical edge order.
    pub fn list_edges(&self) -> EdgeList {
        let mut edges = Vec::new();
        for node in self.store.nodes() {
            for edge_type in EdgeType::ALL {
                for target in node.links.targets(edge_type) {
                    edges.push(Edge {
                        source: node.id.clone(),
                        target: target.clone(),
                        edge_type,
                    });
                }
            }
        }
        EdgeList {
            count: edges.len(),
            edges,
        }
    }

    pub fn search_nodes(&self, query: &str) -> SearchResult {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return SearchResult {
                nodes: Vec::new(),
                count: 0,
            };
        }
        let nodes: Vec<SpecNode> = self
            .store
            .nodes()
            .filter(|node| search_text(node).to_lowercase().contains(&needle))
            .cloned()
            .collect();
        SearchResult {
            count: nodes.len(),
            nodes,
        }
    }

    /// Containment closure of a `feature` or `layer`.
    pub fn get_group_subgraph(&self, id: &str) -> Result<GroupSubgraph> {
        let group = self.store.require(id)?;
        if !group.node_type.is_grouping() {
            return Err(SpecgraphError::NotAGroup {
                id: id.to_string(),
                expected: "feature or layer".to_string(),
            });
        }
        Ok(GroupSubgraph {
            group: group.clone(),
            children: self.contains_descendants(group),
        })
    }

    pub fn get_feature_subgraph(&self, id: &str) -> Result<FeatureSubgraph> {
        let feature = self.store.require(id)?;
        if feature.node_type != NodeType::Feature {
            return Err(SpecgraphError::NotAGroup {
                id: id.to_string(),
                expected: "feature".to_string(),
            });
        }
        Ok(FeatureSubgraph {
            feature: feature.clone(),
            children: self.contains_descendants(feature),
        })
    }

    /// Breadth-first over `contains`. Missing children are skipped.
    fn contains_descendants(&self, root: &SpecNode) -> Vec<SpecNode> {
        let mut visited: HashSet<&str> = HashSet::from([root.id.as_str()]);
        let mut queue: VecDeque<&str> = root
            .links
            .targets(EdgeType::Contains)
            .iter()
            .map(String::as_str)
            .collect();
        let mut children = Vec::new();

        while let Some(id) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            let Some(node) = self.store.get(id) else {
                continue;
            };
            children.push(node.clone());
            queue.extend(
                node.links
                    .targets(EdgeType::Contains)
                    .iter()
                    .map(String::as_str)
                    .filter(|next| !visited.contains(next)),
            );
        }
        children
    }

    pub fn get_effective_constraints(&self, id: &str) -> Result<EffectiveConstraints> {
        self.resolver.effective_constraints(id)
    }

    pub fn list_dependencies(&self, id: &str) -> Result<Dependencies> {
        let node = self.store.require(id)?;
        let mut dependencies = Vec::new();
        let mut missing = Vec::new();
        for dep_id in node.links.unique_targets(EdgeType::DependsOn) {
            match self.store.get(dep_id) {
                Some(dep) => dependencies.push(DependencySummary {
                    id: dep.id.clone(),
                    node_type: dep.node_type,
                    title: dep.title().map(str::to_string),
                }),
                None => missing.push(dep_id.to_string()),
            }
        }
        dependencies.sort_by(|a, b| a.id.cmp(&b.id));
        missing.sort();

        Ok(Dependencies {
            node_id: id.to_string(),
            count: dependencies.len(),
            dependencies,
            missing_dependencies: missing,
        })
    }

    pub fn list_dependencies_full(&self, id: &str) -> Result<DependencyContext> {
        let node = self.store.require(id)?;
        let direct: Vec<String> = node
            .links
            .unique_targets(EdgeType::DependsOn)
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut depth_by_id: HashMap<String, usize> = HashMap::new();
        let mut missing = BTreeSet::new();
        let mut edges: Vec<DependsOnEdge> = direct
            .iter()
            .map(|target| DependsOnEdge {
                source: id.to_string(),
                target: target.clone(),
            })
            .collect();
        let mut queue: VecDeque<(String, usize)> = direct.iter().map(|d| (d.clone(), 1)).collect();

        while let Some((current, depth)) = queue.pop_front() {
            if let Some(existing) = depth_by_id.get_mut(&current) {
                *existing = (*existing).min(depth);
                continue;
            }
            depth_by_id.insert(current.clone(), depth);

            let Some(dep) = self.store.get(&current) else {
                missing.insert(current);
                continue;
            };
            for next in dep.links.unique_targets(EdgeType::DependsOn) {
                edges.push(DependsOnEdge {
                    source: dep.id.clone(),
                    target: next.to_string(),
                });
                if !depth_by_id.contains_key(next) {
                    queue.push_back((next.to_string(), depth + 1));
                }
            }
        }

        let mut dependency_nodes: Vec<DependencyNode> = depth_by_id
            .into_iter()
            .map(|(dep_id, depth)| {
                let dep = self.store.get(&dep_id);
                DependencyNode {
                    node_type: dep.map(|d| d.node_type),
                    title: dep.and_then(|d| d.title()).map(str::to_string),
                    id: dep_id,
                    depth,
                }
            })
            .collect();
        dependency_nodes.sort_by(|a, b| a.depth.cmp(&b.depth).then_with(|| a.id.cmp(&b.id)));

        let of_type = |wanted: NodeType| -> Vec<DependencyNode> {
            dependency_nodes
                .iter()
                .filter(|d| d.node_type == Some(wanted))
                .cloned()
                .collect()
        };
        let decisions = of_type(NodeType::Decision);
        let policies = of_type(NodeType::Policy);

        let mut guidance: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut warnings: Vec<String> = Vec::new();
        let context = std::iter::once(id).chain(
            dependency_nodes
                .iter()
                .map(|d| d.id.as_str())
                .filter(|dep_id| self.store.contains(dep_id)),
        );
        for target in context {
            let effective = self.resolver.effective_constraints(target)?;
            for warning in effective.warnings {
                if !warnings.contains(&warning) {
                    warnings.push(warning);
                }
            }
            let applying = effective
                .constraining_nodes
                .iter()
                .map(|c| &c.id)
                .chain(effective.propagated_decisions.iter().map(|d| &d.id));
            for guide_id in applying {
                guidance
                    .entry(guide_id.clone())
                    .or_default()
                    .insert(target.to_string());
            }
        }

        let effective_constraint_nodes: Vec<EffectiveGuidance> = guidance
            .into_iter()
            .filter_map(|(guide_id, applies_to)| {
                let node = self.store.get(&guide_id)?;
                Some(EffectiveGuidance {
                    id: guide_id,
                    node_type: node.node_type,
                    title: node.title().map(str::to_string),
                    severity: node.severity_str().map(str::to_string),
                    statement: node.statement().map(str::to_string),
                    applies_to: applies_to.into_iter().collect(),
                })
            })
            .collect();
        let guidance_of = |wanted: NodeType| -> Vec<EffectiveGuidance> {
            effective_constraint_nodes
                .iter()
                .filter(|g| g.node_type == wanted)
                .cloned()
                .collect()
        };
        let effective_decisions = guidance_of(NodeType::Decision);
        let effective_policies = guidance_of(NodeType::Policy);

        Ok(DependencyContext {
            node_id: id.to_string(),
            count: DependencyCounts {
                direct_dependencies: direct.len(),
                transitive_dependencies: dependency_nodes.len(),
                effective_constraints: effective_constraint_nodes.len(),
            },
            direct_dependencies: direct,
            dependency_nodes,
            decisions,
            policies,
            effective_constraint_nodes,
            effective_decisions,
            effective_policies,
            missing_dependencies: missing.into_iter().collect(),
            warnings,
            depends_on_edges: edges,
        })
    }

    /// Everything upstream of a node, tagged with why it matters.
    pub fn get_affecting_nodes(&self, id: &str) -> Result<AffectingNodes> {
        let node = self.store.require(id)?;
        let dependencies = self.list_dependencies_full(id)?;
        let effective = self.resolver.effective_constraints(id)?;

        let targets = |edge: EdgeType| -> Vec<String> {
            node.links
                .unique_targets(edge)
                .into_iter()
                .map(str::to_string)
                .collect()
        };
        let groups = AffectingGroups {
            depends_on_transitive: dependencies.dependency_nodes.iter().map(|d| d.id.clone()).collect(),
            constraining_nodes: effective.constraining_nodes.iter().map(|c| c.id.clone()).collect(),
            contains_ancestors: effective.contains_ancestors.clone(),
            layer_dependencies: effective.layer_dependencies.iter().map(|l| l.id.clone()).collect(),
            layer_propagated: effective.propagated_decisions.iter().map(|d| d.id.clone()).collect(),
            implements_targets: targets(EdgeType::Implements),
            verified_by_targets: targets(EdgeType::VerifiedBy),
            derived_from_targets: targets(EdgeType::DerivedFrom),
            superseded_by: self.inbound_sources(EdgeType::Supersedes, id),
        };

        let store = self.store;
        let mut reasons: BTreeMap<&str, BTreeSet<AffectReason>> = BTreeMap::new();
        let tagged = groups
            .depends_on_transitive
            .iter()
            .map(|i| (i, AffectReason::DependsOn))
            .chain(effective.constraining_nodes.iter().map(|c| {
                let reason = if c.direct {
                    AffectReason::ConstrainsDirect
                } else {
                    AffectReason::ConstrainsInherited
                };
                (&c.id, reason)
            }))
            .chain(groups.contains_ancestors.iter().map(|i| (i, AffectReason::ContainsAncestor)))
            .chain(groups.layer_dependencies.iter().map(|i| (i, AffectReason::LayerDependency)))
            .chain(groups.layer_propagated.iter().map(|i| (i, AffectReason::LayerPropagated)))
            .chain(groups.implements_targets.iter().map(|i| (i, AffectReason::ImplementsTarget)))
            .chain(groups.verified_by_targets.iter().map(|i| (i, AffectReason::VerifiedByTarget)))
            .chain(groups.derived_from_targets.iter().map(|i| (i, AffectReason::DerivedFromTarget)))
            .chain(groups.superseded_by.iter().map(|i| (i, AffectReason::SupersededBy)));
        for (affecting, reason) in tagged {
            // only nodes that exist in the graph are reported
            if let Some(found) = store.get(affecting) {
                reasons.entry(found.id.as_str()).or_default().insert(reason);
            }
        }

        let affecting_nodes: Vec<AffectingNode> = reasons
            .into_iter()
            .filter_map(|(affecting, reasons)| {
                let found = store.get(affecting)?;
                Some(AffectingNode {
                    id: found.id.clone(),
                    node_type: found.node_type,
                    title: found.title().map(str::to_string),
                    reasons: reasons.into_iter().collect(),
                })
            })
            .collect();

        Ok(AffectingNodes {
            node_id: id.to_string(),
            count: affecting_nodes.len(),
            affecting_nodes,
            groups,
        })
    }

    /// Sorted, unique ids of nodes with an `edge` pointing at `target`.
    pub fn inbound_sources(&self, edge: EdgeType, target: &str) -> Vec<String> {
        let sources: BTreeSet<&str> = self
            .store
            .nodes()
            .filter(|n| n.links.contains_edge(edge, target))
            .map(|n| n.id.as_str())
            .collect();
        sources.into_iter().map(str::to_string).collect()
    }
}

fn string_value(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().unwrap_or_default())
            .collect::<Vec<_>>()
            .join(" "),
        _ => String::new(),
    }
}

fn metadata_text(metadata: Option<&Value>) -> String {
    let Some(record) = metadata.and_then(Value::as_object) else {
        return String::new();
    };
    let rejected = record
        .get("rejected_alternatives")
        .and_then(Value::as_array)
        .map(|alternatives| {
            alternatives
                .iter()
                .filter(|alt| alt.is_object())
                .map(|alt| format!("{} {}", string_value(alt.get("title")), string_value(alt.get("reason"))))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default();

    [
        string_value(record.get("rationale")),
        string_value(record.get("notes")),
        string_value(record.get("owner")),
        string_value(record.get("tags")),
        rejected,
    ]
    .join(" ")
}

fn search_text(node: &SpecNode) -> String {
    let mut parts = vec![node.id.clone()];
    for field in ["title", "description", "expectation", "statement", "verification"] {
        parts.push(string_value(node.attrs.get(field)));
    }
    parts.push(metadata_text(node.attrs.get("metadata")));
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{behavior, decision, feature, layer, node, policy, with_links};
    use serde_json::json;

    fn store() -> NodeStore {
        let docs = [
            with_links(feature("ROOT"), "contains", &["AUTH", "PLATFORM"]),
            with_links(feature("AUTH"), "contains", &["AUTH-01", "AUTH-02"]),
            with_links(
                with_links(behavior("AUTH-01"), "depends_on", &["AUTH-02", "GHOST"]),
                "verified_by",
                &["AUTH-02"],
            ),
            with_links(behavior("AUTH-02"), "depends_on", &["PLATFORM"]),
            with_links(layer("PLATFORM"), "contains", &["DB"]),
            with_links(decision("DB", "stack"), "constrains", &["AUTH"]),
            with_links(policy("P-HARD", "hard", "Use TLS"), "constrains", &["AUTH-02"]),
            with_links(decision("DB-NEXT", "stack"), "supersedes", &["DB"]),
        ];
        NodeStore::from_nodes(docs.iter().map(node).collect())
    }

    #[test]
    fn list_nodes_is_sorted_with_summaries() {
        let store = store();
        let list = Queries::new(&store).list_nodes();
        assert_eq!(list.count, 8);
        assert_eq!(list.nodes[0].id, "AUTH");
        assert_eq!(list.nodes.last().unwrap().id, "ROOT");
        assert_eq!(list.nodes[0].title.as_deref(), Some("AUTH feature"));
        assert_eq!(list.nodes[0].status, None);
    }

    #[test]
    fn edges_follow_node_then_edge_order() {
        let store = store();
        let edges = Queries::new(&store).list_edges();
        let auth01: Vec<(&str, EdgeType)> = edges
            .edges
            .iter()
            .filter(|e| e.source == "AUTH-01")
            .map(|e| (e.target.as_str(), e.edge_type))
            .collect();
        assert_eq!(
            auth01,
            vec![
                ("AUTH-02", EdgeType::DependsOn),
                ("GHOST", EdgeType::DependsOn),
                ("AUTH-02", EdgeType::VerifiedBy),
            ]
        );
        assert_eq!(edges.count, 12);
    }

    #[test]
    fn search_matches_text_fields_and_metadata() {
        let mut doc = decision("D9", "stack");
        doc["metadata"]["rejected_alternatives"] = json!([{ "title": "MongoDB", "reason": "No joins" }]);
        doc["metadata"]["tags"] = json!(["storage", 7]);
        let store = NodeStore::from_nodes(vec![node(&doc), node(&feature("AUTH"))]);
        let queries = Queries::new(&store);

        assert_eq!(queries.search_nodes("mongodb").count, 1);
        assert_eq!(queries.search_nodes("  STORAGE ").count, 1);
        assert_eq!(queries.search_nodes("everything about").nodes[0].id, "AUTH");
        assert_eq!(queries.search_nodes("   ").count, 0);
        assert_eq!(queries.search_nodes("reviewed in design").count, 1);
    }

    #[test]
    fn subgraphs_walk_contains_breadth_first() {
        let store = store();
        let queries = Queries::new(&store);
        let subgraph = queries.get_feature_subgraph("ROOT").unwrap();
        let ids: Vec<&str> = subgraph.children.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["AUTH", "PLATFORM", "AUTH-01", "AUTH-02", "DB"]);

        let layer = queries.get_group_subgraph("PLATFORM").unwrap();
        assert_eq!(layer.children.len(), 1);
        assert!(matches!(
            queries.get_feature_subgraph("PLATFORM"),
            Err(SpecgraphError::NotAGroup { .. })
        ));
        assert!(matches!(
            queries.get_group_subgraph("DB"),
            Err(SpecgraphError::NotAGroup { .. })
        ));
        assert!(queries.get_group_subgraph("NOPE").unwrap_err().is_not_found());
    }

    #[test]
    fn direct_dependencies_report_missing_targets() {
        let store = store();
        let deps = Queries::new(&store).list_dependencies("AUTH-01").unwrap();
        assert_eq!(deps.count, 1);
        assert_eq!(deps.dependencies[0].id, "AUTH-02");
        assert_eq!(deps.missing_dependencies, vec!["GHOST"]);
    }

    #[test]
    fn full_dependencies_split_context_from_guidance() {
        let store = store();
        let full = Queries::new(&store).list_dependencies_full("AUTH-01").unwrap();

        let depths: Vec<(&str, usize)> = full
            .dependency_nodes
            .iter()
            .map(|d| (d.id.as_str(), d.depth))
            .collect();
        assert_eq!(depths, vec![("AUTH-02", 1), ("GHOST", 1), ("PLATFORM", 2)]);
        assert_eq!(full.missing_dependencies, vec!["GHOST"]);
        assert!(full.decisions.is_empty());
        assert_eq!(full.depends_on_edges.len(), 3);

        let ids: Vec<&str> = full.effective_constraint_nodes.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["DB", "P-HARD"]);
        let db = &full.effective_constraint_nodes[0];
        assert_eq!(db.applies_to, vec!["AUTH-01", "AUTH-02"]);
        assert_eq!(full.effective_policies[0].applies_to, vec!["AUTH-02"]);
        assert_eq!(full.count.transitive_dependencies, 3);
        assert_eq!(full.count.effective_constraints, 2);
    }

    #[test]
    fn affecting_nodes_carry_reason_tags() {
        let store = store();
        let affecting = Queries::new(&store).get_affecting_nodes("AUTH-02").unwrap();
        let by_id: HashMap<&str, &Vec<AffectReason>> = affecting
            .affecting_nodes
            .iter()
            .map(|n| (n.id.as_str(), &n.reasons))
            .collect();

        assert_eq!(by_id["PLATFORM"], &vec![AffectReason::DependsOn, AffectReason::LayerDependency]);
        assert_eq!(by_id["P-HARD"], &vec![AffectReason::ConstrainsDirect]);
        assert_eq!(by_id["AUTH"], &vec![AffectReason::ContainsAncestor]);
        assert!(by_id["DB"].contains(&AffectReason::ConstrainsInherited));
        assert!(by_id["DB"].contains(&AffectReason::LayerPropagated));
        assert_eq!(affecting.groups.layer_dependencies, vec!["PLATFORM"]);
        assert_eq!(affecting.count, affecting.affecting_nodes.len());
    }

    #[test]
    fn superseding_and_link_targets_are_reported() {
        let store = store();
        let queries = Queries::new(&store);
        let db = queries.get_affecting_nodes("DB").unwrap();
        assert_eq!(db.groups.superseded_by, vec!["DB-NEXT"]);

        let auth01 = queries.get_affecting_nodes("AUTH-01").unwrap();
        assert_eq!(auth01.groups.verified_by_targets, vec!["AUTH-02"]);
        assert!(auth01.affecting_nodes.iter().all(|n| n.id != "GHOST"));
        assert_eq!(auth01.groups.depends_on_transitive, vec!["AUTH-02", "GHOST", "PLATFORM"]);
    }
}
