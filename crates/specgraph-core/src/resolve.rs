use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::Serialize;

use crate::error::Result;
use crate::graph::{supersedes_closure, GraphIndexes};
use crate::model::{EdgeType, NodeType, SpecNode};
use crate::store::NodeStore;

// --- Output types ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionOrigin {
    LayerContains,
    LayerConstrains,
    LayerContainsAndConstrains,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstrainingNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub title: Option<String>,
    pub severity: Option<String>,
    pub statement: Option<String>,
    /// The target itself (not only an ancestor) is constrained.
    pub direct: bool,
    pub via_targets: Vec<String>,
    pub via_layers: Vec<String>,
    pub precedence_distance: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropagatedDecision {
    pub id: String,
    pub title: Option<String>,
    pub category: Option<String>,
    pub via_layers: Vec<String>,
    pub precedence_distance: usize,
    pub origin: DecisionOrigin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerDependency {
    pub id: String,
    pub distance: usize,
    /// Starts at the resolved node, ends at the layer.
    pub path: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ambiguity {
    pub node_id: String,
    pub category: String,
    pub decision_ids: Vec<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveConstraints {
    pub node_id: String,
    pub contains_ancestors: Vec<String>,
    pub constraining_nodes: Vec<ConstrainingNode>,
    pub propagated_decisions: Vec<PropagatedDecision>,
    pub layer_dependencies: Vec<LayerDependency>,
    pub ambiguities: Vec<Ambiguity>,
    pub warnings: Vec<String>,
    pub count: usize,
}

// --- Working state ---

#[derive(Debug, Default, Clone)]
struct DirectMatch {
    direct: bool,
    via_targets: BTreeSet<String>,
}

#[derive(Debug, Clone)]
struct Candidate {
    in_closure: bool,
    via_constrains: bool,
    via_targets: BTreeSet<String>,
    via_layers: BTreeSet<String>,
    precedence: usize,
}

impl Candidate {
    fn new(precedence: usize) -> Self {
        Self {
            in_closure: false,
            via_constrains: false,
            via_targets: BTreeSet::new(),
            via_layers: BTreeSet::new(),
            precedence,
        }
    }

    fn origin(&self) -> DecisionOrigin {
        match (self.in_closure, self.via_constrains) {
            (true, true) => DecisionOrigin::LayerContainsAndConstrains,
            (false, true) => DecisionOrigin::LayerConstrains,
            _ => DecisionOrigin::LayerContains,
        }
    }
}

struct Accumulated {
    direct: bool,
    via_targets: BTreeSet<String>,
    via_layers: BTreeSet<String>,
    precedence: usize,
}

/// Effective-guidance resolution over one store snapshot. Indexes are built
/// once per resolver and reused across targets.
pub struct Resolver<'a> {
    store: &'a NodeStore,
    indexes: GraphIndexes,
}

impl<'a> Resolver<'a> {
    pub fn new(store: &'a NodeStore) -> Self {
        Self {
            store,
            indexes: GraphIndexes::build(store),
        }
    }

    pub fn indexes(&self) -> &GraphIndexes {
        &self.indexes
    }

    pub fn effective_constraints(&self, node_id: &str) -> Result<EffectiveConstraints> {
        self.store.require(node_id)?;

        let mut contains_ancestors: Vec<String> = self
            .indexes
            .contains_ancestors(node_id)
            .into_iter()
            .filter(|id| id != node_id)
            .collect();
        contains_ancestors.sort();

        let layers = self.layer_dependencies(node_id);
        let layer_distance: HashMap<&str, usize> =
            layers.iter().map(|l| (l.id.as_str(), l.distance)).collect();
        let candidates = self.propagated_candidates(&layers);

        let mut merged: BTreeMap<String, Accumulated> = self
            .direct_matches(node_id)
            .into_iter()
            .map(|(id, m)| {
                (
                    id,
                    Accumulated {
                        direct: m.direct,
                        via_targets: m.via_targets,
                        via_layers: BTreeSet::new(),
                        precedence: 0,
                    },
                )
            })
            .collect();

        for (id, candidate) in candidates.iter().filter(|(_, c)| c.via_constrains) {
            match merged.get_mut(id) {
                Some(existing) => {
                    existing.via_targets.extend(candidate.via_targets.iter().cloned());
                    existing.via_layers.extend(candidate.via_layers.iter().cloned());
                    existing.precedence = existing.precedence.min(candidate.precedence);
                }
                None => {
                    merged.insert(
                        id.clone(),
                        Accumulated {
                            direct: false,
                            via_targets: candidate.via_targets.clone(),
                            via_layers: candidate.via_layers.clone(),
                            precedence: candidate.precedence,
                        },
                    );
                }
            }
        }

        let mut constraining_nodes: Vec<ConstrainingNode> = merged
            .into_iter()
            .filter_map(|(id, acc)| {
                let node = self.store.get(&id)?;
                Some(ConstrainingNode {
                    id,
                    node_type: node.node_type,
                    title: node.title().map(str::to_string),
                    severity: node.severity_str().map(str::to_string),
                    statement: node.statement().map(str::to_string),
                    direct: acc.direct,
                    via_targets: acc.via_targets.into_iter().collect(),
                    via_layers: sort_by_distance(acc.via_layers, &layer_distance),
                    precedence_distance: acc.precedence,
                })
            })
            .collect();
        constraining_nodes.sort_by(|a, b| {
            (a.precedence_distance, &a.id).cmp(&(b.precedence_distance, &b.id))
        });

        let mut propagated_decisions: Vec<PropagatedDecision> = candidates
            .iter()
            .filter_map(|(id, candidate)| {
                let node = self.store.get(id)?;
                if node.node_type != NodeType::Decision {
                    return None;
                }
                Some(PropagatedDecision {
                    id: id.clone(),
                    title: node.title().map(str::to_string),
                    category: node.str_attr("category").map(str::to_string),
                    via_layers: sort_by_distance(candidate.via_layers.clone(), &layer_distance),
                    precedence_distance: candidate.precedence,
                    origin: candidate.origin(),
                })
            })
            .collect();
        propagated_decisions.sort_by(|a, b| {
            (a.precedence_distance, &a.id).cmp(&(b.precedence_distance, &b.id))
        });

        let ambiguities = self.ambiguities_for(node_id, &candidates);
        let warnings = severity_overlap_warnings(&constraining_nodes);
        let count = constraining_nodes.len();

        tracing::debug!(
            "Resolved {}: {} constraining, {} propagated, {} layers",
            node_id,
            count,
            propagated_decisions.len(),
            layers.len()
        );

        Ok(EffectiveConstraints {
            node_id: node_id.to_string(),
            contains_ancestors,
            constraining_nodes,
            propagated_decisions,
            layer_dependencies: layers,
            ambiguities,
            warnings,
            count,
        })
    }

    /// Sources whose `constrains` list hits the target or one of its
    /// `contains` ancestors.
    fn direct_matches(&self, target: &str) -> BTreeMap<String, DirectMatch> {
        let mut matches: BTreeMap<String, DirectMatch> = BTreeMap::new();
        for ancestor in self.indexes.contains_ancestors(target) {
            for source in self.indexes.constrainers(&ancestor) {
                let entry = matches.entry(source.clone()).or_default();
                if ancestor == target {
                    entry.direct = true;
                }
                entry.via_targets.insert(ancestor.clone());
            }
        }
        matches
    }

    /// Shortest distance from `target` to every reachable layer.
    ///
    /// Walks `depends_on` edges and `contains` parents of grouping type, one
    /// BFS level at a time. Each level is visited in id order, so the recorded
    /// path does not depend on how edge lists happen to be ordered on disk.
    pub fn layer_dependencies(&self, target: &str) -> Vec<LayerDependency> {
        let mut predecessor: HashMap<String, String> = HashMap::new();
        let mut seen: HashSet<String> = HashSet::from([target.to_string()]);
        let mut frontier = vec![target.to_string()];
        let mut layers = Vec::new();
        let mut distance = 0;

        while !frontier.is_empty() {
            let mut next = Vec::new();
            for current in &frontier {
                let Some(node) = self.store.get(current) else {
                    continue;
                };
                if distance > 0 && node.node_type == NodeType::Layer {
                    layers.push(LayerDependency {
                        id: current.clone(),
                        distance,
                        path: trace_path(target, current, &predecessor),
                    });
                }
                for neighbor in self.layer_neighbors(node) {
                    if seen.insert(neighbor.to_string()) {
                        predecessor.insert(neighbor.to_string(), current.clone());
                        next.push(neighbor.to_string());
                    }
                }
            }
            next.sort();
            frontier = next;
            distance += 1;
        }

        layers.sort_by(|a, b| (a.distance, &a.id).cmp(&(b.distance, &b.id)));
        layers
    }

    fn layer_neighbors(&self, node: &'a SpecNode) -> BTreeSet<&'a str> {
        let mut neighbors: BTreeSet<&str> =
            node.links.unique_targets(EdgeType::DependsOn).into_iter().collect();
        for parent in self.indexes.parents(&node.id) {
            if let Some(parent_node) = self.store.get(parent) {
                if parent_node.node_type.is_grouping() {
                    neighbors.insert(parent_node.id.as_str());
                }
            }
        }
        neighbors
    }

    /// Candidates propagated through `layers`, with superseded ids pruned.
    fn propagated_candidates(&self, layers: &[LayerDependency]) -> BTreeMap<String, Candidate> {
        let mut candidates: BTreeMap<String, Candidate> = BTreeMap::new();
        let mut matches_by_node: HashMap<String, BTreeMap<String, DirectMatch>> = HashMap::new();

        for layer in layers {
            for member in self.indexes.contains_closure(&layer.id) {
                if self
                    .store
                    .get(&member)
                    .is_some_and(|n| n.node_type == NodeType::Decision)
                {
                    let candidate = candidates
                        .entry(member.clone())
                        .or_insert_with(|| Candidate::new(layer.distance));
                    candidate.in_closure = true;
                    candidate.via_layers.insert(layer.id.clone());
                    candidate.precedence = candidate.precedence.min(layer.distance);
                }

                let matches = matches_by_node
                    .entry(member.clone())
                    .or_insert_with(|| self.direct_matches(&member));
                for (source, m) in matches.iter() {
                    let candidate = candidates
                        .entry(source.clone())
                        .or_insert_with(|| Candidate::new(layer.distance));
                    candidate.via_constrains = true;
                    candidate.via_targets.extend(m.via_targets.iter().cloned());
                    candidate.via_layers.insert(layer.id.clone());
                    candidate.precedence = candidate.precedence.min(layer.distance);
                }
            }
        }

        let mut superseded = HashSet::new();
        for id in candidates.keys() {
            for target in supersedes_closure(self.store, id) {
                if candidates.contains_key(&target) {
                    superseded.insert(target);
                }
            }
        }
        candidates.retain(|id, _| !superseded.contains(id));
        candidates
    }

    fn ambiguities_for(
        &self,
        node_id: &str,
        candidates: &BTreeMap<String, Candidate>,
    ) -> Vec<Ambiguity> {
        let mut by_category: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for id in candidates.keys() {
            let Some(node) = self.store.get(id) else {
                continue;
            };
            if node.node_type != NodeType::Decision {
                continue;
            }
            if let Some(category) = node.str_attr("category") {
                by_category.entry(category).or_default().insert(id.as_str());
            }
        }

        by_category
            .into_iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|(category, ids)| {
                let decision_ids: Vec<String> = ids.into_iter().map(str::to_string).collect();
                Ambiguity {
                    message: format!(
                        "Ambiguous propagated decisions for '{}' in category '{}': {} (disambiguate with supersedes and/or dependency structure)",
                        node_id,
                        category,
                        decision_ids.join(", ")
                    ),
                    node_id: node_id.to_string(),
                    category: category.to_string(),
                    decision_ids,
                }
            })
            .collect()
    }

    /// Ambiguities for every node in the graph, in stored node order.
    pub fn find_ambiguities(&self) -> Vec<Ambiguity> {
        let mut found = Vec::new();
        for node in self.store.nodes() {
            let layers = self.layer_dependencies(&node.id);
            if layers.is_empty() {
                continue;
            }
            let candidates = self.propagated_candidates(&layers);
            found.extend(self.ambiguities_for(&node.id, &candidates));
        }
        found
    }
}

pub fn effective_constraints(store: &NodeStore, node_id: &str) -> Result<EffectiveConstraints> {
    Resolver::new(store).effective_constraints(node_id)
}

pub fn find_ambiguities(store: &NodeStore) -> Vec<Ambiguity> {
    Resolver::new(store).find_ambiguities()
}

fn trace_path(target: &str, layer: &str, predecessor: &HashMap<String, String>) -> Vec<String> {
    let mut path = vec![layer.to_string()];
    let mut current = layer;
    while current != target {
        match predecessor.get(current) {
            Some(previous) => {
                path.push(previous.clone());
                current = previous.as_str();
            }
            None => break,
        }
    }
    path.reverse();
    path
}

fn sort_by_distance(layers: BTreeSet<String>, distance: &HashMap<&str, usize>) -> Vec<String> {
    let mut sorted: Vec<String> = layers.into_iter().collect();
    sorted.sort_by_key(|id| (distance.get(id.as_str()).copied().unwrap_or(usize::MAX), id.clone()));
    sorted
}

/// Hard and soft policies sharing the same normalised statement.
pub fn severity_overlap_warnings(constraints: &[ConstrainingNode]) -> Vec<String> {
    let mut order: Vec<String> = Vec::new();
    let mut buckets: HashMap<String, (Vec<&str>, Vec<&str>)> = HashMap::new();

    for node in constraints.iter().filter(|n| n.node_type == NodeType::Policy) {
        let (Some(statement), Some(severity)) = (&node.statement, &node.severity) else {
            continue;
        };
        let key = statement.trim().to_lowercase();
        if key.is_empty() {
            continue;
        }
        if !buckets.contains_key(&key) {
            order.push(key.clone());
        }
        let bucket = buckets.entry(key).or_default();
        match severity.as_str() {
            "hard" => bucket.0.push(&node.id),
            "soft" => bucket.1.push(&node.id),
            _ => {}
        }
    }

    order
        .into_iter()
        .filter_map(|statement| {
            let (hard, soft) = buckets.get(&statement)?;
            if hard.is_empty() || soft.is_empty() {
                return None;
            }
            Some(format!(
                "Severity overlap detected for statement \"{}\": hard policies ({}) override soft policies ({}).",
                statement,
                hard.join(", "),
                soft.join(", ")
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(id: &str, children: &[&str]) -> SpecNode {
        SpecNode::new(id, NodeType::Feature)
            .with_attr("title", id)
            .with_links(EdgeType::Contains, children)
    }

    fn layer(id: &str, children: &[&str]) -> SpecNode {
        SpecNode::new(id, NodeType::Layer)
            .with_attr("title", id)
            .with_links(EdgeType::Contains, children)
    }

    fn decision(id: &str, category: &str) -> SpecNode {
        SpecNode::new(id, NodeType::Decision)
            .with_attr("title", id)
            .with_attr("category", category)
    }

    fn policy(id: &str, severity: &str, statement: &str) -> SpecNode {
        SpecNode::new(id, NodeType::Policy)
            .with_attr("severity", severity)
            .with_attr("statement", statement)
    }

    fn behavior(id: &str) -> SpecNode {
        SpecNode::new(id, NodeType::Behavior).with_attr("title", id)
    }

    fn auth_tree(extra: Vec<SpecNode>) -> NodeStore {
        let mut nodes = vec![
            feature("ROOT", &["AUTH"]),
            feature("AUTH", &["AUTH-01"]),
            behavior("AUTH-01").with_links(EdgeType::DependsOn, &["PLATFORM"]),
        ];
        nodes.extend(extra);
        NodeStore::from_nodes(nodes)
    }

    fn ids<T>(items: &[T], id: impl Fn(&T) -> &str) -> Vec<&str> {
        items.iter().map(id).collect()
    }

    #[test]
    fn ancestor_constraint_is_not_direct() {
        let store = NodeStore::from_nodes(vec![
            feature("ROOT", &["AUTH"]),
            feature("AUTH", &["AUTH-01"]),
            behavior("AUTH-01"),
            decision("D1", "stack").with_links(EdgeType::Constrains, &["AUTH"]),
        ]);
        let result = effective_constraints(&store, "AUTH-01").unwrap();

        assert_eq!(result.contains_ancestors, vec!["AUTH", "ROOT"]);
        assert_eq!(result.count, 1);
        let d1 = &result.constraining_nodes[0];
        assert_eq!(d1.id, "D1");
        assert!(!d1.direct);
        assert_eq!(d1.via_targets, vec!["AUTH"]);
        assert_eq!(d1.precedence_distance, 0);
    }

    #[test]
    fn direct_constraint_is_marked_direct() {
        let store = NodeStore::from_nodes(vec![
            feature("AUTH", &["AUTH-01"]),
            behavior("AUTH-01"),
            policy("P1", "hard", "Passwords are hashed").with_links(EdgeType::Constrains, &["AUTH-01", "AUTH"]),
        ]);
        let result = effective_constraints(&store, "AUTH-01").unwrap();
        assert!(result.constraining_nodes[0].direct);
        assert_eq!(result.constraining_nodes[0].via_targets, vec!["AUTH", "AUTH-01"]);
    }

    #[test]
    fn layer_decision_propagates_through_depends_on() {
        let store = auth_tree(vec![layer("PLATFORM", &["D2"]), decision("D2", "architecture")]);
        let result = effective_constraints(&store, "AUTH-01").unwrap();

        assert_eq!(result.layer_dependencies.len(), 1);
        assert_eq!(result.layer_dependencies[0].path, vec!["AUTH-01", "PLATFORM"]);

        let d2 = &result.propagated_decisions[0];
        assert_eq!(d2.id, "D2");
        assert_eq!(d2.via_layers, vec!["PLATFORM"]);
        assert_eq!(d2.precedence_distance, 1);
        assert_eq!(d2.origin, DecisionOrigin::LayerContains);
        assert!(result.ambiguities.is_empty());
    }

    #[test]
    fn superseding_decision_removes_ambiguity() {
        let store = auth_tree(vec![
            layer("PLATFORM", &["D2", "D3"]),
            decision("D2", "architecture"),
            decision("D3", "architecture").with_links(EdgeType::Supersedes, &["D2"]),
        ]);
        let result = effective_constraints(&store, "AUTH-01").unwrap();
        assert_eq!(ids(&result.propagated_decisions, |d| &d.id), vec!["D3"]);
        assert!(result.ambiguities.is_empty());
    }

    #[test]
    fn supersession_prunes_transitively() {
        let store = auth_tree(vec![
            layer("PLATFORM", &["A", "B", "C"]),
            decision("A", "pattern").with_links(EdgeType::Supersedes, &["B"]),
            decision("B", "pattern").with_links(EdgeType::Supersedes, &["C"]),
            decision("C", "pattern"),
        ]);
        let result = effective_constraints(&store, "AUTH-01").unwrap();
        assert_eq!(ids(&result.propagated_decisions, |d| &d.id), vec!["A"]);
    }

    #[test]
    fn mutually_superseding_decisions_are_both_pruned() {
        let store = auth_tree(vec![
            layer("PLATFORM", &["A", "B", "C"]),
            decision("A", "stack").with_links(EdgeType::Supersedes, &["B"]),
            decision("B", "stack").with_links(EdgeType::Supersedes, &["A"]),
            decision("C", "pattern"),
        ]);
        let result = effective_constraints(&store, "AUTH-01").unwrap();
        assert_eq!(ids(&result.propagated_decisions, |d| &d.id), vec!["C"]);
        assert!(result.ambiguities.is_empty());
    }

    #[test]
    fn same_category_decisions_are_ambiguous() {
        let store = auth_tree(vec![
            layer("PLATFORM", &["D2", "D1"]),
            decision("D2", "stack"),
            decision("D1", "stack"),
        ]);
        let result = effective_constraints(&store, "AUTH-01").unwrap();
        assert_eq!(result.ambiguities.len(), 1);
        let ambiguity = &result.ambiguities[0];
        assert_eq!(ambiguity.category, "stack");
        assert_eq!(ambiguity.decision_ids, vec!["D1", "D2"]);
        assert_eq!(
            ambiguity.message,
            "Ambiguous propagated decisions for 'AUTH-01' in category 'stack': D1, D2 (disambiguate with supersedes and/or dependency structure)"
        );
    }

    #[test]
    fn layer_constraint_merges_into_constraining_nodes() {
        let store = auth_tree(vec![
            layer("PLATFORM", &["DB"]),
            behavior("DB"),
            decision("D4", "stack").with_links(EdgeType::Constrains, &["DB"]),
            decision("D5", "pattern").with_links(EdgeType::Constrains, &["AUTH", "PLATFORM"]),
        ]);
        let result = effective_constraints(&store, "AUTH-01").unwrap();

        let d4 = result.constraining_nodes.iter().find(|c| c.id == "D4").unwrap();
        assert!(!d4.direct);
        assert_eq!(d4.via_layers, vec!["PLATFORM"]);
        assert_eq!(d4.precedence_distance, 1);

        // reached both through ancestry and through the layer
        let d5 = result.constraining_nodes.iter().find(|c| c.id == "D5").unwrap();
        assert_eq!(d5.precedence_distance, 0);
        assert_eq!(d5.via_targets, vec!["AUTH", "PLATFORM"]);
        assert_eq!(d5.via_layers, vec!["PLATFORM"]);
        assert_eq!(ids(&result.constraining_nodes, |c| &c.id), vec!["D5", "D4"]);

        let d4_decision = result.propagated_decisions.iter().find(|d| d.id == "D4").unwrap();
        assert_eq!(d4_decision.origin, DecisionOrigin::LayerConstrains);
    }

    #[test]
    fn layers_reached_through_grouping_parents() {
        let store = NodeStore::from_nodes(vec![
            feature("AUTH", &["AUTH-01"]).with_links(EdgeType::DependsOn, &["INFRA"]),
            behavior("AUTH-01"),
            layer("INFRA", &[]).with_links(EdgeType::DependsOn, &["CORE"]),
            layer("CORE", &[]),
        ]);
        let resolver = Resolver::new(&store);
        let layers = resolver.layer_dependencies("AUTH-01");
        assert_eq!(ids(&layers, |l| &l.id), vec!["INFRA", "CORE"]);
        assert_eq!(layers[0].distance, 2);
        assert_eq!(layers[1].path, vec!["AUTH-01", "AUTH", "INFRA", "CORE"]);
        assert!(resolver.layer_dependencies("CORE").is_empty());
    }

    #[test]
    fn equal_distance_layers_do_not_depend_on_edge_order() {
        let build = |deps: &[&str]| {
            NodeStore::from_nodes(vec![
                behavior("T").with_links(EdgeType::DependsOn, deps),
                behavior("X").with_links(EdgeType::DependsOn, &["L"]),
                behavior("W").with_links(EdgeType::DependsOn, &["L"]),
                layer("L", &["D"]),
                decision("D", "stack"),
            ])
        };
        let first = effective_constraints(&build(&["X", "W"]), "T").unwrap();
        let second = effective_constraints(&build(&["W", "X"]), "T").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.layer_dependencies[0].path, vec!["T", "W", "L"]);
    }

    #[test]
    fn hard_and_soft_policies_on_same_statement_warn() {
        let store = NodeStore::from_nodes(vec![
            behavior("T"),
            policy("P1", "hard", "Use TLS").with_links(EdgeType::Constrains, &["T"]),
            policy("P2", "soft", "  use tls ").with_links(EdgeType::Constrains, &["T"]),
            policy("P3", "soft", "Log requests").with_links(EdgeType::Constrains, &["T"]),
        ]);
        let result = effective_constraints(&store, "T").unwrap();
        assert_eq!(
            result.warnings,
            vec!["Severity overlap detected for statement \"use tls\": hard policies (P1) override soft policies (P2)."]
        );
    }

    #[test]
    fn unknown_node_is_not_found() {
        let store = NodeStore::from_nodes(vec![behavior("T")]);
        assert!(effective_constraints(&store, "NOPE").unwrap_err().is_not_found());
    }

    #[test]
    fn find_ambiguities_covers_every_node() {
        // members of the layer reach it through their grouping parent
        let store = auth_tree(vec![
            layer("PLATFORM", &["D1", "D2"]),
            decision("D1", "stack"),
            decision("D2", "stack"),
        ]);
        let found = find_ambiguities(&store);
        let nodes: Vec<&str> = found.iter().map(|a| a.node_id.as_str()).collect();
        assert_eq!(nodes, vec!["AUTH-01", "D1", "D2"]);
    }
}
