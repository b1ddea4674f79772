use std::collections::{HashMap, HashSet, VecDeque};

use crate::model::EdgeType;
use crate::store::NodeStore;

/// Adjacency derived from a `NodeStore` snapshot. Rebuilt per query.
#[derive(Debug, Default, Clone)]
pub struct GraphIndexes {
    /// parent -> children, deduplicated, in link order
    pub contains_by_parent: HashMap<String, Vec<String>>,
    /// child -> parents, in node order
    pub parents_by_child: HashMap<String, Vec<String>>,
    /// constrained target -> constraining sources, in node order
    pub constrained_by: HashMap<String, Vec<String>>,
}

impl GraphIndexes {
    pub fn build(store: &NodeStore) -> Self {
        let mut indexes = GraphIndexes::default();
        for node in store.nodes() {
            let children = node.links.unique_targets(EdgeType::Contains);
            if !children.is_empty() {
                indexes.contains_by_parent.insert(
                    node.id.clone(),
                    children.iter().map(|c| c.to_string()).collect(),
                );
            }
            for child in children {
                indexes
                    .parents_by_child
                    .entry(child.to_string())
                    .or_default()
                    .push(node.id.clone());
            }
            for target in node.links.unique_targets(EdgeType::Constrains) {
                indexes
                    .constrained_by
                    .entry(target.to_string())
                    .or_default()
                    .push(node.id.clone());
            }
        }
        indexes
    }

    pub fn children(&self, id: &str) -> &[String] {
        self.contains_by_parent
            .get(id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn parents(&self, id: &str) -> &[String] {
        self.parents_by_child
            .get(id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn constrainers(&self, id: &str) -> &[String] {
        self.constrained_by
            .get(id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// `id` plus every node reachable by walking `contains` edges backwards.
    pub fn contains_ancestors(&self, id: &str) -> HashSet<String> {
        bfs_closure(id, |current| self.parents(current))
    }

    /// `id` plus every node it transitively contains.
    pub fn contains_closure(&self, id: &str) -> HashSet<String> {
        bfs_closure(id, |current| self.children(current))
    }
}

/// Breadth-first closure including `start`. The visited set guards against
/// cycles in relations that are not validated as acyclic.
pub fn bfs_closure<'a, F>(start: &str, mut next: F) -> HashSet<String>
where
    F: FnMut(&str) -> &'a [String],
{
    let mut visited = HashSet::from([start.to_string()]);
    let mut queue = VecDeque::from([start.to_string()]);
    while let Some(current) = queue.pop_front() {
        for neighbor in next(&current) {
            if visited.insert(neighbor.clone()) {
                queue.push_back(neighbor.clone());
            }
        }
    }
    visited
}

/// Transitive `supersedes` targets of `id`, excluding `id` itself.
pub fn supersedes_closure(store: &NodeStore, id: &str) -> HashSet<String> {
    let mut closure = bfs_closure(id, |current| match store.get(current) {
        Some(node) => node.links.targets(EdgeType::Supersedes),
        None => &[],
    });
    closure.remove(id);
    closure
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeType, SpecNode};

    fn tree() -> NodeStore {
        NodeStore::from_nodes(vec![
            SpecNode::new("ROOT", NodeType::Feature).with_links(EdgeType::Contains, &["AUTH", "BILLING"]),
            SpecNode::new("AUTH", NodeType::Feature).with_links(EdgeType::Contains, &["AUTH-01", "AUTH-01"]),
            SpecNode::new("BILLING", NodeType::Feature).with_links(EdgeType::Contains, &["AUTH-01"]),
            SpecNode::new("AUTH-01", NodeType::Behavior),
        ])
    }

    #[test]
    fn indexes_deduplicate_children() {
        let indexes = GraphIndexes::build(&tree());
        assert_eq!(indexes.children("AUTH"), ["AUTH-01"]);
        assert_eq!(indexes.parents("AUTH-01"), ["AUTH", "BILLING"]);
    }

    #[test]
    fn ancestors_and_closure_are_symmetric() {
        let store = tree();
        let indexes = GraphIndexes::build(&store);
        for parent in store.nodes() {
            let closure = indexes.contains_closure(&parent.id);
            for child in store.nodes() {
                let ancestors = indexes.contains_ancestors(&child.id);
                assert_eq!(
                    ancestors.contains(&parent.id),
                    closure.contains(&child.id),
                    "{} / {}",
                    parent.id,
                    child.id
                );
            }
        }
        let ancestors = indexes.contains_ancestors("AUTH-01");
        assert_eq!(ancestors.len(), 4);
        assert_eq!(indexes.contains_ancestors("AUTH-01"), ancestors);
    }

    #[test]
    fn closures_survive_contains_cycles() {
        let store = NodeStore::from_nodes(vec![
            SpecNode::new("A", NodeType::Feature).with_links(EdgeType::Contains, &["B"]),
            SpecNode::new("B", NodeType::Feature).with_links(EdgeType::Contains, &["A"]),
        ]);
        let indexes = GraphIndexes::build(&store);
        assert_eq!(indexes.contains_closure("A").len(), 2);
        assert_eq!(indexes.contains_ancestors("A").len(), 2);
    }

    #[test]
    fn supersedes_closure_is_transitive_and_cycle_safe() {
        let store = NodeStore::from_nodes(vec![
            SpecNode::new("A", NodeType::Decision).with_links(EdgeType::Supersedes, &["B"]),
            SpecNode::new("B", NodeType::Decision).with_links(EdgeType::Supersedes, &["C"]),
            SpecNode::new("C", NodeType::Decision).with_links(EdgeType::Supersedes, &["A"]),
        ]);
        let closure = supersedes_closure(&store, "A");
        assert!(closure.contains("B"));
        assert!(closure.contains("C"));
        assert!(!closure.contains("A"));
    }
}
