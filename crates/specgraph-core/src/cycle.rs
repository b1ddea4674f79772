use std::collections::HashMap;

use crate::model::{EdgeType, NodeType};
use crate::store::NodeStore;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    OnStack,
    Done,
}

/// First `depends_on` cycle found, as a closed path (`first == last`).
///
/// Roots are tried in stored node order and neighbors in link order, so the
/// reported path is stable for a given graph. Targets missing from the graph
/// are skipped; dangling edges are reported elsewhere.
pub fn find_dependency_cycle(store: &NodeStore) -> Option<Vec<String>> {
    let mut marks: HashMap<&str, Mark> = HashMap::new();

    for root in store.nodes() {
        if marks.contains_key(root.id.as_str()) {
            continue;
        }
        // (node id, index of the next depends_on target to visit)
        let mut frames: Vec<(&str, usize)> = vec![(root.id.as_str(), 0)];
        marks.insert(root.id.as_str(), Mark::OnStack);

        while let Some(frame) = frames.last_mut() {
            let (current, next) = *frame;
            let targets = store
                .get(current)
                .map(|n| n.links.targets(EdgeType::DependsOn))
                .unwrap_or(&[]);

            let Some(target) = targets.get(next) else {
                marks.insert(current, Mark::Done);
                frames.pop();
                continue;
            };
            frame.1 += 1;

            let Some(target_node) = store.get(target) else {
                continue;
            };
            let target = target_node.id.as_str();
            match marks.get(target) {
                Some(Mark::OnStack) => {
                    let start = frames
                        .iter()
                        .position(|(id, _)| *id == target)
                        .unwrap_or(0);
                    let mut path: Vec<String> =
                        frames[start..].iter().map(|(id, _)| id.to_string()).collect();
                    path.push(target.to_string());
                    return Some(path);
                }
                Some(Mark::Done) => {}
                None => {
                    marks.insert(target, Mark::OnStack);
                    frames.push((target, 0));
                }
            }
        }
    }
    None
}

pub fn format_cycle(path: &[String]) -> String {
    format!("depends_on cycle detected: {}", path.join(" -> "))
}

/// `(layer, feature)` pairs where a layer depends on a feature.
pub fn find_layer_inversions(store: &NodeStore) -> Vec<(String, String)> {
    let mut inversions = Vec::new();
    for node in store.nodes().filter(|n| n.node_type == NodeType::Layer) {
        for target in node.links.unique_targets(EdgeType::DependsOn) {
            if store
                .get(target)
                .is_some_and(|t| t.node_type == NodeType::Feature)
            {
                inversions.push((node.id.clone(), target.to_string()));
            }
        }
    }
    inversions
}

pub fn format_inversion(layer: &str, feature: &str) -> String {
    format!(
        "Invalid dependency inversion: layer '{}' cannot depend_on feature '{}'",
        layer, feature
    )
}
