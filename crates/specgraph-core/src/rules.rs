/// Spec Graph authoring rules. Served by the `get_rules` tool and embedded in
/// the MCP server instructions.
pub const RULES: &str = "\
1. One node per requirement. A node states exactly one behavior, decision, policy or contract. \
If a title needs \"and\", split it into two nodes.\n\
2. Features and layers group, everything else specifies. Only `feature` and `layer` nodes carry \
`contains` edges and a `description`. Behaviors need an `expectation` and `verification`; contract \
types (decision, domain, policy, design_token, ui_contract, api_contract, data_model, artifact, \
equivalence_contract, pipeline) need a `statement` and `verification`.\n\
3. Ids are stable and uppercase. Grouping ids are short (`AUTH`, `PLATFORM`); leaf ids extend their \
group (`AUTH-01`, `AUTH-02`). Never reuse the id of a removed node for something different.\n\
4. Edges point from the dependent to the dependency. `A depends_on B` means A cannot be built or \
verified without B. `P constrains X` means guidance P applies to X and everything X contains.\n\
5. Constrain the highest node the guidance applies to. A decision that covers a whole feature \
constrains the feature, not each of its behaviors; containment carries it down.\n\
6. Layers carry shared guidance. Cross-cutting decisions (stack, persistence, logging) live inside a \
`layer`. Anything that depends on the layer, directly or through its feature, inherits those \
decisions. A layer never depends_on a feature.\n\
7. One decision per category per scope. When two propagated decisions in the same category reach a \
node, the graph is ambiguous. Resolve it with `supersedes` on the newer decision or by restructuring \
dependencies; never by leaving both in place.\n\
8. Supersede, don't delete. When a decision changes, add the new decision with `supersedes` pointing \
at the old one so history stays queryable.\n\
9. depends_on must stay acyclic. A cycle means the split between the nodes is wrong; merge them or \
extract the shared part into its own node.\n\
10. Hard and soft policies must not say the same thing. If a hard policy and a soft policy share a \
statement, the hard one wins; remove or reword the soft one.\n\
11. Pin what you derive from. Every `derived_from` target needs a `pins` entry with the source's \
sha256. When the source changes, re-read it and update the derived node and its pin together.\n\
12. Decisions record why. `metadata.rationale` explains the choice; list the options that lost in \
`metadata.rejected_alternatives`.\n\
\n\
## Workflow\n\
1. `validate_specgraph` first. Fix every error before adding anything.\n\
2. `list_nodes` and `get_feature_subgraph` to find where new work belongs. `search_nodes` before \
creating a node, in case it already exists.\n\
3. Before implementing a node, call `get_effective_constraints` and `list_dependencies_full`. The \
constraining nodes and propagated decisions are normative; dependency context is informational.\n\
4. `get_affecting_nodes` answers \"what could change this node's meaning\" when reviewing a change.\n\
5. Write with `add_node`, `update_node` (full replacement) and `add_edge`. Run `validate_specgraph` \
after every batch of writes.\n\
\n\
## Authority\n\
The graph is the specification. Decisions and policies constrain the nodes below them. If \
implementation shows a decision is wrong, do not edit it silently: flag the conflict and propose a \
superseding decision for human review. Adding behaviors and edges inside an existing feature does \
not need approval.";

#[cfg(test)]
mod tests {
    use super::RULES;

    #[test]
    fn rules_name_the_tools_they_reference() {
        for tool in ["validate_specgraph", "get_effective_constraints", "add_edge"] {
            assert!(RULES.contains(tool), "missing {}", tool);
        }
        assert!(!RULES.ends_with('\n'));
    }
}
