use std::path::PathBuf;
use std::sync::Arc;

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use specgraph_core::{InitOptions, RootFeature, Specgraph, SpecgraphConfig};
use tracing_subscriber::EnvFilter;

// --- Request types ---

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct DirectoryRequest {
    /// Graph directory relative to repo root (default: specgraph)
    directory: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct NodeIdRequest {
    /// Graph directory relative to repo root (default: specgraph)
    directory: Option<String>,
    /// ID of the node. Uppercase letters, digits, hyphens. Example: AUTH-01
    node_id: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct GroupRequest {
    /// Graph directory relative to repo root (default: specgraph)
    directory: Option<String>,
    /// ID of the grouping node (feature or layer). Example: AUTH or PLATFORM
    group_id: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct FeatureRequest {
    /// Graph directory relative to repo root (default: specgraph)
    directory: Option<String>,
    /// ID of the feature node. Example: AUTH
    feature_id: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct SearchRequest {
    /// Graph directory relative to repo root (default: specgraph)
    directory: Option<String>,
    /// Search term matched case-insensitively against id, title, description, expectation, statement, verification and metadata
    query: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct NodeRequest {
    /// Graph directory relative to repo root (default: specgraph)
    directory: Option<String>,
    /// Full node object. Feature/layer need {id, type, title, description}; behavior needs {id, type, title, expectation, verification}; contract types need {id, type, title, statement, verification}; decision also needs {category, metadata.rationale}; policy also needs {severity}. A JSON string holding the object is accepted too.
    node: serde_json::Value,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct EdgeRequest {
    /// Graph directory relative to repo root (default: specgraph)
    directory: Option<String>,
    /// ID of the source node (where the edge originates)
    source: String,
    /// ID of the target node
    target: String,
    /// One of: contains, depends_on, constrains, implements, derived_from, verified_by, supersedes
    edge_type: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct InitRequest {
    /// Graph directory relative to repo root (default: specgraph)
    directory: Option<String>,
    /// specgraphVersion written to graph.json (default from SPECGRAPH_MCP_DEFAULT_SPECGRAPH_VERSION, else 1.0.0)
    specgraph_version: Option<String>,
    /// Root feature {id, title, description}. Default: ROOT / "Root Feature"
    root_feature: Option<RootFeature>,
}

// --- Server ---

#[derive(Clone)]
pub struct SpecgraphServer {
    specgraph: Arc<Specgraph>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl SpecgraphServer {
    pub fn new(specgraph: Specgraph) -> Self {
        Self {
            specgraph: Arc::new(specgraph),
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Validate graph.json and all node files against schemas and structural constraints (ids, links, cycles, layer inversions, decision ambiguity, pins).")]
    fn validate_specgraph(
        &self,
        Parameters(req): Parameters<DirectoryRequest>,
    ) -> Result<CallToolResult, McpError> {
        respond(self.specgraph.validate(req.directory.as_deref()))
    }

    #[tool(description = "List all nodes in the spec graph with id, type, title, and status.")]
    fn list_nodes(
        &self,
        Parameters(req): Parameters<DirectoryRequest>,
    ) -> Result<CallToolResult, McpError> {
        respond(self.specgraph.list_nodes(req.directory.as_deref()))
    }

    #[tool(description = "Get the full JSON content of a single node by its ID.")]
    fn get_node(&self, Parameters(req): Parameters<NodeIdRequest>) -> Result<CallToolResult, McpError> {
        respond(self.specgraph.get_node(req.directory.as_deref(), &req.node_id))
    }

    #[tool(description = "Get a grouping node (feature or layer) and all nodes it contains (via \"contains\" edges).")]
    fn get_group_subgraph(
        &self,
        Parameters(req): Parameters<GroupRequest>,
    ) -> Result<CallToolResult, McpError> {
        respond(self.specgraph.get_group_subgraph(req.directory.as_deref(), &req.group_id))
    }

    #[tool(description = "Get a feature node and all nodes it contains (via \"contains\" edges).")]
    fn get_feature_subgraph(
        &self,
        Parameters(req): Parameters<FeatureRequest>,
    ) -> Result<CallToolResult, McpError> {
        respond(self.specgraph.get_feature_subgraph(req.directory.as_deref(), &req.feature_id))
    }

    #[tool(description = "List all edges in the spec graph as {source, target, edge_type} triples.")]
    fn list_edges(
        &self,
        Parameters(req): Parameters<DirectoryRequest>,
    ) -> Result<CallToolResult, McpError> {
        respond(self.specgraph.list_edges(req.directory.as_deref()))
    }

    #[tool(description = "Search nodes by case-insensitive substring match on id, title, description/expectation/statement, verification and metadata.")]
    fn search_nodes(
        &self,
        Parameters(req): Parameters<SearchRequest>,
    ) -> Result<CallToolResult, McpError> {
        respond(self.specgraph.search_nodes(req.directory.as_deref(), &req.query))
    }

    #[tool(description = "Compute the guidance that applies to a node: constraining nodes inherited through contains ancestry, decisions propagated from layers the node depends on, layer dependencies, ambiguities and severity warnings.")]
    fn get_effective_constraints(
        &self,
        Parameters(req): Parameters<NodeIdRequest>,
    ) -> Result<CallToolResult, McpError> {
        respond(self.specgraph.get_effective_constraints(req.directory.as_deref(), &req.node_id))
    }

    #[tool(description = "List direct depends_on dependencies for a node.")]
    fn list_dependencies(
        &self,
        Parameters(req): Parameters<NodeIdRequest>,
    ) -> Result<CallToolResult, McpError> {
        respond(self.specgraph.list_dependencies(req.directory.as_deref(), &req.node_id))
    }

    #[tool(description = "List full transitive depends_on context for a node, including dependency decisions/policies (informational) and the effective constraints applying to the node and its dependencies (normative).")]
    fn list_dependencies_full(
        &self,
        Parameters(req): Parameters<NodeIdRequest>,
    ) -> Result<CallToolResult, McpError> {
        respond(self.specgraph.list_dependencies_full(req.directory.as_deref(), &req.node_id))
    }

    #[tool(description = "Return all upstream nodes that influence a target node, with reason labels (depends_on, constrains, contains ancestry, layers, implements, verification, derivation, supersession).")]
    fn get_affecting_nodes(
        &self,
        Parameters(req): Parameters<NodeIdRequest>,
    ) -> Result<CallToolResult, McpError> {
        respond(self.specgraph.get_affecting_nodes(req.directory.as_deref(), &req.node_id))
    }

    #[tool(description = "Add a new node to the spec graph. Validates against the node schema before writing. The node must not already exist.")]
    fn add_node(&self, Parameters(req): Parameters<NodeRequest>) -> Result<CallToolResult, McpError> {
        let node = match node_document(req.node) {
            Ok(node) => node,
            Err(e) => return Ok(CallToolResult::error(vec![Content::text(e)])),
        };
        respond(self.specgraph.add_node(req.directory.as_deref(), node))
    }

    #[tool(description = "Replace an existing node in the spec graph. This is a FULL REPLACEMENT, not a partial patch. The node must already exist.")]
    fn update_node(
        &self,
        Parameters(req): Parameters<NodeRequest>,
    ) -> Result<CallToolResult, McpError> {
        let node = match node_document(req.node) {
            Ok(node) => node,
            Err(e) => return Ok(CallToolResult::error(vec![Content::text(e)])),
        };
        respond(self.specgraph.update_node(req.directory.as_deref(), node))
    }

    #[tool(description = "Remove a node from the spec graph. Also removes all edges pointing to this node from other nodes and deletes unreferenced node files.")]
    fn remove_node(
        &self,
        Parameters(req): Parameters<NodeIdRequest>,
    ) -> Result<CallToolResult, McpError> {
        respond(self.specgraph.remove_node(req.directory.as_deref(), &req.node_id))
    }

    #[tool(description = "Add a typed edge between two existing nodes. The edge is stored as a link on the source node. Adding an existing edge changes nothing.")]
    fn add_edge(&self, Parameters(req): Parameters<EdgeRequest>) -> Result<CallToolResult, McpError> {
        respond(self.specgraph.add_edge(
            req.directory.as_deref(),
            &req.source,
            &req.target,
            &req.edge_type,
        ))
    }

    #[tool(description = "Remove a typed edge between two nodes. Removing an absent edge changes nothing.")]
    fn remove_edge(
        &self,
        Parameters(req): Parameters<EdgeRequest>,
    ) -> Result<CallToolResult, McpError> {
        respond(self.specgraph.remove_edge(
            req.directory.as_deref(),
            &req.source,
            &req.target,
            &req.edge_type,
        ))
    }

    #[tool(description = "Initialize a new Spec Graph directory with graph.json and a root feature node (defaults to ROOT).")]
    fn init_specgraph(
        &self,
        Parameters(req): Parameters<InitRequest>,
    ) -> Result<CallToolResult, McpError> {
        let options = InitOptions {
            specgraph_version: req.specgraph_version,
            root_feature: req.root_feature,
        };
        respond(self.specgraph.init_specgraph(req.directory.as_deref(), options))
    }

    #[tool(description = "Get the Spec Graph authoring rules and workflow. Call this before creating or editing nodes.")]
    fn get_rules(&self) -> Result<CallToolResult, McpError> {
        Ok(CallToolResult::success(vec![Content::text(
            specgraph_core::rules::RULES,
        )]))
    }
}

#[tool_handler]
impl ServerHandler for SpecgraphServer {
    fn get_info(&self) -> ServerInfo {
        let instructions = format!(
            "{}\n\n## Authoring Rules\n{}",
            INSTRUCTIONS,
            specgraph_core::rules::RULES
        );
        ServerInfo {
            instructions: Some(instructions.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// --- Helpers ---

/// Pretty JSON on success; the error message alone on failure.
fn respond<T: Serialize>(result: specgraph_core::Result<T>) -> Result<CallToolResult, McpError> {
    match result {
        Ok(value) => {
            let json = serde_json::to_string_pretty(&value)
                .unwrap_or_else(|e| format!("Serialization error: {}", e));
            Ok(CallToolResult::success(vec![Content::text(json)]))
        }
        Err(e) => {
            tracing::debug!("Tool call failed: {}", e);
            Ok(CallToolResult::error(vec![Content::text(e.to_string())]))
        }
    }
}

/// Some clients send the node as a JSON string instead of an object.
fn node_document(node: serde_json::Value) -> Result<serde_json::Value, String> {
    match node {
        serde_json::Value::String(raw) => serde_json::from_str(&raw)
            .map_err(|e| format!("node is not valid JSON: {}", e)),
        other => Ok(other),
    }
}

#[derive(Debug, PartialEq)]
enum Command {
    Serve { repo_dir: PathBuf },
    Help,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Command, String> {
    let mut repo_dir = PathBuf::from(".");
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(Command::Help),
            "--repo-dir" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--repo-dir requires a path".to_string())?;
                repo_dir = PathBuf::from(value);
            }
            other => {
                if let Some(value) = other.strip_prefix("--repo-dir=") {
                    repo_dir = PathBuf::from(value);
                } else {
                    return Err(format!("Unknown argument: {}", other));
                }
            }
        }
    }
    Ok(Command::Serve { repo_dir })
}

const USAGE: &str = "\
Usage: specgraph-mcp [--repo-dir <path>]

Serves Spec Graph tools over MCP on stdio.

Options:
  --repo-dir <path>  Repository root containing the graph directory (default: .)
  -h, --help         Print this help

Environment:
  SPECGRAPH_MCP_DIRECTORY                  Default graph directory (specgraph)
  SPECGRAPH_MCP_CACHE_TTL_MS               Graph cache TTL in milliseconds (1500)
  SPECGRAPH_MCP_DEFAULT_SPECGRAPH_VERSION  Version written by init_specgraph (1.0.0)
  SPECGRAPH_MCP_STRICT_PINS                Treat missing pins as errors (false)
  SPECGRAPH_MCP_SCHEMA_DIR                 Directory holding graph/node schemas
  SPECGRAPH_MCP_SCHEMA_BASE_URL            Base URL for graph/node schemas
  SPECGRAPH_MCP_GRAPH_SCHEMA               Path or URL of the graph schema
  SPECGRAPH_MCP_NODE_SCHEMA                Path or URL of the node schema
  SPECGRAPH_MCP_SCHEMA_TIMEOUT_SECS        Remote schema fetch timeout (10)
  RUST_LOG                                 Log filter; logs go to stderr";

const INSTRUCTIONS: &str = r#"specgraph is a specification graph. Each node (feature, layer, behavior, decision, policy, contract types) is a JSON file under the graph directory, indexed by graph.json. Nodes link to each other with typed edges stored on the source node.

## Edge Types
- **contains**: grouping (feature or layer) to member.
- **depends_on**: the source needs the target. Depending on a layer inherits the layer's decisions.
- **constrains**: guidance (decision, policy, contract) applies to the target and everything it contains.
- **implements**, **verified_by**, **derived_from**: traceability. derived_from targets must be pinned by sha256 in `pins`.
- **supersedes**: the source replaces the target; superseded decisions stop propagating.

Call `get_rules` before creating or editing nodes. Before implementing a node, read `get_effective_constraints` and `list_dependencies_full`: constraining nodes and propagated decisions are normative. Run `validate_specgraph` after every batch of writes."#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries the protocol
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("specgraph_mcp=info,specgraph_core=info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let repo_dir = match parse_args(std::env::args().skip(1)) {
        Ok(Command::Serve { repo_dir }) => repo_dir,
        Ok(Command::Help) => {
            println!("{}", USAGE);
            return Ok(());
        }
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    let config = SpecgraphConfig::from_env(repo_dir);
    tracing::info!(
        "Serving spec graph at {}/{}",
        config.repo_dir.display(),
        config.directory
    );
    let specgraph = Specgraph::new(config).await?;

    let service = SpecgraphServer::new(specgraph)
        .serve(rmcp::transport::io::stdio())
        .await
        .inspect_err(|e| tracing::error!("MCP server error: {}", e))?;
    service.waiting().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_repo_dir_forms() {
        assert_eq!(
            parse_args(args(&[])).unwrap(),
            Command::Serve { repo_dir: PathBuf::from(".") }
        );
        assert_eq!(
            parse_args(args(&["--repo-dir", "/tmp/repo"])).unwrap(),
            Command::Serve { repo_dir: PathBuf::from("/tmp/repo") }
        );
        assert_eq!(
            parse_args(args(&["--repo-dir=/srv/x"])).unwrap(),
            Command::Serve { repo_dir: PathBuf::from("/srv/x") }
        );
        assert_eq!(parse_args(args(&["--help"])).unwrap(), Command::Help);
        assert!(parse_args(args(&["--repo-dir"])).is_err());
        assert!(parse_args(args(&["serve"])).is_err());
    }

    #[test]
    fn node_strings_are_parsed() {
        let parsed = node_document(serde_json::json!("{\"id\":\"A\"}")).unwrap();
        assert_eq!(parsed["id"], "A");
        assert!(node_document(serde_json::json!("{nope")).is_err());
        let object = serde_json::json!({ "id": "B" });
        assert_eq!(node_document(object.clone()).unwrap(), object);
    }

    #[test]
    fn errors_become_error_results() {
        let result = respond::<()>(Err(specgraph_core::SpecgraphError::node_not_found("X"))).unwrap();
        assert_eq!(result.is_error, Some(true));
    }
}
