use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use jsonschema::JSONSchema;
use serde_json::Value;

use crate::config::SchemaConfig;
use crate::error::{Result, SchemaIssueDetail, SpecgraphError};

const BUNDLED_GRAPH_SCHEMA: &str = include_str!("../schemas/graph.schema.json");
const BUNDLED_NODE_SCHEMA: &str = include_str!("../schemas/node.schema.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    Graph,
    Node,
}

impl SchemaKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            SchemaKind::Graph => "graph.schema.json",
            SchemaKind::Node => "node.schema.json",
        }
    }

    fn bundled(&self) -> &'static str {
        match self {
            SchemaKind::Graph => BUNDLED_GRAPH_SCHEMA,
            SchemaKind::Node => BUNDLED_NODE_SCHEMA,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaLocation {
    Bundled,
    Path(PathBuf),
    Url(String),
}

impl fmt::Display for SchemaLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaLocation::Bundled => f.write_str("<bundled>"),
            SchemaLocation::Path(path) => write!(f, "{}", path.display()),
            SchemaLocation::Url(url) => f.write_str(url),
        }
    }
}

impl SchemaLocation {
    fn parse(raw: &str) -> Self {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            SchemaLocation::Url(raw.to_string())
        } else {
            SchemaLocation::Path(PathBuf::from(raw))
        }
    }

    /// Resolution order: per-file override, directory, base URL, then the copy
    /// embedded in this crate.
    pub fn resolve(kind: SchemaKind, config: &SchemaConfig) -> Self {
        let override_location = match kind {
            SchemaKind::Graph => config.graph_schema.as_deref(),
            SchemaKind::Node => config.node_schema.as_deref(),
        };
        if let Some(raw) = override_location {
            return Self::parse(raw);
        }
        if let Some(dir) = &config.dir {
            return SchemaLocation::Path(dir.join(kind.file_name()));
        }
        if let Some(base) = &config.base_url {
            return SchemaLocation::Url(join_url(base, kind.file_name()));
        }
        SchemaLocation::Bundled
    }
}

fn join_url(base: &str, file_name: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), file_name)
}

/// The compiled graph-index and node schemas.
pub struct SchemaSet {
    graph: JSONSchema,
    node: JSONSchema,
}

impl fmt::Debug for SchemaSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaSet").finish_non_exhaustive()
    }
}

impl SchemaSet {
    /// The schemas compiled into this crate.
    pub fn bundled() -> Result<Self> {
        let graph = parse_schema(SchemaKind::Graph.bundled(), &SchemaLocation::Bundled)?;
        let node = parse_schema(SchemaKind::Node.bundled(), &SchemaLocation::Bundled)?;
        Self::from_values(&graph, &node)
    }

    pub fn from_values(graph: &Value, node: &Value) -> Result<Self> {
        Ok(Self {
            graph: compile(graph, SchemaKind::Graph)?,
            node: compile(node, SchemaKind::Node)?,
        })
    }

    /// Load both schemas as configured. Remote locations are fetched once;
    /// callers keep the result for the life of the process.
    pub async fn load(config: &SchemaConfig) -> Result<Self> {
        if config.is_bundled() {
            return Self::bundled();
        }
        let timeout = config.fetch_timeout();
        let graph = load_document(
            &SchemaLocation::resolve(SchemaKind::Graph, config),
            SchemaKind::Graph,
            timeout,
        )
        .await?;
        let node = load_document(
            &SchemaLocation::resolve(SchemaKind::Node, config),
            SchemaKind::Node,
            timeout,
        )
        .await?;
        Self::from_values(&graph, &node)
    }

    pub fn validate_graph(&self, document: &Value) -> Vec<SchemaIssueDetail> {
        collect_issues(&self.graph, document)
    }

    pub fn validate_node(&self, document: &Value) -> Vec<SchemaIssueDetail> {
        collect_issues(&self.node, document)
    }
}

fn compile(schema: &Value, kind: SchemaKind) -> Result<JSONSchema> {
    JSONSchema::compile(schema)
        .map_err(|error| SpecgraphError::schema_fetch(kind.file_name(), format!("failed to compile: {}", error)))
}

fn collect_issues(schema: &JSONSchema, document: &Value) -> Vec<SchemaIssueDetail> {
    match schema.validate(document) {
        Ok(()) => Vec::new(),
        Err(errors) => {
            let issues: Vec<SchemaIssueDetail> = errors
                .map(|error| {
                    let path = error.instance_path.to_string();
                    let path = if path.is_empty() { "/".to_string() } else { path };
                    SchemaIssueDetail::new(path, error.to_string())
                })
                .collect();
            if issues.is_empty() {
                vec![SchemaIssueDetail::new("/", "validation failed")]
            } else {
                issues
            }
        }
    }
}

fn parse_schema(raw: &str, location: &SchemaLocation) -> Result<Value> {
    serde_json::from_str(raw).map_err(|e| SpecgraphError::schema_fetch(location.to_string(), e))
}

async fn load_document(location: &SchemaLocation, kind: SchemaKind, timeout: Duration) -> Result<Value> {
    tracing::debug!("Loading {} from {}", kind.file_name(), location);
    match location {
        SchemaLocation::Bundled => parse_schema(kind.bundled(), location),
        SchemaLocation::Path(path) => {
            let raw = std::fs::read_to_string(path).map_err(|e| SpecgraphError::io(path, e))?;
            parse_schema(&raw, location)
        }
        SchemaLocation::Url(url) => fetch_schema(url, timeout).await,
    }
}

async fn fetch_schema(url: &str, timeout: Duration) -> Result<Value> {
    let client = reqwest::Client::new();
    let response = tokio::time::timeout(timeout, client.get(url).send())
        .await
        .map_err(|_| SpecgraphError::schema_fetch(url, format!("timed out after {:?}", timeout)))?
        .map_err(|e| SpecgraphError::schema_fetch(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(SpecgraphError::schema_fetch(url, format!("HTTP {}", status)));
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| SpecgraphError::schema_fetch(url, e))
}
