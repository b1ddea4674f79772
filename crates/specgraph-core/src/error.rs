use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single schema violation: JSON pointer into the document plus message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaIssueDetail {
    pub path: String,
    pub message: String,
}

impl SchemaIssueDetail {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum SpecgraphError {
    #[error("Node not found: {id}")]
    NodeNotFound { id: String },

    /// Subgraph queries only accept grouping roots.
    #[error("Node '{id}' is not a {expected}")]
    NotAGroup { id: String, expected: String },

    #[error("{context}: {}", format_issues(.issues))]
    SchemaInvalid {
        context: String,
        issues: Vec<SchemaIssueDetail>,
    },

    /// Id collision, path collision, or an already initialised graph.
    #[error("{0}")]
    Conflict(String),

    #[error("Invalid edge: {0}")]
    InvalidEdge(String),

    #[error("Invalid graph index: {0}")]
    InvalidIndex(String),

    #[error("Path escapes graph directory: {0}")]
    PathEscape(String),

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to load schema {location}: {message}")]
    SchemaFetch { location: String, message: String },
}

impl SpecgraphError {
    pub fn node_not_found(id: impl Into<String>) -> Self {
        Self::NodeNotFound { id: id.into() }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn invalid_edge(message: impl Into<String>) -> Self {
        Self::InvalidEdge(message.into())
    }

    pub fn invalid_index(message: impl Into<String>) -> Self {
        Self::InvalidIndex(message.into())
    }

    pub fn schema_invalid(context: impl Into<String>, issues: Vec<SchemaIssueDetail>) -> Self {
        Self::SchemaInvalid {
            context: context.into(),
            issues,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }

    pub fn schema_fetch(location: impl Into<String>, message: impl ToString) -> Self {
        Self::SchemaFetch {
            location: location.into(),
            message: message.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NodeNotFound { .. })
    }
}

fn format_issues(issues: &[SchemaIssueDetail]) -> String {
    issues
        .iter()
        .map(|issue| format!("{} {}", issue.path, issue.message))
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, SpecgraphError>;
