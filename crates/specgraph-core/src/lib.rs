pub mod cache;
pub mod config;
pub mod cycle;
pub mod error;
pub mod graph;
pub mod model;
pub mod mutate;
pub mod query;
pub mod resolve;
pub mod rules;
pub mod schema;
pub mod service;
pub mod storage;
pub mod store;
pub mod validate;

#[cfg(test)]
mod fixtures;

pub use config::{SchemaConfig, SpecgraphConfig};
pub use error::{Result, SchemaIssueDetail, SpecgraphError};
pub use model::{EdgeType, GraphIndex, Links, NodeRef, NodeType, Pin, SpecNode};
pub use mutate::{InitOptions, Operation, OperationResult, RootFeature};
pub use resolve::{EffectiveConstraints, Resolver};
pub use schema::SchemaSet;
pub use service::Specgraph;
pub use storage::{FsStorage, MemoryStorage, Storage};
pub use store::NodeStore;
pub use validate::{ValidationOptions, ValidationReport};

/// Graph directory inside a repository when none is configured.
pub const DEFAULT_DIRECTORY: &str = "specgraph";

pub const SCHEMA_BASE_URL: &str = "https://oco-adam.github.io/specgraph/schemas/";
pub const NODE_SCHEMA_URL: &str = "https://oco-adam.github.io/specgraph/schemas/node.schema.json";
pub const GRAPH_SCHEMA_URL: &str = "https://oco-adam.github.io/specgraph/schemas/graph.schema.json";
