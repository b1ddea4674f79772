use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;

use crate::cache::GraphCache;
use crate::config::SpecgraphConfig;
use crate::error::Result;
use crate::model::SpecNode;
use crate::mutate::{InitOptions, Mutator, OperationResult};
use crate::query::{
    AffectingNodes, Dependencies, DependencyContext, EdgeList, FeatureSubgraph, GroupSubgraph,
    NodeList, Queries, SearchResult,
};
use crate::resolve::EffectiveConstraints;
use crate::schema::SchemaSet;
use crate::storage::FsStorage;
use crate::store::NodeStore;
use crate::validate::{validate_specgraph, ValidationOptions, ValidationReport};

/// Entry point for callers: every operation against one repository, with
/// loaded graphs cached per graph directory.
///
/// Every method takes an optional graph directory relative to the repository
/// root; `None` uses the configured default.
pub struct Specgraph {
    config: SpecgraphConfig,
    schemas: Arc<SchemaSet>,
    cache: GraphCache,
}

impl Specgraph {
    /// Loads the schemas as configured, then builds the service.
    pub async fn new(config: SpecgraphConfig) -> Result<Self> {
        let schemas = SchemaSet::load(&config.schema).await?;
        Ok(Self::with_schemas(config, Arc::new(schemas)))
    }

    pub fn with_schemas(config: SpecgraphConfig, schemas: Arc<SchemaSet>) -> Self {
        let cache = GraphCache::new(config.cache_ttl());
        Self {
            config,
            schemas,
            cache,
        }
    }

    pub fn config(&self) -> &SpecgraphConfig {
        &self.config
    }

    fn directory<'d>(&'d self, directory: Option<&'d str>) -> &'d str {
        directory
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(&self.config.directory)
    }

    fn graph_dir(&self, directory: &str) -> Result<PathBuf> {
        FsStorage::new(self.config.repo_dir.clone()).resolve(directory)
    }

    fn storage(&self, directory: &str) -> Result<FsStorage> {
        Ok(FsStorage::new(self.graph_dir(directory)?))
    }

    fn load(&self, directory: &str, force_reload: bool) -> Result<Arc<NodeStore>> {
        let storage = self.storage(directory)?;
        self.cache.get(&self.config.repo_dir, directory, force_reload, || {
            NodeStore::load(&storage)
        })
    }

    /// Run `query` against the cached graph.
    fn query<T>(&self, directory: Option<&str>, query: impl FnOnce(&Queries<'_>) -> Result<T>) -> Result<T> {
        let store = self.load(self.directory(directory), false)?;
        let queries = Queries::new(&store);
        query(&queries)
    }

    /// Run `mutation` against a freshly loaded graph and drop the cache entry
    /// whatever the outcome.
    fn mutate(
        &self,
        directory: Option<&str>,
        mutation: impl FnOnce(&Mutator<'_>, &NodeStore) -> Result<OperationResult>,
    ) -> Result<OperationResult> {
        let directory = self.directory(directory);
        let storage = self.storage(directory)?;
        let store = self.load(directory, true)?;
        let result = mutation(&Mutator::new(&storage, &self.schemas), &store);
        self.cache.invalidate(&self.config.repo_dir, directory);
        result.map(|r| r.with_prefix(directory))
    }

    // --- Reads ---

    pub fn validate(&self, directory: Option<&str>) -> Result<ValidationReport> {
        let storage = self.storage(self.directory(directory))?;
        let options = ValidationOptions {
            strict_pins: self.config.strict_pins,
        };
        validate_specgraph(&storage, &self.schemas, options)
    }

    pub fn list_nodes(&self, directory: Option<&str>) -> Result<NodeList> {
        self.query(directory, |q| Ok(q.list_nodes()))
    }

    pub fn get_node(&self, directory: Option<&str>, id: &str) -> Result<SpecNode> {
        self.query(directory, |q| q.get_node(id).cloned())
    }

    pub fn list_edges(&self, directory: Option<&str>) -> Result<EdgeList> {
        self.query(directory, |q| Ok(q.list_edges()))
    }

    pub fn search_nodes(&self, directory: Option<&str>, query: &str) -> Result<SearchResult> {
        self.query(directory, |q| Ok(q.search_nodes(query)))
    }

    pub fn get_group_subgraph(&self, directory: Option<&str>, id: &str) -> Result<GroupSubgraph> {
        self.query(directory, |q| q.get_group_subgraph(id))
    }

    pub fn get_feature_subgraph(&self, directory: Option<&str>, id: &str) -> Result<FeatureSubgraph> {
        self.query(directory, |q| q.get_feature_subgraph(id))
    }

    pub fn get_effective_constraints(
        &self,
        directory: Option<&str>,
        id: &str,
    ) -> Result<EffectiveConstraints> {
        self.query(directory, |q| q.get_effective_constraints(id))
    }

    pub fn list_dependencies(&self, directory: Option<&str>, id: &str) -> Result<Dependencies> {
        self.query(directory, |q| q.list_dependencies(id))
    }

    pub fn list_dependencies_full(
        &self,
        directory: Option<&str>,
        id: &str,
    ) -> Result<DependencyContext> {
        self.query(directory, |q| q.list_dependencies_full(id))
    }

    pub fn get_affecting_nodes(&self, directory: Option<&str>, id: &str) -> Result<AffectingNodes> {
        self.query(directory, |q| q.get_affecting_nodes(id))
    }

    // --- Mutations ---

    pub fn add_node(&self, directory: Option<&str>, node: Value) -> Result<OperationResult> {
        self.mutate(directory, |m, store| m.add_node(store, node))
    }

    pub fn update_node(&self, directory: Option<&str>, node: Value) -> Result<OperationResult> {
        self.mutate(directory, |m, store| m.update_node(store, node))
    }

    pub fn remove_node(&self, directory: Option<&str>, id: &str) -> Result<OperationResult> {
        self.mutate(directory, |m, store| m.remove_node(store, id))
    }

    pub fn add_edge(
        &self,
        directory: Option<&str>,
        source: &str,
        target: &str,
        edge_type: &str,
    ) -> Result<OperationResult> {
        self.mutate(directory, |m, store| m.add_edge(store, source, target, edge_type))
    }

    pub fn remove_edge(
        &self,
        directory: Option<&str>,
        source: &str,
        target: &str,
        edge_type: &str,
    ) -> Result<OperationResult> {
        self.mutate(directory, |m, store| m.remove_edge(store, source, target, edge_type))
    }

    /// No graph exists yet, so this bypasses the cache entirely.
    pub fn init_specgraph(&self, directory: Option<&str>, options: InitOptions) -> Result<OperationResult> {
        let directory = self.directory(directory);
        let storage = self.storage(directory)?;
        let result = Mutator::new(&storage, &self.schemas)
            .init(options, &self.config.default_specgraph_version);
        self.cache.invalidate(&self.config.repo_dir, directory);
        result.map(|r| r.with_prefix(directory))
    }
}
