use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::DEFAULT_DIRECTORY;

pub const ENV_DIRECTORY: &str = "SPECGRAPH_MCP_DIRECTORY";
pub const ENV_CACHE_TTL_MS: &str = "SPECGRAPH_MCP_CACHE_TTL_MS";
pub const ENV_DEFAULT_VERSION: &str = "SPECGRAPH_MCP_DEFAULT_SPECGRAPH_VERSION";
pub const ENV_STRICT_PINS: &str = "SPECGRAPH_MCP_STRICT_PINS";
pub const ENV_SCHEMA_DIR: &str = "SPECGRAPH_MCP_SCHEMA_DIR";
pub const ENV_SCHEMA_BASE_URL: &str = "SPECGRAPH_MCP_SCHEMA_BASE_URL";
pub const ENV_GRAPH_SCHEMA: &str = "SPECGRAPH_MCP_GRAPH_SCHEMA";
pub const ENV_NODE_SCHEMA: &str = "SPECGRAPH_MCP_NODE_SCHEMA";
pub const ENV_SCHEMA_TIMEOUT_SECS: &str = "SPECGRAPH_MCP_SCHEMA_TIMEOUT_SECS";

/// Runtime settings for one repository.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpecgraphConfig {
    /// Repository root; graph directories are resolved against it
    pub repo_dir: PathBuf,

    /// Graph directory used when a call does not name one (default: specgraph)
    #[serde(default = "default_directory")]
    pub directory: String,

    /// How long a loaded graph is reused (default: 1500ms)
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,

    /// Version written by init when none is given (default: 1.0.0)
    #[serde(default = "default_specgraph_version")]
    pub default_specgraph_version: String,

    /// Missing pins are errors instead of warnings
    #[serde(default)]
    pub strict_pins: bool,

    #[serde(default)]
    pub schema: SchemaConfig,
}

/// Where the graph and node schemas come from.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchemaConfig {
    pub dir: Option<PathBuf>,
    pub base_url: Option<String>,
    /// Path or URL, overrides everything else for the graph schema
    pub graph_schema: Option<String>,
    /// Path or URL, overrides everything else for the node schema
    pub node_schema: Option<String>,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            dir: None,
            base_url: None,
            graph_schema: None,
            node_schema: None,
            fetch_timeout_secs: default_fetch_timeout(),
        }
    }
}

impl SchemaConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// True when every schema comes from the embedded copies.
    pub fn is_bundled(&self) -> bool {
        self.dir.is_none()
            && self.base_url.is_none()
            && self.graph_schema.is_none()
            && self.node_schema.is_none()
    }
}

impl SpecgraphConfig {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            directory: default_directory(),
            cache_ttl_ms: default_cache_ttl_ms(),
            default_specgraph_version: default_specgraph_version(),
            strict_pins: false,
            schema: SchemaConfig::default(),
        }
    }

    pub fn from_env(repo_dir: impl Into<PathBuf>) -> Self {
        Self::from_lookup(repo_dir, |key| std::env::var(key).ok())
    }

    /// Like `from_env`, reading variables through `lookup`.
    pub fn from_lookup<F>(repo_dir: impl Into<PathBuf>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut config = Self::new(repo_dir);
        if let Some(directory) = get(ENV_DIRECTORY) {
            config.directory = directory;
        }
        if let Some(ttl) = get(ENV_CACHE_TTL_MS) {
            match ttl.parse::<u64>() {
                Ok(ms) => config.cache_ttl_ms = ms,
                Err(_) => tracing::warn!("Ignoring invalid {}={}", ENV_CACHE_TTL_MS, ttl),
            }
        }
        if let Some(version) = get(ENV_DEFAULT_VERSION) {
            config.default_specgraph_version = version;
        }
        if let Some(strict) = get(ENV_STRICT_PINS) {
            config.strict_pins = matches!(strict.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        config.schema.dir = get(ENV_SCHEMA_DIR).map(PathBuf::from);
        config.schema.base_url = get(ENV_SCHEMA_BASE_URL);
        config.schema.graph_schema = get(ENV_GRAPH_SCHEMA);
        config.schema.node_schema = get(ENV_NODE_SCHEMA);
        if let Some(timeout) = get(ENV_SCHEMA_TIMEOUT_SECS) {
            match timeout.parse::<u64>() {
                Ok(secs) if secs > 0 => config.schema.fetch_timeout_secs = secs,
                _ => tracing::warn!("Ignoring invalid {}={}", ENV_SCHEMA_TIMEOUT_SECS, timeout),
            }
        }
        config
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }
}

fn default_directory() -> String {
    DEFAULT_DIRECTORY.to_string()
}
fn default_cache_ttl_ms() -> u64 {
    1500
}
fn default_specgraph_version() -> String {
    "1.0.0".to_string()
}
fn default_fetch_timeout() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = SpecgraphConfig::from_lookup("/repo", lookup(&[]));
        assert_eq!(config.directory, "specgraph");
        assert_eq!(config.cache_ttl(), Duration::from_millis(1500));
        assert_eq!(config.default_specgraph_version, "1.0.0");
        assert!(!config.strict_pins);
        assert!(config.schema.is_bundled());
        assert_eq!(config.schema.fetch_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn reads_overrides() {
        let config = SpecgraphConfig::from_lookup(
            "/repo",
            lookup(&[
                (ENV_DIRECTORY, "docs/graph"),
                (ENV_CACHE_TTL_MS, "0"),
                (ENV_STRICT_PINS, "true"),
                (ENV_SCHEMA_BASE_URL, "https://example.test/schemas/"),
            ]),
        );
        assert_eq!(config.directory, "docs/graph");
        assert_eq!(config.cache_ttl_ms, 0);
        assert!(config.strict_pins);
        assert!(!config.schema.is_bundled());
    }

    #[test]
    fn invalid_ttl_falls_back_to_default() {
        let config = SpecgraphConfig::from_lookup("/repo", lookup(&[(ENV_CACHE_TTL_MS, "-5")]));
        assert_eq!(config.cache_ttl_ms, 1500);
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: SpecgraphConfig =
            serde_json::from_value(serde_json::json!({ "repo_dir": "/repo" })).unwrap();
        assert_eq!(config.directory, "specgraph");
        assert_eq!(config.schema.fetch_timeout_secs, 10);
    }
}
