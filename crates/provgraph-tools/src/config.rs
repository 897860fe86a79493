//! Configuration for the provgraph tools service.

use serde::Deserialize;

use provgraph_core::config::section;
use provgraph_core::error::ConfigError;
use provgraph_filter::CompileOptions;
use provgraph_graph::GraphConfig;

/// Which storage backend serves requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Neo4j,
    Memory,
}

/// Tool behavior, from the `[tools]` section or `PROVGRAPH_TOOLS__*`.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub backend: Backend,

    /// Rows returned when a query names no limit.
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Ceiling on any query; also what a limit of 0 means.
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,

    /// Upper bound on the in-transaction work of one request.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_limit() -> usize {
    50
}

fn default_max_limit() -> usize {
    500
}

fn default_request_timeout() -> u64 {
    10
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ToolsConfig {
    /// Resolve a caller's limit: absent means the default, 0 means the
    /// maximum, and nothing exceeds the maximum.
    pub fn effective_limit(&self, requested: Option<usize>) -> usize {
        match requested {
            None => self.default_limit.min(self.max_limit),
            Some(0) => self.max_limit,
            Some(n) => n.min(self.max_limit),
        }
    }
}

/// Everything the binary reads at startup.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub neo4j: GraphConfig,
    pub tools: ToolsConfig,
    pub filter: CompileOptions,
}

impl AppConfig {
    /// Load `<file_prefix>.toml` and `PROVGRAPH_*` overrides.
    pub fn load(file_prefix: &str) -> Result<Self, ConfigError> {
        let cfg = provgraph_core::config::load(file_prefix)?;
        Self::from_config(&cfg)
    }

    pub fn from_config(cfg: &::config::Config) -> Result<Self, ConfigError> {
        Ok(Self {
            neo4j: section(cfg, "neo4j")?,
            tools: section(cfg, "tools")?,
            filter: section(cfg, "filter")?,
        })
    }
}
