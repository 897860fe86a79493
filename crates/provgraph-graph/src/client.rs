//! Neo4j connection management and the shared graph client.

use neo4rs::{ConfigBuilder, Graph, Query};
use serde::Deserialize;

/// Errors from graph storage.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Cannot reach Neo4j: {0}")]
    Connection(String),

    #[error("Neo4j query error: {0}")]
    Query(#[from] neo4rs::Error),

    #[error("Node not found: {label} with {field}='{value}'")]
    NotFound {
        label: String,
        field: String,
        value: String,
    },

    #[error("{label} with {field}='{value}' already exists")]
    Conflict {
        label: String,
        field: String,
        value: String,
    },

    #[error("Stored value could not be decoded: {0}")]
    Serialization(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for GraphError {
    fn from(e: serde_json::Error) -> Self {
        GraphError::Serialization(e.to_string())
    }
}

/// Configuration for connecting to Neo4j (`[neo4j]` section).
#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_uri")]
    pub uri: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_fetch_size")]
    pub fetch_size: usize,
}

fn default_uri() -> String {
    "bolt://localhost:7687".to_string()
}

fn default_user() -> String {
    "neo4j".to_string()
}

fn default_password() -> String {
    "provgraph-dev".to_string()
}

fn default_max_connections() -> u32 {
    16
}

fn default_fetch_size() -> usize {
    256
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            user: default_user(),
            password: default_password(),
            max_connections: default_max_connections(),
            fetch_size: default_fetch_size(),
        }
    }
}

/// Pooled Neo4j connection shared by every store handle.
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
}

impl GraphClient {
    pub async fn connect(config: &GraphConfig) -> Result<Self, GraphError> {
        let neo_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .max_connections(config.max_connections as usize)
            .fetch_size(config.fetch_size)
            .build()
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        tracing::info!(uri = %config.uri, "Connected to Neo4j");
        Ok(Self { graph })
    }

    /// Run a statement in its own auto-commit transaction, discarding rows.
    pub async fn run(&self, query: Query) -> Result<(), GraphError> {
        self.graph.run(query).await?;
        Ok(())
    }

    pub async fn start_txn(&self) -> Result<neo4rs::Txn, GraphError> {
        Ok(self.graph.start_txn().await?)
    }
}
