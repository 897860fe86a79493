//! provgraph-tools: the agent-facing operations over the knowledge graph.
//!
//! [`GraphTools`] validates every request against the schema registry and
//! runs it in exactly one storage transaction: opened only after all
//! pre-transaction gates pass, committed on success, rolled back on any
//! failure including the request timeout.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod ops;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use provgraph_core::{catalog, SchemaRegistry};
use provgraph_filter::CompileOptions;
use provgraph_graph::{GraphClient, GraphStore, GraphTxn, MemoryStore, Neo4jStore};

pub use config::{AppConfig, Backend, ToolsConfig};
pub use dispatch::ToolResponse;
pub use error::ToolError;
pub use ops::SourceInput;

/// The tool service: registry, storage and limits.
#[derive(Clone)]
pub struct GraphTools {
    registry: Arc<SchemaRegistry>,
    store: Arc<dyn GraphStore>,
    config: ToolsConfig,
    filter: CompileOptions,
}

impl GraphTools {
    pub fn new(
        registry: Arc<SchemaRegistry>,
        store: Arc<dyn GraphStore>,
        config: ToolsConfig,
        filter: CompileOptions,
    ) -> Self {
        Self {
            registry,
            store,
            config,
            filter,
        }
    }

    /// Build the service from configuration with the built-in catalog,
    /// connecting to Neo4j when that backend is selected.
    pub async fn from_config(app: &AppConfig) -> Result<Self, ToolError> {
        let registry = Arc::new(catalog::builtin()?);
        let store: Arc<dyn GraphStore> = match app.tools.backend {
            Backend::Neo4j => Arc::new(Neo4jStore::new(GraphClient::connect(&app.neo4j).await?)),
            Backend::Memory => Arc::new(MemoryStore::new()),
        };
        tracing::info!(backend = store.backend(), "Graph tools ready");
        Ok(Self::new(registry, store, app.tools.clone(), app.filter.clone()))
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ToolsConfig {
        &self.config
    }

    // ── Transaction Boundary ─────────────────────────────────────

    /// Open the request's transaction, waiting no longer than the request
    /// timeout for a connection or a held lock.
    async fn begin(&self) -> Result<Box<dyn GraphTxn>, ToolError> {
        self.bounded(async { Ok(self.store.begin().await?) }).await
    }

    /// Bound storage work by the request timeout.
    async fn bounded<T>(
        &self,
        work: impl Future<Output = Result<T, ToolError>>,
    ) -> Result<T, ToolError> {
        let limit = Duration::from_secs(self.config.request_timeout_secs);
        match tokio::time::timeout(limit, work).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Storage(format!(
                "request timed out after {}s",
                self.config.request_timeout_secs
            ))),
        }
    }

    /// Commit on success, roll back otherwise. The original error wins over
    /// a failed rollback.
    async fn finish<T>(
        &self,
        txn: Box<dyn GraphTxn>,
        result: Result<T, ToolError>,
    ) -> Result<T, ToolError> {
        match result {
            Ok(value) => {
                txn.commit().await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = txn.rollback().await {
                    tracing::warn!(error = %rollback, "Rollback failed");
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tools(request_timeout_secs: u64) -> (GraphTools, MemoryStore) {
        let store = MemoryStore::new();
        let tools = GraphTools::new(
            Arc::new(catalog::builtin().unwrap()),
            Arc::new(store.clone()),
            ToolsConfig {
                request_timeout_secs,
                ..ToolsConfig::default()
            },
            CompileOptions::default(),
        );
        (tools, store)
    }

    #[tokio::test]
    async fn stalled_work_times_out_as_a_storage_error() {
        let (tools, _store) = tools(0);
        let err = tools
            .bounded(std::future::pending::<Result<(), ToolError>>())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Storage(_)));
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn begin_gives_up_when_the_store_is_busy() {
        let (tools, store) = tools(0);
        let held = tools.begin().await.unwrap();
        let err = match tools.begin().await {
            Err(e) => e,
            Ok(_) => panic!("second transaction opened while the first was held"),
        };
        assert!(matches!(err, ToolError::Storage(_)));
        assert!(err.to_string().contains("timed out"));
        assert_eq!(store.calls(provgraph_graph::Operation::Begin), 2);

        held.rollback().await.unwrap();
        assert!(tools.begin().await.is_ok());
    }

    #[tokio::test]
    async fn finish_rolls_back_and_keeps_the_original_error() {
        let (tools, store) = tools(10);
        let txn = tools.begin().await.unwrap();
        let err = tools
            .finish::<()>(txn, Err(ToolError::InvalidArguments("bad".into())))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        assert_eq!(store.calls(provgraph_graph::Operation::Rollback), 1);
        assert_eq!(store.calls(provgraph_graph::Operation::Commit), 0);
    }
}
