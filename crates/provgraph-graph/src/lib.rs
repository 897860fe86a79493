//! provgraph-graph: storage for the provgraph knowledge graph.
//!
//! All entity, relationship and source writes go through a [`GraphTxn`]
//! obtained from a [`GraphStore`]. Two backends implement the seam:
//! - [`Neo4jStore`], over the pooled [`GraphClient`]
//! - [`MemoryStore`], an in-process graph with call counters and fault
//!   injection, used by tests and the offline CLI

pub mod client;
pub mod cypher;
pub mod memory;
pub mod neo4j;
pub mod schema;
pub mod store;

pub use client::{GraphClient, GraphConfig, GraphError};
pub use cypher::{CypherFilter, FilterParam};
pub use memory::{MemoryStore, Operation};
pub use neo4j::Neo4jStore;
pub use store::{Endpoint, GraphStore, GraphTxn};
