//! provgraph-core: Shared schema, provenance, and record types for the provgraph knowledge graph.
//!
//! This crate provides the foundational pieces used across all provgraph components:
//! - Field kinds and entity/relationship type descriptors
//! - The schema registry and the built-in catalog of types
//! - Provenance records (source tracking) and their invariants
//! - Runtime entity/relationship records and property validation
//! - Configuration loading
//! - Common error types

pub mod catalog;
pub mod config;
pub mod error;
pub mod provenance;
pub mod record;
pub mod schema;

pub use error::{FieldError, ProvenanceError, SchemaError, ValidationErrors};
pub use provenance::{ProvenanceRecord, SourceKey, SourceKind};
pub use record::{EntityRecord, EntityRef, Properties, RelationshipRecord};
pub use schema::{
    EntityTypeDescriptor, FieldKind, FieldSpec, IndexKind, Normalize, RecordSchema,
    RelationshipTypeDescriptor, SchemaRegistry,
};
