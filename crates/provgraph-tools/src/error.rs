//! Error types for the provgraph-tools crate.

use thiserror::Error;

use provgraph_core::{ProvenanceError, SchemaError, ValidationErrors};
use provgraph_filter::FilterError;
use provgraph_graph::GraphError;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Unknown entity type: {name}. Available types: {}", .available.join(", "))]
    UnknownType { name: String, available: Vec<String> },

    #[error("Unknown relationship type: {name}. Available types: {}", .available.join(", "))]
    UnknownRelationshipType { name: String, available: Vec<String> },

    #[error("No primary key defined for {0}")]
    NoPrimaryKey(String),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// Covers both missing and malformed provenance.
    #[error(transparent)]
    Provenance(#[from] ProvenanceError),

    #[error("{entity_type} with {key_field}='{value}' not found")]
    EntityNotFound {
        entity_type: String,
        key_field: String,
        value: String,
    },

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("{0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}

impl ToolError {
    /// HTTP-equivalent status carried next to the `{error}` body.
    pub fn status(&self) -> u16 {
        match self {
            ToolError::Validation(_)
            | ToolError::Provenance(_)
            | ToolError::Filter(_)
            | ToolError::InvalidArguments(_) => 400,
            ToolError::UnknownType { .. }
            | ToolError::UnknownRelationshipType { .. }
            | ToolError::EntityNotFound { .. }
            | ToolError::UnknownTool(_) => 404,
            ToolError::Conflict(_) => 409,
            ToolError::NoPrimaryKey(_) | ToolError::Schema(_) => 500,
            ToolError::Storage(_) => 502,
        }
    }

    /// Short machine-readable class, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::UnknownType { .. } => "unknown_type",
            ToolError::UnknownRelationshipType { .. } => "unknown_relationship_type",
            ToolError::NoPrimaryKey(_) => "no_primary_key",
            ToolError::Validation(_) => "validation",
            ToolError::Provenance(ProvenanceError::Missing { .. }) => "missing_provenance",
            ToolError::Provenance(_) => "invalid_provenance",
            ToolError::EntityNotFound { .. } => "entity_not_found",
            ToolError::Filter(e) => e.kind(),
            ToolError::Conflict(_) => "conflict",
            ToolError::Storage(_) => "storage",
            ToolError::Schema(_) => "schema",
            ToolError::UnknownTool(_) => "unknown_tool",
            ToolError::InvalidArguments(_) => "invalid_arguments",
        }
    }
}

impl From<SchemaError> for ToolError {
    fn from(e: SchemaError) -> Self {
        match e {
            SchemaError::UnknownType { name, available } => {
                ToolError::UnknownType { name, available }
            }
            SchemaError::UnknownRelationshipType { name, available } => {
                ToolError::UnknownRelationshipType { name, available }
            }
            SchemaError::NoPrimaryKey(type_name) => ToolError::NoPrimaryKey(type_name),
            other => ToolError::Schema(other.to_string()),
        }
    }
}

impl From<GraphError> for ToolError {
    fn from(e: GraphError) -> Self {
        match e {
            GraphError::NotFound {
                label,
                field,
                value,
            } => ToolError::EntityNotFound {
                entity_type: label,
                key_field: field,
                value,
            },
            e @ GraphError::Conflict { .. } => ToolError::Conflict(e.to_string()),
            other => ToolError::Storage(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ToolError>;
