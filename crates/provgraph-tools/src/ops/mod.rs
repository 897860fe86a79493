//! Tool operations, one module per family.

pub mod entities;
pub mod query;
pub mod relationships;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use provgraph_core::record::{normalize_key, SOURCES_PROPERTY};
use provgraph_core::provenance::require_provenance;
use provgraph_core::{
    EntityTypeDescriptor, Properties, ProvenanceError, ProvenanceRecord, RecordSchema,
    RelationshipTypeDescriptor, SchemaRegistry,
};

use crate::error::ToolError;
use crate::GraphTools;

pub use entities::{CreatedEntity, DeletedEntity, FetchedEntity};
pub use query::{EntityQueryResult, RelationshipQueryResult};
pub use relationships::{CreateRelationshipRequest, CreatedRelationship};

/// A provenance entry as a caller may supply it: a source URI or a full record.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SourceInput {
    Uri(String),
    Record(ProvenanceRecord),
}

impl SourceInput {
    fn resolve(self) -> Result<ProvenanceRecord, ProvenanceError> {
        match self {
            SourceInput::Uri(uri) => ProvenanceRecord::from_uri(&uri),
            SourceInput::Record(record) => Ok(record),
        }
    }
}

impl From<ProvenanceRecord> for SourceInput {
    fn from(record: ProvenanceRecord) -> Self {
        SourceInput::Record(record)
    }
}

impl From<&str> for SourceInput {
    fn from(uri: &str) -> Self {
        SourceInput::Uri(uri.to_string())
    }
}

/// Pull source URIs out of `properties.sources`, merge them with the explicit
/// list, and apply the provenance gate for `schema`.
fn collect_provenance(
    schema: &dyn RecordSchema,
    properties: &mut Properties,
    explicit: Vec<SourceInput>,
) -> Result<Vec<ProvenanceRecord>, ToolError> {
    let mut inputs = explicit;
    match properties.remove(SOURCES_PROPERTY) {
        None | Some(Value::Null) => {}
        Some(Value::Array(items)) => {
            for item in items {
                match item {
                    Value::String(uri) => inputs.push(SourceInput::Uri(uri)),
                    other => {
                        let record = serde_json::from_value::<ProvenanceRecord>(other)
                            .map_err(|e| ProvenanceError::Invalid(e.to_string()))?;
                        inputs.push(SourceInput::Record(record));
                    }
                }
            }
        }
        Some(Value::String(uri)) => inputs.push(SourceInput::Uri(uri)),
        Some(_) => {
            return Err(ProvenanceError::Invalid(
                "'sources' must be a list of source URIs".into(),
            )
            .into());
        }
    }

    let records = inputs
        .into_iter()
        .map(SourceInput::resolve)
        .collect::<Result<Vec<_>, _>>()?;

    if schema.requires_provenance() {
        Ok(require_provenance(schema.type_name(), records)?)
    } else {
        Ok(records)
    }
}

/// Schema listing returned by `list_types`.
#[derive(Debug, Serialize)]
pub struct TypeCatalog<'a> {
    pub entities: Vec<&'a EntityTypeDescriptor>,
    pub relationships: Vec<&'a RelationshipTypeDescriptor>,
}

impl<'a> TypeCatalog<'a> {
    pub fn of(registry: &'a SchemaRegistry) -> Self {
        Self {
            entities: registry.entity_types().collect(),
            relationships: registry.relationship_types().collect(),
        }
    }
}

impl GraphTools {
    /// Resolve an entity type and its primary key, normalizing `id` the way
    /// the key field is normalized on create.
    fn keyed<'r>(
        &'r self,
        entity_type: &str,
        id: &str,
    ) -> Result<(&'r EntityTypeDescriptor, &'static str, String), ToolError> {
        let descriptor = self.registry().lookup(entity_type)?;
        let key_field = descriptor
            .primary_key()
            .ok_or_else(|| ToolError::NoPrimaryKey(entity_type.to_string()))?;
        let id = match descriptor.field(key_field) {
            Some(spec) => normalize_key(spec, id),
            None => id.to_string(),
        };
        Ok((descriptor, key_field, id))
    }

    /// Every registered entity and relationship type with its fields.
    pub fn list_types(&self) -> TypeCatalog<'_> {
        TypeCatalog::of(self.registry())
    }
}
