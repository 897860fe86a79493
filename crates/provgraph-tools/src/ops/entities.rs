//! Entity operations: create, get and delete by primary key.

use serde::Serialize;
use serde_json::Value;

use provgraph_core::record::validate_properties;
use provgraph_core::{EntityTypeDescriptor, Properties, ProvenanceRecord};
use provgraph_graph::GraphTxn;

use super::{collect_provenance, SourceInput};
use crate::error::ToolError;
use crate::GraphTools;

#[derive(Debug, Clone, Serialize)]
pub struct CreatedEntity {
    pub success: bool,
    pub entity_type: String,
    /// Primary-key value, or `null` for types without one.
    pub entity_id: Option<String>,
    pub entity: Value,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchedEntity {
    pub success: bool,
    pub entity_type: String,
    pub entity_id: String,
    pub entity: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeletedEntity {
    pub success: bool,
    pub message: String,
}

impl GraphTools {
    /// Validate, gate on provenance, then write the entity and its sources in
    /// one transaction.
    pub async fn create_entity(
        &self,
        entity_type: &str,
        mut properties: Properties,
        sources: Vec<SourceInput>,
    ) -> Result<CreatedEntity, ToolError> {
        let descriptor = self.registry().lookup(entity_type)?;
        let provenance = collect_provenance(descriptor, &mut properties, sources);
        let properties = validate_properties(descriptor, &properties)?;
        let provenance = provenance?;

        let mut txn = self.begin().await?;
        let result = self
            .bounded(create_in(txn.as_mut(), descriptor, &properties, &provenance))
            .await;
        let record = self.finish(txn, result).await?;

        let entity_id = descriptor.primary_key().and_then(|pk| record.key_value(pk));
        tracing::info!(
            entity_type,
            entity_id = entity_id.as_deref().unwrap_or("-"),
            sources = provenance.len(),
            "Created entity"
        );
        Ok(CreatedEntity {
            success: true,
            entity_type: entity_type.to_string(),
            entity_id,
            entity: record.to_json(),
            message: format!("Created {entity_type} successfully"),
        })
    }

    /// Fetch one entity by primary key.
    pub async fn get_entity(&self, entity_type: &str, id: &str) -> Result<FetchedEntity, ToolError> {
        let (descriptor, key_field, id) = self.keyed(entity_type, id)?;

        let mut txn = self.begin().await?;
        let result = self
            .bounded(async {
                txn.find_one(descriptor, key_field, &id)
                    .await?
                    .ok_or_else(|| not_found(entity_type, key_field, &id))
            })
            .await;
        let record = self.finish(txn, result).await?;

        Ok(FetchedEntity {
            success: true,
            entity_type: entity_type.to_string(),
            entity_id: id,
            entity: record.to_json(),
        })
    }

    /// Delete one entity by primary key, detaching its relationships.
    pub async fn delete_entity(
        &self,
        entity_type: &str,
        id: &str,
    ) -> Result<DeletedEntity, ToolError> {
        let (descriptor, key_field, id) = self.keyed(entity_type, id)?;

        let mut txn = self.begin().await?;
        let result = self
            .bounded(async {
                if txn.delete(descriptor, key_field, &id).await? {
                    Ok(())
                } else {
                    Err(not_found(entity_type, key_field, &id))
                }
            })
            .await;
        self.finish(txn, result).await?;

        tracing::info!(entity_type, entity_id = %id, "Deleted entity");
        Ok(DeletedEntity {
            success: true,
            message: format!("Deleted {entity_type} with ID '{id}'"),
        })
    }
}

async fn create_in(
    txn: &mut dyn GraphTxn,
    descriptor: &EntityTypeDescriptor,
    properties: &Properties,
    provenance: &[ProvenanceRecord],
) -> Result<provgraph_core::EntityRecord, ToolError> {
    let mut keys = Vec::with_capacity(provenance.len());
    for source in provenance {
        keys.push(txn.upsert_source(source).await?);
    }
    Ok(txn.create(descriptor, properties, &keys).await?)
}

pub(crate) fn not_found(entity_type: &str, key_field: &str, value: &str) -> ToolError {
    ToolError::EntityNotFound {
        entity_type: entity_type.to_string(),
        key_field: key_field.to_string(),
        value: value.to_string(),
    }
}
