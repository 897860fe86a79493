//! Relationship creation between two existing entities.

use serde::{Deserialize, Serialize};

use provgraph_core::record::validate_properties;
use provgraph_core::{EntityRef, Properties};
use provgraph_graph::Endpoint;

use super::entities::not_found;
use super::{collect_provenance, SourceInput};
use crate::error::ToolError;
use crate::GraphTools;

/// Arguments of `create_relationship`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRelationshipRequest {
    pub relationship_type: String,
    pub from_entity_type: String,
    pub from_entity_id: String,
    pub to_entity_type: String,
    pub to_entity_id: String,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub sources: Vec<SourceInput>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedRelationship {
    pub success: bool,
    pub message: String,
    pub relationship_type: String,
    pub relationship_id: String,
    pub from_entity: EntityRef,
    pub to_entity: EntityRef,
    pub properties: Properties,
}

impl GraphTools {
    /// Link two existing entities. The from-entity is resolved before the
    /// to-entity, so when both are missing the error names the from side.
    pub async fn create_relationship(
        &self,
        request: CreateRelationshipRequest,
    ) -> Result<CreatedRelationship, ToolError> {
        let CreateRelationshipRequest {
            relationship_type,
            from_entity_type,
            from_entity_id,
            to_entity_type,
            to_entity_id,
            mut properties,
            sources,
        } = request;

        let descriptor = self.registry().relationship(&relationship_type)?;
        let (from_desc, from_key, from_id) = self.keyed(&from_entity_type, &from_entity_id)?;
        let (to_desc, to_key, to_id) = self.keyed(&to_entity_type, &to_entity_id)?;
        let provenance = collect_provenance(descriptor, &mut properties, sources);
        let properties = validate_properties(descriptor, &properties)?;
        let provenance = provenance?;

        let from = Endpoint::new(from_desc, from_key, &from_id);
        let to = Endpoint::new(to_desc, to_key, &to_id);

        let mut txn = self.begin().await?;
        let result = self
            .bounded(async {
                let mut keys = Vec::with_capacity(provenance.len());
                for source in &provenance {
                    keys.push(txn.upsert_source(source).await?);
                }
                for end in [from, to] {
                    if txn.find_one(end.descriptor, end.key_field, end.id).await?.is_none() {
                        return Err(not_found(end.descriptor.name(), end.key_field, end.id));
                    }
                }
                Ok(txn
                    .create_relationship(descriptor, from, to, &properties, &keys)
                    .await?)
            })
            .await;
        let record = self.finish(txn, result).await?;

        tracing::info!(
            relationship_type = %relationship_type,
            relationship_id = %record.id,
            from = %from_id,
            to = %to_id,
            "Created relationship"
        );
        Ok(CreatedRelationship {
            success: true,
            message: format!("Created {relationship_type} relationship"),
            relationship_type,
            relationship_id: record.id,
            from_entity: record.from,
            to_entity: record.to,
            properties: record.properties,
        })
    }
}
