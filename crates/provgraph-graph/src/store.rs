//! The storage seam: transactions over entities, relationships and sources.
//!
//! Every request runs inside exactly one [`GraphTxn`]. A transaction ends
//! with [`GraphTxn::commit`] or [`GraphTxn::rollback`]; dropping one without
//! either discards its writes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use provgraph_core::record::SOURCES_PROPERTY;
use provgraph_core::{
    EntityRecord, EntityRef, EntityTypeDescriptor, Properties, ProvenanceRecord, RelationshipRecord,
    RelationshipTypeDescriptor, SourceKey,
};
use provgraph_filter::Predicate;

use crate::client::GraphError;

/// Relationship type linking an entity node to each of its `Source` nodes.
pub const SOURCED_FROM: &str = "SOURCED_FROM";

/// Label of provenance nodes.
pub const SOURCE_LABEL: &str = "Source";

/// One end of a relationship, addressed by type and key.
#[derive(Debug, Clone, Copy)]
pub struct Endpoint<'a> {
    pub descriptor: &'a EntityTypeDescriptor,
    pub key_field: &'a str,
    pub id: &'a str,
}

impl<'a> Endpoint<'a> {
    pub fn new(descriptor: &'a EntityTypeDescriptor, key_field: &'a str, id: &'a str) -> Self {
        Self {
            descriptor,
            key_field,
            id,
        }
    }

    pub fn to_ref(&self) -> EntityRef {
        EntityRef::new(self.descriptor.name(), self.key_field, self.id)
    }
}

/// A graph backend able to open transactions.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Short backend name for logs (`neo4j`, `memory`).
    fn backend(&self) -> &'static str;

    async fn begin(&self) -> Result<Box<dyn GraphTxn>, GraphError>;
}

/// One open transaction.
#[async_trait]
pub trait GraphTxn: Send {
    /// Create or refresh the `Source` node for a provenance record.
    async fn upsert_source(&mut self, source: &ProvenanceRecord) -> Result<SourceKey, GraphError>;

    /// Create an entity node with validated properties, linked to `sources`.
    async fn create(
        &mut self,
        descriptor: &EntityTypeDescriptor,
        properties: &Properties,
        sources: &[SourceKey],
    ) -> Result<EntityRecord, GraphError>;

    /// First entity of this type whose `field` equals `value`.
    async fn find_one(
        &mut self,
        descriptor: &EntityTypeDescriptor,
        field: &str,
        value: &str,
    ) -> Result<Option<EntityRecord>, GraphError>;

    /// Create a directed relationship between two existing entities.
    async fn create_relationship(
        &mut self,
        descriptor: &RelationshipTypeDescriptor,
        from: Endpoint<'_>,
        to: Endpoint<'_>,
        properties: &Properties,
        sources: &[SourceKey],
    ) -> Result<RelationshipRecord, GraphError>;

    /// Entities of this type matching `predicate` (all when `None`), at most
    /// `limit` of them.
    async fn run(
        &mut self,
        descriptor: &EntityTypeDescriptor,
        predicate: Option<&Predicate>,
        limit: usize,
    ) -> Result<Vec<EntityRecord>, GraphError>;

    /// Relationships of this type matching `predicate` (all when `None`).
    async fn run_relationships(
        &mut self,
        descriptor: &RelationshipTypeDescriptor,
        predicate: Option<&Predicate>,
        limit: usize,
    ) -> Result<Vec<RelationshipRecord>, GraphError>;

    /// Remove an entity and its relationships. Returns whether one existed.
    async fn delete(
        &mut self,
        descriptor: &EntityTypeDescriptor,
        field: &str,
        value: &str,
    ) -> Result<bool, GraphError>;

    async fn commit(self: Box<Self>) -> Result<(), GraphError>;

    async fn rollback(self: Box<Self>) -> Result<(), GraphError>;
}

// ── Relationship Property Layout ─────────────────────────────────

const REL_ID: &str = "id";
const REL_CREATED_AT: &str = "created_at";
const FROM_TYPE: &str = "from_type";
const FROM_KEY_FIELD: &str = "from_key_field";
const FROM_ID: &str = "from_id";
const TO_TYPE: &str = "to_type";
const TO_KEY_FIELD: &str = "to_key_field";
const TO_ID: &str = "to_id";

/// Flatten a relationship into the property map stored on the edge.
///
/// Endpoint addresses are kept on the edge so a relationship row can be
/// returned without re-reading both nodes.
pub fn edge_properties(record: &RelationshipRecord) -> Properties {
    let mut map = record.properties.clone();
    map.insert(REL_ID.into(), Value::String(record.id.clone()));
    map.insert(
        REL_CREATED_AT.into(),
        Value::String(record.created_at.to_rfc3339()),
    );
    map.insert(
        SOURCES_PROPERTY.into(),
        Value::Array(record.sources.iter().cloned().map(Value::String).collect()),
    );
    map.insert(FROM_TYPE.into(), record.from.entity_type.clone().into());
    map.insert(FROM_KEY_FIELD.into(), record.from.key_field.clone().into());
    map.insert(FROM_ID.into(), record.from.id.clone().into());
    map.insert(TO_TYPE.into(), record.to.entity_type.clone().into());
    map.insert(TO_KEY_FIELD.into(), record.to.key_field.clone().into());
    map.insert(TO_ID.into(), record.to.id.clone().into());
    map
}

/// Rebuild a relationship from the property map stored on its edge.
pub fn relationship_from_stored(
    relationship_type: &str,
    mut properties: Properties,
) -> Result<RelationshipRecord, GraphError> {
    let mut take = |key: &str| -> Result<String, GraphError> {
        match properties.remove(key) {
            Some(Value::String(s)) => Ok(s),
            _ => Err(GraphError::Serialization(format!(
                "{relationship_type} relationship is missing '{key}'"
            ))),
        }
    };

    let id = take(REL_ID)?;
    let created_at = take(REL_CREATED_AT)?;
    let from = EntityRef::new(take(FROM_TYPE)?, take(FROM_KEY_FIELD)?, take(FROM_ID)?);
    let to = EntityRef::new(take(TO_TYPE)?, take(TO_KEY_FIELD)?, take(TO_ID)?);
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| GraphError::Serialization(format!("created_at: {e}")))?;

    let stored = EntityRecord::from_stored(relationship_type, properties);
    Ok(RelationshipRecord {
        id,
        relationship_type: relationship_type.to_string(),
        from,
        to,
        properties: stored.properties,
        sources: stored.sources,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use provgraph_core::catalog;
    use serde_json::json;

    fn sample() -> RelationshipRecord {
        RelationshipRecord {
            id: "0b7c".into(),
            relationship_type: "WORKS_ON".into(),
            from: EntityRef::new("Person", "email", "alice@co.com"),
            to: EntityRef::new("Project", "name", "Apollo"),
            properties: json!({"role": "lead"}).as_object().cloned().unwrap(),
            sources: vec!["abc".into()],
            created_at: DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        }
    }

    #[test]
    fn edge_layout_survives_storage() {
        let record = sample();
        let stored = edge_properties(&record);
        assert_eq!(stored["from_id"], json!("alice@co.com"));
        assert_eq!(stored["sources"], json!(["abc"]));
        let back = relationship_from_stored("WORKS_ON", stored).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn incomplete_edges_are_serialization_errors() {
        let mut stored = edge_properties(&sample());
        stored.remove("to_id");
        assert!(matches!(
            relationship_from_stored("WORKS_ON", stored),
            Err(GraphError::Serialization(msg)) if msg.contains("to_id")
        ));
    }

    #[test]
    fn endpoint_ref_carries_type_and_key() {
        let person = catalog::person();
        let end = Endpoint::new(&person, "email", "bob@co.com");
        assert_eq!(end.to_ref(), EntityRef::new("Person", "email", "bob@co.com"));
    }
}
