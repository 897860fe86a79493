//! Neo4j backend: every [`GraphTxn`] wraps one explicit `neo4rs::Txn`.
//!
//! Node and edge properties travel as JSON maps through APOC
//! (`apoc.convert.fromJsonMap` / `apoc.convert.toJson`), so list properties
//! and nulls round-trip without per-field parameter plumbing.

use async_trait::async_trait;
use neo4rs::{query, BoltNull, BoltType, Query, Row, Txn};

use provgraph_core::{
    EntityRecord, EntityTypeDescriptor, Properties, ProvenanceRecord, RecordSchema,
    RelationshipRecord, RelationshipTypeDescriptor, SourceKey,
};
use provgraph_filter::{Literal, Predicate};

use crate::client::{GraphClient, GraphError};
use crate::cypher::CypherFilter;
use crate::store::{
    edge_properties, relationship_from_stored, Endpoint, GraphStore, GraphTxn, SOURCED_FROM,
    SOURCE_LABEL,
};

/// [`GraphStore`] over a pooled Neo4j connection.
#[derive(Clone)]
pub struct Neo4jStore {
    client: GraphClient,
}

impl Neo4jStore {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &GraphClient {
        &self.client
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    fn backend(&self) -> &'static str {
        "neo4j"
    }

    async fn begin(&self) -> Result<Box<dyn GraphTxn>, GraphError> {
        let txn = self.client.start_txn().await?;
        Ok(Box::new(Neo4jTxn { txn }))
    }
}

pub struct Neo4jTxn {
    txn: Txn,
}

impl Neo4jTxn {
    async fn rows(&mut self, q: Query) -> Result<Vec<Row>, GraphError> {
        let mut stream = self.txn.execute(q).await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next(self.txn.handle()).await? {
            rows.push(row);
        }
        Ok(rows)
    }

    async fn entities(
        &mut self,
        descriptor: &EntityTypeDescriptor,
        q: Query,
    ) -> Result<Vec<EntityRecord>, GraphError> {
        self.rows(q)
            .await?
            .iter()
            .map(|row| Ok(EntityRecord::from_stored(descriptor.name(), props(row)?)))
            .collect()
    }
}

#[async_trait]
impl GraphTxn for Neo4jTxn {
    async fn upsert_source(&mut self, source: &ProvenanceRecord) -> Result<SourceKey, GraphError> {
        let key = source.key();
        let cypher = format!(
            "MERGE (s:{SOURCE_LABEL} {{key: $key}})
             ON CREATE SET s.origin = $origin,
                           s.origin_id = $origin_id,
                           s.url = $url,
                           s.first_seen = $timestamp
             SET s.confidence = $confidence,
                 s.last_seen = $timestamp"
        );
        let q = query(&cypher)
            .param("key", key.0.clone())
            .param("origin", source.origin.as_str())
            .param("origin_id", source.origin_id.clone())
            .param("url", source.url.clone().unwrap_or_default())
            .param("timestamp", source.timestamp.to_rfc3339())
            .param("confidence", source.confidence);
        self.txn.run(q).await?;
        Ok(key)
    }

    async fn create(
        &mut self,
        descriptor: &EntityTypeDescriptor,
        properties: &Properties,
        sources: &[SourceKey],
    ) -> Result<EntityRecord, GraphError> {
        let keys: Vec<String> = sources.iter().map(|k| k.0.clone()).collect();
        let cypher = format!(
            "CREATE (n:{labels})
             SET n = apoc.convert.fromJsonMap($props)
             SET n.sources = $sources
             WITH n
             CALL {{
                 WITH n
                 UNWIND $sources AS key
                 MATCH (s:{SOURCE_LABEL} {{key: key}})
                 MERGE (n)-[:{SOURCED_FROM}]->(s)
             }}
             RETURN apoc.convert.toJson(properties(n)) AS props",
            labels = descriptor.label_expr()
        );
        let q = query(&cypher)
            .param("props", serde_json::to_string(properties)?)
            .param("sources", keys);
        self.entities(descriptor, q)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                GraphError::Backend(format!("CREATE returned no {} node", descriptor.name()))
            })
    }

    async fn find_one(
        &mut self,
        descriptor: &EntityTypeDescriptor,
        field: &str,
        value: &str,
    ) -> Result<Option<EntityRecord>, GraphError> {
        let cypher = format!(
            "MATCH (n:{labels} {{{field}: $value}})
             RETURN apoc.convert.toJson(properties(n)) AS props
             LIMIT 1",
            labels = descriptor.label_expr(),
            field = quote(field)
        );
        let q = query(&cypher).param("value", value);
        Ok(self.entities(descriptor, q).await?.into_iter().next())
    }

    async fn create_relationship(
        &mut self,
        descriptor: &RelationshipTypeDescriptor,
        from: Endpoint<'_>,
        to: Endpoint<'_>,
        properties: &Properties,
        sources: &[SourceKey],
    ) -> Result<RelationshipRecord, GraphError> {
        let record = RelationshipRecord {
            id: uuid::Uuid::new_v4().to_string(),
            relationship_type: descriptor.name().to_string(),
            from: from.to_ref(),
            to: to.to_ref(),
            properties: properties.clone(),
            sources: sources.iter().map(|k| k.0.clone()).collect(),
            created_at: chrono::Utc::now(),
        };

        let cypher = format!(
            "MATCH (a:{from_labels} {{{from_field}: $from_id}})
             WITH a LIMIT 1
             MATCH (b:{to_labels} {{{to_field}: $to_id}})
             WITH a, b LIMIT 1
             CREATE (a)-[r:{rel}]->(b)
             SET r = apoc.convert.fromJsonMap($props)
             RETURN r.id AS id",
            from_labels = from.descriptor.label_expr(),
            from_field = quote(from.key_field),
            to_labels = to.descriptor.label_expr(),
            to_field = quote(to.key_field),
            rel = quote(descriptor.name()),
        );
        let q = query(&cypher)
            .param("from_id", from.id)
            .param("to_id", to.id)
            .param("props", serde_json::to_string(&edge_properties(&record))?);

        if self.rows(q).await?.is_empty() {
            // The caller resolves both endpoints first, so this only happens
            // when one vanished in between.
            return Err(GraphError::NotFound {
                label: from.descriptor.name().to_string(),
                field: from.key_field.to_string(),
                value: from.id.to_string(),
            });
        }
        Ok(record)
    }

    async fn run(
        &mut self,
        descriptor: &EntityTypeDescriptor,
        predicate: Option<&Predicate>,
        limit: usize,
    ) -> Result<Vec<EntityRecord>, GraphError> {
        let filter = predicate.map(|p| CypherFilter::translate(p, "n"));
        let cypher = format!(
            "MATCH (n:{labels}){filter}
             RETURN apoc.convert.toJson(properties(n)) AS props
             LIMIT $limit",
            labels = descriptor.label_expr(),
            filter = CypherFilter::where_clause(filter.as_ref()),
        );
        tracing::debug!(entity_type = descriptor.name(), %cypher, "Running entity query");
        let q = bind(query(&cypher), filter.as_ref()).param("limit", limit as i64);
        self.entities(descriptor, q).await
    }

    async fn run_relationships(
        &mut self,
        descriptor: &RelationshipTypeDescriptor,
        predicate: Option<&Predicate>,
        limit: usize,
    ) -> Result<Vec<RelationshipRecord>, GraphError> {
        let filter = predicate.map(|p| CypherFilter::translate(p, "r"));
        let cypher = format!(
            "MATCH ()-[r:{rel}]->(){filter}
             RETURN apoc.convert.toJson(properties(r)) AS props
             LIMIT $limit",
            rel = quote(descriptor.name()),
            filter = CypherFilter::where_clause(filter.as_ref()),
        );
        tracing::debug!(relationship_type = descriptor.type_name(), %cypher, "Running relationship query");
        let q = bind(query(&cypher), filter.as_ref()).param("limit", limit as i64);
        self.rows(q)
            .await?
            .iter()
            .map(|row| relationship_from_stored(descriptor.name(), props(row)?))
            .collect()
    }

    async fn delete(
        &mut self,
        descriptor: &EntityTypeDescriptor,
        field: &str,
        value: &str,
    ) -> Result<bool, GraphError> {
        let cypher = format!(
            "MATCH (n:{labels} {{{field}: $value}})
             DETACH DELETE n
             RETURN count(*) AS deleted",
            labels = descriptor.label_expr(),
            field = quote(field)
        );
        let rows = self.rows(query(&cypher).param("value", value)).await?;
        let deleted = match rows.first() {
            Some(row) => row
                .get::<i64>("deleted")
                .map_err(|e| GraphError::Serialization(e.to_string()))?,
            None => 0,
        };
        Ok(deleted > 0)
    }

    async fn commit(self: Box<Self>) -> Result<(), GraphError> {
        self.txn.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), GraphError> {
        self.txn.rollback().await?;
        Ok(())
    }
}

fn props(row: &Row) -> Result<Properties, GraphError> {
    let raw: String = row
        .get("props")
        .map_err(|e| GraphError::Serialization(e.to_string()))?;
    Ok(serde_json::from_str(&raw)?)
}

fn bind(mut q: Query, filter: Option<&CypherFilter>) -> Query {
    for (name, value) in filter.into_iter().flat_map(|f| &f.params) {
        q = q.param(name, literal_param(value));
    }
    q
}

fn literal_param(value: &Literal) -> BoltType {
    match value {
        Literal::Str(s) => s.clone().into(),
        Literal::Int(i) => (*i).into(),
        Literal::Float(f) => (*f).into(),
        Literal::Bool(b) => (*b).into(),
        Literal::Null => BoltType::Null(BoltNull),
    }
}

/// Backtick-quote an identifier for use in a Cypher pattern.
fn quote(identifier: &str) -> String {
    format!("`{}`", identifier.replace('`', "``"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_quoted() {
        assert_eq!(quote("email"), "`email`");
        assert_eq!(quote("we`ird"), "`we``ird`");
    }

    #[test]
    fn literals_map_to_bolt_types() {
        assert!(matches!(literal_param(&Literal::Str("a".into())), BoltType::String(_)));
        assert!(matches!(literal_param(&Literal::Int(3)), BoltType::Integer(_)));
        assert!(matches!(literal_param(&Literal::Float(0.5)), BoltType::Float(_)));
        assert!(matches!(literal_param(&Literal::Bool(true)), BoltType::Boolean(_)));
        assert!(matches!(literal_param(&Literal::Null), BoltType::Null(_)));
    }
}
