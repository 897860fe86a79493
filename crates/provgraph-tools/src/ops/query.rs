//! Filtered queries over entities and relationships.

use serde::Serialize;
use serde_json::Value;

use provgraph_core::{RecordSchema, RelationshipRecord};
use provgraph_filter::Predicate;

use crate::error::ToolError;
use crate::GraphTools;

#[derive(Debug, Clone, Serialize)]
pub struct EntityQueryResult {
    pub success: bool,
    pub entity_type: String,
    pub filter_expr: Option<String>,
    pub count: usize,
    pub entities: Vec<Value>,
    /// More rows matched than were returned.
    pub limited: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelationshipQueryResult {
    pub success: bool,
    pub relationship_type: String,
    pub filter_expr: Option<String>,
    pub count: usize,
    pub relationships: Vec<RelationshipRecord>,
    pub limited: bool,
}

impl GraphTools {
    /// Entities of `entity_type` matching a filter expression. A missing or
    /// blank expression matches every entity of the type.
    pub async fn query_entities(
        &self,
        entity_type: &str,
        filter_expr: Option<&str>,
        limit: Option<usize>,
    ) -> Result<EntityQueryResult, ToolError> {
        let descriptor = self.registry().lookup(entity_type)?;
        let predicate = self.compile_filter(descriptor, filter_expr)?;
        let limit = self.config().effective_limit(limit);

        let mut txn = self.begin().await?;
        let result = self
            .bounded(async {
                Ok(txn
                    .run(descriptor, predicate.as_ref(), limit.saturating_add(1))
                    .await?)
            })
            .await;
        let mut rows = self.finish(txn, result).await?;

        let limited = rows.len() > limit;
        rows.truncate(limit);
        tracing::debug!(entity_type, count = rows.len(), limited, "Entity query");
        Ok(EntityQueryResult {
            success: true,
            entity_type: entity_type.to_string(),
            filter_expr: normalized_expr(filter_expr),
            count: rows.len(),
            entities: rows.iter().map(|r| r.to_json()).collect(),
            limited,
        })
    }

    /// Relationships of `relationship_type` matching a filter over the
    /// relationship's own properties.
    pub async fn query_relationships(
        &self,
        relationship_type: &str,
        filter_expr: Option<&str>,
        limit: Option<usize>,
    ) -> Result<RelationshipQueryResult, ToolError> {
        let descriptor = self.registry().relationship(relationship_type)?;
        let predicate = self.compile_filter(descriptor, filter_expr)?;
        let limit = self.config().effective_limit(limit);

        let mut txn = self.begin().await?;
        let result = self
            .bounded(async {
                Ok(txn
                    .run_relationships(descriptor, predicate.as_ref(), limit.saturating_add(1))
                    .await?)
            })
            .await;
        let mut rows = self.finish(txn, result).await?;

        let limited = rows.len() > limit;
        rows.truncate(limit);
        tracing::debug!(relationship_type, count = rows.len(), limited, "Relationship query");
        Ok(RelationshipQueryResult {
            success: true,
            relationship_type: relationship_type.to_string(),
            filter_expr: normalized_expr(filter_expr),
            count: rows.len(),
            relationships: rows,
            limited,
        })
    }

    /// Compile before any transaction opens, so a rejected expression never
    /// reaches storage.
    fn compile_filter(
        &self,
        schema: &dyn RecordSchema,
        filter_expr: Option<&str>,
    ) -> Result<Option<Predicate>, ToolError> {
        let Some(source) = normalized_expr(filter_expr) else {
            return Ok(None);
        };
        match provgraph_filter::compile(&source, schema, &self.filter) {
            Ok(predicate) => Ok(Some(predicate)),
            Err(e) => {
                tracing::warn!(
                    record_type = schema.type_name(),
                    kind = e.kind(),
                    error = %e,
                    "Rejected filter expression"
                );
                Err(e.into())
            }
        }
    }
}

fn normalized_expr(filter_expr: Option<&str>) -> Option<String> {
    filter_expr
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
