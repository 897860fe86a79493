//! Neo4j constraints and indexes derived from the schema registry.

use provgraph_core::{IndexKind, RecordSchema, SchemaRegistry};

use crate::client::{GraphClient, GraphError};
use crate::store::SOURCE_LABEL;

/// Cypher statements creating every constraint and index the registry
/// declares. All statements are idempotent (`IF NOT EXISTS`).
pub fn schema_statements(registry: &SchemaRegistry) -> Vec<String> {
    let mut statements = vec![format!(
        "CREATE CONSTRAINT source_key_unique IF NOT EXISTS \
         FOR (s:{SOURCE_LABEL}) REQUIRE s.key IS UNIQUE"
    )];

    for descriptor in registry.entity_types() {
        // Constraints attach to one label; the most specific is last.
        let Some(label) = descriptor.native_labels().last() else {
            continue;
        };
        let prefix = descriptor.name().to_lowercase();
        for field in descriptor.fields() {
            let name = format!("{prefix}_{}", field.name);
            match field.index {
                IndexKind::Primary | IndexKind::Unique => statements.push(format!(
                    "CREATE CONSTRAINT {name}_unique IF NOT EXISTS \
                     FOR (n:`{label}`) REQUIRE n.`{field}` IS UNIQUE",
                    field = field.name
                )),
                IndexKind::Indexed => statements.push(format!(
                    "CREATE INDEX {name}_index IF NOT EXISTS \
                     FOR (n:`{label}`) ON (n.`{field}`)",
                    field = field.name
                )),
                IndexKind::None => {}
            }
        }
    }

    for descriptor in registry.relationship_types() {
        let prefix = descriptor.name().to_lowercase();
        for field in descriptor.fields() {
            if field.index == IndexKind::None {
                continue;
            }
            statements.push(format!(
                "CREATE INDEX {prefix}_{field}_index IF NOT EXISTS \
                 FOR ()-[r:`{rel}`]-() ON (r.`{field}`)",
                rel = descriptor.name(),
                field = field.name
            ));
        }
    }

    statements
}

impl GraphClient {
    /// Create the registry's constraints and indexes. Returns how many
    /// statements ran.
    pub async fn ensure_schema(&self, registry: &SchemaRegistry) -> Result<usize, GraphError> {
        let statements = schema_statements(registry);
        for statement in &statements {
            tracing::debug!(%statement, "Applying schema statement");
            self.run(neo4rs::query(statement)).await?;
        }
        tracing::info!(count = statements.len(), "Graph schema ensured");
        Ok(statements.len())
    }
}
