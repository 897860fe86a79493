//! Tool dispatch: JSON arguments in, a status-tagged JSON body out.
//!
//! Every outcome becomes a [`ToolResponse`]. Failures carry a body with a
//! single `error` key; the status code travels beside it, never inside.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use provgraph_core::Properties;

use crate::error::ToolError;
use crate::ops::{CreateRelationshipRequest, SourceInput};
use crate::GraphTools;

/// Names accepted by [`GraphTools::call`].
pub const TOOLS: &[&str] = &[
    "create_entity",
    "get_entity",
    "delete_entity",
    "query_entities",
    "query_relationships",
    "create_relationship",
    "list_types",
];

#[derive(Debug, Clone, Serialize)]
pub struct ToolResponse {
    pub status: u16,
    pub body: Value,
}

impl ToolResponse {
    pub fn ok(body: impl Serialize) -> Self {
        match serde_json::to_value(body) {
            Ok(body) => Self { status: 200, body },
            Err(e) => Self::from_error(&ToolError::Schema(e.to_string())),
        }
    }

    pub fn from_error(error: &ToolError) -> Self {
        Self {
            status: error.status(),
            body: json!({ "error": error.to_string() }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status < 400
    }
}

#[derive(Deserialize)]
struct CreateEntityArgs {
    entity_type: String,
    #[serde(default)]
    properties: Properties,
    #[serde(default)]
    sources: Vec<SourceInput>,
}

#[derive(Debug, Deserialize)]
struct EntityKeyArgs {
    entity_type: String,
    id: String,
}

#[derive(Deserialize)]
struct QueryArgs {
    entity_type: String,
    #[serde(default)]
    filter_expr: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct RelationshipQueryArgs {
    relationship_type: String,
    #[serde(default)]
    filter_expr: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

impl GraphTools {
    /// Invoke a tool by name. Never fails: errors are shaped into the
    /// response.
    pub async fn call(&self, tool: &str, args: Value) -> ToolResponse {
        match self.invoke(tool, args).await {
            Ok(body) => ToolResponse::ok(body),
            Err(e) => {
                tracing::warn!(tool, kind = e.kind(), status = e.status(), error = %e, "Tool call failed");
                ToolResponse::from_error(&e)
            }
        }
    }

    async fn invoke(&self, tool: &str, args: Value) -> Result<Value, ToolError> {
        let body = match tool {
            "create_entity" => {
                let a: CreateEntityArgs = parse_args(args)?;
                to_body(self.create_entity(&a.entity_type, a.properties, a.sources).await?)?
            }
            "get_entity" => {
                let a: EntityKeyArgs = parse_args(args)?;
                to_body(self.get_entity(&a.entity_type, &a.id).await?)?
            }
            "delete_entity" => {
                let a: EntityKeyArgs = parse_args(args)?;
                to_body(self.delete_entity(&a.entity_type, &a.id).await?)?
            }
            "query_entities" => {
                let a: QueryArgs = parse_args(args)?;
                to_body(
                    self.query_entities(&a.entity_type, a.filter_expr.as_deref(), a.limit)
                        .await?,
                )?
            }
            "query_relationships" => {
                let a: RelationshipQueryArgs = parse_args(args)?;
                to_body(
                    self.query_relationships(&a.relationship_type, a.filter_expr.as_deref(), a.limit)
                        .await?,
                )?
            }
            "create_relationship" => {
                let request: CreateRelationshipRequest = parse_args(args)?;
                to_body(self.create_relationship(request).await?)?
            }
            "list_types" => to_body(self.list_types())?,
            other => return Err(ToolError::UnknownTool(other.to_string())),
        };
        Ok(body)
    }
}

fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    // A bare `null` stands for "no arguments".
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

fn to_body(value: impl Serialize) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::Schema(e.to_string()))
}
