//! Runtime entity and relationship records, and property validation.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FieldError, ValidationErrors};
use crate::schema::{FieldKind, FieldSpec, RecordSchema};

/// Property map of a record, in JSON form.
pub type Properties = serde_json::Map<String, Value>;

/// Property name carrying the provenance keys of a stored record.
pub const SOURCES_PROPERTY: &str = "sources";

/// A validated entity instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntityRecord {
    pub entity_type: String,
    pub properties: Properties,
    /// Keys of the `Source` nodes this entity was derived from.
    #[serde(default)]
    pub sources: Vec<String>,
}

impl EntityRecord {
    pub fn new(entity_type: impl Into<String>, properties: Properties) -> Self {
        Self {
            entity_type: entity_type.into(),
            properties,
            sources: Vec::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.properties.get(field)
    }

    /// The value of `field` rendered as a string key, if present.
    pub fn key_value(&self, field: &str) -> Option<String> {
        match self.properties.get(field)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Flatten into the JSON shape returned to callers: properties plus `sources`.
    pub fn to_json(&self) -> Value {
        let mut map = self.properties.clone();
        map.insert(
            SOURCES_PROPERTY.to_string(),
            Value::Array(self.sources.iter().cloned().map(Value::String).collect()),
        );
        Value::Object(map)
    }

    /// Rebuild a record from a stored property map, splitting out `sources`.
    pub fn from_stored(entity_type: impl Into<String>, mut properties: Properties) -> Self {
        let sources = match properties.remove(SOURCES_PROPERTY) {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };
        Self {
            entity_type: entity_type.into(),
            properties,
            sources,
        }
    }
}

/// Identifies one endpoint of a relationship by type and primary key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityRef {
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub key_field: String,
    pub id: String,
}

impl EntityRef {
    pub fn new(
        entity_type: impl Into<String>,
        key_field: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            key_field: key_field.into(),
            id: id.into(),
        }
    }
}

/// A validated relationship instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelationshipRecord {
    pub id: String,
    pub relationship_type: String,
    pub from: EntityRef,
    pub to: EntityRef,
    pub properties: Properties,
    #[serde(default)]
    pub sources: Vec<String>,
    pub created_at: DateTime<Utc>,
}

// ── Validation ────────────────────────────────────────────────────

/// Validate and normalize `input` against a record schema.
///
/// Collects every field error rather than stopping at the first one.
/// Missing optional fields take their declared default, or are omitted.
pub fn validate_properties(
    schema: &impl RecordSchema,
    input: &Properties,
) -> Result<Properties, ValidationErrors> {
    let mut errors = Vec::new();
    let mut output = Properties::new();

    for key in input.keys() {
        if schema.field(key).is_none() {
            errors.push(FieldError::new(key.as_str(), "unknown field"));
        }
    }

    for spec in schema.fields() {
        let supplied = input.get(spec.name).filter(|v| !v.is_null());
        let value = match supplied.or(spec.default.as_ref()) {
            Some(v) => v,
            None => {
                if spec.required {
                    errors.push(FieldError::new(spec.name, "field required"));
                }
                continue;
            }
        };

        match check_value(spec, value) {
            Ok(v) => {
                output.insert(spec.name.to_string(), v);
            }
            Err(messages) => {
                errors.extend(messages.into_iter().map(|m| FieldError::new(spec.name, m)));
            }
        }
    }

    if errors.is_empty() {
        Ok(output)
    } else {
        Err(ValidationErrors {
            type_name: schema.type_name().to_string(),
            errors,
        })
    }
}

/// Normalize a single key value the way the field's rule would on create.
pub fn normalize_key(spec: &FieldSpec, raw: &str) -> String {
    spec.normalize.apply(raw)
}

/// Stored form of a `YYYY-MM-DD` date, or `None` if it does not parse.
pub fn canonical_date(raw: &str) -> Option<String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|d| d.format("%Y-%m-%d").to_string())
}

/// Stored form of an RFC 3339 datetime: converted to UTC, `+00:00` offset.
pub fn canonical_datetime(raw: &str) -> Option<String> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).to_rfc3339())
}

fn check_value(spec: &FieldSpec, value: &Value) -> Result<Value, Vec<String>> {
    match &spec.kind {
        FieldKind::String => check_string(spec, value).map(Value::String),
        FieldKind::Integer => match value.as_i64() {
            Some(n) => {
                check_range(spec, n as f64)?;
                Ok(Value::from(n))
            }
            None => Err(vec![type_mismatch("integer", value)]),
        },
        FieldKind::Float => match value.as_f64() {
            Some(n) if value.is_number() => {
                check_range(spec, n)?;
                Ok(Value::from(n))
            }
            _ => Err(vec![type_mismatch("number", value)]),
        },
        FieldKind::Boolean => match value {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            other => Err(vec![type_mismatch("boolean", other)]),
        },
        FieldKind::Date => {
            let s = check_string(spec, value)?;
            canonical_date(&s)
                .map(Value::String)
                .ok_or_else(|| vec![format!("invalid date '{s}', expected YYYY-MM-DD")])
        }
        FieldKind::DateTime => {
            let s = check_string(spec, value)?;
            canonical_datetime(&s)
                .map(Value::String)
                .ok_or_else(|| vec![format!("invalid datetime '{s}', expected RFC 3339")])
        }
        FieldKind::StringList => match value {
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                let mut errs = Vec::new();
                for (i, item) in items.iter().enumerate() {
                    match item.as_str() {
                        Some(s) => out.push(Value::String(spec.normalize.apply(s))),
                        None => errs.push(format!("item {i}: {}", type_mismatch("string", item))),
                    }
                }
                if errs.is_empty() {
                    Ok(Value::Array(out))
                } else {
                    Err(errs)
                }
            }
            other => Err(vec![type_mismatch("list of strings", other)]),
        },
        FieldKind::Enum(choices) => {
            let s = check_string(spec, value)?;
            if choices.contains(&s.as_str()) {
                Ok(Value::String(s))
            } else {
                Err(vec![format!(
                    "'{s}' is not one of: {}",
                    choices.join(", ")
                )])
            }
        }
    }
}

fn check_string(spec: &FieldSpec, value: &Value) -> Result<String, Vec<String>> {
    let raw = value
        .as_str()
        .ok_or_else(|| vec![type_mismatch("string", value)])?;
    let s = spec.normalize.apply(raw);
    let mut errs = Vec::new();

    let len = s.chars().count();
    if let Some(min) = spec.min_len {
        if len < min {
            errs.push(format!("must be at least {min} characters"));
        }
    }
    if let Some(max) = spec.max_len {
        if len > max {
            errs.push(format!("must be at most {max} characters"));
        }
    }
    if let Some(pattern) = &spec.pattern {
        if !pattern.is_match(&s) {
            errs.push(format!("'{s}' does not match pattern {}", pattern.as_str()));
        }
    }

    if errs.is_empty() {
        Ok(s)
    } else {
        Err(errs)
    }
}

fn check_range(spec: &FieldSpec, n: f64) -> Result<(), Vec<String>> {
    match spec.range {
        Some((min, max)) if n < min || n > max => {
            Err(vec![format!("{n} is outside the allowed range {min}..={max}")])
        }
        _ => Ok(()),
    }
}

fn type_mismatch(expected: &str, got: &Value) -> String {
    let got = match got {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    };
    format!("expected {expected}, got {got}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use serde_json::json;

    fn props(v: Value) -> Properties {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn person_is_normalized() {
        let person = catalog::builtin().unwrap();
        let person = person.lookup("Person").unwrap();
        let out = validate_properties(
            person,
            &props(json!({"email": "Alice.Smith@Company.COM", "name": "  Alice Smith  "})),
        )
        .unwrap();
        assert_eq!(out["email"], json!("alice.smith@company.com"));
        assert_eq!(out["name"], json!("Alice Smith"));
        assert_eq!(out["department"], json!(""));
        assert!(!out.contains_key("title"));
    }

    #[test]
    fn all_field_errors_are_collected() {
        let registry = catalog::builtin().unwrap();
        let person = registry.lookup("Person").unwrap();
        let err = validate_properties(
            person,
            &props(json!({"email": "not-an-email", "name": 42, "nickname": "al"})),
        )
        .unwrap_err();
        assert!(err.has_field("email"));
        assert!(err.has_field("name"));
        assert!(err.has_field("nickname"));
        assert_eq!(err.type_name, "Person");
    }

    #[test]
    fn missing_required_fields_are_reported() {
        let registry = catalog::builtin().unwrap();
        let team = registry.lookup("Team").unwrap();
        let err = validate_properties(team, &Properties::new()).unwrap_err();
        assert_eq!(err.errors, vec![FieldError::new("name", "field required")]);
    }

    #[test]
    fn kinds_are_checked() {
        let registry = catalog::builtin().unwrap();
        let project = registry.lookup("Project").unwrap();
        let err = validate_properties(
            project,
            &props(json!({
                "name": "Apollo",
                "start_date": "03/01/2024",
                "budget": -5,
                "status": "sleeping"
            })),
        )
        .unwrap_err();
        assert!(err.has_field("start_date"));
        assert!(err.has_field("budget"));
        assert!(err.has_field("status"));

        let ok = validate_properties(
            project,
            &props(json!({"name": "Apollo", "start_date": "2024-03-01", "budget": 1000, "status": " Active "})),
        )
        .unwrap();
        assert_eq!(ok["budget"], json!(1000.0));
        assert_eq!(ok["status"], json!("active"));
    }

    #[test]
    fn lists_and_datetimes() {
        let registry = catalog::builtin().unwrap();
        let page = registry.lookup("ConfluencePage").unwrap();
        let ok = validate_properties(
            page,
            &props(json!({
                "confluence_id": "123",
                "url": "https://wiki/x",
                "creator_username": "alice",
                "title": "Runbook",
                "content": "...",
                "space_key": "ENG",
                "tags": ["ops", "oncall"],
                "created_at": "2024-01-02T03:04:05+02:00"
            })),
        )
        .unwrap();
        assert_eq!(ok["tags"], json!(["ops", "oncall"]));
        assert_eq!(ok["created_at"], json!("2024-01-02T01:04:05+00:00"));
        assert_eq!(ok["version"], json!(1));

        let err = validate_properties(
            page,
            &props(json!({
                "confluence_id": "123",
                "url": "u",
                "creator_username": "a",
                "title": "t",
                "content": "c",
                "space_key": "s",
                "tags": ["ok", 3]
            })),
        )
        .unwrap_err();
        assert!(err.has_field("tags"));
    }

    #[test]
    fn temporal_values_have_one_stored_form() {
        assert_eq!(canonical_date("2024-03-09").as_deref(), Some("2024-03-09"));
        assert_eq!(canonical_date("2024-3-9").as_deref(), Some("2024-03-09"));
        assert_eq!(canonical_date("March 9"), None);
        assert_eq!(
            canonical_datetime("2024-05-01T10:00:00Z").as_deref(),
            Some("2024-05-01T10:00:00+00:00")
        );
        assert_eq!(
            canonical_datetime("2024-05-01T12:00:00+02:00").as_deref(),
            Some("2024-05-01T10:00:00+00:00")
        );
        assert_eq!(canonical_datetime("not a date"), None);
    }

    #[test]
    fn stored_records_split_out_sources() {
        let record = EntityRecord::from_stored(
            "Team",
            props(json!({"name": "Platform", "sources": ["k1", "k2"]})),
        );
        assert_eq!(record.sources, vec!["k1".to_string(), "k2".to_string()]);
        assert!(!record.properties.contains_key("sources"));
        assert_eq!(record.to_json()["sources"], json!(["k1", "k2"]));
        assert_eq!(record.key_value("name").as_deref(), Some("Platform"));
    }
}
