use thiserror::Error;

/// Errors raised by the schema registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Unknown entity type: {name}. Available types: {}", .available.join(", "))]
    UnknownType { name: String, available: Vec<String> },

    #[error("Unknown relationship type: {name}. Available types: {}", .available.join(", "))]
    UnknownRelationshipType { name: String, available: Vec<String> },

    #[error("No primary key defined for {0}")]
    NoPrimaryKey(String),

    #[error("Duplicate type registration: {0}")]
    DuplicateType(String),

    #[error("{type_name} declares more than one primary key")]
    MultiplePrimaryKeys { type_name: String },

    #[error("Primary key {type_name}.{field} must be a required string field")]
    InvalidPrimaryKey { type_name: String, field: String },

    #[error("Invalid pattern for {type_name}.{field}: {message}")]
    InvalidPattern {
        type_name: String,
        field: String,
        message: String,
    },
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// All field errors found while validating one set of properties.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Validation failed for {type_name}: {}", render_field_errors(.errors))]
pub struct ValidationErrors {
    pub type_name: String,
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// Whether the given field has at least one error recorded.
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

fn render_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors around source provenance.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProvenanceError {
    #[error("{type_name} requires at least one source")]
    Missing { type_name: String },

    #[error("Invalid source URI '{uri}': expected <system>://<identifier>")]
    InvalidUri { uri: String },

    #[error("Invalid source: {0}")]
    Invalid(String),
}

/// Errors from loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid [{section}] configuration: {message}")]
    Section { section: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_lists_available() {
        let err = SchemaError::UnknownType {
            name: "Robot".into(),
            available: vec!["Person".into(), "Team".into()],
        };
        assert_eq!(
            err.to_string(),
            "Unknown entity type: Robot. Available types: Person, Team"
        );
    }

    #[test]
    fn validation_errors_join_every_field() {
        let err = ValidationErrors {
            type_name: "Person".into(),
            errors: vec![
                FieldError::new("email", "field required"),
                FieldError::new("name", "expected string, got number"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("email: field required"));
        assert!(msg.contains("name: expected string"));
        assert!(err.has_field("name"));
        assert!(!err.has_field("title"));
    }
}
